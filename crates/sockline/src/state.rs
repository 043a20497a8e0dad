//! Receive-loop state shared by the TCP and UDP clients.

/// State of a client's auto-receive loop.
///
/// With auto-receive enabled, a successful receive completion immediately
/// arms the next receive of the same kind, forming a continuous pull loop.
/// The loop only ever has one receive in flight because it re-arms from
/// within its own completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReceiveLoopState {
    /// No auto-receive loop is running.
    #[default]
    Idle,
    /// The loop is armed and pulling.
    Receiving,
    /// The loop observed an empty packet (or a receive error) and has shut
    /// down for the remainder of the client's lifetime.
    Stopped,
}

impl std::fmt::Display for ReceiveLoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Receiving => write!(f, "Receiving"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}
