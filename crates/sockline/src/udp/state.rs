//! State enumerations for the UDP client.

/// State of a UDP client's socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum UdpClientState {
    /// Socket is not bound.
    #[default]
    Unbound,
    /// Socket is binding to an address.
    Binding,
    /// Socket is bound and ready.
    Bound,
    /// Socket is closed.
    Closed,
}

impl std::fmt::Display for UdpClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbound => write!(f, "Unbound"),
            Self::Binding => write!(f, "Binding"),
            Self::Bound => write!(f, "Bound"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}
