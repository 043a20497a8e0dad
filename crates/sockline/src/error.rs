//! Error types for socket clients.

use thiserror::Error;

/// Socket client errors.
///
/// Variants carry rendered message strings rather than source errors so the
/// type stays `Clone` and can travel through `error` signals.
#[derive(Debug, Clone, Error)]
pub enum SocketError {
    /// The configured address string could not be parsed as an IP address.
    #[error("invalid address: {0}")]
    AddressParse(String),
    /// The connection did not establish.
    #[error("connect failed: {0}")]
    Connect(String),
    /// The connect attempt timed out.
    #[error("connect timed out")]
    Timeout,
    /// Operation requires an established connection.
    #[error("not connected")]
    NotConnected,
    /// Operation requires a bound socket.
    #[error("not bound")]
    NotBound,
    /// The client already has a live connection or connect in progress.
    #[error("already connected")]
    AlreadyConnected,
    /// The client is already bound or binding.
    #[error("already bound")]
    AlreadyBound,
    /// A receive is already in flight on this client.
    #[error("receive already in flight")]
    ReceiveBusy,
    /// TCP-level I/O error.
    #[error("tcp socket error: {0}")]
    Tcp(String),
    /// UDP-level I/O error.
    #[error("udp socket error: {0}")]
    Udp(String),
    /// The operation was released without completing, by close or drop.
    #[error("operation cancelled")]
    Cancelled,
}

/// A specialized Result type for socket operations.
pub type Result<T> = std::result::Result<T, SocketError>;
