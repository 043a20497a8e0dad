//! Configuration for the TCP client.

use std::time::Duration;

use crate::endpoint::Endpoint;

/// Default receive window capacity in bytes.
pub const DEFAULT_RECV_BUFFER_CAPACITY: usize = 2048;

/// Configuration for a TCP client connection.
#[derive(Clone, Debug)]
pub struct TcpClientConfig {
    /// The IP address to connect to.
    pub host: String,
    /// The port to connect to.
    pub port: u16,
    /// Enable TCP_NODELAY (disable Nagle's algorithm).
    pub no_delay: bool,
    /// Connection timeout. `None` means no timeout.
    pub connect_timeout: Option<Duration>,
    /// Capacity of the receive buffer, allocated once per connection.
    pub recv_buffer_capacity: usize,
    /// Effective per-call read length. `None` means the full capacity;
    /// larger values are clamped to the capacity.
    pub recv_len: Option<usize>,
    /// Arm a receive automatically on connect and re-arm after every
    /// non-empty completion.
    pub auto_receive: bool,
    /// Emit per-operation debug log lines.
    pub verbose: bool,
}

impl TcpClientConfig {
    /// Create a new client configuration.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            no_delay: false,
            connect_timeout: Some(Duration::from_secs(30)),
            recv_buffer_capacity: DEFAULT_RECV_BUFFER_CAPACITY,
            recv_len: None,
            auto_receive: false,
            verbose: false,
        }
    }

    /// Enable or disable TCP_NODELAY.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.no_delay = enabled;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Disable the connection timeout.
    pub fn no_connect_timeout(mut self) -> Self {
        self.connect_timeout = None;
        self
    }

    /// Set the receive buffer capacity.
    pub fn recv_buffer_capacity(mut self, capacity: usize) -> Self {
        self.recv_buffer_capacity = capacity;
        self
    }

    /// Set the effective per-call read length.
    pub fn recv_len(mut self, len: usize) -> Self {
        self.recv_len = Some(len);
        self
    }

    /// Enable the auto-receive loop.
    pub fn auto_receive(mut self) -> Self {
        self.auto_receive = true;
        self
    }

    /// Enable per-operation debug logging.
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// The remote endpoint as configured.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    /// Get the address string (host:port).
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The read length actually used per receive call: the configured
    /// `recv_len` clamped to the buffer capacity.
    pub fn effective_recv_len(&self) -> usize {
        self.recv_len
            .unwrap_or(self.recv_buffer_capacity)
            .min(self.recv_buffer_capacity)
    }
}
