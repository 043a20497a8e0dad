//! Configuration types for the UDP client.

use std::net::SocketAddr;

use crate::endpoint::Endpoint;
use crate::tcp::DEFAULT_RECV_BUFFER_CAPACITY;

/// Configuration for a UDP client.
///
/// `host`/`port` name the remote peer datagrams are addressed to;
/// `bind_address`/`local_port` control the local binding. A `local_port` of
/// 0 asks the OS for an ephemeral port — pair with
/// [`find_open_port`](crate::endpoint::find_open_port) to discover one in a
/// fixed range instead.
#[derive(Clone, Debug)]
pub struct UdpClientConfig {
    /// The remote IP address datagrams are sent to.
    pub host: String,
    /// The remote port datagrams are sent to.
    pub port: u16,
    /// The local address to bind to.
    pub bind_address: String,
    /// The local port to bind to. Use 0 for an OS-assigned port.
    pub local_port: u16,
    /// Capacity of the receive buffer, allocated once per binding.
    pub recv_buffer_capacity: usize,
    /// Effective per-call read length. `None` means the full capacity;
    /// larger values are clamped to the capacity.
    pub recv_len: Option<usize>,
    /// Arm a receive automatically on bind and re-arm after every non-empty
    /// completion.
    pub auto_receive: bool,
    /// Emit per-operation debug log lines.
    pub verbose: bool,
}

impl UdpClientConfig {
    /// Create a new configuration addressing the given remote peer.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            bind_address: "0.0.0.0".into(),
            local_port: 0,
            recv_buffer_capacity: DEFAULT_RECV_BUFFER_CAPACITY,
            recv_len: None,
            auto_receive: false,
            verbose: false,
        }
    }

    /// Set the local address to bind to.
    pub fn bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }

    /// Set the local port to bind to.
    pub fn local_port(mut self, port: u16) -> Self {
        self.local_port = port;
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
    pub fn remote_endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    /// The local binding as configured.
    pub fn bind_endpoint(&self) -> Endpoint {
        Endpoint::new(self.bind_address.clone(), self.local_port)
    }

    /// Get the remote address string (host:port).
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

/// A received datagram with its source address.
#[derive(Clone, Debug)]
pub struct Datagram {
    /// Snapshot of the receive window.
    pub data: Vec<u8>,
    /// The source address of the datagram.
    pub source: SocketAddr,
}

impl Datagram {
    /// Create a new datagram.
    pub fn new(data: Vec<u8>, source: SocketAddr) -> Self {
        Self { data, source }
    }
}
