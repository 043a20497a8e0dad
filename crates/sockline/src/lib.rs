//! Asynchronous TCP/UDP socket clients with signal-based event delivery.
//!
//! sockline wraps one socket per client and exposes connect/bind, send and
//! receive in both blocking and asynchronous variants. Asynchronous
//! operations return an [`OperationHandle`] and resolve out-of-band on a
//! shared runtime; completion is observable through the handle and through
//! signals ([`Signal`]) the caller connects slots to. An optional
//! auto-receive loop keeps one receive armed for the lifetime of the
//! connection, stopping permanently when a zero-length payload is observed.
//!
//! The wire format is deliberately minimal: UTF-8 text, NUL-terminated or
//! buffer-exhausted, one decode per OS-level read. There is no framing, no
//! reassembly, no retry and no reconnection — callers that need those build
//! them on top.
//!
//! # TCP Example
//!
//! ```ignore
//! use sockline::tcp::{TcpClient, TcpClientConfig};
//!
//! let client = TcpClient::new(
//!     TcpClientConfig::new("127.0.0.1", 8080).auto_receive(),
//! );
//!
//! client.text_received.connect(|text| {
//!     println!("server says: {}", text);
//! });
//!
//! if client.connect() {
//!     client.send_text("hello")?;
//! }
//! ```
//!
//! # Logging
//!
//! All diagnostics go through the [`tracing`] facade under the
//! `sockline::tcp` and `sockline::udp` targets; install a subscriber to see
//! them. Set `verbose()` on a config for per-operation debug lines.

pub mod endpoint;
pub mod error;
pub mod op;
pub mod state;
pub mod tcp;
pub mod udp;
pub mod wire;

pub use endpoint::{Endpoint, find_open_port};
pub use error::{Result, SocketError};
pub use op::{OpId, OpOutcome, OperationHandle};
pub use state::ReceiveLoopState;
pub use tcp::{ConnectionState, TcpClient, TcpClientConfig};
pub use udp::{Datagram, UdpClient, UdpClientConfig, UdpClientState};
pub use wire::decode_text;

// Re-export the signal types callers interact with directly.
pub use sockline_core::{ConnectionId, Signal};
