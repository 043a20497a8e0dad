//! TCP client with signal-based event delivery.
//!
//! # Example
//!
//! ```ignore
//! use sockline::tcp::{TcpClient, TcpClientConfig};
//!
//! let config = TcpClientConfig::new("127.0.0.1", 8080)
//!     .no_delay(true)
//!     .auto_receive();
//!
//! let client = TcpClient::new(config);
//!
//! client.connected.connect(|()| {
//!     println!("Connected to server!");
//! });
//!
//! client.text_received.connect(|text| {
//!     println!("Received: {}", text);
//! });
//!
//! if client.connect() {
//!     client.send_text("Hello, Server!").unwrap();
//! }
//! ```

mod client;
mod config;
mod state;

pub use client::TcpClient;
pub use config::{DEFAULT_RECV_BUFFER_CAPACITY, TcpClientConfig};
pub use state::ConnectionState;
