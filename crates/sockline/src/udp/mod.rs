//! UDP client with signal-based event delivery.
//!
//! # Example
//!
//! ```ignore
//! use sockline::endpoint::find_open_port;
//! use sockline::udp::{UdpClient, UdpClientConfig};
//!
//! let local = find_open_port(50000, 64).unwrap_or(0);
//! let config = UdpClientConfig::new("127.0.0.1", 9000)
//!     .local_port(local)
//!     .auto_receive();
//!
//! let client = UdpClient::new(config);
//!
//! client.bound.connect(|addr| {
//!     println!("Bound to {}", addr);
//! });
//!
//! client.text_received.connect(|text| {
//!     println!("Received: {}", text);
//! });
//!
//! if client.bind() {
//!     client.send_text_to("ping").unwrap();
//! }
//! ```

mod client;
mod config;
mod state;

pub use client::UdpClient;
pub use config::{Datagram, UdpClientConfig};
pub use state::UdpClientState;
