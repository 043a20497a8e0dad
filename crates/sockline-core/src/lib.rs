//! Core systems for sockline.
//!
//! This crate provides the foundational pieces shared by the sockline socket
//! clients:
//!
//! - **Signal/Slot System**: Type-safe event notification
//! - **Async Runtime**: A lazily-initialized global tokio runtime that
//!   socket I/O tasks run on
//!
//! # Signal/Slot Example
//!
//! ```
//! use sockline_core::Signal;
//!
//! let value_changed = Signal::<i32>::new();
//!
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! value_changed.emit(42);
//!
//! value_changed.disconnect(conn_id);
//! ```

pub mod runtime;
pub mod signal;

pub use runtime::{AsyncRuntime, AsyncRuntimeConfig, AsyncRuntimeError};
pub use signal::{ConnectionId, Signal};
