//! Shared async runtime for sockline.
//!
//! Socket clients drive their I/O on a tokio runtime, but the callers this
//! library targets (host application scripts, plain threads) usually do not
//! own one. This module provides a lazily-initialized global runtime that
//! clients spawn their tasks onto, plus [`AsyncRuntime::block_on`] for
//! bridging from synchronous code.
//!
//! # Example
//!
//! ```
//! use sockline_core::runtime::AsyncRuntime;
//!
//! let runtime = AsyncRuntime::global();
//! let value = runtime.block_on(async { 41 + 1 });
//! assert_eq!(value, 42);
//! ```

use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

/// Global async runtime instance.
static GLOBAL_RUNTIME: OnceLock<AsyncRuntime> = OnceLock::new();

/// Configuration for the async runtime.
#[derive(Debug, Clone)]
pub struct AsyncRuntimeConfig {
    /// Number of worker threads. Defaults to the number of CPU cores.
    pub worker_threads: Option<usize>,
    /// Name prefix for runtime threads.
    pub thread_name: String,
}

impl Default for AsyncRuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name: "sockline-io".to_string(),
        }
    }
}

impl AsyncRuntimeConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    pub fn with_worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = Some(count);
        self
    }

    /// Set the thread name prefix.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// The async runtime socket clients run on.
///
/// Owns a multi-threaded tokio runtime. Most callers never touch this type
/// directly — clients fetch [`AsyncRuntime::global`] themselves — but a host
/// that wants to control thread count or naming can call
/// [`AsyncRuntime::init_global`] before creating the first client.
pub struct AsyncRuntime {
    /// Kept alive to prevent the runtime from shutting down.
    #[allow(dead_code)]
    runtime: Runtime,
    handle: Handle,
}

impl AsyncRuntime {
    /// Get the global async runtime, lazily initializing it with default
    /// settings on first use.
    pub fn global() -> &'static AsyncRuntime {
        GLOBAL_RUNTIME.get_or_init(|| {
            AsyncRuntime::new(AsyncRuntimeConfig::default())
                .expect("failed to create global async runtime")
        })
    }

    /// Initialize the global async runtime with custom configuration.
    ///
    /// Must be called before any socket client is created. Returns an error
    /// if the global runtime already exists.
    pub fn init_global(
        config: AsyncRuntimeConfig,
    ) -> Result<&'static AsyncRuntime, AsyncRuntimeError> {
        let runtime = AsyncRuntime::new(config)?;
        GLOBAL_RUNTIME
            .set(runtime)
            .map_err(|_| AsyncRuntimeError::AlreadyInitialized)?;
        Ok(GLOBAL_RUNTIME.get().expect("global runtime just set"))
    }

    /// Create a new, independently owned runtime.
    pub fn new(config: AsyncRuntimeConfig) -> Result<Self, AsyncRuntimeError> {
        let mut builder = Builder::new_multi_thread();
        builder.thread_name(&config.thread_name);

        if let Some(workers) = config.worker_threads {
            builder.worker_threads(workers);
        }

        builder.enable_io();
        builder.enable_time();

        let runtime = builder
            .build()
            .map_err(|e| AsyncRuntimeError::CreationFailed(e.to_string()))?;
        let handle = runtime.handle().clone();

        Ok(Self { runtime, handle })
    }

    /// Get a handle to the tokio runtime for spawning tasks directly.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Spawn a future onto the runtime.
    pub fn spawn<F, T>(&self, future: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Block on a future, running it to completion.
    ///
    /// # Warning
    ///
    /// Do not call this from within the runtime's own worker threads (e.g.
    /// from a signal slot invoked by a socket task) — it will panic or
    /// deadlock. It is intended for synchronous callers on their own
    /// threads.
    pub fn block_on<F, T>(&self, future: F) -> T
    where
        F: Future<Output = T>,
    {
        self.handle.block_on(future)
    }
}

impl std::fmt::Debug for AsyncRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncRuntime").finish_non_exhaustive()
    }
}

/// Errors that can occur with the async runtime.
#[derive(Debug, Clone)]
pub enum AsyncRuntimeError {
    /// The global runtime has already been initialized.
    AlreadyInitialized,
    /// Failed to create the runtime.
    CreationFailed(String),
}

impl std::fmt::Display for AsyncRuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyInitialized => write!(f, "async runtime already initialized"),
            Self::CreationFailed(msg) => write!(f, "failed to create async runtime: {}", msg),
        }
    }
}

impl std::error::Error for AsyncRuntimeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::time::Duration;

    #[test]
    fn test_spawn_and_block_on() {
        let runtime = AsyncRuntime::new(AsyncRuntimeConfig::new()).unwrap();
        let handle = runtime.spawn(async { 42 });
        assert_eq!(runtime.block_on(handle).unwrap(), 42);
    }

    #[test]
    fn test_spawn_async_computation() {
        let runtime = AsyncRuntime::new(AsyncRuntimeConfig::new()).unwrap();
        let handle = runtime.spawn(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            "hello"
        });
        assert_eq!(runtime.block_on(handle).unwrap(), "hello");
    }

    #[test]
    fn test_multiple_tasks() {
        let runtime = AsyncRuntime::new(AsyncRuntimeConfig::new()).unwrap();
        let counter = Arc::new(AtomicI32::new(0));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let counter = counter.clone();
                runtime.spawn(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            runtime.block_on(handle).unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_global_runtime() {
        let runtime = AsyncRuntime::global();
        let value = runtime.block_on(async { 7 });
        assert_eq!(value, 7);
    }

    #[test]
    fn test_custom_worker_threads() {
        let config = AsyncRuntimeConfig::new()
            .with_worker_threads(2)
            .with_thread_name("test-io");
        assert_eq!(config.worker_threads, Some(2));
        assert_eq!(config.thread_name, "test-io");

        let runtime = AsyncRuntime::new(config).unwrap();
        assert_eq!(runtime.block_on(async { 1 }), 1);
    }
}
