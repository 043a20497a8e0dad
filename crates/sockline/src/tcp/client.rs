//! TCP client with signal-based event delivery.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use sockline_core::{AsyncRuntime, Signal};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

use super::config::TcpClientConfig;
use super::state::ConnectionState;
use crate::error::{Result, SocketError};
use crate::op::{OpId, OpOutcome, OperationHandle, PendingOps};
use crate::state::ReceiveLoopState;
use crate::wire::decode_text;

const TARGET: &str = "sockline::tcp";

/// Internal state for the TCP client.
struct TcpClientInner {
    state: ConnectionState,
    loop_state: ReceiveLoopState,
    /// A receive (explicit or auto) is in flight. Guards the shared window.
    receive_busy: bool,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
}

/// Command sent to the TCP client's I/O task.
enum Command {
    Send { id: OpId, data: Vec<u8> },
    Receive { id: OpId },
    Close,
}

/// Everything the I/O task shares with the client handle.
struct TaskShared {
    config: TcpClientConfig,
    inner: Arc<Mutex<TcpClientInner>>,
    command_tx: Arc<Mutex<Option<mpsc::UnboundedSender<Command>>>>,
    pending: Arc<PendingOps>,
    is_running: Arc<AtomicBool>,
    responses: Arc<Mutex<VecDeque<String>>>,
    connected: Arc<Signal<()>>,
    disconnected: Arc<Signal<()>>,
    bytes_received: Arc<Signal<Vec<u8>>>,
    text_received: Arc<Signal<String>>,
    error: Arc<Signal<SocketError>>,
}

/// A TCP client with signal-based event delivery.
///
/// The client owns one connection and emits signals for connection events
/// and received data. Every operation exists in a blocking and an
/// asynchronous variant: the `*_async` methods return immediately with an
/// [`OperationHandle`] and resolve out-of-band, the blocking methods are
/// the async variant plus [`OperationHandle::wait`].
///
/// Received data is treated as NUL-terminated UTF-8 text: each completion
/// decodes the receive window up to the first NUL byte and zeroes the used
/// portion afterwards, so stale bytes never bleed into the next decode.
/// With `auto_receive` configured, each non-empty completion immediately
/// arms the next receive; a zero-length payload stops the loop permanently.
///
/// # Signals
///
/// - [`connected`](Self::connected): Emitted when the connection is established
/// - [`disconnected`](Self::disconnected): Emitted when the connection is closed
/// - [`bytes_received`](Self::bytes_received): Emitted with the receive-window snapshot
/// - [`text_received`](Self::text_received): Emitted with the decoded text
/// - [`error`](Self::error): Emitted when an error occurs
///
/// Slots run synchronously on the I/O task; they must not call back into
/// this client's blocking API.
///
/// # Example
///
/// ```ignore
/// let config = TcpClientConfig::new("127.0.0.1", 8080)
///     .no_delay(true)
///     .auto_receive();
///
/// let client = TcpClient::new(config);
///
/// client.text_received.connect(|text| println!("got: {}", text));
///
/// if client.connect() {
///     client.send_text("hello")?;
/// }
/// ```
pub struct TcpClient {
    config: TcpClientConfig,
    inner: Arc<Mutex<TcpClientInner>>,
    command_tx: Arc<Mutex<Option<mpsc::UnboundedSender<Command>>>>,
    pending: Arc<PendingOps>,
    is_running: Arc<AtomicBool>,
    responses: Arc<Mutex<VecDeque<String>>>,

    /// Signal emitted when the connection is established.
    pub connected: Arc<Signal<()>>,
    /// Signal emitted when the connection is closed.
    pub disconnected: Arc<Signal<()>>,
    /// Signal emitted with a snapshot of the receive window after each
    /// non-empty receive.
    pub bytes_received: Arc<Signal<Vec<u8>>>,
    /// Signal emitted with the decoded text after each non-empty receive.
    pub text_received: Arc<Signal<String>>,
    /// Signal emitted when an error occurs.
    pub error: Arc<Signal<SocketError>>,
}

impl TcpClient {
    /// Create a new TCP client with the given configuration.
    pub fn new(config: TcpClientConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(TcpClientInner {
                state: ConnectionState::Disconnected,
                loop_state: ReceiveLoopState::Idle,
                receive_busy: false,
                local_addr: None,
                peer_addr: None,
            })),
            command_tx: Arc::new(Mutex::new(None)),
            pending: Arc::new(PendingOps::new()),
            is_running: Arc::new(AtomicBool::new(false)),
            responses: Arc::new(Mutex::new(VecDeque::new())),
            connected: Arc::new(Signal::new()),
            disconnected: Arc::new(Signal::new()),
            bytes_received: Arc::new(Signal::new()),
            text_received: Arc::new(Signal::new()),
            error: Arc::new(Signal::new()),
        }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Get the current auto-receive loop state.
    pub fn receive_loop_state(&self) -> ReceiveLoopState {
        self.inner.lock().loop_state
    }

    /// Check if the client is connected.
    pub fn is_connected(&self) -> bool {
        self.inner.lock().state == ConnectionState::Connected
    }

    /// Local address of the connected socket, if any.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.lock().local_addr
    }

    /// Remote address of the connected socket, if any.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.lock().peer_addr
    }

    /// Number of asynchronous operations currently outstanding.
    pub fn pending_ops(&self) -> usize {
        self.pending.len()
    }

    /// Get the host this client is configured to connect to.
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Get the port this client is configured to connect to.
    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// Get the full address (host:port) this client connects to.
    pub fn address(&self) -> String {
        self.config.address()
    }

    /// Begin a non-blocking connect.
    ///
    /// Resolves the configured endpoint (failing fast with
    /// [`SocketError::AddressParse`]), registers a pending operation and
    /// returns its handle. On success the task emits
    /// [`connected`](Self::connected) and, if auto-receive is configured,
    /// arms the first receive. On failure the error is logged and emitted on
    /// [`error`](Self::error); the client ends in
    /// [`ConnectionState::Failed`] and does not retry.
    pub fn connect_async(&self) -> Result<OperationHandle> {
        let peer = self.config.endpoint().resolve()?;

        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(SocketError::AlreadyConnected);
        }

        let (id, handle) = self.pending.register();
        self.inner.lock().state = ConnectionState::Connecting;

        let shared = TaskShared {
            config: self.config.clone(),
            inner: self.inner.clone(),
            command_tx: self.command_tx.clone(),
            pending: self.pending.clone(),
            is_running: self.is_running.clone(),
            responses: self.responses.clone(),
            connected: self.connected.clone(),
            disconnected: self.disconnected.clone(),
            bytes_received: self.bytes_received.clone(),
            text_received: self.text_received.clone(),
            error: self.error.clone(),
        };
        AsyncRuntime::global().spawn(run_connection(shared, peer, id));

        Ok(handle)
    }

    /// Connect to the configured peer, blocking until the attempt resolves.
    ///
    /// Returns `true` and emits [`connected`](Self::connected) exactly once
    /// if the connection established; returns `false` otherwise so callers
    /// can poll.
    pub fn connect(&self) -> bool {
        match self.connect_async() {
            Ok(handle) => matches!(handle.wait(), OpOutcome::Connected),
            Err(e) => {
                tracing::error!(target: TARGET, error = %e, "connect failed");
                false
            }
        }
    }

    /// Begin a non-blocking send.
    pub fn send_async(&self, data: impl Into<Vec<u8>>) -> Result<OperationHandle> {
        let data = data.into();
        let tx_guard = self.command_tx.lock();
        let tx = tx_guard.as_ref().ok_or(SocketError::NotConnected)?;

        let (id, handle) = self.pending.register();
        if tx.send(Command::Send { id, data }).is_err() {
            self.pending.complete(id, OpOutcome::Cancelled);
            return Err(SocketError::NotConnected);
        }
        Ok(handle)
    }

    /// Send data, blocking until the write resolves.
    ///
    /// Exactly one write is attempted; a partial write is logged and its
    /// length returned, never looped.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> Result<usize> {
        let handle = self.send_async(data)?;
        match handle.wait() {
            OpOutcome::Sent(n) => Ok(n),
            OpOutcome::Failed(err) => Err(err),
            _ => Err(SocketError::Cancelled),
        }
    }

    /// Begin a non-blocking send of UTF-8 text.
    pub fn send_text_async(&self, text: &str) -> Result<OperationHandle> {
        self.send_async(text.as_bytes().to_vec())
    }

    /// Send UTF-8 text, blocking until the write resolves.
    pub fn send_text(&self, text: &str) -> Result<usize> {
        self.send(text.as_bytes().to_vec())
    }

    /// Begin a non-blocking receive into the shared window.
    ///
    /// At most one receive may be in flight per client; a second call while
    /// one is outstanding (including the auto-receive loop) returns
    /// [`SocketError::ReceiveBusy`].
    pub fn receive_async(&self) -> Result<OperationHandle> {
        {
            let mut guard = self.inner.lock();
            if guard.state != ConnectionState::Connected {
                return Err(SocketError::NotConnected);
            }
            if guard.receive_busy {
                return Err(SocketError::ReceiveBusy);
            }
            guard.receive_busy = true;
        }

        let tx_guard = self.command_tx.lock();
        let Some(tx) = tx_guard.as_ref() else {
            self.inner.lock().receive_busy = false;
            return Err(SocketError::NotConnected);
        };

        let (id, handle) = self.pending.register();
        if tx.send(Command::Receive { id }).is_err() {
            self.pending.complete(id, OpOutcome::Cancelled);
            self.inner.lock().receive_busy = false;
            return Err(SocketError::NotConnected);
        }
        Ok(handle)
    }

    /// Receive once, blocking until data arrives.
    ///
    /// Returns the decoded text, or the empty string if zero bytes were
    /// read or an error occurred.
    pub fn receive(&self) -> String {
        match self.receive_async() {
            Ok(handle) => match handle.wait() {
                OpOutcome::Received(text) => text,
                _ => String::new(),
            },
            Err(e) => {
                tracing::debug!(target: TARGET, error = %e, "blocking receive unavailable");
                String::new()
            }
        }
    }

    /// Pop the oldest decoded response collected by completed receives.
    ///
    /// Useful for poll-style callers that do not connect slots to
    /// [`text_received`](Self::text_received).
    pub fn next_response(&self) -> Option<String> {
        self.responses.lock().pop_front()
    }

    /// Disconnect from the peer.
    pub fn disconnect(&self) {
        self.close();
    }

    /// Close the connection and release every pending operation.
    ///
    /// Outstanding [`OperationHandle`]s resolve with
    /// [`OpOutcome::Cancelled`]; kernel operations already in flight are not
    /// interrupted, so late completion callbacks may still run briefly.
    /// Idempotent: closing a closed client does nothing.
    pub fn close(&self) {
        if let Some(tx) = self.command_tx.lock().as_ref() {
            let _ = tx.send(Command::Close);
        }
        self.is_running.store(false, Ordering::SeqCst);
        // The task releases pending operations on exit too; whichever runs
        // first wins, the other finds the set empty.
        self.pending.cancel_all();
    }
}

impl Drop for TcpClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for TcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpClient")
            .field("address", &self.config.address())
            .field("state", &self.state())
            .field("receive_loop", &self.receive_loop_state())
            .finish()
    }
}

/// Connect and run the connection's I/O loop until close, EOF of the send
/// path, or command-channel teardown.
async fn run_connection(ctx: TaskShared, peer: SocketAddr, connect_id: OpId) {
    if ctx.config.verbose {
        tracing::debug!(target: TARGET, %peer, "connecting");
    }

    let connect_result = match ctx.config.connect_timeout {
        Some(limit) => match timeout(limit, TcpStream::connect(peer)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(SocketError::Connect(e.to_string())),
            Err(_) => Err(SocketError::Timeout),
        },
        None => TcpStream::connect(peer)
            .await
            .map_err(|e| SocketError::Connect(e.to_string())),
    };

    let stream = match connect_result {
        Ok(stream) => stream,
        Err(err) => {
            tracing::error!(target: TARGET, %peer, error = %err, "connect failed");
            ctx.inner.lock().state = ConnectionState::Failed;
            ctx.error.emit(err.clone());
            ctx.pending.complete(connect_id, OpOutcome::Failed(err));
            ctx.is_running.store(false, Ordering::SeqCst);
            return;
        }
    };

    if ctx.config.no_delay
        && let Err(e) = stream.set_nodelay(true)
    {
        ctx.error
            .emit(SocketError::Tcp(format!("failed to set TCP_NODELAY: {}", e)));
    }

    // The client may have been closed while the connect was in flight.
    if !ctx.is_running.load(Ordering::SeqCst) {
        ctx.pending.complete(connect_id, OpOutcome::Cancelled);
        ctx.inner.lock().state = ConnectionState::Disconnected;
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
    *ctx.command_tx.lock() = Some(tx);

    {
        let mut guard = ctx.inner.lock();
        guard.state = ConnectionState::Connected;
        guard.local_addr = stream.local_addr().ok();
        guard.peer_addr = stream.peer_addr().ok();
        if ctx.config.auto_receive && guard.loop_state == ReceiveLoopState::Idle {
            guard.loop_state = ReceiveLoopState::Receiving;
            guard.receive_busy = true;
        }
    }
    // Emit before resolving the handle, so a blocking connect() returns
    // only after connected slots have run.
    ctx.connected.emit(());
    ctx.pending.complete(connect_id, OpOutcome::Connected);
    tracing::info!(target: TARGET, %peer, "connected");

    let (mut reader, mut writer) = stream.into_split();

    let window = ctx.config.effective_recv_len();
    let mut buffer = vec![0u8; ctx.config.recv_buffer_capacity];
    // At most one explicit receive rides the window at a time; the
    // receive_busy flag in the client keeps callers honest.
    let mut explicit: Option<OpId> = None;

    loop {
        let armed =
            explicit.is_some() || ctx.inner.lock().loop_state == ReceiveLoopState::Receiving;

        tokio::select! {
            cmd = rx.recv() => {
                match cmd {
                    Some(Command::Send { id, data }) => {
                        // Exactly one write attempt per send.
                        match writer.write(&data).await {
                            Ok(n) => {
                                if n < data.len() {
                                    tracing::warn!(
                                        target: TARGET,
                                        written = n,
                                        requested = data.len(),
                                        "partial tcp send"
                                    );
                                }
                                if ctx.config.verbose {
                                    tracing::debug!(target: TARGET, bytes = n, "tcp send complete");
                                }
                                ctx.pending.complete(id, OpOutcome::Sent(n));
                            }
                            Err(e) => {
                                let err = SocketError::Tcp(e.to_string());
                                tracing::error!(
                                    target: TARGET,
                                    protocol = "tcp",
                                    error = %err,
                                    code = e.raw_os_error().unwrap_or(-1),
                                    "send failed"
                                );
                                ctx.error.emit(err.clone());
                                ctx.pending.complete(id, OpOutcome::Failed(err));
                                break;
                            }
                        }
                    }
                    Some(Command::Receive { id }) => {
                        explicit = Some(id);
                    }
                    Some(Command::Close) | None => break,
                }
            }

            result = reader.read(&mut buffer[..window]), if armed => {
                match result {
                    Ok(n) => {
                        finish_receive(&ctx, &mut buffer, window, n, &mut explicit);
                    }
                    Err(e) => {
                        let err = SocketError::Tcp(e.to_string());
                        tracing::error!(
                            target: TARGET,
                            protocol = "tcp",
                            error = %err,
                            code = e.raw_os_error().unwrap_or(-1),
                            "receive failed"
                        );
                        ctx.error.emit(err.clone());
                        if let Some(id) = explicit.take() {
                            ctx.pending.complete(id, OpOutcome::Failed(err));
                        }
                        let mut guard = ctx.inner.lock();
                        if guard.loop_state == ReceiveLoopState::Receiving {
                            guard.loop_state = ReceiveLoopState::Stopped;
                        }
                        guard.receive_busy = false;
                    }
                }
            }
        }
    }

    // Teardown: drop the command channel, release any still-pending
    // operations, close the socket, then notify.
    *ctx.command_tx.lock() = None;
    let released = ctx.pending.cancel_all();
    if released > 0 {
        tracing::debug!(target: TARGET, released, "released pending operations on close");
    }

    {
        let mut guard = ctx.inner.lock();
        guard.state = ConnectionState::Disconnected;
        guard.receive_busy = false;
        if guard.loop_state == ReceiveLoopState::Receiving {
            guard.loop_state = ReceiveLoopState::Stopped;
        }
        guard.local_addr = None;
        guard.peer_addr = None;
    }
    // Shut down the send direction before the socket drops; the read half
    // goes with it.
    let _ = writer.shutdown().await;
    drop(reader);

    ctx.disconnected.emit(());
    ctx.is_running.store(false, Ordering::SeqCst);
    tracing::info!(target: TARGET, %peer, "disconnected");
}

/// Finalize one completed read: decode, dispatch, clear the window, and
/// either re-arm or stop the loop.
fn finish_receive(
    ctx: &TaskShared,
    buffer: &mut [u8],
    window: usize,
    n: usize,
    explicit: &mut Option<OpId>,
) {
    let text = decode_text(&buffer[..window]);

    if text.is_empty() {
        // Empty packet: terminal for the auto-receive loop, a plain empty
        // result for an explicit receive.
        tracing::info!(
            target: TARGET,
            protocol = "tcp",
            bytes = n,
            "empty packet received, auto-receive stops"
        );
        {
            let mut guard = ctx.inner.lock();
            if guard.loop_state == ReceiveLoopState::Receiving {
                guard.loop_state = ReceiveLoopState::Stopped;
            }
            guard.receive_busy = false;
        }
        if let Some(id) = explicit.take() {
            ctx.pending.complete(id, OpOutcome::Received(String::new()));
        }
        buffer[..n].fill(0);
        return;
    }

    if ctx.config.verbose {
        tracing::debug!(target: TARGET, bytes = n, "tcp receive complete");
    }

    ctx.responses.lock().push_back(text.clone());
    ctx.bytes_received.emit(buffer[..window].to_vec());
    ctx.text_received.emit(text.clone());

    // Resolve the handle after the events, so a blocking receive() returns
    // only after received slots have run.
    if let Some(id) = explicit.take() {
        ctx.pending.complete(id, OpOutcome::Received(text));
    }

    // Restore the all-zero window; bytes past n are still zero from the
    // previous clear.
    buffer[..n].fill(0);

    // Re-arm only if the auto-receive loop is still running.
    let mut guard = ctx.inner.lock();
    guard.receive_busy = guard.loop_state == ReceiveLoopState::Receiving;
}
