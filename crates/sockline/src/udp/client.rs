//! UDP client with signal-based event delivery.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use sockline_core::{AsyncRuntime, Signal};
use tokio::net::UdpSocket as TokioUdpSocket;
use tokio::sync::mpsc;

use super::config::{Datagram, UdpClientConfig};
use super::state::UdpClientState;
use crate::error::{Result, SocketError};
use crate::op::{OpId, OpOutcome, OperationHandle, PendingOps};
use crate::state::ReceiveLoopState;
use crate::wire::decode_text;

const TARGET: &str = "sockline::udp";

/// Internal state for the UDP client.
struct UdpClientInner {
    state: UdpClientState,
    loop_state: ReceiveLoopState,
    /// A receive (explicit or auto) is in flight. Guards the shared window.
    receive_busy: bool,
    local_addr: Option<SocketAddr>,
}

/// Command sent to the UDP client's I/O task.
enum Command {
    SendTo { id: OpId, data: Vec<u8> },
    Receive { id: OpId },
    Close,
}

/// Everything the I/O task shares with the client handle.
struct TaskShared {
    config: UdpClientConfig,
    inner: Arc<Mutex<UdpClientInner>>,
    command_tx: Arc<Mutex<Option<mpsc::UnboundedSender<Command>>>>,
    pending: Arc<PendingOps>,
    is_running: Arc<AtomicBool>,
    responses: Arc<Mutex<VecDeque<String>>>,
    bound: Arc<Signal<SocketAddr>>,
    closed: Arc<Signal<()>>,
    datagram_received: Arc<Signal<Datagram>>,
    text_received: Arc<Signal<String>>,
    error: Arc<Signal<SocketError>>,
}

/// A UDP client with signal-based event delivery.
///
/// The client binds one local socket, addresses every send to the
/// configured remote peer, and receives from anywhere. The receive contract
/// is the same as [`TcpClient`](crate::tcp::TcpClient)'s: NUL-terminated
/// UTF-8 decode of a shared window, zeroed after each completion, with an
/// optional auto-receive loop that stops permanently on an empty payload.
///
/// # Signals
///
/// - [`bound`](Self::bound): Emitted when the socket is bound successfully
/// - [`closed`](Self::closed): Emitted when the socket is closed
/// - [`datagram_received`](Self::datagram_received): Emitted with the window snapshot and source
/// - [`text_received`](Self::text_received): Emitted with the decoded text
/// - [`error`](Self::error): Emitted when an error occurs
///
/// Slots run synchronously on the I/O task; they must not call back into
/// this client's blocking API.
///
/// # Example
///
/// ```ignore
/// let port = find_open_port(50000, 64).unwrap_or(0);
/// let config = UdpClientConfig::new("127.0.0.1", 9000)
///     .local_port(port)
///     .auto_receive();
///
/// let client = UdpClient::new(config);
/// client.text_received.connect(|text| println!("got: {}", text));
///
/// if client.bind() {
///     client.send_text_to("ping")?;
/// }
/// ```
pub struct UdpClient {
    config: UdpClientConfig,
    inner: Arc<Mutex<UdpClientInner>>,
    command_tx: Arc<Mutex<Option<mpsc::UnboundedSender<Command>>>>,
    pending: Arc<PendingOps>,
    is_running: Arc<AtomicBool>,
    responses: Arc<Mutex<VecDeque<String>>>,

    /// Signal emitted when the socket is bound successfully.
    pub bound: Arc<Signal<SocketAddr>>,
    /// Signal emitted when the socket is closed.
    pub closed: Arc<Signal<()>>,
    /// Signal emitted with the window snapshot and source after each
    /// non-empty receive.
    pub datagram_received: Arc<Signal<Datagram>>,
    /// Signal emitted with the decoded text after each non-empty receive.
    pub text_received: Arc<Signal<String>>,
    /// Signal emitted when an error occurs.
    pub error: Arc<Signal<SocketError>>,
}

impl UdpClient {
    /// Create a new UDP client with the given configuration.
    pub fn new(config: UdpClientConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(UdpClientInner {
                state: UdpClientState::Unbound,
                loop_state: ReceiveLoopState::Idle,
                receive_busy: false,
                local_addr: None,
            })),
            command_tx: Arc::new(Mutex::new(None)),
            pending: Arc::new(PendingOps::new()),
            is_running: Arc::new(AtomicBool::new(false)),
            responses: Arc::new(Mutex::new(VecDeque::new())),
            bound: Arc::new(Signal::new()),
            closed: Arc::new(Signal::new()),
            datagram_received: Arc::new(Signal::new()),
            text_received: Arc::new(Signal::new()),
            error: Arc::new(Signal::new()),
        }
    }

    /// Get the current socket state.
    pub fn state(&self) -> UdpClientState {
        self.inner.lock().state
    }

    /// Get the current auto-receive loop state.
    pub fn receive_loop_state(&self) -> ReceiveLoopState {
        self.inner.lock().loop_state
    }

    /// Check if the socket is bound.
    pub fn is_bound(&self) -> bool {
        self.inner.lock().state == UdpClientState::Bound
    }

    /// Get the local address after binding.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.lock().local_addr
    }

    /// Get the bound local port, if any.
    pub fn local_port(&self) -> Option<u16> {
        self.inner.lock().local_addr.map(|addr| addr.port())
    }

    /// Number of asynchronous operations currently outstanding.
    pub fn pending_ops(&self) -> usize {
        self.pending.len()
    }

    /// Get the remote address string (host:port) this client sends to.
    pub fn address(&self) -> String {
        self.config.address()
    }

    /// Begin a non-blocking bind.
    ///
    /// Resolves both the local and the remote endpoint (failing fast with
    /// [`SocketError::AddressParse`]), registers a pending operation and
    /// returns its handle. On success the task records the bound port,
    /// emits [`bound`](Self::bound) and, if auto-receive is configured,
    /// arms the first receive.
    pub fn bind_async(&self) -> Result<OperationHandle> {
        let bind_addr = self.config.bind_endpoint().resolve()?;
        let remote = self.config.remote_endpoint().resolve()?;

        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(SocketError::AlreadyBound);
        }

        let (id, handle) = self.pending.register();
        self.inner.lock().state = UdpClientState::Binding;

        let shared = TaskShared {
            config: self.config.clone(),
            inner: self.inner.clone(),
            command_tx: self.command_tx.clone(),
            pending: self.pending.clone(),
            is_running: self.is_running.clone(),
            responses: self.responses.clone(),
            bound: self.bound.clone(),
            closed: self.closed.clone(),
            datagram_received: self.datagram_received.clone(),
            text_received: self.text_received.clone(),
            error: self.error.clone(),
        };
        AsyncRuntime::global().spawn(run_socket(shared, bind_addr, remote, id));

        Ok(handle)
    }

    /// Bind the socket, blocking until the attempt resolves.
    ///
    /// Returns `true` and emits [`bound`](Self::bound) if the bind
    /// succeeded; returns `false` otherwise so callers can poll. A caller
    /// that picked its port via
    /// [`find_open_port`](crate::endpoint::find_open_port) must treat a
    /// `false` here as authoritative and scan again.
    pub fn bind(&self) -> bool {
        match self.bind_async() {
            Ok(handle) => matches!(handle.wait(), OpOutcome::Bound(_)),
            Err(e) => {
                tracing::error!(target: TARGET, error = %e, "bind failed");
                false
            }
        }
    }

    /// Begin a non-blocking send to the configured remote peer.
    pub fn send_to_async(&self, data: impl Into<Vec<u8>>) -> Result<OperationHandle> {
        let data = data.into();
        let tx_guard = self.command_tx.lock();
        let tx = tx_guard.as_ref().ok_or(SocketError::NotBound)?;

        let (id, handle) = self.pending.register();
        if tx.send(Command::SendTo { id, data }).is_err() {
            self.pending.complete(id, OpOutcome::Cancelled);
            return Err(SocketError::NotBound);
        }
        Ok(handle)
    }

    /// Send a datagram to the configured remote peer, blocking until the
    /// write resolves.
    pub fn send_to(&self, data: impl Into<Vec<u8>>) -> Result<usize> {
        let handle = self.send_to_async(data)?;
        match handle.wait() {
            OpOutcome::Sent(n) => Ok(n),
            OpOutcome::Failed(err) => Err(err),
            _ => Err(SocketError::Cancelled),
        }
    }

    /// Begin a non-blocking send of UTF-8 text to the configured remote
    /// peer.
    pub fn send_text_to_async(&self, text: &str) -> Result<OperationHandle> {
        self.send_to_async(text.as_bytes().to_vec())
    }

    /// Send UTF-8 text to the configured remote peer, blocking until the
    /// write resolves.
    pub fn send_text_to(&self, text: &str) -> Result<usize> {
        self.send_to(text.as_bytes().to_vec())
    }

    /// Begin a non-blocking receive into the shared window.
    ///
    /// At most one receive may be in flight per client; a second call while
    /// one is outstanding (including the auto-receive loop) returns
    /// [`SocketError::ReceiveBusy`].
    pub fn receive_async(&self) -> Result<OperationHandle> {
        {
            let mut guard = self.inner.lock();
            if guard.state != UdpClientState::Bound {
                return Err(SocketError::NotBound);
            }
            if guard.receive_busy {
                return Err(SocketError::ReceiveBusy);
            }
            guard.receive_busy = true;
        }

        let tx_guard = self.command_tx.lock();
        let Some(tx) = tx_guard.as_ref() else {
            self.inner.lock().receive_busy = false;
            return Err(SocketError::NotBound);
        };

        let (id, handle) = self.pending.register();
        if tx.send(Command::Receive { id }).is_err() {
            self.pending.complete(id, OpOutcome::Cancelled);
            self.inner.lock().receive_busy = false;
            return Err(SocketError::NotBound);
        }
        Ok(handle)
    }

    /// Receive one datagram, blocking until it arrives.
    ///
    /// Returns the decoded text, or the empty string if a zero-length
    /// datagram was read or an error occurred.
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
    pub fn next_response(&self) -> Option<String> {
        self.responses.lock().pop_front()
    }

    /// Close the socket and release every pending operation.
    ///
    /// Outstanding [`OperationHandle`]s resolve with
    /// [`OpOutcome::Cancelled`]. Idempotent.
    pub fn close(&self) {
        if let Some(tx) = self.command_tx.lock().as_ref() {
            let _ = tx.send(Command::Close);
        }
        self.is_running.store(false, Ordering::SeqCst);
        self.pending.cancel_all();
    }
}

impl Drop for UdpClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for UdpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpClient")
            .field("remote", &self.config.address())
            .field("state", &self.state())
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

/// Bind and run the socket's I/O loop until close or command-channel
/// teardown.
async fn run_socket(ctx: TaskShared, bind_addr: SocketAddr, remote: SocketAddr, bind_id: OpId) {
    if ctx.config.verbose {
        tracing::debug!(target: TARGET, %bind_addr, %remote, "binding");
    }

    let socket = match TokioUdpSocket::bind(bind_addr).await {
        Ok(socket) => socket,
        Err(e) => {
            let err = SocketError::Udp(format!("failed to bind {}: {}", bind_addr, e));
            tracing::error!(target: TARGET, error = %err, "bind failed");
            ctx.inner.lock().state = UdpClientState::Unbound;
            ctx.error.emit(err.clone());
            ctx.pending.complete(bind_id, OpOutcome::Failed(err));
            ctx.is_running.store(false, Ordering::SeqCst);
            return;
        }
    };

    let local_addr = match socket.local_addr() {
        Ok(addr) => addr,
        Err(e) => {
            let err = SocketError::Udp(format!("failed to get local address: {}", e));
            tracing::error!(target: TARGET, error = %err, "bind failed");
            ctx.inner.lock().state = UdpClientState::Unbound;
            ctx.error.emit(err.clone());
            ctx.pending.complete(bind_id, OpOutcome::Failed(err));
            ctx.is_running.store(false, Ordering::SeqCst);
            return;
        }
    };

    // The client may have been closed while the bind was in flight.
    if !ctx.is_running.load(Ordering::SeqCst) {
        ctx.pending.complete(bind_id, OpOutcome::Cancelled);
        ctx.inner.lock().state = UdpClientState::Closed;
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
    *ctx.command_tx.lock() = Some(tx);

    {
        let mut guard = ctx.inner.lock();
        guard.state = UdpClientState::Bound;
        guard.local_addr = Some(local_addr);
        if ctx.config.auto_receive && guard.loop_state == ReceiveLoopState::Idle {
            guard.loop_state = ReceiveLoopState::Receiving;
            guard.receive_busy = true;
        }
    }
    // Emit before resolving the handle, so a blocking bind() returns only
    // after bound slots have run.
    ctx.bound.emit(local_addr);
    ctx.pending.complete(bind_id, OpOutcome::Bound(local_addr));
    tracing::info!(target: TARGET, %local_addr, %remote, "bound");

    let window = ctx.config.effective_recv_len();
    let mut buffer = vec![0u8; ctx.config.recv_buffer_capacity];
    let mut explicit: Option<OpId> = None;

    loop {
        let armed =
            explicit.is_some() || ctx.inner.lock().loop_state == ReceiveLoopState::Receiving;

        tokio::select! {
            cmd = rx.recv() => {
                match cmd {
                    Some(Command::SendTo { id, data }) => {
                        match socket.send_to(&data, remote).await {
                            Ok(n) => {
                                if ctx.config.verbose {
                                    tracing::debug!(target: TARGET, bytes = n, "udp send complete");
                                }
                                ctx.pending.complete(id, OpOutcome::Sent(n));
                            }
                            Err(e) => {
                                // Datagram send failures are not fatal to
                                // the socket; report and carry on.
                                let err = SocketError::Udp(e.to_string());
                                tracing::error!(
                                    target: TARGET,
                                    protocol = "udp",
                                    error = %err,
                                    code = e.raw_os_error().unwrap_or(-1),
                                    "send failed"
                                );
                                ctx.error.emit(err.clone());
                                ctx.pending.complete(id, OpOutcome::Failed(err));
                            }
                        }
                    }
                    Some(Command::Receive { id }) => {
                        explicit = Some(id);
                    }
                    Some(Command::Close) | None => break,
                }
            }

            result = socket.recv_from(&mut buffer[..window]), if armed => {
                match result {
                    Ok((n, source)) => {
                        finish_receive(&ctx, &mut buffer, window, n, source, &mut explicit);
                    }
                    Err(e) => {
                        let err = SocketError::Udp(e.to_string());
                        tracing::error!(
                            target: TARGET,
                            protocol = "udp",
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

    *ctx.command_tx.lock() = None;
    let released = ctx.pending.cancel_all();
    if released > 0 {
        tracing::debug!(target: TARGET, released, "released pending operations on close");
    }

    {
        let mut guard = ctx.inner.lock();
        guard.state = UdpClientState::Closed;
        guard.receive_busy = false;
        if guard.loop_state == ReceiveLoopState::Receiving {
            guard.loop_state = ReceiveLoopState::Stopped;
        }
        guard.local_addr = None;
    }
    drop(socket);

    ctx.closed.emit(());
    ctx.is_running.store(false, Ordering::SeqCst);
    tracing::info!(target: TARGET, "closed");
}

/// Finalize one completed datagram read: decode, dispatch, clear the
/// window, and either re-arm or stop the loop.
fn finish_receive(
    ctx: &TaskShared,
    buffer: &mut [u8],
    window: usize,
    n: usize,
    source: SocketAddr,
    explicit: &mut Option<OpId>,
) {
    let text = decode_text(&buffer[..window]);

    if text.is_empty() {
        tracing::info!(
            target: TARGET,
            protocol = "udp",
            bytes = n,
            %source,
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
        tracing::debug!(target: TARGET, bytes = n, %source, "udp receive complete");
    }

    ctx.responses.lock().push_back(text.clone());
    ctx.datagram_received
        .emit(Datagram::new(buffer[..window].to_vec(), source));
    ctx.text_received.emit(text.clone());

    // Resolve the handle after the events, so a blocking receive() returns
    // only after received slots have run.
    if let Some(id) = explicit.take() {
        ctx.pending.complete(id, OpOutcome::Received(text));
    }

    buffer[..n].fill(0);

    let mut guard = ctx.inner.lock();
    guard.receive_busy = guard.loop_state == ReceiveLoopState::Receiving;
}
