//! Tests for the TCP client.

use std::io::{Read, Write};
use std::net::{TcpListener, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use sockline::tcp::{ConnectionState, TcpClient, TcpClientConfig};
use sockline::{OpOutcome, ReceiveLoopState, SocketError};

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..250 {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn test_client_config_builder() {
    let config = TcpClientConfig::new("127.0.0.1", 8080)
        .no_delay(true)
        .connect_timeout(Duration::from_secs(5))
        .recv_buffer_capacity(4096)
        .recv_len(1024)
        .auto_receive()
        .verbose();

    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.port, 8080);
    assert_eq!(config.address(), "127.0.0.1:8080");
    assert!(config.no_delay);
    assert_eq!(config.connect_timeout, Some(Duration::from_secs(5)));
    assert_eq!(config.recv_buffer_capacity, 4096);
    assert_eq!(config.effective_recv_len(), 1024);
    assert!(config.auto_receive);
    assert!(config.verbose);
}

#[test]
fn test_effective_recv_len_clamps_to_capacity() {
    let config = TcpClientConfig::new("127.0.0.1", 1).recv_buffer_capacity(64).recv_len(4096);
    assert_eq!(config.effective_recv_len(), 64);

    let config = TcpClientConfig::new("127.0.0.1", 1).recv_buffer_capacity(64);
    assert_eq!(config.effective_recv_len(), 64);
}

#[test]
fn test_client_initial_state() {
    let client = TcpClient::new(TcpClientConfig::new("127.0.0.1", 8080));

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.receive_loop_state(), ReceiveLoopState::Idle);
    assert!(!client.is_connected());
    assert!(client.local_addr().is_none());
    assert!(client.peer_addr().is_none());
    assert_eq!(client.pending_ops(), 0);
    assert_eq!(client.host(), "127.0.0.1");
    assert_eq!(client.port(), 8080);
    assert_eq!(client.address(), "127.0.0.1:8080");
}

#[test]
fn test_send_before_connect_fails() {
    let client = TcpClient::new(TcpClientConfig::new("127.0.0.1", 8080));
    assert!(matches!(
        client.send(b"test data".to_vec()),
        Err(SocketError::NotConnected)
    ));
    assert!(client.send_async(b"test data".to_vec()).is_err());
}

#[test]
fn test_receive_before_connect_is_empty() {
    let client = TcpClient::new(TcpClientConfig::new("127.0.0.1", 8080));
    assert!(matches!(
        client.receive_async(),
        Err(SocketError::NotConnected)
    ));
    assert_eq!(client.receive(), "");
}

#[test]
fn test_connect_invalid_address() {
    let client = TcpClient::new(TcpClientConfig::new("not an ip", 8080));
    assert!(matches!(
        client.connect_async(),
        Err(SocketError::AddressParse(_))
    ));
    assert!(!client.connect());
    // A failed resolve leaves nothing running; a retry is allowed.
    assert!(matches!(
        client.connect_async(),
        Err(SocketError::AddressParse(_))
    ));
}

#[test]
fn test_connect_refused() {
    // Occupy a port with UDP only, so a TCP connect there is refused.
    let blocker = UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = blocker.local_addr().unwrap().port();

    let client = TcpClient::new(
        TcpClientConfig::new("127.0.0.1", port).connect_timeout(Duration::from_secs(5)),
    );

    let connected_count = Arc::new(AtomicUsize::new(0));
    let connected_clone = connected_count.clone();
    client.connected.connect(move |()| {
        connected_clone.fetch_add(1, Ordering::SeqCst);
    });

    assert!(!client.connect());
    assert_eq!(client.state(), ConnectionState::Failed);
    assert_eq!(connected_count.load(Ordering::SeqCst), 0);
    assert_eq!(client.pending_ops(), 0);
}

#[test]
fn test_connect_and_echo_roundtrip() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 256];
        let n = stream.read(&mut buf).unwrap();
        stream.write_all(&buf[..n]).unwrap();
    });

    let client = TcpClient::new(TcpClientConfig::new("127.0.0.1", port).no_delay(true));

    let connected_count = Arc::new(AtomicUsize::new(0));
    let connected_clone = connected_count.clone();
    client.connected.connect(move |()| {
        connected_clone.fetch_add(1, Ordering::SeqCst);
    });

    assert!(client.connect());
    assert!(client.is_connected());
    assert_eq!(connected_count.load(Ordering::SeqCst), 1);
    assert!(client.local_addr().is_some());
    assert!(client.peer_addr().is_some());

    assert_eq!(client.send_text("hello tcp").unwrap(), 9);
    assert_eq!(client.receive(), "hello tcp");
    assert_eq!(client.next_response().as_deref(), Some("hello tcp"));
    assert_eq!(client.next_response(), None);

    client.disconnect();
    server.join().unwrap();
}

#[test]
fn test_receive_truncates_at_window() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(b"0123456789abcdef").unwrap();
        // Keep the connection open until the client is done reading.
        let mut scratch = [0u8; 16];
        let _ = stream.read(&mut scratch);
    });

    let client = TcpClient::new(TcpClientConfig::new("127.0.0.1", port).recv_len(8));
    assert!(client.connect());

    // Only the first window's worth of bytes is observed per read.
    assert_eq!(client.receive(), "01234567");

    client.close();
    server.join().unwrap();
}

#[test]
fn test_window_zeroed_between_receives() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(b"AAAAAAAA").unwrap();
        // Wait for the client's ack so the two messages cannot coalesce
        // into one read.
        let mut ack = [0u8; 3];
        stream.read_exact(&mut ack).unwrap();
        stream.write_all(b"B").unwrap();
        let mut scratch = [0u8; 16];
        let _ = stream.read(&mut scratch);
    });

    let client = TcpClient::new(
        TcpClientConfig::new("127.0.0.1", port)
            .recv_buffer_capacity(16)
            .no_delay(true),
    );

    let snapshots: Arc<parking_lot::Mutex<Vec<Vec<u8>>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let snapshots_clone = snapshots.clone();
    client.bytes_received.connect(move |window| {
        snapshots_clone.lock().push(window.clone());
    });

    assert!(client.connect());
    assert_eq!(client.receive(), "AAAAAAAA");
    client.send_text("ack").unwrap();
    assert_eq!(client.receive(), "B");

    let snapshots = snapshots.lock();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(&snapshots[0][..8], b"AAAAAAAA");
    // The second snapshot proves the window was zeroed in between: nothing
    // of the first message bleeds past the fresh byte.
    assert_eq!(snapshots[1][0], b'B');
    assert!(snapshots[1][1..].iter().all(|&b| b == 0));
    drop(snapshots);

    client.close();
    server.join().unwrap();
}

#[test]
fn test_auto_receive_loop_and_empty_packet_stop() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        for message in ["one", "two", "three"] {
            stream.write_all(message.as_bytes()).unwrap();
            // Gaps keep the messages in separate reads.
            thread::sleep(Duration::from_millis(150));
        }
        // EOF: the client observes a zero-length read.
        drop(stream);
        thread::sleep(Duration::from_millis(300));
    });

    let client = TcpClient::new(
        TcpClientConfig::new("127.0.0.1", port)
            .no_delay(true)
            .auto_receive(),
    );

    let received: Arc<parking_lot::Mutex<Vec<String>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let received_clone = received.clone();
    client.text_received.connect(move |text| {
        received_clone.lock().push(text.clone());
    });

    assert!(client.connect());
    assert_eq!(client.receive_loop_state(), ReceiveLoopState::Receiving);

    assert!(wait_until(|| received.lock().len() == 3));
    assert!(wait_until(|| {
        client.receive_loop_state() == ReceiveLoopState::Stopped
    }));

    // No fourth receive is ever issued.
    thread::sleep(Duration::from_millis(200));
    assert_eq!(&*received.lock(), &["one", "two", "three"]);

    // The poll-style queue saw the same messages.
    assert_eq!(client.next_response().as_deref(), Some("one"));
    assert_eq!(client.next_response().as_deref(), Some("two"));
    assert_eq!(client.next_response().as_deref(), Some("three"));
    assert_eq!(client.next_response(), None);

    client.close();
    server.join().unwrap();
}

#[test]
fn test_receive_busy_is_rejected() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut scratch = [0u8; 16];
        let _ = stream.read(&mut scratch);
    });

    let client = TcpClient::new(TcpClientConfig::new("127.0.0.1", port));
    assert!(client.connect());

    let handle = client.receive_async().unwrap();
    assert!(matches!(
        client.receive_async(),
        Err(SocketError::ReceiveBusy)
    ));

    client.close();
    assert!(matches!(handle.wait(), OpOutcome::Cancelled));
    server.join().unwrap();
}

#[test]
fn test_close_releases_pending_ops() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut scratch = [0u8; 16];
        let _ = stream.read(&mut scratch);
    });

    let client = TcpClient::new(TcpClientConfig::new("127.0.0.1", port));

    let disconnected_count = Arc::new(AtomicUsize::new(0));
    let disconnected_clone = disconnected_count.clone();
    client.disconnected.connect(move |()| {
        disconnected_clone.fetch_add(1, Ordering::SeqCst);
    });

    assert!(client.connect());

    // Park a receive that will never complete on its own.
    let handle = client.receive_async().unwrap();
    assert_eq!(client.pending_ops(), 1);

    client.close();
    assert!(matches!(handle.wait(), OpOutcome::Cancelled));
    assert_eq!(client.pending_ops(), 0);

    assert!(wait_until(|| !client.is_connected()));
    assert!(wait_until(|| disconnected_count.load(Ordering::SeqCst) == 1));

    // A second close is a no-op.
    client.close();
    assert_eq!(client.pending_ops(), 0);
    assert_eq!(disconnected_count.load(Ordering::SeqCst), 1);

    server.join().unwrap();
}

#[test]
fn test_async_send_resolves_handle() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf);
        buf
    });

    let client = TcpClient::new(TcpClientConfig::new("127.0.0.1", port));
    assert!(client.connect());

    let handle = client.send_text_async("fire and wait").unwrap();
    match handle.wait() {
        OpOutcome::Sent(n) => assert_eq!(n, 13),
        other => panic!("unexpected outcome: {:?}", other),
    }

    client.close();
    assert_eq!(server.join().unwrap(), b"fire and wait");
}

#[test]
fn test_second_connect_while_running_is_rejected() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut scratch = [0u8; 16];
        let _ = stream.read(&mut scratch);
    });

    let client = TcpClient::new(TcpClientConfig::new("127.0.0.1", port));
    assert!(client.connect());
    assert!(matches!(
        client.connect_async(),
        Err(SocketError::AlreadyConnected)
    ));

    client.close();
    server.join().unwrap();
}

#[test]
fn test_connection_state_display() {
    assert_eq!(ConnectionState::Disconnected.to_string(), "Disconnected");
    assert_eq!(ConnectionState::Connecting.to_string(), "Connecting");
    assert_eq!(ConnectionState::Connected.to_string(), "Connected");
    assert_eq!(ConnectionState::Failed.to_string(), "Failed");
}

#[test]
fn test_receive_loop_state_display() {
    assert_eq!(ReceiveLoopState::Idle.to_string(), "Idle");
    assert_eq!(ReceiveLoopState::Receiving.to_string(), "Receiving");
    assert_eq!(ReceiveLoopState::Stopped.to_string(), "Stopped");
}
