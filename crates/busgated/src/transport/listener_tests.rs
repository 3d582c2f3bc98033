use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use busgate_config::{ReloadInterval, SocketEndpoint};
use rstest::rstest;
use serde_json::{Value, json};

use super::*;
use crate::dispatch::{DispatchConfig, Dispatcher};
use crate::methods::{MethodResolver, builtin_source};
use crate::pool::{PoolConfig, WorkerPool};

#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};

struct CountingHandler {
    count: Arc<AtomicUsize>,
    last_connection: Arc<AtomicU64>,
}

impl ConnectionHandler for CountingHandler {
    fn handle(&self, connection: u64, _stream: ConnectionStream) {
        self.last_connection.fetch_max(connection, Ordering::SeqCst);
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

fn wait_for_count(count: &AtomicUsize, expected: usize) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if count.load(Ordering::SeqCst) >= expected {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

fn line_handler() -> (Arc<Dispatcher<ConnectionSink>>, Arc<dyn ConnectionHandler>) {
    let resolver = Arc::new(MethodResolver::new(builtin_source(), ReloadInterval::Disabled));
    let pool = WorkerPool::start(
        PoolConfig {
            concurrency: NonZeroUsize::new(2).expect("non-zero"),
            max_tasks_per_worker: None,
        },
        resolver,
    )
    .expect("pool starts");
    let sink = Arc::new(ConnectionSink);
    let dispatcher = Arc::new(
        Dispatcher::start(DispatchConfig::default(), Arc::new(pool), Arc::clone(&sink))
            .expect("dispatcher starts"),
    );
    let handler: Arc<dyn ConnectionHandler> =
        Arc::new(LineConnectionHandler::new(Arc::clone(&dispatcher), sink));
    (dispatcher, handler)
}

fn read_reply(reader: &mut impl BufRead) -> Value {
    let mut line = String::new();
    reader.read_line(&mut line).expect("read reply");
    serde_json::from_str(&line).expect("reply is JSON")
}

#[rstest]
fn tcp_listener_accepts_and_numbers_connections() {
    let listener =
        SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", 0)).expect("bind tcp listener");
    let addr = listener.local_addr().expect("listener should report local address");
    let count = Arc::new(AtomicUsize::new(0));
    let last_connection = Arc::new(AtomicU64::new(0));
    let handler = Arc::new(CountingHandler {
        count: Arc::clone(&count),
        last_connection: Arc::clone(&last_connection),
    });
    let handle = listener.start(handler).expect("start listener");

    TcpStream::connect(addr).expect("connect first client");
    TcpStream::connect(addr).expect("connect second client");

    assert!(wait_for_count(&count, 2), "expected two connections");
    assert_eq!(last_connection.load(Ordering::SeqCst), 2);
    handle.shutdown();
    handle.join().expect("join listener");
}

#[rstest]
fn lines_are_dispatched_and_answered_on_the_same_connection() {
    let (dispatcher, handler) = line_handler();
    let listener =
        SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", 0)).expect("bind tcp listener");
    let addr = listener.local_addr().expect("local address");
    let handle = listener.start(handler).expect("start listener");

    let mut client = TcpStream::connect(addr).expect("connect client");
    client
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("read timeout");
    client
        .write_all(
            concat!(
                "{\"jsonrpc\":\"2.0\",\"id\":\"1\",\"method\":\"add\",\"params\":[2,3]}\n",
                "\n",
                "{\"jsonrpc\":\"2.0\",\"method\":\"warnlog\",\"params\":[\"quiet\"]}\n",
                "{\"jsonrpc\":\"2.0\",\"id\":\"2\",\"method\":\"exception\",\"params\":[]}\n",
            )
            .as_bytes(),
        )
        .expect("write requests");

    let mut reader = BufReader::new(client.try_clone().expect("clone client"));
    let mut replies = vec![read_reply(&mut reader), read_reply(&mut reader)];
    replies.sort_by_key(|reply| reply["id"].as_str().map(str::to_owned));

    assert_eq!(replies[0], json!({"jsonrpc": "2.0", "id": "1", "result": 5}));
    assert_eq!(replies[1]["id"], json!("2"));
    assert_eq!(replies[1]["error"]["code"], json!(-32500));

    drop(client);
    handle.shutdown();
    handle.join().expect("join listener");
    dispatcher.stop();
}

#[rstest]
fn refused_requests_are_answered_with_application_errors() {
    let (dispatcher, handler) = line_handler();
    dispatcher.stop();
    let listener =
        SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", 0)).expect("bind tcp listener");
    let addr = listener.local_addr().expect("local address");
    let handle = listener.start(handler).expect("start listener");

    let mut client = TcpStream::connect(addr).expect("connect client");
    client
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("read timeout");
    client
        .write_all(b"{\"id\":9,\"method\":\"echo\",\"params\":[\"x\"]}\n")
        .expect("write request");
    let reply = read_reply(&mut BufReader::new(&client));
    assert_eq!(reply["id"], json!(9));
    assert_eq!(reply["error"]["code"], json!(-32500));
    assert_eq!(reply["error"]["message"], json!("Stopped dispatcher is stopped"));

    handle.shutdown();
    handle.join().expect("join listener");
}

#[cfg(unix)]
#[rstest]
fn unix_listener_cleans_stale_socket_files() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("busgated.sock");
    {
        let _stale = UnixListener::bind(&path).expect("bind stale listener");
    }
    assert!(path.exists(), "stale socket should remain");

    let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path"));
    let listener = SocketListener::bind(&endpoint).expect("bind new listener");
    let count = Arc::new(AtomicUsize::new(0));
    let handler = Arc::new(CountingHandler {
        count: Arc::clone(&count),
        last_connection: Arc::new(AtomicU64::new(0)),
    });
    let handle = listener.start(handler).expect("start listener");

    UnixStream::connect(&path).expect("connect unix client");
    assert!(wait_for_count(&count, 1), "expected one connection");

    handle.shutdown();
    handle.join().expect("join listener");
    assert!(!path.exists(), "listener should remove unix socket on shutdown");
}

#[cfg(unix)]
#[rstest]
fn unix_listener_rejects_in_use_socket() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("busgated.sock");
    let _existing = UnixListener::bind(&path).expect("bind existing listener");

    let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path"));
    let error = SocketListener::bind(&endpoint).expect_err("should fail bind");
    assert!(matches!(error, ListenerError::SocketHeld { .. }));
    assert!(error.to_string().contains("held by a running daemon"));
}

#[cfg(unix)]
#[rstest]
fn unix_listener_refuses_regular_files() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("busgated.sock");
    std::fs::write(&path, b"not a socket").expect("write file");

    let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path"));
    let error = SocketListener::bind(&endpoint).expect_err("should fail bind");
    assert!(matches!(error, ListenerError::NotASocket { .. }));
}

#[rstest]
fn tcp_port_taken_by_another_listener_is_a_bind_error() {
    let taken = TcpListener::bind("127.0.0.1:0").expect("bind first listener");
    let port = taken.local_addr().expect("first listener address").port();

    let error = SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", port))
        .expect_err("port already taken");
    match error {
        ListenerError::Bind { endpoint, .. } => assert_eq!(endpoint, format!("127.0.0.1:{port}")),
        other => panic!("expected a bind error, got {other:?}"),
    }
}
