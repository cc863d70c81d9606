#![allow(clippy::unwrap_used)]

// Integration tests for `Connection` against a scripted fake appliance.
//
// Timer-driven behaviour runs over an in-memory duplex pipe with a paused
// clock; the end-to-end scenarios use a loopback TCP listener.

use std::time::Duration;

use intellicenter_api::message::{GET_PARAM_LIST, NOTIFY_LIST, SET_PARAM_LIST, get_param_list, set_param_list};
use intellicenter_api::{Connection, Error, Message, Notifications, Payload, ProtocolConfig};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_test::{assert_pending, assert_ready, task};

// ── Helpers ─────────────────────────────────────────────────────────

struct FakeAppliance<S> {
    io: BufReader<S>,
}

impl<S> FakeAppliance<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    fn new(io: S) -> Self {
        Self { io: BufReader::new(io) }
    }

    async fn next_request(&mut self) -> Message {
        let mut line = String::new();
        self.io.read_line(&mut line).await.unwrap();
        assert!(line.ends_with("\r\n"), "unterminated frame: {line:?}");
        serde_json::from_str(line.trim_end()).unwrap()
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.io.get_mut().write_all(bytes).await.unwrap();
    }

    async fn reply(&mut self, request: &Message, code: &str, extra: serde_json::Value) {
        let mut body = json!({
            "messageID": request.message_id,
            "command": request.command,
            "response": code,
        });
        if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            body.extend(extra.clone());
        }
        let mut frame = serde_json::to_vec(&body).unwrap();
        frame.extend_from_slice(b"\r\n");
        self.send_raw(&frame).await;
    }
}

fn duplex() -> (Connection, Notifications, FakeAppliance<DuplexStream>) {
    let (client, server) = tokio::io::duplex(256 * 1024);
    let (conn, notes) = Connection::from_stream(client, "fake".into(), ProtocolConfig::default());
    (conn, notes, FakeAppliance::new(server))
}

// ── End-to-end over TCP ─────────────────────────────────────────────

#[tokio::test]
async fn get_param_list_round_trip_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut appliance = FakeAppliance::new(socket);
        let request = appliance.next_request().await;
        assert_eq!(request.message_id, "1");
        assert_eq!(request.command, GET_PARAM_LIST);
        appliance
            .send_raw(b"{\"messageID\":\"1\",\"command\":\"GetParamList\",\"response\":\"200\",\"objectList\":[]}\r\n")
            .await;
        appliance
    });

    let (conn, _notes) = Connection::connect(&addr, ProtocolConfig::default(), Duration::from_secs(5))
        .await
        .unwrap();
    let handle = conn
        .request(GET_PARAM_LIST, get_param_list("", &["SNAME".to_owned()]))
        .unwrap();
    assert_eq!(handle.id(), "1");

    let reply = handle.response().await.unwrap();
    assert_eq!(reply.response.as_deref(), Some("200"));
    assert_eq!(reply.payload.get("objectList"), Some(&json!([])));

    let _appliance = server.await.unwrap();
    conn.close().await;
    assert!(conn.is_closed());
}

#[tokio::test]
async fn connect_refused_is_a_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let err = Connection::connect(&addr, ProtocolConfig::default(), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Connect { .. }), "got {err:?}");
}

// ── Dispatch ────────────────────────────────────────────────────────

#[tokio::test]
async fn notification_is_forwarded() {
    let (_conn, mut notes, mut appliance) = duplex();

    appliance
        .send_raw(b"{\"messageID\":\"9\",\"command\":\"NotifyList\",\"objectList\":[{\"objnam\":\"CIRC01\",\"params\":{\"STATUS\":\"ON\"}}]}\r\n")
        .await;

    let note = notes.recv().await.unwrap();
    assert_eq!(note.command, NOTIFY_LIST);
    let list = note.object_list().unwrap();
    assert_eq!(list[0].objnam, "CIRC01");
    assert_eq!(list[0].params["STATUS"], "ON");
}

#[tokio::test]
async fn non_success_code_is_a_command_error() {
    let (conn, _notes, mut appliance) = duplex();
    let handle = conn
        .request(SET_PARAM_LIST, set_param_list("CIRC01", [("STATUS", "ON")]))
        .unwrap();

    let request = appliance.next_request().await;
    assert_eq!(request.command, SET_PARAM_LIST);
    appliance.reply(&request, "400", json!({})).await;

    let err = handle.response().await.unwrap_err();
    assert_eq!(err.response_code(), Some("400"));
    assert!(!conn.is_closed());
}

#[tokio::test]
async fn bad_json_is_dropped_and_session_survives() {
    let (conn, _notes, mut appliance) = duplex();
    let handle = conn.request(GET_PARAM_LIST, Payload::new()).unwrap();
    let request = appliance.next_request().await;

    appliance.send_raw(b"{not json\r\n").await;
    appliance.send_raw(b"{\"command\":\"NotifyList\"}\r\n").await;
    appliance.reply(&request, "200", json!({})).await;

    assert!(handle.response().await.is_ok());
    assert!(!conn.is_closed());
}

#[tokio::test]
async fn orphan_response_still_releases_next_request() {
    let (conn, _notes, mut appliance) = duplex();
    let first = conn.request(GET_PARAM_LIST, Payload::new()).unwrap();
    let second = conn.request(GET_PARAM_LIST, Payload::new()).unwrap();

    let request = appliance.next_request().await;
    assert_eq!(request.message_id, "1");

    // Error reply with an id that matches nothing.
    appliance
        .send_raw(b"{\"messageID\":\"77\",\"command\":\"GetParamList\",\"response\":\"400\"}\r\n")
        .await;

    let next = appliance.next_request().await;
    assert_eq!(next.message_id, "2");
    appliance.reply(&next, "200", json!({})).await;
    assert!(second.response().await.is_ok());

    // The unmatched request is still waiting.
    let mut first = task::spawn(first.response());
    assert_pending!(first.poll());
    conn.shutdown("test");
    assert!(matches!(assert_ready!(first.poll()), Err(Error::Cancelled)));
}

#[tokio::test]
async fn invalid_utf8_closes_and_fails_pending() {
    let (conn, _notes, mut appliance) = duplex();
    let handle = conn.request(GET_PARAM_LIST, Payload::new()).unwrap();

    appliance.send_raw(b"\xff\xfe\xfd\r\n").await;

    conn.closed().await;
    assert_eq!(conn.close_reason().as_deref(), Some("framing error"));
    assert!(matches!(handle.response().await, Err(Error::Cancelled)));
}

#[tokio::test]
async fn dropped_notification_receiver_is_fatal() {
    let (conn, notes, mut appliance) = duplex();
    drop(notes);

    appliance
        .send_raw(b"{\"messageID\":\"5\",\"command\":\"NotifyList\",\"objectList\":[]}\r\n")
        .await;

    conn.closed().await;
    assert_eq!(conn.close_reason().as_deref(), Some("dispatch error"));
}

#[tokio::test]
async fn teardown_resolves_every_outstanding_request() {
    let (conn, _notes, _appliance) = duplex();
    let handles: Vec<_> = (0..10)
        .map(|_| conn.request(GET_PARAM_LIST, Payload::new()).unwrap())
        .collect();
    assert_eq!(conn.pending_requests(), 10);

    conn.close().await;

    for handle in handles {
        assert!(matches!(handle.response().await, Err(Error::Cancelled)));
    }
    assert_eq!(conn.pending_requests(), 0);
}

// ── Monitor (paused clock) ──────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn keepalive_sent_after_quiet_interval() {
    let start = Instant::now();
    let (_conn, _notes, mut appliance) = duplex();

    let keepalive = appliance.next_request().await;
    let waited = start.elapsed();

    assert!(waited > Duration::from_secs(90), "keepalive after {waited:?}");
    assert!(waited <= Duration::from_secs(120), "keepalive after {waited:?}");
    assert_eq!(keepalive.message_id, "1");
    assert_eq!(keepalive.command, GET_PARAM_LIST);
    assert_eq!(keepalive.payload["condition"], "OBJTYP=SYSTEM");
    assert_eq!(keepalive.payload["objectList"], json!([{ "objnam": "INCR", "keys": ["MODE"] }]));
}

#[tokio::test(start_paused = true)]
async fn stalled_flow_fails_pending_and_recovers() {
    let start = Instant::now();
    let (conn, _notes, mut appliance) = duplex();
    let stuck = conn.request(GET_PARAM_LIST, Payload::new()).unwrap();
    let queued = conn.request(GET_PARAM_LIST, Payload::new()).unwrap();
    assert_eq!(appliance.next_request().await.message_id, "1");

    assert!(matches!(stuck.response().await, Err(Error::FlowStalled)));
    assert!(matches!(queued.response().await, Err(Error::FlowStalled)));
    assert!(start.elapsed() > Duration::from_secs(45));
    assert!(!conn.is_closed());

    // Throughput restored: a new request goes straight to the wire.
    let fresh = conn.request(GET_PARAM_LIST, Payload::new()).unwrap();
    let request = appliance.next_request().await;
    assert_eq!(request.message_id, fresh.id());
    appliance.reply(&request, "200", json!({})).await;
    assert!(fresh.response().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn silent_peer_hits_idle_timeout() {
    let start = Instant::now();
    let (conn, _notes, _appliance) = duplex();

    conn.closed().await;

    assert!(start.elapsed() > Duration::from_secs(300));
    assert_eq!(conn.close_reason().as_deref(), Some("idle timeout"));
}

#[tokio::test(start_paused = true)]
async fn inbound_traffic_defers_idle_timeout() {
    let start = Instant::now();
    let (conn, _notes, mut appliance) = duplex();

    tokio::time::sleep(Duration::from_secs(200)).await;
    appliance
        .send_raw(b"{\"messageID\":\"1\",\"command\":\"NotifyList\",\"objectList\":[]}\r\n")
        .await;

    conn.closed().await;
    assert!(start.elapsed() > Duration::from_secs(500));
}
