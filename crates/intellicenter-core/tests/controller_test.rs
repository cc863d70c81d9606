#![allow(clippy::unwrap_used)]

// Integration tests for `Controller` and `Supervisor` against a fake
// appliance listening on loopback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use intellicenter_api::Message;
use intellicenter_api::message::{GET_PARAM_LIST, NOTIFY_LIST, REQUEST_PARAM_LIST, SET_PARAM_LIST};
use intellicenter_core::{
    ConnectionState, Controller, ControllerConfig, CoreError, LifecycleEvent, ReconnectConfig, Supervisor,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(5);

// ── Fake appliance ──────────────────────────────────────────────────

enum Control {
    Push(Value),
    Hangup,
}

struct Appliance {
    port: u16,
    control: mpsc::UnboundedSender<Control>,
    requests: mpsc::UnboundedReceiver<Message>,
    hangup_after_subscribe: Arc<AtomicBool>,
}

impl Appliance {
    async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (control, mut control_rx) = mpsc::unbounded_channel();
        let (requests_tx, requests) = mpsc::unbounded_channel();
        let hangup_after_subscribe = Arc::new(AtomicBool::new(false));

        let hangup_flag = Arc::clone(&hangup_after_subscribe);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                if !serve(socket, &mut control_rx, &requests_tx, &hangup_flag).await {
                    break;
                }
            }
        });

        Self {
            port,
            control,
            requests,
            hangup_after_subscribe,
        }
    }

    /// Drop the next session right after answering its final
    /// subscription request. Later sessions are served normally.
    fn hangup_after_subscribe(&self) {
        self.hangup_after_subscribe.store(true, Ordering::SeqCst);
    }

    fn config(&self) -> ControllerConfig {
        ControllerConfig {
            port: self.port,
            ..ControllerConfig::new("127.0.0.1")
        }
    }

    fn push(&self, object_list: Value) {
        let frame = json!({ "command": NOTIFY_LIST, "messageID": "push", "objectList": object_list });
        self.control.send(Control::Push(frame)).unwrap();
    }

    fn hangup(&self) {
        self.control.send(Control::Hangup).unwrap();
    }

    async fn next_request(&mut self) -> Message {
        tokio::time::timeout(WAIT, self.requests.recv()).await.unwrap().unwrap()
    }

    fn drain_requests(&mut self) -> Vec<Message> {
        std::iter::from_fn(|| self.requests.try_recv().ok()).collect()
    }
}

fn system_entry() -> Value {
    json!({
        "objnam": "_5451",
        "params": { "OBJTYP": "SYSTEM", "PROPNAME": "Backyard", "VER": "1.064", "MODE": "ENGLISH", "SNAME": "IntelliCenter" }
    })
}

fn all_objects() -> Value {
    json!([
        system_entry(),
        { "objnam": "CIRC01", "params": { "OBJTYP": "CIRCUIT", "SUBTYP": "INTELLI", "SNAME": "Pool Light", "STATUS": "OFF", "FEATR": "FEATR" } },
        { "objnam": "B1101", "params": { "OBJTYP": "BODY", "SUBTYP": "POOL", "SNAME": "Pool", "TEMP": "78", "LOTMP": "LOTMP" } },
        { "objnam": "REM01", "params": { "OBJTYP": "REMOTE", "SNAME": "Remote" } }
    ])
}

/// Serve one connection. Returns `false` once the test side is gone.
async fn serve(
    socket: tokio::net::TcpStream,
    control: &mut mpsc::UnboundedReceiver<Control>,
    requests: &mpsc::UnboundedSender<Message>,
    hangup_after_subscribe: &AtomicBool,
) -> bool {
    let (read, mut write) = socket.into_split();
    let mut lines = BufReader::new(read).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { return true };
                let request: Message = serde_json::from_str(&line).unwrap();
                let _ = requests.send(request.clone());
                answer(&mut write, &request).await;
                if is_final_subscription(&request) && hangup_after_subscribe.swap(false, Ordering::SeqCst) {
                    return true;
                }
            }
            control = control.recv() => match control {
                Some(Control::Push(frame)) => write_frame(&mut write, &frame).await,
                Some(Control::Hangup) => return true,
                None => return false,
            },
        }
    }
}

/// Subscriptions follow model order, so the batch naming the last tracked
/// object is the final one.
fn is_final_subscription(request: &Message) -> bool {
    request.command == REQUEST_PARAM_LIST
        && request.payload["objectList"]
            .as_array()
            .is_some_and(|list| list.iter().any(|q| q["objnam"] == "B1101"))
}

async fn answer(write: &mut OwnedWriteHalf, request: &Message) {
    let mut reply = json!({
        "messageID": request.message_id,
        "command": request.command,
        "response": "200",
    });

    match request.command.as_str() {
        GET_PARAM_LIST => {
            let condition = request.payload.get("condition").and_then(Value::as_str).unwrap_or("");
            reply["objectList"] = if condition == "OBJTYP=SYSTEM" {
                json!([system_entry()])
            } else {
                all_objects()
            };
        }
        REQUEST_PARAM_LIST => {
            let wanted: Vec<&str> = request.payload["objectList"]
                .as_array()
                .unwrap()
                .iter()
                .filter_map(|q| q["objnam"].as_str())
                .collect();
            let list: Vec<Value> = all_objects()
                .as_array()
                .unwrap()
                .iter()
                .filter(|e| e["objnam"].as_str().is_some_and(|n| wanted.contains(&n)))
                .cloned()
                .collect();
            reply["objectList"] = Value::Array(list);
        }
        SET_PARAM_LIST => {
            write_frame(write, &reply).await;
            let echo = json!({
                "command": NOTIFY_LIST,
                "messageID": "echo",
                "objectList": request.payload["objectList"],
            });
            write_frame(write, &echo).await;
            return;
        }
        _ => {}
    }
    write_frame(write, &reply).await;
}

async fn write_frame(write: &mut OwnedWriteHalf, frame: &Value) {
    let mut bytes = serde_json::to_vec(frame).unwrap();
    bytes.extend_from_slice(b"\r\n");
    let _ = write.write_all(&bytes).await;
}

async fn wait_for_state(controller: &Controller, wanted: ConnectionState) {
    let mut rx = controller.connection_state();
    tokio::time::timeout(WAIT, rx.wait_for(|s| *s == wanted))
        .await
        .unwrap()
        .unwrap();
}

// ── Controller ──────────────────────────────────────────────────────

#[tokio::test]
async fn start_loads_model_and_system_info() {
    let mut appliance = Appliance::spawn().await;
    let controller = Controller::new(appliance.config());

    controller.start().await.unwrap();
    assert_eq!(controller.state(), ConnectionState::Connected);

    let model = controller.model();
    assert_eq!(model.len(), 3, "REMOTE is not tracked");
    let light = model.get("CIRC01").unwrap();
    assert_eq!(light.status(), Some("OFF"));
    assert!(light.is_a_light());
    assert_eq!(
        model.get("B1101").unwrap().attributes().get("LOTMP"),
        None,
        "undefined echo is pruned"
    );

    let system = controller.system_info().unwrap();
    assert_eq!(system.prop_name, "Backyard");
    assert_eq!(system.sw_version, "1.064");
    assert!(!system.uses_metric);
    assert_eq!(system.unique_id.len(), 16);

    let requests = appliance.drain_requests();
    let commands: Vec<&str> = requests.iter().map(|m| m.command.as_str()).collect();
    assert_eq!(&commands[..2], [GET_PARAM_LIST, GET_PARAM_LIST]);
    assert!(commands[2..].iter().all(|c| *c == REQUEST_PARAM_LIST));
    let ids: Vec<&str> = requests.iter().map(|m| m.message_id.as_str()).collect();
    let expected: Vec<String> = (1..=requests.len()).map(|i| i.to_string()).collect();
    assert_eq!(ids, expected);

    controller.stop().await;
}

#[tokio::test]
async fn notification_updates_model_and_fires_event() {
    let appliance = Appliance::spawn().await;
    let controller = Controller::new(appliance.config());
    controller.start().await.unwrap();
    let mut updates = controller.updates();

    appliance.push(json!([{ "objnam": "CIRC01", "params": { "STATUS": "ON" } }]));

    let update = tokio::time::timeout(WAIT, updates.recv()).await.unwrap().unwrap();
    assert_eq!(update.changes.len(), 1);
    assert_eq!(update.changes["CIRC01"]["STATUS"], "ON");
    assert!(controller.model().get("CIRC01").unwrap().is_on());

    controller.stop().await;
}

#[tokio::test]
async fn request_changes_reflects_only_after_echo() {
    let mut appliance = Appliance::spawn().await;
    let controller = Controller::new(appliance.config());
    controller.start().await.unwrap();
    appliance.drain_requests();
    let mut updates = controller.updates();

    controller.request_changes("CIRC01", &[("STATUS", "ON")]).unwrap();

    let sent = appliance.next_request().await;
    assert_eq!(sent.command, SET_PARAM_LIST);
    assert_eq!(sent.payload["objectList"][0]["params"]["STATUS"], "ON");

    let update = tokio::time::timeout(WAIT, updates.recv()).await.unwrap().unwrap();
    assert_eq!(update.changes["CIRC01"]["STATUS"], "ON");

    controller
        .request_changes_and_wait("CIRC01", &[("STATUS", "OFF")])
        .await
        .unwrap();
    controller.stop().await;
}

#[tokio::test]
async fn lost_connection_marks_disconnected() {
    let appliance = Appliance::spawn().await;
    let controller = Controller::new(appliance.config());
    controller.start().await.unwrap();

    appliance.hangup();
    wait_for_state(&controller, ConnectionState::Disconnected).await;

    let err = controller.get_all_objects(&[]).await.unwrap_err();
    assert!(matches!(err, CoreError::ControllerDisconnected));
}

#[tokio::test]
async fn message_ids_restart_on_new_connection() {
    let mut appliance = Appliance::spawn().await;
    let controller = Controller::new(appliance.config());

    controller.start().await.unwrap();
    appliance.drain_requests();
    controller.stop().await;
    assert_eq!(controller.state(), ConnectionState::Disconnected);

    controller.start().await.unwrap();
    let first = appliance.drain_requests().into_iter().next().unwrap();
    assert_eq!(first.message_id, "1");
    controller.stop().await;
}

#[tokio::test]
async fn start_against_closed_port_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let controller = Controller::new(ControllerConfig {
        port,
        ..ControllerConfig::new("127.0.0.1")
    });
    let err = controller.start().await.unwrap_err();
    assert!(err.is_transient(), "unexpected error: {err}");
    assert_eq!(controller.state(), ConnectionState::Failed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hangup_right_after_bootstrap_never_reports_connected() {
    for _ in 0..50 {
        let appliance = Appliance::spawn().await;
        appliance.hangup_after_subscribe();
        let controller = Controller::new(appliance.config());

        controller.start().await.unwrap();
        wait_for_state(&controller, ConnectionState::Disconnected).await;
        assert!(!controller.is_connected());
        assert!(controller.get_all_objects(&[]).await.is_err());
    }
}

// ── Supervisor ──────────────────────────────────────────────────────

#[tokio::test]
async fn supervisor_reconnects_after_drop() {
    let appliance = Appliance::spawn().await;
    let config = appliance.config();
    let supervisor = Supervisor::new(
        Controller::new(config),
        ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            ..ReconnectConfig::default()
        },
    );
    let mut events = supervisor.events();

    supervisor.start().await;
    let started = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(started, LifecycleEvent::Started);

    appliance.hangup();
    let next = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(next, LifecycleEvent::Reconnected);
    assert!(supervisor.connector().is_connected());
    assert_eq!(supervisor.connector().model().len(), 3);

    supervisor.stop().await;
    assert_eq!(supervisor.connector().state(), ConnectionState::Disconnected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn supervisor_recovers_from_hangup_during_bootstrap() {
    let appliance = Appliance::spawn().await;
    appliance.hangup_after_subscribe();
    let supervisor = Supervisor::new(
        Controller::new(appliance.config()),
        ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            ..ReconnectConfig::default()
        },
    );
    let mut events = supervisor.events();

    supervisor.start().await;
    let started = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(started, LifecycleEvent::Started);
    let next = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(next, LifecycleEvent::Reconnected);
    assert!(supervisor.connector().is_connected());

    supervisor.stop().await;
}
