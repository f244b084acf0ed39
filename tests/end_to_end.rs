//! End-to-end tests: a real coordinator on a loopback port, real worker
//! agents and raw WebSocket clients.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use cc_miner::agent::{Agent, Rig};
use cc_miner::app_state::AppState;
use cc_miner::config::{CoordinatorConfig, WorkerConfig};
use cc_miner::protocol::WorkerId;
use cc_miner::server::build_app;
use cc_miner::turtle::Location;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_coordinator() -> SocketAddr {
    let config = CoordinatorConfig {
        command_timeout: Duration::from_secs(2),
        register_timeout: Duration::from_millis(200),
        ..CoordinatorConfig::default()
    };
    let app = build_app(AppState::new(&config));
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn spawn_agent(
    addr: SocketAddr,
    id: WorkerId,
    rig: &Rig,
) -> tokio::task::JoinHandle<Result<(), cc_miner::error::AgentError>> {
    let config = WorkerConfig::new(format!("ws://{addr}/ws"), id);
    let agent = Agent::with_rig(config, rig);
    tokio::spawn(async move { agent.run().await })
}

async fn wait_for_worker(client: &reqwest::Client, addr: SocketAddr, id: &str) {
    for _ in 0..100 {
        let url = format!("http://{addr}/api/v1/workers/{id}");
        if let Ok(resp) = client.get(url).send().await
            && resp.status() == reqwest::StatusCode::OK
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("worker {id} never registered");
}

async fn post(client: &reqwest::Client, url: String, body: Value) -> (u16, Value) {
    let Ok(resp) = client.post(url).json(&body).send().await else {
        panic!("request failed");
    };
    let status = resp.status().as_u16();
    let body = resp.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

async fn connect(addr: SocketAddr, path: &str) -> Socket {
    let Ok((socket, _)) = connect_async(format!("ws://{addr}{path}")).await else {
        panic!("connect to {path} failed");
    };
    socket
}

async fn recv_json(socket: &mut Socket) -> Value {
    let next = tokio::time::timeout(Duration::from_secs(2), socket.next()).await;
    match next {
        Ok(Some(Ok(Message::Text(text)))) => {
            serde_json::from_str(text.as_str()).unwrap_or(Value::Null)
        }
        other => panic!("expected a text frame, got {other:?}"),
    }
}

async fn send_json(socket: &mut Socket, value: Value) {
    tokio_test::assert_ok!(socket.send(Message::text(value.to_string())).await);
}

#[tokio::test]
async fn command_round_trip_through_real_agent() {
    let addr = start_coordinator().await;
    let client = reqwest::Client::new();
    let rig = Rig::new(10);
    let _agent = spawn_agent(addr, WorkerId::Number(7), &rig);
    wait_for_worker(&client, addr, "7").await;

    let url = format!("http://{addr}/api/v1/workers/7/commands");
    let (status, body) = post(&client, url.clone(), json!({"command": "return true, 7"})).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"worker_id": 7, "status": true, "data": 7}));

    let (status, body) = post(&client, url.clone(), json!({"command": "return id()"})).await;
    assert_eq!(status, 200);
    assert_eq!(body.get("data"), Some(&json!(7)));

    let (status, body) = post(&client, url, json!({"command": "return ("})).await;
    assert_eq!(status, 200);
    assert_eq!(body.get("status"), Some(&json!(false)));
}

#[tokio::test]
async fn coordinator_model_follows_rig() {
    let addr = start_coordinator().await;
    let client = reqwest::Client::new();
    let rig = Rig::new(1);
    let _agent = spawn_agent(addr, WorkerId::from("digger"), &rig);
    wait_for_worker(&client, addr, "digger").await;

    let url = format!("http://{addr}/api/v1/workers/digger/move");
    let (status, body) = post(&client, url.clone(), json!({"direction": "forward"})).await;
    assert_eq!(status, 200);
    let location = body.get("position").and_then(|p| p.get("location"));
    assert_eq!(location, Some(&json!({"x": 0, "y": 0, "z": -1})));
    assert_eq!(
        rig.position().ok().map(|p| p.location),
        Some(Location::new(0, 0, -1))
    );

    // One unit of fuel is gone now.
    let (status, body) = post(&client, url, json!({"direction": "forward"})).await;
    assert_eq!(status, 422);
    let details = body.get("error").and_then(|e| e.get("details"));
    assert_eq!(details, Some(&json!("Out of fuel")));
    assert_eq!(
        rig.position().ok().map(|p| p.location),
        Some(Location::new(0, 0, -1))
    );
}

#[tokio::test]
async fn newest_registration_wins_and_gets_each_command_once() {
    let addr = start_coordinator().await;
    let client = reqwest::Client::new();
    let rig = Rig::new(0);
    let agent = spawn_agent(addr, WorkerId::Number(3), &rig);
    wait_for_worker(&client, addr, "3").await;

    let mut raw = connect(addr, "/ws").await;
    send_json(&mut raw, json!({"type": "register", "id": 3})).await;

    // The replaced agent's session is closed and, without reconnect, it stops.
    let Ok(Ok(result)) = tokio::time::timeout(Duration::from_secs(2), agent).await else {
        panic!("replaced agent did not stop");
    };
    tokio_test::assert_ok!(result);

    let url = format!("http://{addr}/api/v1/workers/3/commands");
    let request = tokio::spawn({
        let client = client.clone();
        async move { post(&client, url, json!({"command": "return 'ore'"})).await }
    });

    assert_eq!(
        recv_json(&mut raw).await,
        json!({"type": "command", "command": "return 'ore'"})
    );
    send_json(&mut raw, json!({"type": "status", "status": true, "data": "ore"})).await;

    let Ok((status, body)) = request.await else {
        panic!("request task failed");
    };
    assert_eq!(status, 200);
    assert_eq!(body.get("data"), Some(&json!("ore")));

    let extra = tokio::time::timeout(Duration::from_millis(100), raw.next()).await;
    assert!(extra.is_err(), "command delivered more than once");
}

#[tokio::test]
async fn unsolicited_status_is_ignored() {
    let addr = start_coordinator().await;
    let client = reqwest::Client::new();
    let mut raw = connect(addr, "/ws").await;
    send_json(&mut raw, json!({"type": "register", "id": "stray"})).await;
    wait_for_worker(&client, addr, "stray").await;

    send_json(&mut raw, json!({"type": "status", "status": true, "data": 1})).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let url = format!("http://{addr}/api/v1/workers/stray/commands");
    let request = tokio::spawn({
        let client = client.clone();
        async move { post(&client, url, json!({"command": "return 2"})).await }
    });
    let _ = recv_json(&mut raw).await;
    send_json(&mut raw, json!({"type": "status", "status": true, "data": 2})).await;

    let Ok((_, body)) = request.await else {
        panic!("request task failed");
    };
    assert_eq!(body.get("data"), Some(&json!(2)));
}

#[tokio::test]
async fn silent_socket_is_closed_after_register_timeout() {
    let addr = start_coordinator().await;
    let mut raw = connect(addr, "/ws").await;
    let next = tokio::time::timeout(Duration::from_secs(2), raw.next()).await;
    let Ok(frame) = next else {
        panic!("coordinator kept an unregistered socket open");
    };
    assert!(matches!(frame, None | Some(Ok(Message::Close(_)) | Err(_))));
}

#[tokio::test]
async fn wildcard_identity_is_refused() {
    let addr = start_coordinator().await;
    let client = reqwest::Client::new();
    let mut raw = connect(addr, "/ws").await;
    send_json(&mut raw, json!({"type": "register", "id": "*"})).await;

    let next = tokio::time::timeout(Duration::from_secs(2), raw.next()).await;
    let Ok(frame) = next else {
        panic!("coordinator kept a wildcard registration open");
    };
    assert!(matches!(frame, None | Some(Ok(Message::Close(_)) | Err(_))));

    let Ok(resp) = client.get(format!("http://{addr}/api/v1/workers")).send().await else {
        panic!("list request failed");
    };
    let body = resp.json::<Value>().await.unwrap_or(Value::Null);
    assert_eq!(body.get("data"), Some(&json!([])));
}

#[tokio::test]
async fn echo_doubles_text() {
    let addr = start_coordinator().await;
    let mut socket = connect(addr, "/echo").await;
    tokio_test::assert_ok!(socket.send(Message::text("abc")).await);
    let next = tokio::time::timeout(Duration::from_secs(2), socket.next()).await;
    let Ok(Some(Ok(Message::Text(text)))) = next else {
        panic!("no echo");
    };
    assert_eq!(text.as_str(), "abcabc");
}

#[tokio::test]
async fn observer_sees_subscribed_worker_only() {
    let addr = start_coordinator().await;
    let mut observer = connect(addr, "/events").await;
    send_json(
        &mut observer,
        json!({"id": "s1", "type": "command", "payload": {"command": "subscribe", "worker_ids": ["watched"]}}),
    )
    .await;
    let ack = recv_json(&mut observer).await;
    assert_eq!(ack.get("type"), Some(&json!("response")));

    let rig = Rig::new(0);
    let _ignored = spawn_agent(addr, WorkerId::from("ignored"), &rig);
    let _watched = spawn_agent(addr, WorkerId::from("watched"), &rig);

    let event = recv_json(&mut observer).await;
    assert_eq!(event.get("type"), Some(&json!("event")));
    let payload = event.get("payload").cloned().unwrap_or(Value::Null);
    assert_eq!(payload.get("event_type"), Some(&json!("worker_registered")));
    assert_eq!(payload.get("worker_id"), Some(&json!("watched")));
}
