//! Observer connection loop for `/events`.
//!
//! Reads subscription commands from the client and forwards matching
//! [`WorkerEvent`]s from the event bus.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{ObserverCommand, ObserverMessage, ObserverMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::WorkerEvent;
use crate::service::WorkerService;

/// Runs the read/write loop for a single observer connection.
pub async fn run_observer(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<WorkerEvent>,
    service: Arc<WorkerService>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(text.as_str(), &mut subs, &service).await;
                        if ws_tx.send(Message::text(response.to_text())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(worker_event) => {
                        if subs.matches(worker_event.worker_id()) {
                            let payload = serde_json::to_value(&worker_event).unwrap_or_default();
                            let msg = ObserverMessage::event(payload);
                            if ws_tx.send(Message::text(msg.to_text())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "observer lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("observer connection closed");
}

/// Handles one client frame and builds the reply.
pub async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    service: &WorkerService,
) -> ObserverMessage {
    let Ok(msg) = serde_json::from_str::<ObserverMessage>(text) else {
        return ObserverMessage::error(String::new(), 400, "malformed JSON");
    };
    if msg.msg_type != ObserverMessageType::Command {
        return ObserverMessage::error(msg.id, 400, "expected a command message");
    }
    let Ok(command) = serde_json::from_value::<ObserverCommand>(msg.payload) else {
        return ObserverMessage::error(msg.id, 404, "unknown command");
    };

    match command {
        ObserverCommand::Subscribe { worker_ids } => {
            subs.subscribe(&worker_ids);
            ObserverMessage::response(
                msg.id,
                serde_json::json!({
                    "subscribed": worker_ids,
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        ObserverCommand::Unsubscribe { worker_ids } => {
            subs.unsubscribe(&worker_ids);
            ObserverMessage::response(
                msg.id,
                serde_json::json!({
                    "unsubscribed": worker_ids,
                    "remaining_count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        ObserverCommand::ListWorkers => {
            let workers = service.list_workers().await;
            ObserverMessage::response(msg.id, serde_json::json!({ "workers": workers }))
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::domain::{EventBus, WorkerRegistry};
    use crate::protocol::WorkerId;

    fn service() -> WorkerService {
        WorkerService::new(
            Arc::new(WorkerRegistry::new()),
            EventBus::new(16),
            Duration::from_secs(1),
            4,
        )
    }

    #[tokio::test]
    async fn subscribe_updates_filter() {
        let service = service();
        let mut subs = SubscriptionManager::new();
        let text = r#"{"id":"1","type":"command","payload":{"command":"subscribe","worker_ids":[5,"miner"]}}"#;

        let reply = handle_text_message(text, &mut subs, &service).await;
        assert_eq!(reply.msg_type, ObserverMessageType::Response);
        assert_eq!(reply.id, "1");
        assert_eq!(reply.payload.get("count"), Some(&json!(2)));
        assert!(subs.matches(&WorkerId::Number(5)));
        assert!(subs.matches(&WorkerId::from("miner")));
        assert!(!subs.matches(&WorkerId::Number(6)));
    }

    #[tokio::test]
    async fn unsubscribe_wildcard() {
        let service = service();
        let mut subs = SubscriptionManager::new();
        subs.subscribe(&[WorkerId::from("*")]);
        let text = r#"{"type":"command","payload":{"command":"unsubscribe","worker_ids":["*"]}}"#;

        let reply = handle_text_message(text, &mut subs, &service).await;
        assert_eq!(reply.payload.get("wildcard"), Some(&json!(false)));
        assert!(!subs.matches(&WorkerId::Number(1)));
    }

    #[tokio::test]
    async fn list_workers_reports_registry() {
        let service = service();
        let (_, _queue) = service.open_session(WorkerId::Number(3)).await;
        let mut subs = SubscriptionManager::new();
        let text = r#"{"type":"command","payload":{"command":"list_workers"}}"#;

        let reply = handle_text_message(text, &mut subs, &service).await;
        let workers = reply
            .payload
            .get("workers")
            .and_then(serde_json::Value::as_array)
            .map(Vec::len);
        assert_eq!(workers, Some(1));
    }

    #[tokio::test]
    async fn bad_frames_get_errors() {
        let service = service();
        let mut subs = SubscriptionManager::new();

        let malformed = handle_text_message("{oops", &mut subs, &service).await;
        assert_eq!(malformed.msg_type, ObserverMessageType::Error);
        assert_eq!(malformed.payload.get("code"), Some(&json!(400)));

        let unknown = r#"{"type":"command","payload":{"command":"swap"}}"#;
        let reply = handle_text_message(unknown, &mut subs, &service).await;
        assert_eq!(reply.payload.get("code"), Some(&json!(404)));
    }
}
