//! Coordinator side of a worker session on `/ws`.
//!
//! The first frame must be a `register` envelope. After that the loop
//! takes one command from the session queue, sends it, and takes no
//! other command until the worker's `status` arrives, so every status
//! pairs with exactly one command.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::oneshot;

use crate::protocol::{Envelope, ExecutionResult, WorkerId};
use crate::service::WorkerService;

/// The command the worker is currently running.
#[derive(Debug)]
struct InFlight {
    reply: oneshot::Sender<ExecutionResult>,
    sent_at: Instant,
}

/// Runs one worker session until either side closes it.
pub async fn run_worker_connection(
    socket: WebSocket,
    service: Arc<WorkerService>,
    register_timeout: Duration,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let Some(worker_id) = await_registration(&mut ws_rx, register_timeout).await else {
        let _ = ws_tx.send(Message::Close(None)).await;
        return;
    };
    let (session_id, mut queue) = service.open_session(worker_id.clone()).await;
    let mut in_flight: Option<InFlight> = None;

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        on_frame(text.as_str(), &worker_id, &mut in_flight);
                    }
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => on_frame(text, &worker_id, &mut in_flight),
                        Err(_) => tracing::warn!(worker = %worker_id, "non UTF-8 binary frame dropped"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::warn!(worker = %worker_id, error = %err, "worker socket failed");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
            pending = queue.recv(), if in_flight.is_none() => {
                let Some(pending) = pending else {
                    // Replaced by a newer session or kicked.
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                };
                if pending.reply.is_closed() {
                    tracing::debug!(worker = %worker_id, "caller gave up before dispatch");
                    continue;
                }
                let text = match Envelope::command(pending.command).encode() {
                    Ok(text) => text,
                    Err(err) => {
                        let _ = pending.reply.send(ExecutionResult::error(err.to_string()));
                        continue;
                    }
                };
                if ws_tx.send(Message::text(text)).await.is_err() {
                    break;
                }
                in_flight = Some(InFlight {
                    reply: pending.reply,
                    sent_at: Instant::now(),
                });
            }
        }
    }

    // Dropping the in-flight reply and the queue tells waiting callers the
    // worker is gone.
    drop(in_flight);
    drop(queue);
    service.close_session(&worker_id, session_id).await;
}

/// Waits for the `register` envelope.
async fn await_registration(
    ws_rx: &mut SplitStream<WebSocket>,
    limit: Duration,
) -> Option<WorkerId> {
    let first = tokio::time::timeout(limit, async {
        loop {
            match ws_rx.next().await {
                Some(Ok(Message::Text(text))) => return Some(text.as_str().to_owned()),
                Some(Ok(Message::Binary(bytes))) => return String::from_utf8(bytes.to_vec()).ok(),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                _ => return None,
            }
        }
    })
    .await;

    let text = match first {
        Ok(Some(text)) => text,
        Ok(None) => {
            tracing::debug!("socket closed before registration");
            return None;
        }
        Err(_) => {
            let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
            tracing::warn!(timeout_ms, "no registration received");
            return None;
        }
    };

    match Envelope::decode(&text) {
        Ok(Envelope::Register { id }) if id.is_wildcard() => {
            tracing::warn!(%id, "reserved identity refused");
            None
        }
        Ok(Envelope::Register { id }) => Some(id),
        Ok(other) => {
            tracing::warn!(kind = other.type_str(), "expected register as first message");
            None
        }
        Err(err) => {
            tracing::warn!(error = %err, "malformed registration");
            None
        }
    }
}

fn on_frame(text: &str, worker_id: &WorkerId, in_flight: &mut Option<InFlight>) {
    match Envelope::decode(text) {
        Ok(Envelope::Status { status, data }) => {
            let Some(flight) = in_flight.take() else {
                tracing::warn!(worker = %worker_id, status, "unsolicited status dropped");
                return;
            };
            let elapsed = flight.sent_at.elapsed();
            let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
            tracing::debug!(worker = %worker_id, status, elapsed_ms, "status received");
            if flight
                .reply
                .send(ExecutionResult::from_status(status, data))
                .is_err()
            {
                tracing::debug!(worker = %worker_id, "late status discarded");
            }
        }
        Ok(Envelope::Register { id }) => {
            tracing::warn!(worker = %worker_id, %id, "register ignored mid-session");
        }
        Ok(other) => {
            tracing::debug!(worker = %worker_id, kind = other.type_str(), "ignoring envelope");
        }
        Err(err) => {
            tracing::warn!(worker = %worker_id, error = %err, "malformed frame from worker");
        }
    }
}
