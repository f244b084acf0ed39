//! Worker-side session state machine.
//!
//! ```text
//! Connecting → Registered → ( AwaitingCommand ⇄ Executing ⇄ Reporting ) → Closed
//! ```
//!
//! `Closed` is terminal and reachable from every state. The loop is
//! strictly serialized: a command is executed and its status sent before
//! the next frame is read.

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use super::executor::Executor;
use super::handler::CommandHandler;
use crate::error::AgentError;
use crate::protocol::{Envelope, ExecutionResult, WorkerId};

/// Lifecycle states of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket open, identity not yet sent.
    Connecting,
    /// `register` sent.
    Registered,
    /// Waiting for the next frame.
    AwaitingCommand,
    /// Running a command.
    Executing,
    /// Sending a status.
    Reporting,
    /// Terminal.
    Closed,
}

/// How a session ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The coordinator closed the channel.
    Closed,
    /// The connection dropped without a closing handshake.
    Dropped(String),
}

/// One connection lifetime of a worker.
#[derive(Debug)]
pub struct Session {
    identity: WorkerId,
    state: SessionState,
    commands_handled: u64,
}

impl Session {
    /// Creates a session in the `Connecting` state.
    #[must_use]
    pub const fn new(identity: WorkerId) -> Self {
        Self {
            identity,
            state: SessionState::Connecting,
            commands_handled: 0,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns how many commands were answered.
    #[must_use]
    pub const fn commands_handled(&self) -> u64 {
        self.commands_handled
    }

    fn transition(&mut self, next: SessionState) {
        tracing::trace!(worker = %self.identity, from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    /// Registers and then serves commands until the channel closes.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Connection`] if the `register` frame cannot
    /// be written. Once registered, remote disconnects (including one
    /// noticed while sending a status) end the session with `Ok`.
    pub async fn run<S, H>(
        &mut self,
        socket: S,
        executor: &Executor<H>,
    ) -> Result<SessionEnd, AgentError>
    where
        S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
        H: CommandHandler,
    {
        let result = self.serve(socket, executor).await;
        self.transition(SessionState::Closed);
        result
    }

    async fn serve<S, H>(
        &mut self,
        mut socket: S,
        executor: &Executor<H>,
    ) -> Result<SessionEnd, AgentError>
    where
        S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
        H: CommandHandler,
    {
        send(&mut socket, &Envelope::register(self.identity.clone())).await?;
        self.transition(SessionState::Registered);
        tracing::info!(worker = %self.identity, "registered with coordinator");

        loop {
            self.transition(SessionState::AwaitingCommand);
            let text = match socket.next().await {
                None | Some(Ok(Message::Close(_))) => {
                    tracing::info!(worker = %self.identity, "coordinator closed the session");
                    return Ok(SessionEnd::Closed);
                }
                Some(Err(err)) => {
                    tracing::warn!(worker = %self.identity, error = %err, "connection dropped");
                    return Ok(SessionEnd::Dropped(err.to_string()));
                }
                Some(Ok(Message::Text(text))) => Ok(text.as_str().to_owned()),
                Some(Ok(Message::Binary(bytes))) => String::from_utf8(bytes.to_vec())
                    .map_err(|e| AgentError::Protocol(format!("binary frame is not UTF-8: {e}"))),
                Some(Ok(_)) => continue,
            };

            let envelope = text.and_then(|t| Envelope::decode(&t));
            let result = match envelope {
                Ok(Envelope::Command { command }) => {
                    self.transition(SessionState::Executing);
                    tracing::debug!(worker = %self.identity, %command, "executing command");
                    executor.execute(&command).await
                }
                Ok(other) => {
                    tracing::debug!(worker = %self.identity, kind = other.type_str(), "ignoring envelope");
                    continue;
                }
                Err(err) => {
                    tracing::warn!(worker = %self.identity, error = %err, "malformed envelope");
                    ExecutionResult::error(err.to_string())
                }
            };

            self.transition(SessionState::Reporting);
            let ok = result.is_success();
            let status = result.into_envelope().encode()?;
            if let Err(err) = socket.send(Message::text(status)).await {
                tracing::warn!(
                    worker = %self.identity,
                    error = %err,
                    "connection dropped before status was sent"
                );
                return Ok(SessionEnd::Dropped(err.to_string()));
            }
            self.commands_handled += 1;
            tracing::debug!(worker = %self.identity, ok, "status reported");
        }
    }
}

async fn send<S>(socket: &mut S, envelope: &Envelope) -> Result<(), AgentError>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    let text = envelope.encode()?;
    socket.send(Message::text(text)).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use serde_json::{Value, json};
    use tokio::io::DuplexStream;
    use tokio_tungstenite::WebSocketStream;
    use tokio_tungstenite::tungstenite::protocol::Role;

    use super::*;
    use crate::agent::handler::ScriptHandler;
    use crate::script::Builtins;

    async fn pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        let worker = WebSocketStream::from_raw_socket(a, Role::Client, None).await;
        let coordinator = WebSocketStream::from_raw_socket(b, Role::Server, None).await;
        (worker, coordinator)
    }

    fn executor() -> Executor<ScriptHandler> {
        let builtins = Builtins::standard(json!(42));
        Executor::new(ScriptHandler::new(builtins), Duration::from_secs(1))
    }

    async fn recv_json(socket: &mut WebSocketStream<DuplexStream>) -> Value {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => serde_json::from_str(text.as_str()).unwrap_or_default(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    async fn send_text(socket: &mut WebSocketStream<DuplexStream>, text: &str) {
        if socket.send(Message::text(text.to_string())).await.is_err() {
            panic!("coordinator send failed");
        }
    }

    fn spawn_worker(
        worker: WebSocketStream<DuplexStream>,
    ) -> tokio::task::JoinHandle<(Session, Result<SessionEnd, AgentError>)> {
        tokio::spawn(async move {
            let executor = executor();
            let mut session = Session::new(WorkerId::Number(42));
            let result = session.run(worker, &executor).await;
            (session, result)
        })
    }

    #[tokio::test]
    async fn registers_then_answers_each_command_once() {
        let (worker, mut coordinator) = pair().await;
        let handle = spawn_worker(worker);

        assert_eq!(recv_json(&mut coordinator).await, json!({"type": "register", "id": 42}));

        send_text(&mut coordinator, r#"{"type":"command","command":"return true, 7"}"#).await;
        assert_eq!(
            recv_json(&mut coordinator).await,
            json!({"type": "status", "status": true, "data": 7})
        );

        send_text(&mut coordinator, r#"{"type":"command","command":"return false, 'blocked'"}"#)
            .await;
        assert_eq!(
            recv_json(&mut coordinator).await,
            json!({"type": "status", "status": false, "data": "blocked"})
        );

        send_text(&mut coordinator, r#"{"type":"command","command":"return 'ore'"}"#).await;
        assert_eq!(
            recv_json(&mut coordinator).await,
            json!({"type": "status", "status": true, "data": "ore"})
        );

        let _ = coordinator.close(None).await;
        let Ok((session, result)) = handle.await else {
            panic!("worker task failed");
        };
        assert_eq!(result.ok(), Some(SessionEnd::Closed));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.commands_handled(), 3);
    }

    #[tokio::test]
    async fn unrecognized_envelopes_are_skipped_silently() {
        let (worker, mut coordinator) = pair().await;
        let handle = spawn_worker(worker);
        let _ = recv_json(&mut coordinator).await;

        send_text(&mut coordinator, r#"{"type":"heartbeat"}"#).await;
        send_text(&mut coordinator, r#"{"type":"status","status":true}"#).await;
        send_text(&mut coordinator, r#"{"type":"command","command":"return 1"}"#).await;

        // The first reply must belong to the command, not the skipped frames.
        assert_eq!(
            recv_json(&mut coordinator).await,
            json!({"type": "status", "status": true, "data": 1})
        );

        let _ = coordinator.close(None).await;
        let Ok((session, _)) = handle.await else {
            panic!("worker task failed");
        };
        assert_eq!(session.commands_handled(), 1);
    }

    #[tokio::test]
    async fn malformed_envelope_gets_failure_and_loop_continues() {
        let (worker, mut coordinator) = pair().await;
        let handle = spawn_worker(worker);
        let _ = recv_json(&mut coordinator).await;

        send_text(&mut coordinator, "{not json").await;
        let reply = recv_json(&mut coordinator).await;
        assert_eq!(reply.get("status"), Some(&json!(false)));
        let detail = reply.get("data").and_then(Value::as_str).unwrap_or_default();
        assert!(detail.starts_with("protocol error"));

        send_text(&mut coordinator, r#"{"type":"command","command":"return 2"}"#).await;
        assert_eq!(
            recv_json(&mut coordinator).await,
            json!({"type": "status", "status": true, "data": 2})
        );

        let _ = coordinator.close(None).await;
        let _ = handle.await;
    }

    #[tokio::test]
    async fn compile_failure_reports_exactly_once() {
        let (worker, mut coordinator) = pair().await;
        let handle = spawn_worker(worker);
        let _ = recv_json(&mut coordinator).await;

        send_text(&mut coordinator, r#"{"type":"command","command":"return ("}"#).await;
        let reply = recv_json(&mut coordinator).await;
        assert_eq!(reply.get("status"), Some(&json!(false)));

        send_text(&mut coordinator, r#"{"type":"command","command":"return 3"}"#).await;
        assert_eq!(
            recv_json(&mut coordinator).await,
            json!({"type": "status", "status": true, "data": 3})
        );

        let _ = coordinator.close(None).await;
        let Ok((session, _)) = handle.await else {
            panic!("worker task failed");
        };
        assert_eq!(session.commands_handled(), 2);
    }

    #[tokio::test]
    async fn dropped_connection_ends_cleanly_without_sending() {
        let (worker, mut coordinator) = pair().await;
        let handle = spawn_worker(worker);
        let _ = recv_json(&mut coordinator).await;

        drop(coordinator);
        let Ok((session, result)) = handle.await else {
            panic!("worker task failed");
        };
        assert!(matches!(
            result,
            Ok(SessionEnd::Closed | SessionEnd::Dropped(_))
        ));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.commands_handled(), 0);
    }

    #[tokio::test]
    async fn drop_during_execution_ends_cleanly() {
        let (worker, mut coordinator) = pair().await;
        let handle = spawn_worker(worker);
        let _ = recv_json(&mut coordinator).await;

        send_text(&mut coordinator, r#"{"type":"command","command":"sleep(200) return 1"}"#).await;
        drop(coordinator);

        let Ok((session, result)) = handle.await else {
            panic!("worker task failed");
        };
        assert!(matches!(result, Ok(SessionEnd::Dropped(_))), "{result:?}");
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.commands_handled(), 0);
    }

    #[tokio::test]
    async fn deeply_nested_command_gets_one_failure() {
        let (worker, mut coordinator) = pair().await;
        let handle = spawn_worker(worker);
        let _ = recv_json(&mut coordinator).await;

        let command = format!("return {}", "{".repeat(20_000));
        let nested = json!({"type": "command", "command": command});
        send_text(&mut coordinator, &nested.to_string()).await;
        let reply = recv_json(&mut coordinator).await;
        assert_eq!(reply.get("status"), Some(&json!(false)));
        let detail = reply.get("data").and_then(Value::as_str).unwrap_or_default();
        assert!(detail.starts_with("compile error"), "{detail}");

        send_text(&mut coordinator, r#"{"type":"command","command":"return 4"}"#).await;
        assert_eq!(
            recv_json(&mut coordinator).await,
            json!({"type": "status", "status": true, "data": 4})
        );

        let _ = coordinator.close(None).await;
        let Ok((session, _)) = handle.await else {
            panic!("worker task failed");
        };
        assert_eq!(session.commands_handled(), 2);
    }
}
