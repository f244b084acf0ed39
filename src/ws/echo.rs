//! Diagnostic echo socket on `/echo`.

use axum::extract::ws::{Message, WebSocket};

/// Answers every text frame with its content repeated twice.
pub async fn run_echo(mut socket: WebSocket) {
    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                let reply = doubled(text.as_str());
                if socket.send(Message::text(reply)).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    tracing::debug!("echo connection closed");
}

/// The echo reply for `text`.
#[must_use]
pub fn doubled(text: &str) -> String {
    text.repeat(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeats_twice() {
        assert_eq!(doubled("ping"), "pingping");
        assert_eq!(doubled(""), "");
    }
}
