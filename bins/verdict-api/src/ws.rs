/// Live-Progress Push Channel
///
/// **Core Responsibility:**
/// Deliver grading events, in the order produced, to every session the
/// submitting user currently holds.
///
/// Sessions authenticate with a first `{type:"auth", userId}` frame;
/// everything received before it is ignored, and a session that closes
/// without authenticating never registers. The channel is best-effort
/// by design: no replay, no retransmission - late or reconnecting
/// clients poll the persisted submission instead. The registry map is
/// the only shared mutable structure and is guarded by one mutex,
/// touched on connect, disconnect, and delivery.
use crate::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info};
use verdict_common::types::ProgressEvent;

#[derive(Debug, Deserialize)]
struct AuthFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "userId")]
    user_id: String,
}

struct Session {
    id: u64,
    tx: mpsc::UnboundedSender<Message>,
}

/// `userId → sessions` map shared between the WebSocket endpoint and
/// the push bridge.
#[derive(Default)]
pub struct SessionRegistry {
    inner: Mutex<HashMap<String, Vec<Session>>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, user_id: &str) -> (u64, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .push(Session { id, tx });
        (id, rx)
    }

    fn unregister(&self, user_id: &str, session_id: u64) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(sessions) = inner.get_mut(user_id) {
            sessions.retain(|s| s.id != session_id);
            if sessions.is_empty() {
                inner.remove(user_id);
            }
        }
    }

    /// Send one frame to every session of `user_id`; dead sessions are
    /// dropped on the spot. Returns how many sessions accepted it.
    pub fn deliver(&self, user_id: &str, frame: String) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let Some(sessions) = inner.get_mut(user_id) else {
            return 0;
        };

        sessions.retain(|s| s.tx.send(Message::Text(frame.clone())).is_ok());
        let delivered = sessions.len();
        if sessions.is_empty() {
            inner.remove(user_id);
        }
        delivered
    }

    #[cfg(test)]
    fn session_count(&self, user_id: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .get(user_id)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

/// Wire frame wrapping one progress event.
pub fn update_frame(submission_id: &str, event: &ProgressEvent) -> String {
    serde_json::json!({
        "type": "submission_update",
        "submissionId": submission_id,
        "data": event,
    })
    .to_string()
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Wait for the auth frame; events only flow after it.
    let user_id = loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                if let Ok(frame) = serde_json::from_str::<AuthFrame>(&text) {
                    if frame.kind == "auth" && !frame.user_id.is_empty() {
                        break frame.user_id;
                    }
                }
                debug!("ignoring pre-auth frame");
            }
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => {}
            Some(Err(_)) => return,
        }
    };

    let (session_id, mut rx) = state.sessions.register(&user_id);
    info!(user_id = %user_id, session_id = session_id, "ws session authenticated");

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(message) => {
                        if sender.send(message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    // Frames after auth carry nothing we act on.
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    state.sessions.unregister(&user_id, session_id);
    debug!(user_id = %user_id, session_id = session_id, "ws session closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_common::types::{Progress, SubmissionStatus};

    fn event(submission_id: &str) -> ProgressEvent {
        ProgressEvent {
            submission_id: submission_id.to_string(),
            status: SubmissionStatus::Running,
            progress: Progress {
                completed: 1,
                total: 2,
            },
            percent: 50,
            passed_count: 1,
            total_count: 2,
            results: vec![],
            error: String::new(),
        }
    }

    #[tokio::test]
    async fn test_deliver_to_single_session() {
        let registry = SessionRegistry::new();
        let (_, mut rx) = registry.register("u1");

        let delivered = registry.deliver("u1", "hello".to_string());

        assert_eq!(delivered, 1);
        match rx.recv().await.unwrap() {
            Message::Text(text) => assert_eq!(text, "hello"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_all_sessions_of_a_user_receive() {
        let registry = SessionRegistry::new();
        let (_, mut rx1) = registry.register("u1");
        let (_, mut rx2) = registry.register("u1");

        let delivered = registry.deliver("u1", "event".to_string());

        assert_eq!(delivered, 2);
        assert!(matches!(rx1.recv().await, Some(Message::Text(_))));
        assert!(matches!(rx2.recv().await, Some(Message::Text(_))));
    }

    #[tokio::test]
    async fn test_deliver_to_unknown_user_is_noop() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.deliver("nobody", "event".to_string()), 0);
    }

    #[tokio::test]
    async fn test_unregister_removes_session() {
        let registry = SessionRegistry::new();
        let (id, _rx) = registry.register("u1");
        assert_eq!(registry.session_count("u1"), 1);

        registry.unregister("u1", id);
        assert_eq!(registry.session_count("u1"), 0);
    }

    #[tokio::test]
    async fn test_dead_sessions_are_pruned_on_delivery() {
        let registry = SessionRegistry::new();
        let (_, rx) = registry.register("u1");
        drop(rx);

        assert_eq!(registry.deliver("u1", "event".to_string()), 0);
        assert_eq!(registry.session_count("u1"), 0);
    }

    #[test]
    fn test_update_frame_shape() {
        let frame = update_frame("s1", &event("s1"));
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(value["type"], "submission_update");
        assert_eq!(value["submissionId"], "s1");
        assert_eq!(value["data"]["percent"], 50);
        assert_eq!(value["data"]["status"], "Running");
    }
}
