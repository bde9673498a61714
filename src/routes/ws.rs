//! WebSocket upgrade + message loop for the quest flow. Each client message is
//! parsed as JSON and forwarded to the quest services; one JSON reply per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::quests;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "uniquest", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "uniquest", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "uniquest", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { error: "invalid_input".into(), message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "error": "serialization", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "uniquest", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "uniquest", "WebSocket disconnected");
}

#[instrument(level = "info", skip(state))]
pub async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  let reply = match msg {
    ClientWsMessage::Ping => Ok(ServerWsMessage::Pong),
    ClientWsMessage::ListQuests =>
      quests::list_open_quests(state).map(|quests| ServerWsMessage::Quests { quests }),
    ClientWsMessage::GenerateQuests =>
      quests::generate_quests(state).await.map(|quests| ServerWsMessage::Quests { quests }),
    ClientWsMessage::SaveDraft { quest_id, answer } =>
      quests::save_draft(state, &quest_id, &answer).map(|quest| ServerWsMessage::Draft { quest }),
    ClientWsMessage::ReviewAnswer { quest_id, answer } =>
      quests::review_answer(state, &quest_id, &answer).await.map(|result| ServerWsMessage::Review { result }),
    ClientWsMessage::CompleteQuest { quest_id } =>
      quests::complete_quest(state, &quest_id).map(|result| ServerWsMessage::Completion { result }),
  };
  reply.unwrap_or_else(|e| {
    info!(target: "quest", kind = e.kind(), "WS request failed");
    ServerWsMessage::from(e)
  })
}
