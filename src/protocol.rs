//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::Quest;
use crate::error::AppError;
use crate::quests::{CompletionOutcome, ReviewOutcome};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    ListQuests,
    GenerateQuests,
    SaveDraft {
        #[serde(rename = "questId")]
        quest_id: String,
        answer: String,
    },
    ReviewAnswer {
        #[serde(rename = "questId")]
        quest_id: String,
        answer: String,
    },
    CompleteQuest {
        #[serde(rename = "questId")]
        quest_id: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Quests {
        quests: Vec<Quest>,
    },
    Draft {
        quest: Quest,
    },
    Review {
        result: ReviewOutcome,
    },
    Completion {
        result: CompletionOutcome,
    },
    Error {
        error: String,
        message: String,
    },
}

impl From<AppError> for ServerWsMessage {
    fn from(e: AppError) -> Self {
        ServerWsMessage::Error { error: e.kind().to_string(), message: e.to_string() }
    }
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct DocumentIn {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct PersonaIn {
    pub persona: String,
}

#[derive(Serialize)]
pub struct QuestsOut {
    pub quests: Vec<Quest>,
}

#[derive(Serialize)]
pub struct ClearedOut {
    pub removed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_snake_case_tags() {
        let msg: ClientWsMessage =
            serde_json::from_str(r#"{"type":"review_answer","questId":"q1","answer":"42"}"#).unwrap();
        assert!(matches!(msg, ClientWsMessage::ReviewAnswer { ref quest_id, .. } if quest_id == "q1"));
        let msg: ClientWsMessage = serde_json::from_str(r#"{"type":"generate_quests"}"#).unwrap();
        assert!(matches!(msg, ClientWsMessage::GenerateQuests));
    }

    #[test]
    fn errors_carry_their_kind() {
        let v = serde_json::to_value(ServerWsMessage::from(AppError::Busy)).unwrap();
        assert_eq!(v["type"], "error");
        assert_eq!(v["error"], "busy");
    }
}
