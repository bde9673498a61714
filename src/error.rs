//! Error taxonomy shared by services and handlers.
//!
//! Every variant is a user-visible, recoverable failure; handlers map them to HTTP
//! status codes with a JSON body `{ "error": <kind>, "message": <text> }`.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
  #[error("No document content found. Upload a script to an active or completed module first.")]
  NoContext,

  #[error("Model or extraction call failed: {0}")]
  Transport(String),

  #[error("Could not parse the model response. Please try again.")]
  MalformedModelOutput { raw: String },

  #[error("Invalid backup file: {0}")]
  InvalidImportFile(String),

  #[error("{0} not found")]
  NotFound(String),

  #[error("Quest is already completed")]
  QuestAlreadyCompleted,

  #[error("A review for this quest is already in progress")]
  Busy,

  #[error("Invalid input: {0}")]
  InvalidInput(String),

  #[error("Not enough coins: need {needed}, have {available}")]
  InsufficientCoins { needed: u64, available: u64 },

  #[error("Storage error: {0}")]
  Storage(#[from] rusqlite::Error),

  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

impl AppError {
  pub fn kind(&self) -> &'static str {
    match self {
      AppError::NoContext => "no_context",
      AppError::Transport(_) => "transport_failure",
      AppError::MalformedModelOutput { .. } => "malformed_model_output",
      AppError::InvalidImportFile(_) => "invalid_import_file",
      AppError::NotFound(_) => "not_found",
      AppError::QuestAlreadyCompleted => "quest_already_completed",
      AppError::Busy => "busy",
      AppError::InvalidInput(_) => "invalid_input",
      AppError::InsufficientCoins { .. } => "insufficient_coins",
      AppError::Storage(_) => "storage",
      AppError::Serialization(_) => "serialization",
      AppError::Io(_) => "io",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      AppError::NoContext => StatusCode::UNPROCESSABLE_ENTITY,
      AppError::Transport(_) => StatusCode::BAD_GATEWAY,
      AppError::MalformedModelOutput { .. } => StatusCode::BAD_GATEWAY,
      AppError::InvalidImportFile(_) => StatusCode::BAD_REQUEST,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::QuestAlreadyCompleted | AppError::Busy => StatusCode::CONFLICT,
      AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
      AppError::InsufficientCoins { .. } => StatusCode::PAYMENT_REQUIRED,
      AppError::Storage(_) | AppError::Serialization(_) | AppError::Io(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let body = json!({ "error": self.kind(), "message": self.to_string() });
    (self.status(), Json(body)).into_response()
  }
}
