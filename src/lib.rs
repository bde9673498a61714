//! UniQuest · study tracker backend
//!
//! Course modules, model-generated study quests, an xp/coin reward ledger and
//! full-store backups, served over HTTP + WebSocket.

pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod gamification;
pub mod modules;
pub mod normalizer;
pub mod ollama;
pub mod portability;
pub mod prompt;
pub mod protocol;
pub mod quests;
pub mod routes;
pub mod shop;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod util;

pub use error::{AppError, Result};
pub use routes::build_router;
pub use state::AppState;
