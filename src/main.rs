//! UniQuest · study tracker backend
//!
//! - Axum HTTP + WebSocket API
//! - SQLite persistence (rusqlite)
//! - Local Ollama model for quest generation and answer review
//!
//! Important env variables:
//!   PORT                 : u16 (default 3000)
//!   DATABASE_PATH        : SQLite file (default "data/uniquest.db")
//!   OLLAMA_BASE_URL      : default "http://localhost:11434"
//!   OLLAMA_MODEL         : default "llama3"
//!   OLLAMA_TIMEOUT_SECS  : default 120
//!   QUESTS_PER_BATCH     : default 3
//!   UNIQUEST_CONFIG_PATH : path to TOML config (prompt templates)
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use uniquest_backend::config::Settings;
use uniquest_backend::{build_router, telemetry, AppState};

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let settings = Settings::from_env();
  let addr = SocketAddr::from(([127, 0, 0, 1], settings.port));

  // Open the store, build the model client and extractor.
  let state = Arc::new(AppState::from_settings(settings)?);

  // Count a launch as a login for the streak.
  let profile = uniquest_backend::shop::record_login(&state)?;
  info!(target: "uniquest", streak = profile.streak, level = profile.level(), "Profile loaded");

  let app = build_router(state.clone());

  let listener = TcpListener::bind(addr).await?;
  info!(target: "uniquest", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      info!(target: "uniquest", "Shutdown signal received");
    })
    .await?;
  Ok(())
}
