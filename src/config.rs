//! Runtime configuration: environment variables plus an optional TOML file.
//!
//! Env variables:
//!   PORT                : u16 (default 3000)
//!   DATABASE_PATH       : SQLite file (default "data/uniquest.db")
//!   OLLAMA_BASE_URL     : default "http://localhost:11434"
//!   OLLAMA_MODEL        : default "llama3"
//!   OLLAMA_TIMEOUT_SECS : default 120
//!   QUESTS_PER_BATCH    : default 3
//!   UNIQUEST_CONFIG_PATH: TOML file overriding prompt templates (see `Prompts`)

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug)]
pub struct Settings {
  pub port: u16,
  pub database_path: PathBuf,
  pub ollama_base_url: String,
  pub model: String,
  pub timeout_secs: u64,
  pub quests_per_batch: usize,
  pub prompts: Prompts,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      port: 3000,
      database_path: PathBuf::from("data/uniquest.db"),
      ollama_base_url: "http://localhost:11434".into(),
      model: "llama3".into(),
      timeout_secs: 120,
      quests_per_batch: 3,
      prompts: Prompts::default(),
    }
  }
}

impl Settings {
  pub fn from_env() -> Self {
    let mut s = Settings::default();
    if let Some(port) = env_parse::<u16>("PORT") { s.port = port; }
    if let Ok(path) = std::env::var("DATABASE_PATH") { s.database_path = PathBuf::from(path); }
    if let Ok(url) = std::env::var("OLLAMA_BASE_URL") { s.ollama_base_url = url.trim_end_matches('/').to_string(); }
    if let Ok(model) = std::env::var("OLLAMA_MODEL") { s.model = model; }
    if let Some(t) = env_parse::<u64>("OLLAMA_TIMEOUT_SECS") { s.timeout_secs = t; }
    if let Some(n) = env_parse::<usize>("QUESTS_PER_BATCH").filter(|n| *n > 0) { s.quests_per_batch = n; }
    if let Some(cfg) = load_file_config_from_env() {
      s.prompts = cfg.prompts;
    }
    s
  }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
  std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct FileConfig {
  #[serde(default)]
  pub prompts: Prompts,
}

/// Prompt templates. `{placeholder}` values are filled by the prompt builder.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  /// Placeholders: {count}, {context}
  pub quest_master_template: String,
  /// Placeholders: {persona}, {quest}, {answer}
  pub review_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      quest_master_template: "You are an RPG quest master for a university student.\n\
Based on the context below, create {count} short study tasks (quests).\n\n\
{context}\n\
FORMAT: Respond ONLY with a JSON array.\n\
Example: [{\"content\": \"Explain the term ...\", \"type\": \"learning\", \"xp\": 100}]\n\
Types: 'learning' (current material), 'review' (review material), 'prep' (exam preparation).".into(),
      review_template: "{persona}\n\n\
TASK: \"{quest}\"\n\
STUDENT ANSWER: \"{answer}\"\n\n\
EVALUATE:\n\
1. Check correctness.\n\
2. Suggest improvements.\n\n\
RULES: At most 3 sentences. Stay in character!\n\n\
IMPORTANT: Respond ONLY in JSON. No introduction, no \"here is the JSON\".\n\
FORMAT: {\"feedback\": \"YOUR_TEXT_HERE\"}".into(),
    }
  }
}

/// Attempt to load `FileConfig` from UNIQUEST_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_file_config_from_env() -> Option<FileConfig> {
  let path = std::env::var("UNIQUEST_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<FileConfig>(&s) {
      Ok(cfg) => {
        info!(target: "uniquest", %path, "Loaded prompt config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "uniquest", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "uniquest", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_other_defaults() {
    let cfg: FileConfig = toml::from_str(
      r#"
      [prompts]
      review_template = "{persona} grade: {quest} / {answer}"
      "#,
    )
    .unwrap();
    assert_eq!(cfg.prompts.review_template, "{persona} grade: {quest} / {answer}");
    assert!(cfg.prompts.quest_master_template.contains("{context}"));
  }
}
