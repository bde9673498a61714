//! Minimal client for a locally hosted Ollama model.
//!
//! We only call `/api/generate` with `format: "json"` and hand the response body
//! back untouched: its shape is not contractually fixed, so interpreting it is the
//! normalizer's job. Calls log model name, latency and payload size (not contents).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::config::Settings;

/// "Send prompt, get an opaque payload back." Errors are human-readable messages;
/// timeouts are reported like any other failure.
#[async_trait]
pub trait ModelCapability: Send + Sync {
  async fn generate(&self, model: &str, prompt: &str) -> Result<Value, String>;
}

#[derive(Clone)]
pub struct OllamaClient {
  pub client: reqwest::Client,
  pub base_url: String,
}

impl OllamaClient {
  pub fn new(settings: &Settings) -> Result<Self, String> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(settings.timeout_secs))
      .build()
      .map_err(|e| e.to_string())?;
    Ok(Self { client, base_url: settings.ollama_base_url.clone() })
  }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
  model: &'a str,
  prompt: &'a str,
  stream: bool,
  format: &'a str,
}

#[async_trait]
impl ModelCapability for OllamaClient {
  #[instrument(level = "info", skip(self, prompt), fields(model = %model, prompt_len = prompt.len()))]
  async fn generate(&self, model: &str, prompt: &str) -> Result<Value, String> {
    let url = format!("{}/api/generate", self.base_url);
    let req = GenerateRequest { model, prompt, stream: false, format: "json" };
    let start = Instant::now();

    let res = self.client.post(&url)
      .header(USER_AGENT, "uniquest-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&req).send().await
      .map_err(|e| {
        error!(elapsed = ?start.elapsed(), error = %e, "Ollama request failed");
        if e.is_timeout() { format!("Ollama request timed out: {e}") } else { format!("Ollama unreachable: {e}") }
      })?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_ollama_error(&body).unwrap_or(body);
      error!(elapsed = ?start.elapsed(), %status, "Ollama returned an error status");
      return Err(format!("Ollama HTTP {}: {}", status, msg));
    }

    let text = res.text().await.map_err(|e| e.to_string())?;
    info!(elapsed = ?start.elapsed(), bytes = text.len(), "Model response received");
    // A non-JSON body is still a payload; let the normalizer deal with it.
    Ok(serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text)))
  }
}

/// Try to extract a clean error message from an Ollama error body.
fn extract_ollama_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn error_body_is_unwrapped() {
    assert_eq!(
      extract_ollama_error(r#"{"error":"model 'llama9' not found"}"#).as_deref(),
      Some("model 'llama9' not found")
    );
    assert_eq!(extract_ollama_error("<html>502</html>"), None);
  }

  #[test]
  fn request_body_asks_for_json_without_streaming() {
    let req = GenerateRequest { model: "llama3", prompt: "hi", stream: false, format: "json" };
    let v = serde_json::to_value(&req).unwrap();
    assert_eq!(v, serde_json::json!({ "model": "llama3", "prompt": "hi", "stream": false, "format": "json" }));
  }
}
