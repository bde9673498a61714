//! Shared fixtures: a scripted model, a fake extractor and state builders.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::Notify;

use uniquest_backend::config::Settings;
use uniquest_backend::extract::TextExtractor;
use uniquest_backend::modules::{self, ModuleInput};
use uniquest_backend::ollama::ModelCapability;
use uniquest_backend::store::Store;
use uniquest_backend::AppState;
use uniquest_backend::domain::{Module, ModuleStatus};

pub const LECTURE_TEXT: &str = "Entropy measures the number of microscopic configurations \
that correspond to a thermodynamic system in a state specified by macroscopic variables.";

/// Replays queued replies in order and records every prompt it receives.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<Value, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, r: Result<Value, String>) {
        self.replies.lock().unwrap().push_back(r);
    }

    /// Queue a reply shaped like an Ollama `/api/generate` body.
    pub fn reply_envelope(&self, response: &str) {
        self.reply(Ok(json!({ "model": "llama3", "response": response, "done": true })));
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelCapability for ScriptedModel {
    async fn generate(&self, _model: &str, prompt: &str) -> Result<Value, String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("no scripted reply left".into()))
    }
}

/// Blocks every call until released; signals when a call has started.
#[derive(Default)]
pub struct GatedModel {
    pub started: Notify,
    pub release: Notify,
}

#[async_trait]
impl ModelCapability for GatedModel {
    async fn generate(&self, _model: &str, _prompt: &str) -> Result<Value, String> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(json!({ "response": "{\"feedback\": \"Finally done.\"}" }))
    }
}

/// Returns `text` for any path except ones containing "missing".
pub struct FakeExtractor {
    pub text: String,
}

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract(&self, path: &str) -> Result<String, String> {
        if path.contains("missing") {
            return Err(format!("File not found: {path}"));
        }
        Ok(self.text.clone())
    }
}

pub fn build_state(dir: &TempDir, model: Arc<dyn ModelCapability>) -> Arc<AppState> {
    let settings = Settings { database_path: dir.path().join("uniquest.db"), ..Settings::default() };
    let store = Store::open(&settings.database_path).unwrap();
    let extractor = Arc::new(FakeExtractor { text: LECTURE_TEXT.repeat(3) });
    Arc::new(AppState::new(settings, store, model, extractor).with_seed(42))
}

pub fn input(title: &str, cp: f64, status: ModuleStatus, grade: Option<f64>) -> ModuleInput {
    ModuleInput { title: title.into(), cp, status, grade }
}

/// Active module with an attached, usable document.
pub async fn module_with_document(state: &AppState, title: &str) -> Module {
    let created = modules::create_module(state, input(title, 5.0, ModuleStatus::Active, None)).unwrap();
    modules::attach_document(state, &created.module.id, "/scripts/lecture.pdf")
        .await
        .unwrap()
        .module
}
