//! Application state: the store, the two external capabilities and settings.
//!
//! This module owns:
//!   - the SQLite-backed store
//!   - the model client and the document text extractor (behind traits)
//!   - the set of quests with a review currently in flight
//!   - the RNG used to pick the review excerpt

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, instrument, warn};

use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::extract::{PdfTextExtractor, TextExtractor};
use crate::ollama::{ModelCapability, OllamaClient};
use crate::store::Store;

pub struct AppState {
    pub store: Arc<Store>,
    pub model: Arc<dyn ModelCapability>,
    pub extractor: Arc<dyn TextExtractor>,
    pub settings: Settings,
    reviews_in_flight: Mutex<HashSet<String>>,
    rng: Mutex<StdRng>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        store: Store,
        model: Arc<dyn ModelCapability>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            store: Arc::new(store),
            model,
            extractor,
            settings,
            reviews_in_flight: Mutex::new(HashSet::new()),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Build state from settings: open the database, init the Ollama client.
    #[instrument(level = "info", skip_all)]
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let store = Store::open(&settings.database_path)?;
        let model = OllamaClient::new(&settings).map_err(AppError::Transport)?;
        info!(target: "uniquest", base_url = %model.base_url, model = %settings.model, db = %settings.database_path.display(), "Ollama client ready");
        Ok(Self::new(settings, store, Arc::new(model), Arc::new(PdfTextExtractor)))
    }

    /// Replace the RNG (tests use a seeded one).
    pub fn with_seed(self, seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)), ..self }
    }

    pub fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut rng)
    }

    /// Mark a review of `quest_id` as running. Fails with `Busy` if one already is;
    /// the mark is cleared when the returned guard drops.
    pub fn begin_review(&self, quest_id: &str) -> Result<ReviewGuard<'_>> {
        let mut running = self.reviews_in_flight.lock().unwrap_or_else(|p| p.into_inner());
        if !running.insert(quest_id.to_string()) {
            warn!(target: "quest", %quest_id, "Review already in flight");
            return Err(AppError::Busy);
        }
        Ok(ReviewGuard { state: self, quest_id: quest_id.to_string() })
    }
}

pub struct ReviewGuard<'a> {
    state: &'a AppState,
    quest_id: String,
}

impl Drop for ReviewGuard<'_> {
    fn drop(&mut self) {
        let mut running = self.state.reviews_in_flight.lock().unwrap_or_else(|p| p.into_inner());
        running.remove(&self.quest_id);
    }
}
