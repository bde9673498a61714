//! Module ledger: CRUD, edits that drive the reward state machine, document
//! ingestion, the hall of fame and the stats overview.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{Module, ModuleStatus, UserProfile};
use crate::error::{AppError, Result};
use crate::gamification::{apply_transition, plan_transition, LevelChange, RewardAction};
use crate::prompt::has_usable_content;
use crate::state::AppState;
use crate::store::Tx;

/// Fields the user supplies when creating or editing a module.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleInput {
    pub title: String,
    pub cp: f64,
    #[serde(default)]
    pub status: ModuleStatus,
    #[serde(default)]
    pub grade: Option<f64>,
}

impl ModuleInput {
    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::InvalidInput("title must not be empty".into()));
        }
        if !self.cp.is_finite() || self.cp <= 0.0 {
            return Err(AppError::InvalidInput(format!("cp must be positive, got {}", self.cp)));
        }
        if let Some(g) = self.grade {
            if !(1.0..=5.0).contains(&g) {
                return Err(AppError::InvalidInput(format!("grade must be within 1.0..=5.0, got {g}")));
            }
        }
        Ok(())
    }

    fn apply_to(&self, m: &mut Module) {
        m.title = self.title.trim().to_string();
        m.cp = self.cp;
        m.status = self.status;
        m.grade = self.grade;
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleOutcome {
    pub module: Module,
    /// Set when the edit granted a reward.
    pub level: Option<LevelChange>,
    pub profile: UserProfile,
}

/// Persist `after` (replacing `before`) together with its reward effect.
fn commit_edit(tx: &Tx<'_>, before: &Module, mut after: Module, is_new: bool) -> Result<ModuleOutcome> {
    let mut profile = tx.profile()?;
    let action = plan_transition(before, &after);
    let level = apply_transition(action, &mut after, &mut profile);
    if is_new {
        tx.insert_module(&after)?;
    } else {
        tx.update_module(&after)?;
    }
    if action != RewardAction::None {
        tx.save_profile(&profile)?;
        info!(target: "ledger", module = %after.id, ?action, xp = profile.xp(), "Module reward booked");
    }
    Ok(ModuleOutcome { module: after, level, profile })
}

#[instrument(level = "info", skip(state, input), fields(title = %input.title))]
pub fn create_module(state: &AppState, input: ModuleInput) -> Result<ModuleOutcome> {
    input.validate()?;
    let blank = Module {
        id: Uuid::new_v4().to_string(),
        title: String::new(),
        cp: 0.0,
        grade: None,
        status: ModuleStatus::Active,
        pdf_path: None,
        extracted_content: None,
        xp_awarded: false,
        awarded_xp: None,
    };
    let mut module = blank.clone();
    input.apply_to(&mut module);
    state.store.transaction(|tx| commit_edit(tx, &blank, module, true))
}

#[instrument(level = "info", skip(state, input), fields(%id))]
pub fn update_module(state: &AppState, id: &str, input: ModuleInput) -> Result<ModuleOutcome> {
    input.validate()?;
    state.store.transaction(|tx| {
        let before = tx.module(id)?;
        let mut after = before.clone();
        input.apply_to(&mut after);
        commit_edit(tx, &before, after, false)
    })
}

/// Deletion is unconditional; a reward already booked for the module stays on the profile.
#[instrument(level = "info", skip(state), fields(%id))]
pub fn delete_module(state: &AppState, id: &str) -> Result<()> {
    if !state.store.transaction(|tx| tx.delete_module(id))? {
        return Err(AppError::NotFound(format!("Module {id}")));
    }
    info!(target: "uniquest", %id, "Module deleted");
    Ok(())
}

pub fn list_modules(state: &AppState) -> Result<Vec<Module>> {
    state.store.read(|tx| tx.modules())
}

pub fn get_module(state: &AppState, id: &str) -> Result<Module> {
    state.store.module(id)
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentOutcome {
    pub module: Module,
    /// Whether the extracted text is long enough to feed quest generation.
    pub usable: bool,
}

/// Extract text from the document at `path` and attach both to the module.
#[instrument(level = "info", skip(state), fields(%id, %path))]
pub async fn attach_document(state: &AppState, id: &str, path: &str) -> Result<DocumentOutcome> {
    state.store.module(id)?;
    let text = state.extractor.extract(path).await.map_err(AppError::Transport)?;
    let usable = has_usable_content(Some(text.as_str()));
    if !usable {
        warn!(target: "uniquest", %id, chars = text.chars().count(), "Extracted text too short for quest generation");
    }
    let module = state.store.transaction(|tx| {
        let mut m = tx.module(id)?;
        m.pdf_path = Some(path.to_string());
        m.extracted_content = Some(text);
        tx.update_module(&m)?;
        Ok(m)
    })?;
    Ok(DocumentOutcome { module, usable })
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Title,
    #[default]
    Grade,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct HallOfFameQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: SortField,
    #[serde(default)]
    pub dir: SortDir,
}

/// Completed modules filtered by case-insensitive title substring and sorted.
/// Modules without a grade sort as if graded worse than any real grade.
pub fn filter_hall_of_fame(mut modules: Vec<Module>, q: &HallOfFameQuery) -> Vec<Module> {
    let needle = q.search.as_deref().unwrap_or_default().trim().to_lowercase();
    modules.retain(|m| m.status == ModuleStatus::Completed && m.title.to_lowercase().contains(&needle));
    modules.sort_by(|a, b| {
        let ord = match q.sort {
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortField::Grade => {
                let (ga, gb) = (a.grade.unwrap_or(f64::MAX), b.grade.unwrap_or(f64::MAX));
                ga.partial_cmp(&gb).unwrap_or(Ordering::Equal)
            }
        };
        match q.dir {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        }
    });
    modules
}

pub fn hall_of_fame(state: &AppState, q: &HallOfFameQuery) -> Result<Vec<Module>> {
    let completed = state.store.read(|tx| tx.modules_by_status(ModuleStatus::Completed))?;
    Ok(filter_hall_of_fame(completed, q))
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetOutcome {
    pub reset: usize,
    pub profile: UserProfile,
}

/// Send every completed module back to active with its grade cleared. Booked
/// rewards are revoked through the state machine; all in one transaction.
#[instrument(level = "info", skip(state))]
pub fn reset_hall_of_fame(state: &AppState) -> Result<ResetOutcome> {
    let outcome = state.store.transaction(|tx| {
        let completed = tx.modules_by_status(ModuleStatus::Completed)?;
        let mut profile = tx.profile()?;
        for before in &completed {
            let mut after = before.clone();
            after.status = ModuleStatus::Active;
            after.grade = None;
            let action = plan_transition(before, &after);
            apply_transition(action, &mut after, &mut profile);
            tx.update_module(&after)?;
        }
        tx.save_profile(&profile)?;
        Ok(ResetOutcome { reset: completed.len(), profile })
    })?;
    info!(target: "ledger", reset = outcome.reset, xp = outcome.profile.xp(), "Hall of fame reset");
    Ok(outcome)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub completed_modules: usize,
    pub total_modules: usize,
    pub earned_cp: f64,
    /// Credit-weighted mean over completed, graded modules.
    pub average_grade: Option<f64>,
}

pub fn compute_stats(modules: &[Module]) -> Stats {
    let completed: Vec<&Module> = modules.iter().filter(|m| m.status == ModuleStatus::Completed).collect();
    let earned_cp = completed.iter().map(|m| m.cp).sum();
    let (weighted, weight) = completed
        .iter()
        .filter_map(|m| m.grade.map(|g| (g * m.cp, m.cp)))
        .fold((0.0, 0.0), |(s, w), (gs, c)| (s + gs, w + c));
    let average_grade = (weight > 0.0).then(|| (weighted / weight * 100.0).round() / 100.0);
    Stats { completed_modules: completed.len(), total_modules: modules.len(), earned_cp, average_grade }
}

pub fn stats(state: &AppState) -> Result<Stats> {
    Ok(compute_stats(&list_modules(state)?))
}
