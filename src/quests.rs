//! Quest lifecycle: generation from study material, answer review, drafts, completion.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{Quest, UserProfile};
use crate::error::{AppError, Result};
use crate::gamification::{grant_reward, LevelChange};
use crate::normalizer::{extract_feedback, extract_quest_drafts, QuestDraft};
use crate::prompt::{gather_excerpts, quest_prompt, review_prompt, Persona};
use crate::state::AppState;
use crate::util::trunc_for_log;

/// Reward for a quest whose draft carried no usable xp value.
pub const DEFAULT_QUEST_XP: u64 = 50;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOutcome {
    pub quest_id: String,
    /// True when the quest had been completed before this call; nothing was granted.
    pub already_completed: bool,
    pub xp_granted: u64,
    pub level: Option<LevelChange>,
    pub profile: UserProfile,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReviewOutcome {
    /// Empty answer: the quest was completed directly.
    Completed(CompletionOutcome),
    /// The answer and the model's feedback were stored; the quest stays open.
    Reviewed { quest: Quest },
}

fn raw_text(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn drafts_into_quests(drafts: Vec<QuestDraft>, now: DateTime<Utc>) -> Vec<Quest> {
    drafts
        .into_iter()
        .map(|d| Quest {
            id: Uuid::new_v4().to_string(),
            content: d.content,
            category: d.category.unwrap_or_default(),
            is_completed: false,
            xp_reward: d.xp_hint.unwrap_or(DEFAULT_QUEST_XP),
            generated_at: now,
            user_answer: None,
            ai_feedback: None,
        })
        .collect()
}

/// Ask the model for a new batch of quests and store it atomically.
#[instrument(level = "info", skip(state))]
pub async fn generate_quests(state: &AppState) -> Result<Vec<Quest>> {
    let modules = state.store.read(|tx| tx.modules())?;
    let excerpts = state.with_rng(|rng| gather_excerpts(&modules, rng))?;
    let prompt = quest_prompt(&state.settings.prompts, &excerpts, state.settings.quests_per_batch);

    let raw = state
        .model
        .generate(&state.settings.model, &prompt)
        .await
        .map_err(AppError::Transport)?;

    let drafts = extract_quest_drafts(&raw);
    if drafts.is_empty() {
        let raw = raw_text(&raw);
        warn!(target: "quest", raw = %trunc_for_log(&raw, 400), "Model output held no quests");
        return Err(AppError::MalformedModelOutput { raw });
    }

    let quests = drafts_into_quests(drafts, Utc::now());
    state.store.transaction(|tx| tx.insert_quests(&quests))?;
    info!(target: "quest", count = quests.len(), excerpts = excerpts.len(), "Quest batch stored");
    Ok(quests)
}

/// Review a submitted answer. An empty answer completes the quest directly.
#[instrument(level = "info", skip(state, answer), fields(%quest_id, answer_len = answer.len()))]
pub async fn review_answer(state: &AppState, quest_id: &str, answer: &str) -> Result<ReviewOutcome> {
    let _guard = state.begin_review(quest_id)?;

    let quest = state.store.quest(quest_id)?;
    if quest.is_completed {
        return Err(AppError::QuestAlreadyCompleted);
    }
    if answer.trim().is_empty() {
        return complete_quest(state, quest_id).map(ReviewOutcome::Completed);
    }

    let persona = Persona::from_key(&state.store.profile()?.active_persona);
    let prompt = review_prompt(&state.settings.prompts, persona, &quest.content, answer);
    let raw = state
        .model
        .generate(&state.settings.model, &prompt)
        .await
        .map_err(AppError::Transport)?;
    let feedback = extract_feedback(&raw);

    let quest = state.store.transaction(|tx| {
        tx.set_quest_answer(quest_id, answer, Some(feedback.as_str()))?;
        tx.quest(quest_id)
    })?;
    info!(target: "quest", %quest_id, persona = persona.key(), feedback_len = feedback.len(), "Answer reviewed");
    Ok(ReviewOutcome::Reviewed { quest })
}

/// Store an answer without reviewing or completing.
#[instrument(level = "info", skip(state, answer), fields(%quest_id, answer_len = answer.len()))]
pub fn save_draft(state: &AppState, quest_id: &str, answer: &str) -> Result<Quest> {
    state.store.transaction(|tx| {
        if tx.quest(quest_id)?.is_completed {
            return Err(AppError::QuestAlreadyCompleted);
        }
        tx.set_quest_answer(quest_id, answer, None)?;
        tx.quest(quest_id)
    })
}

/// Complete a quest and grant its reward. The completion flag is the only guard:
/// a second call grants nothing and reports `already_completed`.
#[instrument(level = "info", skip(state), fields(%quest_id))]
pub fn complete_quest(state: &AppState, quest_id: &str) -> Result<CompletionOutcome> {
    let outcome = state.store.transaction(|tx| {
        let quest = tx.quest(quest_id)?;
        let mut profile = tx.profile()?;
        if !tx.mark_quest_completed(quest_id)? {
            return Ok(CompletionOutcome {
                quest_id: quest_id.to_string(),
                already_completed: true,
                xp_granted: 0,
                level: None,
                profile,
            });
        }
        let change = grant_reward(&mut profile, quest.xp_reward);
        tx.save_profile(&profile)?;
        Ok(CompletionOutcome {
            quest_id: quest_id.to_string(),
            already_completed: false,
            xp_granted: quest.xp_reward,
            level: Some(change),
            profile,
        })
    })?;
    if outcome.already_completed {
        info!(target: "quest", %quest_id, "Quest was already completed");
    } else {
        info!(target: "quest", %quest_id, xp = outcome.xp_granted, level = outcome.profile.level(), "Quest completed");
    }
    Ok(outcome)
}

pub fn list_open_quests(state: &AppState) -> Result<Vec<Quest>> {
    state.store.read(|tx| tx.open_quests())
}

pub fn quest_archive(state: &AppState) -> Result<Vec<Quest>> {
    state.store.read(|tx| tx.completed_quests())
}

#[instrument(level = "info", skip(state))]
pub fn clear_quests(state: &AppState) -> Result<usize> {
    let removed = state.store.transaction(|tx| tx.clear_quests())?;
    info!(target: "quest", removed, "Quest log cleared");
    Ok(removed)
}
