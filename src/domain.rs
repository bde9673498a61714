//! Domain models: course modules, generated quests and the singleton user profile.
//!
//! Field names serialize in camelCase; the same shapes are written to backup files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed key of the single profile row.
pub const PROFILE_ID: &str = "main_user";

pub const DEFAULT_THEME: &str = "theme-default";
pub const DEFAULT_PERSONA: &str = "persona-default";

/// Where a module sits in the study plan.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
  Locked,
  Active,
  Completed,
}
impl Default for ModuleStatus {
  fn default() -> Self { ModuleStatus::Active }
}

impl ModuleStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      ModuleStatus::Locked => "locked",
      ModuleStatus::Active => "active",
      ModuleStatus::Completed => "completed",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "locked" => Some(ModuleStatus::Locked),
      "active" => Some(ModuleStatus::Active),
      "completed" => Some(ModuleStatus::Completed),
      _ => None,
    }
  }
}

/// A course unit with credit weight and (once completed) a grade.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Module {
  pub id: String,
  pub title: String,
  /// Credit points; positive, may be fractional (e.g. 7.5).
  pub cp: f64,
  #[serde(default)] pub grade: Option<f64>,
  #[serde(default)] pub status: ModuleStatus,
  #[serde(default)] pub pdf_path: Option<String>,
  #[serde(default)] pub extracted_content: Option<String>,
  /// True while the reward for the current completion is booked on the profile.
  #[serde(default)] pub xp_awarded: bool,
  /// Amount booked at grant time; revocation uses this instead of recomputing.
  #[serde(default)] pub awarded_xp: Option<u64>,
}

impl Module {
  pub fn is_completed_with_grade(&self) -> bool {
    self.status == ModuleStatus::Completed && self.grade.is_some()
  }
}

/// What kind of study task a quest is.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestCategory {
  Review,
  Learning,
  Prep,
}
impl Default for QuestCategory {
  fn default() -> Self { QuestCategory::Learning }
}

impl QuestCategory {
  pub fn as_str(&self) -> &'static str {
    match self {
      QuestCategory::Review => "review",
      QuestCategory::Learning => "learning",
      QuestCategory::Prep => "prep",
    }
  }

  /// Lenient parse used on model output ("Review", " prep ").
  pub fn parse(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "review" => Some(QuestCategory::Review),
      "learning" => Some(QuestCategory::Learning),
      "prep" => Some(QuestCategory::Prep),
      _ => None,
    }
  }
}

/// A single model-generated task.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
  pub id: String,
  pub content: String,
  #[serde(rename = "type", default)]
  pub category: QuestCategory,
  #[serde(default)] pub is_completed: bool,
  pub xp_reward: u64,
  pub generated_at: DateTime<Utc>,
  #[serde(default)] pub user_answer: Option<String>,
  #[serde(default)] pub ai_feedback: Option<String>,
}

/// Singleton progress aggregate. `level` always equals `level_for(xp)`; only
/// `set_xp` writes either field.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
  pub id: String,
  xp: u64,
  level: u32,
  pub coins: u64,
  pub streak: u32,
  pub last_login: DateTime<Utc>,
  #[serde(default = "default_theme")] pub active_theme: String,
  #[serde(default = "default_persona")] pub active_persona: String,
  #[serde(default = "default_unlocked")] pub unlocked_items: Vec<String>,
}

fn default_theme() -> String { DEFAULT_THEME.to_string() }
fn default_persona() -> String { DEFAULT_PERSONA.to_string() }
fn default_unlocked() -> Vec<String> { vec![default_theme(), default_persona()] }

impl UserProfile {
  /// Fresh profile created on first startup.
  pub fn new(now: DateTime<Utc>) -> Self {
    Self {
      id: PROFILE_ID.to_string(),
      xp: 0,
      level: 1,
      coins: 0,
      streak: 1,
      last_login: now,
      active_theme: default_theme(),
      active_persona: default_persona(),
      unlocked_items: default_unlocked(),
    }
  }

  /// Rebuild a profile from stored columns; the level is always re-derived.
  #[allow(clippy::too_many_arguments)]
  pub fn restore(
    id: String,
    xp: u64,
    coins: u64,
    streak: u32,
    last_login: DateTime<Utc>,
    active_theme: String,
    active_persona: String,
    unlocked_items: Vec<String>,
  ) -> Self {
    Self {
      id,
      xp,
      level: crate::gamification::level_for(xp),
      coins,
      streak,
      last_login,
      active_theme,
      active_persona,
      unlocked_items,
    }
  }

  pub fn xp(&self) -> u64 { self.xp }
  pub fn level(&self) -> u32 { self.level }

  /// Set experience and recompute the derived level.
  pub fn set_xp(&mut self, xp: u64) {
    self.xp = xp;
    self.level = crate::gamification::level_for(xp);
  }

  /// Re-derive `level` from `xp` (used after deserializing foreign data).
  pub fn normalized(mut self) -> Self {
    let xp = self.xp;
    self.set_xp(xp);
    self
  }

  pub fn has_unlocked(&self, item_id: &str) -> bool {
    self.unlocked_items.iter().any(|i| i == item_id)
  }
}
