//! Reward ledger: level curve, module rewards, grant/revoke and login streaks.
//!
//! Everything here is pure and operates on an explicitly passed `UserProfile`;
//! callers persist the result inside a store transaction together with the
//! module/quest write that triggered it.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{Module, ModuleStatus, UserProfile};

/// Experience points per credit point before the grade multiplier.
const XP_PER_CREDIT: f64 = 50.0;
/// Grades run from 1.0 (best) to 5.0 (fail); the multiplier is `5.0 - grade`.
const WORST_GRADE_TENTHS: i64 = 50;
/// One coin per this many experience points granted.
const XP_PER_COIN: u64 = 10;

/// Level reached with `xp` experience: `floor(sqrt(xp / 100)) + 1`.
pub fn level_for(xp: u64) -> u32 {
  ((xp as f64 / 100.0).sqrt().floor() as u32).saturating_add(1)
}

/// Experience awarded for completing a module with `cp` credits and `grade`.
/// Better (lower) grades multiply the base; the multiplier never drops below 1.
pub fn reward_for(cp: f64, grade: f64) -> u64 {
  if !cp.is_finite() || cp <= 0.0 {
    return 0;
  }
  // Grades are given to one decimal; work in tenths so 5 - 1.3 is exactly 3.7.
  let factor_tenths = if grade.is_finite() {
    (WORST_GRADE_TENTHS - (grade * 10.0).round() as i64).max(10)
  } else {
    10
  };
  (cp * XP_PER_CREDIT * factor_tenths as f64 / 10.0).floor() as u64
}

pub fn coins_for(amount: u64) -> u64 {
  amount / XP_PER_COIN
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LevelChange {
  pub new_level: u32,
  pub leveled_up: bool,
}

pub fn grant_reward(profile: &mut UserProfile, amount: u64) -> LevelChange {
  let old_level = profile.level();
  profile.set_xp(profile.xp().saturating_add(amount));
  profile.coins = profile.coins.saturating_add(coins_for(amount));
  let new_level = profile.level();
  debug!(target: "ledger", amount, xp = profile.xp(), coins = profile.coins, new_level, "Reward granted");
  LevelChange { new_level, leveled_up: new_level > old_level }
}

/// Take back a previously granted amount. Both totals saturate at zero.
pub fn revoke_reward(profile: &mut UserProfile, amount: u64) {
  let coins = coins_for(amount);
  if amount > profile.xp() || coins > profile.coins {
    warn!(target: "ledger", amount, xp = profile.xp(), coins = profile.coins, "Revoking more than the ledger holds; clamping at zero");
  }
  profile.set_xp(profile.xp().saturating_sub(amount));
  profile.coins = profile.coins.saturating_sub(coins);
  debug!(target: "ledger", amount, xp = profile.xp(), coins = profile.coins, "Reward revoked");
}

/// Update the login streak for a visit at `now`, comparing local calendar days.
/// Repeated calls on the same day leave the streak untouched.
pub fn apply_login_streak(profile: &mut UserProfile, now: DateTime<Utc>) -> u32 {
  let today = now.with_timezone(&Local).date_naive();
  let last = profile.last_login.with_timezone(&Local).date_naive();
  let elapsed = (today - last).num_days();

  if elapsed == 1 {
    profile.streak = profile.streak.saturating_add(1);
  } else if elapsed > 1 {
    profile.streak = 1;
  }
  profile.last_login = now;
  profile.streak
}

/// Ledger effect of a module edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RewardAction {
  None,
  Grant(u64),
  Revoke(u64),
}

/// Decide the ledger effect of replacing `before` with `after`.
///
/// `{no-reward} --completed with grade--> {granted} --leaves completed--> {no-reward}`.
/// A granted module that stays completed keeps its booked reward.
pub fn plan_transition(before: &Module, after: &Module) -> RewardAction {
  if before.xp_awarded {
    if after.status != ModuleStatus::Completed {
      return RewardAction::Revoke(booked_reward(before));
    }
    return RewardAction::None;
  }
  match (after.status, after.grade) {
    (ModuleStatus::Completed, Some(grade)) => RewardAction::Grant(reward_for(after.cp, grade)),
    _ => RewardAction::None,
  }
}

/// Amount booked for a rewarded module. Older backups only carry the `xpAwarded`
/// flag, so a missing amount is recomputed from the module's credits and grade.
pub fn booked_reward(module: &Module) -> u64 {
  if !module.xp_awarded {
    return 0;
  }
  module
    .awarded_xp
    .or_else(|| module.grade.map(|grade| reward_for(module.cp, grade)))
    .unwrap_or(0)
}

/// Apply `action` to the profile and the edited module's reward flags.
pub fn apply_transition(
  action: RewardAction,
  module: &mut Module,
  profile: &mut UserProfile,
) -> Option<LevelChange> {
  match action {
    RewardAction::None => None,
    RewardAction::Grant(amount) => {
      if module.xp_awarded {
        warn!(target: "ledger", module = %module.id, "Module already rewarded; skipping grant");
        return None;
      }
      module.xp_awarded = true;
      module.awarded_xp = Some(amount);
      Some(grant_reward(profile, amount))
    }
    RewardAction::Revoke(amount) => {
      revoke_reward(profile, amount);
      module.xp_awarded = false;
      module.awarded_xp = None;
      None
    }
  }
}
