//! Module edits, reward bookkeeping, hall of fame and profile actions.

mod common;

use tempfile::TempDir;

use common::{build_state, input, ScriptedModel};
use uniquest_backend::domain::ModuleStatus;
use uniquest_backend::modules::{self, HallOfFameQuery};
use uniquest_backend::{shop, AppError};

#[tokio::test]
async fn completing_twice_with_reopen_between_grants_twice() {
    let dir = TempDir::new().unwrap();
    let state = build_state(&dir, ScriptedModel::new());
    let id = modules::create_module(&state, input("Algorithms", 5.0, ModuleStatus::Active, None))
        .unwrap()
        .module
        .id;

    let done = modules::update_module(&state, &id, input("Algorithms", 5.0, ModuleStatus::Completed, Some(1.3))).unwrap();
    assert_eq!(done.profile.xp(), 925);
    assert_eq!(done.profile.coins, 92);
    assert!(done.module.xp_awarded);
    assert_eq!(done.module.awarded_xp, Some(925));

    // Grade correction while completed keeps the booked reward.
    let regraded = modules::update_module(&state, &id, input("Algorithms", 5.0, ModuleStatus::Completed, Some(1.0))).unwrap();
    assert_eq!(regraded.profile.xp(), 925);
    assert!(regraded.level.is_none());

    let reopened = modules::update_module(&state, &id, input("Algorithms", 5.0, ModuleStatus::Active, Some(1.0))).unwrap();
    assert_eq!(reopened.profile.xp(), 0);
    assert_eq!(reopened.profile.coins, 0);
    assert!(!reopened.module.xp_awarded);

    let again = modules::update_module(&state, &id, input("Algorithms", 5.0, ModuleStatus::Completed, Some(1.3))).unwrap();
    assert_eq!(again.profile.xp(), 925);
    assert_eq!(state.store.profile().unwrap().level(), 4);
}

#[tokio::test]
async fn creating_a_completed_module_grants_immediately() {
    let dir = TempDir::new().unwrap();
    let state = build_state(&dir, ScriptedModel::new());
    let outcome = modules::create_module(&state, input("Statistics", 6.0, ModuleStatus::Completed, Some(2.0))).unwrap();
    assert_eq!(outcome.profile.xp(), 900);
    assert_eq!(outcome.level.map(|l| l.new_level), Some(4));
    assert_eq!(modules::get_module(&state, &outcome.module.id).unwrap(), outcome.module);
}

#[tokio::test]
async fn invalid_edits_change_nothing() {
    let dir = TempDir::new().unwrap();
    let state = build_state(&dir, ScriptedModel::new());
    let m = modules::create_module(&state, input("Physics", 5.0, ModuleStatus::Active, None)).unwrap().module;

    let err = modules::update_module(&state, &m.id, input("Physics", -1.0, ModuleStatus::Completed, Some(1.0))).unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert_eq!(modules::get_module(&state, &m.id).unwrap(), m);
    assert!(matches!(
        modules::update_module(&state, "ghost", input("X", 1.0, ModuleStatus::Active, None)),
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(modules::delete_module(&state, "ghost"), Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn failed_extraction_leaves_module_untouched() {
    let dir = TempDir::new().unwrap();
    let state = build_state(&dir, ScriptedModel::new());
    let m = modules::create_module(&state, input("Chemistry", 5.0, ModuleStatus::Active, None)).unwrap().module;

    let err = modules::attach_document(&state, &m.id, "/scripts/missing.pdf").await.unwrap_err();
    assert!(matches!(err, AppError::Transport(_)));
    assert!(modules::get_module(&state, &m.id).unwrap().extracted_content.is_none());

    let attached = modules::attach_document(&state, &m.id, "/scripts/chem.pdf").await.unwrap();
    assert!(attached.usable);
    assert_eq!(attached.module.pdf_path.as_deref(), Some("/scripts/chem.pdf"));
}

#[tokio::test]
async fn hall_of_fame_reset_revokes_rewards() {
    let dir = TempDir::new().unwrap();
    let state = build_state(&dir, ScriptedModel::new());
    modules::create_module(&state, input("Analysis", 10.0, ModuleStatus::Completed, Some(1.7))).unwrap();
    modules::create_module(&state, input("Linear Algebra", 5.0, ModuleStatus::Completed, Some(2.3))).unwrap();
    modules::create_module(&state, input("Databases", 5.0, ModuleStatus::Active, None)).unwrap();

    let fame = modules::hall_of_fame(&state, &HallOfFameQuery::default()).unwrap();
    assert_eq!(fame.len(), 2);
    assert_eq!(fame[0].title, "Analysis");

    let stats = modules::stats(&state).unwrap();
    assert_eq!(stats.completed_modules, 2);
    assert_eq!(stats.earned_cp, 15.0);

    let reset = modules::reset_hall_of_fame(&state).unwrap();
    assert_eq!(reset.reset, 2);
    assert_eq!(reset.profile.xp(), 0);
    assert_eq!(reset.profile.coins, 0);
    assert!(modules::hall_of_fame(&state, &HallOfFameQuery::default()).unwrap().is_empty());
    for m in modules::list_modules(&state).unwrap() {
        assert_eq!(m.status, ModuleStatus::Active);
        assert!(m.grade.is_none() && !m.xp_awarded);
    }
}

#[tokio::test]
async fn deleting_a_module_keeps_its_reward() {
    let dir = TempDir::new().unwrap();
    let state = build_state(&dir, ScriptedModel::new());
    let m = modules::create_module(&state, input("Ethics", 3.0, ModuleStatus::Completed, Some(1.0))).unwrap().module;
    modules::delete_module(&state, &m.id).unwrap();
    assert!(modules::list_modules(&state).unwrap().is_empty());
    assert_eq!(state.store.profile().unwrap().xp(), 600);
}

#[tokio::test]
async fn login_twice_a_day_keeps_the_streak() {
    let dir = TempDir::new().unwrap();
    let state = build_state(&dir, ScriptedModel::new());
    let first = shop::record_login(&state).unwrap();
    let second = shop::record_login(&state).unwrap();
    assert_eq!(first.streak, second.streak);
    assert!(second.last_login >= first.last_login);
}

#[tokio::test]
async fn shop_purchases_persist() {
    let dir = TempDir::new().unwrap();
    let state = build_state(&dir, ScriptedModel::new());
    assert!(matches!(
        shop::purchase(&state, "theme-forest"),
        Err(AppError::InsufficientCoins { needed: 500, available: 0 })
    ));

    // 10 cp at grade 1.0 is 2000 xp, 200 coins; three of them buy the forest theme.
    for title in ["A", "B", "C"] {
        modules::create_module(&state, input(title, 10.0, ModuleStatus::Completed, Some(1.0))).unwrap();
    }
    let bought = shop::purchase(&state, "theme-forest").unwrap();
    assert!(bought.purchased);
    assert_eq!(bought.profile.coins, 100);

    let profile = shop::get_profile(&state).unwrap();
    assert_eq!(profile.active_theme, "theme-forest");
    let entries = shop::shop(&state).unwrap();
    assert!(entries.iter().any(|e| e.item.id == "theme-forest" && e.owned && e.active));
    assert!(matches!(shop::purchase(&state, "theme-rainbow"), Err(AppError::NotFound(_))));
}
