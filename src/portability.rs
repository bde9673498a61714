//! Backup export and import of the whole store.
//!
//! File format:
//! `{"version": 1, "timestamp": <RFC 3339>, "data": {"modules": [..], "quests": [..], "userProfile": [..]}}`
//!
//! Import validates the complete file before touching the store, then replaces all
//! three collections inside a single transaction.

use std::collections::HashSet;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::domain::{Module, Quest, UserProfile};
use crate::error::{AppError, Result};
use crate::gamification::booked_reward;
use crate::store::Store;

pub const BACKUP_VERSION: u32 = 1;

const COLLECTIONS: [&str; 3] = ["modules", "quests", "userProfile"];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupData {
    pub modules: Vec<Module>,
    pub quests: Vec<Quest>,
    pub user_profile: Vec<UserProfile>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Backup {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    pub data: BackupData,
}

#[derive(Clone, Debug)]
pub struct ExportFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSummary {
    pub modules: usize,
    pub quests: usize,
    pub profiles: usize,
}

/// Suggested download name, dated by the local calendar day.
pub fn backup_file_name(now: DateTime<Utc>) -> String {
    format!("quest-tracker-backup-{}.json", now.with_timezone(&Local).format("%Y-%m-%d"))
}

#[instrument(level = "info", skip(store))]
pub fn export(store: &Store, now: DateTime<Utc>) -> Result<ExportFile> {
    let data = store.read(|tx| {
        Ok(BackupData { modules: tx.modules()?, quests: tx.quests()?, user_profile: tx.profiles()? })
    })?;
    let summary = BackupSummary {
        modules: data.modules.len(),
        quests: data.quests.len(),
        profiles: data.user_profile.len(),
    };
    let backup = Backup { version: BACKUP_VERSION, timestamp: now, data };
    let bytes = serde_json::to_vec_pretty(&backup)?;
    info!(target: "portability", ?summary, bytes = bytes.len(), "Backup exported");
    Ok(ExportFile { file_name: backup_file_name(now), bytes })
}

/// Parse and fully validate a backup without touching the store.
pub fn parse_backup(bytes: &[u8]) -> Result<BackupData> {
    let root: Value = serde_json::from_slice(bytes)
        .map_err(|e| AppError::InvalidImportFile(format!("not valid JSON: {e}")))?;
    let data = root
        .get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| AppError::InvalidImportFile("missing data section".into()))?;
    for key in COLLECTIONS {
        if !data.get(key).is_some_and(Value::is_array) {
            return Err(AppError::InvalidImportFile(format!("data.{key} must be an array")));
        }
    }
    if let Some(v) = root.get("version").and_then(Value::as_u64) {
        if v != u64::from(BACKUP_VERSION) {
            warn!(target: "portability", version = v, "Importing backup with unexpected version");
        }
    }

    let parsed: BackupData = serde_json::from_value(Value::Object(data.clone()))
        .map_err(|e| AppError::InvalidImportFile(format!("malformed entry: {e}")))?;

    let mut seen = HashSet::new();
    if let Some(dup) = parsed.modules.iter().find(|m| !seen.insert(m.id.as_str())) {
        return Err(AppError::InvalidImportFile(format!("duplicate module id {}", dup.id)));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = parsed.quests.iter().find(|q| !seen.insert(q.id.as_str())) {
        return Err(AppError::InvalidImportFile(format!("duplicate quest id {}", dup.id)));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = parsed.user_profile.iter().find(|p| !seen.insert(p.id.as_str())) {
        return Err(AppError::InvalidImportFile(format!("duplicate profile id {}", dup.id)));
    }

    let modules = parsed
        .modules
        .into_iter()
        .map(|mut m| {
            if m.xp_awarded && m.awarded_xp.is_none() {
                m.awarded_xp = Some(booked_reward(&m));
            }
            m
        })
        .collect();
    Ok(BackupData {
        modules,
        quests: parsed.quests,
        user_profile: parsed.user_profile.into_iter().map(UserProfile::normalized).collect(),
    })
}

/// Replace the entire store with the backup's contents. Nothing is written unless
/// the whole file validates, and the replacement commits or rolls back as one unit.
#[instrument(level = "info", skip(store, bytes), fields(bytes = bytes.len()))]
pub fn import(store: &Store, bytes: &[u8]) -> Result<BackupSummary> {
    let data = parse_backup(bytes).map_err(|e| {
        warn!(target: "portability", error = %e, "Backup rejected");
        e
    })?;
    let summary = BackupSummary {
        modules: data.modules.len(),
        quests: data.quests.len(),
        profiles: data.user_profile.len(),
    };
    store.transaction(|tx| {
        tx.clear_all()?;
        for m in &data.modules {
            tx.insert_module(m)?;
        }
        tx.insert_quests(&data.quests)?;
        for p in &data.user_profile {
            tx.insert_profile(p)?;
        }
        // A backup without the main profile still leaves a usable store.
        tx.ensure_profile(Utc::now())
    })?;
    info!(target: "portability", ?summary, "Backup imported");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn file_name_uses_local_date() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap().with_timezone(&Utc);
        assert_eq!(backup_file_name(now), "quest-tracker-backup-2024-03-09.json");
    }

    #[test]
    fn missing_collections_are_rejected() {
        for body in [
            r#"{"version":1,"data":{"modules":[],"quests":[]}}"#,
            r#"{"version":1,"data":{"modules":[],"quests":{},"userProfile":[]}}"#,
            r#"{"version":1}"#,
            "not json",
        ] {
            assert!(matches!(parse_backup(body.as_bytes()), Err(AppError::InvalidImportFile(_))), "{body}");
        }
    }

    #[test]
    fn empty_collections_are_valid() {
        let data = parse_backup(br#"{"version":1,"data":{"modules":[],"quests":[],"userProfile":[]}}"#).unwrap();
        assert!(data.modules.is_empty() && data.quests.is_empty() && data.user_profile.is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let body = r#"{"data":{"modules":[
            {"id":"m","title":"A","cp":5},
            {"id":"m","title":"B","cp":5}
        ],"quests":[],"userProfile":[]}}"#;
        assert!(matches!(parse_backup(body.as_bytes()), Err(AppError::InvalidImportFile(_))));
    }

    #[test]
    fn imported_levels_are_rederived() {
        let body = r#"{"data":{"modules":[],"quests":[],"userProfile":[
            {"id":"main_user","xp":2500,"level":99,"coins":3,"streak":2,"lastLogin":"2024-05-01T08:00:00Z"}
        ]}}"#;
        let data = parse_backup(body.as_bytes()).unwrap();
        assert_eq!(data.user_profile[0].level(), 6);
    }

    #[test]
    fn flag_only_rewards_get_their_amount_filled_in() {
        let body = r#"{"data":{"modules":[
            {"id":"a","title":"A","cp":5,"grade":1.3,"status":"completed","xpAwarded":true},
            {"id":"b","title":"B","cp":5,"grade":1.0,"status":"completed","xpAwarded":true,"awardedXp":700},
            {"id":"c","title":"C","cp":5,"status":"active"}
        ],"quests":[],"userProfile":[]}}"#;
        let data = parse_backup(body.as_bytes()).unwrap();
        let amounts: Vec<_> = data.modules.iter().map(|m| m.awarded_xp).collect();
        assert_eq!(amounts, vec![Some(925), Some(700), None]);
    }

    #[test]
    fn import_without_profile_keeps_store_usable() {
        let store = Store::open_in_memory().unwrap();
        let summary = import(&store, br#"{"data":{"modules":[],"quests":[],"userProfile":[]}}"#).unwrap();
        assert_eq!(summary.profiles, 0);
        assert_eq!(store.profile().unwrap().xp(), 0);
    }
}
