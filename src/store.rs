//! SQLite-backed persistent store for modules, quests and the user profile.
//!
//! One connection behind a mutex; every operation is a short critical section.
//! Multi-collection writes go through [`Store::transaction`], which commits on
//! `Ok` and rolls back on `Err`, so either all writes become visible or none do.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use tracing::{info, instrument, warn};

use crate::domain::{Module, ModuleStatus, Quest, QuestCategory, UserProfile, PROFILE_ID};
use crate::error::{AppError, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS modules (
    id                TEXT PRIMARY KEY,
    title             TEXT NOT NULL,
    cp                REAL NOT NULL,
    grade             REAL,
    status            TEXT NOT NULL,
    pdf_path          TEXT,
    extracted_content TEXT,
    xp_awarded        INTEGER NOT NULL DEFAULT 0,
    awarded_xp        INTEGER
);
CREATE INDEX IF NOT EXISTS idx_modules_status ON modules(status);

CREATE TABLE IF NOT EXISTS quests (
    id           TEXT PRIMARY KEY,
    content      TEXT NOT NULL,
    category     TEXT NOT NULL,
    is_completed INTEGER NOT NULL DEFAULT 0,
    xp_reward    INTEGER NOT NULL,
    generated_at TEXT NOT NULL,
    user_answer  TEXT,
    ai_feedback  TEXT
);
CREATE INDEX IF NOT EXISTS idx_quests_completed ON quests(is_completed);
CREATE INDEX IF NOT EXISTS idx_quests_generated_at ON quests(generated_at);

CREATE TABLE IF NOT EXISTS user_profile (
    id             TEXT PRIMARY KEY,
    xp             INTEGER NOT NULL,
    level          INTEGER NOT NULL,
    coins          INTEGER NOT NULL,
    streak         INTEGER NOT NULL,
    last_login     TEXT NOT NULL,
    active_theme   TEXT NOT NULL,
    active_persona TEXT NOT NULL,
    unlocked_items TEXT NOT NULL
);
"#;

const MODULE_COLUMNS: &str =
    "id, title, cp, grade, status, pdf_path, extracted_content, xp_awarded, awarded_xp";
const QUEST_COLUMNS: &str =
    "id, content, category, is_completed, xp_reward, generated_at, user_answer, ai_feedback";
const PROFILE_COLUMNS: &str =
    "id, xp, coins, streak, last_login, active_theme, active_persona, unlocked_items";

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database file and make sure the profile row exists.
    #[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        let store = Self { conn: Mutex::new(conn) };
        store.transaction(|tx| tx.ensure_profile(Utc::now()))?;
        info!(target: "uniquest", "Store ready");
        Ok(store)
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-operation leaves SQLite itself consistent; keep serving.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` inside one transaction: commit on `Ok`, roll back on `Err`.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Tx<'_>) -> Result<T>,
    {
        let mut conn = self.lock_conn();
        let tx = conn.transaction()?;
        let outcome = f(&Tx { conn: &tx });
        match outcome {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback() {
                    warn!(target: "uniquest", error = %rb, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Run read-only queries without opening a transaction.
    pub fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Tx<'_>) -> Result<T>,
    {
        let conn = self.lock_conn();
        f(&Tx { conn: &conn })
    }

    pub fn profile(&self) -> Result<UserProfile> {
        self.read(|tx| tx.profile())
    }

    pub fn module(&self, id: &str) -> Result<Module> {
        self.read(|tx| tx.module(id))
    }

    pub fn quest(&self, id: &str) -> Result<Quest> {
        self.read(|tx| tx.quest(id))
    }
}

/// Query/write handle valid for one `Store::read` or `Store::transaction` call.
pub struct Tx<'c> {
    conn: &'c Connection,
}

impl Tx<'_> {
    // ---- modules ----

    pub fn modules(&self) -> Result<Vec<Module>> {
        let sql = format!("SELECT {MODULE_COLUMNS} FROM modules ORDER BY rowid");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], module_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn modules_by_status(&self, status: ModuleStatus) -> Result<Vec<Module>> {
        let sql = format!("SELECT {MODULE_COLUMNS} FROM modules WHERE status = ?1 ORDER BY rowid");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![status.as_str()], module_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn find_module(&self, id: &str) -> Result<Option<Module>> {
        let sql = format!("SELECT {MODULE_COLUMNS} FROM modules WHERE id = ?1");
        Ok(self.conn.query_row(&sql, params![id], module_from_row).optional()?)
    }

    pub fn module(&self, id: &str) -> Result<Module> {
        self.find_module(id)?.ok_or_else(|| AppError::NotFound(format!("Module {id}")))
    }

    pub fn insert_module(&self, m: &Module) -> Result<()> {
        let sql = format!(
            "INSERT INTO modules ({MODULE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        );
        self.conn.execute(
            &sql,
            params![
                m.id,
                m.title,
                m.cp,
                m.grade,
                m.status.as_str(),
                m.pdf_path,
                m.extracted_content,
                m.xp_awarded,
                m.awarded_xp.map(to_sql_int),
            ],
        )?;
        Ok(())
    }

    pub fn update_module(&self, m: &Module) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE modules SET title = ?2, cp = ?3, grade = ?4, status = ?5, pdf_path = ?6,
                    extracted_content = ?7, xp_awarded = ?8, awarded_xp = ?9
             WHERE id = ?1",
            params![
                m.id,
                m.title,
                m.cp,
                m.grade,
                m.status.as_str(),
                m.pdf_path,
                m.extracted_content,
                m.xp_awarded,
                m.awarded_xp.map(to_sql_int),
            ],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("Module {}", m.id)));
        }
        Ok(())
    }

    /// Returns whether a row was removed.
    pub fn delete_module(&self, id: &str) -> Result<bool> {
        Ok(self.conn.execute("DELETE FROM modules WHERE id = ?1", params![id])? > 0)
    }

    // ---- quests ----

    pub fn quests(&self) -> Result<Vec<Quest>> {
        self.query_quests(&format!("SELECT {QUEST_COLUMNS} FROM quests ORDER BY rowid"))
    }

    pub fn open_quests(&self) -> Result<Vec<Quest>> {
        self.query_quests(&format!(
            "SELECT {QUEST_COLUMNS} FROM quests WHERE is_completed = 0 ORDER BY generated_at DESC"
        ))
    }

    /// Completed quests, most recently generated first.
    pub fn completed_quests(&self) -> Result<Vec<Quest>> {
        self.query_quests(&format!(
            "SELECT {QUEST_COLUMNS} FROM quests WHERE is_completed = 1 ORDER BY generated_at DESC"
        ))
    }

    fn query_quests(&self, sql: &str) -> Result<Vec<Quest>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], quest_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn quest(&self, id: &str) -> Result<Quest> {
        let sql = format!("SELECT {QUEST_COLUMNS} FROM quests WHERE id = ?1");
        self.conn
            .query_row(&sql, params![id], quest_from_row)
            .optional()?
            .ok_or_else(|| AppError::NotFound(format!("Quest {id}")))
    }

    pub fn insert_quests(&self, quests: &[Quest]) -> Result<()> {
        let sql = format!("INSERT INTO quests ({QUEST_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)");
        let mut stmt = self.conn.prepare(&sql)?;
        for q in quests {
            stmt.execute(params![
                q.id,
                q.content,
                q.category.as_str(),
                q.is_completed,
                to_sql_int(q.xp_reward),
                format_ts(&q.generated_at),
                q.user_answer,
                q.ai_feedback,
            ])?;
        }
        Ok(())
    }

    pub fn set_quest_answer(&self, id: &str, answer: &str, feedback: Option<&str>) -> Result<()> {
        let changed = match feedback {
            Some(fb) => self.conn.execute(
                "UPDATE quests SET user_answer = ?2, ai_feedback = ?3 WHERE id = ?1",
                params![id, answer, fb],
            )?,
            None => self.conn.execute(
                "UPDATE quests SET user_answer = ?2 WHERE id = ?1",
                params![id, answer],
            )?,
        };
        if changed == 0 {
            return Err(AppError::NotFound(format!("Quest {id}")));
        }
        Ok(())
    }

    /// Flip the completion flag. Returns `false` if the quest was already completed.
    pub fn mark_quest_completed(&self, id: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE quests SET is_completed = 1 WHERE id = ?1 AND is_completed = 0",
            params![id],
        )?;
        Ok(changed > 0)
    }

    pub fn clear_quests(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM quests", [])?)
    }

    // ---- profile ----

    pub fn profiles(&self) -> Result<Vec<UserProfile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM user_profile ORDER BY rowid");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], profile_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn profile(&self) -> Result<UserProfile> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM user_profile WHERE id = ?1");
        self.conn
            .query_row(&sql, params![PROFILE_ID], profile_from_row)
            .optional()?
            .ok_or_else(|| AppError::NotFound("User profile".into()))
    }

    pub fn insert_profile(&self, p: &UserProfile) -> Result<()> {
        self.write_profile("INSERT", p)
    }

    pub fn save_profile(&self, p: &UserProfile) -> Result<()> {
        self.write_profile("INSERT OR REPLACE", p)
    }

    fn write_profile(&self, verb: &str, p: &UserProfile) -> Result<()> {
        let unlocked = serde_json::to_string(&p.unlocked_items)?;
        let sql = format!(
            "{verb} INTO user_profile (id, xp, level, coins, streak, last_login, active_theme, active_persona, unlocked_items)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        );
        self.conn.execute(
            &sql,
            params![
                p.id,
                to_sql_int(p.xp()),
                p.level(),
                to_sql_int(p.coins),
                p.streak,
                format_ts(&p.last_login),
                p.active_theme,
                p.active_persona,
                unlocked,
            ],
        )?;
        Ok(())
    }

    /// Create the singleton profile with defaults if it does not exist yet.
    pub fn ensure_profile(&self, now: DateTime<Utc>) -> Result<()> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM user_profile WHERE id = ?1)",
            params![PROFILE_ID],
            |r| r.get(0),
        )?;
        if !exists {
            info!(target: "ledger", "Creating default user profile");
            self.insert_profile(&UserProfile::new(now))?;
        }
        Ok(())
    }

    // ---- bulk ----

    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute_batch("DELETE FROM modules; DELETE FROM quests; DELETE FROM user_profile;")?;
        Ok(())
    }
}

fn to_sql_int(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn from_sql_int(v: i64) -> u64 {
    u64::try_from(v).unwrap_or(0)
}

/// Fixed-width RFC 3339 so lexical order in SQLite matches time order.
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn module_from_row(row: &Row<'_>) -> rusqlite::Result<Module> {
    let status: String = row.get(4)?;
    let status = ModuleStatus::parse(&status)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(4, "status".into(), Type::Text))?;
    Ok(Module {
        id: row.get(0)?,
        title: row.get(1)?,
        cp: row.get(2)?,
        grade: row.get(3)?,
        status,
        pdf_path: row.get(5)?,
        extracted_content: row.get(6)?,
        xp_awarded: row.get(7)?,
        awarded_xp: row.get::<_, Option<i64>>(8)?.map(from_sql_int),
    })
}

fn quest_from_row(row: &Row<'_>) -> rusqlite::Result<Quest> {
    let category: String = row.get(2)?;
    let generated_at: String = row.get(5)?;
    Ok(Quest {
        id: row.get(0)?,
        content: row.get(1)?,
        category: QuestCategory::parse(&category).unwrap_or_default(),
        is_completed: row.get(3)?,
        xp_reward: from_sql_int(row.get(4)?),
        generated_at: parse_ts(5, &generated_at)?,
        user_answer: row.get(6)?,
        ai_feedback: row.get(7)?,
    })
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
    let last_login: String = row.get(4)?;
    let unlocked: String = row.get(7)?;
    let unlocked_items: Vec<String> = serde_json::from_str(&unlocked)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;
    Ok(UserProfile::restore(
        row.get(0)?,
        from_sql_int(row.get(1)?),
        from_sql_int(row.get(2)?),
        row.get(3)?,
        parse_ts(4, &last_login)?,
        row.get(5)?,
        row.get(6)?,
        unlocked_items,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn module(id: &str, status: ModuleStatus) -> Module {
        Module {
            id: id.into(),
            title: format!("Module {id}"),
            cp: 5.0,
            grade: None,
            status,
            pdf_path: None,
            extracted_content: None,
            xp_awarded: false,
            awarded_xp: None,
        }
    }

    fn quest(id: &str, completed: bool, age_minutes: i64) -> Quest {
        Quest {
            id: id.into(),
            content: format!("Task {id}"),
            category: QuestCategory::Learning,
            is_completed: completed,
            xp_reward: 50,
            generated_at: Utc::now() - Duration::minutes(age_minutes),
            user_answer: None,
            ai_feedback: None,
        }
    }

    #[test]
    fn creates_default_profile_once() {
        let store = Store::open_in_memory().unwrap();
        let p = store.profile().unwrap();
        assert_eq!(p.id, PROFILE_ID);
        assert_eq!(p.xp(), 0);
        store.transaction(|tx| tx.ensure_profile(Utc::now())).unwrap();
        assert_eq!(store.read(|tx| tx.profiles()).unwrap().len(), 1);
    }

    #[test]
    fn modules_filter_by_status() {
        let store = Store::open_in_memory().unwrap();
        store
            .transaction(|tx| {
                tx.insert_module(&module("a", ModuleStatus::Active))?;
                tx.insert_module(&module("b", ModuleStatus::Completed))?;
                tx.insert_module(&module("c", ModuleStatus::Active))
            })
            .unwrap();
        let active = store.read(|tx| tx.modules_by_status(ModuleStatus::Active)).unwrap();
        let ids: Vec<_> = active.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
    }

    #[test]
    fn failed_transaction_leaves_nothing_behind() {
        let store = Store::open_in_memory().unwrap();
        let res: Result<()> = store.transaction(|tx| {
            tx.insert_module(&module("a", ModuleStatus::Active))?;
            tx.insert_quests(&[quest("q1", false, 0)])?;
            Err(AppError::InvalidInput("boom".into()))
        });
        assert!(res.is_err());
        assert!(store.read(|tx| tx.modules()).unwrap().is_empty());
        assert!(store.read(|tx| tx.quests()).unwrap().is_empty());
    }

    #[test]
    fn unusable_data_dir_is_an_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        let err = Store::open(blocker.join("uniquest.db")).err().unwrap();
        assert!(matches!(err, AppError::Io(_)));
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn quest_queries_split_by_completion_and_recency() {
        let store = Store::open_in_memory().unwrap();
        store
            .transaction(|tx| {
                tx.insert_quests(&[
                    quest("old-done", true, 30),
                    quest("new-done", true, 5),
                    quest("open", false, 10),
                ])
            })
            .unwrap();
        let done = store.read(|tx| tx.completed_quests()).unwrap();
        assert_eq!(done[0].id, "new-done");
        assert_eq!(done[1].id, "old-done");
        let open = store.read(|tx| tx.open_quests()).unwrap();
        assert_eq!(open.len(), 1);
    }

    #[test]
    fn completion_flag_flips_only_once() {
        let store = Store::open_in_memory().unwrap();
        store.transaction(|tx| tx.insert_quests(&[quest("q", false, 0)])).unwrap();
        assert!(store.transaction(|tx| tx.mark_quest_completed("q")).unwrap());
        assert!(!store.transaction(|tx| tx.mark_quest_completed("q")).unwrap());
    }

    #[test]
    fn quest_timestamps_survive_storage() {
        let store = Store::open_in_memory().unwrap();
        let q = quest("q", false, 3);
        store.transaction(|tx| tx.insert_quests(std::slice::from_ref(&q))).unwrap();
        assert_eq!(store.quest("q").unwrap(), q);
    }
}
