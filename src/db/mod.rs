use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::StoreError;

pub mod models;
pub mod store;

use models::*;
pub use store::RunnerStore;

/// Thread-safe SQLite handle (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open the SQLite database at the given path.
    ///
    /// The runners table is owned by the seeding job; call
    /// [`Database::ensure_schema`] only for local setups and tests.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create the runners table if it does not exist (idempotent)
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    // ── Runners ──────────────────────────────────────────────────────────────

    /// Insert a seed row and return its id
    #[cfg(test)]
    pub fn insert_runner(&self, runner: &NewRunner) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO runners (horse_name, track_name, race_date, race_time, odds, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, 1)",
            params![
                runner.horse_name,
                runner.track_name,
                runner.race_date,
                runner.race_time,
                runner.odds,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All runners for one race date
    pub fn list_runners_for_date(&self, race_date: NaiveDate) -> Result<Vec<RunnerRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, horse_name, track_name, odds, previous_odds, race_time,
                    is_active, odds_changed_at, last_updated_at
             FROM runners WHERE race_date = ?1 ORDER BY id",
        )?;
        let runners = stmt
            .query_map(params![race_date], map_runner)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runners)
    }

    /// Fetch a single runner by id
    #[cfg(test)]
    pub fn get_runner(&self, id: i64) -> Result<Option<RunnerRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, horse_name, track_name, odds, previous_odds, race_time,
                    is_active, odds_changed_at, last_updated_at
             FROM runners WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], map_runner)?;
        let runner = rows.next().transpose()?;
        Ok(runner)
    }

    /// Write the fields carried by an update instruction
    pub fn apply_update(&self, update: &UpdateInstruction) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let f = &update.fields;
        let changed = match f.odds {
            Some(odds) => conn.execute(
                "UPDATE runners SET odds=?1, previous_odds=?2, odds_changed_at=?3,
                                    last_updated_at=?4, is_active=?5
                 WHERE id=?6",
                params![
                    odds,
                    f.previous_odds,
                    f.odds_changed_at,
                    f.last_updated_at,
                    f.is_active,
                    update.runner_id,
                ],
            )?,
            None => conn.execute(
                "UPDATE runners SET last_updated_at=?1, is_active=?2 WHERE id=?3",
                params![f.last_updated_at, f.is_active, update.runner_id],
            )?,
        };
        if changed == 0 {
            return Err(StoreError::NotFound(update.runner_id));
        }
        Ok(())
    }
}

#[async_trait]
impl RunnerStore for Database {
    async fn load_day(&self, race_date: NaiveDate) -> Result<Vec<RunnerRecord>, StoreError> {
        self.list_runners_for_date(race_date)
    }

    async fn update_runner(&self, update: &UpdateInstruction) -> Result<(), StoreError> {
        self.apply_update(update)
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn map_runner(row: &rusqlite::Row) -> rusqlite::Result<RunnerRecord> {
    Ok(RunnerRecord {
        id: row.get(0)?,
        horse_name: row.get(1)?,
        track_name: row.get(2)?,
        odds: row.get(3)?,
        previous_odds: row.get(4)?,
        race_time: row.get(5)?,
        is_active: row.get(6)?,
        odds_changed_at: row.get(7)?,
        last_updated_at: row.get(8)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS runners (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    horse_name      TEXT    NOT NULL,
    track_name      TEXT    NOT NULL,
    race_date       TEXT    NOT NULL,
    race_time       TEXT,
    odds            REAL    NOT NULL CHECK (odds > 0),
    previous_odds   REAL,
    is_active       INTEGER NOT NULL DEFAULT 1,
    odds_changed_at TEXT,
    last_updated_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_runners_race_date ON runners(race_date);
"#;
