//! SQLite-based persistent storage for interaction records

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

use super::{Feedback, InteractionRecord};

const SELECT_COLUMNS: &str =
    "id, timestamp, user_message, ai_response, feedback, curated_response";

/// SQLite-backed interaction store
///
/// Every operation opens a fresh connection, runs its statement(s) and drops
/// the connection again. Nothing is held open between calls.
#[derive(Debug, Clone)]
pub struct InteractionStore {
    path: PathBuf,
}

impl InteractionStore {
    /// Open (and initialize) the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let store = Self { path };
        store.initialize()?;
        Ok(store)
    }

    /// Path of the backing database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.path)
            .with_context(|| format!("Failed to open database {}", self.path.display()))
    }

    /// Create the table if missing and add columns introduced after the
    /// first schema version. Safe to run on every start.
    pub fn initialize(&self) -> Result<()> {
        let conn = self.connect()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS chat_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TIMESTAMP NOT NULL,
                user_message TEXT NOT NULL,
                ai_response TEXT NOT NULL,
                feedback INTEGER DEFAULT NULL,
                curated_response TEXT DEFAULT NULL
            );
        "#,
        )
        .context("Failed to create chat_history table")?;

        Self::ensure_curated_column(&conn)?;

        Ok(())
    }

    /// Older databases were created without `curated_response`
    fn ensure_curated_column(conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare("PRAGMA table_info(chat_history)")?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if !columns.iter().any(|name| name == "curated_response") {
            conn.execute(
                "ALTER TABLE chat_history ADD COLUMN curated_response TEXT DEFAULT NULL",
                [],
            )
            .context("Failed to add curated_response column")?;
            tracing::info!("Migrated chat_history: added curated_response column");
        }

        Ok(())
    }

    /// Insert a new exchange and return its id
    pub fn create_record(
        &self,
        timestamp: DateTime<Utc>,
        prompt: &str,
        response: &str,
    ) -> Result<i64> {
        let conn = self.connect()?;

        conn.execute(
            r#"INSERT INTO chat_history (timestamp, user_message, ai_response)
               VALUES (?1, ?2, ?3)"#,
            params![format_timestamp(&timestamp), prompt, response],
        )
        .context("Failed to insert interaction record")?;

        let id = conn.last_insert_rowid();
        tracing::info!("Stored interaction record {}", id);
        Ok(id)
    }

    /// Load one record by id
    pub fn get_record(&self, id: i64) -> Result<Option<InteractionRecord>> {
        let conn = self.connect()?;

        let record = conn
            .query_row(
                &format!("SELECT {} FROM chat_history WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                row_to_record,
            )
            .optional()?;

        Ok(record)
    }

    /// Set thumbs up/down. Returns `false` when no row has that id.
    pub fn set_feedback(&self, id: i64, is_positive: bool) -> Result<bool> {
        let conn = self.connect()?;

        let feedback = Feedback::from_positive(is_positive);
        let changed = conn.execute(
            "UPDATE chat_history SET feedback = ?1 WHERE id = ?2",
            params![feedback.to_column(), id],
        )?;

        tracing::debug!("Feedback {} for record {} ({} row(s))", feedback, id, changed);
        Ok(changed > 0)
    }

    /// Store a human-written replacement answer. Returns `false` when no row
    /// has that id.
    pub fn set_curated_response(&self, id: i64, text: &str) -> Result<bool> {
        let conn = self.connect()?;

        let changed = conn.execute(
            "UPDATE chat_history SET curated_response = ?1 WHERE id = ?2",
            params![text, id],
        )?;

        if changed > 0 {
            tracing::info!("Stored curated response for record {}", id);
        }
        Ok(changed > 0)
    }

    /// Records the matcher may reuse, most recent first
    pub fn reusable_candidates(&self) -> Result<Vec<InteractionRecord>> {
        let conn = self.connect()?;

        let mut stmt = conn.prepare(&format!(
            r#"SELECT {} FROM chat_history
               WHERE feedback = 1 OR curated_response IS NOT NULL
               ORDER BY timestamp DESC, id DESC"#,
            SELECT_COLUMNS
        ))?;

        let records = stmt
            .query_map([], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Reusable answer for a new prompt, if any earlier one is close enough
    pub fn find_reusable_answer(&self, prompt: &str) -> Option<String> {
        super::matcher::find_reusable_answer(self, prompt, super::matcher::DEFAULT_OVERLAP_THRESHOLD)
    }

    /// Most recent records, newest first
    pub fn list_recent(&self, limit: usize) -> Result<Vec<InteractionRecord>> {
        let conn = self.connect()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM chat_history ORDER BY timestamp DESC, id DESC LIMIT ?1",
            SELECT_COLUMNS
        ))?;

        let records = stmt
            .query_map(params![limit as i64], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Aggregate counts for the `stats` command
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.connect()?;

        let stats = conn.query_row(
            r#"SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN feedback = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN feedback = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN feedback IS NULL THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN curated_response IS NOT NULL THEN 1 ELSE 0 END), 0)
               FROM chat_history"#,
            [],
            |row| {
                Ok(StoreStats {
                    total_records: row.get::<_, i64>(0)? as usize,
                    positive: row.get::<_, i64>(1)? as usize,
                    negative: row.get::<_, i64>(2)? as usize,
                    unrated: row.get::<_, i64>(3)? as usize,
                    curated: row.get::<_, i64>(4)? as usize,
                })
            },
        )?;

        Ok(stats)
    }
}

/// History database statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total_records: usize,
    pub positive: usize,
    pub negative: usize,
    pub unrated: usize,
    pub curated: usize,
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse RFC 3339, or the naive ISO-8601 form older rows were written in
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<InteractionRecord> {
    let raw_ts: String = row.get(1)?;
    let timestamp = parse_timestamp(&raw_ts).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("invalid timestamp: {}", raw_ts).into(),
        )
    })?;

    Ok(InteractionRecord {
        id: row.get(0)?,
        timestamp,
        prompt: row.get(2)?,
        response: row.get(3)?,
        feedback: Feedback::from_column(row.get(4)?),
        curated_response: row.get(5)?,
    })
}
