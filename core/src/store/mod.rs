//! SQLite persistence layer: the optional run recorder.
//!
//! RULE: Only the store talks to the database.
//! The engine calls store methods; nothing else executes SQL.
//!
//! The recorder is an audit trail, not the source of truth: gameplay
//! never reads back from it.

use crate::{
    action::ActionSource,
    error::SimResult,
    event::{ActionLogEntry, ActionLogKind, EventLogEntry},
    result::ActionCode,
    types::TimeMs,
};
use rusqlite::{params, types::Type, Connection, OptionalExtension};
use serde::de::DeserializeOwned;

pub struct SimStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

/// One row of the `run` table.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub run_id: String,
    pub seed: u64,
    pub version: String,
    pub started_at: String,
    pub ended_at_ms: Option<TimeMs>,
    pub winner_id: Option<String>,
}

/// Decode a SCREAMING_SNAKE / dotted enum tag stored as TEXT.
fn tag_column<T: DeserializeOwned>(value: String, column: usize) -> rusqlite::Result<T> {
    serde_json::from_value(serde_json::Value::String(value))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn json_column(value: String, column: usize) -> rusqlite::Result<serde_json::Value> {
    serde_json::from_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

impl SimStore {
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, seed: u64, version: &str, started_at: &str) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, seed, version, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, seed as i64, version, started_at],
        )?;
        Ok(())
    }

    pub fn finish_run(&self, run_id: &str, ended_at_ms: TimeMs, winner_id: Option<&str>) -> SimResult<()> {
        self.conn.execute(
            "UPDATE run SET ended_at_ms = ?2, winner_id = ?3 WHERE run_id = ?1",
            params![run_id, ended_at_ms as i64, winner_id],
        )?;
        Ok(())
    }

    pub fn run(&self, run_id: &str) -> SimResult<Option<RunRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT run_id, seed, version, started_at, ended_at_ms, winner_id
                 FROM run WHERE run_id = ?1",
                params![run_id],
                |row| {
                    Ok(RunRecord {
                        run_id: row.get(0)?,
                        seed: row.get::<_, i64>(1)? as u64,
                        version: row.get(2)?,
                        started_at: row.get(3)?,
                        ended_at_ms: row.get::<_, Option<i64>>(4)?.map(|v| v as u64),
                        winner_id: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (run_id, at_ms, subsystem, event_type, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.run_id,
                entry.at_ms as i64,
                entry.subsystem,
                entry.event_type,
                entry.payload,
            ],
        )?;
        Ok(())
    }

    /// Every event of a run in insertion order.
    pub fn events_for_run(&self, run_id: &str) -> SimResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, at_ms, subsystem, event_type, payload
             FROM event_log WHERE run_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    run_id: row.get(1)?,
                    at_ms: row.get::<_, i64>(2)? as u64,
                    subsystem: row.get(3)?,
                    event_type: row.get(4)?,
                    payload: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, run_id: &str, event_type: &str) -> SimResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE run_id = ?1 AND event_type = ?2",
            params![run_id, event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ── Action log ─────────────────────────────────────────────

    pub fn append_action(&self, run_id: &str, entry: &ActionLogEntry) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO action_log
                (run_id, seq, at_ms, kind, source, player_id, action_type, code, message, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                run_id,
                entry.seq as i64,
                entry.at_ms as i64,
                entry.kind.as_str(),
                entry.source.as_str(),
                entry.player_id,
                entry.action_type,
                entry.code.as_str(),
                entry.message,
                serde_json::to_string(&entry.payload)?,
            ],
        )?;
        Ok(())
    }

    pub fn action_log_for_run(&self, run_id: &str) -> SimResult<Vec<ActionLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, at_ms, kind, source, player_id, action_type, code, message, payload
             FROM action_log WHERE run_id = ?1
             ORDER BY seq ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| {
                Ok(ActionLogEntry {
                    seq: row.get::<_, i64>(0)? as u64,
                    at_ms: row.get::<_, i64>(1)? as u64,
                    kind: tag_column::<ActionLogKind>(row.get(2)?, 2)?,
                    source: tag_column::<ActionSource>(row.get(3)?, 3)?,
                    player_id: row.get(4)?,
                    action_type: row.get(5)?,
                    code: tag_column::<ActionCode>(row.get(6)?, 6)?,
                    message: row.get(7)?,
                    payload: json_column(row.get(8)?, 8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // ── Snapshot ───────────────────────────────────────────────

    pub fn save_snapshot(&self, run_id: &str, at_ms: TimeMs, state_json: &str) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO snapshot (run_id, at_ms, state_json) VALUES (?1, ?2, ?3)",
            params![run_id, at_ms as i64, state_json],
        )?;
        Ok(())
    }

    /// The most recent snapshot taken at or before `at_ms`.
    pub fn latest_snapshot_before(
        &self,
        run_id: &str,
        at_ms: TimeMs,
    ) -> SimResult<Option<(TimeMs, String)>> {
        let result = self
            .conn
            .query_row(
                "SELECT at_ms, state_json FROM snapshot
                 WHERE run_id = ?1 AND at_ms <= ?2
                 ORDER BY at_ms DESC, id DESC LIMIT 1",
                params![run_id, at_ms as i64],
                |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(result)
    }
}
