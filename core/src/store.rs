//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database.
//! Sessions call store methods — they never execute SQL directly.

use rusqlite::{params, Connection, OptionalExtension};
use crate::{
    error::StageResult,
    event::EventLogEntry,
    types::Frame,
};

pub struct StageStore {
    conn: Connection,
}

impl StageStore {
    /// Open (or create) the session database at `path`.
    pub fn open(path: &str) -> StageResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only matters for real files; in-memory ignores it.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> StageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> StageResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Session ────────────────────────────────────────────────

    pub fn insert_session(
        &self,
        session_id: &str,
        stage_id: &str,
        seed: u64,
        version: &str,
    ) -> StageResult<()> {
        self.conn.execute(
            "INSERT INTO session (session_id, stage_id, seed, version, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session_id,
                stage_id,
                seed as i64,
                version,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn session_exists(&self, session_id: &str) -> StageResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM session WHERE session_id = ?1",
                params![session_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> StageResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (session_id, frame, source, event_type, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.session_id,
                entry.frame as i64,
                entry.source,
                entry.event_type,
                entry.payload,
            ],
        )?;
        Ok(())
    }

    /// All events of a session in emission order.
    pub fn events_for_session(&self, session_id: &str) -> StageResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, frame, source, event_type, payload
             FROM event_log WHERE session_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![session_id], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    session_id: row.get(1)?,
                    frame: row.get::<_, i64>(2)? as u64,
                    source: row.get(3)?,
                    event_type: row.get(4)?,
                    payload: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, session_id: &str, event_type: &str) -> StageResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE session_id = ?1 AND event_type = ?2",
            params![session_id, event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ── Snapshot ───────────────────────────────────────────────

    pub fn save_snapshot(&self, session_id: &str, frame: Frame, state_json: &str) -> StageResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO snapshot (session_id, frame, state_json) VALUES (?1, ?2, ?3)",
            params![session_id, frame as i64, state_json],
        )?;
        Ok(())
    }

    pub fn latest_snapshot_before(
        &self,
        session_id: &str,
        frame: Frame,
    ) -> StageResult<Option<(Frame, String)>> {
        let result = self
            .conn
            .query_row(
                "SELECT frame, state_json FROM snapshot
                 WHERE session_id = ?1 AND frame <= ?2
                 ORDER BY frame DESC LIMIT 1",
                params![session_id, frame as i64],
                |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(result)
    }

    // ── Saved stage counters ───────────────────────────────────

    pub fn save_stage_state(&self, stage_id: &str, payload: &str) -> StageResult<()> {
        self.conn.execute(
            "INSERT INTO stage_save (stage_id, payload, saved_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(stage_id) DO UPDATE SET payload = excluded.payload,
                                                 saved_at = excluded.saved_at",
            params![stage_id, payload, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn load_stage_state(&self, stage_id: &str) -> StageResult<Option<String>> {
        let payload = self
            .conn
            .query_row(
                "SELECT payload FROM stage_save WHERE stage_id = ?1",
                params![stage_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(payload)
    }

    pub fn clear_stage_state(&self, stage_id: &str) -> StageResult<()> {
        self.conn.execute(
            "DELETE FROM stage_save WHERE stage_id = ?1",
            params![stage_id],
        )?;
        Ok(())
    }
}
