//! Append-only cache event log.
//!
//! Every lookup, write, and invalidation appends one row. The log is for
//! diagnostics only; `get`/`set` correctness never depends on it.

use super::connection::CacheDb;
use crate::Error;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// Kinds of events the engine records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Hit,
    Miss,
    Set,
    InvalidateAll,
    InvalidateBrand,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Hit => "hit",
            EventKind::Miss => "miss",
            EventKind::Set => "set",
            EventKind::InvalidateAll => "invalidate_all",
            EventKind::InvalidateBrand => "invalidate_brand",
        }
    }
}

/// One recorded cache event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEvent {
    pub id: i64,
    pub kind: String,
    pub created_at: String,
    pub details: Option<String>,
}

impl CacheDb {
    /// Append one event to the log.
    pub async fn append_event(&self, kind: EventKind, details: Option<String>) -> Result<(), Error> {
        let created_at = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_events (kind, created_at, details) VALUES (?1, ?2, ?3)",
                    params![kind.as_str(), created_at, details],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// The most recent events, newest first.
    pub async fn recent_events(&self, limit: usize) -> Result<Vec<CacheEvent>, Error> {
        let limit = limit as i64;
        self.conn
            .call(move |conn| -> Result<Vec<CacheEvent>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, kind, created_at, details FROM cache_events
                    ORDER BY id DESC
                    LIMIT ?1",
                )?;

                let events = stmt
                    .query_map(params![limit], |row| {
                        Ok(CacheEvent {
                            id: row.get(0)?,
                            kind: row.get(1)?,
                            created_at: row.get(2)?,
                            details: row.get(3)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(events)
            })
            .await
            .map_err(Error::from)
    }
}
