//! Cache statistics: durable per-entry totals plus session hit/miss counters.
//!
//! Session counters live in memory on the engine value and reset with the
//! process; the per-entry totals are aggregated from the store on demand.

use super::connection::CacheDb;
use crate::Error;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_rusqlite::params;

/// Process-lifetime hit/miss counters observed by `get`.
///
/// Owned by the engine instance rather than a module-level global, so tests
/// (and any second engine in the same process) count independently. Relaxed
/// increments are enough: a lost increment under heavy contention is
/// tolerable, corruption is not, and atomics rule the latter out.
#[derive(Debug, Default)]
pub(crate) struct SessionCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SessionCounters {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn totals(&self) -> (u64, u64) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }
}

/// Aggregate statistics over the cache.
///
/// `stored_hits` sums the per-entry hit counters of live entries and survives
/// restarts with them; `session_hits`/`session_misses` cover every lookup
/// this process made, including lookups whose entries are gone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub entry_count: u64,
    pub stored_hits: u64,
    pub response_bytes: u64,
    pub oldest_created_at: Option<String>,
    pub newest_created_at: Option<String>,
    pub session_hits: u64,
    pub session_misses: u64,
    pub hit_rate: f64,
}

/// Store-side aggregate totals over live entries.
#[derive(Debug, Clone)]
pub(crate) struct StoreTotals {
    pub entry_count: u64,
    pub stored_hits: u64,
    pub response_bytes: u64,
    pub oldest_created_at: Option<String>,
    pub newest_created_at: Option<String>,
}

/// Hit rate as a percentage; 0.0 when nothing has been looked up yet.
pub(crate) fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 { 0.0 } else { hits as f64 / total as f64 * 100.0 }
}

impl CacheDb {
    /// Aggregate totals over currently non-expired entries.
    pub(crate) async fn store_totals(&self) -> Result<StoreTotals, Error> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<StoreTotals, Error> {
                let totals = conn.query_row(
                    "SELECT
                    COUNT(*),
                    COALESCE(SUM(hit_count), 0),
                    COALESCE(SUM(LENGTH(CAST(response AS BLOB))), 0),
                    MIN(created_at),
                    MAX(created_at)
                FROM cache_entries WHERE expires_at > ?1",
                    params![now],
                    |row| {
                        Ok(StoreTotals {
                            entry_count: row.get::<_, i64>(0)? as u64,
                            stored_hits: row.get::<_, i64>(1)? as u64,
                            response_bytes: row.get::<_, i64>(2)? as u64,
                            oldest_created_at: row.get(3)?,
                            newest_created_at: row.get(4)?,
                        })
                    },
                )?;
                Ok(totals)
            })
            .await
            .map_err(Error::from)
    }
}
