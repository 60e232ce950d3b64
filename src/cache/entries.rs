//! Cache entry row operations.
//!
//! Provides the row-level storage operations behind the engine: upsert,
//! expiry-aware lookup with hit accounting, sweeps, and invalidation.

use super::connection::CacheDb;
use crate::Error;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cached provider response.
///
/// One row per fingerprint. The configuration snapshot is the serialized
/// caller configuration at write time, kept for auditing; `brand_key` is the
/// normalized target brand backing invalidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub question: String,
    pub response: String,
    pub model: String,
    pub config_json: String,
    pub brand_key: String,
    pub created_at: String,
    pub expires_at: String,
    pub hit_count: i64,
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<CacheEntry> {
    Ok(CacheEntry {
        fingerprint: row.get(0)?,
        question: row.get(1)?,
        response: row.get(2)?,
        model: row.get(3)?,
        config_json: row.get(4)?,
        brand_key: row.get(5)?,
        created_at: row.get(6)?,
        expires_at: row.get(7)?,
        hit_count: row.get(8)?,
    })
}

const ENTRY_COLUMNS: &str = "fingerprint, question, response, model, config_json, brand_key,
                 created_at, expires_at, hit_count";

impl CacheDb {
    /// Insert or replace a cache entry.
    ///
    /// Uses UPSERT semantics: inserts if the fingerprint doesn't exist,
    /// replaces every field if it does. Overwriting is a full replacement
    /// with a fresh TTL, so the caller-provided `hit_count` (0 for entries
    /// built by `set`) also lands on conflict.
    pub async fn upsert_entry(&self, entry: &CacheEntry) -> Result<(), Error> {
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_entries (
                    fingerprint, question, response, model, config_json, brand_key,
                    created_at, expires_at, hit_count
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(fingerprint) DO UPDATE SET
                    question = excluded.question,
                    response = excluded.response,
                    model = excluded.model,
                    config_json = excluded.config_json,
                    brand_key = excluded.brand_key,
                    created_at = excluded.created_at,
                    expires_at = excluded.expires_at,
                    hit_count = excluded.hit_count",
                    params![
                        &entry.fingerprint,
                        &entry.question,
                        &entry.response,
                        &entry.model,
                        &entry.config_json,
                        &entry.brand_key,
                        &entry.created_at,
                        &entry.expires_at,
                        entry.hit_count,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a live entry's response and count the hit.
    ///
    /// Returns None if no row exists or the row has expired; expired rows are
    /// left in place for `purge_expired` to reclaim. On a hit the row's
    /// hit_count is incremented in the same storage call, so a concurrent
    /// overwrite observes either the old row or the new one, never a mix.
    pub async fn fetch_and_touch(&self, fingerprint: &str) -> Result<Option<String>, Error> {
        let fingerprint = fingerprint.to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result = conn.query_row(
                    "SELECT response FROM cache_entries WHERE fingerprint = ?1 AND expires_at > ?2",
                    params![fingerprint, now],
                    |row| row.get(0),
                );

                match result {
                    Ok(response) => {
                        conn.execute(
                            "UPDATE cache_entries SET hit_count = hit_count + 1 WHERE fingerprint = ?1",
                            params![fingerprint],
                        )?;
                        Ok(Some(response))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Get an entry by fingerprint, expired or not.
    ///
    /// Returns None if the fingerprint doesn't exist. Unlike `fetch_and_touch`
    /// this does not count a hit; it is for inspection and diagnostics.
    pub async fn get_entry(&self, fingerprint: &str) -> Result<Option<CacheEntry>, Error> {
        let fingerprint = fingerprint.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt =
                    conn.prepare(&format!("SELECT {ENTRY_COLUMNS} FROM cache_entries WHERE fingerprint = ?1"))?;

                let result = stmt.query_row(params![fingerprint], row_to_entry);

                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete entries whose expiry instant has passed (or is now).
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired(&self) -> Result<u64, Error> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cache_entries WHERE expires_at <= ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry unconditionally.
    ///
    /// Returns the number of deleted entries.
    pub async fn delete_all_entries(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cache_entries", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete entries whose normalized brand key matches exactly.
    ///
    /// Returns the number of deleted entries.
    pub async fn delete_entries_by_brand(&self, brand_key: &str) -> Result<u64, Error> {
        let brand_key = brand_key.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cache_entries WHERE brand_key = ?1", params![brand_key])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Live entries ordered by hit count, most-hit first.
    ///
    /// Ties break on fingerprint so the ordering is deterministic.
    pub async fn top_entries(&self, limit: usize) -> Result<Vec<CacheEntry>, Error> {
        let limit = limit as i64;
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<Vec<CacheEntry>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ENTRY_COLUMNS} FROM cache_entries
                WHERE expires_at > ?1
                ORDER BY hit_count DESC, fingerprint ASC
                LIMIT ?2"
                ))?;

                let entries = stmt
                    .query_map(params![now, limit], row_to_entry)?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }
}
