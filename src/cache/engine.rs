//! The response cache engine.
//!
//! `ResponseCache` is the object the analysis path and the administrative
//! surface consume: lookups before a billed provider call, population after,
//! plus maintenance and reporting. It owns the database handle and the
//! in-memory session counters; it never calls a provider itself.

use super::connection::CacheDb;
use super::entries::CacheEntry;
use super::events::{CacheEvent, EventKind};
use super::fingerprint::{self, AnalysisConfig};
use super::stats::{CacheStats, SessionCounters, hit_rate};
use crate::Error;
use crate::config::AppConfig;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// The response cache engine.
///
/// Cheap to clone; clones share the connection and the session counters.
#[derive(Clone, Debug)]
pub struct ResponseCache {
    db: CacheDb,
    default_ttl_seconds: i64,
    session: Arc<SessionCounters>,
}

impl ResponseCache {
    /// Open a file-backed cache per the given configuration.
    pub async fn open(config: &AppConfig) -> Result<Self, Error> {
        let db = CacheDb::open(&config.db_path).await?;
        Ok(Self { db, default_ttl_seconds: config.default_ttl_seconds, session: Arc::new(SessionCounters::default()) })
    }

    /// Open an in-memory cache with default policy, for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let db = CacheDb::open_in_memory().await?;
        Ok(Self {
            db,
            default_ttl_seconds: AppConfig::default().default_ttl_seconds,
            session: Arc::new(SessionCounters::default()),
        })
    }

    /// Look up a cached response for an analysis request.
    ///
    /// Returns `Ok(None)` on a miss — including when an entry exists but has
    /// expired. Expired entries are treated as absent at read time but not
    /// deleted; `clean_expired` reclaims them. A hit increments the entry's
    /// durable hit counter and the session hit counter; a miss increments
    /// only the session miss counter. The caller is expected to perform the
    /// provider call on a miss and populate the slot via [`Self::set`].
    pub async fn get(&self, question: &str, config: &AnalysisConfig, model: &str) -> Result<Option<String>, Error> {
        let fp = fingerprint::fingerprint(question, config, model);

        match self.db.fetch_and_touch(&fp).await? {
            Some(response) => {
                self.session.record_hit();
                self.db.append_event(EventKind::Hit, Some(format!("fingerprint={fp}"))).await?;
                tracing::debug!(fingerprint = %fp, model, "cache hit");
                Ok(Some(response))
            }
            None => {
                self.session.record_miss();
                self.db.append_event(EventKind::Miss, Some(format!("fingerprint={fp}"))).await?;
                tracing::debug!(fingerprint = %fp, model, "cache miss");
                Ok(None)
            }
        }
    }

    /// Store a provider response for an analysis request.
    ///
    /// Computes the same fingerprint `get` would for identical inputs and
    /// performs an unconditional upsert: an existing entry — expired or not —
    /// is fully replaced, with a fresh TTL and its hit counter reset to 0.
    /// `ttl_seconds` falls back to the configured default (7 days) when None.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a blank question or a non-positive TTL, before
    /// any storage access.
    pub async fn set(
        &self, question: &str, response: &str, config: &AnalysisConfig, model: &str, ttl_seconds: Option<i64>,
    ) -> Result<(), Error> {
        if question.trim().is_empty() {
            return Err(Error::InvalidArgument("question must not be empty".into()));
        }
        let ttl = ttl_seconds.unwrap_or(self.default_ttl_seconds);
        if ttl <= 0 {
            return Err(Error::InvalidArgument(format!("ttl_seconds must be positive, got {ttl}")));
        }

        let fp = fingerprint::fingerprint(question, config, model);
        let config_json = serde_json::to_string(config)
            .map_err(|e| Error::InvalidArgument(format!("configuration is not serializable: {e}")))?;
        let created_at = Utc::now();

        let entry = CacheEntry {
            fingerprint: fp.clone(),
            question: question.to_string(),
            response: response.to_string(),
            model: model.to_string(),
            config_json,
            brand_key: fingerprint::brand_key(&config.brand),
            created_at: created_at.to_rfc3339(),
            expires_at: (created_at + Duration::seconds(ttl)).to_rfc3339(),
            hit_count: 0,
        };

        self.db.upsert_entry(&entry).await?;
        self.db
            .append_event(EventKind::Set, Some(format!("fingerprint={fp} ttl_seconds={ttl}")))
            .await?;
        tracing::debug!(fingerprint = %fp, model, ttl_seconds = ttl, "cache set");
        Ok(())
    }

    /// Delete every entry whose expiry instant has passed.
    ///
    /// Explicit maintenance: the engine runs no background sweep of its own,
    /// so the hosting process decides when (and whether) to reclaim space.
    /// Returns the number of entries removed.
    pub async fn clean_expired(&self) -> Result<u64, Error> {
        let deleted = self.db.purge_expired().await?;
        tracing::info!(deleted, "cleaned expired cache entries");
        Ok(deleted)
    }

    /// Delete every entry unconditionally.
    ///
    /// Session hit/miss counters are left alone: they describe this process's
    /// lookup history, not the current cache content.
    pub async fn invalidate_all(&self) -> Result<(), Error> {
        let deleted = self.db.delete_all_entries().await?;
        self.db
            .append_event(EventKind::InvalidateAll, Some(format!("deleted={deleted}")))
            .await?;
        tracing::info!(deleted, "invalidated all cache entries");
        Ok(())
    }

    /// Delete every entry whose target brand matches.
    ///
    /// Matching is exact on the normalized brand (trimmed, lowercased)
    /// recorded at `set` time, so "Occident" never takes down entries for
    /// "Occidental Insurance". Returns the number of entries removed.
    pub async fn invalidate_by_brand(&self, brand: &str) -> Result<u64, Error> {
        let key = fingerprint::brand_key(brand);
        let deleted = self.db.delete_entries_by_brand(&key).await?;
        self.db
            .append_event(EventKind::InvalidateBrand, Some(format!("brand={key} deleted={deleted}")))
            .await?;
        tracing::info!(brand = %key, deleted, "invalidated cache entries by brand");
        Ok(deleted)
    }

    /// Aggregate statistics: store totals over live entries plus this
    /// process's session hit/miss counters and hit-rate percentage.
    pub async fn stats(&self) -> Result<CacheStats, Error> {
        let totals = self.db.store_totals().await?;
        let (session_hits, session_misses) = self.session.totals();

        Ok(CacheStats {
            entry_count: totals.entry_count,
            stored_hits: totals.stored_hits,
            response_bytes: totals.response_bytes,
            oldest_created_at: totals.oldest_created_at,
            newest_created_at: totals.newest_created_at,
            session_hits,
            session_misses,
            hit_rate: hit_rate(session_hits, session_misses),
        })
    }

    /// Up to `limit` live entries, most-hit first.
    ///
    /// Entries carry their full response; truncating for display is the
    /// caller's concern.
    pub async fn top_entries(&self, limit: usize) -> Result<Vec<CacheEntry>, Error> {
        self.db.top_entries(limit).await
    }

    /// The most recent diagnostic events, newest first.
    pub async fn recent_events(&self, limit: usize) -> Result<Vec<CacheEvent>, Error> {
        self.db.recent_events(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occident_config() -> AnalysisConfig {
        AnalysisConfig::new("Occident", &["Mapfre", "AXA"])
    }

    #[tokio::test]
    async fn test_get_miss_then_set_then_hit() {
        let cache = ResponseCache::open_in_memory().await.unwrap();
        let config = occident_config();

        let miss = cache.get("¿Mejor seguro de hogar?", &config, "gpt-4o").await.unwrap();
        assert!(miss.is_none());

        cache
            .set("¿Mejor seguro de hogar?", "Occident es líder...", &config, "gpt-4o", None)
            .await
            .unwrap();

        let hit = cache.get("¿Mejor seguro de hogar?", &config, "gpt-4o").await.unwrap();
        assert_eq!(hit.as_deref(), Some("Occident es líder..."));
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let cache = ResponseCache::open_in_memory().await.unwrap();
        let config = occident_config();
        let question = "¿Cuál es el mejor seguro de hogar?";

        cache
            .set(question, "Occident es líder...", &config, "gpt-4o", Some(7 * 24 * 3600))
            .await
            .unwrap();

        let hit = cache.get(question, &config, "gpt-4o").await.unwrap();
        assert_eq!(hit.as_deref(), Some("Occident es líder..."));

        // Reordered competitors land on the same slot.
        let reordered = AnalysisConfig::new("Occident", &["AXA", "Mapfre"]);
        let hit = cache.get(question, &reordered, "gpt-4o").await.unwrap();
        assert_eq!(hit.as_deref(), Some("Occident es líder..."));

        let removed = cache.invalidate_by_brand("Occident").await.unwrap();
        assert_eq!(removed, 1);

        let miss = cache.get(question, &config, "gpt-4o").await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_ttl_boundary() {
        let cache = ResponseCache::open_in_memory().await.unwrap();
        let config = occident_config();

        cache
            .set("pregunta efímera", "respuesta", &config, "gpt-4o", Some(1))
            .await
            .unwrap();

        let hit = cache.get("pregunta efímera", &config, "gpt-4o").await.unwrap();
        assert!(hit.is_some());

        tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

        let miss = cache.get("pregunta efímera", &config, "gpt-4o").await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_and_resets() {
        let cache = ResponseCache::open_in_memory().await.unwrap();
        let config = occident_config();
        let question = "¿Mejor seguro?";

        cache.set(question, "r1", &config, "gpt-4o", None).await.unwrap();
        cache.get(question, &config, "gpt-4o").await.unwrap();

        cache.set(question, "r2", &config, "gpt-4o", None).await.unwrap();

        let hit = cache.get(question, &config, "gpt-4o").await.unwrap();
        assert_eq!(hit.as_deref(), Some("r2"));

        // hit_count was reset by the overwrite; the get above is the only hit since.
        let top = cache.top_entries(1).await.unwrap();
        assert_eq!(top[0].hit_count, 1);
    }

    #[tokio::test]
    async fn test_invalidate_all_idempotent() {
        let cache = ResponseCache::open_in_memory().await.unwrap();
        let config = occident_config();

        cache.set("pregunta uno", "a", &config, "gpt-4o", None).await.unwrap();
        cache.set("pregunta dos", "b", &config, "gpt-4o", None).await.unwrap();
        assert_eq!(cache.stats().await.unwrap().entry_count, 2);

        cache.invalidate_all().await.unwrap();
        assert_eq!(cache.stats().await.unwrap().entry_count, 0);

        cache.invalidate_all().await.unwrap();
        assert_eq!(cache.stats().await.unwrap().entry_count, 0);
    }

    #[tokio::test]
    async fn test_session_hit_rate() {
        let cache = ResponseCache::open_in_memory().await.unwrap();
        let config = occident_config();

        // 3 misses.
        cache.get("pregunta uno", &config, "gpt-4o").await.unwrap();
        cache.get("pregunta dos", &config, "gpt-4o").await.unwrap();
        cache.get("pregunta tres", &config, "gpt-4o").await.unwrap();

        // 2 hits.
        cache.set("pregunta uno", "respuesta", &config, "gpt-4o", None).await.unwrap();
        cache.get("pregunta uno", &config, "gpt-4o").await.unwrap();
        cache.get("pregunta uno", &config, "gpt-4o").await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.session_hits, 2);
        assert_eq!(stats.session_misses, 3);
        assert_eq!(stats.hit_rate, 40.0);
    }

    #[tokio::test]
    async fn test_stats_totals() {
        let cache = ResponseCache::open_in_memory().await.unwrap();
        let config = occident_config();

        cache.set("pregunta una", "12345", &config, "gpt-4o", None).await.unwrap();
        cache.set("pregunta dos", "1234567890", &config, "gpt-4o", None).await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.response_bytes, 15);
        assert_eq!(stats.stored_hits, 0);
        assert!(stats.oldest_created_at.is_some());
        assert!(stats.newest_created_at.is_some());
        assert!(stats.oldest_created_at <= stats.newest_created_at);
    }

    #[tokio::test]
    async fn test_set_rejects_blank_question() {
        let cache = ResponseCache::open_in_memory().await.unwrap();
        let config = occident_config();

        let result = cache.set("   ", "respuesta", &config, "gpt-4o", None).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_set_rejects_non_positive_ttl() {
        let cache = ResponseCache::open_in_memory().await.unwrap();
        let config = occident_config();

        let result = cache.set("pregunta", "respuesta", &config, "gpt-4o", Some(0)).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        let result = cache.set("pregunta", "respuesta", &config, "gpt-4o", Some(-60)).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_invalidate_by_brand_case_insensitive() {
        let cache = ResponseCache::open_in_memory().await.unwrap();
        let config = occident_config();

        cache.set("pregunta", "respuesta", &config, "gpt-4o", None).await.unwrap();

        let removed = cache.invalidate_by_brand("  OCCIDENT ").await.unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn test_clean_expired_counts() {
        let cache = ResponseCache::open_in_memory().await.unwrap();
        let config = occident_config();

        cache.set("pregunta efímera", "a", &config, "gpt-4o", Some(1)).await.unwrap();
        cache.set("pregunta duradera", "b", &config, "gpt-4o", Some(3600)).await.unwrap();

        tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

        assert_eq!(cache.clean_expired().await.unwrap(), 1);
        assert_eq!(cache.clean_expired().await.unwrap(), 0);
        assert_eq!(cache.stats().await.unwrap().entry_count, 1);
    }

    #[tokio::test]
    async fn test_events_recorded() {
        let cache = ResponseCache::open_in_memory().await.unwrap();
        let config = occident_config();

        cache.get("pregunta", &config, "gpt-4o").await.unwrap();
        cache.set("pregunta", "respuesta", &config, "gpt-4o", None).await.unwrap();
        cache.get("pregunta", &config, "gpt-4o").await.unwrap();
        cache.invalidate_by_brand("Occident").await.unwrap();
        cache.invalidate_all().await.unwrap();

        let events = cache.recent_events(10).await.unwrap();
        let kinds: Vec<&str> = events.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["invalidate_all", "invalidate_brand", "hit", "set", "miss"]);
    }

    #[tokio::test]
    async fn test_entries_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let app_config = AppConfig { db_path: dir.path().join("cache.sqlite"), ..Default::default() };
        let config = occident_config();

        {
            let cache = ResponseCache::open(&app_config).await.unwrap();
            cache
                .set("pregunta persistente", "respuesta", &config, "gpt-4o", None)
                .await
                .unwrap();
            cache.get("pregunta persistente", &config, "gpt-4o").await.unwrap();
        }

        let cache = ResponseCache::open(&app_config).await.unwrap();
        let hit = cache.get("pregunta persistente", &config, "gpt-4o").await.unwrap();
        assert_eq!(hit.as_deref(), Some("respuesta"));

        // Durable hit counts survive the restart; session counters do not.
        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.stored_hits, 2);
        assert_eq!(stats.session_hits, 1);
        assert_eq!(stats.session_misses, 0);
    }
}
