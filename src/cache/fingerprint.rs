//! Deterministic fingerprint derivation for analysis requests.
//!
//! Equivalent analysis requests must converge on one cache slot even when
//! issued from different call sites: the fingerprint is insensitive to
//! question casing, surrounding whitespace, and competitor-list ordering.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Caller-supplied analysis configuration.
///
/// Only `brand` and `competitors` participate in fingerprint derivation. The
/// full value (locale and any unknown caller fields included) is serialized
/// into the entry's configuration snapshot at write time, so the snapshot
/// stays a faithful audit record of what the caller asked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Target brand under analysis.
    pub brand: String,

    /// Competitor brand names, in caller order.
    #[serde(default)]
    pub competitors: Vec<String>,

    /// Locale the question is asked in (e.g. "es-ES").
    #[serde(default)]
    pub locale: Option<String>,

    /// Further caller fields, preserved verbatim in the snapshot.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AnalysisConfig {
    /// Convenience constructor for the common brand + competitors case.
    pub fn new(brand: impl Into<String>, competitors: &[&str]) -> Self {
        Self {
            brand: brand.into(),
            competitors: competitors.iter().map(|c| (*c).to_string()).collect(),
            locale: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// Compute the cache fingerprint for an analysis request.
///
/// The fingerprint is a pure function of the normalized question, the target
/// brand, the canonical competitor set, and the model identifier, hashed with
/// SHA-256 and encoded as a 64-character hex string.
pub fn fingerprint(question: &str, config: &AnalysisConfig, model: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_question(question).as_bytes());
    hasher.update(b"\n");
    hasher.update(config.brand.as_bytes());
    hasher.update(b"\n");
    for competitor in canonical_competitors(&config.competitors) {
        hasher.update(competitor.as_bytes());
        hasher.update(b",");
    }
    hasher.update(b"\n");
    hasher.update(model.as_bytes());
    hex::encode(hasher.finalize())
}

/// Normalize a question for fingerprinting: trim surrounding whitespace, lowercase.
pub(crate) fn normalize_question(question: &str) -> String {
    question.trim().to_lowercase()
}

/// Canonical competitor set: trimmed, lexicographically sorted, deduplicated.
pub(crate) fn canonical_competitors(competitors: &[String]) -> Vec<String> {
    let mut set: Vec<String> = competitors.iter().map(|c| c.trim().to_string()).collect();
    set.sort();
    set.dedup();
    set
}

/// Normalized brand key backing the brand -> fingerprints invalidation index.
///
/// Matching is exact on the trimmed, lowercased brand name rather than a
/// substring scan over the serialized snapshot, so a brand whose name is
/// contained in another brand's name cannot trigger false invalidation.
pub(crate) fn brand_key(brand: &str) -> String {
    brand.trim().to_lowercase()
}
