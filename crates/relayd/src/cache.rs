//! Two-tier response cache: exact key and semantic (embedding cosine).
//!
//! Bounded at 500 entries with FIFO eviction. Exact keys are
//! `{intent}_{hash36(lowercased prompt)}`. Semantic hits require cosine
//! similarity at or above SEMANTIC_THRESHOLD. Ranking answers are never
//! written (enforced by the pipeline).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use relay_shared::memory::cosine_similarity;
use relay_shared::Intent;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};

/// Hard bound on stored entries.
pub const MAX_ENTRIES: usize = 500;
/// Default entry TTL.
pub const DEFAULT_TTL_HOURS: i64 = 12;
/// Fast-route answers keep longer.
pub const FAST_TTL_DAYS: i64 = 7;
/// Minimum cosine similarity for a semantic hit.
pub const SEMANTIC_THRESHOLD: f32 = 0.92;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub intent: Intent,
    /// Fast-route answers keep the long TTL.
    #[serde(default)]
    pub fast: bool,
    #[serde(default)]
    pub hits: u64,
}

impl CacheEntry {
    fn ttl(&self) -> ChronoDuration {
        if self.fast {
            ChronoDuration::days(FAST_TTL_DAYS)
        } else {
            ChronoDuration::hours(DEFAULT_TTL_HOURS)
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.timestamp > self.ttl()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    items: Vec<CacheEntry>,
}

/// Base36 rendering of the first 8 bytes of a SHA-256.
fn hash36(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut n = u64::from_be_bytes(digest[..8].try_into().unwrap_or([0u8; 8]));
    if n == 0 {
        return "0".to_string();
    }
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    while n > 0 {
        out.push(ALPHABET[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Exact cache key for a prompt under an intent.
pub fn cache_key(intent: Intent, prompt: &str) -> String {
    format!("{}_{}", intent, hash36(&prompt.to_lowercase()))
}

/// In-memory cache state. The daemon wraps this in a lock and pairs it
/// with a Debouncer for persistence.
pub struct ResponseCache {
    entries: Vec<CacheEntry>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn load(path: &Path) -> Self {
        let file: CacheFile = crate::persist::load_json_or_default(path);
        let now = Utc::now();
        let mut entries = file.items;
        let before = entries.len();
        entries.retain(|e| !e.is_expired(now));
        if entries.len() < before {
            info!("cache: pruned {} expired entries on load", before - entries.len());
        }
        Self { entries }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        crate::persist::save_json_atomic(path, &CacheFile { items: self.entries.clone() })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Exact-key lookup. Bumps the hit counter.
    pub fn get_exact(&mut self, key: &str) -> Option<String> {
        let now = Utc::now();
        let entry = self.entries.iter_mut().find(|e| e.key == key)?;
        if entry.is_expired(now) {
            return None;
        }
        entry.hits += 1;
        debug!("cache: exact hit {}", key);
        Some(entry.response.clone())
    }

    /// Semantic lookup by embedding similarity, best match wins.
    pub fn get_semantic(&mut self, embedding: &[f32]) -> Option<String> {
        if embedding.is_empty() {
            return None;
        }
        let now = Utc::now();
        let mut best: Option<(usize, f32)> = None;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.is_expired(now) {
                continue;
            }
            let Some(stored) = &entry.embedding else { continue };
            let sim = cosine_similarity(embedding, stored);
            if sim >= SEMANTIC_THRESHOLD && best.map_or(true, |(_, b)| sim > b) {
                best = Some((i, sim));
            }
        }
        let (idx, sim) = best?;
        self.entries[idx].hits += 1;
        debug!("cache: semantic hit (cosine {:.3})", sim);
        Some(self.entries[idx].response.clone())
    }

    /// Insert or overwrite. Last writer wins for a given key; the store is
    /// trimmed FIFO to the bound.
    pub fn put(
        &mut self,
        key: String,
        response: String,
        intent: Intent,
        embedding: Option<Vec<f32>>,
        fast: bool,
    ) {
        self.entries.retain(|e| e.key != key);
        self.entries.push(CacheEntry {
            key,
            response,
            timestamp: Utc::now(),
            embedding,
            intent,
            fast,
            hits: 0,
        });
        if self.entries.len() > MAX_ENTRIES {
            let excess = self.entries.len() - MAX_ENTRIES;
            self.entries.drain(..excess);
        }
    }

    /// Drop expired entries.
    pub fn prune(&mut self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|e| !e.is_expired(now));
        before - self.entries.len()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_shape() {
        let key = cache_key(Intent::MathReasoning, "What Is 2+2");
        assert!(key.starts_with("MATH_REASONING_"));
        // Case-insensitive on the prompt.
        assert_eq!(key, cache_key(Intent::MathReasoning, "what is 2+2"));
        // Different intent, different key.
        assert_ne!(key, cache_key(Intent::SimpleQa, "what is 2+2"));
    }

    #[test]
    fn test_exact_roundtrip() {
        let mut cache = ResponseCache::new();
        let key = cache_key(Intent::SimpleQa, "hello");
        cache.put(key.clone(), "answer".into(), Intent::SimpleQa, None, false);
        assert_eq!(cache.get_exact(&key), Some("answer".into()));
        assert_eq!(cache.get_exact("missing"), None);
    }

    #[test]
    fn test_put_is_idempotent_last_writer_wins() {
        let mut cache = ResponseCache::new();
        let key = cache_key(Intent::SimpleQa, "hello");
        cache.put(key.clone(), "first".into(), Intent::SimpleQa, None, false);
        cache.put(key.clone(), "second".into(), Intent::SimpleQa, None, false);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_exact(&key), Some("second".into()));
    }

    #[test]
    fn test_fifo_bound() {
        let mut cache = ResponseCache::new();
        for i in 0..(MAX_ENTRIES + 40) {
            cache.put(format!("k{}", i), "v".into(), Intent::SimpleQa, None, false);
        }
        assert_eq!(cache.len(), MAX_ENTRIES);
        // Oldest entries evicted first.
        assert_eq!(cache.get_exact("k0"), None);
        assert!(cache.get_exact(&format!("k{}", MAX_ENTRIES + 39)).is_some());
    }

    #[test]
    fn test_semantic_hit_and_threshold() {
        let mut cache = ResponseCache::new();
        cache.put(
            "k1".into(),
            "cached".into(),
            Intent::WorldKnowledge,
            Some(vec![1.0, 0.0, 0.0]),
            false,
        );
        // Identical direction: hit.
        assert_eq!(cache.get_semantic(&[2.0, 0.0, 0.0]), Some("cached".into()));
        // Orthogonal: miss.
        assert_eq!(cache.get_semantic(&[0.0, 1.0, 0.0]), None);
        // No query embedding: miss.
        assert_eq!(cache.get_semantic(&[]), None);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("response_cache.json");
        let mut cache = ResponseCache::new();
        cache.put("k1".into(), "v1".into(), Intent::SimpleQa, None, false);
        cache.save(&path).unwrap();

        let mut reloaded = ResponseCache::load(&path);
        assert_eq!(reloaded.get_exact("k1"), Some("v1".into()));
    }

    #[test]
    fn test_expired_entry_not_served() {
        let mut cache = ResponseCache::new();
        cache.put("k1".into(), "v1".into(), Intent::CodeTask, None, false);
        // Backdate past the 12h TTL.
        cache.entries[0].timestamp = Utc::now() - ChronoDuration::hours(13);
        assert_eq!(cache.get_exact("k1"), None);
        assert_eq!(cache.prune(), 1);
        assert_eq!(cache.len(), 0);
    }
}
