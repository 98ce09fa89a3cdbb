//! Durable memory store: file-backed user<->assistant pairs.
//!
//! Tail-trimmed to 500 entries on save; expired entries are pruned on load
//! and on explicit purge. Recall scores keyword overlap plus an
//! embedding-weighted cosine when both sides carry vectors.

use chrono::{Duration as ChronoDuration, Utc};
use relay_shared::memory::{
    cosine_similarity, extract_keywords, keyword_overlap, MemoryEntry, MemoryMeta,
    DEFAULT_TTL_DAYS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Hard bound: only the newest 500 entries survive a save.
pub const MAX_ENTRIES: usize = 500;
/// Recall returns at most this many entries.
pub const RECALL_LIMIT: usize = 4;
/// Minimum combined score for a recall hit.
pub const MIN_SCORE: f32 = 1.0;
/// Weight of the cosine term relative to keyword overlap.
const EMBEDDING_WEIGHT: f32 = 3.0;

#[derive(Debug, Default, Serialize, Deserialize)]
struct MemoryFile {
    entries: Vec<MemoryEntry>,
}

/// A recall hit with its score.
#[derive(Debug, Clone, Serialize)]
pub struct RecallHit {
    pub entry: MemoryEntry,
    pub score: f32,
}

/// Scope for store/recall operations.
#[derive(Debug, Clone)]
pub struct Scope {
    pub user_id: String,
    pub team_id: Option<String>,
    /// When set, entries are matched by team instead of user.
    pub team_mode: bool,
}

impl Scope {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), team_id: None, team_mode: false }
    }

    fn matches(&self, meta: &MemoryMeta) -> bool {
        if self.team_mode {
            match (&self.team_id, &meta.team_id) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        } else {
            meta.user_id == self.user_id
        }
    }
}

pub struct MemoryStore {
    entries: Vec<MemoryEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn load(path: &Path) -> Self {
        let file: MemoryFile = crate::persist::load_json_or_default(path);
        let now = Utc::now();
        let mut entries = file.entries;
        let before = entries.len();
        entries.retain(|e| !e.is_expired(now));
        if entries.len() < before {
            info!("memory: pruned {} expired entries on load", before - entries.len());
        }
        Self { entries }
    }

    /// Persist, keeping only the newest MAX_ENTRIES.
    pub fn save(&mut self, path: &Path) -> anyhow::Result<()> {
        if self.entries.len() > MAX_ENTRIES {
            let excess = self.entries.len() - MAX_ENTRIES;
            self.entries.drain(..excess);
        }
        crate::persist::save_json_atomic(path, &MemoryFile { entries: self.entries.clone() })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Store a new entry; returns its id.
    pub fn store(
        &mut self,
        scope: &Scope,
        prompt: &str,
        response: &str,
        kind: &str,
        embedding: Option<Vec<f32>>,
        ttl_days: Option<i64>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let ttl = ttl_days.unwrap_or(DEFAULT_TTL_DAYS);
        let expires_at = (ttl > 0).then(|| (now + ChronoDuration::days(ttl)).to_rfc3339());
        self.entries.push(MemoryEntry {
            id: id.clone(),
            prompt: prompt.to_string(),
            response: response.to_string(),
            keywords: extract_keywords(&format!("{} {}", prompt, response)),
            embedding,
            meta: MemoryMeta {
                user_id: scope.user_id.clone(),
                team_id: scope.team_id.clone(),
                kind: kind.to_string(),
            },
            created_at: now,
            expires_at,
        });
        id
    }

    /// Top-RECALL_LIMIT scored entries for a query in scope.
    pub fn recall(
        &self,
        scope: &Scope,
        query: &str,
        query_embedding: Option<&[f32]>,
    ) -> Vec<RecallHit> {
        let now = Utc::now();
        let query_keywords = extract_keywords(query);
        let mut hits: Vec<RecallHit> = self
            .entries
            .iter()
            .filter(|e| scope.matches(&e.meta))
            .filter(|e| !e.is_expired(now))
            .filter_map(|e| {
                let kw = keyword_overlap(&query_keywords, &e.keywords) as f32;
                let cos = match (query_embedding, &e.embedding) {
                    (Some(q), Some(s)) => cosine_similarity(q, s) * EMBEDDING_WEIGHT,
                    _ => 0.0,
                };
                let score = kw + cos;
                (score >= MIN_SCORE).then(|| RecallHit { entry: e.clone(), score })
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(RECALL_LIMIT);
        hits
    }

    /// Entries in scope, newest first, with optional kind filter.
    pub fn list(&self, scope: &Scope, kind: Option<&str>) -> Vec<MemoryEntry> {
        let now = Utc::now();
        let mut out: Vec<MemoryEntry> = self
            .entries
            .iter()
            .filter(|e| scope.matches(&e.meta))
            .filter(|e| !e.is_expired(now))
            .filter(|e| kind.map_or(true, |k| e.meta.kind == k))
            .cloned()
            .collect();
        out.reverse();
        out
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() < before
    }

    /// Clear everything owned by a user.
    pub fn delete_user(&mut self, user_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.meta.user_id != user_id);
        before - self.entries.len()
    }

    /// Bulk TTL update for a scope; returns affected count.
    pub fn update_ttl(&mut self, scope: &Scope, ttl_days: i64) -> usize {
        let now = Utc::now();
        let expires_at = (ttl_days > 0).then(|| (now + ChronoDuration::days(ttl_days)).to_rfc3339());
        let mut count = 0;
        for e in self.entries.iter_mut().filter(|e| scope.matches(&e.meta)) {
            e.expires_at = expires_at.clone();
            count += 1;
        }
        count
    }

    /// Drop expired entries now; returns how many went.
    pub fn purge_expired(&mut self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|e| !e.is_expired(now));
        before - self.entries.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope::user("u1")
    }

    #[test]
    fn test_store_and_recall_by_keywords() {
        let mut store = MemoryStore::new();
        store.store(&scope(), "my favorite editor is helix", "noted", "saved", None, None);
        store.store(&scope(), "the capital of france", "paris", "saved", None, None);

        let hits = store.recall(&scope(), "which editor do I like", None);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].entry.prompt.contains("helix"));
    }

    #[test]
    fn test_recall_scoped_by_user() {
        let mut store = MemoryStore::new();
        store.store(&Scope::user("alice"), "project deadline friday", "ok", "saved", None, None);
        let hits = store.recall(&Scope::user("bob"), "project deadline", None);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_team_mode_matching() {
        let mut store = MemoryStore::new();
        let mut team_scope = Scope::user("alice");
        team_scope.team_id = Some("t1".into());
        store.store(&team_scope, "deploy window tuesday", "ok", "saved", None, None);

        let mut reader = Scope::user("bob");
        reader.team_id = Some("t1".into());
        reader.team_mode = true;
        let hits = store.recall(&reader, "deploy window", None);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_tail_trim_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let mut store = MemoryStore::new();
        for i in 0..(MAX_ENTRIES + 25) {
            store.store(&scope(), &format!("note number {}", i), "ok", "saved", None, None);
        }
        store.save(&path).unwrap();
        assert_eq!(store.len(), MAX_ENTRIES);

        let reloaded = MemoryStore::load(&path);
        assert_eq!(reloaded.len(), MAX_ENTRIES);
        // The oldest entries were dropped.
        assert!(!reloaded.entries.iter().any(|e| e.prompt == "note number 0"));
    }

    #[test]
    fn test_ttl_update_and_purge() {
        let mut store = MemoryStore::new();
        let id = store.store(&scope(), "short lived fact", "ok", "saved", None, None);
        assert_eq!(store.update_ttl(&scope(), -1), 1);
        // Negative TTL clears expires_at entirely.
        assert!(store.entries[0].expires_at.is_none());

        // Backdate an explicit expiry and purge.
        store.entries[0].expires_at = Some((Utc::now() - ChronoDuration::days(1)).to_rfc3339());
        assert_eq!(store.purge_expired(), 1);
        assert!(!store.delete(&id));
    }

    #[test]
    fn test_embedding_boosts_score() {
        let mut store = MemoryStore::new();
        store.store(
            &scope(),
            "preferred language rust",
            "ok",
            "saved",
            Some(vec![1.0, 0.0]),
            None,
        );
        let with_vec = store.recall(&scope(), "preferred language", Some(&[1.0, 0.0]));
        let without = store.recall(&scope(), "preferred language", None);
        assert!(with_vec[0].score > without[0].score);
    }

    #[test]
    fn test_delete_user() {
        let mut store = MemoryStore::new();
        store.store(&Scope::user("a"), "one", "ok", "saved", None, None);
        store.store(&Scope::user("a"), "two", "ok", "saved", None, None);
        store.store(&Scope::user("b"), "three", "ok", "saved", None, None);
        assert_eq!(store.delete_user("a"), 2);
        assert_eq!(store.len(), 1);
    }
}
