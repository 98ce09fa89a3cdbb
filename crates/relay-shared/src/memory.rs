//! Memory entry model and keyword extraction.
//!
//! Entries are file-backed by the daemon's memory store; this module holds
//! the serializable shape and the pure scoring/extraction helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default entry lifetime: 30 days.
pub const DEFAULT_TTL_DAYS: i64 = 30;
/// Keywords per entry are capped.
pub const MAX_KEYWORDS: usize = 40;

/// Scope metadata on a memory entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMeta {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    /// Entry kind: "saved", "summary".
    #[serde(default)]
    pub kind: String,
}

/// One durable user<->assistant pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub prompt: String,
    /// Summarized assistant response.
    pub response: String,
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub meta: MemoryMeta,
    pub created_at: DateTime<Utc>,
    /// RFC3339; absent means no expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl MemoryEntry {
    /// An entry with an unparsable expires_at is treated as not expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match &self.expires_at {
            None => false,
            Some(raw) => match DateTime::parse_from_rfc3339(raw) {
                Ok(ts) => ts.with_timezone(&Utc) < now,
                Err(_) => false,
            },
        }
    }
}

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "her", "was",
    "one", "our", "out", "his", "has", "have", "had", "what", "when", "where",
    "who", "which", "why", "how", "with", "this", "that", "these", "those",
    "from", "they", "them", "then", "than", "will", "would", "could", "should",
    "about", "into", "over", "under", "some", "any", "each", "your", "its",
    "please", "tell", "does", "did", "just", "also", "very", "much", "more",
];

/// Extract search keywords from text: lowercase alphanumeric words of
/// length >= 3, stop-words stripped, de-duplicated, capped at MAX_KEYWORDS.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for word in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3)
        .filter(|w| !STOP_WORDS.contains(w))
    {
        if seen.insert(word.to_string()) {
            out.push(word.to_string());
            if out.len() >= MAX_KEYWORDS {
                break;
            }
        }
    }
    out
}

/// Cosine similarity over two embedding vectors. Zero when either is empty
/// or lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// Keyword-overlap count between a query's keywords and a stored set.
pub fn keyword_overlap(query_keywords: &[String], stored: &[String]) -> usize {
    query_keywords.iter().filter(|k| stored.contains(k)).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(expires_at: Option<&str>) -> MemoryEntry {
        MemoryEntry {
            id: "m1".into(),
            prompt: "p".into(),
            response: "r".into(),
            keywords: vec![],
            embedding: None,
            meta: MemoryMeta { user_id: "u".into(), team_id: None, kind: "saved".into() },
            created_at: Utc::now(),
            expires_at: expires_at.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let past = (now - Duration::days(1)).to_rfc3339();
        let future = (now + Duration::days(1)).to_rfc3339();
        assert!(entry(Some(&past)).is_expired(now));
        assert!(!entry(Some(&future)).is_expired(now));
        assert!(!entry(None).is_expired(now));
    }

    #[test]
    fn test_unparsable_expiry_is_not_expired() {
        assert!(!entry(Some("not-a-date")).is_expired(Utc::now()));
    }

    #[test]
    fn test_extract_keywords() {
        let kws = extract_keywords("Please tell me about the Rust borrow checker");
        assert!(kws.contains(&"rust".to_string()));
        assert!(kws.contains(&"borrow".to_string()));
        assert!(!kws.contains(&"the".to_string()));
        assert!(!kws.contains(&"me".to_string())); // too short
    }

    #[test]
    fn test_keyword_cap() {
        let long: String = (0..100).map(|i| format!("word{} ", i)).collect();
        assert_eq!(extract_keywords(&long).len(), MAX_KEYWORDS);
    }

    #[test]
    fn test_cosine() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_overlap() {
        let q = vec!["rust".to_string(), "cache".to_string()];
        let s = vec!["cache".to_string(), "disk".to_string()];
        assert_eq!(keyword_overlap(&q, &s), 1);
    }
}
