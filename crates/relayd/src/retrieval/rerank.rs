//! Optional reranking of hybrid RAG hits by a scoring model.
//!
//! The model sees numbered candidates and emits `[{id, score}]`; unparsable
//! output leaves the original order untouched.

use crate::ollama::{BackendClient, GenOptions};
use relay_shared::models::MODEL_FAST;
use serde::Deserialize;
use tracing::debug;

/// A candidate passage entering the reranker.
#[derive(Debug, Clone)]
pub struct RerankCandidate {
    pub source: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct ScoredId {
    id: usize,
    score: f32,
}

const RERANK_SYSTEM: &str = "Score each numbered passage for relevance to the query. \
Reply with only a JSON array like [{\"id\":0,\"score\":0.9}].";

/// Rerank candidates; on any model or parse failure the input order is
/// returned unchanged.
pub async fn rerank(
    backend: &BackendClient,
    query: &str,
    candidates: Vec<RerankCandidate>,
) -> Vec<RerankCandidate> {
    if candidates.len() < 2 {
        return candidates;
    }

    let mut prompt = format!("Query: {}\n\nPassages:\n", query);
    for (i, c) in candidates.iter().enumerate() {
        let preview: String = c.text.chars().take(400).collect();
        prompt.push_str(&format!("[{}] {}\n", i, preview));
    }

    let raw = match backend
        .generate(MODEL_FAST, Some(RERANK_SYSTEM), &prompt, &GenOptions::default())
        .await
    {
        Ok(r) => r,
        Err(e) => {
            debug!("rerank skipped: {}", e);
            return candidates;
        }
    };

    match parse_scores(&raw, candidates.len()) {
        Some(order) => order.into_iter().map(|i| candidates[i].clone()).collect(),
        None => candidates,
    }
}

/// Extract a score list and return candidate indices, best first.
fn parse_scores(raw: &str, n: usize) -> Option<Vec<usize>> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end <= start {
        return None;
    }
    let scored: Vec<ScoredId> = serde_json::from_str(&raw[start..=end]).ok()?;
    let mut scored: Vec<ScoredId> = scored.into_iter().filter(|s| s.id < n).collect();
    if scored.is_empty() {
        return None;
    }
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    let mut seen = std::collections::HashSet::new();
    let mut order: Vec<usize> = scored
        .into_iter()
        .filter(|s| seen.insert(s.id))
        .map(|s| s.id)
        .collect();
    // Unscored candidates keep their relative order at the tail.
    for i in 0..n {
        if !order.contains(&i) {
            order.push(i);
        }
    }
    Some(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scores_reorders() {
        let order = parse_scores(r#"[{"id":0,"score":0.1},{"id":1,"score":0.9}]"#, 2).unwrap();
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn test_parse_scores_with_prose_wrapper() {
        let raw = "Here you go: [{\"id\":1,\"score\":0.8},{\"id\":0,\"score\":0.2}] done";
        assert_eq!(parse_scores(raw, 2).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_parse_scores_fills_unscored_tail() {
        let order = parse_scores(r#"[{"id":2,"score":1.0}]"#, 4).unwrap();
        assert_eq!(order, vec![2, 0, 1, 3]);
    }

    #[test]
    fn test_parse_scores_rejects_garbage() {
        assert!(parse_scores("no json here", 3).is_none());
        assert!(parse_scores("[]", 3).is_none());
        // Out-of-range ids are dropped.
        assert!(parse_scores(r#"[{"id":9,"score":1.0}]"#, 3).is_none());
    }
}
