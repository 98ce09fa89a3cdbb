//! Embedding index over chunked local files.
//!
//! Chunks carry a content hash (`path:index:text`) so rebuilds can skip
//! unchanged text. At most 120 chunks per file.

use anyhow::Result;
use relay_shared::memory::cosine_similarity;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;
use walkdir::WalkDir;

/// Chunks per file are capped.
pub const MAX_CHUNKS_PER_FILE: usize = 120;
/// Default chunk size in characters.
pub const DEFAULT_CHUNK_CHARS: usize = 800;
/// Overlap between consecutive chunks.
pub const DEFAULT_OVERLAP_CHARS: usize = 120;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocChunk {
    pub path: String,
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
    pub content_hash: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EmbeddingIndex {
    pub items: Vec<DocChunk>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingHit {
    pub path: String,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

fn content_hash(path: &str, index: usize, text: &str) -> String {
    let digest = Sha256::digest(format!("{}:{}:{}", path, index, text).as_bytes());
    format!("{:x}", digest)
}

/// Split text into overlapping chunks on char boundaries.
pub fn chunk_text(text: &str, chunk_chars: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || chunk_chars == 0 {
        return Vec::new();
    }
    let step = chunk_chars.saturating_sub(overlap).max(1);
    let mut out = Vec::new();
    let mut start = 0;
    while start < chars.len() && out.len() < MAX_CHUNKS_PER_FILE {
        let end = (start + chunk_chars).min(chars.len());
        out.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    out
}

impl EmbeddingIndex {
    pub fn load(path: &Path) -> Self {
        crate::persist::load_json_or_default(path)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        crate::persist::save_json_atomic(path, self)
    }

    /// Rebuild from a directory walk, embedding each chunk through the
    /// backend. Chunks whose content hash survives from the prior index are
    /// reused without a new embedding call. The previous index is replaced.
    pub async fn build(
        prior: EmbeddingIndex,
        root: &Path,
        backend: &crate::ollama::BackendClient,
        chunk_chars: usize,
        overlap: usize,
    ) -> Result<Self> {
        let mut seed: std::collections::HashMap<String, DocChunk> = prior
            .items
            .into_iter()
            .map(|c| (c.content_hash.clone(), c))
            .collect();
        let mut items = Vec::new();

        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if !super::keyword::is_indexable(entry.path()) {
                continue;
            }
            let Ok(raw) = std::fs::read_to_string(entry.path()) else { continue };
            let path = entry.path().display().to_string();
            for (i, text) in chunk_text(&raw, chunk_chars, overlap).into_iter().enumerate() {
                let hash = content_hash(&path, i, &text);
                if let Some(prev) = seed.remove(&hash) {
                    items.push(prev);
                    continue;
                }
                let embedding = backend.embed(&text).await?;
                items.push(DocChunk {
                    path: path.clone(),
                    chunk_index: i,
                    text,
                    embedding,
                    content_hash: hash,
                });
            }
        }
        info!("embedding index: {} chunks", items.len());
        Ok(Self { items })
    }

    /// Cosine query, best first.
    pub fn query(&self, embedding: &[f32], limit: usize, min_score: f32) -> Vec<EmbeddingHit> {
        let mut hits: Vec<EmbeddingHit> = self
            .items
            .iter()
            .filter_map(|c| {
                let score = cosine_similarity(embedding, &c.embedding);
                (score >= min_score).then(|| EmbeddingHit {
                    path: c.path.clone(),
                    chunk_index: c.chunk_index,
                    text: c.text.clone(),
                    score,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunking_with_overlap() {
        let text = "a".repeat(2000);
        let chunks = chunk_text(&text, 800, 120);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 800);
        // Overlap: the second chunk starts 680 chars in.
        assert_eq!(chunks[2].len(), 2000 - 2 * 680);
    }

    #[test]
    fn test_chunk_cap() {
        let text = "x".repeat(DEFAULT_CHUNK_CHARS * (MAX_CHUNKS_PER_FILE + 50));
        let chunks = chunk_text(&text, DEFAULT_CHUNK_CHARS, 0);
        assert_eq!(chunks.len(), MAX_CHUNKS_PER_FILE);
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 800, 120).is_empty());
    }

    #[test]
    fn test_hash_uniqueness() {
        let a = content_hash("a.txt", 0, "hello");
        let b = content_hash("a.txt", 1, "hello");
        let c = content_hash("b.txt", 0, "hello");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_query_ordering() {
        let index = EmbeddingIndex {
            items: vec![
                DocChunk {
                    path: "far.txt".into(),
                    chunk_index: 0,
                    text: "far".into(),
                    embedding: vec![0.1, 0.9],
                    content_hash: "h1".into(),
                },
                DocChunk {
                    path: "near.txt".into(),
                    chunk_index: 0,
                    text: "near".into(),
                    embedding: vec![1.0, 0.0],
                    content_hash: "h2".into(),
                },
            ],
        };
        let hits = index.query(&[1.0, 0.0], 2, 0.0);
        assert_eq!(hits[0].path, "near.txt");
    }
}
