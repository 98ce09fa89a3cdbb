//! Keyword file index: one entry per indexed file.
//!
//! Built on an explicit index command and replaced wholesale on rebuild.

use relay_shared::memory::{extract_keywords, keyword_overlap};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use walkdir::WalkDir;

/// Snippet stored per file is capped.
pub const MAX_SNIPPET_CHARS: usize = 60_000;
/// Indexable extensions.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "rst", "csv", "json", "yaml", "yml", "toml", "py", "js", "ts",
    "rs", "go", "java", "c", "h", "cpp", "sql", "html", "css", "sh", "log",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocEntry {
    pub path: String,
    pub keywords: Vec<String>,
    pub snippet: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct KeywordIndex {
    pub entries: Vec<DocEntry>,
}

/// A query hit with its overlap score.
#[derive(Debug, Clone, Serialize)]
pub struct KeywordHit {
    pub path: String,
    pub score: usize,
    pub snippet: String,
}

pub fn is_indexable(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| TEXT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

impl KeywordIndex {
    pub fn load(path: &Path) -> Self {
        crate::persist::load_json_or_default(path)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        crate::persist::save_json_atomic(path, self)
    }

    /// Rebuild from a directory walk. The previous index is replaced.
    pub fn build(root: &Path) -> Self {
        let mut entries = Vec::new();
        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if !is_indexable(entry.path()) {
                continue;
            }
            let Ok(raw) = std::fs::read_to_string(entry.path()) else { continue };
            let snippet: String = raw.chars().take(MAX_SNIPPET_CHARS).collect();
            entries.push(DocEntry {
                path: entry.path().display().to_string(),
                keywords: extract_keywords(&snippet),
                snippet,
            });
        }
        info!("keyword index: {} files", entries.len());
        Self { entries }
    }

    /// Query by keyword overlap, best first.
    pub fn query(&self, query: &str, limit: usize) -> Vec<KeywordHit> {
        let query_keywords = extract_keywords(query);
        let mut hits: Vec<KeywordHit> = self
            .entries
            .iter()
            .filter_map(|e| {
                let score = keyword_overlap(&query_keywords, &e.keywords);
                (score > 0).then(|| KeywordHit {
                    path: e.path.clone(),
                    score,
                    snippet: e.snippet.chars().take(600).collect(),
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.cmp(&a.score));
        hits.truncate(limit);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_query() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rust.md"), "rust ownership borrow checker").unwrap();
        std::fs::write(dir.path().join("cooking.md"), "pasta tomato basil").unwrap();
        std::fs::write(dir.path().join("image.bin"), [0u8, 1, 2]).unwrap();

        let index = KeywordIndex::build(dir.path());
        assert_eq!(index.entries.len(), 2); // .bin skipped

        let hits = index.query("explain rust ownership", 5);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].path.ends_with("rust.md"));
    }

    #[test]
    fn test_snippet_cap() {
        let dir = tempfile::tempdir().unwrap();
        let long = "word ".repeat(20_000);
        std::fs::write(dir.path().join("big.txt"), &long).unwrap();
        let index = KeywordIndex::build(dir.path());
        assert!(index.entries[0].snippet.len() <= MAX_SNIPPET_CHARS);
    }

    #[test]
    fn test_rebuild_replaces() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        let first = KeywordIndex::build(dir.path());
        assert_eq!(first.entries.len(), 1);

        std::fs::remove_file(dir.path().join("a.txt")).unwrap();
        std::fs::write(dir.path().join("b.txt"), "beta").unwrap();
        let second = KeywordIndex::build(dir.path());
        assert_eq!(second.entries.len(), 1);
        assert!(second.entries[0].path.ends_with("b.txt"));
    }
}
