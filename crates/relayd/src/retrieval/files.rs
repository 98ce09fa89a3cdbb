//! File context: user-attached files and bounded auto-selection.

use relay_shared::memory::{extract_keywords, keyword_overlap};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Per-file extraction cap.
pub const MAX_FILE_CHARS: usize = 120_000;
/// Auto-selection picks at most this many files.
pub const MAX_AUTO_FILES: usize = 4;
/// Auto-selection scans at most this many candidates.
pub const MAX_SCAN_CANDIDATES: usize = 120;

/// Extracted file block for the composed prompt.
#[derive(Debug, Clone)]
pub struct FileContext {
    pub path: String,
    pub text: String,
}

/// Read an explicitly attached file, truncated.
pub fn read_attached(path: &Path) -> Option<FileContext> {
    let raw = std::fs::read_to_string(path).ok()?;
    Some(FileContext {
        path: path.display().to_string(),
        text: raw.chars().take(MAX_FILE_CHARS).collect(),
    })
}

/// Pick up to MAX_AUTO_FILES files under `root` by keyword overlap with the
/// prompt. The scan is bounded to MAX_SCAN_CANDIDATES files.
pub fn auto_select(root: &Path, prompt: &str) -> Vec<FileContext> {
    let prompt_keywords = extract_keywords(prompt);
    if prompt_keywords.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, FileContext)> = Vec::new();
    let mut scanned = 0usize;
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        if scanned >= MAX_SCAN_CANDIDATES {
            break;
        }
        if !super::keyword::is_indexable(entry.path()) {
            continue;
        }
        scanned += 1;
        let Ok(raw) = std::fs::read_to_string(entry.path()) else { continue };
        let text: String = raw.chars().take(MAX_FILE_CHARS).collect();
        let keywords = extract_keywords(&text);
        let score = keyword_overlap(&prompt_keywords, &keywords);
        if score > 0 {
            scored.push((score, FileContext {
                path: entry.path().display().to_string(),
                text,
            }));
        }
    }

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(MAX_AUTO_FILES);
    debug!("auto-selected {} files ({} scanned)", scored.len(), scanned);
    scored.into_iter().map(|(_, f)| f).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attached_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, "x".repeat(MAX_FILE_CHARS + 500)).unwrap();
        let ctx = read_attached(&path).unwrap();
        assert_eq!(ctx.text.len(), MAX_FILE_CHARS);
    }

    #[test]
    fn test_auto_select_by_overlap() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("db.md"), "postgres index vacuum tuning").unwrap();
        std::fs::write(dir.path().join("ui.md"), "button color palette").unwrap();
        let picked = auto_select(dir.path(), "how do I tune postgres vacuum");
        assert_eq!(picked.len(), 1);
        assert!(picked[0].path.ends_with("db.md"));
    }

    #[test]
    fn test_auto_select_cap() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..8 {
            std::fs::write(
                dir.path().join(format!("n{}.md", i)),
                "kubernetes cluster scaling notes",
            )
            .unwrap();
        }
        let picked = auto_select(dir.path(), "kubernetes cluster scaling");
        assert_eq!(picked.len(), MAX_AUTO_FILES);
    }
}
