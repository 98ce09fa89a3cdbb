//! Atomic JSON persistence with debounced saves.
//!
//! Readers of the data files see either the prior or the next full
//! document: writes go to a temp file and rename into place.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Coalescing window for debounced saves.
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(250);

/// Load a JSON document, or the default when the file is missing/corrupt.
pub fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                warn!("corrupt store {}: {} (starting empty)", path.display(), e);
                T::default()
            }
        },
        Err(_) => T::default(),
    }
}

/// Write a JSON document atomically: temp file in the same directory, then
/// rename over the target.
pub fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    let raw = serde_json::to_string_pretty(value).context("serializing store")?;
    std::fs::write(&tmp, raw).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    debug!("saved {}", path.display());
    Ok(())
}

/// Debounced save trigger. `mark_dirty` can be called from any task; the
/// spawned worker coalesces bursts into one save per window.
#[derive(Clone)]
pub struct Debouncer {
    tx: mpsc::UnboundedSender<()>,
}

impl Debouncer {
    /// Spawn the save worker. `save` runs after each quiet window.
    pub fn spawn<F, Fut>(save: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                // Coalesce everything that arrives within the window.
                tokio::time::sleep(SAVE_DEBOUNCE).await;
                while rx.try_recv().is_ok() {}
                save().await;
            }
        });
        Self { tx }
    }

    pub fn mark_dirty(&self) {
        let _ = self.tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Doc {
        items: Vec<String>,
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let doc = Doc { items: vec!["a".into(), "b".into()] };
        save_json_atomic(&path, &doc).unwrap();
        let loaded: Doc = load_json_or_default(&path);
        assert_eq!(loaded, doc);
    }

    #[test]
    fn test_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded: Doc = load_json_or_default(&dir.path().join("nope.json"));
        assert_eq!(loaded, Doc::default());
    }

    #[test]
    fn test_corrupt_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let loaded: Doc = load_json_or_default(&path);
        assert_eq!(loaded, Doc::default());
    }

    #[test]
    fn test_no_temp_residue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        save_json_atomic(&path, &Doc::default()).unwrap();
        assert!(!path.with_extension("json.tmp").exists());
    }
}
