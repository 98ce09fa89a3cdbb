//! Persistence-level invariants: cache and memory bounds, TTLs, and
//! atomic file behavior.

use relay_shared::Intent;
use relayd::cache::{cache_key, ResponseCache, MAX_ENTRIES as CACHE_MAX};
use relayd::memory::{MemoryStore, Scope, MAX_ENTRIES as MEMORY_MAX};

#[test]
fn cache_bound_holds_after_churn() {
    let mut cache = ResponseCache::new();
    for i in 0..(CACHE_MAX * 2) {
        cache.put(
            format!("key{}", i),
            format!("value{}", i),
            Intent::SimpleQa,
            None,
            false,
        );
    }
    assert_eq!(cache.len(), CACHE_MAX);
}

#[test]
fn cache_file_never_exceeds_bound() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("response_cache.json");
    let mut cache = ResponseCache::new();
    for i in 0..(CACHE_MAX + 100) {
        cache.put(format!("k{}", i), "v".into(), Intent::CodeTask, None, false);
    }
    cache.save(&path).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(parsed["items"].as_array().unwrap().len() <= CACHE_MAX);
}

#[test]
fn repeated_lookup_is_byte_identical_within_ttl() {
    let mut cache = ResponseCache::new();
    let key = cache_key(Intent::Learning, "Explain ownership");
    let body = "Thinking\n- (omitted by request)\n\nResult\n- ownership moves values";
    cache.put(key.clone(), body.to_string(), Intent::Learning, None, false);

    let first = cache.get_exact(&key).unwrap();
    let second = cache.get_exact(&key).unwrap();
    assert_eq!(first.as_bytes(), second.as_bytes());
    assert_eq!(first.as_bytes(), body.as_bytes());
}

#[test]
fn cache_key_ignores_prompt_case_only() {
    let a = cache_key(Intent::Learning, "Explain Ownership");
    let b = cache_key(Intent::Learning, "explain ownership");
    let c = cache_key(Intent::Learning, "explain borrowing");
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn memory_file_never_exceeds_bound() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memory.json");
    let mut store = MemoryStore::new();
    let scope = Scope::user("u1");
    for i in 0..(MEMORY_MAX + 77) {
        store.store(&scope, &format!("fact {}", i), "ok", "saved", None, None);
    }
    store.save(&path).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed["entries"].as_array().unwrap().len(), MEMORY_MAX);
}

#[test]
fn expired_entries_absent_after_purge_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memory.json");
    let mut store = MemoryStore::new();
    let scope = Scope::user("u1");
    store.store(&scope, "stays", "ok", "saved", None, Some(30));
    store.store(&scope, "goes", "ok", "saved", None, Some(30));

    // Backdate the second entry past its expiry through the file.
    store.save(&path).unwrap();
    let mut parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    parsed["entries"][1]["expires_at"] = serde_json::json!("2001-01-01T00:00:00+00:00");
    std::fs::write(&path, serde_json::to_string(&parsed).unwrap()).unwrap();

    // Pruned on load.
    let reloaded = MemoryStore::load(&path);
    assert_eq!(reloaded.len(), 1);
    let listed = reloaded.list(&scope, None);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].prompt, "stays");
}

#[test]
fn unparsable_expiry_survives_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memory.json");
    let mut store = MemoryStore::new();
    store.store(&Scope::user("u1"), "odd", "ok", "saved", None, Some(30));
    store.save(&path).unwrap();

    let mut parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    parsed["entries"][0]["expires_at"] = serde_json::json!("soon-ish");
    std::fs::write(&path, serde_json::to_string(&parsed).unwrap()).unwrap();

    // Unparsable expiry reads as "not expired".
    let reloaded = MemoryStore::load(&path);
    assert_eq!(reloaded.len(), 1);
}

#[test]
fn atomic_save_leaves_valid_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("response_cache.json");
    let mut cache = ResponseCache::new();
    for i in 0..50 {
        cache.put(format!("k{}", i), "v".into(), Intent::SimpleQa, None, true);
        cache.save(&path).unwrap();
    }
    // Every observation of the file parses as a full document.
    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(parsed["items"].is_array());
    assert!(!path.with_extension("json.tmp").exists());
}
