//! SQL tool over a local SQLite store.
//!
//! Defaults to read-only: multi-statement input and write keywords are
//! rejected unless the caller sets allow_write. Read-only results are
//! cached per (db path, query) for five minutes.

use super::ToolError;
use rusqlite::{Connection, OpenFlags};
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

/// Read-only query cache TTL.
pub const QUERY_CACHE_TTL: Duration = Duration::from_secs(300);
/// Rows returned per query are bounded.
pub const MAX_ROWS: usize = 200;

const WRITE_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "alter", "create", "replace",
    "pragma", "attach", "detach", "vacuum",
];

/// Reject writes and multi-statement input for read-only use.
pub fn check_read_only(query: &str) -> Result<(), ToolError> {
    let q = query.to_lowercase();
    // A trailing semicolon is fine; an interior one is another statement.
    if q.trim_end().trim_end_matches(';').contains(';') {
        return Err(ToolError::UnsafeCode("multi-statement query".to_string()));
    }
    for keyword in WRITE_KEYWORDS {
        if q.split(|c: char| !c.is_alphanumeric() && c != '_')
            .any(|w| w == *keyword)
        {
            return Err(ToolError::UnsafeCode(format!("write keyword: {}", keyword)));
        }
    }
    Ok(())
}

/// (db path, query) -> (inserted at, rendered result).
#[derive(Debug, Default)]
pub struct SqlCache {
    entries: HashMap<(String, String), (Instant, String)>,
}

impl SqlCache {
    pub fn get(&self, db_path: &str, query: &str) -> Option<String> {
        let (at, result) = self.entries.get(&(db_path.to_string(), query.to_string()))?;
        if at.elapsed() > QUERY_CACHE_TTL {
            return None;
        }
        debug!("sql: cache hit");
        Some(result.clone())
    }

    pub fn put(&mut self, db_path: &str, query: &str, result: String) {
        self.entries
            .insert((db_path.to_string(), query.to_string()), (Instant::now(), result));
        // Drop stale entries opportunistically.
        self.entries.retain(|_, (at, _)| at.elapsed() <= QUERY_CACHE_TTL);
    }
}

/// Run a query. Blocking; call through spawn_blocking.
pub fn run_query(db_path: &Path, query: &str, allow_write: bool) -> Result<String, ToolError> {
    if !allow_write {
        check_read_only(query)?;
    }
    if !db_path.exists() {
        return Err(ToolError::InvalidPath(db_path.display().to_string()));
    }

    let flags = if allow_write {
        OpenFlags::SQLITE_OPEN_READ_WRITE
    } else {
        OpenFlags::SQLITE_OPEN_READ_ONLY
    };
    let conn = Connection::open_with_flags(db_path, flags)
        .map_err(|e| ToolError::SandboxError(format!("open failed: {}", e)))?;

    if allow_write && !starts_with_select(query) {
        let affected = conn
            .execute(query, [])
            .map_err(|e| ToolError::SandboxError(e.to_string()))?;
        return Ok(format!("{} rows affected", affected));
    }

    let mut stmt = conn
        .prepare(query)
        .map_err(|e| ToolError::SandboxError(e.to_string()))?;
    let column_names: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let mut rows = stmt
        .query([])
        .map_err(|e| ToolError::SandboxError(e.to_string()))?;
    let mut lines = vec![column_names.join(" | ")];
    let mut count = 0;
    while let Some(row) = rows.next().map_err(|e| ToolError::SandboxError(e.to_string()))? {
        if count >= MAX_ROWS {
            lines.push(format!("... truncated at {} rows", MAX_ROWS));
            break;
        }
        let mut cells = Vec::with_capacity(column_names.len());
        for i in 0..column_names.len() {
            let cell: rusqlite::types::Value = row
                .get(i)
                .map_err(|e| ToolError::SandboxError(e.to_string()))?;
            cells.push(render_value(&cell));
        }
        lines.push(cells.join(" | "));
        count += 1;
    }
    Ok(lines.join("\n"))
}

fn starts_with_select(query: &str) -> bool {
    let q = query.trim_start().to_lowercase();
    q.starts_with("select") || q.starts_with("with")
}

fn render_value(value: &rusqlite::types::Value) -> String {
    use rusqlite::types::Value;
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => format!("{}", f),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

/// Table names plus their CREATE statements.
pub fn schema(db_path: &Path) -> Result<String, ToolError> {
    if !db_path.exists() {
        return Err(ToolError::InvalidPath(db_path.display().to_string()));
    }
    let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| ToolError::SandboxError(format!("open failed: {}", e)))?;
    let mut stmt = conn
        .prepare("SELECT name, sql FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .map_err(|e| ToolError::SandboxError(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| {
            let name: String = row.get(0)?;
            let sql: Option<String> = row.get(1)?;
            Ok((name, sql))
        })
        .map_err(|e| ToolError::SandboxError(e.to_string()))?;

    let mut out = String::new();
    for row in rows {
        let (name, sql) = row.map_err(|e| ToolError::SandboxError(e.to_string()))?;
        out.push_str(&format!("-- {}\n{}\n\n", name, sql.unwrap_or_default()));
    }
    if out.is_empty() {
        out.push_str("(no tables)");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER);
             INSERT INTO users (name, age) VALUES ('alice', 30), ('bob', 25);",
        )
        .unwrap();
        (dir, path)
    }

    #[test]
    fn test_read_only_guard() {
        assert!(check_read_only("SELECT * FROM users").is_ok());
        assert!(check_read_only("select name from users;").is_ok());
        assert!(matches!(
            check_read_only("DROP TABLE users"),
            Err(ToolError::UnsafeCode(_))
        ));
        assert!(matches!(
            check_read_only("SELECT 1; DELETE FROM users"),
            Err(ToolError::UnsafeCode(_))
        ));
        assert!(matches!(
            check_read_only("INSERT INTO users VALUES (1)"),
            Err(ToolError::UnsafeCode(_))
        ));
        // Column named "created_at" is not the CREATE keyword.
        assert!(check_read_only("SELECT created_at FROM users").is_ok());
    }

    #[test]
    fn test_query_and_rows() {
        let (_dir, path) = test_db();
        let out = run_query(&path, "SELECT name, age FROM users ORDER BY age", false).unwrap();
        assert!(out.starts_with("name | age"));
        assert!(out.contains("bob | 25"));
        assert!(out.contains("alice | 30"));
    }

    #[test]
    fn test_write_rejected_without_flag() {
        let (_dir, path) = test_db();
        let err = run_query(&path, "DELETE FROM users", false).unwrap_err();
        assert!(matches!(err, ToolError::UnsafeCode(_)));
    }

    #[test]
    fn test_write_allowed_with_flag() {
        let (_dir, path) = test_db();
        let out = run_query(&path, "DELETE FROM users WHERE name = 'bob'", true).unwrap();
        assert_eq!(out, "1 rows affected");
    }

    #[test]
    fn test_missing_db_is_invalid_path() {
        let err = run_query(Path::new("/nonexistent/x.db"), "SELECT 1", false).unwrap_err();
        assert!(matches!(err, ToolError::InvalidPath(_)));
    }

    #[test]
    fn test_schema() {
        let (_dir, path) = test_db();
        let out = schema(&path).unwrap();
        assert!(out.contains("-- users"));
        assert!(out.contains("CREATE TABLE users"));
    }

    #[test]
    fn test_cache_roundtrip() {
        let mut cache = SqlCache::default();
        assert!(cache.get("db", "q").is_none());
        cache.put("db", "q", "result".into());
        assert_eq!(cache.get("db", "q"), Some("result".into()));
        assert!(cache.get("db", "other").is_none());
    }
}
