//! Tool dispatch.
//!
//! Tools are a closed tagged set; the name-based router collapses to
//! exhaustive matching. Explicit `/tool` prompts bypass the LM entirely.

pub mod chain;
pub mod sandbox;
pub mod sql;

use crate::config::Config;
use crate::ollama::{BackendClient, GenOptions};
use crate::web::WebClient;
use relay_shared::models::MODEL_FAST;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// The closed tool set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Python,
    CodeExecute,
    CodeAnalysis,
    Summarize,
    Sql,
    SqlSchema,
    Sympy,
    Visualize,
    Ingest,
    Search,
    Fetch,
}

impl Tool {
    /// Parse a tool name; `url` is an alias for fetch.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "python" => Some(Self::Python),
            "code_execute" | "execute" => Some(Self::CodeExecute),
            "code_analysis" | "analyze" => Some(Self::CodeAnalysis),
            "summarize" => Some(Self::Summarize),
            "sql" => Some(Self::Sql),
            "sql_schema" | "schema" => Some(Self::SqlSchema),
            "sympy" => Some(Self::Sympy),
            "visualize" => Some(Self::Visualize),
            "ingest" => Some(Self::Ingest),
            "search" => Some(Self::Search),
            "fetch" | "url" => Some(Self::Fetch),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Python => "python",
            Self::CodeExecute => "code_execute",
            Self::CodeAnalysis => "code_analysis",
            Self::Summarize => "summarize",
            Self::Sql => "sql",
            Self::SqlSchema => "sql_schema",
            Self::Sympy => "sympy",
            Self::Visualize => "visualize",
            Self::Ingest => "ingest",
            Self::Search => "search",
            Self::Fetch => "fetch",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolError {
    UnsafeCode(String),
    Timeout,
    SandboxError(String),
    ToolNotFound(String),
    InvalidPath(String),
    BadArgs(String),
}

impl ToolError {
    /// Wire-level error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsafeCode(_) => "unsafe_code",
            Self::Timeout => "sandbox_timeout",
            Self::SandboxError(_) => "sandbox_error",
            Self::ToolNotFound(_) => "tool_not_found",
            Self::InvalidPath(_) => "invalid_path",
            Self::BadArgs(_) => "bad_request",
        }
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsafeCode(what) => write!(f, "unsafe code rejected: {}", what),
            Self::Timeout => write!(f, "sandbox timeout"),
            Self::SandboxError(e) => write!(f, "sandbox error: {}", e),
            Self::ToolNotFound(name) => write!(f, "unknown tool: {}", name),
            Self::InvalidPath(p) => write!(f, "invalid path: {}", p),
            Self::BadArgs(what) => write!(f, "bad arguments: {}", what),
        }
    }
}

impl std::error::Error for ToolError {}

/// Free-form tool arguments off the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolArgs {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub db_path: Option<String>,
    #[serde(default)]
    pub allow_write: bool,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub values: Option<Vec<f64>>,
}

impl ToolArgs {
    /// The dominant free-text argument, for `/tool text` invocations.
    pub fn from_text(tool: Tool, text: &str) -> Self {
        let mut args = ToolArgs::default();
        match tool {
            Tool::Python | Tool::CodeExecute | Tool::CodeAnalysis => {
                args.code = Some(text.to_string())
            }
            Tool::Sql => args.query = Some(text.to_string()),
            Tool::Sympy => args.query = Some(text.to_string()),
            Tool::Search => args.query = Some(text.to_string()),
            Tool::Fetch => args.url = Some(text.to_string()),
            Tool::Ingest => args.path = Some(text.to_string()),
            Tool::Summarize | Tool::Visualize => args.text = Some(text.to_string()),
            Tool::SqlSchema => args.db_path = Some(text.to_string()),
        }
        args
    }
}

/// Shared dependencies for tool execution.
#[derive(Clone)]
pub struct ToolContext {
    pub config: Arc<Config>,
    pub backend: BackendClient,
    pub web: WebClient,
    pub sql_cache: Arc<Mutex<sql::SqlCache>>,
}

/// Parse an explicit tool command: `/python print(1)` or `sql: SELECT 1`.
pub fn parse_explicit(prompt: &str) -> Option<(Tool, String)> {
    let trimmed = prompt.trim();
    if let Some(rest) = trimmed.strip_prefix('/') {
        let (name, body) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let tool = Tool::parse(name)?;
        return Some((tool, body.trim().to_string()));
    }
    if let Some((name, body)) = trimmed.split_once(':') {
        if !name.contains(char::is_whitespace) {
            if let Some(tool) = Tool::parse(name.trim()) {
                return Some((tool, body.trim().to_string()));
            }
        }
    }
    None
}

fn require<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str, ToolError> {
    field
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::BadArgs(format!("missing {}", name)))
}

/// Run one tool to completion.
pub async fn run_tool(tool: Tool, args: &ToolArgs, ctx: &ToolContext) -> Result<String, ToolError> {
    info!("tool: {:?}", tool);
    match tool {
        Tool::Python => {
            let code = require(&args.code, "code")?;
            let out = sandbox::run_python(code, ctx.config.safe_mode).await?;
            Ok(render_sandbox(out))
        }
        Tool::CodeExecute => {
            let code = require(&args.code, "code")?;
            let language = args.language.as_deref().unwrap_or("python");
            let out = match language {
                "javascript" | "typescript" | "js" | "ts" => {
                    sandbox::run_js(code, ctx.config.safe_mode).await?
                }
                _ => sandbox::run_python(code, ctx.config.safe_mode).await?,
            };
            Ok(render_sandbox(out))
        }
        Tool::CodeAnalysis => {
            let code = require(&args.code, "code")?;
            let language = args.language.as_deref().unwrap_or("python");
            match language {
                "javascript" | "typescript" | "js" | "ts" => {
                    sandbox::check_js(code)?;
                    Ok("static check passed".to_string())
                }
                _ => {
                    let out = sandbox::analyze_python(code).await?;
                    Ok(render_sandbox(out))
                }
            }
        }
        Tool::Summarize => {
            let text = require(&args.text, "text")?;
            let bounded: String = text.chars().take(sandbox::MAX_CODE_CHARS).collect();
            ctx.backend
                .generate(
                    MODEL_FAST,
                    Some("Summarize the following text in a short paragraph."),
                    &bounded,
                    &GenOptions::default(),
                )
                .await
                .map_err(|e| ToolError::SandboxError(e.to_string()))
        }
        Tool::Sql => {
            let query = require(&args.query, "query")?.to_string();
            let db_path = resolve_db_path(args, &ctx.config)?;
            let read_only = !args.allow_write;
            if read_only {
                let cache = ctx.sql_cache.lock().await;
                if let Some(hit) = cache.get(&db_path.display().to_string(), &query) {
                    return Ok(hit);
                }
            }
            let allow_write = args.allow_write;
            let path_for_task = db_path.clone();
            let query_for_task = query.clone();
            let result = tokio::task::spawn_blocking(move || {
                sql::run_query(&path_for_task, &query_for_task, allow_write)
            })
            .await
            .map_err(|e| ToolError::SandboxError(e.to_string()))??;
            if read_only {
                let mut cache = ctx.sql_cache.lock().await;
                cache.put(&db_path.display().to_string(), &query, result.clone());
            }
            Ok(result)
        }
        Tool::SqlSchema => {
            let db_path = resolve_db_path(args, &ctx.config)?;
            tokio::task::spawn_blocking(move || sql::schema(&db_path))
                .await
                .map_err(|e| ToolError::SandboxError(e.to_string()))?
        }
        Tool::Sympy => {
            let expr = require(&args.query, "query")?;
            let out = sandbox::run_sympy(expr).await?;
            Ok(render_sandbox(out))
        }
        Tool::Visualize => Ok(visualize(args)?),
        Tool::Ingest => {
            let raw = require(&args.path, "path")?;
            let path = resolve_ingest_path(raw)?;
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ToolError::SandboxError(format!("read failed: {}", e)))?;
            Ok(text.chars().take(crate::retrieval::files::MAX_FILE_CHARS).collect())
        }
        Tool::Search => {
            let query = require(&args.query, "query")?;
            let results = ctx.web.search(query).await;
            if results.is_empty() {
                Ok("no results".to_string())
            } else {
                Ok(crate::web::citation_block(&results))
            }
        }
        Tool::Fetch => {
            let url = require(&args.url, "url")?;
            ctx.web
                .fetch_page(url)
                .await
                .map_err(|e| ToolError::SandboxError(e.to_string()))
        }
    }
}

fn render_sandbox(out: sandbox::SandboxOutput) -> String {
    if out.success {
        if out.stdout.is_empty() {
            "(no output)".to_string()
        } else {
            out.stdout
        }
    } else if out.stderr.is_empty() {
        format!("failed\n{}", out.stdout)
    } else {
        format!("failed\n{}", out.stderr)
    }
}

fn resolve_db_path(args: &ToolArgs, config: &Config) -> Result<PathBuf, ToolError> {
    if let Some(p) = &args.db_path {
        return Ok(PathBuf::from(p));
    }
    config
        .sql_store_path
        .clone()
        .ok_or_else(|| ToolError::BadArgs("no SQL store configured".to_string()))
}

/// Resolve an ingest path safely under the project root; traversal outside
/// is rejected.
pub fn resolve_ingest_path(raw: &str) -> Result<PathBuf, ToolError> {
    let root = std::env::current_dir()
        .map_err(|e| ToolError::SandboxError(e.to_string()))?
        .canonicalize()
        .map_err(|e| ToolError::SandboxError(e.to_string()))?;
    let joined = if Path::new(raw).is_absolute() {
        PathBuf::from(raw)
    } else {
        root.join(raw)
    };
    let resolved = joined
        .canonicalize()
        .map_err(|_| ToolError::InvalidPath(raw.to_string()))?;
    if !resolved.starts_with(&root) {
        return Err(ToolError::InvalidPath(raw.to_string()));
    }
    Ok(resolved)
}

/// Build a CHART_JSON line from explicit series or numbers found in text.
fn visualize(args: &ToolArgs) -> Result<String, ToolError> {
    let (labels, values): (Vec<String>, Vec<f64>) = match (&args.labels, &args.values) {
        (Some(l), Some(v)) if l.len() == v.len() && !v.is_empty() => (l.clone(), v.clone()),
        _ => {
            let text = args
                .text
                .as_deref()
                .ok_or_else(|| ToolError::BadArgs("need labels+values or text".to_string()))?;
            let values: Vec<f64> = text
                .split(|c: char| !c.is_ascii_digit() && c != '.' && c != '-')
                .filter_map(|s| s.parse::<f64>().ok())
                .take(20)
                .collect();
            if values.is_empty() {
                return Err(ToolError::BadArgs("no numeric series found".to_string()));
            }
            let labels = (1..=values.len()).map(|i| format!("#{}", i)).collect();
            (labels, values)
        }
    };
    let payload = serde_json::json!({
        "type": "bar",
        "labels": labels,
        "values": values,
    });
    Ok(format!("CHART_JSON: {}", payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_parse() {
        assert_eq!(Tool::parse("python"), Some(Tool::Python));
        assert_eq!(Tool::parse("URL"), Some(Tool::Fetch));
        assert_eq!(Tool::parse("schema"), Some(Tool::SqlSchema));
        assert_eq!(Tool::parse("rm_rf"), None);
    }

    #[test]
    fn test_parse_explicit_slash() {
        let (tool, body) = parse_explicit("/python print(40 + 2)").unwrap();
        assert_eq!(tool, Tool::Python);
        assert_eq!(body, "print(40 + 2)");
    }

    #[test]
    fn test_parse_explicit_colon() {
        let (tool, body) = parse_explicit("sql: SELECT * FROM users").unwrap();
        assert_eq!(tool, Tool::Sql);
        assert_eq!(body, "SELECT * FROM users");
    }

    #[test]
    fn test_parse_explicit_rejects_prose() {
        assert!(parse_explicit("note: buy milk").is_none());
        assert!(parse_explicit("what is 2+2").is_none());
        assert!(parse_explicit("/unknown foo").is_none());
        // A colon later in a sentence does not trigger.
        assert!(parse_explicit("the ratio sql : nosql is 2:1").is_none());
    }

    #[test]
    fn test_args_from_text() {
        let args = ToolArgs::from_text(Tool::Python, "print(1)");
        assert_eq!(args.code.as_deref(), Some("print(1)"));
        let args = ToolArgs::from_text(Tool::Search, "rust async");
        assert_eq!(args.query.as_deref(), Some("rust async"));
    }

    #[test]
    fn test_visualize_from_series() {
        let args = ToolArgs {
            labels: Some(vec!["a".into(), "b".into()]),
            values: Some(vec![1.0, 2.0]),
            ..Default::default()
        };
        let out = visualize(&args).unwrap();
        assert!(out.starts_with("CHART_JSON: "));
        let parsed: serde_json::Value =
            serde_json::from_str(out.strip_prefix("CHART_JSON: ").unwrap()).unwrap();
        assert_eq!(parsed["labels"][1], "b");
    }

    #[test]
    fn test_visualize_from_text() {
        let args = ToolArgs { text: Some("sales were 10 then 25 then 40".into()), ..Default::default() };
        let out = visualize(&args).unwrap();
        assert!(out.contains("10"));
        assert!(out.contains("40"));
    }

    #[test]
    fn test_ingest_traversal_rejected() {
        let err = resolve_ingest_path("../../../../etc/passwd").unwrap_err();
        assert!(matches!(err, ToolError::InvalidPath(_)));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(ToolError::Timeout.kind(), "sandbox_timeout");
        assert_eq!(ToolError::UnsafeCode("x".into()).kind(), "unsafe_code");
        assert_eq!(ToolError::ToolNotFound("x".into()).kind(), "tool_not_found");
    }
}
