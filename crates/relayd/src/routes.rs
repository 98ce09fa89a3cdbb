//! HTTP route handlers.
//!
//! JSON in, JSON out. Errors surface as `{error, message}` with the error
//! kind from the closed set; cancellation of an unknown id answers
//! `{status: "not_found"}` instead of 404.

use crate::classifier;
use crate::ollama::GenOptions;
use crate::pipeline::{self, EventSink, PipelineRequest};
use crate::reports;
use crate::retrieval::{embedding, EmbeddingIndex, KeywordIndex};
use crate::server::AppState;
use crate::tools::{self, chain::ChainStep, Tool, ToolArgs};
use crate::{agent, media};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use relay_shared::intent::ClassifyContext;
use relay_shared::route::Task;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

type AppStateArc = Arc<AppState>;
type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, kind: &str, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": kind, "message": message.into() })))
}

fn bad_request(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

// ============================================================================
// Health
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppStateArc>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "relayd",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "backend_reachable": state.backend.is_available().await,
    }))
}

// ============================================================================
// Auto + task aliases
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoBody {
    pub prompt: String,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub fast: bool,
    #[serde(default)]
    pub auto_files: bool,
    #[serde(default)]
    pub auto_web: bool,
    #[serde(default)]
    pub file_paths: Vec<String>,
    #[serde(default)]
    pub image_description: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub team_mode: bool,
    #[serde(default)]
    pub use_doc_index: bool,
    #[serde(default)]
    pub use_embeddings: bool,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub response_spec: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

pub fn build_request(body: AutoBody, task_override: Option<Task>) -> Result<PipelineRequest, ApiError> {
    if body.prompt.trim().is_empty() {
        return Err(bad_request("missing required field: prompt"));
    }
    let task = match (task_override, &body.task) {
        (Some(t), _) => Some(t),
        (None, Some(raw)) => Some(
            Task::parse(raw)
                .ok_or_else(|| bad_request(format!("unsupported task: {}", raw)))?,
        ),
        (None, None) => None,
    };

    let mut req = PipelineRequest::new(&body.prompt, body.user_id.as_deref().unwrap_or("default"));
    if let Some(id) = body.request_id {
        req.request_id = id;
    }
    req.team_id = body.team_id;
    req.team_mode = body.team_mode;
    req.language = body.language;
    req.task_override = task;
    req.model_override = body.model;
    req.options = GenOptions { temperature: body.temperature, max_tokens: body.max_tokens };
    req.fast = body.fast;
    req.auto_web = body.auto_web;
    req.auto_files = body.auto_files;
    req.use_doc_index = body.use_doc_index;
    req.use_embeddings = body.use_embeddings;
    req.file_paths = body.file_paths;
    req.image_description = body.image_description;
    req.response_spec = body.response_spec;
    Ok(req)
}

async fn run_to_json(state: AppStateArc, req: PipelineRequest) -> Result<Json<Value>, ApiError> {
    // HTTP callers get the collected result; the event stream is dropped.
    let (sink, rx) = EventSink::new();
    drop(rx);
    match pipeline::run(&state, req, &sink).await {
        Ok(result) => Ok(Json(json!({
            "model": result.meta.model,
            "response": result.response,
            "meta": result.meta,
        }))),
        Err((kind, message)) => {
            error!("pipeline error: {} ({})", kind, message);
            let status = match kind.as_str() {
                "bad_request" => StatusCode::BAD_REQUEST,
                "cancelled" => StatusCode::CONFLICT,
                "unsafe_code" | "tool_not_found" | "invalid_path" => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err(api_error(status, &kind, message))
        }
    }
}

async fn auto(
    State(state): State<AppStateArc>,
    Json(body): Json<AutoBody>,
) -> Result<Json<Value>, ApiError> {
    let req = build_request(body, None)?;
    run_to_json(state, req).await
}

macro_rules! alias_handler {
    ($name:ident, $task:expr) => {
        async fn $name(
            State(state): State<AppStateArc>,
            Json(body): Json<AutoBody>,
        ) -> Result<Json<Value>, ApiError> {
            let req = build_request(body, Some($task))?;
            run_to_json(state, req).await
        }
    };
}

alias_handler!(alias_chat, Task::Chat);
alias_handler!(alias_reason, Task::Reason);
alias_handler!(alias_code, Task::Code);
alias_handler!(alias_sql, Task::Sql);
alias_handler!(alias_vision, Task::Vision);
alias_handler!(alias_debug, Task::Debug);
alias_handler!(alias_fast, Task::Fast);
alias_handler!(alias_report, Task::Report);
alias_handler!(alias_dashboard, Task::Dashboard);
alias_handler!(alias_dashboard_vanilla, Task::DashboardVanilla);
alias_handler!(alias_chart, Task::Chart);
alias_handler!(alias_image_prompt, Task::ImagePrompt);
alias_handler!(alias_video_prompt, Task::VideoPrompt);
alias_handler!(alias_research, Task::Research);

/// `/api/custom` takes the task from the body like `/api/auto`, but
/// requires it.
async fn alias_custom(
    State(state): State<AppStateArc>,
    Json(body): Json<AutoBody>,
) -> Result<Json<Value>, ApiError> {
    if body.task.is_none() {
        return Err(bad_request("missing required field: task"));
    }
    let req = build_request(body, None)?;
    run_to_json(state, req).await
}

pub fn auto_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/api/auto", post(auto))
        .route("/api/chat", post(alias_chat))
        .route("/api/reason", post(alias_reason))
        .route("/api/code", post(alias_code))
        .route("/api/sql", post(alias_sql))
        .route("/api/vision", post(alias_vision))
        .route("/api/debug", post(alias_debug))
        .route("/api/fast", post(alias_fast))
        .route("/api/report", post(alias_report))
        .route("/api/dashboard", post(alias_dashboard))
        .route("/api/dashboard/vanilla", post(alias_dashboard_vanilla))
        .route("/api/chart", post(alias_chart))
        .route("/api/image_prompt", post(alias_image_prompt))
        .route("/api/video_prompt", post(alias_video_prompt))
        .route("/api/research", post(alias_research))
        .route("/api/custom", post(alias_custom))
}

// ============================================================================
// Memory
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemoryStoreBody {
    user_id: String,
    prompt: String,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    team_id: Option<String>,
    #[serde(default)]
    ttl_days: Option<i64>,
    #[serde(default)]
    force: bool,
}

async fn memory_store(
    State(state): State<AppStateArc>,
    Json(body): Json<MemoryStoreBody>,
) -> Result<Json<Value>, ApiError> {
    // Outside the pipeline, a direct store call is an explicit force.
    let _ = body.force;
    let scope = crate::memory::Scope {
        user_id: body.user_id,
        team_id: body.team_id,
        team_mode: false,
    };
    let id = {
        let mut memory = state.memory.write().await;
        memory.store(
            &scope,
            &body.prompt,
            body.response.as_deref().unwrap_or("noted"),
            "saved",
            None,
            body.ttl_days,
        )
    };
    state.memory_saver.mark_dirty();
    Ok(Json(json!({ "id": id })))
}

async fn memory_entries(
    State(state): State<AppStateArc>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let user_id = params
        .get("userId")
        .cloned()
        .ok_or_else(|| bad_request("missing query param: userId"))?;
    let scope = crate::memory::Scope {
        user_id,
        team_id: params.get("teamId").cloned(),
        team_mode: params.get("teamMode").map(|v| v == "true").unwrap_or(false),
    };
    let memory = state.memory.read().await;
    let entries = memory.list(&scope, params.get("kind").map(|s| s.as_str()));
    Ok(Json(json!({ "entries": entries })))
}

async fn memory_delete_entry(
    State(state): State<AppStateArc>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let deleted = {
        let mut memory = state.memory.write().await;
        memory.delete(&id)
    };
    if !deleted {
        return Err(api_error(StatusCode::NOT_FOUND, "not_found", format!("no entry {}", id)));
    }
    state.memory_saver.mark_dirty();
    Ok(Json(json!({ "deleted": id })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TtlBody {
    user_id: String,
    #[serde(default)]
    team_id: Option<String>,
    #[serde(default)]
    team_mode: bool,
    ttl_days: i64,
}

async fn memory_ttl(
    State(state): State<AppStateArc>,
    Json(body): Json<TtlBody>,
) -> Json<Value> {
    let scope = crate::memory::Scope {
        user_id: body.user_id,
        team_id: body.team_id,
        team_mode: body.team_mode,
    };
    let updated = {
        let mut memory = state.memory.write().await;
        memory.update_ttl(&scope, body.ttl_days)
    };
    state.memory_saver.mark_dirty();
    Json(json!({ "updated": updated }))
}

async fn memory_purge(State(state): State<AppStateArc>) -> Json<Value> {
    let purged = {
        let mut memory = state.memory.write().await;
        memory.purge_expired()
    };
    state.memory_saver.mark_dirty();
    Json(json!({ "purged": purged }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageBody {
    user_id: String,
    role: String,
    content: String,
}

async fn memory_message(
    State(state): State<AppStateArc>,
    Json(body): Json<MessageBody>,
) -> Result<Json<Value>, ApiError> {
    let mut conversation = state.conversation.write().await;
    match body.role.as_str() {
        "user" => conversation.push_user(&body.user_id, &body.content, None, None),
        "assistant" => conversation.push_assistant(&body.user_id, &body.content),
        other => return Err(bad_request(format!("unsupported role: {}", other))),
    }
    Ok(Json(json!({ "status": "ok" })))
}

async fn memory_context(
    State(state): State<AppStateArc>,
    Path(user_id): Path<String>,
) -> Json<Value> {
    let conversation = state.conversation.read().await;
    Json(json!({ "context": conversation.context_block(&user_id) }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FollowupBody {
    user_id: String,
    prompt: String,
}

async fn memory_is_followup(
    State(state): State<AppStateArc>,
    Json(body): Json<FollowupBody>,
) -> Json<Value> {
    let conversation = state.conversation.read().await;
    Json(json!({ "isFollowup": conversation.is_follow_up(&body.user_id, &body.prompt) }))
}

async fn memory_history(
    State(state): State<AppStateArc>,
    Path(user_id): Path<String>,
) -> Json<Value> {
    let conversation = state.conversation.read().await;
    Json(json!({ "history": conversation.history(&user_id) }))
}

async fn memory_export(
    State(state): State<AppStateArc>,
    Path(user_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<String, ApiError> {
    let format = params.get("format").map(|s| s.as_str()).unwrap_or("text");
    let conversation = state.conversation.read().await;
    conversation
        .export(&user_id, format)
        .ok_or_else(|| bad_request(format!("unsupported format: {}", format)))
}

async fn memory_delete_user(
    State(state): State<AppStateArc>,
    Path(user_id): Path<String>,
) -> Json<Value> {
    let removed = {
        let mut memory = state.memory.write().await;
        memory.delete_user(&user_id)
    };
    state.memory_saver.mark_dirty();
    let cleared = {
        let mut conversation = state.conversation.write().await;
        conversation.clear(&user_id)
    };
    Json(json!({ "entriesRemoved": removed, "conversationCleared": cleared }))
}

pub fn memory_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/api/memory/store", post(memory_store))
        .route("/api/memory/entries", get(memory_entries))
        .route("/api/memory/entries/:id", delete(memory_delete_entry))
        .route("/api/memory/entries/ttl", post(memory_ttl))
        .route("/api/memory/entries/purge", post(memory_purge))
        .route("/api/memory/message", post(memory_message))
        .route("/api/memory/context/:user_id", get(memory_context))
        .route("/api/memory/is-followup", post(memory_is_followup))
        .route("/api/memory/history/:user_id", get(memory_history))
        .route("/api/memory/export/:user_id", get(memory_export))
        .route("/api/memory/:user_id", delete(memory_delete_user))
}

// ============================================================================
// Tools
// ============================================================================

fn tools_guard(state: &AppState) -> Result<(), ApiError> {
    if state.config.tools_enabled {
        Ok(())
    } else {
        Err(api_error(
            StatusCode::FORBIDDEN,
            "tools_disabled",
            "tool subsystem is off",
        ))
    }
}

fn tool_error(e: tools::ToolError) -> ApiError {
    let status = match e {
        tools::ToolError::BadArgs(_) | tools::ToolError::UnsafeCode(_) => StatusCode::BAD_REQUEST,
        tools::ToolError::ToolNotFound(_) | tools::ToolError::InvalidPath(_) => {
            StatusCode::NOT_FOUND
        }
        tools::ToolError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        tools::ToolError::SandboxError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.kind(), e.to_string())
}

async fn run_named_tool(
    state: &AppStateArc,
    tool: Tool,
    args: ToolArgs,
) -> Result<Json<Value>, ApiError> {
    tools_guard(state)?;
    let ctx = state.tool_context();
    let started = std::time::Instant::now();
    match tools::run_tool(tool, &args, &ctx).await {
        Ok(output) => Ok(Json(json!({
            "tool": tool.to_string(),
            "output": output,
            "durationMs": started.elapsed().as_millis() as u64,
        }))),
        Err(e) => Err(tool_error(e)),
    }
}

macro_rules! tool_handler {
    ($name:ident, $tool:expr) => {
        async fn $name(
            State(state): State<AppStateArc>,
            Json(args): Json<ToolArgs>,
        ) -> Result<Json<Value>, ApiError> {
            run_named_tool(&state, $tool, args).await
        }
    };
}

tool_handler!(tool_python, Tool::Python);
tool_handler!(tool_execute, Tool::CodeExecute);
tool_handler!(tool_analyze, Tool::CodeAnalysis);
tool_handler!(tool_summarize, Tool::Summarize);
tool_handler!(tool_sql, Tool::Sql);
tool_handler!(tool_schema, Tool::SqlSchema);
tool_handler!(tool_sympy, Tool::Sympy);
tool_handler!(tool_ingest, Tool::Ingest);
tool_handler!(tool_search, Tool::Search);
tool_handler!(tool_fetch, Tool::Fetch);
tool_handler!(tool_visualize, Tool::Visualize);

#[derive(Debug, Deserialize)]
struct ChainBody {
    steps: Vec<ChainStep>,
    #[serde(default)]
    prompt: String,
}

async fn tool_chain(
    State(state): State<AppStateArc>,
    Json(body): Json<ChainBody>,
) -> Result<Json<Value>, ApiError> {
    tools_guard(&state)?;
    if body.steps.is_empty() {
        return Err(bad_request("chain needs at least one step"));
    }
    let ctx = state.tool_context();
    let result = tools::chain::run_chain(&body.steps, &body.prompt, &ctx).await;
    Ok(Json(serde_json::to_value(result).unwrap_or_default()))
}

pub fn tool_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/api/tools/python", post(tool_python))
        .route("/api/tools/execute", post(tool_execute))
        .route("/api/tools/analyze", post(tool_analyze))
        .route("/api/tools/summarize", post(tool_summarize))
        .route("/api/tools/sql", post(tool_sql))
        .route("/api/tools/schema", post(tool_schema))
        .route("/api/tools/sympy", post(tool_sympy))
        .route("/api/tools/ingest", post(tool_ingest))
        .route("/api/tools/search", post(tool_search))
        .route("/api/tools/fetch", post(tool_fetch))
        .route("/api/tools/visualize", post(tool_visualize))
        .route("/api/tools/chain", post(tool_chain))
}

// ============================================================================
// Retrieval
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexBody {
    path: String,
    #[serde(default)]
    chunk_chars: Option<usize>,
    #[serde(default)]
    overlap: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

async fn docs_index(
    State(state): State<AppStateArc>,
    Json(body): Json<IndexBody>,
) -> Result<Json<Value>, ApiError> {
    let root = std::path::PathBuf::from(&body.path);
    if !root.is_dir() {
        return Err(bad_request(format!("not a directory: {}", body.path)));
    }
    let index = tokio::task::spawn_blocking(move || KeywordIndex::build(&root))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, "sandbox_error", e.to_string()))?;
    let count = index.entries.len();
    if let Err(e) = index.save(&state.config.store_path("doc_index.json")) {
        error!("doc index save failed: {}", e);
    }
    *state.keyword_index.write().await = index;
    Ok(Json(json!({ "indexed": count })))
}

async fn docs_query(
    State(state): State<AppStateArc>,
    Json(body): Json<QueryBody>,
) -> Json<Value> {
    let index = state.keyword_index.read().await;
    let hits = index.query(&body.query, body.limit.unwrap_or(5));
    Json(json!({ "hits": hits }))
}

async fn embeddings_index(
    State(state): State<AppStateArc>,
    Json(body): Json<IndexBody>,
) -> Result<Json<Value>, ApiError> {
    let root = std::path::PathBuf::from(&body.path);
    if !root.is_dir() {
        return Err(bad_request(format!("not a directory: {}", body.path)));
    }
    let prior = std::mem::take(&mut *state.embedding_index.write().await);
    let built = EmbeddingIndex::build(
        prior,
        &root,
        &state.backend,
        body.chunk_chars.unwrap_or(embedding::DEFAULT_CHUNK_CHARS),
        body.overlap.unwrap_or(embedding::DEFAULT_OVERLAP_CHARS),
    )
    .await
    .map_err(|e| api_error(StatusCode::BAD_GATEWAY, "backend_error", e.to_string()))?;
    let count = built.items.len();
    if let Err(e) = built.save(&state.config.store_path("embeddings.json")) {
        error!("embedding index save failed: {}", e);
    }
    *state.embedding_index.write().await = built;
    Ok(Json(json!({ "chunks": count })))
}

async fn embeddings_query(
    State(state): State<AppStateArc>,
    Json(body): Json<QueryBody>,
) -> Result<Json<Value>, ApiError> {
    let query_embedding = state
        .backend
        .embed(&body.query)
        .await
        .map_err(|e| api_error(StatusCode::BAD_GATEWAY, "backend_error", e.to_string()))?;
    let index = state.embedding_index.read().await;
    let hits = index.query(&query_embedding, body.limit.unwrap_or(5), 0.0);
    Ok(Json(json!({ "hits": hits })))
}

pub fn retrieval_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/api/docs/index", post(docs_index))
        .route("/api/docs/query", post(docs_query))
        .route("/api/embeddings/index", post(embeddings_index))
        .route("/api/embeddings/query", post(embeddings_query))
}

// ============================================================================
// Media
// ============================================================================

#[derive(Debug, Deserialize)]
struct MediaBody {
    prompt: String,
    #[serde(default)]
    seconds: Option<u32>,
}

async fn image(
    State(state): State<AppStateArc>,
    Json(body): Json<MediaBody>,
) -> Result<Json<Value>, ApiError> {
    media::generate_image(&state.config, &body.prompt)
        .await
        .map(|path| Json(json!({ "path": path.display().to_string() })))
        .map_err(|e| api_error(StatusCode::BAD_GATEWAY, "backend_error", e.to_string()))
}

async fn video(
    State(state): State<AppStateArc>,
    Json(body): Json<MediaBody>,
) -> Result<Json<Value>, ApiError> {
    media::generate_video(&state.config, &body.prompt, body.seconds.unwrap_or(4))
        .await
        .map(|path| Json(json!({ "path": path.display().to_string() })))
        .map_err(|e| api_error(StatusCode::BAD_GATEWAY, "backend_error", e.to_string()))
}

pub fn media_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/api/image", post(image))
        .route("/api/video", post(video))
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportBody {
    prompt: String,
    #[serde(default)]
    user_id: Option<String>,
}

async fn report_generate(
    State(state): State<AppStateArc>,
    Json(body): Json<ReportBody>,
) -> Json<Value> {
    let report_id = state
        .reports
        .enqueue(
            state.backend.clone(),
            body.user_id.as_deref().unwrap_or("default"),
            &body.prompt,
        )
        .await;
    Json(json!({ "reportId": report_id, "status": "queued" }))
}

async fn report_get(
    State(state): State<AppStateArc>,
    Path(report_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.reports.get(&report_id).await {
        Some(job) => Ok(Json(serde_json::to_value(&job).unwrap_or_default())),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no report {}", report_id),
        )),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportBody {
    report_id: String,
}

async fn report_export_html(
    State(state): State<AppStateArc>,
    Json(body): Json<ExportBody>,
) -> Result<String, ApiError> {
    match state.reports.get(&body.report_id).await {
        Some(job) => Ok(reports::render_html(&job)),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no report {}", body.report_id),
        )),
    }
}

async fn report_export_pdf(
    State(state): State<AppStateArc>,
    Json(body): Json<ExportBody>,
) -> Result<Json<Value>, ApiError> {
    let job = state.reports.get(&body.report_id).await.ok_or_else(|| {
        api_error(StatusCode::NOT_FOUND, "not_found", format!("no report {}", body.report_id))
    })?;
    let html = reports::render_html(&job);

    let dir = state.config.outputs_dir();
    std::fs::create_dir_all(&dir)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, "sandbox_error", e.to_string()))?;
    let html_path = dir.join(format!("report-{}.html", body.report_id));
    let pdf_path = dir.join(format!("report-{}.pdf", body.report_id));
    std::fs::write(&html_path, &html)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, "sandbox_error", e.to_string()))?;

    let status = tokio::process::Command::new("wkhtmltopdf")
        .arg(&html_path)
        .arg(&pdf_path)
        .status()
        .await;
    match status {
        Ok(s) if s.success() => Ok(Json(json!({ "path": pdf_path.display().to_string() }))),
        _ => Err(api_error(
            StatusCode::BAD_GATEWAY,
            "upstream_unavailable",
            "pdf renderer unavailable; html export written",
        )),
    }
}

pub fn report_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/api/reports/generate", post(report_generate))
        .route("/api/reports/:report_id", get(report_get))
        .route("/api/reports/export/html", post(report_export_html))
        .route("/api/reports/export/pdf", post(report_export_pdf))
}

// ============================================================================
// Agent
// ============================================================================

#[derive(Debug, Deserialize)]
struct AgentBody {
    prompt: String,
}

async fn agent_run(
    State(state): State<AppStateArc>,
    Json(body): Json<AgentBody>,
) -> Result<Json<Value>, ApiError> {
    tools_guard(&state)?;
    match agent::run(&body.prompt, &state.tool_context()).await {
        Ok(result) => Ok(Json(serde_json::to_value(result).unwrap_or_default())),
        Err(e) => Err(api_error(StatusCode::BAD_GATEWAY, "backend_error", e.to_string())),
    }
}

pub fn agent_routes() -> Router<AppStateArc> {
    Router::new().route("/api/agent/run", post(agent_run))
}

// ============================================================================
// Admin: cancel, stats, inspection
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelBody {
    request_id: String,
}

async fn cancel(State(state): State<AppStateArc>, Json(body): Json<CancelBody>) -> Json<Value> {
    if state.active.cancel(&body.request_id).await {
        info!("cancelled {}", body.request_id);
        Json(json!({ "status": "cancelled" }))
    } else {
        // Unknown cancel targets answer in-band, not with 404.
        Json(json!({ "status": "not_found" }))
    }
}

async fn stats(State(state): State<AppStateArc>) -> Json<Value> {
    let models = state.stats.read().await.snapshot();
    Json(json!({
        "models": models,
        "cacheEntries": state.cache.read().await.len(),
        "memoryEntries": state.memory.read().await.len(),
        "activeRequests": state.active.count().await,
        "catalog": relay_shared::models::model_catalog(),
    }))
}

#[derive(Debug, Deserialize)]
struct InspectQuery {
    q: String,
}

async fn inspect_intent(Query(params): Query<InspectQuery>) -> Json<Value> {
    let verdict = classifier::classify(&params.q, &ClassifyContext::default());
    Json(serde_json::to_value(&verdict).unwrap_or_default())
}

async fn inspect_normalize(Query(params): Query<InspectQuery>) -> Json<Value> {
    Json(json!({
        "raw": params.q,
        "normalized": crate::pipeline::normalize::normalize(&params.q),
    }))
}

pub fn admin_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/api/cancel", post(cancel))
        .route("/api/stats", get(stats))
        .route("/api/inspect/intent", get(inspect_intent))
        .route("/api/inspect/normalize", get(inspect_normalize))
}
