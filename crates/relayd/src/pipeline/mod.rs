//! The request pipeline.
//!
//! One request flows: normalize, triggers, local solvers, classify, cache
//! probe, context assembly, route, supervised generation, validation,
//! egress. Both ingress surfaces (HTTP and WS) drive this module and
//! observe the same event stream.

pub mod assembly;
pub mod generation;
pub mod normalize;
pub mod validate;

pub use generation::{EventSink, GenError};

use crate::cache::cache_key;
use crate::classifier;
use crate::memory::Scope;
use crate::ollama::GenOptions;
use crate::router::{self, RouteFlags};
use crate::server::AppState;
use crate::solvers;
use crate::tools::{self, ToolArgs};
use relay_shared::envelope;
use relay_shared::events::{DoneMeta, StreamEvent};
use relay_shared::formatter::format_response;
use relay_shared::intent::{ClassifyContext, Intent};
use relay_shared::models::{MODEL_LOCAL_INSTANT, MODEL_LOCAL_MATH};
use relay_shared::route::Task;
use relay_shared::wrap_with_thinking;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Internal request produced by both ingress surfaces.
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    pub request_id: String,
    pub user_id: String,
    pub team_id: Option<String>,
    pub team_mode: bool,
    pub raw_prompt: String,
    pub normalized: String,
    pub language: Option<String>,
    pub task_override: Option<Task>,
    pub model_override: Option<String>,
    pub options: GenOptions,
    pub fast: bool,
    pub auto_web: bool,
    pub auto_files: bool,
    pub use_doc_index: bool,
    pub use_embeddings: bool,
    pub file_paths: Vec<String>,
    pub image_description: Option<String>,
    pub response_spec: Option<String>,
    /// Conversation block, filled during the run.
    pub conversation_context: String,
}

impl PipelineRequest {
    pub fn new(prompt: &str, user_id: &str) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            raw_prompt: prompt.to_string(),
            normalized: normalize::normalize(prompt),
            ..Default::default()
        }
    }

    pub fn memory_scope(&self) -> Scope {
        Scope {
            user_id: self.user_id.clone(),
            team_id: self.team_id.clone(),
            team_mode: self.team_mode,
        }
    }
}

/// Final pipeline product; the same data also reaches the sink as `done`
/// or `error`.
#[derive(Debug)]
pub struct PipelineResult {
    pub response: String,
    pub meta: DoneMeta,
}

/// Wrap non-enveloped model output; answers that already carry the
/// envelope pass through.
fn ensure_envelope(text: &str) -> String {
    let trimmed = text.trim();
    if envelope::is_well_formed(trimmed) {
        trimmed.to_string()
    } else {
        format!(
            "Thinking\n- {}\n\nResult\n- {}",
            envelope::THINKING_OMITTED,
            trimmed
        )
    }
}

fn base_meta(route: &str, model: &str, started: Instant) -> DoneMeta {
    DoneMeta {
        duration_ms: started.elapsed().as_millis() as u64,
        model: model.to_string(),
        route: route.to_string(),
        ..Default::default()
    }
}

/// Emit the answer as one token then `done`, the contract for local and
/// cached responses.
fn finish(sink: &EventSink, response: String, meta: DoneMeta) -> PipelineResult {
    sink.emit(StreamEvent::Token { token: response.clone() });
    sink.emit(StreamEvent::Done { response: response.clone(), meta: meta.clone() });
    PipelineResult { response, meta }
}

fn fail(sink: &EventSink, kind: &str, message: String) -> (String, String) {
    sink.emit(StreamEvent::Error { kind: kind.to_string(), message: message.clone() });
    (kind.to_string(), message)
}

/// Run one request to completion. Returns Err((kind, message)) after the
/// matching `error` event was emitted.
pub async fn run(
    state: &Arc<AppState>,
    mut req: PipelineRequest,
    sink: &EventSink,
) -> Result<PipelineResult, (String, String)> {
    let started = Instant::now();
    let prompt = req.normalized.clone();

    // Memory-save trigger beats everything else.
    if let Some(content) = normalize::memory_save_request(&prompt) {
        let embedding = if req.use_embeddings {
            state.backend.embed(&content).await.ok()
        } else {
            None
        };
        let id = {
            let mut memory = state.memory.write().await;
            memory.store(&req.memory_scope(), &content, "noted", "saved", embedding, None)
        };
        state.memory_saver.mark_dirty();
        info!("memory save trigger -> {}", id);
        let mut meta = base_meta("memory", MODEL_LOCAL_INSTANT, started);
        meta.format = "text".into();
        return Ok(finish(
            sink,
            relay_shared::wrap_result("Saved to memory."),
            meta,
        ));
    }

    // Explicit tool command bypasses the LM.
    if let Some((tool, body)) = tools::parse_explicit(&prompt) {
        let tool_started = Instant::now();
        let args = ToolArgs::from_text(tool, &body);
        let ctx = state.tool_context();
        return match tools::run_tool(tool, &args, &ctx).await {
            Ok(output) => {
                let mut meta = base_meta("tool", MODEL_LOCAL_INSTANT, started);
                meta.tools_used = vec![tool.to_string()];
                meta.tool_timings
                    .insert(tool.to_string(), tool_started.elapsed().as_millis() as u64);
                meta.format = "text".into();
                Ok(finish(sink, ensure_envelope(&output), meta))
            }
            Err(e) => Err(fail(sink, e.kind(), e.to_string())),
        };
    }

    // Vague follow-ups reopen the previous turn as grounded context. The
    // original verdict stands; the expansion is context only.
    let is_follow_up = {
        let conversation = state.conversation.read().await;
        conversation.is_follow_up(&req.user_id, &prompt)
    };
    if is_follow_up {
        let conversation = state.conversation.read().await;
        if let Some((prev_user, prev_assistant)) = conversation.last_turn(&req.user_id) {
            req.conversation_context =
                format!("User: {}\nAssistant: {}", prev_user, prev_assistant);
        }
    } else {
        let conversation = state.conversation.read().await;
        req.conversation_context = conversation.context_block(&req.user_id);
    }

    // Local fast-path solvers short-circuit the pipeline.
    if let Some(answer) = solvers::try_solve(&prompt) {
        let mut meta = base_meta(answer.solver, answer.model, started);
        meta.format = format_response(&answer.response).kind.to_string();
        return Ok(finish(sink, answer.response, meta));
    }

    // Intent classification.
    let previous_intent = {
        let conversation = state.conversation.read().await;
        conversation.previous_intent(&req.user_id)
    };
    let context = ClassifyContext { previous_intent, ..Default::default() };
    let verdict = classifier::classify(&prompt, &context);
    sink.emit(StreamEvent::IntentClassification {
        intent: verdict.intent,
        confidence: verdict.confidence,
        complexity: verdict.complexity,
        requires_web: verdict.requires_web,
    });

    // Story-shaped math resolves locally, streamed like a model answer.
    if verdict.intent == Intent::MathReasoning {
        if let Some(solution) = solvers::word_problem::solve(&prompt) {
            for phase in generation::phase_sequence(verdict.intent, verdict.complexity, false) {
                sink.emit(StreamEvent::ReasoningPhase { phase });
            }
            let thinking = solution.steps.join(" ");
            let response = wrap_with_thinking(
                &[&thinking],
                &format!("Answer: {}", crate::solvers::arith::format_number(solution.total)),
            );
            {
                let mut conversation = state.conversation.write().await;
                conversation.push_user(&req.user_id, &prompt, Some(verdict.intent), None);
                conversation.push_assistant(&req.user_id, &response);
            }
            let mut meta = base_meta("reason", MODEL_LOCAL_MATH, started);
            meta.format = "text".into();
            return Ok(finish(sink, response, meta));
        }
    }

    // Cache probe: exact, then semantic.
    let key = cache_key(verdict.intent, &prompt);
    let query_embedding = if req.use_embeddings {
        state.backend.embed(&prompt).await.ok().filter(|e| !e.is_empty())
    } else {
        None
    };
    {
        let mut cache = state.cache.write().await;
        let hit = cache
            .get_exact(&key)
            .or_else(|| query_embedding.as_deref().and_then(|e| cache.get_semantic(e)));
        if let Some(response) = hit {
            let mut meta = base_meta("cache", "cache", started);
            meta.cache_hit = true;
            meta.format = format_response(&response).kind.to_string();
            return Ok(finish(sink, response, meta));
        }
    }

    // The user message lands in conversation memory before generation.
    {
        let mut conversation = state.conversation.write().await;
        let quality = (prompt.split_whitespace().count() as f32 / 20.0).min(1.0);
        conversation.push_user(&req.user_id, &prompt, Some(verdict.intent), Some(quality));
    }

    // Route and assemble.
    let flags = RouteFlags {
        task_override: req.task_override,
        model_override: req.model_override.clone(),
        prefer_fast: req.fast,
        has_image_description: req.image_description.is_some(),
    };
    let route = router::select_route(&prompt, &verdict, &flags);
    let assembled = assembly::assemble(
        state,
        &req,
        &verdict,
        &route,
        query_embedding.as_deref(),
        is_follow_up,
        sink,
    )
    .await;

    // Ranking grounding check happens before any generation: with the web
    // empty the generator must refuse rather than fabricate.
    if verdict.intent == Intent::RankingQuery && assembled.web_sources.is_empty() {
        let response = relay_shared::wrap_result(validate::RANKING_REFUSAL);
        let mut meta = base_meta(&route.task.to_string(), &route.model, started);
        meta.route_reason = route.reason.clone();
        meta.format = "text".into();
        // Never cached.
        return Ok(finish(sink, response, meta));
    }

    let mut system = route.prompt_id.template().to_string();
    if let Some(spec) = &req.response_spec {
        system.push_str("\nResponse requirements: ");
        system.push_str(spec);
    }
    if let Some(description) = &req.image_description {
        req.options.temperature.get_or_insert(0.3);
        system.push_str("\nImage description: ");
        system.push_str(description);
    }

    // Supervised generation with cancellation.
    let mut cancel = state.active.register(&req.request_id).await;
    let outcome = generation::generate_supervised(
        &state.backend,
        &route.model,
        &system,
        &assembled.composed,
        &req.options,
        verdict.intent,
        verdict.complexity,
        assembled.web_used,
        state.config.attempt_timeout,
        sink,
        &mut cancel,
    )
    .await;
    state.active.deregister(&req.request_id).await;

    let gen_started_model = route.model.clone();
    let outcome = match outcome {
        Ok(o) => o,
        Err(e) => {
            let mut stats = state.stats.write().await;
            stats.record(&gen_started_model, started.elapsed().as_millis() as u64, true);
            return Err(fail(sink, e.kind(), e.to_string()));
        }
    };
    {
        let mut stats = state.stats.write().await;
        stats.record(&outcome.model, started.elapsed().as_millis() as u64, false);
    }

    let mut response = outcome.text.clone();
    let mut tools_used: Vec<String> = Vec::new();

    // Intent-conditioned validation.
    match verdict.intent {
        Intent::MathReasoning => {
            if let Some(fixed) =
                validate::verify_math(&prompt, &response, state.config.safe_mode).await
            {
                tools_used.push("python".into());
                response = fixed;
            }
        }
        Intent::CodeTask | Intent::HtmlMarkup => {
            if let validate::CodeCheck::Failed(error) =
                validate::check_code(&response, state.config.safe_mode).await
            {
                tools_used.push("code_execute".into());
                info!("code self-check failed; regenerating once");
                let retry_prompt = format!(
                    "The previous attempt failed at runtime with:\n{}\n\nRewrite the full answer.\n\n{}",
                    error, assembled.composed
                );
                if let Ok(regenerated) = state
                    .backend
                    .generate(&outcome.model, Some(&system), &retry_prompt, &req.options)
                    .await
                {
                    response = regenerated;
                }
            }
        }
        Intent::SystemDesign | Intent::DecisionMaking => {
            if let Ok(reviewed) = state
                .backend
                .generate(
                    relay_shared::models::MODEL_REASONING,
                    Some("Review the answer for risks and mistakes. Return the corrected final answer only."),
                    &format!("Question:\n{}\n\nAnswer:\n{}", prompt, response),
                    &GenOptions::default(),
                )
                .await
            {
                let reviewed = reviewed.trim();
                if !reviewed.is_empty() {
                    response = reviewed.to_string();
                }
            }
        }
        Intent::RankingQuery => {
            match validate::validate_ranking(&prompt, &response, assembled.web_sources.len()) {
                validate::RankingVerdict::Ok => {}
                validate::RankingVerdict::ShortList(n) => {
                    response = format!("{}{}", validate::short_list_notice(n), response);
                }
                validate::RankingVerdict::Refuse => {
                    response = validate::RANKING_REFUSAL.to_string();
                }
                validate::RankingVerdict::Regenerate => {
                    warn!("ranking structure missing; regenerating once");
                    let retry_prompt = format!(
                        "{}\n\nThe previous answer lacked numbered items or [n] citations. \
                         Produce a numbered, cited ranking.",
                        assembled.composed
                    );
                    match state
                        .backend
                        .generate(&outcome.model, Some(&system), &retry_prompt, &req.options)
                        .await
                    {
                        Ok(second) => {
                            response = match validate::validate_ranking(
                                &prompt,
                                &second,
                                assembled.web_sources.len(),
                            ) {
                                validate::RankingVerdict::Ok => second,
                                validate::RankingVerdict::ShortList(n) => {
                                    format!("{}{}", validate::short_list_notice(n), second)
                                }
                                _ => validate::RANKING_REFUSAL.to_string(),
                            };
                        }
                        Err(_) => response = validate::RANKING_REFUSAL.to_string(),
                    }
                }
            }
        }
        _ => {}
    }

    let response = ensure_envelope(&response);
    let formatted = format_response(&response);

    // Egress bookkeeping: cache (never for rankings), conversation,
    // summary cadence.
    if verdict.intent != Intent::RankingQuery {
        let mut cache = state.cache.write().await;
        cache.put(
            key,
            response.clone(),
            verdict.intent,
            query_embedding.clone(),
            route.task == Task::Fast,
        );
        state.cache_saver.mark_dirty();
    }

    {
        let mut conversation = state.conversation.write().await;
        conversation.push_assistant(&req.user_id, &response);
        if conversation.take_summary_due(&req.user_id) {
            let window = conversation.summary_window(&req.user_id);
            drop(conversation);
            spawn_summary(state.clone(), req.memory_scope(), window);
        }
    }

    let mut meta = base_meta(&route.task.to_string(), &outcome.model, started);
    meta.route_reason = route.reason.clone();
    meta.tools_used = tools_used;
    meta.format = formatted.kind.to_string();
    meta.web_used = assembled.web_used;
    meta.memory_hits = assembled.memory_hits;
    meta.rag_sources = assembled.rag_sources.clone();
    meta.files = assembled.files.clone();
    if outcome.fell_back {
        meta.route_reason = format!("{}; fell back to {}", meta.route_reason, outcome.model);
    }

    sink.emit(StreamEvent::Done { response: response.clone(), meta: meta.clone() });
    Ok(PipelineResult { response, meta })
}

/// Summarize the recent window into the memory store, off the request
/// path.
fn spawn_summary(state: Arc<AppState>, scope: Scope, window: String) {
    tokio::spawn(async move {
        let summary = state
            .backend
            .generate(
                relay_shared::models::MODEL_FAST,
                Some("Summarize this conversation in two sentences for long-term memory."),
                &window,
                &GenOptions::default(),
            )
            .await;
        if let Ok(summary) = summary {
            let mut memory = state.memory.write().await;
            memory.store(&scope, "conversation summary", summary.trim(), "summary", None, None);
            state.memory_saver.mark_dirty();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_envelope_wraps_plain_text() {
        let out = ensure_envelope("plain answer");
        assert!(envelope::is_well_formed(&out));
        assert_eq!(envelope::extract_result(&out).as_deref(), Some("plain answer"));
    }

    #[test]
    fn test_ensure_envelope_passes_through() {
        let already = relay_shared::wrap_result("x");
        assert_eq!(ensure_envelope(&already), already);
    }

    #[test]
    fn test_request_normalizes_on_construction() {
        let req = PipelineRequest::new("  wat is teh time?  ", "u1");
        assert_eq!(req.normalized, "what is the time?");
        assert_eq!(req.raw_prompt, "  wat is teh time?  ");
        assert!(!req.request_id.is_empty());
    }
}
