//! Context assembly: the composed prompt handed to the model.
//!
//! Sections are concatenated in a fixed order and only when non-empty.
//! Light prompts bypass the heavy sections entirely; that is a
//! load-shedding guarantee, not an optimization.

use super::{EventSink, PipelineRequest};
use crate::ollama::GenOptions;
use crate::retrieval::{self, RerankCandidate};
use crate::server::AppState;
use crate::web;
use relay_shared::events::StreamEvent;
use relay_shared::intent::{Intent, IntentVerdict};
use relay_shared::models::MODEL_FAST;
use relay_shared::route::Route;
use relay_shared::WebSource;
use std::path::Path;
use tracing::{debug, info};

/// RAG hits pulled from each index.
const RAG_LIMIT: usize = 4;
/// Cosine floor for embedding-index hits.
const RAG_MIN_SCORE: f32 = 0.35;

/// What assembly produced, for meta reporting.
#[derive(Debug, Default)]
pub struct AssemblyOutput {
    pub composed: String,
    pub files: Vec<String>,
    pub auto_files: bool,
    pub memory_hits: usize,
    pub web_sources: Vec<WebSource>,
    pub web_used: bool,
    pub rag_sources: Vec<String>,
}

/// Light prompts skip files, RAG, web, and the planner.
pub fn bypass_heavy(prompt: &str) -> bool {
    let len = prompt.trim().len();
    len <= 80 || (len <= 140 && !prompt.contains('?'))
}

/// Rewrite a short messy prompt with the small model when enabled.
async fn effective_prompt(state: &AppState, req: &PipelineRequest) -> String {
    let messy = req.normalized != req.raw_prompt.trim();
    if state.config.grammar_aux && messy && req.raw_prompt.len() < 80 {
        if let Ok(rewritten) = state
            .backend
            .generate(
                MODEL_FAST,
                Some("Fix the grammar and spelling. Return only the corrected text."),
                &req.raw_prompt,
                &GenOptions::default(),
            )
            .await
        {
            let rewritten = rewritten.trim();
            if !rewritten.is_empty() {
                debug!("grammar aux rewrote prompt");
                return rewritten.to_string();
            }
        }
    }
    req.normalized.clone()
}

/// Ranking prompts with no category token get a nudge instead of a guess.
fn vague_leaderboard_hint(prompt: &str, verdict: &IntentVerdict) -> Option<&'static str> {
    if verdict.intent == Intent::RankingQuery && prompt.split_whitespace().count() <= 3 {
        Some(
            "The request names no category. Rank the most likely subject and say \
             which category was assumed.",
        )
    } else {
        None
    }
}

fn intent_extras(intent: Intent) -> Option<&'static str> {
    match intent {
        Intent::Creative => Some("Style: concrete imagery, varied rhythm, no cliches."),
        Intent::Visualization => {
            Some("End the reply with one line starting with CHART_JSON: describing the main series.")
        }
        Intent::SystemDesign => {
            Some("Include a Mermaid diagram of the architecture in a ```mermaid block.")
        }
        Intent::HtmlMarkup => {
            Some("Return one complete HTML document with inline CSS and no external scripts.")
        }
        _ => None,
    }
}

/// Assemble the composed prompt. Every side-fetch that can fail degrades
/// to an omitted section.
pub async fn assemble(
    state: &AppState,
    req: &PipelineRequest,
    verdict: &IntentVerdict,
    _route: &Route,
    query_embedding: Option<&[f32]>,
    is_follow_up: bool,
    sink: &EventSink,
) -> AssemblyOutput {
    let mut out = AssemblyOutput::default();
    let mut sections: Vec<String> = Vec::new();

    // 1. Effective prompt.
    let prompt = effective_prompt(state, req).await;

    // 2. Vague leaderboard hint.
    if let Some(hint) = vague_leaderboard_hint(&prompt, verdict) {
        sections.push(format!("Note: {}", hint));
    }

    let light = bypass_heavy(&prompt);
    if light {
        info!("assembly: light prompt, heavy sections bypassed");
    }

    // 3. File context: attached always, auto-selection only when asked.
    if !light {
        for raw in &req.file_paths {
            if let Some(ctx) = retrieval::read_attached(Path::new(raw)) {
                out.files.push(ctx.path.clone());
                sections.push(format!("File {}:\n{}", ctx.path, ctx.text));
            }
        }
        if req.auto_files && out.files.is_empty() {
            let picked = retrieval::auto_select(Path::new("."), &prompt);
            if !picked.is_empty() {
                out.auto_files = true;
            }
            for ctx in picked {
                out.files.push(ctx.path.clone());
                sections.push(format!("File {}:\n{}", ctx.path, ctx.text));
            }
        }
    }

    // 4. Hybrid RAG: keyword hits union embedding hits, optionally reranked.
    if !light && (req.use_doc_index || req.use_embeddings) {
        let mut candidates: Vec<RerankCandidate> = Vec::new();
        if req.use_doc_index {
            let index = state.keyword_index.read().await;
            for hit in index.query(&prompt, RAG_LIMIT) {
                candidates.push(RerankCandidate {
                    source: hit.path.clone(),
                    text: hit.snippet,
                });
            }
        }
        if req.use_embeddings {
            if let Some(embedding) = query_embedding {
                let index = state.embedding_index.read().await;
                for hit in index.query(embedding, RAG_LIMIT, RAG_MIN_SCORE) {
                    if !candidates.iter().any(|c| c.text == hit.text) {
                        candidates.push(RerankCandidate {
                            source: format!("{}#{}", hit.path, hit.chunk_index),
                            text: hit.text,
                        });
                    }
                }
            }
        }
        if candidates.len() > 1 {
            candidates = retrieval::rerank(&state.backend, &prompt, candidates).await;
        }
        if !candidates.is_empty() {
            let block: Vec<String> = candidates
                .iter()
                .map(|c| format!("[{}]\n{}", c.source, c.text))
                .collect();
            out.rag_sources = candidates.iter().map(|c| c.source.clone()).collect();
            sections.push(format!("Indexed context:\n{}", block.join("\n\n")));
        }
    }

    // 5. Web context. Requested only when the intent demands it or the user
    //    opted in; suppressed entirely for follow-up expansions. An intent
    //    that requires grounding (ranking) keeps its web pass even for
    //    light prompts.
    let force_no_web = false;
    let wants_web = (verdict.requires_web || req.auto_web) && !is_follow_up && !force_no_web;
    if wants_web && (!light || verdict.requires_web) {
        let urls = web::extract_urls(&prompt);
        if !urls.is_empty() {
            let mut pages = Vec::new();
            for url in urls.iter().take(3) {
                if let Ok(text) = state.web.fetch_page(url).await {
                    pages.push(format!("From {}:\n{}", url, text));
                    out.web_sources.push(WebSource {
                        title: url.clone(),
                        url: url.clone(),
                        snippet: None,
                    });
                }
            }
            if !pages.is_empty() {
                out.web_used = true;
                sections.push(format!("Fetched pages:\n{}", pages.join("\n\n")));
            }
        } else {
            let results = state.web.search(&prompt).await;
            if !results.is_empty() {
                sink.emit(StreamEvent::WebSearchResults { results: results.clone() });
                out.web_used = true;
                sections.push(format!("Web sources:\n{}", web::citation_block(&results)));
                out.web_sources = results;
            }
        }
    }

    // 6. Memory context.
    {
        let scope = req.memory_scope();
        let memory = state.memory.read().await;
        let hits = memory.recall(&scope, &prompt, query_embedding);
        out.memory_hits = hits.len();
        if !hits.is_empty() {
            let block: Vec<String> = hits
                .iter()
                .map(|h| format!("- {} -> {}", h.entry.prompt, h.entry.response))
                .collect();
            sections.push(format!("Remembered about this user:\n{}", block.join("\n")));
        }
    }

    // 7. SQL schema for SQL intent.
    if verdict.intent == Intent::SqlQuery {
        if let Some(db_path) = state.config.sql_store_path.clone() {
            let schema = tokio::task::spawn_blocking(move || {
                crate::tools::sql::schema(&db_path)
            })
            .await;
            if let Ok(Ok(schema)) = schema {
                sections.push(format!("Database schema:\n{}", schema));
            }
        }
    }

    // 8. Planner preamble for multi-step prompts.
    if !light && verdict.intent == Intent::MultiStep {
        if let Ok(plan) = state
            .backend
            .generate(
                MODEL_FAST,
                Some("Write a short numbered plan (3-5 steps) for answering the request. Plan only."),
                &prompt,
                &GenOptions::default(),
            )
            .await
        {
            let plan = plan.trim();
            if !plan.is_empty() {
                sections.push(format!("Plan:\n{}", plan));
            }
        }
    }

    // 9. Intent-specific extras.
    if let Some(extra) = intent_extras(verdict.intent) {
        sections.push(format!("Requirement: {}", extra));
    }

    // Conversation context rides ahead of the question when present.
    if !req.conversation_context.is_empty() {
        sections.insert(0, format!("Conversation so far:\n{}", req.conversation_context));
    }

    let mut composed = String::new();
    for section in &sections {
        composed.push_str(section);
        composed.push_str("\n\n");
    }
    composed.push_str(&prompt);
    out.composed = composed;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bypass_heavy_predicate() {
        assert!(bypass_heavy("short prompt"));
        assert!(bypass_heavy(&"x".repeat(80)));
        // 100 chars without a question mark: still light.
        assert!(bypass_heavy(&"x".repeat(100)));
        // 100 chars with a question mark: heavy.
        let with_q = format!("{}?", "x".repeat(100));
        assert!(!bypass_heavy(&with_q));
        // Over 140: heavy either way.
        assert!(!bypass_heavy(&"x".repeat(141)));
    }

    #[test]
    fn test_intent_extras() {
        assert!(intent_extras(Intent::Visualization).unwrap().contains("CHART_JSON"));
        assert!(intent_extras(Intent::SystemDesign).unwrap().contains("mermaid"));
        assert!(intent_extras(Intent::SimpleQa).is_none());
    }
}
