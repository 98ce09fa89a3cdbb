//! Stream event model for the WebSocket surface.
//!
//! Events for one request appear in write order; `done` or `error` is
//! always last. A `model_retry_start` invalidates previously streamed
//! tokens for that request.

use crate::intent::{Complexity, Confidence, Intent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One web source handed to the model for grounding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSource {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Terminal metadata attached to `done`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoneMeta {
    pub duration_ms: u64,
    /// Model that actually produced the final answer.
    pub model: String,
    pub route: String,
    #[serde(default)]
    pub route_reason: String,
    #[serde(default)]
    pub tools_used: Vec<String>,
    /// Per-tool wall time in milliseconds.
    #[serde(default)]
    pub tool_timings: HashMap<String, u64>,
    /// Response format detected by the formatter.
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub cache_hit: bool,
    #[serde(default)]
    pub web_used: bool,
    #[serde(default)]
    pub memory_hits: usize,
    #[serde(default)]
    pub rag_sources: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

/// Server-to-client events on the streaming endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    IntentClassification {
        intent: Intent,
        confidence: Confidence,
        complexity: Complexity,
        requires_web: bool,
    },
    ReasoningPhase {
        phase: ReasoningPhase,
    },
    WebSearchResults {
        results: Vec<WebSource>,
    },
    Token {
        token: String,
    },
    ModelFallback {
        from: String,
        to: String,
        reason: String,
    },
    ModelRetryStart {
        model: String,
        reason: String,
    },
    ModelRetryDone {
        model: String,
    },
    ModelRetryFailed {
        reason: String,
    },
    Done {
        response: String,
        meta: DoneMeta,
    },
    Error {
        kind: String,
        message: String,
    },
}

impl StreamEvent {
    /// True for the two terminal events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

/// Cosmetic reasoning phases interleaved with token output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasoningPhase {
    Understanding,
    Planning,
    Research,
    Reasoning,
    Generating,
}

impl std::fmt::Display for ReasoningPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Understanding => "UNDERSTANDING",
            Self::Planning => "PLANNING",
            Self::Research => "RESEARCH",
            Self::Reasoning => "REASONING",
            Self::Generating => "GENERATING",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tagging() {
        let ev = StreamEvent::Token { token: "hi".into() };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "token");
        assert_eq!(json["token"], "hi");
    }

    #[test]
    fn test_terminal_events() {
        assert!(StreamEvent::Done { response: String::new(), meta: DoneMeta::default() }
            .is_terminal());
        assert!(StreamEvent::Error { kind: "cancelled".into(), message: String::new() }
            .is_terminal());
        assert!(!StreamEvent::Token { token: String::new() }.is_terminal());
    }

    #[test]
    fn test_retry_event_shape() {
        let ev = StreamEvent::ModelRetryStart {
            model: "qwen2.5:7b".into(),
            reason: "timeout".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "model_retry_start");
        assert_eq!(json["reason"], "timeout");
    }
}
