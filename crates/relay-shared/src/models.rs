//! Central model catalog and deterministic fallback selection.
//!
//! Model names live here so routing, fallback, and stats agree on them.

use crate::intent::{Complexity, Intent};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Small model for grammar fixes and tiny prompts.
pub const MODEL_FAST: &str = "qwen2.5:1.5b";
/// Default conversational model.
pub const MODEL_CHAT: &str = "qwen2.5:7b";
/// Code-specialized model.
pub const MODEL_CODER: &str = "qwen2.5-coder:7b";
/// Reasoning model. Runs without a per-attempt deadline.
pub const MODEL_REASONING: &str = "qwen3:8b";
/// Vision-capable model for image-description prompts.
pub const MODEL_VISION: &str = "qwen3-vl:4b";
/// Synthetic tag reported when a local solver produced the answer.
pub const MODEL_LOCAL_MATH: &str = "local-math";
/// Synthetic tag for the instant-conversation table.
pub const MODEL_LOCAL_INSTANT: &str = "local-instant";

/// Default per-attempt generation deadline for non-reasoning models.
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 90;

/// Per-model attempt deadline. The reasoning model is exempt.
pub fn attempt_deadline(model: &str, default_timeout: Duration) -> Option<Duration> {
    if model == MODEL_REASONING {
        None
    } else {
        Some(default_timeout)
    }
}

/// Catalog entry, used by /api/stats and relayctl display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub role: String,
    pub size_gb: f32,
}

pub fn model_catalog() -> Vec<ModelInfo> {
    vec![
        ModelInfo { name: MODEL_FAST.into(), role: "fast".into(), size_gb: 1.0 },
        ModelInfo { name: MODEL_CHAT.into(), role: "chat".into(), size_gb: 4.7 },
        ModelInfo { name: MODEL_CODER.into(), role: "code".into(), size_gb: 4.7 },
        ModelInfo { name: MODEL_REASONING.into(), role: "reason".into(), size_gb: 5.2 },
        ModelInfo { name: MODEL_VISION.into(), role: "vision".into(), size_gb: 2.5 },
    ]
}

/// Deterministic fallback model for a failed attempt.
///
/// Math downgrades to the small model when the prompt was simple; coder
/// falls back to chat; everything else falls back one size down.
pub fn fallback_model(intent: Intent, complexity: Complexity, failed: &str) -> String {
    if intent == Intent::MathReasoning && complexity <= Complexity::Medium {
        return MODEL_FAST.to_string();
    }
    match failed {
        MODEL_REASONING => MODEL_CHAT.to_string(),
        MODEL_CODER => MODEL_CHAT.to_string(),
        MODEL_CHAT => MODEL_FAST.to_string(),
        MODEL_VISION => MODEL_CHAT.to_string(),
        _ => MODEL_FAST.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasoning_model_has_no_deadline() {
        let d = Duration::from_secs(90);
        assert!(attempt_deadline(MODEL_REASONING, d).is_none());
        assert_eq!(attempt_deadline(MODEL_CHAT, d), Some(d));
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let a = fallback_model(Intent::CodeTask, Complexity::High, MODEL_CODER);
        let b = fallback_model(Intent::CodeTask, Complexity::High, MODEL_CODER);
        assert_eq!(a, b);
        assert_eq!(a, MODEL_CHAT);
    }

    #[test]
    fn test_simple_math_falls_to_fast() {
        assert_eq!(
            fallback_model(Intent::MathReasoning, Complexity::Low, MODEL_REASONING),
            MODEL_FAST
        );
    }
}
