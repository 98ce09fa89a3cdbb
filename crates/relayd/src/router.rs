//! Route and model selection.
//!
//! A first-match decision ladder: explicit override, vision, priority
//! pattern tables, prefer-fast/tiny prompts, then the chat default.
//! After the task lands, low confidence or high complexity can upgrade
//! the model, and trivial math downgrades to the smallest one.

use relay_shared::intent::{Complexity, Confidence, Intent, IntentVerdict};
use relay_shared::models::{MODEL_CHAT, MODEL_CODER, MODEL_FAST, MODEL_REASONING, MODEL_VISION};
use relay_shared::route::{PromptId, Route, Task};
use tracing::debug;

/// Prompts at or under this length ride the fast route.
pub const TINY_PROMPT_CHARS: usize = 20;

/// Routing inputs beyond the verdict.
#[derive(Debug, Default, Clone)]
pub struct RouteFlags {
    pub task_override: Option<Task>,
    pub model_override: Option<String>,
    pub prefer_fast: bool,
    pub has_image_description: bool,
}

/// Default model per task tag.
pub fn default_model(task: Task) -> &'static str {
    match task {
        Task::Chat => MODEL_CHAT,
        Task::Reason => MODEL_REASONING,
        Task::Code => MODEL_CODER,
        Task::Sql => MODEL_CODER,
        Task::Debug => MODEL_CODER,
        Task::Chart => MODEL_CHAT,
        Task::Vision => MODEL_VISION,
        Task::Research => MODEL_REASONING,
        Task::Report => MODEL_REASONING,
        Task::Dashboard => MODEL_CODER,
        Task::DashboardVanilla => MODEL_CODER,
        Task::ImagePrompt => MODEL_CHAT,
        Task::VideoPrompt => MODEL_CHAT,
        Task::Fast => MODEL_FAST,
        Task::Grammar => MODEL_FAST,
        Task::Personal => MODEL_FAST,
    }
}

/// Priority pattern tables, checked in order. First hit wins.
const PRIORITY_TABLES: &[(Task, &[&str])] = &[
    (Task::Grammar, &["fix grammar", "fix my grammar", "proofread", "fix spelling", "rephrase this"]),
    (Task::Personal, &["remember that", "save this", "what did i say", "my favorite", "remind me what"]),
    (Task::ImagePrompt, &["image prompt", "generate an image", "draw a picture", "picture of"]),
    (Task::VideoPrompt, &["video prompt", "generate a video", "video of", "animate"]),
    (Task::DashboardVanilla, &["vanilla dashboard", "dashboard without libraries", "plain html dashboard"]),
    (Task::Dashboard, &["dashboard"]),
    (Task::Chart, &["chart", "bar chart", "pie chart", "plot the", "graph the"]),
    (Task::Report, &["write a report", "analysis report", "executive summary"]),
    (Task::Research, &["research", "find sources", "cite sources", "with citations"]),
    (Task::Debug, &["stack trace", "traceback", "debug this", "why does this crash", "segfault"]),
    (Task::Sql, &["sql", "select from", "write a query"]),
    (Task::Code, &["write a function", "write code", "implement", "refactor", "fix this code"]),
];

fn priority_task(prompt: &str, verdict: &IntentVerdict) -> Option<Task> {
    for (task, patterns) in PRIORITY_TABLES {
        if patterns.iter().any(|p| prompt.contains(p)) {
            return Some(*task);
        }
    }
    // Intent carries cases the pattern tables miss.
    match verdict.intent {
        Intent::GrammarCorrection => Some(Task::Grammar),
        Intent::Memory => Some(Task::Personal),
        Intent::SqlQuery => Some(Task::Sql),
        Intent::DebugLog => Some(Task::Debug),
        Intent::CodeTask | Intent::HtmlMarkup => Some(Task::Code),
        Intent::Visualization => Some(Task::Chart),
        Intent::AnalysisReport => Some(Task::Report),
        Intent::MathReasoning | Intent::ProofSolving | Intent::MultiStep => Some(Task::Reason),
        Intent::DecisionMaking | Intent::SystemDesign => Some(Task::Reason),
        _ => None,
    }
}

/// Resolve the route for a request.
pub fn select_route(prompt: &str, verdict: &IntentVerdict, flags: &RouteFlags) -> Route {
    let p = prompt.to_lowercase();

    let (task, reason) = if let Some(task) = flags.task_override {
        (task, format!("explicit task override: {}", task))
    } else if flags.has_image_description {
        (Task::Vision, "image description present".to_string())
    } else if let Some(task) = priority_task(&p, verdict) {
        (task, format!("priority table for {}", verdict.intent))
    } else if flags.prefer_fast || p.trim().len() <= TINY_PROMPT_CHARS {
        (Task::Fast, "prefer-fast or tiny prompt".to_string())
    } else {
        (Task::Chat, "default".to_string())
    };

    let mut model = default_model(task).to_string();
    let mut reason = reason;

    // Escalation on shaky classification of hard prompts.
    let shaky = verdict.confidence == Confidence::Low
        || (verdict.confidence == Confidence::Medium && verdict.complexity >= Complexity::High);
    if shaky && flags.task_override.is_none() {
        model = match task {
            Task::Code | Task::Sql | Task::Debug | Task::Dashboard | Task::DashboardVanilla => {
                MODEL_CODER.to_string()
            }
            Task::Reason | Task::Research | Task::Report => MODEL_REASONING.to_string(),
            Task::Grammar | Task::Fast | Task::Personal => MODEL_FAST.to_string(),
            _ => MODEL_CHAT.to_string(),
        };
        reason = format!("{}; escalated ({})", reason, verdict.confidence);
    }

    // Trivial math has no business on the big models.
    if verdict.intent == Intent::MathReasoning && verdict.complexity <= Complexity::Medium {
        model = MODEL_FAST.to_string();
        reason = format!("{}; simple math downgraded", reason);
    }

    if let Some(overridden) = &flags.model_override {
        model = overridden.clone();
        reason = format!("{}; model override", reason);
    }

    // Ranking rewrites the system prompt and forces web grounding.
    let prompt_id = if verdict.intent == Intent::RankingQuery && flags.task_override.is_none() {
        PromptId::Ranking
    } else {
        PromptId::for_task(task)
    };

    debug!("route: task={} model={} ({})", task, model, reason);
    Route { task, model, prompt_id, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_shared::intent::ClassifyContext;

    fn verdict_for(prompt: &str) -> IntentVerdict {
        crate::classifier::classify(prompt, &ClassifyContext::default())
    }

    #[test]
    fn test_task_override_wins() {
        let v = verdict_for("write a report about rust");
        let flags = RouteFlags { task_override: Some(Task::Sql), ..Default::default() };
        let route = select_route("write a report about rust", &v, &flags);
        assert_eq!(route.task, Task::Sql);
    }

    #[test]
    fn test_image_description_forces_vision() {
        let v = verdict_for("what is in this photo");
        let flags = RouteFlags { has_image_description: true, ..Default::default() };
        let route = select_route("what is in this photo", &v, &flags);
        assert_eq!(route.task, Task::Vision);
        assert_eq!(route.model, MODEL_VISION);
    }

    #[test]
    fn test_priority_tables() {
        let cases = [
            ("fix grammar in this sentence please", Task::Grammar),
            ("remember that my cat is named Mia", Task::Personal),
            ("build a dashboard for sales numbers", Task::Dashboard),
            ("plot the monthly revenue as a chart", Task::Chart),
            ("debug this stack trace for me", Task::Debug),
        ];
        for (prompt, expected) in cases {
            let v = verdict_for(prompt);
            let route = select_route(prompt, &v, &RouteFlags::default());
            assert_eq!(route.task, expected, "prompt: {}", prompt);
        }
    }

    #[test]
    fn test_tiny_prompt_rides_fast() {
        let v = verdict_for("weather nice today");
        let route = select_route("weather nice today", &v, &RouteFlags::default());
        assert_eq!(route.task, Task::Fast);
        assert_eq!(route.model, MODEL_FAST);
    }

    #[test]
    fn test_prefer_fast_flag() {
        let prompt = "summarize what a load balancer does for a web application";
        let v = verdict_for(prompt);
        let flags = RouteFlags { prefer_fast: true, ..Default::default() };
        let route = select_route(prompt, &v, &flags);
        assert_eq!(route.task, Task::Fast);
    }

    #[test]
    fn test_simple_math_downgrades() {
        let prompt = "how many is 3 + 4";
        let v = verdict_for(prompt);
        assert_eq!(v.intent, Intent::MathReasoning);
        let route = select_route(prompt, &v, &RouteFlags::default());
        assert_eq!(route.model, MODEL_FAST);
    }

    #[test]
    fn test_ranking_forces_ranking_prompt() {
        let prompt = "top 10 databases for analytics workloads";
        let v = verdict_for(prompt);
        let route = select_route(prompt, &v, &RouteFlags::default());
        assert_eq!(route.prompt_id, PromptId::Ranking);

        // An explicit override suppresses the rewrite.
        let flags = RouteFlags { task_override: Some(Task::Chat), ..Default::default() };
        let overridden = select_route(prompt, &v, &flags);
        assert_eq!(overridden.prompt_id, PromptId::Chat);
    }

    #[test]
    fn test_model_override_wins_over_escalation() {
        let prompt = "zzz qqq unclassifiable";
        let v = verdict_for(prompt);
        assert_eq!(v.confidence, relay_shared::Confidence::Low);
        let flags = RouteFlags { model_override: Some("custom:13b".into()), ..Default::default() };
        let route = select_route(prompt, &v, &flags);
        assert_eq!(route.model, "custom:13b");
    }
}
