//! Route task tags and the resolved route a request is dispatched on.

use serde::{Deserialize, Serialize};

/// Closed set of route task tags. Each maps to a default model and a
/// system-prompt template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Chat,
    Reason,
    Code,
    Sql,
    Debug,
    Chart,
    Vision,
    Research,
    Report,
    Dashboard,
    DashboardVanilla,
    ImagePrompt,
    VideoPrompt,
    Fast,
    Grammar,
    Personal,
}

impl Task {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "chat" => Some(Self::Chat),
            "reason" => Some(Self::Reason),
            "code" => Some(Self::Code),
            "sql" => Some(Self::Sql),
            "debug" => Some(Self::Debug),
            "chart" => Some(Self::Chart),
            "vision" => Some(Self::Vision),
            "research" => Some(Self::Research),
            "report" => Some(Self::Report),
            "dashboard" => Some(Self::Dashboard),
            "dashboard_vanilla" => Some(Self::DashboardVanilla),
            "image_prompt" => Some(Self::ImagePrompt),
            "video_prompt" => Some(Self::VideoPrompt),
            "fast" => Some(Self::Fast),
            "grammar" => Some(Self::Grammar),
            "personal" => Some(Self::Personal),
            _ => None,
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Chat => "chat",
            Self::Reason => "reason",
            Self::Code => "code",
            Self::Sql => "sql",
            Self::Debug => "debug",
            Self::Chart => "chart",
            Self::Vision => "vision",
            Self::Research => "research",
            Self::Report => "report",
            Self::Dashboard => "dashboard",
            Self::DashboardVanilla => "dashboard_vanilla",
            Self::ImagePrompt => "image_prompt",
            Self::VideoPrompt => "video_prompt",
            Self::Fast => "fast",
            Self::Grammar => "grammar",
            Self::Personal => "personal",
        };
        write!(f, "{}", s)
    }
}

/// System-prompt template identifier. Distinct from Task because the
/// ranking rewrite swaps the template without changing the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptId {
    Chat,
    Reason,
    Code,
    Sql,
    Debug,
    Chart,
    Vision,
    Research,
    Report,
    Dashboard,
    DashboardVanilla,
    ImagePrompt,
    VideoPrompt,
    Fast,
    Grammar,
    Personal,
    Ranking,
}

impl PromptId {
    pub fn for_task(task: Task) -> Self {
        match task {
            Task::Chat => Self::Chat,
            Task::Reason => Self::Reason,
            Task::Code => Self::Code,
            Task::Sql => Self::Sql,
            Task::Debug => Self::Debug,
            Task::Chart => Self::Chart,
            Task::Vision => Self::Vision,
            Task::Research => Self::Research,
            Task::Report => Self::Report,
            Task::Dashboard => Self::Dashboard,
            Task::DashboardVanilla => Self::DashboardVanilla,
            Task::ImagePrompt => Self::ImagePrompt,
            Task::VideoPrompt => Self::VideoPrompt,
            Task::Fast => Self::Fast,
            Task::Grammar => Self::Grammar,
            Task::Personal => Self::Personal,
        }
    }

    /// The actual system prompt text sent to the backend.
    pub fn template(&self) -> &'static str {
        match self {
            Self::Chat => {
                "You are a precise local assistant. Answer directly. \
                 Structure every reply as a `Thinking` section followed by a `Result` section."
            }
            Self::Reason => {
                "You are a careful reasoner. Work step by step in the `Thinking` section, \
                 then state the conclusion alone in the `Result` section."
            }
            Self::Code => {
                "You are a senior software engineer. Return working code in a fenced block \
                 with the language tag, then a short `Result` note on usage."
            }
            Self::Sql => {
                "You write SQL for SQLite. Return one query in a ```sql fenced block. \
                 Use only tables and columns from the provided schema."
            }
            Self::Debug => {
                "You debug from logs. Quote the decisive log lines in `Thinking`, \
                 then give the root cause and fix in `Result`."
            }
            Self::Chart => {
                "You produce chart data. Reply with a single line starting with CHART_JSON: \
                 followed by a JSON object with `type`, `labels`, and `values`."
            }
            Self::Vision => {
                "You answer questions about an image from its textual description. \
                 Never invent details absent from the description."
            }
            Self::Research => {
                "You synthesize the supplied web sources. Cite with [n] markers that refer \
                 to the numbered source list. Do not use unlisted sources."
            }
            Self::Report => {
                "You write structured reports with markdown headings: summary, findings, \
                 details, recommendations."
            }
            Self::Dashboard => {
                "You produce a self-contained HTML dashboard using a charting library \
                 loaded from a CDN. Output only the HTML document."
            }
            Self::DashboardVanilla => {
                "You produce a self-contained HTML dashboard with inline CSS and vanilla \
                 JavaScript only. No external resources. Output only the HTML document."
            }
            Self::ImagePrompt => {
                "You expand a short request into a detailed image-generation prompt: \
                 subject, style, lighting, composition. One paragraph."
            }
            Self::VideoPrompt => {
                "You expand a short request into a shot-by-shot video prompt with scene, \
                 camera movement, and pacing notes."
            }
            Self::Fast => {
                "Answer in at most two sentences. No preamble."
            }
            Self::Grammar => {
                "Correct the grammar and spelling of the given text. Return only the \
                 corrected text."
            }
            Self::Personal => {
                "You recall and use the provided memory context about this user. \
                 If the memory does not cover the question, say so."
            }
            Self::Ranking => {
                "You produce ranked lists strictly grounded in the numbered web sources \
                 provided. Number every item (`1.` style) and cite sources with [n] \
                 markers. If the sources do not support a ranking, say so instead of \
                 inventing one."
            }
        }
    }
}

/// A resolved route: where the request is going and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub task: Task,
    pub model: String,
    pub prompt_id: PromptId,
    /// Human-readable rationale, surfaced in response meta.
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_roundtrip() {
        for s in [
            "chat", "reason", "code", "sql", "debug", "chart", "vision", "research",
            "report", "dashboard", "dashboard_vanilla", "image_prompt", "video_prompt",
            "fast", "grammar", "personal",
        ] {
            let task = Task::parse(s).unwrap();
            assert_eq!(task.to_string(), s);
        }
        assert!(Task::parse("nope").is_none());
    }

    #[test]
    fn test_prompt_id_templates_nonempty() {
        for task in [Task::Chat, Task::Code, Task::Sql, Task::Fast] {
            assert!(!PromptId::for_task(task).template().is_empty());
        }
        assert!(PromptId::Ranking.template().contains("[n]"));
    }
}
