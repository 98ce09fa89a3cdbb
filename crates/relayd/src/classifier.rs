//! Rule-based intent classifier.
//!
//! Pure and total: scores every intent in the closed catalog from literal
//! pattern hits plus a per-intent shape check, then derives confidence
//! from the top two scores. Never fails; an all-zero scoreboard lands on
//! SIMPLE_QA at LOW confidence.

use regex::Regex;
use relay_shared::intent::{
    ClassifyContext, Complexity, Confidence, Intent, IntentVerdict, PromptShape,
};
use relay_shared::models::{MODEL_CODER, MODEL_FAST, MODEL_REASONING};
use std::sync::OnceLock;

/// Per-pattern score contribution is capped.
const PATTERN_CAP: i32 = 2;
/// Shape-check bonus.
const ADVANCED_BONUS: i32 = 5;
/// Context nudges.
const PREVIOUS_INTENT_BONUS: i32 = 1;
const USER_PREFERENCE_BONUS: i32 = 2;
const EXCLUDED_PENALTY: i32 = 5;
/// Runners-up reported on the verdict.
const TOP_K: usize = 3;

struct IntentSpec {
    intent: Intent,
    patterns: &'static [&'static str],
    advanced: fn(&str) -> bool,
    requires_web: bool,
    preferred_model: Option<&'static str>,
    primary_tools: &'static [&'static str],
    flexible_tools: bool,
}

fn regex_hit(cell: &'static OnceLock<Regex>, pattern: &'static str, prompt: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
        .is_match(prompt)
}

fn no_advanced(_: &str) -> bool {
    false
}

/// Short direct question, unless it is shaped like arithmetic (that bonus
/// belongs to MATH_REASONING).
fn adv_short_question(p: &str) -> bool {
    p.ends_with('?') && p.len() <= 60 && !adv_math_shape(p)
}

fn adv_top_n(p: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex_hit(&RE, r"top\s+\d+", p)
}

fn adv_code_shape(p: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    p.contains("```") || regex_hit(&RE, r"\b(fn|def|class|function|impl)\s+\w+", p)
}

/// Arithmetic operator between two numbers.
fn adv_math_shape(p: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex_hit(&RE, r"\d\s*[-+*/×÷]\s*\d", p)
}

fn adv_sql_shape(p: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex_hit(&RE, r"select\s+.+\s+from\s+\w+", p)
}

fn adv_multi_step_shape(p: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    p.matches(" then ").count() >= 2 || regex_hit(&RE, r"(?m)^\s*\d+[.)]\s+\S", p)
}

fn adv_log_shape(p: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex_hit(
        &RE,
        r"(\d{4}-\d{2}-\d{2}[ t]\d{2}:\d{2}|\[(error|warn|fatal)\]|exception in|traceback \(most recent)",
        p,
    )
}

fn adv_html_shape(p: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex_hit(&RE, r"<[a-z][a-z0-9]*(\s[^>]*)?>", p)
}

/// Excel-style `=NAME(...)` formula.
fn adv_formula_shape(p: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex_hit(&RE, r"=\s*[a-z]+\s*\(", p)
}

fn catalog() -> &'static [IntentSpec] {
    static CATALOG: OnceLock<Vec<IntentSpec>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        vec![
            IntentSpec {
                intent: Intent::SimpleQa,
                patterns: &["what is", "who is", "when did", "where is", "define", "meaning of"],
                advanced: adv_short_question,
                requires_web: false,
                preferred_model: Some(MODEL_FAST),
                primary_tools: &[],
                flexible_tools: true,
            },
            IntentSpec {
                intent: Intent::GrammarCorrection,
                patterns: &["fix grammar", "correct this", "proofread", "fix spelling", "grammar", "rephrase"],
                advanced: no_advanced,
                requires_web: false,
                preferred_model: Some(MODEL_FAST),
                primary_tools: &[],
                flexible_tools: false,
            },
            IntentSpec {
                intent: Intent::WorldKnowledge,
                patterns: &[
                    "capital of", "population of", "president of", "history of",
                    "who invented", "when was", "latest news", "current",
                ],
                advanced: no_advanced,
                requires_web: true,
                preferred_model: None,
                primary_tools: &["search"],
                flexible_tools: true,
            },
            IntentSpec {
                intent: Intent::RankingQuery,
                patterns: &[
                    "top 10", "top ten", "best", "ranking", "rank the", "leaderboard",
                    "most popular", "greatest",
                ],
                advanced: adv_top_n,
                requires_web: true,
                preferred_model: None,
                primary_tools: &["search"],
                flexible_tools: false,
            },
            IntentSpec {
                intent: Intent::CodeTask,
                patterns: &[
                    "write a function", "implement", "refactor", "script", "code",
                    "python", "javascript", "typescript", "rust", "parse",
                ],
                advanced: adv_code_shape,
                requires_web: false,
                preferred_model: Some(MODEL_CODER),
                primary_tools: &["python", "code_execute"],
                flexible_tools: true,
            },
            IntentSpec {
                intent: Intent::MathReasoning,
                patterns: &[
                    "how many", "how much", "calculate", "plus", "minus", "times",
                    "divided by", "total", "sum of",
                ],
                advanced: adv_math_shape,
                requires_web: false,
                preferred_model: Some(MODEL_REASONING),
                primary_tools: &["python", "sympy"],
                flexible_tools: true,
            },
            IntentSpec {
                intent: Intent::SqlQuery,
                patterns: &["sql", "select ", "query the", "database", "table", "join"],
                advanced: adv_sql_shape,
                requires_web: false,
                preferred_model: Some(MODEL_CODER),
                primary_tools: &["sql", "sql_schema"],
                flexible_tools: false,
            },
            IntentSpec {
                intent: Intent::DataAnalysis,
                patterns: &["analyze", "analysis", "dataset", "csv", "correlation", "trend", "statistics"],
                advanced: no_advanced,
                requires_web: false,
                preferred_model: None,
                primary_tools: &["python", "visualize"],
                flexible_tools: true,
            },
            IntentSpec {
                intent: Intent::Creative,
                patterns: &["write a story", "poem", "haiku", "lyrics", "fiction", "imagine", "creative"],
                advanced: no_advanced,
                requires_web: false,
                preferred_model: None,
                primary_tools: &[],
                flexible_tools: false,
            },
            IntentSpec {
                intent: Intent::DecisionMaking,
                patterns: &[
                    "should i", "pros and cons", "which is better", "decide", "trade-off",
                    "tradeoff", "compare",
                ],
                advanced: no_advanced,
                requires_web: false,
                preferred_model: Some(MODEL_REASONING),
                primary_tools: &[],
                flexible_tools: true,
            },
            IntentSpec {
                intent: Intent::Learning,
                patterns: &[
                    "explain", "teach me", "how does", "tutorial", "understand",
                    "walk me through", "learn",
                ],
                advanced: no_advanced,
                requires_web: false,
                preferred_model: None,
                primary_tools: &[],
                flexible_tools: true,
            },
            IntentSpec {
                intent: Intent::Memory,
                patterns: &[
                    "remember", "save this", "note that", "recall", "what did i",
                    "my favorite", "remind me what",
                ],
                advanced: no_advanced,
                requires_web: false,
                preferred_model: Some(MODEL_FAST),
                primary_tools: &[],
                flexible_tools: false,
            },
            IntentSpec {
                intent: Intent::MultiStep,
                patterns: &["step by step", "plan", "first", "and then", "multiple steps", "workflow"],
                advanced: adv_multi_step_shape,
                requires_web: false,
                preferred_model: Some(MODEL_REASONING),
                primary_tools: &[],
                flexible_tools: true,
            },
            IntentSpec {
                intent: Intent::DebugLog,
                patterns: &["error", "stack trace", "exception", "traceback", "crashed", "segfault", "panic"],
                advanced: adv_log_shape,
                requires_web: false,
                preferred_model: Some(MODEL_CODER),
                primary_tools: &["code_analysis"],
                flexible_tools: true,
            },
            IntentSpec {
                intent: Intent::HtmlMarkup,
                patterns: &["html", "web page", "landing page", "css", "markup", "webpage"],
                advanced: adv_html_shape,
                requires_web: false,
                preferred_model: Some(MODEL_CODER),
                primary_tools: &[],
                flexible_tools: false,
            },
            IntentSpec {
                intent: Intent::AnalysisReport,
                patterns: &["report", "summary of", "write up", "executive summary", "findings", "overview of"],
                advanced: no_advanced,
                requires_web: false,
                preferred_model: None,
                primary_tools: &["summarize"],
                flexible_tools: true,
            },
            IntentSpec {
                intent: Intent::Visualization,
                patterns: &["chart", "graph", "plot", "visualize", "bar chart", "pie chart", "dashboard"],
                advanced: no_advanced,
                requires_web: false,
                preferred_model: None,
                primary_tools: &["visualize"],
                flexible_tools: false,
            },
            IntentSpec {
                intent: Intent::ProofSolving,
                patterns: &[
                    "prove", "proof", "theorem", "lemma", "induction", "derivative",
                    "integral", "simplify the expression",
                ],
                advanced: no_advanced,
                requires_web: false,
                preferred_model: Some(MODEL_REASONING),
                primary_tools: &["sympy"],
                flexible_tools: false,
            },
            IntentSpec {
                intent: Intent::SystemDesign,
                patterns: &[
                    "architecture", "design a system", "scalable", "microservice",
                    "high level design", "diagram", "system design",
                ],
                advanced: no_advanced,
                requires_web: false,
                preferred_model: Some(MODEL_REASONING),
                primary_tools: &[],
                flexible_tools: true,
            },
            IntentSpec {
                intent: Intent::FormulaGeneration,
                patterns: &["excel", "formula", "spreadsheet", "google sheets", "vlookup", "sumif"],
                advanced: adv_formula_shape,
                requires_web: false,
                preferred_model: Some(MODEL_FAST),
                primary_tools: &[],
                flexible_tools: false,
            },
            IntentSpec {
                intent: Intent::Riddle,
                patterns: &["riddle", "what has", "what gets", "i speak without", "what goes up", "puzzle"],
                advanced: no_advanced,
                requires_web: false,
                preferred_model: Some(MODEL_FAST),
                primary_tools: &[],
                flexible_tools: false,
            },
        ]
    })
}

/// Score one intent against the lowercased prompt.
fn score_intent(spec: &IntentSpec, prompt: &str, context: &ClassifyContext) -> i32 {
    let mut score = 0;
    for pattern in spec.patterns {
        let hits = prompt.matches(pattern).count() as i32;
        score += hits.min(PATTERN_CAP);
    }

    // Counting words plus a digit reads as quantitative reasoning.
    if spec.intent == Intent::MathReasoning
        && (prompt.contains("how many") || prompt.contains("how much"))
        && prompt.chars().any(|c| c.is_ascii_digit())
    {
        score += 2;
    }

    if (spec.advanced)(prompt) {
        score += ADVANCED_BONUS;
    }
    if context.previous_intent == Some(spec.intent) {
        score += PREVIOUS_INTENT_BONUS;
    }
    if context.user_preference == Some(spec.intent) {
        score += USER_PREFERENCE_BONUS;
    }
    if context.excluded.contains(&spec.intent) {
        score -= EXCLUDED_PENALTY;
    }
    score.max(0)
}

/// Shape facts surfaced through the inspection endpoint.
pub fn prompt_shape(prompt: &str) -> PromptShape {
    let p = prompt.to_lowercase();
    PromptShape {
        has_question_mark: p.contains('?'),
        has_code: adv_code_shape(&p),
        has_sql: adv_sql_shape(&p),
        has_html: adv_html_shape(&p),
        has_formula: adv_formula_shape(&p),
        has_math: adv_math_shape(&p),
        word_count: prompt.split_whitespace().count(),
    }
}

const COMPLEXITY_KEYWORDS: &[&str] = &[
    "optimize", "concurrent", "distributed", "algorithm", "performance",
    "architecture", "scalable", "recursive", "async", "transaction",
];

/// Complexity tier over length, nesting, boolean operators, code fences,
/// and keyword hits.
pub fn complexity(prompt: &str) -> Complexity {
    let p = prompt.to_lowercase();
    let mut score = 0;

    if p.len() > 400 {
        score += 2;
    } else if p.len() > 150 {
        score += 1;
    }

    let mut depth: i32 = 0;
    let mut max_depth: i32 = 0;
    for c in p.chars() {
        match c {
            '(' | '[' | '{' => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }
    if max_depth > 2 {
        score += 2;
    } else if max_depth > 0 {
        score += 1;
    }

    let booleans = p.matches(" and ").count()
        + p.matches(" or ").count()
        + p.matches(" if ").count()
        + p.matches("&&").count()
        + p.matches("||").count();
    if booleans > 3 {
        score += 2;
    } else if booleans > 1 {
        score += 1;
    }

    if p.matches("```").count() >= 2 {
        score += 2;
    }

    let keyword_hits = COMPLEXITY_KEYWORDS.iter().filter(|k| p.contains(*k)).count() as i32;
    score += keyword_hits.min(3);

    match score {
        0 | 1 => Complexity::Low,
        2 | 3 => Complexity::Medium,
        4 | 5 => Complexity::High,
        _ => Complexity::VeryHigh,
    }
}

/// Classify a prompt. Deterministic in (prompt, context).
pub fn classify(prompt: &str, context: &ClassifyContext) -> IntentVerdict {
    let p = prompt.to_lowercase();

    let mut scored: Vec<(&IntentSpec, i32)> = catalog()
        .iter()
        .map(|spec| (spec, score_intent(spec, &p, context)))
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    let (winner, top) = (scored[0].0, scored[0].1);
    let second = scored.get(1).map(|(_, s)| *s).unwrap_or(0);

    let (spec, top, second) = if top == 0 {
        // Nothing matched: SIMPLE_QA at LOW confidence.
        let fallback = catalog()
            .iter()
            .find(|s| s.intent == Intent::SimpleQa)
            .expect("catalog has SIMPLE_QA");
        (fallback, 0, 0)
    } else {
        (winner, top, second)
    };

    let alternatives: Vec<(Intent, i32)> = scored
        .iter()
        .skip(1)
        .take(TOP_K)
        .filter(|(_, s)| *s > 0)
        .map(|(spec, s)| (spec.intent, *s))
        .collect();

    IntentVerdict {
        intent: spec.intent,
        confidence: Confidence::from_scores(top, second),
        score: top,
        requires_web: spec.requires_web,
        preferred_model: spec.preferred_model.map(|m| m.to_string()),
        primary_tools: spec.primary_tools.iter().map(|t| t.to_string()).collect(),
        flexible_tools: spec.flexible_tools,
        complexity: complexity(prompt),
        alternatives,
        shape: prompt_shape(prompt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(prompt: &str) -> IntentVerdict {
        classify(prompt, &ClassifyContext::default())
    }

    #[test]
    fn test_word_problem_is_math() {
        let v = verdict(
            "i have 28 apples and i eat 4 then i buy other 2 apples how many apples do i have right now?",
        );
        assert_eq!(v.intent, Intent::MathReasoning);
    }

    #[test]
    fn test_inline_arithmetic_is_math_with_shape_bonus() {
        let v = verdict("what is 12 * 9?");
        assert_eq!(v.intent, Intent::MathReasoning);
        assert!(v.score >= ADVANCED_BONUS);
        assert!(v.shape.has_math);
    }

    #[test]
    fn test_sql_detection() {
        let v = verdict("select name from users where age > 30");
        assert_eq!(v.intent, Intent::SqlQuery);
        assert!(v.shape.has_sql);
        assert_eq!(v.primary_tools, vec!["sql", "sql_schema"]);
    }

    #[test]
    fn test_ranking_requires_web() {
        let v = verdict("top 10 programming languages in 2025");
        assert_eq!(v.intent, Intent::RankingQuery);
        assert!(v.requires_web);
        assert!(v.confidence >= Confidence::High);
    }

    #[test]
    fn test_code_task() {
        let v = verdict("write a function to parse json in rust");
        assert_eq!(v.intent, Intent::CodeTask);
        assert_eq!(v.preferred_model.as_deref(), Some(MODEL_CODER));
    }

    #[test]
    fn test_unmatched_prompt_is_low_confidence_simple_qa() {
        let v = verdict("zzz qqq vvv");
        assert_eq!(v.intent, Intent::SimpleQa);
        assert_eq!(v.confidence, Confidence::Low);
        assert_eq!(v.score, 0);
    }

    #[test]
    fn test_deterministic() {
        let a = verdict("explain the raft consensus algorithm");
        let b = verdict("explain the raft consensus algorithm");
        assert_eq!(a.intent, b.intent);
        assert_eq!(a.score, b.score);
        assert_eq!(a.confidence, b.confidence);
    }

    #[test]
    fn test_context_nudges() {
        let base = verdict("tell me more about indexes");
        let mut ctx = ClassifyContext::default();
        ctx.user_preference = Some(Intent::SqlQuery);
        ctx.previous_intent = Some(Intent::SqlQuery);
        let nudged = classify("tell me more about indexes", &ctx);
        // +2 preference +1 previous moves SQL ahead of the field.
        assert_eq!(nudged.intent, Intent::SqlQuery);
        assert_ne!(base.intent, nudged.intent);
    }

    #[test]
    fn test_excluded_intent_is_penalized() {
        let base = verdict("how many is 2 + 2");
        let mut ctx = ClassifyContext::default();
        ctx.excluded = vec![Intent::MathReasoning];
        let penalized = classify("how many is 2 + 2", &ctx);
        assert_eq!(base.intent, Intent::MathReasoning);
        assert_eq!(penalized.score, base.score - EXCLUDED_PENALTY);

        // A pure pattern hit is pushed all the way out.
        let mut ctx2 = ClassifyContext::default();
        ctx2.excluded = vec![Intent::Creative];
        let v = classify("write a short poem", &ctx2);
        assert_ne!(v.intent, Intent::Creative);
    }

    #[test]
    fn test_complexity_tiers() {
        assert_eq!(complexity("hi"), Complexity::Low);
        assert!(complexity("design a distributed scalable architecture with async replication and concurrent writes if the network partitions or nodes fail and latency spikes") >= Complexity::High);
        let fenced = format!("review this\n```rust\nfn main() {{}}\n```\n{}", "x".repeat(420));
        assert!(complexity(&fenced) >= Complexity::Medium);
    }

    #[test]
    fn test_classifier_never_panics_on_junk() {
        for junk in ["", "???", "```", "((((", "\u{1F600}\u{1F600}", "SELECT"] {
            let _ = verdict(junk);
        }
    }
}
