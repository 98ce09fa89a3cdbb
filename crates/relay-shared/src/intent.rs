//! Intent taxonomy for the request pipeline.
//!
//! The catalog is closed: every prompt maps to exactly one of these tags.
//! Classification itself lives in relayd; these are the wire/types half.

use serde::{Deserialize, Serialize};

/// Closed catalog of prompt intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    SimpleQa,
    GrammarCorrection,
    WorldKnowledge,
    RankingQuery,
    CodeTask,
    MathReasoning,
    SqlQuery,
    DataAnalysis,
    Creative,
    DecisionMaking,
    Learning,
    Memory,
    MultiStep,
    DebugLog,
    HtmlMarkup,
    AnalysisReport,
    Visualization,
    ProofSolving,
    SystemDesign,
    FormulaGeneration,
    Riddle,
}

impl Intent {
    /// All intents, in catalog order. Used by the classifier scorer.
    pub fn all() -> &'static [Intent] {
        &[
            Intent::SimpleQa,
            Intent::GrammarCorrection,
            Intent::WorldKnowledge,
            Intent::RankingQuery,
            Intent::CodeTask,
            Intent::MathReasoning,
            Intent::SqlQuery,
            Intent::DataAnalysis,
            Intent::Creative,
            Intent::DecisionMaking,
            Intent::Learning,
            Intent::Memory,
            Intent::MultiStep,
            Intent::DebugLog,
            Intent::HtmlMarkup,
            Intent::AnalysisReport,
            Intent::Visualization,
            Intent::ProofSolving,
            Intent::SystemDesign,
            Intent::FormulaGeneration,
            Intent::Riddle,
        ]
    }

    /// Parse from the SCREAMING_SNAKE_CASE tag.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SIMPLE_QA" => Some(Self::SimpleQa),
            "GRAMMAR_CORRECTION" => Some(Self::GrammarCorrection),
            "WORLD_KNOWLEDGE" => Some(Self::WorldKnowledge),
            "RANKING_QUERY" => Some(Self::RankingQuery),
            "CODE_TASK" => Some(Self::CodeTask),
            "MATH_REASONING" => Some(Self::MathReasoning),
            "SQL_QUERY" => Some(Self::SqlQuery),
            "DATA_ANALYSIS" => Some(Self::DataAnalysis),
            "CREATIVE" => Some(Self::Creative),
            "DECISION_MAKING" => Some(Self::DecisionMaking),
            "LEARNING" => Some(Self::Learning),
            "MEMORY" => Some(Self::Memory),
            "MULTI_STEP" => Some(Self::MultiStep),
            "DEBUG_LOG" => Some(Self::DebugLog),
            "HTML_MARKUP" => Some(Self::HtmlMarkup),
            "ANALYSIS_REPORT" => Some(Self::AnalysisReport),
            "VISUALIZATION" => Some(Self::Visualization),
            "PROOF_SOLVING" => Some(Self::ProofSolving),
            "SYSTEM_DESIGN" => Some(Self::SystemDesign),
            "FORMULA_GENERATION" => Some(Self::FormulaGeneration),
            "RIDDLE" => Some(Self::Riddle),
            _ => None,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SimpleQa => "SIMPLE_QA",
            Self::GrammarCorrection => "GRAMMAR_CORRECTION",
            Self::WorldKnowledge => "WORLD_KNOWLEDGE",
            Self::RankingQuery => "RANKING_QUERY",
            Self::CodeTask => "CODE_TASK",
            Self::MathReasoning => "MATH_REASONING",
            Self::SqlQuery => "SQL_QUERY",
            Self::DataAnalysis => "DATA_ANALYSIS",
            Self::Creative => "CREATIVE",
            Self::DecisionMaking => "DECISION_MAKING",
            Self::Learning => "LEARNING",
            Self::Memory => "MEMORY",
            Self::MultiStep => "MULTI_STEP",
            Self::DebugLog => "DEBUG_LOG",
            Self::HtmlMarkup => "HTML_MARKUP",
            Self::AnalysisReport => "ANALYSIS_REPORT",
            Self::Visualization => "VISUALIZATION",
            Self::ProofSolving => "PROOF_SOLVING",
            Self::SystemDesign => "SYSTEM_DESIGN",
            Self::FormulaGeneration => "FORMULA_GENERATION",
            Self::Riddle => "RIDDLE",
        };
        write!(f, "{}", s)
    }
}

/// Confidence tier derived from the top two classifier scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Confidence {
    /// Fixed thresholds over (top score, runner-up score).
    pub fn from_scores(top: i32, second: i32) -> Self {
        let margin = top - second;
        if top >= 5 && margin >= 3 {
            Confidence::VeryHigh
        } else if top >= 4 && margin >= 2 {
            Confidence::High
        } else if top >= 2 && second > 0 && (top as f64 / second as f64) > 1.5 {
            Confidence::High
        } else if top >= 2 && margin >= 1 {
            Confidence::Medium
        } else if top >= 1 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::VeryHigh => "VERY_HIGH",
        };
        write!(f, "{}", s)
    }
}

/// Coarse prompt-complexity tier used for model sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Complexity {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::VeryHigh => "VERY_HIGH",
        };
        write!(f, "{}", s)
    }
}

/// Boolean shape facts about a prompt. Exposed through the inspection
/// endpoint; routing never depends on them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptShape {
    pub has_question_mark: bool,
    pub has_code: bool,
    pub has_sql: bool,
    pub has_html: bool,
    pub has_formula: bool,
    pub has_math: bool,
    pub word_count: usize,
}

/// Outcome of intent classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentVerdict {
    pub intent: Intent,
    pub confidence: Confidence,
    pub score: i32,
    pub requires_web: bool,
    pub preferred_model: Option<String>,
    pub primary_tools: Vec<String>,
    pub flexible_tools: bool,
    pub complexity: Complexity,
    /// Top-k runners-up as (intent, score).
    pub alternatives: Vec<(Intent, i32)>,
    pub shape: PromptShape,
}

/// Optional classification context carried between turns.
#[derive(Debug, Clone, Default)]
pub struct ClassifyContext {
    pub previous_intent: Option<Intent>,
    pub user_preference: Option<Intent>,
    pub excluded: Vec<Intent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_thresholds() {
        assert_eq!(Confidence::from_scores(6, 2), Confidence::VeryHigh);
        assert_eq!(Confidence::from_scores(5, 2), Confidence::VeryHigh);
        assert_eq!(Confidence::from_scores(4, 2), Confidence::High);
        assert_eq!(Confidence::from_scores(4, 1), Confidence::High); // ratio > 1.5
        assert_eq!(Confidence::from_scores(2, 1), Confidence::High); // ratio 2.0
        assert_eq!(Confidence::from_scores(3, 2), Confidence::Medium);
        assert_eq!(Confidence::from_scores(1, 0), Confidence::Medium);
        assert_eq!(Confidence::from_scores(0, 0), Confidence::Low);
    }

    #[test]
    fn test_intent_roundtrip() {
        for intent in Intent::all() {
            assert_eq!(Intent::parse(&intent.to_string()), Some(*intent));
        }
    }

    #[test]
    fn test_intent_serde_tag() {
        let json = serde_json::to_string(&Intent::MathReasoning).unwrap();
        assert_eq!(json, "\"MATH_REASONING\"");
    }
}
