//! Post-generation validation, conditioned on intent.
//!
//! Math answers are re-checked against a sandbox evaluation; code answers
//! get a smoke run; ranking answers must be enumerated and grounded in the
//! supplied sources or they are replaced by the stock refusal.

use crate::solvers::arith;
use crate::tools::sandbox;
use regex::Regex;
use relay_shared::envelope;
use relay_shared::formatter::numbered_lines;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Tolerance when comparing the model's number to the sandbox value.
pub const MATH_TOLERANCE: f64 = 1e-6;

/// Stock refusal for ungrounded rankings.
pub const RANKING_REFUSAL: &str =
    "No web sources were available, so a grounded ranking cannot be produced. \
     Enable web access or name the sources and ask again.";

/// The last arithmetic expression appearing in a prompt.
pub fn extract_last_expression(prompt: &str) -> Option<String> {
    static EXPR: OnceLock<Regex> = OnceLock::new();
    let expr_re = EXPR.get_or_init(|| {
        Regex::new(r"[-(]*\d[\d\s.()+\-*/×÷]*").expect("static regex")
    });
    let mut last: Option<String> = None;
    for m in expr_re.find_iter(prompt) {
        let text = m.as_str().trim();
        if text.chars().any(|c| "+-*/×÷".contains(c)) && text.chars().any(|c| c.is_ascii_digit()) {
            last = Some(text.to_string());
        }
    }
    last
}

/// Compare the answer's final number to the trusted value; rebuild the
/// Result locally when they disagree.
pub fn reconcile_math(answer: &str, expression: &str, trusted: f64) -> Option<String> {
    let claimed = envelope::extract_result(answer)
        .as_deref()
        .and_then(envelope::last_number)
        .or_else(|| envelope::last_number(answer));
    match claimed {
        Some(n) if (n - trusted).abs() <= MATH_TOLERANCE => None,
        _ => {
            info!("math validation replaced answer ({} = {})", expression, trusted);
            let compact: String = expression.chars().filter(|c| !c.is_whitespace()).collect();
            Some(relay_shared::wrap_result(&format!(
                "{} = {}",
                compact,
                arith::format_number(trusted)
            )))
        }
    }
}

/// Evaluate the prompt's last expression in the scripting sandbox, falling
/// back to the local evaluator when the sandbox is unavailable, then
/// reconcile. None means the answer stands.
pub async fn verify_math(prompt: &str, answer: &str, safe_mode: bool) -> Option<String> {
    let expression = extract_last_expression(prompt)?;
    let trusted = match sandbox_eval(&expression, safe_mode).await {
        Some(v) => v,
        None => arith::evaluate(&expression)?,
    };
    reconcile_math(answer, &expression, trusted)
}

async fn sandbox_eval(expression: &str, safe_mode: bool) -> Option<f64> {
    // The expression grammar is closed; print() over it is safe.
    let normalized = expression.replace('×', "*").replace('÷', "/");
    if !normalized
        .chars()
        .all(|c| c.is_ascii_digit() || " .()+-*/".contains(c))
    {
        return None;
    }
    let program = format!("print({})", normalized);
    match sandbox::run_python(&program, safe_mode).await {
        Ok(out) if out.success => out.stdout.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// First fenced code block with a runnable language tag.
pub fn extract_code_block(answer: &str) -> Option<(String, String)> {
    let start = answer.find("```")?;
    let rest = &answer[start + 3..];
    let newline = rest.find('\n')?;
    let lang = rest[..newline].trim().to_lowercase();
    if !matches!(lang.as_str(), "python" | "javascript" | "typescript") {
        return None;
    }
    let body = &rest[newline + 1..];
    let end = body.find("```")?;
    Some((lang, body[..end].to_string()))
}

/// Code self-check outcome.
#[derive(Debug, PartialEq)]
pub enum CodeCheck {
    /// No runnable block, or it ran clean; leave the answer alone.
    Clean,
    /// Runtime failure; regenerate once with the error attached.
    Failed(String),
}

/// Smoke-run the answer's first code block. Sandbox denials and timeouts
/// leave the answer untouched; only a real runtime error asks for a
/// regeneration.
pub async fn check_code(answer: &str, safe_mode: bool) -> CodeCheck {
    let Some((lang, code)) = extract_code_block(answer) else {
        return CodeCheck::Clean;
    };
    let run = match lang.as_str() {
        "python" => sandbox::run_python(&code, safe_mode).await,
        _ => sandbox::run_js(&code, safe_mode).await,
    };
    match run {
        Ok(out) if out.success => CodeCheck::Clean,
        Ok(out) => {
            debug!("code self-check failed: {}", out.stderr);
            CodeCheck::Failed(out.stderr)
        }
        Err(e) => {
            debug!("code self-check skipped: {}", e);
            CodeCheck::Clean
        }
    }
}

/// Ranking validation outcome.
#[derive(Debug, PartialEq)]
pub enum RankingVerdict {
    Ok,
    /// Structure missing; regenerate once.
    Regenerate,
    /// Fewer than ten items for a literal "top 10" ask.
    ShortList(usize),
    /// No sources at all: the stock refusal replaces the answer.
    Refuse,
}

/// Ranking answers need enumeration and citations, and grounding demands
/// sources. The ten-item rule binds only when the prompt literally says
/// "top 10".
pub fn validate_ranking(prompt: &str, answer: &str, source_count: usize) -> RankingVerdict {
    if source_count == 0 {
        return RankingVerdict::Refuse;
    }
    let numbered = numbered_lines(answer);
    let has_one = numbered.iter().any(|(n, _)| *n == 1);
    let has_two = numbered.iter().any(|(n, _)| *n == 2);
    let has_citation = {
        static CITE: OnceLock<Regex> = OnceLock::new();
        CITE.get_or_init(|| Regex::new(r"\[\d+\]").expect("static regex"))
            .is_match(answer)
    };
    if !has_one || !has_two || !has_citation {
        return RankingVerdict::Regenerate;
    }
    if prompt.to_lowercase().contains("top 10") && numbered.len() < 10 {
        return RankingVerdict::ShortList(numbered.len());
    }
    RankingVerdict::Ok
}

/// Honest prefix for a short list.
pub fn short_list_notice(count: usize) -> String {
    format!("Only {} items could be grounded in the available sources.\n\n", count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_last_expression() {
        assert_eq!(extract_last_expression("what is 2+2"), Some("2+2".to_string()));
        assert_eq!(
            extract_last_expression("first 1+1 then 3 * (4 - 1)"),
            Some("3 * (4 - 1)".to_string())
        );
        assert_eq!(extract_last_expression("no math here"), None);
        // A bare number with no operator is not an expression.
        assert_eq!(extract_last_expression("the year 1995"), None);
    }

    #[test]
    fn test_reconcile_math_accepts_correct() {
        let answer = relay_shared::wrap_result("2+2 = 4");
        assert_eq!(reconcile_math(&answer, "2+2", 4.0), None);
    }

    #[test]
    fn test_reconcile_math_replaces_wrong() {
        let answer = relay_shared::wrap_result("2+2 = 5");
        let fixed = reconcile_math(&answer, "2+2", 4.0).unwrap();
        assert!(fixed.contains("2+2 = 4"));
        assert!(relay_shared::envelope::is_well_formed(&fixed));
    }

    #[test]
    fn test_extract_code_block() {
        let answer = "Here:\n```python\nprint(1)\n```\ndone";
        let (lang, code) = extract_code_block(answer).unwrap();
        assert_eq!(lang, "python");
        assert_eq!(code, "print(1)\n");
        // Unrunnable languages are skipped.
        assert!(extract_code_block("```sql\nSELECT 1\n```").is_none());
        assert!(extract_code_block("no fence").is_none());
    }

    #[test]
    fn test_ranking_refusal_without_sources() {
        assert_eq!(validate_ranking("top 10 LLMs", "1. A [1]\n2. B [2]", 0), RankingVerdict::Refuse);
    }

    #[test]
    fn test_ranking_structure_required() {
        // No citations.
        assert_eq!(
            validate_ranking("best databases", "1. A\n2. B", 3),
            RankingVerdict::Regenerate
        );
        // No enumeration.
        assert_eq!(
            validate_ranking("best databases", "A then B [1]", 3),
            RankingVerdict::Regenerate
        );
        // Both present.
        assert_eq!(
            validate_ranking("best databases", "1. A [1]\n2. B [2]", 3),
            RankingVerdict::Ok
        );
    }

    #[test]
    fn test_top_ten_rule_is_literal() {
        let five = "1. A [1]\n2. B [1]\n3. C [1]\n4. D [1]\n5. E [1]";
        assert_eq!(validate_ranking("top 10 LLMs", five, 3), RankingVerdict::ShortList(5));
        // "top 7" is not enforced.
        assert_eq!(validate_ranking("top 7 LLMs", five, 3), RankingVerdict::Ok);
    }

    #[test]
    fn test_full_top_ten_passes() {
        let ten: String = (1..=10).map(|i| format!("{}. Item {} [1]\n", i, i)).collect();
        assert_eq!(validate_ranking("top 10 things", &ten, 2), RankingVerdict::Ok);
    }
}
