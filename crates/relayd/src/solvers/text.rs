//! Text fast-paths: string utilities, email/URL validity, regex-literal
//! evaluation, and spreadsheet formula shortcuts.

use regex::Regex;
use std::sync::OnceLock;

/// First quoted span in a prompt (single or double quotes).
fn quoted(prompt: &str) -> Option<String> {
    for q in ['"', '\''] {
        if let Some(start) = prompt.find(q) {
            if let Some(len) = prompt[start + 1..].find(q) {
                return Some(prompt[start + 1..start + 1 + len].to_string());
            }
        }
    }
    None
}

/// reverse / uppercase / lowercase / length / word count over a quoted
/// sample.
pub fn solve_strings(prompt: &str) -> Option<String> {
    let p = prompt.to_lowercase();
    let sample = quoted(prompt)?;

    if p.contains("reverse") {
        let reversed: String = sample.chars().rev().collect();
        return Some(format!("\"{}\" reversed is \"{}\"", sample, reversed));
    }
    if p.contains("uppercase") || p.contains("upper case") {
        return Some(format!("\"{}\"", sample.to_uppercase()));
    }
    if p.contains("lowercase") || p.contains("lower case") {
        return Some(format!("\"{}\"", sample.to_lowercase()));
    }
    if p.contains("how many words") || p.contains("word count") || p.contains("count words") {
        return Some(format!("{} words", sample.split_whitespace().count()));
    }
    if p.contains("length") || p.contains("how many characters") || p.contains("how long") {
        return Some(format!("{} characters", sample.chars().count()));
    }
    None
}

/// Email and URL validity checks.
pub fn solve_validity(prompt: &str) -> Option<String> {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    static CANDIDATE: OnceLock<Regex> = OnceLock::new();

    let p = prompt.to_lowercase();
    if !p.contains("valid") {
        return None;
    }

    if p.contains("email") {
        let candidate = CANDIDATE
            .get_or_init(|| Regex::new(r"[^\s\x22']+@[^\s\x22']*").expect("static regex"))
            .find(prompt)?
            .as_str()
            .trim_end_matches(['?', '.', ',']);
        let email_re = EMAIL.get_or_init(|| {
            Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("static regex")
        });
        let verdict = if email_re.is_match(candidate) { "a valid" } else { "not a valid" };
        return Some(format!("{} is {} email address", candidate, verdict));
    }

    if p.contains("url") {
        let candidate = prompt
            .split_whitespace()
            .find(|w| w.contains("://") || w.starts_with("www."))
            .map(|w| w.trim_end_matches(['?', '.', ',']))?;
        let ok = (candidate.starts_with("http://") || candidate.starts_with("https://"))
            && candidate.len() > 10
            && candidate[8..].contains('.')
            && !candidate.contains(' ');
        let verdict = if ok { "a valid" } else { "not a valid" };
        return Some(format!("{} is {} URL", candidate, verdict));
    }

    None
}

/// Evaluate a /regex/ literal against a quoted sample.
pub fn solve_regex(prompt: &str) -> Option<String> {
    let slash_start = prompt.find('/')?;
    let slash_end = prompt[slash_start + 1..].find('/')? + slash_start + 1;
    if slash_end <= slash_start + 1 {
        return None;
    }
    let pattern = &prompt[slash_start + 1..slash_end];
    let sample = quoted(&prompt[slash_end + 1..])
        .or_else(|| quoted(&prompt[..slash_start]))?;

    let regex = Regex::new(pattern).ok()?;
    match regex.find(&sample) {
        Some(m) => Some(format!("/{}/ matches \"{}\" at \"{}\"", pattern, sample, m.as_str())),
        None => Some(format!("/{}/ does not match \"{}\"", pattern, sample)),
    }
}

/// Spreadsheet formula shortcuts: =UPPER, =LOWER, =TRIM, =SUBSTITUTE.
pub fn solve_formula(prompt: &str) -> Option<String> {
    static FORMULA: OnceLock<Regex> = OnceLock::new();
    let formula_re = FORMULA.get_or_init(|| {
        Regex::new(r#"=\s*(UPPER|LOWER|TRIM|SUBSTITUTE)\s*\((.*)\)"#).expect("static regex")
    });
    let caps = formula_re.captures(prompt)?;
    let name = caps[1].to_uppercase();
    let args_raw = &caps[2];

    let args: Vec<String> = split_formula_args(args_raw);
    match (name.as_str(), args.as_slice()) {
        ("UPPER", [s]) => Some(format!("\"{}\"", s.to_uppercase())),
        ("LOWER", [s]) => Some(format!("\"{}\"", s.to_lowercase())),
        ("TRIM", [s]) => Some(format!("\"{}\"", s.trim())),
        ("SUBSTITUTE", [s, from, to]) => Some(format!("\"{}\"", s.replace(from.as_str(), to))),
        _ => None,
    }
}

/// Split quoted formula arguments, respecting commas inside quotes.
fn split_formula_args(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in raw.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                args.push(current.trim().trim_matches('"').to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() || !args.is_empty() {
        args.push(current.trim().trim_matches('"').to_string());
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_utils() {
        assert_eq!(
            solve_strings("reverse \"hello\""),
            Some("\"hello\" reversed is \"olleh\"".into())
        );
        assert_eq!(solve_strings("uppercase 'abc'"), Some("\"ABC\"".into()));
        assert_eq!(
            solve_strings("how many words in \"one two three\""),
            Some("3 words".into())
        );
        assert_eq!(solve_strings("length of 'abcd'"), Some("4 characters".into()));
        assert_eq!(solve_strings("reverse my car"), None); // nothing quoted
    }

    #[test]
    fn test_email_validity() {
        assert_eq!(
            solve_validity("is alice@example.com a valid email?"),
            Some("alice@example.com is a valid email address".into())
        );
        let out = solve_validity("is not-an-email@ a valid email?").unwrap();
        assert!(out.contains("not a valid"));
    }

    #[test]
    fn test_url_validity() {
        let ok = solve_validity("is https://example.com a valid url?").unwrap();
        assert!(ok.contains("is a valid"));
        let bad = solve_validity("is www.example a valid url").unwrap();
        assert!(bad.contains("not a valid"));
    }

    #[test]
    fn test_regex_eval() {
        let hit = solve_regex("does /\\d+/ match \"abc123\"?").unwrap();
        assert!(hit.contains("matches"));
        assert!(hit.contains("123"));
        let miss = solve_regex("does /\\d+/ match \"abcdef\"?").unwrap();
        assert!(miss.contains("does not match"));
        assert_eq!(solve_regex("no regex here"), None);
    }

    #[test]
    fn test_formula_shortcuts() {
        assert_eq!(solve_formula("=UPPER(\"abc\")"), Some("\"ABC\"".into()));
        assert_eq!(solve_formula("=TRIM(\"  x  \")"), Some("\"x\"".into()));
        assert_eq!(
            solve_formula("=SUBSTITUTE(\"a-b-c\", \"-\", \"+\")"),
            Some("\"a+b+c\"".into())
        );
        assert_eq!(solve_formula("=VLOOKUP(a, b)"), None);
    }
}
