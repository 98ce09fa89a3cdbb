//! The canonical Thinking/Result answer envelope.
//!
//! Every user-visible answer carries exactly one `Thinking` section and
//! exactly one `Result` section, in that order.

/// Placeholder used when reasoning is suppressed (local solvers, cache hits).
pub const THINKING_OMITTED: &str = "(omitted by request)";

/// Wrap a one-line answer in the canonical envelope with omitted thinking.
pub fn wrap_result(answer: &str) -> String {
    format!("Thinking\n- {}\n\nResult\n- {}", THINKING_OMITTED, answer)
}

/// Wrap an answer with explicit thinking lines.
pub fn wrap_with_thinking(thinking: &[&str], answer: &str) -> String {
    let mut out = String::from("Thinking\n");
    for line in thinking {
        out.push_str("- ");
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("\nResult\n- ");
    out.push_str(answer);
    out
}

/// Check envelope shape: one Thinking header line, one Result header line,
/// in that order.
pub fn is_well_formed(text: &str) -> bool {
    let mut thinking_at = None;
    let mut result_at = None;
    for (i, line) in text.lines().enumerate() {
        match line.trim_end() {
            "Thinking" => {
                if thinking_at.is_some() {
                    return false;
                }
                thinking_at = Some(i);
            }
            "Result" => {
                if result_at.is_some() {
                    return false;
                }
                result_at = Some(i);
            }
            _ => {}
        }
    }
    matches!((thinking_at, result_at), (Some(t), Some(r)) if t < r)
}

/// Extract the text of the Result section, if present.
pub fn extract_result(text: &str) -> Option<String> {
    let mut lines = text.lines().skip_while(|l| l.trim_end() != "Result");
    lines.next()?;
    let body: Vec<&str> = lines
        .map(|l| l.strip_prefix("- ").unwrap_or(l))
        .collect();
    let joined = body.join("\n");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Last number occurring in the text. Used by the math validator to
/// compare a generated Result against the sandbox value.
pub fn last_number(text: &str) -> Option<f64> {
    let mut last = None;
    let mut cur = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() || c == '.' || (c == '-' && cur.is_empty()) {
            cur.push(c);
        } else {
            if let Ok(n) = cur.parse::<f64>() {
                last = Some(n);
            }
            cur.clear();
        }
    }
    if let Ok(n) = cur.parse::<f64>() {
        last = Some(n);
    }
    last
}
