//! Response formatter: maps raw model text to a structured envelope.
//!
//! Detection is rule-based and ordered: chart marker, pipe table, ranking
//! shape, numbered/bulleted list, plain text. Each kind also gets an HTML
//! rendering with mandatory escaping.

use serde::{Deserialize, Serialize};

/// Detected response format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    Table,
    List,
    Ranking,
    Chart,
}

impl std::fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Text => "text",
            Self::Table => "table",
            Self::List => "list",
            Self::Ranking => "ranking",
            Self::Chart => "chart",
        };
        write!(f, "{}", s)
    }
}

/// Structured response produced by the formatter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattedResponse {
    pub kind: ResponseFormat,
    /// Original text, untouched.
    pub text: String,
    /// HTML rendering of the detected structure.
    pub html: String,
    /// Parsed chart payload when kind == chart.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<serde_json::Value>,
}

/// Escape text for embedding in HTML. Mandatory for every rendering path.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const CHART_MARKER: &str = "CHART_JSON:";

/// Classify and render a raw response.
pub fn format_response(text: &str) -> FormattedResponse {
    if let Some(chart) = detect_chart(text) {
        let html = format!(
            "<pre class=\"chart-data\">{}</pre>",
            html_escape(&chart.to_string())
        );
        return FormattedResponse {
            kind: ResponseFormat::Chart,
            text: text.to_string(),
            html,
            chart: Some(chart),
        };
    }

    if let Some(rows) = detect_table(text) {
        return FormattedResponse {
            kind: ResponseFormat::Table,
            text: text.to_string(),
            html: render_table(&rows),
            chart: None,
        };
    }

    if detect_ranking(text) {
        return FormattedResponse {
            kind: ResponseFormat::Ranking,
            text: text.to_string(),
            html: render_list(text, true),
            chart: None,
        };
    }

    if detect_list(text) {
        return FormattedResponse {
            kind: ResponseFormat::List,
            text: text.to_string(),
            html: render_list(text, false),
            chart: None,
        };
    }

    FormattedResponse {
        kind: ResponseFormat::Text,
        text: text.to_string(),
        html: format!("<p>{}</p>", html_escape(text).replace('\n', "<br>")),
        chart: None,
    }
}

/// Chart detection: explicit CHART_JSON: marker with a parsable JSON object.
fn detect_chart(text: &str) -> Option<serde_json::Value> {
    let idx = text.find(CHART_MARKER)?;
    let rest = text[idx + CHART_MARKER.len()..].trim();
    let start = rest.find('{')?;
    let end = rest.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&rest[start..=end]).ok()
}

/// Table detection: at least two lines with two or more pipe separators.
fn detect_table(text: &str) -> Option<Vec<Vec<String>>> {
    let rows: Vec<Vec<String>> = text
        .lines()
        .filter(|l| l.matches('|').count() >= 2)
        .map(|l| {
            l.trim()
                .trim_matches('|')
                .split('|')
                .map(|c| c.trim().to_string())
                .collect()
        })
        .filter(|cells: &Vec<String>| cells.iter().any(|c| !c.is_empty()))
        // Markdown separator rows (---) carry no data.
        .filter(|cells| !cells.iter().all(|c| c.chars().all(|ch| ch == '-' || ch == ':')))
        .collect();
    if rows.len() >= 2 {
        Some(rows)
    } else {
        None
    }
}

/// Ranking detection: two or more numbered lines where the items carry a
/// name and the text cites or compares them.
fn detect_ranking(text: &str) -> bool {
    let numbered = numbered_lines(text);
    if numbered.len() < 2 {
        return false;
    }
    // A numbered list reads as a ranking when it leads with `1.` and `2.`
    // and the body carries citation markers or value-ish suffixes.
    let has_one_two = numbered.iter().any(|(n, _)| *n == 1)
        && numbered.iter().any(|(n, _)| *n == 2);
    if !has_one_two {
        return false;
    }
    let has_citation = text.contains('[') && text.contains(']');
    let has_values = numbered
        .iter()
        .filter(|(_, body)| body.chars().any(|c| c.is_ascii_digit()))
        .count()
        >= 2;
    has_citation || has_values
}

/// List detection: two or more numbered or bulleted lines.
fn detect_list(text: &str) -> bool {
    let bullets = text
        .lines()
        .filter(|l| {
            let t = l.trim_start();
            t.starts_with("- ") || t.starts_with("* ") || parse_numbered(t).is_some()
        })
        .count();
    bullets >= 2
}

/// (number, body) pairs for every `N.`-prefixed line.
pub fn numbered_lines(text: &str) -> Vec<(u32, String)> {
    text.lines()
        .filter_map(|l| parse_numbered(l.trim_start()))
        .collect()
}

fn parse_numbered(line: &str) -> Option<(u32, String)> {
    let dot = line.find('.')?;
    if dot == 0 || dot > 3 {
        return None;
    }
    let n: u32 = line[..dot].parse().ok()?;
    let body = line[dot + 1..].trim();
    if body.is_empty() {
        return None;
    }
    Some((n, body.to_string()))
}

fn render_table(rows: &[Vec<String>]) -> String {
    let mut html = String::from("<table>");
    for (i, row) in rows.iter().enumerate() {
        let tag = if i == 0 { "th" } else { "td" };
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<{t}>{}</{t}>", html_escape(cell), t = tag));
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");
    html
}

fn render_list(text: &str, ordered: bool) -> String {
    let tag = if ordered { "ol" } else { "ul" };
    let mut html = format!("<{}>", tag);
    for line in text.lines() {
        let t = line.trim_start();
        let body = if let Some((_, b)) = parse_numbered(t) {
            Some(b)
        } else if let Some(b) = t.strip_prefix("- ").or_else(|| t.strip_prefix("* ")) {
            Some(b.to_string())
        } else {
            None
        };
        if let Some(body) = body {
            html.push_str(&format!("<li>{}</li>", html_escape(&body)));
        }
    }
    html.push_str(&format!("</{}>", tag));
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_detection_wins() {
        let text = "CHART_JSON: {\"type\":\"bar\",\"labels\":[\"a\"],\"values\":[1]}";
        let out = format_response(text);
        assert_eq!(out.kind, ResponseFormat::Chart);
        assert_eq!(out.chart.unwrap()["type"], "bar");
    }

    #[test]
    fn test_table_detection() {
        let text = "| name | size |\n|---|---|\n| a | 1 |\n| b | 2 |";
        let out = format_response(text);
        assert_eq!(out.kind, ResponseFormat::Table);
        assert!(out.html.starts_with("<table>"));
        assert!(out.html.contains("<th>name</th>"));
        assert!(out.html.contains("<td>2</td>"));
    }

    #[test]
    fn test_ranking_detection() {
        let text = "1. Alpha (98 points) [1]\n2. Beta (91 points) [2]\n3. Gamma (80 points) [1]";
        let out = format_response(text);
        assert_eq!(out.kind, ResponseFormat::Ranking);
        assert!(out.html.starts_with("<ol>"));
    }

    #[test]
    fn test_list_detection() {
        let text = "Shopping:\n- apples\n- pears";
        let out = format_response(text);
        assert_eq!(out.kind, ResponseFormat::List);
        assert!(out.html.contains("<li>apples</li>"));
    }

    #[test]
    fn test_plain_text() {
        let out = format_response("just a sentence");
        assert_eq!(out.kind, ResponseFormat::Text);
        assert_eq!(out.html, "<p>just a sentence</p>");
    }

    #[test]
    fn test_html_escaping() {
        let out = format_response("- <script>alert(1)</script>\n- ok");
        assert!(!out.html.contains("<script>"));
        assert!(out.html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_numbered_lines() {
        let lines = numbered_lines("1. one\nx\n2. two\n10. ten");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], (10, "ten".to_string()));
    }
}
