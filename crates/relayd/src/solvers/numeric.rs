//! Numeric fast-path solvers: percent, unit conversion, date math, linear
//! one-variable equations, and basic stats over a bracketed list.

use super::arith::format_number;
use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use std::sync::OnceLock;

fn re(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

/// `X% of Y` and `what percent of Y is X`.
pub fn solve_percent(prompt: &str) -> Option<String> {
    static OF: OnceLock<Regex> = OnceLock::new();
    static WHAT: OnceLock<Regex> = OnceLock::new();

    let p = prompt.to_lowercase();
    if let Some(caps) = re(&OF, r"(\d+(?:\.\d+)?)\s*%\s*of\s*(-?\d+(?:\.\d+)?)").captures(&p) {
        let pct: f64 = caps[1].parse().ok()?;
        let base: f64 = caps[2].parse().ok()?;
        let value = base * pct / 100.0;
        return Some(format!("{}% of {} = {}", format_number(pct), format_number(base), format_number(value)));
    }
    if let Some(caps) =
        re(&WHAT, r"what percent(?:age)? of\s*(-?\d+(?:\.\d+)?)\s*is\s*(-?\d+(?:\.\d+)?)").captures(&p)
    {
        let base: f64 = caps[1].parse().ok()?;
        let part: f64 = caps[2].parse().ok()?;
        if base == 0.0 {
            return None;
        }
        let pct = part / base * 100.0;
        return Some(format!("{} is {}% of {}", format_number(part), format_number(pct), format_number(base)));
    }
    None
}

/// Conversion factors for `N <unit> to <unit>`.
const CONVERSIONS: &[(&str, &str, f64)] = &[
    ("km", "mi", 0.621371),
    ("mi", "km", 1.609344),
    ("kg", "lb", 2.204623),
    ("lb", "kg", 0.453592),
    ("m", "ft", 3.280840),
    ("ft", "m", 0.304800),
    ("cm", "in", 0.393701),
    ("in", "cm", 2.540000),
    ("l", "gal", 0.264172),
    ("gal", "l", 3.785412),
];

pub fn solve_units(prompt: &str) -> Option<String> {
    static CONV: OnceLock<Regex> = OnceLock::new();
    let p = prompt.to_lowercase();
    let caps = re(&CONV, r"(-?\d+(?:\.\d+)?)\s*([a-z]+)\s+(?:to|in)\s+([a-z]+)").captures(&p)?;
    let value: f64 = caps[1].parse().ok()?;
    let from = &caps[2];
    let to = &caps[3];

    // Temperature needs an offset, not a factor.
    if (from == "c" || from == "celsius") && (to == "f" || to == "fahrenheit") {
        return Some(format!("{}C = {}F", format_number(value), format_number(value * 9.0 / 5.0 + 32.0)));
    }
    if (from == "f" || from == "fahrenheit") && (to == "c" || to == "celsius") {
        return Some(format!("{}F = {}C", format_number(value), format_number((value - 32.0) * 5.0 / 9.0)));
    }

    let (_, _, factor) = CONVERSIONS
        .iter()
        .find(|(f, t, _)| f == &from && t == &to)?;
    Some(format!(
        "{} {} = {} {}",
        format_number(value),
        from,
        format_number(value * factor),
        to
    ))
}

/// `days between 2024-01-01 and 2024-03-01` and `age if born in 1990`.
pub fn solve_dates(prompt: &str) -> Option<String> {
    static BETWEEN: OnceLock<Regex> = OnceLock::new();
    static BORN: OnceLock<Regex> = OnceLock::new();

    let p = prompt.to_lowercase();
    if let Some(caps) =
        re(&BETWEEN, r"days between\s+(\d{4}-\d{2}-\d{2})\s+and\s+(\d{4}-\d{2}-\d{2})").captures(&p)
    {
        let a = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok()?;
        let b = NaiveDate::parse_from_str(&caps[2], "%Y-%m-%d").ok()?;
        let days = (b - a).num_days().abs();
        return Some(format!("{} days between {} and {}", days, &caps[1], &caps[2]));
    }
    if let Some(caps) = re(&BORN, r"born in\s+(\d{4})").captures(&p) {
        let year: i32 = caps[1].parse().ok()?;
        let current = Utc::now().year();
        if year > current || year < 1850 {
            return None;
        }
        let age = current - year;
        return Some(format!("born in {} makes you {} or {} this year", year, age - 1, age));
    }
    None
}

/// Linear one-variable equations: `ax+b=c`, `ax-b=c`, and the mirrored
/// `c=ax+b` form.
pub fn solve_equation(prompt: &str) -> Option<String> {
    static EQ: OnceLock<Regex> = OnceLock::new();
    static MIRROR: OnceLock<Regex> = OnceLock::new();

    let p: String = prompt.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect();

    let pattern = r"^(?:solve)?(-?\d*(?:\.\d+)?)\*?x(?:([+-]\d+(?:\.\d+)?))?=(-?\d+(?:\.\d+)?)$";
    let mirror = r"^(?:solve)?(-?\d+(?:\.\d+)?)=(-?\d*(?:\.\d+)?)\*?x(?:([+-]\d+(?:\.\d+)?))?$";

    let (a_raw, b_raw, c_raw) = if let Some(caps) = re(&EQ, pattern).captures(&p) {
        (
            caps.get(1).map(|m| m.as_str().to_string()),
            caps.get(2).map(|m| m.as_str().to_string()),
            caps[3].to_string(),
        )
    } else if let Some(caps) = re(&MIRROR, mirror).captures(&p) {
        (
            caps.get(2).map(|m| m.as_str().to_string()),
            caps.get(3).map(|m| m.as_str().to_string()),
            caps[1].to_string(),
        )
    } else {
        return None;
    };

    let a: f64 = match a_raw.as_deref() {
        None | Some("") => 1.0,
        Some("-") => -1.0,
        Some(s) => s.parse().ok()?,
    };
    let b: f64 = match b_raw.as_deref() {
        None => 0.0,
        Some(s) => s.parse().ok()?,
    };
    let c: f64 = c_raw.parse().ok()?;
    if a == 0.0 {
        return None;
    }
    let x = (c - b) / a;
    Some(format!("x = {}", format_number(x)))
}

/// Parse a bracketed number list: `[1, 2, 3]`.
pub fn bracketed_numbers(prompt: &str) -> Option<Vec<f64>> {
    let start = prompt.find('[')?;
    let end = prompt[start..].find(']')? + start;
    let inner = &prompt[start + 1..end];
    let nums: Vec<f64> = inner
        .split(',')
        .map(|s| s.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    if nums.is_empty() {
        None
    } else {
        Some(nums)
    }
}

/// Basic statistics over a bracketed list.
pub fn solve_stats(prompt: &str) -> Option<String> {
    let p = prompt.to_lowercase();
    let nums = bracketed_numbers(&p)?;
    let n = nums.len() as f64;
    let sum: f64 = nums.iter().sum();

    if p.contains("mean") || p.contains("average") {
        return Some(format!("mean = {}", format_number(sum / n)));
    }
    if p.contains("median") {
        let mut sorted = nums.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };
        return Some(format!("median = {}", format_number(median)));
    }
    if p.contains("sum") || p.contains("total") {
        return Some(format!("sum = {}", format_number(sum)));
    }
    if p.contains("max") || p.contains("largest") || p.contains("biggest") {
        let max = nums.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        return Some(format!("max = {}", format_number(max)));
    }
    if p.contains("min") || p.contains("smallest") {
        let min = nums.iter().cloned().fold(f64::INFINITY, f64::min);
        return Some(format!("min = {}", format_number(min)));
    }
    if p.contains("std") || p.contains("deviation") {
        let mean = sum / n;
        let var = nums.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        return Some(format!("stddev = {}", format_number(var.sqrt())));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(solve_percent("what is 20% of 150?"), Some("20% of 150 = 30".into()));
        assert_eq!(solve_percent("what percent of 50 is 10"), Some("10 is 20% of 50".into()));
        assert_eq!(solve_percent("percentages are fun"), None);
    }

    #[test]
    fn test_units() {
        assert_eq!(solve_units("convert 10 km to mi"), Some("10 km = 6.21371 mi".into()));
        assert_eq!(solve_units("100 c to f"), Some("100C = 212F".into()));
        assert_eq!(solve_units("32 f to c"), Some("32F = 0C".into()));
        assert_eq!(solve_units("5 parsecs to furlongs"), None);
    }

    #[test]
    fn test_days_between() {
        let out = solve_dates("days between 2024-01-01 and 2024-01-31").unwrap();
        assert!(out.starts_with("30 days"));
        // Reversed order still counts forward.
        let rev = solve_dates("days between 2024-01-31 and 2024-01-01").unwrap();
        assert!(rev.starts_with("30 days"));
    }

    #[test]
    fn test_equation() {
        assert_eq!(solve_equation("2x+3=11"), Some("x = 4".into()));
        assert_eq!(solve_equation("solve 3x - 6 = 0"), Some("x = 2".into()));
        assert_eq!(solve_equation("x+1=5"), Some("x = 4".into()));
        assert_eq!(solve_equation("10 = 2x"), Some("x = 5".into()));
        assert_eq!(solve_equation("0x+1=5"), None);
        assert_eq!(solve_equation("x squared = 4"), None);
    }

    #[test]
    fn test_stats() {
        assert_eq!(solve_stats("mean of [1, 2, 3]"), Some("mean = 2".into()));
        assert_eq!(solve_stats("median of [3, 1, 2]"), Some("median = 2".into()));
        assert_eq!(solve_stats("median of [4, 1, 2, 3]"), Some("median = 2.5".into()));
        assert_eq!(solve_stats("sum of [1.5, 2.5]"), Some("sum = 4".into()));
        assert_eq!(solve_stats("max of [1, 9, 4]"), Some("max = 9".into()));
        assert_eq!(solve_stats("mean of []"), None);
        assert_eq!(solve_stats("mean of nothing"), None);
    }

    #[test]
    fn test_bracketed_numbers() {
        assert_eq!(bracketed_numbers("[1, 2.5, -3]"), Some(vec![1.0, 2.5, -3.0]));
        assert_eq!(bracketed_numbers("[a, b]"), None);
        assert_eq!(bracketed_numbers("no list"), None);
    }
}
