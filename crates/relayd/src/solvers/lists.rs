//! List fast-paths: set operations and sort/filter with one comparison.

use super::arith::format_number;
use super::numeric::bracketed_numbers;
use regex::Regex;
use std::sync::OnceLock;

/// Parse the two bracketed lists of a set-op prompt, as raw items.
fn two_lists(prompt: &str) -> Option<(Vec<String>, Vec<String>)> {
    let first_start = prompt.find('[')?;
    let first_end = prompt[first_start..].find(']')? + first_start;
    let rest = &prompt[first_end + 1..];
    let second_start = rest.find('[')?;
    let second_end = rest[second_start..].find(']')? + second_start;

    let parse = |inner: &str| -> Vec<String> {
        inner
            .split(',')
            .map(|s| s.trim().trim_matches(['\'', '"']).to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };
    Some((
        parse(&prompt[first_start + 1..first_end]),
        parse(&rest[second_start + 1..second_end]),
    ))
}

/// Union, intersection, and difference of two bracketed lists.
pub fn solve_sets(prompt: &str) -> Option<String> {
    let p = prompt.to_lowercase();
    let (a, b) = two_lists(&p)?;

    let op = if p.contains("union") {
        "union"
    } else if p.contains("intersection") || p.contains("intersect") {
        "intersection"
    } else if p.contains("difference") {
        "difference"
    } else {
        return None;
    };

    let result: Vec<String> = match op {
        "union" => {
            let mut out = a.clone();
            for item in b {
                if !out.contains(&item) {
                    out.push(item);
                }
            }
            out
        }
        "intersection" => a.into_iter().filter(|x| b.contains(x)).collect(),
        _ => a.into_iter().filter(|x| !b.contains(x)).collect(),
    };

    Some(format!("{} = [{}]", op, result.join(", ")))
}

/// `sort [5,2,9]` ascending/descending and `filter [..] > N` with a single
/// comparison operator.
pub fn solve_sort_filter(prompt: &str) -> Option<String> {
    static CMP: OnceLock<Regex> = OnceLock::new();

    let p = prompt.to_lowercase();
    let nums = bracketed_numbers(&p)?;

    if p.contains("sort") {
        let mut sorted = nums;
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        if p.contains("desc") || p.contains("descending") || p.contains("reverse") {
            sorted.reverse();
        }
        let rendered: Vec<String> = sorted.iter().map(|n| format_number(*n)).collect();
        return Some(format!("sorted = [{}]", rendered.join(", ")));
    }

    if p.contains("filter") || p.contains("keep") {
        let cmp = CMP
            .get_or_init(|| Regex::new(r"(>=|<=|>|<|=)\s*(-?\d+(?:\.\d+)?)").expect("static regex"));
        // The comparison sits after the list; matching inside the brackets
        // would misread negative items.
        let after = &p[p.find(']')? ..];
        let caps = cmp.captures(after)?;
        let threshold: f64 = caps[2].parse().ok()?;
        let keep: Vec<f64> = nums
            .into_iter()
            .filter(|n| match &caps[1] {
                ">" => *n > threshold,
                "<" => *n < threshold,
                ">=" => *n >= threshold,
                "<=" => *n <= threshold,
                _ => *n == threshold,
            })
            .collect();
        let rendered: Vec<String> = keep.iter().map(|n| format_number(*n)).collect();
        return Some(format!("filtered = [{}]", rendered.join(", ")));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union() {
        assert_eq!(
            solve_sets("union of [a, b] and [b, c]"),
            Some("union = [a, b, c]".into())
        );
    }

    #[test]
    fn test_intersection() {
        assert_eq!(
            solve_sets("intersection of [1, 2, 3] and [2, 3, 4]"),
            Some("intersection = [2, 3]".into())
        );
    }

    #[test]
    fn test_difference() {
        assert_eq!(
            solve_sets("difference of [a, b, c] and [b]"),
            Some("difference = [a, c]".into())
        );
    }

    #[test]
    fn test_sets_need_two_lists() {
        assert_eq!(solve_sets("union of [a, b]"), None);
        assert_eq!(solve_sets("what is a union"), None);
    }

    #[test]
    fn test_sort() {
        assert_eq!(solve_sort_filter("sort [5, 2, 9]"), Some("sorted = [2, 5, 9]".into()));
        assert_eq!(
            solve_sort_filter("sort [5, 2, 9] descending"),
            Some("sorted = [9, 5, 2]".into())
        );
    }

    #[test]
    fn test_filter() {
        assert_eq!(
            solve_sort_filter("filter [1, 5, 10, -2] > 2"),
            Some("filtered = [5, 10]".into())
        );
        assert_eq!(
            solve_sort_filter("filter [1, 5, 10] <= 5"),
            Some("filtered = [1, 5]".into())
        );
    }

    #[test]
    fn test_sort_filter_rejects_prose() {
        assert_eq!(solve_sort_filter("sort out my life"), None);
        assert_eq!(solve_sort_filter("filter coffee"), None);
    }
}
