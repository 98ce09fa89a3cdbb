//! Narrative arithmetic: "i have 28 apples and i eat 4 then i buy 2 more".
//!
//! Walks the prompt left to right, assigning a sign to each number from
//! the nearest preceding verb. Used by the math pipeline when the intent
//! classifier lands on MATH_REASONING with a story-shaped prompt.

use super::arith::format_number;

const GAIN_VERBS: &[&str] = &[
    "have", "had", "has", "start", "buy", "bought", "get", "got", "find",
    "found", "receive", "received", "earn", "earned", "win", "won", "add",
    "gain", "pick", "picked",
];
const LOSS_VERBS: &[&str] = &[
    "eat", "ate", "lose", "lost", "give", "gave", "spend", "spent", "sell",
    "sold", "drop", "dropped", "break", "broke", "use", "used", "remove",
    "donate", "donated",
];

#[derive(Debug, Clone)]
pub struct WordProblemSolution {
    pub steps: Vec<String>,
    pub total: f64,
}

/// Solve a possession narrative; None when no verbs anchor the numbers or
/// fewer than two quantities appear.
pub fn solve(prompt: &str) -> Option<WordProblemSolution> {
    let words: Vec<String> = prompt
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '.')
        .filter(|w| !w.is_empty())
        .map(|w| w.to_string())
        .collect();

    let mut total = 0.0f64;
    let mut steps = Vec::new();
    let mut sign: Option<f64> = None;
    let mut seen_numbers = 0;

    for word in &words {
        if GAIN_VERBS.contains(&word.as_str()) {
            sign = Some(1.0);
            continue;
        }
        if LOSS_VERBS.contains(&word.as_str()) {
            sign = Some(-1.0);
            continue;
        }
        if let Ok(n) = word.parse::<f64>() {
            let s = sign?; // a number with no anchoring verb: not a story
            seen_numbers += 1;
            total += s * n;
            steps.push(format!(
                "{}{}",
                if s > 0.0 { "+" } else { "-" },
                format_number(n)
            ));
        }
    }

    if seen_numbers < 2 {
        return None;
    }
    Some(WordProblemSolution { steps, total })
}

/// Story-shaped math: verbs plus at least two numbers.
pub fn looks_like_word_problem(prompt: &str) -> bool {
    solve(prompt).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apples() {
        let p = "i have 28 apples and i eat 4 then i buy other 2 apples how many apples do i have right now?";
        let solution = solve(p).unwrap();
        assert_eq!(solution.total, 26.0);
        assert_eq!(solution.steps, vec!["+28", "-4", "+2"]);
    }

    #[test]
    fn test_money() {
        let p = "she earned 100 dollars, spent 30 and found 5 more";
        assert_eq!(solve(p).unwrap().total, 75.0);
    }

    #[test]
    fn test_rejects_plain_questions() {
        assert!(solve("what is the capital of france").is_none());
        // One number is not a story.
        assert!(solve("i have 5 apples").is_none());
        // Numbers with no verbs do not anchor.
        assert!(solve("compare 4 and 7").is_none());
    }
}
