//! Local fast-path solvers.
//!
//! Each solver is total and side-effect free over the normalized prompt.
//! They run in a fixed order and the first hit short-circuits the rest of
//! the pipeline; every answer leaves in the canonical envelope.

pub mod arith;
pub mod geometry;
pub mod lists;
pub mod numeric;
pub mod riddles;
pub mod text;
pub mod word_problem;

pub use riddles::{instant_conversation, trivial_message};

use relay_shared::models::{MODEL_LOCAL_INSTANT, MODEL_LOCAL_MATH};
use relay_shared::wrap_result;

/// A finished local answer.
#[derive(Debug, Clone)]
pub struct SolverAnswer {
    /// Full enveloped response text.
    pub response: String,
    /// Synthetic model tag reported in meta.
    pub model: &'static str,
    /// Which solver hit, for the route tag.
    pub solver: &'static str,
}

type Solver = (&'static str, fn(&str) -> Option<String>);

/// The fixed evaluation order.
const SOLVERS: &[Solver] = &[
    ("arithmetic", arith::solve),
    ("percent", numeric::solve_percent),
    ("units", numeric::solve_units),
    ("dates", numeric::solve_dates),
    ("equation", numeric::solve_equation),
    ("stats", numeric::solve_stats),
    ("sets", lists::solve_sets),
    ("sort_filter", lists::solve_sort_filter),
    ("strings", text::solve_strings),
    ("validity", text::solve_validity),
    ("regex", text::solve_regex),
    ("geometry", geometry::solve_geometry),
    ("formula", text::solve_formula),
];

/// Run the fixed solver order; first hit wins.
pub fn try_solve(prompt: &str) -> Option<SolverAnswer> {
    for (name, solver) in SOLVERS {
        if let Some(answer) = solver(prompt) {
            return Some(SolverAnswer {
                response: wrap_result(&answer),
                model: MODEL_LOCAL_MATH,
                solver: name,
            });
        }
    }
    if let Some(answer) = riddles::solve_riddle(prompt) {
        return Some(SolverAnswer {
            response: wrap_result(&answer),
            model: MODEL_LOCAL_INSTANT,
            solver: "riddle",
        });
    }
    if let Some(answer) = riddles::instant_conversation(prompt) {
        return Some(SolverAnswer {
            response: wrap_result(answer),
            model: MODEL_LOCAL_INSTANT,
            solver: "greeting",
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_shared::envelope;

    #[test]
    fn test_first_hit_short_circuits() {
        // Arithmetic wins before anything else sees the prompt.
        let answer = try_solve("28 - 4 + 2").unwrap();
        assert_eq!(answer.solver, "arithmetic");
        assert_eq!(answer.model, MODEL_LOCAL_MATH);
        assert!(answer.response.contains("Result\n- 28-4+2 = 26"));
    }

    #[test]
    fn test_every_answer_is_enveloped() {
        for prompt in [
            "28 - 4 + 2",
            "what is 20% of 150",
            "10 km to mi",
            "2x+3=11",
            "mean of [1, 2, 3]",
            "union of [a] and [b]",
            "sort [3, 1, 2]",
            "reverse \"abc\"",
            "is a@b.co a valid email",
            "does /a+/ match \"aaa\"",
            "area of a circle with radius 1",
            "=UPPER(\"hi\")",
            "what has keys but can't open locks",
            "hi",
        ] {
            let answer = try_solve(prompt)
                .unwrap_or_else(|| panic!("no solver hit for {:?}", prompt));
            assert!(
                envelope::is_well_formed(&answer.response),
                "bad envelope for {:?}: {}",
                prompt,
                answer.response
            );
        }
    }

    #[test]
    fn test_greeting_uses_instant_model() {
        let answer = try_solve("hi").unwrap();
        assert_eq!(answer.model, MODEL_LOCAL_INSTANT);
        assert_eq!(answer.solver, "greeting");
        assert!(answer.response.contains("Result\n- Hi!"));
    }

    #[test]
    fn test_no_hit_for_open_questions() {
        assert!(try_solve("explain the borrow checker").is_none());
        assert!(try_solve("write a poem about autumn").is_none());
    }
}
