//! Canonical riddle answers and the instant conversation table.

/// Riddle table: substring match on the normalized prompt.
const RIDDLES: &[(&[&str], &str)] = &[
    (&["keys", "can't open", "locks"], "A piano."),
    (&["keys", "cannot open", "locks"], "A piano."),
    (&["gets wetter", "dries"], "A towel."),
    (&["the more you take", "the more you leave behind"], "Footsteps."),
    (&["speak without a mouth", "hear without ears"], "An echo."),
    (&["has a neck", "no head"], "A bottle."),
    (&["full of holes", "holds water"], "A sponge."),
    (&["goes up", "never comes down"], "Your age."),
    (&["has hands", "can't clap"], "A clock."),
    (&["has an eye", "cannot see"], "A needle."),
    (&["runs", "never walks"], "A river."),
    (&["belongs to you", "others use it more"], "Your name."),
];

/// One-line answers for canonical puzzles; None for everything else.
pub fn solve_riddle(prompt: &str) -> Option<String> {
    let p = prompt.to_lowercase();
    for (needles, answer) in RIDDLES {
        if needles.iter().all(|n| p.contains(n)) {
            return Some(answer.to_string());
        }
    }
    None
}

/// Instant conversational replies. A hit means no model call is made.
pub fn instant_conversation(prompt: &str) -> Option<&'static str> {
    let p = prompt.trim().to_lowercase();
    let p = p.trim_end_matches(['!', '.', '?']).trim();
    match p {
        "hi" | "hello" | "hey" | "yo" | "hiya" => Some("Hi!"),
        "good morning" => Some("Good morning!"),
        "good afternoon" => Some("Good afternoon!"),
        "good evening" => Some("Good evening!"),
        "good night" | "goodnight" => Some("Good night!"),
        "how are you" | "how are you doing" | "how's it going" | "hows it going" => {
            Some("Doing well and ready to help. What do you need?")
        }
        "thanks" | "thank you" | "thx" | "ty" => Some("You're welcome!"),
        "bye" | "goodbye" | "see you" | "cya" => Some("Bye! Come back any time."),
        "ok" | "okay" | "cool" | "nice" | "great" => Some("Anything else I can help with?"),
        "who are you" | "what are you" => {
            Some("A local request router in front of your models.")
        }
        "help" | "what can you do" => {
            Some("Ask questions, run code and SQL, search your files and the web, or save notes to memory.")
        }
        _ => None,
    }
}

/// Trivial-message predicate: anything the conversation table answers.
pub fn trivial_message(prompt: &str) -> bool {
    instant_conversation(prompt).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_riddles() {
        assert_eq!(
            solve_riddle("What has keys but can't open locks?"),
            Some("A piano.".into())
        );
        assert_eq!(
            solve_riddle("what gets wetter the more it dries"),
            Some("A towel.".into())
        );
        assert_eq!(solve_riddle("what is the capital of france"), None);
    }

    #[test]
    fn test_instant_conversation() {
        assert_eq!(instant_conversation("hi"), Some("Hi!"));
        assert_eq!(instant_conversation("  Hello!  "), Some("Hi!"));
        assert_eq!(instant_conversation("THANKS"), Some("You're welcome!"));
        assert_eq!(instant_conversation("explain monads"), None);
    }

    #[test]
    fn test_trivial_predicate() {
        assert!(trivial_message("hey"));
        assert!(!trivial_message("hey can you write me a parser"));
    }
}
