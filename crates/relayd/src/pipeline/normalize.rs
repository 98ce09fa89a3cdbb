//! Prompt normalization and trigger detection.
//!
//! Trims, applies a small spelling table, and spots the early triggers:
//! memory-save phrases, explicit tool commands, and vague follow-ups.

/// Common misspellings corrected before classification. The raw prompt is
/// preserved on the request next to the normalized form.
const SPELLING_TABLE: &[(&str, &str)] = &[
    ("teh", "the"),
    ("wat", "what"),
    ("wich", "which"),
    ("recieve", "receive"),
    ("seperate", "separate"),
    ("definately", "definitely"),
    ("occured", "occurred"),
    ("untill", "until"),
    ("calender", "calendar"),
    ("wierd", "weird"),
    ("lenght", "length"),
    ("heigth", "height"),
];

/// Phrases that flag a memory save.
const MEMORY_SAVE_TRIGGERS: &[&str] = &[
    "remember this",
    "remember that",
    "save this to memory",
    "save to memory",
    "note that",
    "keep in mind that",
    "store this",
];

/// Trim and fix word-level misspellings, preserving everything else.
pub fn normalize(prompt: &str) -> String {
    let trimmed = prompt.trim();
    let mut out = String::with_capacity(trimmed.len());
    let mut first = true;
    for word in trimmed.split(' ') {
        if !first {
            out.push(' ');
        }
        first = false;
        let lowered = word.to_lowercase();
        let bare = lowered.trim_end_matches(['?', '!', '.', ',']);
        match SPELLING_TABLE.iter().find(|(wrong, _)| *wrong == bare) {
            Some((_, fixed)) => {
                out.push_str(fixed);
                out.push_str(&lowered[bare.len()..]);
            }
            None => out.push_str(word),
        }
    }
    out
}

/// Memory-save trigger; returns the content after the trigger phrase.
pub fn memory_save_request(prompt: &str) -> Option<String> {
    let p = prompt.to_lowercase();
    for trigger in MEMORY_SAVE_TRIGGERS {
        if let Some(pos) = p.find(trigger) {
            let content = prompt[pos + trigger.len()..]
                .trim_start_matches([':', ',', ' '])
                .trim();
            let content = if content.is_empty() { prompt.trim() } else { content };
            return Some(content.to_string());
        }
    }
    None
}
