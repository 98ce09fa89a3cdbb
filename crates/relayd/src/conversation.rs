//! Per-user conversation memory.
//!
//! Ring buffer bounded at 15 messages per user. A user message is appended
//! before its reply is generated; the assistant reply is appended once, on
//! successful completion. Every 8 new messages the tracker emits a summary
//! request toward the durable memory store.

use chrono::{DateTime, Utc};
use relay_shared::Intent;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Messages kept per user.
pub const RING_SIZE: usize = 15;
/// A summary entry is emitted every this many new messages.
pub const SUMMARY_EVERY: usize = 8;
/// Turns included in assembled context.
pub const CONTEXT_TURNS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Classified intent, user messages only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    /// Prompt quality score, user messages only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<f32>,
    /// Language of an attached code block, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_language: Option<String>,
}

#[derive(Debug, Default)]
struct UserThread {
    messages: Vec<ConversationMessage>,
    /// Messages appended since the last summary emission.
    since_summary: usize,
}

/// Conversation tracker across users. Owned state; the daemon serializes
/// access behind its lock.
#[derive(Debug, Default)]
pub struct ConversationMemory {
    threads: HashMap<String, UserThread>,
}

/// Vague follow-up markers that reopen the previous turn.
const FOLLOW_UP_MARKERS: &[&str] = &[
    "what about",
    "and that",
    "why",
    "how come",
    "really",
    "are you sure",
    "explain",
    "more",
    "again",
    "it",
    "that one",
    "the same",
    "this",
];

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user message. Timestamps are clamped monotone per user.
    pub fn push_user(
        &mut self,
        user_id: &str,
        content: &str,
        intent: Option<Intent>,
        quality: Option<f32>,
    ) {
        self.push(
            user_id,
            ConversationMessage {
                role: Role::User,
                content: content.to_string(),
                timestamp: Utc::now(),
                intent,
                quality,
                code_language: detect_code_language(content),
            },
        );
    }

    /// Append the assistant reply. Called once, after successful `done`.
    pub fn push_assistant(&mut self, user_id: &str, content: &str) {
        self.push(
            user_id,
            ConversationMessage {
                role: Role::Assistant,
                content: content.to_string(),
                timestamp: Utc::now(),
                intent: None,
                quality: None,
                code_language: detect_code_language(content),
            },
        );
    }

    fn push(&mut self, user_id: &str, mut msg: ConversationMessage) {
        let thread = self.threads.entry(user_id.to_string()).or_default();
        if let Some(last) = thread.messages.last() {
            if msg.timestamp < last.timestamp {
                msg.timestamp = last.timestamp;
            }
        }
        thread.messages.push(msg);
        thread.since_summary += 1;
        if thread.messages.len() > RING_SIZE {
            let excess = thread.messages.len() - RING_SIZE;
            thread.messages.drain(..excess);
        }
    }

    /// Full history for a user, oldest first.
    pub fn history(&self, user_id: &str) -> Vec<ConversationMessage> {
        self.threads
            .get(user_id)
            .map(|t| t.messages.clone())
            .unwrap_or_default()
    }

    /// Last classified intent for a user, if any.
    pub fn previous_intent(&self, user_id: &str) -> Option<Intent> {
        self.threads
            .get(user_id)?
            .messages
            .iter()
            .rev()
            .find_map(|m| m.intent)
    }

    /// The previous user+assistant turn, used for follow-up expansion.
    pub fn last_turn(&self, user_id: &str) -> Option<(String, String)> {
        let msgs = &self.threads.get(user_id)?.messages;
        let assistant = msgs.iter().rev().find(|m| m.role == Role::Assistant)?;
        let user = msgs
            .iter()
            .rev()
            .find(|m| m.role == Role::User && m.timestamp <= assistant.timestamp)?;
        Some((user.content.clone(), assistant.content.clone()))
    }

    /// Short vague prompts that lean on the prior turn.
    pub fn is_follow_up(&self, user_id: &str, prompt: &str) -> bool {
        if self.last_turn(user_id).is_none() {
            return false;
        }
        let p = prompt.trim().to_lowercase();
        if p.split_whitespace().count() > 6 {
            return false;
        }
        FOLLOW_UP_MARKERS
            .iter()
            .any(|m| p == *m || p.starts_with(&format!("{} ", m)))
    }

    /// Context block from the last CONTEXT_TURNS turns, empty when there
    /// is no history.
    pub fn context_block(&self, user_id: &str) -> String {
        let Some(thread) = self.threads.get(user_id) else {
            return String::new();
        };
        let take = CONTEXT_TURNS * 2;
        let start = thread.messages.len().saturating_sub(take);
        let mut out = String::new();
        for msg in &thread.messages[start..] {
            let who = match msg.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
                Role::System => "System",
            };
            out.push_str(&format!("{}: {}\n", who, msg.content));
        }
        out
    }

    /// True when enough new messages have accumulated for a summary; resets
    /// the counter.
    pub fn take_summary_due(&mut self, user_id: &str) -> bool {
        let Some(thread) = self.threads.get_mut(user_id) else {
            return false;
        };
        if thread.since_summary >= SUMMARY_EVERY {
            thread.since_summary = 0;
            true
        } else {
            false
        }
    }

    /// Text to summarize for the memory store.
    pub fn summary_window(&self, user_id: &str) -> String {
        self.context_block(user_id)
    }

    pub fn clear(&mut self, user_id: &str) -> bool {
        self.threads.remove(user_id).is_some()
    }

    /// Export in one of: text, json, markdown, csv.
    pub fn export(&self, user_id: &str, format: &str) -> Option<String> {
        let history = self.history(user_id);
        match format {
            "json" => serde_json::to_string_pretty(&history).ok(),
            "markdown" => Some(
                history
                    .iter()
                    .map(|m| format!("**{:?}** ({}): {}", m.role, m.timestamp.to_rfc3339(), m.content))
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            ),
            "csv" => {
                let mut out = String::from("role,timestamp,content\n");
                for m in &history {
                    let content = m.content.replace('"', "\"\"");
                    out.push_str(&format!(
                        "{:?},{},\"{}\"\n",
                        m.role,
                        m.timestamp.to_rfc3339(),
                        content
                    ));
                }
                Some(out)
            }
            "text" => Some(
                history
                    .iter()
                    .map(|m| format!("{:?}: {}", m.role, m.content))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => None,
        }
    }
}

/// First fenced code block language, if any.
fn detect_code_language(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let rest = &text[start + 3..];
    let line_end = rest.find('\n')?;
    let lang = rest[..line_end].trim();
    if lang.is_empty() || !lang.chars().all(|c| c.is_ascii_alphanumeric()) {
        None
    } else {
        Some(lang.to_lowercase())
    }
}
