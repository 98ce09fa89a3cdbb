//! Shared types and pure logic for the relay request router.
//!
//! Everything here is serde-serializable and side-effect free; the daemon
//! owns all I/O.

pub mod envelope;
pub mod events;
pub mod formatter;
pub mod intent;
pub mod memory;
pub mod models;
pub mod route;

pub use envelope::{wrap_result, wrap_with_thinking, THINKING_OMITTED};
pub use events::{DoneMeta, ReasoningPhase, StreamEvent, WebSource};
pub use formatter::{format_response, html_escape, FormattedResponse, ResponseFormat};
pub use intent::{ClassifyContext, Complexity, Confidence, Intent, IntentVerdict, PromptShape};
pub use memory::{cosine_similarity, extract_keywords, keyword_overlap, MemoryEntry, MemoryMeta};
pub use route::{PromptId, Route, Task};
