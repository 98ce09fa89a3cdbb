//! Generation supervisor.
//!
//! Streams tokens from the selected model while a concurrent phase emitter
//! paints reasoning banners. One recoverable failure (memory-pressure
//! sentinel or per-attempt deadline) triggers a deterministic fallback
//! model; a second failure is terminal. Retry events invalidate previously
//! streamed tokens for the request.

use crate::ollama::{is_memory_error, BackendClient, GenOptions, TokenChunk};
use relay_shared::events::{ReasoningPhase, StreamEvent};
use relay_shared::intent::{Complexity, Intent};
use relay_shared::models::{attempt_deadline, fallback_model};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Delay between phase banners. Cosmetic; never blocks token delivery.
const PHASE_DELAY: Duration = Duration::from_millis(100);

/// Event sink shared by the WS handler (live) and the HTTP handler
/// (collected). Send failures mean the client is gone and are ignored.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl EventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: StreamEvent) {
        let _ = self.tx.send(event);
    }
}

/// Terminal failure from the supervisor.
#[derive(Debug)]
pub enum GenError {
    Cancelled,
    Timeout,
    Backend(String),
}

impl GenError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
            Self::Backend(_) => "backend_error",
        }
    }
}

impl std::fmt::Display for GenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "request cancelled"),
            Self::Timeout => write!(f, "generation deadline elapsed"),
            Self::Backend(body) => write!(f, "backend error: {}", body),
        }
    }
}

/// Successful outcome: final text plus the model that produced it.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub text: String,
    pub model: String,
    /// Set when the answer came from the fallback model.
    pub fell_back: bool,
}

/// Phase sequence for an intent. Math collapses to one or two phases when
/// the prompt is simple; open questions get the full ladder.
pub fn phase_sequence(intent: Intent, complexity: Complexity, web: bool) -> Vec<ReasoningPhase> {
    use ReasoningPhase::*;
    if intent == Intent::MathReasoning {
        return match complexity {
            Complexity::Low => vec![Reasoning],
            Complexity::Medium => vec![Understanding, Reasoning],
            _ => vec![Understanding, Planning, Reasoning, Generating],
        };
    }
    if intent == Intent::SimpleQa {
        return vec![Understanding];
    }
    let mut phases = vec![Understanding, Planning];
    if web {
        phases.push(Research);
    }
    phases.push(Reasoning);
    phases.push(Generating);
    phases
}

/// Spawn the cosmetic phase emitter. Aborted by the caller when the
/// attempt resolves.
fn spawn_phase_emitter(
    phases: Vec<ReasoningPhase>,
    sink: EventSink,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        for phase in phases {
            sink.emit(StreamEvent::ReasoningPhase { phase });
            tokio::time::sleep(PHASE_DELAY).await;
        }
    })
}

enum AttemptOutcome {
    Done(String),
    Retry(&'static str),
    Fatal(GenError),
}

async fn run_attempt(
    backend: &BackendClient,
    model: &str,
    system: &str,
    prompt: &str,
    options: &GenOptions,
    deadline: Option<Duration>,
    cancel: &mut watch::Receiver<bool>,
    sink: &EventSink,
    buffer: &mut String,
) -> AttemptOutcome {
    let mut rx = backend.generate_stream(model, Some(system), prompt, options);

    let sleeper = async {
        match deadline {
            Some(d) => tokio::time::sleep(d).await,
            // The reasoning model runs without a deadline.
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(sleeper);

    loop {
        tokio::select! {
            chunk = rx.recv() => match chunk {
                Some(TokenChunk::Token(token)) => {
                    buffer.push_str(&token);
                    sink.emit(StreamEvent::Token { token });
                }
                Some(TokenChunk::Done) => {
                    return AttemptOutcome::Done(std::mem::take(buffer));
                }
                Some(TokenChunk::Failed(body)) => {
                    return if is_memory_error(&body) {
                        AttemptOutcome::Retry("insufficient_memory")
                    } else {
                        AttemptOutcome::Fatal(GenError::Backend(body))
                    };
                }
                None => {
                    return AttemptOutcome::Fatal(GenError::Backend("stream closed".into()));
                }
            },
            changed = cancel.changed() => {
                // A dropped handle reads as cancellation too.
                if changed.is_err() || *cancel.borrow() {
                    return AttemptOutcome::Fatal(GenError::Cancelled);
                }
            }
            _ = &mut sleeper => {
                warn!("attempt deadline elapsed for {}", model);
                return AttemptOutcome::Retry("timeout");
            }
        }
    }
}

/// Drive generation with at most one fallback retry.
#[allow(clippy::too_many_arguments)]
pub async fn generate_supervised(
    backend: &BackendClient,
    model: &str,
    system: &str,
    prompt: &str,
    options: &GenOptions,
    intent: Intent,
    complexity: Complexity,
    web: bool,
    default_timeout: Duration,
    sink: &EventSink,
    cancel: &mut watch::Receiver<bool>,
) -> Result<GenerationOutcome, GenError> {
    let phases = phase_sequence(intent, complexity, web);
    let phase_task = spawn_phase_emitter(phases, sink.clone());

    let mut current_model = model.to_string();
    let mut buffer = String::new();
    let mut retried = false;

    let result = loop {
        let deadline = attempt_deadline(&current_model, default_timeout);
        let outcome = run_attempt(
            backend,
            &current_model,
            system,
            prompt,
            options,
            deadline,
            cancel,
            sink,
            &mut buffer,
        )
        .await;

        match outcome {
            AttemptOutcome::Done(text) => {
                if retried {
                    sink.emit(StreamEvent::ModelRetryDone { model: current_model.clone() });
                }
                break Ok(GenerationOutcome {
                    text,
                    model: current_model.clone(),
                    fell_back: retried,
                });
            }
            AttemptOutcome::Retry(reason) => {
                if retried {
                    // Second failure in the same request is terminal.
                    sink.emit(StreamEvent::ModelRetryFailed { reason: reason.to_string() });
                    break Err(GenError::Timeout);
                }
                let next = fallback_model(intent, complexity, &current_model);
                info!("falling back {} -> {} ({})", current_model, next, reason);
                sink.emit(StreamEvent::ModelFallback {
                    from: current_model.clone(),
                    to: next.clone(),
                    reason: reason.to_string(),
                });
                sink.emit(StreamEvent::ModelRetryStart {
                    model: next.clone(),
                    reason: reason.to_string(),
                });
                // The retry event invalidates everything streamed so far.
                buffer.clear();
                current_model = next;
                retried = true;
            }
            AttemptOutcome::Fatal(e) => break Err(e),
        }
    };

    phase_task.abort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_sequences() {
        use ReasoningPhase::*;
        assert_eq!(
            phase_sequence(Intent::MathReasoning, Complexity::Low, false),
            vec![Reasoning]
        );
        assert_eq!(
            phase_sequence(Intent::MathReasoning, Complexity::Medium, false),
            vec![Understanding, Reasoning]
        );
        assert_eq!(phase_sequence(Intent::SimpleQa, Complexity::Low, false), vec![Understanding]);
        assert_eq!(
            phase_sequence(Intent::WorldKnowledge, Complexity::Medium, true),
            vec![Understanding, Planning, Research, Reasoning, Generating]
        );
        assert_eq!(
            phase_sequence(Intent::CodeTask, Complexity::High, false),
            vec![Understanding, Planning, Reasoning, Generating]
        );
    }

    #[test]
    fn test_gen_error_kinds() {
        assert_eq!(GenError::Cancelled.kind(), "cancelled");
        assert_eq!(GenError::Timeout.kind(), "timeout");
        assert_eq!(GenError::Backend("x".into()).kind(), "backend_error");
    }

    #[tokio::test]
    async fn test_event_sink_collects() {
        let (sink, mut rx) = EventSink::new();
        sink.emit(StreamEvent::Token { token: "a".into() });
        sink.emit(StreamEvent::Token { token: "b".into() });
        drop(sink);
        let mut tokens = String::new();
        while let Some(ev) = rx.recv().await {
            if let StreamEvent::Token { token } = ev {
                tokens.push_str(&token);
            }
        }
        assert_eq!(tokens, "ab");
    }
}
