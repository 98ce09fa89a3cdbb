//! Tool chaining: an ordered list of steps feeding one final LM pass.
//!
//! Steps run sequentially; a failing step records its error string in the
//! result and the chain keeps going, so later steps and the synthesis pass
//! see what happened.

use super::{run_tool, Tool, ToolArgs, ToolContext};
use crate::ollama::GenOptions;
use relay_shared::models::MODEL_CHAT;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct ChainStep {
    pub name: String,
    #[serde(default)]
    pub args: ToolArgs,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub tool: String,
    pub ok: bool,
    pub output: String,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct ChainResult {
    pub steps: Vec<StepResult>,
    /// Final synthesis from the LM over the aggregate context.
    pub answer: String,
}

/// Execute a chain and synthesize a final answer.
pub async fn run_chain(
    steps: &[ChainStep],
    prompt: &str,
    ctx: &ToolContext,
) -> ChainResult {
    let mut results = Vec::with_capacity(steps.len());
    let mut context_block = String::new();

    for step in steps {
        let started = Instant::now();
        let (ok, output) = match Tool::parse(&step.name) {
            None => (false, format!("unknown tool: {}", step.name)),
            Some(tool) => match run_tool(tool, &step.args, ctx).await {
                Ok(out) => (true, out),
                Err(e) => (false, e.to_string()),
            },
        };
        let duration_ms = started.elapsed().as_millis() as u64;
        info!("chain step {} -> ok={} ({} ms)", step.name, ok, duration_ms);

        context_block.push_str(&format!(
            "## {} ({})\n{}\n\n",
            step.name,
            if ok { "ok" } else { "error" },
            output
        ));
        results.push(StepResult { tool: step.name.clone(), ok, output, duration_ms });
    }

    let synthesis_prompt = format!(
        "Tool results:\n\n{}\nUsing only the results above, answer: {}",
        context_block, prompt
    );
    let answer = ctx
        .backend
        .generate(
            MODEL_CHAT,
            Some("You synthesize tool outputs into one direct answer."),
            &synthesis_prompt,
            &GenOptions::default(),
        )
        .await
        .unwrap_or_else(|e| format!("synthesis failed: {}", e));

    ChainResult { steps: results, answer }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_step_deserialization() {
        let raw = r#"[{"name": "python", "args": {"code": "print(1)"}}, {"name": "search", "args": {"query": "rust"}}]"#;
        let steps: Vec<ChainStep> = serde_json::from_str(raw).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].name, "python");
        assert_eq!(steps[1].args.query.as_deref(), Some("rust"));
    }

    #[test]
    fn test_chain_step_defaults_args() {
        let raw = r#"[{"name": "sql_schema"}]"#;
        let steps: Vec<ChainStep> = serde_json::from_str(raw).unwrap();
        assert!(steps[0].args.query.is_none());
    }
}
