//! Agent run: a planner pass that emits tool steps, then the chain
//! executor over them.

use crate::ollama::GenOptions;
use crate::tools::chain::{run_chain, ChainResult, ChainStep};
use crate::tools::ToolContext;
use anyhow::{Context, Result};
use relay_shared::models::MODEL_REASONING;
use tracing::info;

const PLANNER_SYSTEM: &str = "Plan tool calls for the request. Available tools: python, \
code_execute, code_analysis, summarize, sql, sql_schema, sympy, visualize, ingest, search, \
fetch. Reply with only a JSON array of steps like \
[{\"name\":\"search\",\"args\":{\"query\":\"...\"}}]. Use at most 4 steps.";

/// Extract the planner's JSON array, tolerating prose around it.
fn parse_plan(raw: &str) -> Result<Vec<ChainStep>> {
    let start = raw.find('[').context("planner emitted no JSON array")?;
    let end = raw.rfind(']').context("planner emitted no closing bracket")?;
    let steps: Vec<ChainStep> =
        serde_json::from_str(&raw[start..=end]).context("planner JSON did not parse")?;
    if steps.is_empty() {
        anyhow::bail!("planner produced an empty plan");
    }
    Ok(steps)
}

/// Plan then execute.
pub async fn run(prompt: &str, ctx: &ToolContext) -> Result<ChainResult> {
    let raw = ctx
        .backend
        .generate(MODEL_REASONING, Some(PLANNER_SYSTEM), prompt, &GenOptions::default())
        .await
        .context("planner call failed")?;
    let mut steps = parse_plan(&raw)?;
    steps.truncate(4);
    info!("agent plan: {:?}", steps.iter().map(|s| s.name.clone()).collect::<Vec<_>>());
    Ok(run_chain(&steps, prompt, ctx).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan() {
        let raw = r#"Sure, here is the plan:
[{"name":"search","args":{"query":"rust web frameworks"}},{"name":"summarize","args":{"text":"..."}}]
"#;
        let steps = parse_plan(raw).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].name, "search");
    }

    #[test]
    fn test_parse_plan_rejects_garbage() {
        assert!(parse_plan("no json").is_err());
        assert!(parse_plan("[]").is_err());
    }
}
