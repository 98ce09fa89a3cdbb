//! Out-of-process code sandboxes.
//!
//! Safe mode rejects dangerous code statically before anything spawns.
//! Children read the program from stdin, run under a hard kill timer, and
//! get SIGKILL on timeout (12 s for the scripting runner, 2 s for JS/TS).

use super::ToolError;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Input programs are bounded.
pub const MAX_CODE_CHARS: usize = 12_000;
/// Scripting-runner wall clock.
pub const PYTHON_TIMEOUT: Duration = Duration::from_secs(12);
/// JS/TS wall clock.
pub const JS_TIMEOUT: Duration = Duration::from_secs(2);

/// Denylisted fragments for the scripting sandbox in safe mode.
const PYTHON_DENYLIST: &[&str] = &[
    "import os",
    "import sys",
    "import subprocess",
    "import shutil",
    "import socket",
    "import pathlib",
    "import ctypes",
    "import importlib",
    "from os",
    "from sys",
    "from subprocess",
    "__import__",
    "open(",
    "exec(",
    "eval(",
    "compile(",
    "globals(",
    "breakpoint(",
];

/// Denylisted fragments for the JS/TS sandbox in safe mode.
const JS_DENYLIST: &[&str] = &[
    "require(",
    "process.",
    "child_process",
    "import(",
    "import ",
    "fs.",
    "eval(",
    "Function(",
    "fetch(",
    "XMLHttpRequest",
    "globalThis.process",
];

/// Sandbox verdict on a program before execution.
pub fn check_python(code: &str) -> Result<(), ToolError> {
    check_against(code, PYTHON_DENYLIST)
}

pub fn check_js(code: &str) -> Result<(), ToolError> {
    check_against(code, JS_DENYLIST)
}

fn check_against(code: &str, denylist: &[&str]) -> Result<(), ToolError> {
    if code.len() > MAX_CODE_CHARS {
        return Err(ToolError::SandboxError(format!(
            "program too large ({} chars, max {})",
            code.len(),
            MAX_CODE_CHARS
        )));
    }
    let lowered = code.to_lowercase();
    for needle in denylist {
        if lowered.contains(&needle.to_lowercase()) {
            warn!("sandbox: denylist hit: {}", needle);
            return Err(ToolError::UnsafeCode(needle.to_string()));
        }
    }
    Ok(())
}

/// Output of a sandbox run.
#[derive(Debug, Clone)]
pub struct SandboxOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

async fn run_with_stdin(
    mut cmd: Command,
    code: &str,
    timeout: Duration,
) -> Result<SandboxOutput, ToolError> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| ToolError::SandboxError(format!("spawn failed: {}", e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(code.as_bytes())
            .await
            .map_err(|e| ToolError::SandboxError(format!("stdin write failed: {}", e)))?;
        drop(stdin);
    }

    let waited = tokio::time::timeout(timeout, child.wait_with_output()).await;
    match waited {
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
            let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
            debug!("sandbox exit: {:?}", output.status.code());
            Ok(SandboxOutput { stdout, stderr, success: output.status.success() })
        }
        Ok(Err(e)) => Err(ToolError::SandboxError(e.to_string())),
        Err(_) => {
            // kill_on_drop reaps the child after the hard timer.
            Err(ToolError::Timeout)
        }
    }
}

/// Run a scripting-language program. Safe-mode check is the caller's
/// responsibility so explicit unsafe runs stay possible for trusted paths.
pub async fn run_python(code: &str, safe_mode: bool) -> Result<SandboxOutput, ToolError> {
    if safe_mode {
        check_python(code)?;
    }
    // -I: isolated mode, no site packages, no env injection.
    let mut cmd = Command::new("python3");
    cmd.arg("-I").arg("-");
    run_with_stdin(cmd, code, PYTHON_TIMEOUT).await
}

/// Run a JS/TS program under node with the short timeout.
pub async fn run_js(code: &str, safe_mode: bool) -> Result<SandboxOutput, ToolError> {
    if safe_mode {
        check_js(code)?;
    }
    let mut cmd = Command::new("node");
    cmd.arg("-");
    run_with_stdin(cmd, code, JS_TIMEOUT).await
}

/// Evaluate a symbolic-math expression through the sympy runner. The
/// expression is sanitized to a closed character class; the wrapper import
/// is ours, not user code.
pub async fn run_sympy(expression: &str) -> Result<SandboxOutput, ToolError> {
    let ok = expression
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || " +-*/^().,_='".contains(c));
    if !ok || expression.len() > 500 {
        return Err(ToolError::UnsafeCode("sympy expression".to_string()));
    }
    let program = format!(
        "import sympy\nfrom sympy.parsing.sympy_parser import parse_expr\nprint(sympy.simplify(parse_expr({:?})))",
        expression
    );
    let mut cmd = Command::new("python3");
    cmd.arg("-I").arg("-");
    run_with_stdin(cmd, &program, PYTHON_TIMEOUT).await
}

/// Syntax-check a program without running it.
pub async fn analyze_python(code: &str) -> Result<SandboxOutput, ToolError> {
    check_python(code)?;
    let program = format!(
        "import ast\ntry:\n    ast.parse({:?})\n    print('syntax ok')\nexcept SyntaxError as e:\n    print(f'syntax error: {{e}}')",
        code
    );
    let mut cmd = Command::new("python3");
    cmd.arg("-I").arg("-");
    run_with_stdin(cmd, &program, PYTHON_TIMEOUT).await
}
