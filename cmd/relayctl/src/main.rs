//! relayctl: control CLI for the relay daemon.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use owo_colors::OwoColorize;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser)]
#[command(name = "relayctl", about = "CLI for the relay daemon")]
struct Cli {
    /// Daemon base URL
    #[arg(long, default_value = "http://127.0.0.1:7070")]
    url: String,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Daemon health and backend reachability
    Health,
    /// Ask a question over the blocking endpoint
    Ask {
        prompt: Vec<String>,
        /// Route task override (chat, reason, code, ...)
        #[arg(long)]
        task: Option<String>,
        /// Prefer the fast model
        #[arg(long)]
        fast: bool,
        /// Allow web grounding
        #[arg(long)]
        web: bool,
        #[arg(long, default_value = "cli")]
        user: String,
    },
    /// Stream a question over the WebSocket and print tokens live
    Stream {
        prompt: Vec<String>,
        #[arg(long, default_value = "cli")]
        user: String,
    },
    /// Cancel an in-flight request
    Cancel { request_id: String },
    /// Export conversation history for a user
    Export {
        user: String,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Model and cache statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Health => health(&cli.url).await,
        Cmd::Ask { prompt, task, fast, web, user } => {
            ask(&cli.url, &prompt.join(" "), task, fast, web, &user).await
        }
        Cmd::Stream { prompt, user } => stream(&cli.url, &prompt.join(" "), &user).await,
        Cmd::Cancel { request_id } => cancel(&cli.url, &request_id).await,
        Cmd::Export { user, format } => export(&cli.url, &user, &format).await,
        Cmd::Stats => stats(&cli.url).await,
    }
}

async fn health(url: &str) -> Result<()> {
    let body: Value = reqwest::get(format!("{}/health", url))
        .await
        .context("daemon unreachable")?
        .json()
        .await?;
    let ok = body["status"] == "ok";
    let backend = body["backend_reachable"].as_bool().unwrap_or(false);
    println!(
        "{} relayd {} (up {}s)",
        if ok { "●".green().to_string() } else { "●".red().to_string() },
        body["version"].as_str().unwrap_or("?"),
        body["uptime_seconds"].as_u64().unwrap_or(0)
    );
    println!(
        "  backend: {}",
        if backend { "reachable".green().to_string() } else { "unreachable".red().to_string() }
    );
    Ok(())
}

async fn ask(
    url: &str,
    prompt: &str,
    task: Option<String>,
    fast: bool,
    web: bool,
    user: &str,
) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(anyhow!("empty prompt"));
    }
    let client = reqwest::Client::new();
    let body = json!({
        "prompt": prompt,
        "task": task,
        "fast": fast,
        "autoWeb": web,
        "userId": user,
    });
    let response: Value = client
        .post(format!("{}/api/auto", url))
        .json(&body)
        .send()
        .await
        .context("daemon unreachable")?
        .json()
        .await?;

    if let Some(error) = response.get("error").and_then(|e| e.as_str()) {
        println!("{} {}", "error:".red(), error);
        if let Some(message) = response.get("message").and_then(|m| m.as_str()) {
            println!("  {}", message);
        }
        return Ok(());
    }

    println!("{}", response["response"].as_str().unwrap_or(""));
    let meta = &response["meta"];
    println!(
        "\n{} model={} route={} {}ms{}",
        "--".dimmed(),
        meta["model"].as_str().unwrap_or("?").cyan(),
        meta["route"].as_str().unwrap_or("?"),
        meta["duration_ms"].as_u64().unwrap_or(0),
        if meta["cache_hit"].as_bool().unwrap_or(false) { " (cached)" } else { "" }
    );
    Ok(())
}

async fn stream(url: &str, prompt: &str, user: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(anyhow!("empty prompt"));
    }
    let ws_url = url.replacen("http", "ws", 1) + "/ws";
    let (socket, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .context("websocket connect failed")?;
    let (mut tx, mut rx) = socket.split();

    let request_id = uuid::Uuid::new_v4().to_string();
    let payload = json!({
        "prompt": prompt,
        "userId": user,
        "requestId": request_id,
    });
    tx.send(Message::Text(payload.to_string())).await?;
    eprintln!("{} {}", "request".dimmed(), request_id.dimmed());

    while let Some(frame) = rx.next().await {
        let Ok(Message::Text(text)) = frame else { continue };
        let event: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(_) => continue,
        };
        match event["type"].as_str().unwrap_or("") {
            "intent_classification" => {
                eprintln!(
                    "{} {} ({})",
                    "intent".dimmed(),
                    event["intent"].as_str().unwrap_or("?").cyan(),
                    event["confidence"].as_str().unwrap_or("?")
                );
            }
            "reasoning_phase" => {
                eprintln!("{} {}", "phase".dimmed(), event["phase"].as_str().unwrap_or("?"));
            }
            "web_search_results" => {
                let n = event["results"].as_array().map(|a| a.len()).unwrap_or(0);
                eprintln!("{} {} sources", "web".dimmed(), n);
            }
            "token" => {
                print!("{}", event["token"].as_str().unwrap_or(""));
                use std::io::Write;
                let _ = std::io::stdout().flush();
            }
            "model_retry_start" => {
                eprintln!(
                    "\n{} retrying on {} ({})",
                    "!".yellow(),
                    event["model"].as_str().unwrap_or("?"),
                    event["reason"].as_str().unwrap_or("?")
                );
                // Previously streamed tokens are superseded.
            }
            "model_retry_done" => {
                eprintln!("{} retry ok", "!".yellow());
            }
            "done" => {
                let meta = &event["meta"];
                eprintln!(
                    "\n{} model={} {}ms",
                    "--".dimmed(),
                    meta["model"].as_str().unwrap_or("?").cyan(),
                    meta["duration_ms"].as_u64().unwrap_or(0)
                );
                break;
            }
            "error" => {
                eprintln!(
                    "\n{} {}: {}",
                    "error".red(),
                    event["kind"].as_str().unwrap_or("?"),
                    event["message"].as_str().unwrap_or("")
                );
                break;
            }
            _ => {}
        }
    }
    Ok(())
}

async fn cancel(url: &str, request_id: &str) -> Result<()> {
    let client = reqwest::Client::new();
    let body: Value = client
        .post(format!("{}/api/cancel", url))
        .json(&json!({ "requestId": request_id }))
        .send()
        .await
        .context("daemon unreachable")?
        .json()
        .await?;
    println!("{}", body["status"].as_str().unwrap_or("?"));
    Ok(())
}

async fn export(url: &str, user: &str, format: &str) -> Result<()> {
    let text = reqwest::get(format!("{}/api/memory/export/{}?format={}", url, user, format))
        .await
        .context("daemon unreachable")?
        .text()
        .await?;
    println!("{}", text);
    Ok(())
}

async fn stats(url: &str) -> Result<()> {
    let body: Value = reqwest::get(format!("{}/api/stats", url))
        .await
        .context("daemon unreachable")?
        .json()
        .await?;
    println!("{}", "models:".bold());
    if let Some(models) = body["models"].as_object() {
        for (name, stat) in models {
            println!(
                "  {} calls={} errors={} mean={}ms",
                name.cyan(),
                stat["count"].as_u64().unwrap_or(0),
                stat["errors"].as_u64().unwrap_or(0),
                stat["total_duration_ms"].as_u64().unwrap_or(0)
                    / stat["count"].as_u64().unwrap_or(1).max(1)
            );
        }
    }
    println!(
        "cache entries: {}  memory entries: {}  active: {}",
        body["cacheEntries"].as_u64().unwrap_or(0),
        body["memoryEntries"].as_u64().unwrap_or(0),
        body["activeRequests"].as_u64().unwrap_or(0)
    );
    Ok(())
}
