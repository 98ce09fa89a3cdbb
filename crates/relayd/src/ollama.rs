//! LM backend client (Ollama wire protocol).
//!
//! Three operations: blocking generate, NDJSON streamed generate, and
//! embeddings. The streamed variant hands tokens over an mpsc channel so
//! the generation supervisor can interleave phases, deadlines, and cancel.

use crate::config::Config;
use anyhow::{Context, Result};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Embedding model used for the semantic cache and the embedding index.
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Sampling options forwarded to the backend.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(rename = "num_predict", skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<&'a str>,
    options: &'a GenOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// One message from the streamed generation task.
#[derive(Debug)]
pub enum TokenChunk {
    Token(String),
    Done,
    /// Backend failure with the raw error body.
    Failed(String),
}

/// Whether a backend error body indicates memory pressure. This sentinel
/// triggers the deterministic model fallback instead of a user error.
pub fn is_memory_error(body: &str) -> bool {
    let b = body.to_lowercase();
    b.contains("not enough memory")
        || b.contains("out of memory")
        || b.contains("insufficient memory")
        || b.contains("requires more system memory")
}

/// Ollama-protocol backend client.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    keep_alive: String,
}

impl BackendClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(config.ollama_headers_timeout)
            .timeout(config.ollama_body_timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: config.ollama_url.clone(),
            keep_alive: config.ollama_keep_alive.clone(),
        }
    }

    /// Ping the backend's model listing.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        self.http
            .get(&url)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Blocking generation: full response text in one call.
    pub async fn generate(
        &self,
        model: &str,
        system: Option<&str>,
        prompt: &str,
        options: &GenOptions,
    ) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model,
            prompt,
            system,
            stream: false,
            keep_alive: Some(&self.keep_alive),
            options,
        };

        info!("[>] generate [{}] ({} chars)", model, prompt.len());

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("failed to reach LM backend")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("backend returned {}: {}", status, body);
        }

        let chunk: GenerateChunk = response
            .json()
            .await
            .context("failed to parse backend response")?;
        if let Some(err) = chunk.error {
            anyhow::bail!("backend error: {}", err);
        }

        debug!("[<] generate [{}] -> {} chars", model, chunk.response.len());
        Ok(chunk.response)
    }

    /// Streamed generation. Tokens arrive on the returned channel; the
    /// reader task exits when the receiver is dropped, which aborts the
    /// in-flight HTTP request (cooperative cancel).
    pub fn generate_stream(
        &self,
        model: &str,
        system: Option<&str>,
        prompt: &str,
        options: &GenOptions,
    ) -> mpsc::Receiver<TokenChunk> {
        let (tx, rx) = mpsc::channel(64);
        let http = self.http.clone();
        let url = format!("{}/api/generate", self.base_url);
        let body = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "system": system,
            "stream": true,
            "keep_alive": self.keep_alive,
            "options": options,
        });
        let model = model.to_string();

        tokio::spawn(async move {
            info!("[>] stream [{}]", model);
            let response = match http.post(&url).json(&body).send().await {
                Ok(r) => r,
                Err(e) => {
                    let _ = tx.send(TokenChunk::Failed(e.to_string())).await;
                    return;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!("[-] stream [{}] {}: {}", model, status, body);
                let _ = tx.send(TokenChunk::Failed(body)).await;
                return;
            }

            let mut stream = response.bytes_stream();
            let mut buf = Vec::new();
            while let Some(item) = stream.next().await {
                let bytes = match item {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx.send(TokenChunk::Failed(e.to_string())).await;
                        return;
                    }
                };
                buf.extend_from_slice(&bytes);

                // NDJSON: one chunk per line.
                while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line);
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<GenerateChunk>(line) {
                        Ok(chunk) => {
                            if let Some(err) = chunk.error {
                                let _ = tx.send(TokenChunk::Failed(err)).await;
                                return;
                            }
                            if !chunk.response.is_empty()
                                && tx.send(TokenChunk::Token(chunk.response)).await.is_err()
                            {
                                // Receiver gone: request was cancelled.
                                return;
                            }
                            if chunk.done {
                                let _ = tx.send(TokenChunk::Done).await;
                                return;
                            }
                        }
                        Err(e) => debug!("skipping unparsable stream line: {}", e),
                    }
                }
            }
            // Stream ended without a done marker.
            let _ = tx.send(TokenChunk::Failed("stream ended early".to_string())).await;
        });

        rx
    }

    /// Embedding for a text. Empty input short-circuits to an empty vector.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbeddingRequest { model: EMBED_MODEL, prompt: text };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("failed to reach embedding backend")?;

        if !response.status().is_success() {
            let status = response.status();
            anyhow::bail!("embedding backend returned {}", status);
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .context("failed to parse embedding response")?;
        Ok(parsed.embedding)
    }
}
