//! Daemon configuration.
//!
//! Read once from the environment at startup; immutable afterwards.

use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Search engine preference order when SEARCH_API is unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchApi {
    SerpApi,
    Searxng,
    DuckDuckGo,
}

impl SearchApi {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "serpapi" => Some(Self::SerpApi),
            "searxng" => Some(Self::Searxng),
            "duckduckgo" | "ddg" => Some(Self::DuckDuckGo),
            _ => None,
        }
    }
}

/// Immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// LM backend base URL.
    pub ollama_url: String,
    pub ollama_headers_timeout: Duration,
    pub ollama_body_timeout: Duration,
    pub ollama_keep_alive: String,
    /// Per-attempt generation deadline for models that have one.
    pub attempt_timeout: Duration,

    pub search_api: SearchApi,
    pub search_api_key: Option<String>,
    pub searxng_url: String,

    /// Image generator endpoint (A1111-compatible).
    pub a1111_url: String,
    /// Frame tool binary used by the video renderer.
    pub ffmpeg_path: String,

    pub port: u16,
    pub base_url: String,

    /// Data directory for the persisted stores.
    pub data_dir: PathBuf,
    /// Sandbox posture: denylist rejects dangerous code statically.
    pub safe_mode: bool,
    /// Optional SQLite store path for the SQL tool.
    pub sql_store_path: Option<PathBuf>,
    /// Let the small model rewrite short messy prompts for grammar.
    pub grammar_aux: bool,
    /// Tool subsystem master switch.
    pub tools_enabled: bool,
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_ms(key: &str, default_ms: u64) -> Duration {
    let ms = std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}

impl Config {
    /// Load from environment. Never fails; every knob has a default.
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(7070);

        let search_api = std::env::var("SEARCH_API")
            .ok()
            .and_then(|v| SearchApi::parse(&v))
            .unwrap_or(SearchApi::SerpApi);

        let config = Self {
            ollama_url: env_str("OLLAMA_URL", "http://127.0.0.1:11434"),
            ollama_headers_timeout: env_ms("OLLAMA_HEADERS_TIMEOUT_MS", 10_000),
            ollama_body_timeout: env_ms("OLLAMA_BODY_TIMEOUT_MS", 300_000),
            ollama_keep_alive: env_str("OLLAMA_KEEP_ALIVE", "5m"),
            attempt_timeout: Duration::from_secs(
                relay_shared::models::DEFAULT_ATTEMPT_TIMEOUT_SECS,
            ),
            search_api,
            search_api_key: std::env::var("SEARCH_API_KEY").ok(),
            searxng_url: env_str("SEARXNG_URL", "http://127.0.0.1:8888"),
            a1111_url: env_str("A1111_URL", "http://127.0.0.1:7860"),
            ffmpeg_path: env_str("FFMPEG_PATH", "ffmpeg"),
            port,
            base_url: env_str("BASE_URL", &format!("http://127.0.0.1:{}", port)),
            data_dir: PathBuf::from(env_str("RELAY_DATA_DIR", "./data")),
            safe_mode: env_str("RELAY_SAFE_MODE", "1") != "0",
            sql_store_path: std::env::var("RELAY_SQL_STORE").ok().map(PathBuf::from),
            grammar_aux: env_str("RELAY_GRAMMAR_AUX", "0") == "1",
            tools_enabled: env_str("RELAY_TOOLS", "1") != "0",
        };

        info!(
            "config: backend={} port={} data_dir={} safe_mode={}",
            config.ollama_url,
            config.port,
            config.data_dir.display(),
            config.safe_mode
        );

        config
    }

    /// Path of a named store file inside the data directory.
    pub fn store_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    /// Directory for generated image/video artifacts.
    pub fn outputs_dir(&self) -> PathBuf {
        self.data_dir.join("outputs")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
