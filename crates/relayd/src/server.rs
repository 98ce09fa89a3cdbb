//! HTTP server and shared application state.

use crate::active::ActiveRequests;
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::conversation::ConversationMemory;
use crate::memory::MemoryStore;
use crate::ollama::BackendClient;
use crate::persist::Debouncer;
use crate::reports::ReportTable;
use crate::retrieval::{EmbeddingIndex, KeywordIndex};
use crate::routes;
use crate::stats::ModelStats;
use crate::tools::sql::SqlCache;
use crate::tools::ToolContext;
use crate::web::WebClient;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Application state shared across handlers. Constructed once at startup;
/// no process-wide singletons.
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: BackendClient,
    pub web: WebClient,

    pub cache: Arc<RwLock<ResponseCache>>,
    pub cache_saver: Debouncer,
    pub memory: Arc<RwLock<MemoryStore>>,
    pub memory_saver: Debouncer,
    pub conversation: RwLock<ConversationMemory>,
    pub keyword_index: Arc<RwLock<KeywordIndex>>,
    pub embedding_index: Arc<RwLock<EmbeddingIndex>>,

    pub active: ActiveRequests,
    pub stats: RwLock<ModelStats>,
    pub reports: ReportTable,
    pub sql_cache: Arc<Mutex<SqlCache>>,

    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let backend = BackendClient::new(&config);
        let web = WebClient::new(&config);

        let cache_path = config.store_path("response_cache.json");
        let cache = Arc::new(RwLock::new(ResponseCache::load(&cache_path)));
        let cache_for_saver = cache.clone();
        let cache_saver = Debouncer::spawn(move || {
            let cache = cache_for_saver.clone();
            let path = cache_path.clone();
            async move {
                if let Err(e) = cache.read().await.save(&path) {
                    warn!("cache save failed: {}", e);
                }
            }
        });

        let memory_path = config.store_path("memory.json");
        let memory = Arc::new(RwLock::new(MemoryStore::load(&memory_path)));
        let memory_for_saver = memory.clone();
        let memory_saver = Debouncer::spawn(move || {
            let memory = memory_for_saver.clone();
            let path = memory_path.clone();
            async move {
                if let Err(e) = memory.write().await.save(&path) {
                    warn!("memory save failed: {}", e);
                }
            }
        });

        let keyword_index = Arc::new(RwLock::new(KeywordIndex::load(
            &config.store_path("doc_index.json"),
        )));
        let embedding_index = Arc::new(RwLock::new(EmbeddingIndex::load(
            &config.store_path("embeddings.json"),
        )));

        Self {
            config,
            backend,
            web,
            cache,
            cache_saver,
            memory,
            memory_saver,
            conversation: RwLock::new(ConversationMemory::new()),
            keyword_index,
            embedding_index,
            active: ActiveRequests::new(),
            stats: RwLock::new(ModelStats::new()),
            reports: ReportTable::new(),
            sql_cache: Arc::new(Mutex::new(SqlCache::default())),
            start_time: Instant::now(),
        }
    }

    /// Dependencies handed to the tool dispatcher.
    pub fn tool_context(&self) -> ToolContext {
        ToolContext {
            config: self.config.clone(),
            backend: self.backend.clone(),
            web: self.web.clone(),
            sql_cache: self.sql_cache.clone(),
        }
    }
}

/// Run the HTTP server until shutdown.
pub async fn run(state: AppState) -> Result<()> {
    let port = state.config.port;
    let state = Arc::new(state);

    let app = Router::new()
        .merge(routes::health_routes())
        .merge(routes::auto_routes())
        .merge(routes::memory_routes())
        .merge(routes::tool_routes())
        .merge(routes::retrieval_routes())
        .merge(routes::media_routes())
        .merge(routes::report_routes())
        .merge(routes::agent_routes())
        .merge(routes::admin_routes())
        .merge(crate::ws::ws_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
