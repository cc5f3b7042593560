use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use bug_arena_backend::api::{self, AppState};
use bug_arena_backend::config::{self, Config};
use bug_arena_backend::gateway::gemini::GeminiClient;
use bug_arena_backend::metrics;
use bug_arena_backend::rate_limit::RateLimiter;
use bug_arena_backend::store::{memory::MemoryStore, sqlite::SqliteStore, Store};

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "bug-arena-backend" }))
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cfg = Config::load();
    config::set_local_mode(cfg.local_mode);
    metrics::register_metrics();

    let store: Arc<dyn Store> = if cfg.local_mode {
        tracing::info!("Local mode: using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(
            SqliteStore::new(&cfg.database_url)
                .await
                .expect("Failed to initialize database"),
        )
    };

    if cfg.gemini_api_key.is_empty() {
        tracing::warn!("GEMINI_API_KEY is not set; model calls will fail and battles fall back");
    }
    let gemini = Arc::new(GeminiClient::new(
        cfg.gemini_api_key.clone(),
        cfg.gemini_base_url.clone(),
        cfg.analysis_model.clone(),
        cfg.battle_model.clone(),
    ));

    let state = AppState {
        store,
        inference: gemini.clone(),
        battles: gemini,
        rate_limiter: RateLimiter::new(),
    };

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .merge(api::router(state))
        .layer(CorsLayer::permissive());

    if let Some(dir) = &cfg.static_dir {
        tracing::info!("Serving static files from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }

    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!("Bug Arena backend listening on port {}", cfg.port);
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
