//! Search facade binary: wires configuration, the search engine, and the
//! migration orchestrator into one axum server. Grounded on the teacher's
//! `main.rs` for structured logging init, port auto-scan, and graceful
//! shutdown — the repo-scanning, semantic-index, file-watcher, and MCP
//! wiring that filled the rest of that file have no counterpart here.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use search_core::Scorer;
use search_engine::{
    Analyzer, EmbeddingGateway, EngineConfig, HttpEmbeddingProvider, HttpIndexGateway, HttpLlmProvider,
    ResultCache, SearchEngine,
};
use search_migration::{ControlStore, HttpIndexAdmin, MigrationLockCache, MigrationOrchestrator, SchemaRegistry};

use search_facade_server::admin::{self, AdminState};
use search_facade_server::api::{self, ApiState};
use search_facade_server::auth::{require_identity, AuthState};
use search_facade_server::config::AppConfig;

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl+C");
        info!("Received Ctrl+C, shutting down...");
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("search_facade=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        error!(error = %e, "configuration error");
        std::process::exit(1);
    });

    let client = reqwest::Client::new();

    let index = Box::new(HttpIndexGateway::new(
        client.clone(),
        config.index_base_url.clone(),
        config.index_api_key.clone(),
    ));

    let embedding_provider: Option<Box<dyn search_engine::EmbeddingProvider>> =
        config.embedding_endpoint.clone().map(|endpoint| {
            Box::new(HttpEmbeddingProvider::new(
                client.clone(),
                endpoint,
                config.embedding_api_key.clone(),
                config.embedding_model.clone(),
                config.embedding_dim,
            )) as Box<dyn search_engine::EmbeddingProvider>
        });
    let embedding = EmbeddingGateway::new(embedding_provider);

    let llm_provider: Option<Box<dyn search_engine::LlmProvider>> = config.chat_endpoint.clone().map(|endpoint| {
        Box::new(HttpLlmProvider::new(
            client.clone(),
            endpoint,
            config.chat_api_key.clone().unwrap_or_default(),
            config.chat_model.clone(),
        )) as Box<dyn search_engine::LlmProvider>
    });
    let analyzer = Analyzer::new(llm_provider);
    let reranker_provider: Option<Box<dyn search_engine::LlmProvider>> = config.chat_endpoint.clone().map(|endpoint| {
        Box::new(HttpLlmProvider::new(
            client.clone(),
            endpoint,
            config.chat_api_key.clone().unwrap_or_default(),
            config.chat_model.clone(),
        )) as Box<dyn search_engine::LlmProvider>
    });

    let mut scorer = Scorer::new(HashMap::new());
    scorer.recency_grace_days = config.recency_grace_days;
    scorer.recency_decay = config.recency_decay;

    let engine_config = EngineConfig { collections: config.collections.clone(), default_collection: config.default_collection.clone() };
    let engine = SearchEngine::new(engine_config, embedding, index, analyzer, reranker_provider, scorer)
        .with_cache(ResultCache::with_capacity_and_ttl(config.cache_capacity, Duration::from_secs(config.cache_ttl_secs)));
    let engine = Arc::new(engine);

    let index_admin: Arc<dyn search_migration::IndexAdmin> = Arc::new(HttpIndexAdmin::new(
        client.clone(),
        config.index_base_url.clone(),
        config.index_api_key.clone(),
    ));
    let store = Arc::new(ControlStore::new());
    let registry = Arc::new(SchemaRegistry::new());
    let lock_cache = Arc::new(MigrationLockCache::new(store.clone()));
    let orchestrator = Arc::new(MigrationOrchestrator::new(store, registry, index_admin, lock_cache));

    let api_state = ApiState { engine, alpha_default: config.alpha_default, typos: config.typos.clone() };
    let admin_state = AdminState { orchestrator, default_collection: config.default_collection.clone() };

    let auth_state = AuthState { admin_key: config.admin_key.clone() };

    let app = Router::new()
        .merge(api::router(api_state))
        .merge(
            admin::router(admin_state)
                .layer(axum::middleware::from_fn_with_state(auth_state, require_identity)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive());

    let bind_addr = std::env::var("BIND_ALL").map(|_| "0.0.0.0").unwrap_or("127.0.0.1");
    let explicit_port: Option<u16> = std::env::var("PORT").ok().and_then(|p| p.parse().ok());

    let listener = if let Some(port) = explicit_port {
        tokio::net::TcpListener::bind(format!("{bind_addr}:{port}")).await.unwrap_or_else(|e| {
            error!(port = port, error = %e, "Could not bind to port");
            eprintln!("  PORT={port} was set explicitly. Choose a different port.");
            std::process::exit(1);
        })
    } else {
        const BASE: u16 = 8432;
        const RANGE: u16 = 10;
        let mut found = None;
        for port in BASE..BASE + RANGE {
            match tokio::net::TcpListener::bind(format!("{bind_addr}:{port}")).await {
                Ok(l) => {
                    found = Some(l);
                    break;
                }
                Err(_) => continue,
            }
        }
        found.unwrap_or_else(|| {
            error!(range_start = BASE, range_end = BASE + RANGE - 1, "No free port found");
            eprintln!("  Try: PORT=<port> search-facade");
            std::process::exit(1);
        })
    };

    let port = listener.local_addr().unwrap().port();
    info!(port = port, "listening");
    eprintln!("SEARCH_FACADE_PORT={port}");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.unwrap();
}
