//! RVW API Server
//!
//! Serves the product review assistant over HTTP. Backends are wired in a
//! background task so `/health` answers while ingestion or collection setup
//! is still running; `/ready` flips once the orchestrator is installed.

use std::sync::Arc;

use anyhow::Context;
use rvw_api::{create_router, AppState};
use rvw_core::AppConfig;
use rvw_rag::{ConversationalRag, DataIngestor};
use tracing_subscriber::EnvFilter;

/// Optional TOML config path; env vars still take precedence
const CONFIG_PATH_VAR: &str = "RVW_CONFIG";

fn load_config() -> anyhow::Result<AppConfig> {
    let config = match std::env::var(CONFIG_PATH_VAR) {
        Ok(path) => AppConfig::from_file(&path)?.with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };
    Ok(config)
}

fn init_tracing(config: &AppConfig) {
    let level = &config.logging.level;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("rvw_api={level},rvw_rag={level},tower_http={level}").into());

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn wire_backends(state: Arc<AppState>) -> anyhow::Result<()> {
    let config = &state.config;
    let store = rvw_vector::create_document_store(config)?;

    if config.ingest.on_startup {
        let report = DataIngestor::new(store.clone())
            .ingest_path(&config.ingest.data_path)
            .await
            .with_context(|| format!("ingesting {}", config.ingest.data_path.display()))?;
        tracing::info!(
            documents = report.documents,
            elapsed_ms = report.elapsed_ms,
            "Startup ingestion finished"
        );
    }

    let rag = ConversationalRag::from_config(config, store)?;
    state.initialize_rag(rag).await;
    tracing::info!("RAG orchestrator ready");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = load_config()?;
    init_tracing(&config);
    config.validate()?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config)?);

    let backend_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = wire_backends(backend_state).await {
            tracing::error!(error = %format!("{e:#}"), "Backend initialization failed");
        }
    });

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("RVW API Server starting on http://{}", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
