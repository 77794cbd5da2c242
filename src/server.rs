/// Server setup and initialization
///
/// Wires together all components: graph store, service clients, dispatcher,
/// execution engine, trigger supervisor and HTTP routes.

use crate::{
    api::{create_run_routes, create_workflow_routes, AppState},
    chain::{AbiLogDecoder, JsonRpcLedger, Ledger},
    config::Config,
    runtime::{
        dispatch::ActionDispatcher,
        engine::ExecutionEngine,
        services::{HttpInferenceService, HttpRelayService},
        triggers::TriggerSupervisor,
    },
    workflow::{store::WorkflowStore, types::Workflow},
};
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Create the main Axum application with all routes
///
/// Builds every runtime component and starts the trigger supervisor in the
/// background; it stops when `shutdown` is cancelled.
pub async fn create_app(config: Config, shutdown: CancellationToken) -> Result<Router> {
    // Initialize the in-memory graph, optionally seeded from a file
    tracing::info!("📊 Initializing workflow store");
    let store = Arc::new(WorkflowStore::new());
    if let Some(path) = &config.workflow_file {
        let workflow = load_workflow_file(path).await?;
        tracing::info!(
            "📥 Seeding workflow from {} ({} nodes, {} edges)",
            path,
            workflow.nodes.len(),
            workflow.edges.len()
        );
        store
            .replace(workflow)
            .with_context(|| format!("Invalid workflow in {path}"))?;
    }

    // Initialize service clients and dispatchers
    tracing::info!("⚙️ Initializing action dispatcher ({})", config.services.base_url);
    let client = reqwest::Client::new();
    let dispatcher = Arc::new(ActionDispatcher::new(
        Arc::new(HttpInferenceService::new(client.clone(), config.services.inference_url())),
        Arc::new(HttpRelayService::new(client.clone(), config.services.relay_url())),
        config.engine.recipient_placeholder.clone(),
    ));

    tracing::info!("🚀 Initializing execution engine");
    let engine = Arc::new(
        ExecutionEngine::new(Arc::clone(&store), dispatcher)
            .with_settle_delay(config.engine.status_delay())
            .with_node_serialization(config.engine.serialize_node_runs),
    );

    // Ledger access is the watch capability; without it triggers stay idle
    let ledger: Option<Arc<dyn Ledger>> = match &config.chain.rpc_url {
        Some(url) => {
            tracing::info!("⛓️ Watching ledger at {}", url);
            Some(Arc::new(JsonRpcLedger::with_client(client, url.clone())))
        }
        None => {
            tracing::warn!("⚠️ AUTOMATA_RPC_URL not set; trigger cursors are disabled");
            None
        }
    };

    tracing::info!("⏰ Initializing trigger supervisor");
    let supervisor = Arc::new(TriggerSupervisor::new(
        Arc::clone(&store),
        Arc::clone(&engine),
        ledger,
        Arc::new(AbiLogDecoder),
        config.chain.poll_interval(),
    ));
    tokio::spawn(Arc::clone(&supervisor).run(shutdown));

    let state = AppState {
        store,
        engine,
        supervisor,
    };

    tracing::info!("📡 Creating HTTP router with all endpoints");
    let app = Router::new()
        .route("/healthz", get(health_check))
        .merge(create_workflow_routes())
        .merge(create_run_routes())
        .with_state(state);

    tracing::info!("✅ Application initialized successfully");
    Ok(app)
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting automata runtime...");

    let shutdown = CancellationToken::new();
    let app = create_app(config.clone(), shutdown.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("❌ Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("⏹️ Shutting down");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

async fn load_workflow_file(path: &str) -> Result<Workflow> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read workflow file {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse workflow file {path}"))
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
