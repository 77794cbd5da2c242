/// Automata runtime entry point
///
/// Loads configuration from the environment and serves:
/// - Graph editing API at /api/workflow, /api/nodes/*, /api/edges/*
/// - Test runs at /api/test-run
/// - Health check at /healthz
use automata::{config::Config, server::start_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
