//! Print agent binary.
//!
//! Configuration is read from `print-agent.json` (or `PRINT_AGENT_CONFIG`),
//! with `PRINT_SERVER_URL` and `PRINT_RESTAURANT_ID` taking precedence.
//! The local bridge is served over stdin/stdout; logs go to stderr.

use std::sync::Arc;

use print_agent::{config_path_from_env, Agent, AgentConfig, Bridge, SystemDriver};
use tokio::io::BufReader;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let path = config_path_from_env();
    let mut config = AgentConfig::load(&path)?;
    config.apply_env();
    if config.ensure_client_id() {
        info!(client_id = %config.client_id, "Generated client id");
    }
    config.save(&path)?;

    if !config.is_configured() {
        warn!(path = %path.display(), "Restaurant not configured, waiting for the bridge");
    }

    info!(
        server = %config.server_url,
        restaurant_id = %config.restaurant_id,
        config = %path.display(),
        "Starting print agent"
    );

    let agent = Agent::new(config, Arc::new(SystemDriver::default()), Some(path));
    let bridge = Bridge::new(agent.clone());

    let (stop, shutdown) = oneshot::channel();
    let runner = {
        let agent = agent.clone();
        tokio::spawn(async move { agent.run(shutdown).await })
    };

    // The agent keeps running headless once stdin closes.
    let bridge_task = tokio::spawn(async move {
        if let Err(e) = bridge
            .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
        {
            error!(error = %e, "Bridge stopped");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    bridge_task.abort();
    let _ = stop.send(());
    runner.await?;

    Ok(())
}
