//! Cohort node binary
//!
//! Runs the group-deal engine behind its HTTP API, settlement sweeper and
//! admin socket.

use cohort_node::{CohortConfig, CohortNode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cohort_node=info,cohort_tiers=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Cohort node");

    let config = CohortConfig::from_env()?;

    let node = CohortNode::new(config)?;
    node.run().await?;

    Ok(())
}
