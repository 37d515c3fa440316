//! Gateway binary — config, logging, storage, and the server loop.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use irisgate::config::GatewayConfig;
use irisgate::gateway::Gateway;
use irisgate::ledger::SqliteLedger;
use irisgate::model::ThresholdClassifier;
use irisgate::server::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env();

    let ledger = Arc::new(SqliteLedger::open(&config.database_path).await?);
    let gateway = Gateway::new(&config, Arc::new(ThresholdClassifier), ledger);
    let router = Arc::new(gateway.router());

    let server = Server::bind(&config.bind_addr).await?;
    server
        .run(move |req| {
            let router = Arc::clone(&router);
            async move { router.route(req).await }
        })
        .await?;

    Ok(())
}
