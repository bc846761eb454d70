use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use contract_anchor::api;
use contract_anchor::config::AppConfig;
use contract_anchor::database::Database;
use contract_anchor::directory::SqlUserDirectory;
use contract_anchor::ledger::{DisabledLedger, HttpLedgerClient, LedgerClient};
use contract_anchor::ContractFacade;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contract_anchor=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting contract anchoring service");

    let config = match std::env::var("CONFIG_PATH") {
        Ok(path) => AppConfig::from_file(&path)?,
        Err(_) => AppConfig::load()?,
    };
    info!("Configuration loaded");

    let database = Database::new(&config.database_url)
        .await
        .with_context(|| format!("Failed to open {}", config.database_url))?;
    database.run_migrations().await?;
    info!("Database migrations completed");

    let ledger: Arc<dyn LedgerClient> = if config.ledger.is_enabled() {
        info!("Ledger anchoring enabled on {}", config.ledger.network);
        Arc::new(HttpLedgerClient::from_config(&config.ledger)?)
    } else {
        info!("Ledger anchoring disabled; contracts will be finalized hash-only");
        Arc::new(DisabledLedger)
    };

    let directory = Arc::new(SqlUserDirectory::new(database.clone()));
    let facade = ContractFacade::new(database, directory, ledger, config.ledger.clone());

    // Confirmation sweep
    let sweeper = facade.sweeper();
    tokio::spawn(sweeper.run());

    let app = api::router(facade);

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .context("Invalid server address")?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
