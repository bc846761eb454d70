//! Operator tool for contract audit trails and pending anchors.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use contract_anchor::config::AppConfig;
use contract_anchor::database::Database;
use contract_anchor::directory::SqlUserDirectory;
use contract_anchor::ledger::{DisabledLedger, HttpLedgerClient, LedgerClient};
use contract_anchor::ContractFacade;

#[derive(Parser)]
#[command(name = "audit-trail", version, about = "Inspect contract audit trails and anchors")]
struct Cli {
    /// TOML configuration file; environment variables are used when absent
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify the hash chain of one contract's audit trail
    Verify {
        contract_id: Uuid,
        /// Print every event
        #[arg(short, long)]
        verbose: bool,
    },
    /// Resubmit stored hashes that never confirmed on the ledger
    Sweep,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };
    let database = Database::new(&config.database_url).await?;
    database.run_migrations().await?;

    let ledger: Arc<dyn LedgerClient> = if config.ledger.is_enabled() {
        Arc::new(HttpLedgerClient::from_config(&config.ledger)?)
    } else {
        Arc::new(DisabledLedger)
    };
    let facade = ContractFacade::new(
        database.clone(),
        Arc::new(SqlUserDirectory::new(database)),
        ledger,
        config.ledger.clone(),
    );

    match cli.command {
        Command::Verify { contract_id, verbose } => {
            let trail = facade.get_audit_trail(contract_id).await?;
            if verbose {
                for event in &trail.events {
                    println!(
                        "{:>4} {} {:<22} {} [{}]",
                        event.sequence,
                        event.created_at.to_rfc3339(),
                        event.event_type.as_str(),
                        event.description,
                        event.user_name.as_deref().unwrap_or("system")
                    );
                }
            }

            let result = facade.verify_audit_trail(contract_id).await?;
            if !result.valid {
                let problem = result.problem.unwrap_or_default();
                error!("Audit trail of {} is broken: {}", contract_id, problem);
                return Err(anyhow!("verification failed: {}", problem));
            }

            println!("✓ {} events verified, head {}", result.events_checked, result.head_hash);
            if let Some(anchor) = trail.anchor {
                println!(
                    "  anchor {} ({})",
                    anchor.document_hash,
                    anchor.tx_reference.as_deref().unwrap_or("unconfirmed")
                );
            }
        }
        Command::Sweep => {
            let report = facade.sweeper().sweep_once().await?;
            info!("Sweep finished");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
