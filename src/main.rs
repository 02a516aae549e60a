use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use bet_ledger::api::{self, AppState};
use bet_ledger::config::Config;
use bet_ledger::db::Database;
use bet_ledger::ledger::Ledger;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    // Open database
    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    // Restore the ledger, or seed a fresh one
    let ledger = match db.load_snapshot()? {
        Some(_) if config.reset => {
            warn!("--reset given: discarding stored ledger");
            seed_ledger(&db, &config)?
        }
        Some(snapshot) => {
            let ledger = Ledger::restore(snapshot)?;
            info!(
                "Ledger restored: {} bet(s), bankroll {} (initial {})",
                ledger.bets().len(),
                ledger.current_bankroll(),
                ledger.initial_bankroll()
            );
            ledger
        }
        None => seed_ledger(&db, &config)?,
    };

    let state = AppState {
        ledger: Arc::new(Mutex::new(ledger)),
        db,
        odds_format: config.odds_format,
    };
    let app = api::router(state);
    let addr: SocketAddr = config.api_addr.parse()?;
    info!("Ledger API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}

fn seed_ledger(db: &Database, config: &Config) -> Result<Ledger> {
    let ledger = Ledger::new(config.initial_bankroll)?;
    db.save_snapshot(&ledger.snapshot())?;
    info!("New ledger seeded with bankroll {}", config.initial_bankroll);
    Ok(ledger)
}
