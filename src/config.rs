use clap::Parser;
use rust_decimal::Decimal;

use crate::ledger::OddsFormat;

/// Personal betting ledger: bankroll history and performance API
#[derive(Parser, Debug, Clone)]
#[command(name = "bet-ledger", version, about)]
pub struct Config {
    /// API listen address
    #[arg(long, env = "API_ADDR", default_value = "127.0.0.1:8080")]
    pub api_addr: String,

    /// SQLite database path for ledger snapshots
    #[arg(long, env = "DATABASE_PATH", default_value = "bet-ledger.db")]
    pub database_path: String,

    /// Initial bankroll used when the database holds no ledger yet
    #[arg(long, env = "INITIAL_BANKROLL", default_value = "1000")]
    pub initial_bankroll: Decimal,

    /// Notation used when the API echoes odds back (american, decimal, fractional)
    #[arg(long, env = "ODDS_FORMAT", default_value = "american")]
    pub odds_format: OddsFormat,

    /// Start from an empty ledger even if a snapshot exists
    #[arg(long, env = "RESET_LEDGER", default_value = "false")]
    pub reset: bool,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.initial_bankroll <= Decimal::ZERO {
            anyhow::bail!("initial_bankroll must be positive");
        }
        if self.database_path.trim().is_empty() {
            anyhow::bail!("database_path must not be empty");
        }
        Ok(())
    }
}
