use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::ledger::{Bet, LedgerSnapshot, Outcome};

/// Thread-safe SQLite handle (single connection with mutex).
///
/// Stores ledger snapshots only: the ledger itself knows nothing about
/// storage, and derived state (current bankroll, history) is never written.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Snapshots ────────────────────────────────────────────────────────────

    /// Replace the stored ledger with `snapshot` in one transaction.
    pub fn save_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO ledger_meta (id, initial_bankroll, seed_date, saved_at)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                initial_bankroll=excluded.initial_bankroll,
                seed_date=excluded.seed_date,
                saved_at=excluded.saved_at",
            params![
                snapshot.initial_bankroll.to_string(),
                snapshot.seed_date,
                Utc::now(),
            ],
        )?;
        tx.execute("DELETE FROM bets", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO bets (
                    id, position, date, description, category, tipster,
                    bet_amount, odds, outcome, profit_loss
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            )?;
            for (position, bet) in snapshot.bets.iter().enumerate() {
                stmt.execute(params![
                    bet.id,
                    position as i64,
                    bet.date,
                    bet.description,
                    bet.category,
                    bet.tipster,
                    bet.bet_amount.to_string(),
                    bet.odds.to_string(),
                    bet.outcome.to_string(),
                    bet.profit_loss.to_string(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Load the stored ledger, or `None` if nothing was ever saved.
    pub fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>> {
        let conn = self.conn()?;
        let meta: Option<(String, DateTime<Utc>)> = conn
            .query_row(
                "SELECT initial_bankroll, seed_date FROM ledger_meta WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((initial_bankroll, seed_date)) = meta else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT id, date, description, category, tipster,
                    bet_amount, odds, outcome, profit_loss
             FROM bets ORDER BY position ASC",
        )?;
        let bets = stmt
            .query_map([], map_bet)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(LedgerSnapshot {
            initial_bankroll: Decimal::from_str(&initial_bankroll)?,
            seed_date,
            bets,
        }))
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn decimal_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn map_bet(row: &rusqlite::Row) -> rusqlite::Result<Bet> {
    let outcome: String = row.get(7)?;
    let outcome = Outcome::from_str(&outcome).map_err(|e| {
        conversion_error(7, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    Ok(Bet {
        id: row.get(0)?,
        date: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        tipster: row.get(4)?,
        bet_amount: decimal_column(row, 5)?,
        odds: decimal_column(row, 6)?,
        outcome,
        profit_loss: decimal_column(row, 8)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS). Money is stored as
/// decimal text so no precision is lost on the way through REAL.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_meta (
    id               INTEGER PRIMARY KEY CHECK (id = 1),
    initial_bankroll TEXT    NOT NULL,
    seed_date        TEXT    NOT NULL,
    saved_at         TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS bets (
    id          TEXT    PRIMARY KEY,
    position    INTEGER NOT NULL,
    date        TEXT    NOT NULL,
    description TEXT    NOT NULL,
    category    TEXT,
    tipster     TEXT,
    bet_amount  TEXT    NOT NULL,
    odds        TEXT    NOT NULL,
    outcome     TEXT    NOT NULL,
    profit_loss TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bets_position ON bets(position);
"#;
