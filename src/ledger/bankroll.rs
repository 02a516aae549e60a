use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::error::LedgerError;
use super::models::{BankrollPoint, Bet};

/// Initial bankroll plus every realized profit/loss.
pub fn running_balance(initial: Decimal, bets: &[Bet]) -> Result<Decimal, LedgerError> {
    bets.iter().try_fold(initial, |balance, bet| {
        balance
            .checked_add(bet.realized_profit_loss())
            .ok_or(LedgerError::Overflow)
    })
}

/// Rebuild the balance-over-time series from scratch.
///
/// The seed point always comes first and keeps `seed_date`. It is followed
/// by one point per bet in date order, each carrying the cumulative balance
/// up to and including that bet. `bets` is most-recent-first, so bets that
/// share a date keep the order in which they were logged.
pub fn rebuild_history(
    seed_date: DateTime<Utc>,
    initial: Decimal,
    bets: &[Bet],
) -> Result<Vec<BankrollPoint>, LedgerError> {
    let mut chronological: Vec<&Bet> = bets.iter().rev().collect();
    chronological.sort_by_key(|b| b.date);

    let mut history = Vec::with_capacity(bets.len() + 1);
    history.push(BankrollPoint {
        date: seed_date,
        balance: initial,
    });

    let mut balance = initial;
    for bet in chronological {
        balance = balance
            .checked_add(bet.realized_profit_loss())
            .ok_or(LedgerError::Overflow)?;
        history.push(BankrollPoint {
            date: bet.date,
            balance,
        });
    }
    Ok(history)
}
