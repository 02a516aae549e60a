use rust_decimal::Decimal;
use thiserror::Error;

/// Failures of ledger mutations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// No bet with this id exists. Ledger state is left untouched.
    #[error("bet not found: {0}")]
    BetNotFound(String),

    #[error("initial bankroll must be positive, got {0}")]
    InvalidBankroll(Decimal),

    #[error("cash-out amount must be positive, got {0}")]
    InvalidCashOut(Decimal),

    /// A balance left the representable range. Ledger state is left untouched.
    #[error("bankroll arithmetic overflowed")]
    Overflow,

    #[error(transparent)]
    Odds(#[from] super::odds::OddsError),
}

/// Caller-side input checks for a new bet.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("description is required")]
    MissingDescription,

    #[error("stake must be a positive amount, got {0}")]
    NonPositiveStake(Decimal),

    #[error("odds must be non-zero American odds (e.g. +150 or -110), got {0}")]
    InvalidOdds(Decimal),

    #[error("amount {0} is outside the accepted range")]
    AmountOutOfRange(Decimal),
}
