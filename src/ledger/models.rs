use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::ValidationError;
use super::odds::{calculate_profit_loss, OddsError};

/// Largest stake or profit/loss magnitude accepted from callers.
const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Largest American odds magnitude accepted from callers.
const MAX_AMERICAN_ODDS: i64 = 1_000_000;

fn check_stake(amount: Decimal) -> Result<(), ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveStake(amount));
    }
    check_amount(amount)
}

fn check_amount(amount: Decimal) -> Result<(), ValidationError> {
    if amount.abs() > Decimal::from(MAX_AMOUNT) {
        return Err(ValidationError::AmountOutOfRange(amount));
    }
    Ok(())
}

fn check_odds(odds: Decimal) -> Result<(), ValidationError> {
    if odds.is_zero() || odds.abs() > Decimal::from(MAX_AMERICAN_ODDS) {
        return Err(ValidationError::InvalidOdds(odds));
    }
    Ok(())
}

/// Settlement state of a wager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
    Pending,
}

impl Outcome {
    pub fn is_settled(self) -> bool {
        self != Outcome::Pending
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Win => "win",
            Outcome::Loss => "loss",
            Outcome::Pending => "pending",
        };
        f.write_str(s)
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "win" => Ok(Outcome::Win),
            "loss" => Ok(Outcome::Loss),
            "pending" => Ok(Outcome::Pending),
            other => Err(format!("unknown outcome '{other}'")),
        }
    }
}

/// A single logged wager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    /// Opaque identifier assigned by the ledger
    pub id: String,
    /// When the bet was placed
    pub date: DateTime<Utc>,
    pub description: String,
    pub category: Option<String>,
    pub tipster: Option<String>,
    /// Stake (positive)
    pub bet_amount: Decimal,
    /// Odds in American notation, whatever format they were entered in
    pub odds: Decimal,
    pub outcome: Outcome,
    /// Signed net result. 0 while pending, arbitrary after a cash-out.
    pub profit_loss: Decimal,
}

impl Bet {
    /// P/L that counts towards the bankroll. Pending bets contribute nothing
    /// even if a value was stored for them.
    pub fn realized_profit_loss(&self) -> Decimal {
        if self.outcome.is_settled() {
            self.profit_loss
        } else {
            Decimal::ZERO
        }
    }

    pub(crate) fn apply(&mut self, patch: BetPatch) {
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(category) = patch.category {
            self.category = category.filter(|c| !c.trim().is_empty());
        }
        if let Some(tipster) = patch.tipster {
            self.tipster = tipster.filter(|t| !t.trim().is_empty());
        }
        if let Some(amount) = patch.bet_amount {
            self.bet_amount = amount;
        }
        if let Some(odds) = patch.odds {
            self.odds = odds;
        }
        if let Some(outcome) = patch.outcome {
            self.outcome = outcome;
        }
        if let Some(pnl) = patch.profit_loss {
            self.profit_loss = pnl;
        }
    }
}

/// Everything needed to log a bet except its id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetInput {
    pub date: DateTime<Utc>,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tipster: Option<String>,
    pub bet_amount: Decimal,
    pub odds: Decimal,
    pub outcome: Outcome,
    pub profit_loss: Decimal,
}

impl BetInput {
    /// Build an input whose `profit_loss` is derived from stake, American odds
    /// and outcome, the way the entry form does it.
    pub fn priced(
        date: DateTime<Utc>,
        description: impl Into<String>,
        bet_amount: Decimal,
        odds: Decimal,
        outcome: Outcome,
    ) -> Result<Self, OddsError> {
        let profit_loss = calculate_profit_loss(bet_amount, odds, outcome)?;
        Ok(Self {
            date,
            description: description.into(),
            category: None,
            tipster: None,
            bet_amount,
            odds,
            outcome,
            profit_loss,
        })
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_tipster(mut self, tipster: impl Into<String>) -> Self {
        self.tipster = Some(tipster.into());
        self
    }

    /// Form-level checks. The ledger never calls this itself; callers run it
    /// before `Ledger::add_bet`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.description.trim().is_empty() {
            return Err(ValidationError::MissingDescription);
        }
        check_stake(self.bet_amount)?;
        check_odds(self.odds)?;
        check_amount(self.profit_loss)
    }

    pub(crate) fn into_bet(self, id: String) -> Bet {
        Bet {
            id,
            date: self.date,
            description: self.description,
            category: self.category,
            tipster: self.tipster,
            bet_amount: self.bet_amount,
            odds: self.odds,
            outcome: self.outcome,
            profit_loss: self.profit_loss,
        }
    }
}

/// Field-level update for an existing bet. `None` keeps the prior value.
///
/// `category` and `tipster` can also be cleared: `Some(None)` (JSON `null`)
/// removes the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BetPatch {
    pub date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    #[serde(
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub category: Option<Option<String>>,
    #[serde(
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub tipster: Option<Option<String>>,
    pub bet_amount: Option<Decimal>,
    pub odds: Option<Decimal>,
    pub outcome: Option<Outcome>,
    pub profit_loss: Option<Decimal>,
}

impl BetPatch {
    pub fn settle(outcome: Outcome, profit_loss: Decimal) -> Self {
        Self {
            outcome: Some(outcome),
            profit_loss: Some(profit_loss),
            ..Self::default()
        }
    }

    /// Same checks as `BetInput::validate`, applied to the fields present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(description) = &self.description {
            if description.trim().is_empty() {
                return Err(ValidationError::MissingDescription);
            }
        }
        if let Some(amount) = self.bet_amount {
            check_stake(amount)?;
        }
        if let Some(odds) = self.odds {
            check_odds(odds)?;
        }
        if let Some(pnl) = self.profit_loss {
            check_amount(pnl)?;
        }
        Ok(())
    }
}

/// A field that is present deserializes to `Some`, even when it is `null`;
/// an absent field falls back to the `None` default.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// One sample of the balance-over-time series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BankrollPoint {
    pub date: DateTime<Utc>,
    pub balance: Decimal,
}

/// Aggregation granularity for performance metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Day,
    Week,
    Month,
}

impl FromStr for PeriodType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(PeriodType::Day),
            "week" | "weekly" => Ok(PeriodType::Week),
            "month" | "monthly" => Ok(PeriodType::Month),
            other => Err(format!("unknown period type '{other}'")),
        }
    }
}

/// Aggregate for one period bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub period: String,
    pub bets_count: u32,
    pub win_count: u32,
    pub loss_count: u32,
    /// 0.0–1.0
    pub win_rate: f64,
    pub profit_loss: Decimal,
    /// P/L over stake, 0.0 when nothing was staked
    pub roi: f64,
}

impl PerformanceMetric {
    pub(crate) fn empty(period: String) -> Self {
        Self {
            period,
            bets_count: 0,
            win_count: 0,
            loss_count: 0,
            win_rate: 0.0,
            profit_loss: Decimal::ZERO,
            roi: 0.0,
        }
    }
}
