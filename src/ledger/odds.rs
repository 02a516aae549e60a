//! Odds notation conversion and payout math.
//!
//! Decimal odds are the canonical intermediate for every conversion:
//!   American +o  →  o/100 + 1
//!   American −o  →  100/|o| + 1
//!   Fractional n/d →  n/d + 1
//!
//! Bets store their odds in American notation; the other notations only
//! exist at the edges where users type or read them.
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::models::Outcome;

/// Largest denominator produced when turning decimal odds into a fraction.
const MAX_FRACTION_DENOMINATOR: i64 = 1000;

/// Remainders below 10^-FRACTION_EPSILON_SCALE count as exact during fraction reduction.
const FRACTION_EPSILON_SCALE: u32 = 12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OddsError {
    #[error("american odds of 0 are undefined")]
    ZeroAmerican,

    #[error("decimal odds must be greater than 1, got {0}")]
    DecimalOutOfRange(Decimal),

    #[error("fractional odds have a zero denominator")]
    ZeroDenominator,

    #[error("cannot parse '{value}' as {format} odds")]
    Parse { value: String, format: OddsFormat },

    #[error("odds arithmetic overflowed")]
    Overflow,
}

/// Notation in which odds are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OddsFormat {
    American,
    Decimal,
    Fractional,
}

impl fmt::Display for OddsFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OddsFormat::American => "american",
            OddsFormat::Decimal => "decimal",
            OddsFormat::Fractional => "fractional",
        };
        f.write_str(s)
    }
}

impl FromStr for OddsFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "american" | "us" => Ok(OddsFormat::American),
            "decimal" | "eu" => Ok(OddsFormat::Decimal),
            "fractional" | "uk" => Ok(OddsFormat::Fractional),
            other => Err(format!("unknown odds format '{other}'")),
        }
    }
}

/// An odds value tagged with its notation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum Odds {
    American { value: Decimal },
    Decimal { value: Decimal },
    Fractional { num: Decimal, den: Decimal },
}

impl Odds {
    pub fn american(value: Decimal) -> Self {
        Odds::American { value }
    }

    pub fn decimal(value: Decimal) -> Self {
        Odds::Decimal { value }
    }

    pub fn fractional(num: Decimal, den: Decimal) -> Self {
        Odds::Fractional { num, den }
    }

    pub fn format(&self) -> OddsFormat {
        match self {
            Odds::American { .. } => OddsFormat::American,
            Odds::Decimal { .. } => OddsFormat::Decimal,
            Odds::Fractional { .. } => OddsFormat::Fractional,
        }
    }

    /// Parse user input written in `format`. American odds accept an
    /// optional leading `+`; fractional odds are `"num/den"`.
    pub fn parse(value: &str, format: OddsFormat) -> Result<Self, OddsError> {
        let parse_err = || OddsError::Parse {
            value: value.to_string(),
            format,
        };
        let trimmed = value.trim();
        let odds = match format {
            OddsFormat::American => {
                let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
                Odds::american(Decimal::from_str(digits).map_err(|_| parse_err())?)
            }
            OddsFormat::Decimal => {
                Odds::decimal(Decimal::from_str(trimmed).map_err(|_| parse_err())?)
            }
            OddsFormat::Fractional => {
                let (num, den) = trimmed.split_once('/').ok_or_else(parse_err)?;
                let num = Decimal::from_str(num.trim()).map_err(|_| parse_err())?;
                let den = Decimal::from_str(den.trim()).map_err(|_| parse_err())?;
                Odds::fractional(num, den)
            }
        };
        // Reject values that have no decimal equivalent up front.
        odds.to_decimal()?;
        Ok(odds)
    }

    /// Decimal (total return per unit staked) equivalent.
    pub fn to_decimal(&self) -> Result<Decimal, OddsError> {
        match *self {
            Odds::American { value } => american_to_decimal(value),
            Odds::Decimal { value } => {
                if value <= Decimal::ONE {
                    return Err(OddsError::DecimalOutOfRange(value));
                }
                Ok(value)
            }
            Odds::Fractional { num, den } => {
                if den.is_zero() {
                    return Err(OddsError::ZeroDenominator);
                }
                let decimal = num
                    .checked_div(den)
                    .and_then(|net| net.checked_add(Decimal::ONE))
                    .ok_or(OddsError::Overflow)?;
                if decimal <= Decimal::ONE {
                    return Err(OddsError::DecimalOutOfRange(decimal));
                }
                Ok(decimal)
            }
        }
    }

    /// American equivalent, the notation bets are stored in.
    pub fn to_american(&self) -> Result<Decimal, OddsError> {
        match *self {
            Odds::American { value } => {
                if value.is_zero() {
                    return Err(OddsError::ZeroAmerican);
                }
                Ok(value)
            }
            _ => decimal_to_american(self.to_decimal()?),
        }
    }

    /// Fractional equivalent, reduced to lowest terms. American odds reduce
    /// exactly; other sources go through a bounded continued fraction.
    pub fn to_fractional(&self) -> Result<(Decimal, Decimal), OddsError> {
        match *self {
            Odds::American { value } if value.fract().is_zero() => {
                if value.is_zero() {
                    return Err(OddsError::ZeroAmerican);
                }
                if value > Decimal::ZERO {
                    Ok(reduce(value, Decimal::ONE_HUNDRED))
                } else {
                    Ok(reduce(Decimal::ONE_HUNDRED, value.abs()))
                }
            }
            Odds::Fractional { num, den } if num.fract().is_zero() && den.fract().is_zero() => {
                self.to_decimal()?;
                Ok(reduce(num, den))
            }
            _ => approximate_fraction(self.to_decimal()? - Decimal::ONE),
        }
    }

    pub fn convert(&self, to: OddsFormat) -> Result<Odds, OddsError> {
        Ok(match to {
            OddsFormat::American => Odds::american(self.to_american()?),
            OddsFormat::Decimal => Odds::decimal(self.to_decimal()?),
            OddsFormat::Fractional => {
                let (num, den) = self.to_fractional()?;
                Odds::fractional(num, den)
            }
        })
    }
}

impl fmt::Display for Odds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Odds::American { value } if value > Decimal::ZERO => {
                write!(f, "+{}", value.normalize())
            }
            Odds::American { value } => write!(f, "{}", value.normalize()),
            Odds::Decimal { value } => write!(f, "{:.2}", value.round_dp(2)),
            Odds::Fractional { num, den } => {
                write!(f, "{}/{}", num.normalize(), den.normalize())
            }
        }
    }
}

pub fn american_to_decimal(odds: Decimal) -> Result<Decimal, OddsError> {
    if odds.is_zero() {
        return Err(OddsError::ZeroAmerican);
    }
    let net = if odds > Decimal::ZERO {
        odds.checked_div(Decimal::ONE_HUNDRED)
    } else {
        Decimal::ONE_HUNDRED.checked_div(odds.abs())
    };
    net.and_then(|n| n.checked_add(Decimal::ONE))
        .ok_or(OddsError::Overflow)
}

/// Decimal → American, rounded to a whole number.
pub fn decimal_to_american(decimal: Decimal) -> Result<Decimal, OddsError> {
    if decimal <= Decimal::ONE {
        return Err(OddsError::DecimalOutOfRange(decimal));
    }
    let net = decimal - Decimal::ONE;
    let american = if decimal >= Decimal::TWO {
        net.checked_mul(Decimal::ONE_HUNDRED)
    } else {
        (-Decimal::ONE_HUNDRED).checked_div(net)
    }
    .ok_or(OddsError::Overflow)?;
    Ok(american.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
}

/// Parse `value` as `from` odds and express it in `to` notation.
pub fn convert_odds(value: &str, from: OddsFormat, to: OddsFormat) -> Result<Odds, OddsError> {
    Odds::parse(value, from)?.convert(to)
}

/// Net win (not total return) for a stake at the given odds.
pub fn calculate_potential_win(bet_amount: Decimal, odds: &Odds) -> Result<Decimal, OddsError> {
    match *odds {
        // Direct formula keeps common lines like -110 exact to the cent.
        Odds::American { value } => {
            if value.is_zero() {
                return Err(OddsError::ZeroAmerican);
            }
            let win = if value > Decimal::ZERO {
                bet_amount
                    .checked_mul(value)
                    .and_then(|x| x.checked_div(Decimal::ONE_HUNDRED))
            } else {
                bet_amount
                    .checked_mul(Decimal::ONE_HUNDRED)
                    .and_then(|x| x.checked_div(value.abs()))
            };
            win.ok_or(OddsError::Overflow)
        }
        _ => bet_amount
            .checked_mul(odds.to_decimal()? - Decimal::ONE)
            .ok_or(OddsError::Overflow),
    }
}

/// Settlement value of a bet at American odds. Pending bets are worth 0.
pub fn calculate_profit_loss(
    bet_amount: Decimal,
    american_odds: Decimal,
    outcome: Outcome,
) -> Result<Decimal, OddsError> {
    match outcome {
        Outcome::Pending => Ok(Decimal::ZERO),
        Outcome::Win => calculate_potential_win(bet_amount, &Odds::american(american_odds)),
        Outcome::Loss => Ok(-bet_amount),
    }
}

fn gcd(mut a: Decimal, mut b: Decimal) -> Decimal {
    while !b.is_zero() {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

fn reduce(num: Decimal, den: Decimal) -> (Decimal, Decimal) {
    let g = gcd(num.abs(), den.abs());
    if g.is_zero() {
        return (num, den);
    }
    ((num / g).normalize(), (den / g).normalize())
}

/// Best rational approximation of `x` (> 0) with a denominator no larger
/// than `MAX_FRACTION_DENOMINATOR`.
fn approximate_fraction(x: Decimal) -> Result<(Decimal, Decimal), OddsError> {
    let max_den = Decimal::from(MAX_FRACTION_DENOMINATOR);
    let whole = x.floor();
    let (mut h_prev, mut h) = (Decimal::ONE, whole);
    let (mut k_prev, mut k) = (Decimal::ZERO, Decimal::ONE);
    let mut frac = x - whole;
    let epsilon = Decimal::new(1, FRACTION_EPSILON_SCALE);

    while frac > epsilon {
        let inverse = Decimal::ONE.checked_div(frac).ok_or(OddsError::Overflow)?;
        let a = inverse.floor();
        let k_next = continuant(a, k, k_prev)?;
        if k_next > max_den {
            break;
        }
        let h_next = continuant(a, h, h_prev)?;
        (h_prev, h) = (h, h_next);
        (k_prev, k) = (k, k_next);
        frac = inverse - a;
    }

    Ok(reduce(h, k))
}

/// `a * current + previous`, the continued-fraction recurrence step.
fn continuant(a: Decimal, current: Decimal, previous: Decimal) -> Result<Decimal, OddsError> {
    a.checked_mul(current)
        .and_then(|x| x.checked_add(previous))
        .ok_or(OddsError::Overflow)
}
