//! Period performance: fixed look-back windows of day, week or month
//! buckets, anchored on "now" and always returned oldest first.
//!
//!   day   → last 7 days    ("2024-05-15")
//!   week  → last 4 weeks   ("Week of May 12, 2024", weeks start on Sunday)
//!   month → last 6 months  ("May 2024")
//!
//! Buckets with no settled bets are kept (zero-filled) so a chart always
//! gets the same number of bars. Dates are bucketed in UTC.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use super::models::{Bet, Outcome, PerformanceMetric, PeriodType};

impl PeriodType {
    /// Number of buckets in the look-back window.
    pub fn window_len(self) -> u32 {
        match self {
            PeriodType::Day => 7,
            PeriodType::Week => 4,
            PeriodType::Month => 6,
        }
    }

    /// Bucket label for a calendar date.
    pub fn label(self, date: NaiveDate) -> String {
        match self {
            PeriodType::Day => date.format("%Y-%m-%d").to_string(),
            PeriodType::Week => format!("Week of {}", start_of_week(date).format("%b %d, %Y")),
            PeriodType::Month => date.format("%B %Y").to_string(),
        }
    }

    /// Earliest date a bet may have and still be counted.
    fn cutoff(self, today: NaiveDate) -> NaiveDate {
        match self {
            PeriodType::Day => today - Duration::days(6),
            PeriodType::Week => start_of_week(today - Duration::days(28)),
            PeriodType::Month => {
                let back = today
                    .checked_sub_months(Months::new(6))
                    .unwrap_or(NaiveDate::MIN);
                back.with_day(1).unwrap_or(back)
            }
        }
    }

    /// Labels of the window, oldest first.
    fn window(self, today: NaiveDate) -> Vec<String> {
        (0..self.window_len())
            .rev()
            .map(|i| {
                let date = match self {
                    PeriodType::Day => today - Duration::days(i64::from(i)),
                    PeriodType::Week => today - Duration::days(7 * i64::from(i)),
                    PeriodType::Month => today
                        .checked_sub_months(Months::new(i))
                        .unwrap_or(NaiveDate::MIN),
                };
                self.label(date)
            })
            .collect()
    }
}

fn start_of_week(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

/// Stake of the settled bets that fall into the bucket labelled `period`.
/// Pending stakes are left out so the denominator covers the same bets as
/// the P/L numerator.
fn stake_in_period(bets: &[Bet], period_type: PeriodType, period: &str) -> Decimal {
    bets.iter()
        .filter(|b| b.outcome.is_settled())
        .filter(|b| period_type.label(b.date.date_naive()) == period)
        .fold(Decimal::ZERO, |stake, b| stake.saturating_add(b.bet_amount))
}

/// Per-period win rate, profit/loss and ROI for the window ending at `now`.
///
/// Returns an empty vector when there are no bets at all; otherwise one
/// metric per bucket of the window. Pending bets are ignored.
pub fn calculate_performance_metrics(
    bets: &[Bet],
    period_type: PeriodType,
    now: DateTime<Utc>,
) -> Vec<PerformanceMetric> {
    if bets.is_empty() {
        return Vec::new();
    }

    let today = now.date_naive();
    let cutoff = period_type.cutoff(today);
    let mut metrics: Vec<PerformanceMetric> = period_type
        .window(today)
        .into_iter()
        .map(PerformanceMetric::empty)
        .collect();
    let index: HashMap<String, usize> = metrics
        .iter()
        .enumerate()
        .map(|(i, m)| (m.period.clone(), i))
        .collect();

    for bet in bets {
        let date = bet.date.date_naive();
        if date < cutoff || !bet.outcome.is_settled() {
            continue;
        }
        // Bets after `now` have no bucket.
        let Some(&i) = index.get(&period_type.label(date)) else {
            continue;
        };
        let metric = &mut metrics[i];
        metric.bets_count += 1;
        match bet.outcome {
            Outcome::Win => metric.win_count += 1,
            _ => metric.loss_count += 1,
        }
        metric.profit_loss = metric.profit_loss.saturating_add(bet.profit_loss);
    }

    for metric in metrics.iter_mut().filter(|m| m.bets_count > 0) {
        metric.win_rate = f64::from(metric.win_count) / f64::from(metric.bets_count);
        let stake = stake_in_period(bets, period_type, &metric.period);
        metric.roi = if stake > Decimal::ZERO {
            metric
                .profit_loss
                .checked_div(stake)
                .and_then(|roi| roi.to_f64())
                .unwrap_or(0.0)
        } else {
            0.0
        };
    }

    metrics
}

pub fn calculate_performance_metrics_now(
    bets: &[Bet],
    period_type: PeriodType,
) -> Vec<PerformanceMetric> {
    calculate_performance_metrics(bets, period_type, Utc::now())
}

/// Totals across a whole window of metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub total_bets: u32,
    pub win_count: u32,
    pub win_rate: f64,
    pub total_profit_loss: Decimal,
    /// Mean of the per-period ROIs, empty periods included
    pub average_roi: f64,
}

impl PerformanceSummary {
    pub fn from_metrics(metrics: &[PerformanceMetric]) -> Self {
        let total_bets: u32 = metrics.iter().map(|m| m.bets_count).sum();
        let win_count: u32 = metrics.iter().map(|m| m.win_count).sum();
        let win_rate = if total_bets > 0 {
            f64::from(win_count) / f64::from(total_bets)
        } else {
            0.0
        };
        let average_roi = if metrics.is_empty() {
            0.0
        } else {
            metrics.iter().map(|m| m.roi).sum::<f64>() / metrics.len() as f64
        };
        Self {
            total_bets,
            win_count,
            win_rate,
            total_profit_loss: metrics
                .iter()
                .fold(Decimal::ZERO, |total, m| total.saturating_add(m.profit_loss)),
            average_roi,
        }
    }
}
