pub mod bankroll;
pub mod error;
pub mod filter;
pub mod models;
pub mod odds;
pub mod performance;

pub use error::{LedgerError, ValidationError};
pub use filter::BetFilter;
pub use models::{
    BankrollPoint, Bet, BetInput, BetPatch, Outcome, PerformanceMetric, PeriodType,
};
pub use odds::{
    american_to_decimal, calculate_potential_win, calculate_profit_loss, convert_odds,
    decimal_to_american, Odds, OddsError, OddsFormat,
};
pub use performance::{
    calculate_performance_metrics, calculate_performance_metrics_now, PerformanceSummary,
};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// Starting bankroll of a fresh ledger
pub const DEFAULT_INITIAL_BANKROLL: Decimal = Decimal::ONE_THOUSAND;

/// Minimal state needed to rebuild a ledger. Everything else is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub initial_bankroll: Decimal,
    pub seed_date: DateTime<Utc>,
    /// Most-recent-first, as held by the ledger
    pub bets: Vec<Bet>,
}

/// The bet log and everything derived from it.
///
/// All mutation goes through `&mut self`; the derived bankroll history is
/// rebuilt from the bet collection after every change, so bets may be
/// logged, edited or deleted in any date order.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    initial_bankroll: Decimal,
    current_bankroll: Decimal,
    bets: Vec<Bet>,
    bankroll_history: Vec<BankrollPoint>,
    seed_date: DateTime<Utc>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::seeded(DEFAULT_INITIAL_BANKROLL, Utc::now())
    }
}

impl Ledger {
    pub fn new(initial_bankroll: Decimal) -> Result<Self, LedgerError> {
        if initial_bankroll <= Decimal::ZERO {
            return Err(LedgerError::InvalidBankroll(initial_bankroll));
        }
        Ok(Self::seeded(initial_bankroll, Utc::now()))
    }

    fn seeded(initial_bankroll: Decimal, seed_date: DateTime<Utc>) -> Self {
        Self {
            initial_bankroll,
            current_bankroll: initial_bankroll,
            bets: Vec::new(),
            bankroll_history: vec![BankrollPoint {
                date: seed_date,
                balance: initial_bankroll,
            }],
            seed_date,
        }
    }

    /// Rebuild a ledger from a snapshot. Cached totals are never trusted;
    /// the current bankroll and history are recomputed from the bets.
    pub fn restore(snapshot: LedgerSnapshot) -> Result<Self, LedgerError> {
        if snapshot.initial_bankroll <= Decimal::ZERO {
            return Err(LedgerError::InvalidBankroll(snapshot.initial_bankroll));
        }
        let mut ledger = Self::seeded(snapshot.initial_bankroll, snapshot.seed_date);
        ledger.bets = snapshot.bets;
        let current = bankroll::running_balance(ledger.initial_bankroll, &ledger.bets)?;
        ledger.rebuild(current)?;
        Ok(ledger)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            initial_bankroll: self.initial_bankroll,
            seed_date: self.seed_date,
            bets: self.bets.clone(),
        }
    }

    // ── Read accessors ───────────────────────────────────────────────────────

    pub fn initial_bankroll(&self) -> Decimal {
        self.initial_bankroll
    }

    pub fn current_bankroll(&self) -> Decimal {
        self.current_bankroll
    }

    /// Bets in logging order, most recent first.
    pub fn bets(&self) -> &[Bet] {
        &self.bets
    }

    pub fn bankroll_history(&self) -> &[BankrollPoint] {
        &self.bankroll_history
    }

    pub fn bet(&self, id: &str) -> Option<&Bet> {
        self.bets.iter().find(|b| b.id == id)
    }

    pub fn filtered_bets(&self, filter: &BetFilter) -> Vec<&Bet> {
        self.bets.iter().filter(|b| filter.matches(b)).collect()
    }

    pub fn performance(&self, period: PeriodType, now: DateTime<Utc>) -> Vec<PerformanceMetric> {
        calculate_performance_metrics(&self.bets, period, now)
    }

    // ── Mutations ────────────────────────────────────────────────────────────

    /// Change the baseline bankroll. Realized profit/loss is preserved and
    /// the seed point keeps its date.
    pub fn set_initial_bankroll(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidBankroll(amount));
        }
        let delta = amount - self.initial_bankroll;
        let current = checked_add(self.current_bankroll, delta)?;
        let previous = std::mem::replace(&mut self.initial_bankroll, amount);
        if let Err(e) = self.rebuild(current) {
            self.initial_bankroll = previous;
            return Err(e);
        }
        info!(
            "Initial bankroll set to {} (current bankroll {})",
            amount, self.current_bankroll
        );
        Ok(())
    }

    /// Log a new bet. Stake, odds and outcome are taken as given; run
    /// `BetInput::validate` beforehand to reject form garbage.
    pub fn add_bet(&mut self, input: BetInput) -> Result<Bet, LedgerError> {
        let bet = input.into_bet(Uuid::new_v4().to_string());
        let current = checked_add(self.current_bankroll, bet.realized_profit_loss())?;
        self.bets.insert(0, bet.clone());
        if let Err(e) = self.rebuild(current) {
            self.bets.remove(0);
            return Err(e);
        }
        info!(
            "Bet {} logged: {} {} @ {} ({}), bankroll {}",
            bet.id,
            bet.description,
            bet.bet_amount,
            Odds::american(bet.odds),
            bet.outcome,
            self.current_bankroll
        );
        Ok(bet)
    }

    /// Merge `patch` into an existing bet and propagate the change in its
    /// realized profit/loss. On error the ledger is left untouched.
    pub fn edit_bet(&mut self, id: &str, patch: BetPatch) -> Result<Bet, LedgerError> {
        let index = self.position(id)?;
        let mut updated = self.bets[index].clone();
        updated.apply(patch);
        let delta = updated
            .realized_profit_loss()
            .checked_sub(self.bets[index].realized_profit_loss())
            .ok_or(LedgerError::Overflow)?;
        let current = checked_add(self.current_bankroll, delta)?;

        let previous = std::mem::replace(&mut self.bets[index], updated.clone());
        if let Err(e) = self.rebuild(current) {
            self.bets[index] = previous;
            return Err(e);
        }
        debug!(
            "Bet {} edited: outcome {}, delta {}, bankroll {}",
            id, updated.outcome, delta, self.current_bankroll
        );
        Ok(updated)
    }

    /// Remove a bet and back out its realized profit/loss.
    pub fn delete_bet(&mut self, id: &str) -> Result<Bet, LedgerError> {
        let index = self.position(id)?;
        let current = self
            .current_bankroll
            .checked_sub(self.bets[index].realized_profit_loss())
            .ok_or(LedgerError::Overflow)?;

        let removed = self.bets.remove(index);
        if let Err(e) = self.rebuild(current) {
            self.bets.insert(index, removed);
            return Err(e);
        }
        info!(
            "Bet {} deleted ({}), bankroll {}",
            removed.id, removed.description, self.current_bankroll
        );
        Ok(removed)
    }

    /// Resolve a bet at its own odds.
    pub fn settle_bet(&mut self, id: &str, outcome: Outcome) -> Result<Bet, LedgerError> {
        let bet = self
            .bet(id)
            .ok_or_else(|| LedgerError::BetNotFound(id.to_string()))?;
        let profit_loss = calculate_profit_loss(bet.bet_amount, bet.odds, outcome)?;
        self.edit_bet(id, BetPatch::settle(outcome, profit_loss))
    }

    /// Settle early for `amount` returned. The bet counts as a win when the
    /// cash-out is at least the stake, a loss otherwise.
    pub fn cash_out(&mut self, id: &str, amount: Decimal) -> Result<Bet, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidCashOut(amount));
        }
        let bet = self
            .bet(id)
            .ok_or_else(|| LedgerError::BetNotFound(id.to_string()))?;
        let profit_loss = amount
            .checked_sub(bet.bet_amount)
            .ok_or(LedgerError::Overflow)?;
        let outcome = if profit_loss >= Decimal::ZERO {
            Outcome::Win
        } else {
            Outcome::Loss
        };
        info!("Cashing out bet {} for {} (P/L {})", id, amount, profit_loss);
        self.edit_bet(id, BetPatch::settle(outcome, profit_loss))
    }

    /// Drop every bet and restart the history from a fresh seed dated now.
    pub fn reset_history(&mut self) {
        let dropped = self.bets.len();
        *self = Self::seeded(self.initial_bankroll, Utc::now());
        info!(
            "Ledger reset: {} bet(s) dropped, bankroll back to {}",
            dropped, self.initial_bankroll
        );
    }

    fn position(&self, id: &str) -> Result<usize, LedgerError> {
        self.bets
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| LedgerError::BetNotFound(id.to_string()))
    }

    /// Recompute the history for the current bet log and commit
    /// `current_bankroll`. Nothing is written when the rebuild fails.
    fn rebuild(&mut self, current_bankroll: Decimal) -> Result<(), LedgerError> {
        let history =
            bankroll::rebuild_history(self.seed_date, self.initial_bankroll, &self.bets)?;
        debug_assert_eq!(
            history.last().map(|p| p.balance),
            Some(current_bankroll),
            "cached bankroll drifted from the bet log"
        );
        self.bankroll_history = history;
        self.current_bankroll = current_bankroll;
        Ok(())
    }
}

fn checked_add(balance: Decimal, delta: Decimal) -> Result<Decimal, LedgerError> {
    balance.checked_add(delta).ok_or(LedgerError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, d, 18, 0, 0).unwrap()
    }

    fn win_input(date: DateTime<Utc>) -> BetInput {
        BetInput {
            date,
            description: "Yankees ML".into(),
            category: Some("MLB".into()),
            tipster: None,
            bet_amount: dec!(100),
            odds: dec!(150),
            outcome: Outcome::Win,
            profit_loss: dec!(150),
        }
    }

    fn loss_input(date: DateTime<Utc>) -> BetInput {
        BetInput::priced(date, "Knicks -3.5", dec!(50), dec!(-110), Outcome::Loss).unwrap()
    }

    fn assert_invariant(ledger: &Ledger) {
        let realized: Decimal = ledger.bets().iter().map(Bet::realized_profit_loss).sum();
        assert_eq!(
            ledger.current_bankroll(),
            ledger.initial_bankroll() + realized
        );
        let last = ledger.bankroll_history().last().unwrap();
        assert_eq!(last.balance, ledger.current_bankroll());
    }

    #[test]
    fn test_new_ledger_has_single_seed_point() {
        let ledger = Ledger::new(dec!(1000)).unwrap();
        assert_eq!(ledger.current_bankroll(), dec!(1000));
        assert!(ledger.bets().is_empty());
        assert_eq!(ledger.bankroll_history().len(), 1);
        assert_eq!(ledger.bankroll_history()[0].balance, dec!(1000));
    }

    #[test]
    fn test_new_rejects_non_positive_bankroll() {
        assert_eq!(
            Ledger::new(dec!(0)),
            Err(LedgerError::InvalidBankroll(dec!(0)))
        );
    }

    #[test]
    fn test_add_then_edit_scenario() {
        let mut ledger = Ledger::new(dec!(1000)).unwrap();
        let bet = ledger.add_bet(win_input(day(1))).unwrap();
        assert_eq!(ledger.current_bankroll(), dec!(1150));
        assert_eq!(ledger.bankroll_history().last().unwrap().balance, dec!(1150));

        ledger
            .edit_bet(&bet.id, BetPatch::settle(Outcome::Loss, dec!(-100)))
            .unwrap();
        assert_eq!(ledger.current_bankroll(), dec!(900));
        assert_eq!(ledger.bankroll_history().last().unwrap().balance, dec!(900));
        assert_invariant(&ledger);
    }

    #[test]
    fn test_add_assigns_unique_ids_most_recent_first() {
        let mut ledger = Ledger::default();
        let a = ledger.add_bet(win_input(day(1))).unwrap();
        let b = ledger.add_bet(win_input(day(2))).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(ledger.bets()[0].id, b.id);
        assert_eq!(ledger.bets()[1].id, a.id);
    }

    #[test]
    fn test_delete_is_inverse_of_add() {
        let mut ledger = Ledger::new(dec!(1000)).unwrap();
        ledger.add_bet(loss_input(day(1))).unwrap();
        let before = ledger.clone();

        let bet = ledger.add_bet(win_input(day(2))).unwrap();
        ledger.delete_bet(&bet.id).unwrap();

        assert_eq!(ledger.current_bankroll(), before.current_bankroll());
        assert_eq!(ledger.bankroll_history(), before.bankroll_history());
        assert_eq!(ledger.bets(), before.bets());
    }

    #[test]
    fn test_unknown_id_is_reported_and_leaves_state() {
        let mut ledger = Ledger::default();
        ledger.add_bet(win_input(day(1))).unwrap();
        let before = ledger.clone();

        assert_eq!(
            ledger.edit_bet("missing", BetPatch::default()),
            Err(LedgerError::BetNotFound("missing".into()))
        );
        assert_eq!(
            ledger.delete_bet("missing"),
            Err(LedgerError::BetNotFound("missing".into()))
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_backdated_bet_edit_and_delete() {
        let mut ledger = Ledger::new(dec!(1000)).unwrap();
        let later = ledger.add_bet(win_input(day(10))).unwrap();
        // Logged second but placed earlier.
        let earlier = ledger.add_bet(loss_input(day(3))).unwrap();

        let balances: Vec<Decimal> = ledger.bankroll_history().iter().map(|p| p.balance).collect();
        assert_eq!(balances, vec![dec!(1000), dec!(950), dec!(1100)]);

        ledger
            .edit_bet(&earlier.id, BetPatch::settle(Outcome::Win, dec!(45)))
            .unwrap();
        let balances: Vec<Decimal> = ledger.bankroll_history().iter().map(|p| p.balance).collect();
        assert_eq!(balances, vec![dec!(1000), dec!(1045), dec!(1195)]);
        assert_invariant(&ledger);

        ledger.delete_bet(&later.id).unwrap();
        let balances: Vec<Decimal> = ledger.bankroll_history().iter().map(|p| p.balance).collect();
        assert_eq!(balances, vec![dec!(1000), dec!(1045)]);
        assert_invariant(&ledger);
    }

    #[test]
    fn test_editing_date_moves_history_point() {
        let mut ledger = Ledger::new(dec!(1000)).unwrap();
        let a = ledger.add_bet(win_input(day(2))).unwrap();
        ledger.add_bet(loss_input(day(5))).unwrap();

        ledger
            .edit_bet(
                &a.id,
                BetPatch {
                    date: Some(day(8)),
                    ..BetPatch::default()
                },
            )
            .unwrap();
        let history = ledger.bankroll_history();
        assert_eq!(history[1].date, day(5));
        assert_eq!(history[1].balance, dec!(950));
        assert_eq!(history[2].date, day(8));
        assert_eq!(history[2].balance, dec!(1100));
    }

    #[test]
    fn test_invariant_after_mixed_operations() {
        let mut ledger = Ledger::new(dec!(250)).unwrap();
        let a = ledger.add_bet(win_input(day(1))).unwrap();
        let b = ledger.add_bet(loss_input(day(2))).unwrap();
        let c = ledger
            .add_bet(
                BetInput::priced(day(3), "Parlay", dec!(20), dec!(600), Outcome::Pending).unwrap(),
            )
            .unwrap();
        assert_invariant(&ledger);

        ledger.settle_bet(&c.id, Outcome::Win).unwrap();
        assert_eq!(ledger.bet(&c.id).unwrap().profit_loss, dec!(120));
        assert_invariant(&ledger);

        ledger.delete_bet(&a.id).unwrap();
        ledger
            .edit_bet(
                &b.id,
                BetPatch {
                    outcome: Some(Outcome::Pending),
                    profit_loss: Some(Decimal::ZERO),
                    ..BetPatch::default()
                },
            )
            .unwrap();
        assert_invariant(&ledger);
        assert_eq!(ledger.current_bankroll(), dec!(370));
    }

    #[test]
    fn test_overflowing_edit_is_rejected_and_leaves_state() {
        let mut ledger = Ledger::new(dec!(1000)).unwrap();
        let bet = ledger.add_bet(win_input(day(1))).unwrap();
        let before = ledger.clone();

        let patch = BetPatch {
            profit_loss: Some(Decimal::MAX),
            ..BetPatch::default()
        };
        assert_eq!(ledger.edit_bet(&bet.id, patch), Err(LedgerError::Overflow));
        assert_eq!(ledger, before);

        let mut huge = win_input(day(2));
        huge.profit_loss = Decimal::MAX;
        assert_eq!(ledger.add_bet(huge), Err(LedgerError::Overflow));
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_overflow_in_intermediate_history_rolls_back() {
        let mut ledger = Ledger::new(dec!(1000)).unwrap();
        let mut loss = win_input(day(1));
        loss.outcome = Outcome::Loss;
        loss.profit_loss = Decimal::MIN + dec!(2000);
        let early = ledger.add_bet(loss).unwrap();
        let before = ledger.clone();

        // Moving the big loss behind a big win keeps the total in range,
        // but the running balance after the win alone does not fit.
        let mut gain = win_input(day(5));
        gain.profit_loss = Decimal::MAX - dec!(500);
        let gain = ledger.add_bet(gain).unwrap();
        let after_gain = ledger.clone();
        let patch = BetPatch {
            date: Some(day(9)),
            ..BetPatch::default()
        };
        assert_eq!(ledger.edit_bet(&early.id, patch), Err(LedgerError::Overflow));
        assert_eq!(ledger, after_gain);

        ledger.delete_bet(&gain.id).unwrap();
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_cash_out_sets_outcome_from_sign() {
        let mut ledger = Ledger::new(dec!(1000)).unwrap();
        let bet = ledger
            .add_bet(
                BetInput::priced(day(1), "Futures", dec!(100), dec!(400), Outcome::Pending).unwrap(),
            )
            .unwrap();

        let cashed = ledger.cash_out(&bet.id, dec!(130)).unwrap();
        assert_eq!(cashed.outcome, Outcome::Win);
        assert_eq!(cashed.profit_loss, dec!(30));
        assert_eq!(ledger.current_bankroll(), dec!(1030));

        let cashed = ledger.cash_out(&bet.id, dec!(60)).unwrap();
        assert_eq!(cashed.outcome, Outcome::Loss);
        assert_eq!(cashed.profit_loss, dec!(-40));
        assert_eq!(ledger.current_bankroll(), dec!(960));
    }

    #[test]
    fn test_cash_out_rejects_non_positive_amount() {
        let mut ledger = Ledger::default();
        let bet = ledger.add_bet(win_input(day(1))).unwrap();
        assert_eq!(
            ledger.cash_out(&bet.id, dec!(0)),
            Err(LedgerError::InvalidCashOut(dec!(0)))
        );
    }

    #[test]
    fn test_reset_history() {
        let mut ledger = Ledger::new(dec!(1000)).unwrap();
        ledger.add_bet(win_input(day(1))).unwrap();
        ledger.add_bet(loss_input(day(2))).unwrap();

        let before = Utc::now();
        ledger.reset_history();
        let after = Utc::now();

        assert!(ledger.bets().is_empty());
        assert_eq!(ledger.current_bankroll(), dec!(1000));
        let history = ledger.bankroll_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].balance, dec!(1000));
        assert!(history[0].date >= before && history[0].date <= after);
    }

    #[test]
    fn test_set_initial_bankroll_shifts_whole_history() {
        let mut ledger = Ledger::new(dec!(1000)).unwrap();
        let seed_date = ledger.bankroll_history()[0].date;
        ledger.add_bet(win_input(day(1))).unwrap();
        ledger.add_bet(loss_input(day(2))).unwrap();

        ledger.set_initial_bankroll(dec!(2000)).unwrap();
        assert_eq!(ledger.initial_bankroll(), dec!(2000));
        assert_eq!(ledger.current_bankroll(), dec!(2100));
        let history = ledger.bankroll_history();
        assert_eq!(history[0].date, seed_date);
        let balances: Vec<Decimal> = history.iter().map(|p| p.balance).collect();
        assert_eq!(balances, vec![dec!(2000), dec!(2150), dec!(2100)]);
    }

    #[test]
    fn test_set_initial_bankroll_rejects_non_positive() {
        let mut ledger = Ledger::default();
        assert!(ledger.set_initial_bankroll(dec!(-5)).is_err());
        assert_eq!(ledger.initial_bankroll(), DEFAULT_INITIAL_BANKROLL);
    }

    #[test]
    fn test_snapshot_restore_recomputes_derived_state() {
        let mut ledger = Ledger::new(dec!(500)).unwrap();
        ledger.add_bet(win_input(day(4))).unwrap();
        ledger.add_bet(loss_input(day(1))).unwrap();

        let restored = Ledger::restore(ledger.snapshot()).unwrap();
        assert_eq!(restored, ledger);
    }

    #[test]
    fn test_filtered_and_performance_accessors() {
        let mut ledger = Ledger::default();
        let now = Utc::now();
        ledger.add_bet(win_input(now - Duration::hours(1))).unwrap();
        ledger.add_bet(loss_input(now - Duration::hours(2))).unwrap();

        let wins = ledger.filtered_bets(&BetFilter {
            show_losses: false,
            ..BetFilter::default()
        });
        assert_eq!(wins.len(), 1);

        let metrics = ledger.performance(PeriodType::Month, now);
        assert_eq!(metrics.len(), 6);
        assert_eq!(metrics.iter().map(|m| m.bets_count).sum::<u32>(), 2);
    }
}
