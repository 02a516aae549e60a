use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, warn};

use crate::db::Database;
use crate::ledger::{
    calculate_profit_loss, convert_odds, BankrollPoint, Bet, BetFilter, BetInput, BetPatch,
    Ledger, LedgerError, Odds, OddsError, OddsFormat, Outcome, PerformanceMetric,
    PerformanceSummary, PeriodType,
};

type ApiResult<T> = Result<T, (StatusCode, String)>;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Mutex<Ledger>>,
    pub db: Database,
    /// Notation odds are echoed back in
    pub odds_format: OddsFormat,
}

/// Build the Axum router for the ledger API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/state", get(state_handler))
        .route("/api/bets", get(list_bets_handler).post(add_bet_handler))
        .route(
            "/api/bets/:id",
            get(get_bet_handler)
                .patch(edit_bet_handler)
                .delete(delete_bet_handler),
        )
        .route("/api/bets/:id/settle", post(settle_bet_handler))
        .route("/api/bets/:id/cash-out", post(cash_out_handler))
        .route("/api/reset", post(reset_handler))
        .route("/api/initial-bankroll", put(initial_bankroll_handler))
        .route("/api/bankroll-history", get(bankroll_history_handler))
        .route("/api/performance", get(performance_handler))
        .route("/api/odds/convert", get(convert_odds_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

// ── Request / response shapes ────────────────────────────────────────────────

/// A bet as submitted by the entry form. Odds may be in any notation;
/// profit/loss is derived from the outcome when omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBet {
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tipster: Option<String>,
    pub bet_amount: Decimal,
    pub odds: String,
    #[serde(default)]
    pub odds_format: Option<OddsFormat>,
    #[serde(default = "pending")]
    pub outcome: Outcome,
    #[serde(default)]
    pub profit_loss: Option<Decimal>,
}

fn pending() -> Outcome {
    Outcome::Pending
}

impl NewBet {
    /// Normalize odds to American and fill in defaults.
    pub fn into_input(self, default_format: OddsFormat) -> Result<BetInput, OddsError> {
        let format = self.odds_format.unwrap_or(default_format);
        let odds = Odds::parse(&self.odds, format)?.to_american()?;
        let profit_loss = match self.profit_loss {
            Some(pnl) => pnl,
            None => calculate_profit_loss(self.bet_amount, odds, self.outcome)?,
        };
        Ok(BetInput {
            date: self.date.unwrap_or_else(Utc::now),
            description: self.description,
            category: self.category.filter(|c| !c.trim().is_empty()),
            tipster: self.tipster.filter(|t| !t.trim().is_empty()),
            bet_amount: self.bet_amount,
            odds,
            outcome: self.outcome,
            profit_loss,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BetView {
    #[serde(flatten)]
    pub bet: Bet,
    /// Odds rendered in the configured notation
    pub display_odds: String,
}

impl BetView {
    fn new(bet: Bet, format: OddsFormat) -> Self {
        let display_odds = Odds::american(bet.odds)
            .convert(format)
            .map(|o| o.to_string())
            .unwrap_or_else(|_| bet.odds.to_string());
        Self { bet, display_odds }
    }
}

#[derive(Debug, Serialize)]
struct StateView {
    initial_bankroll: Decimal,
    current_bankroll: Decimal,
    bets: Vec<BetView>,
    bankroll_history: Vec<BankrollPoint>,
}

#[derive(Debug, Deserialize)]
struct SettleRequest {
    outcome: Outcome,
}

#[derive(Debug, Deserialize)]
struct AmountRequest {
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct PerformanceQuery {
    #[serde(default = "default_period")]
    period: PeriodType,
}

fn default_period() -> PeriodType {
    PeriodType::Day
}

#[derive(Debug, Serialize)]
struct PerformanceView {
    period: PeriodType,
    metrics: Vec<PerformanceMetric>,
    summary: PerformanceSummary,
}

#[derive(Debug, Deserialize)]
struct ConvertQuery {
    value: String,
    from: OddsFormat,
    to: OddsFormat,
}

#[derive(Debug, Serialize)]
struct ConvertView {
    odds: Odds,
    display: String,
}

// ── Error mapping ────────────────────────────────────────────────────────────

fn ledger_error(err: LedgerError) -> (StatusCode, String) {
    let status = match err {
        LedgerError::BetNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::InvalidBankroll(_)
        | LedgerError::InvalidCashOut(_)
        | LedgerError::Overflow
        | LedgerError::Odds(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (status, err.to_string())
}

fn unprocessable(err: impl ToString) -> (StatusCode, String) {
    (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
}

fn lock(state: &AppState) -> ApiResult<MutexGuard<'_, Ledger>> {
    state.ledger.lock().map_err(|_| {
        error!("Ledger mutex poisoned");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "ledger unavailable".to_string(),
        )
    })
}

/// Write the ledger back to SQLite after a mutation.
fn persist(state: &AppState, ledger: &Ledger) -> ApiResult<()> {
    state.db.save_snapshot(&ledger.snapshot()).map_err(|e| {
        error!("Failed to persist ledger snapshot: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })
}

/// Run `mutate` on a copy of the ledger and save that copy. The live ledger
/// is only replaced once the snapshot is on disk, so a failed mutation or a
/// failed save leaves memory and SQLite in step.
fn commit<T>(
    state: &AppState,
    mutate: impl FnOnce(&mut Ledger) -> Result<T, LedgerError>,
) -> ApiResult<T> {
    let mut ledger = lock(state)?;
    let mut next = ledger.clone();
    let out = mutate(&mut next).map_err(ledger_error)?;
    persist(state, &next)?;
    *ledger = next;
    Ok(out)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /api/state
async fn state_handler(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let ledger = lock(&state)?;
    Ok(Json(StateView {
        initial_bankroll: ledger.initial_bankroll(),
        current_bankroll: ledger.current_bankroll(),
        bets: ledger
            .bets()
            .iter()
            .cloned()
            .map(|b| BetView::new(b, state.odds_format))
            .collect(),
        bankroll_history: ledger.bankroll_history().to_vec(),
    }))
}

/// GET /api/bets?search=&tipster=&show_pending=&show_wins=&show_losses=
async fn list_bets_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<BetFilter>,
) -> ApiResult<impl IntoResponse> {
    let ledger = lock(&state)?;
    let bets: Vec<BetView> = ledger
        .filtered_bets(&filter)
        .into_iter()
        .cloned()
        .map(|b| BetView::new(b, state.odds_format))
        .collect();
    Ok(Json(bets))
}

/// GET /api/bets/:id
async fn get_bet_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let ledger = lock(&state)?;
    ledger
        .bet(&id)
        .cloned()
        .map(|b| Json(BetView::new(b, state.odds_format)))
        .ok_or_else(|| ledger_error(LedgerError::BetNotFound(id)))
}

/// POST /api/bets
async fn add_bet_handler(
    State(state): State<Arc<AppState>>,
    Json(new_bet): Json<NewBet>,
) -> ApiResult<impl IntoResponse> {
    let input = new_bet.into_input(state.odds_format).map_err(unprocessable)?;
    if let Err(e) = input.validate() {
        warn!("Rejected bet '{}': {}", input.description, e);
        return Err(unprocessable(e));
    }
    let bet = commit(&state, |ledger| ledger.add_bet(input))?;
    Ok((StatusCode::CREATED, Json(BetView::new(bet, state.odds_format))))
}

/// PATCH /api/bets/:id
async fn edit_bet_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<BetPatch>,
) -> ApiResult<impl IntoResponse> {
    if let Err(e) = patch.validate() {
        warn!("Rejected edit of bet {}: {}", id, e);
        return Err(unprocessable(e));
    }
    let bet = commit(&state, |ledger| ledger.edit_bet(&id, patch))?;
    Ok(Json(BetView::new(bet, state.odds_format)))
}

/// DELETE /api/bets/:id
async fn delete_bet_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    commit(&state, |ledger| ledger.delete_bet(&id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/bets/:id/settle
async fn settle_bet_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SettleRequest>,
) -> ApiResult<impl IntoResponse> {
    let bet = commit(&state, |ledger| ledger.settle_bet(&id, req.outcome))?;
    Ok(Json(BetView::new(bet, state.odds_format)))
}

/// POST /api/bets/:id/cash-out
async fn cash_out_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<impl IntoResponse> {
    let bet = commit(&state, |ledger| ledger.cash_out(&id, req.amount))?;
    Ok(Json(BetView::new(bet, state.odds_format)))
}

/// POST /api/reset
async fn reset_handler(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    commit(&state, |ledger| {
        ledger.reset_history();
        Ok(())
    })?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/initial-bankroll
async fn initial_bankroll_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<impl IntoResponse> {
    commit(&state, |ledger| ledger.set_initial_bankroll(req.amount))?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/bankroll-history
async fn bankroll_history_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let ledger = lock(&state)?;
    Ok(Json(ledger.bankroll_history().to_vec()))
}

/// GET /api/performance?period=day|week|month
async fn performance_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PerformanceQuery>,
) -> ApiResult<impl IntoResponse> {
    let ledger = lock(&state)?;
    let metrics = ledger.performance(query.period, Utc::now());
    let summary = PerformanceSummary::from_metrics(&metrics);
    Ok(Json(PerformanceView {
        period: query.period,
        metrics,
        summary,
    }))
}

/// GET /api/odds/convert?value=3/2&from=fractional&to=american
async fn convert_odds_handler(Query(query): Query<ConvertQuery>) -> ApiResult<impl IntoResponse> {
    let odds = convert_odds(&query.value, query.from, query.to).map_err(unprocessable)?;
    Ok(Json(ConvertView {
        display: odds.to_string(),
        odds,
    }))
}
