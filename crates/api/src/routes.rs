use std::{collections::BTreeMap, io, time::Duration};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json,
    Router,
};
use desk::{
    export::{events_csv, fills_csv},
    paper_exec::PaperExecConfig,
    HealthSnapshot, Quote, SignalKind, SignalReceipt, SignalReject, SignalRequest, SpreadLimits,
    SpreadReject, StatsReport,
};
use guard::{DenyReason, GuardConfig};
use ledger::{ExecutedFill, Fill, Position, Side};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::state::{AppState, RelaySettings};

const DEFAULT_ADMIN_COOLDOWN_SECS: u64 = 60;
const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/config", get(config))
        .route("/positions", get(positions))
        .route("/fills", get(fills))
        .route("/pnl.csv", get(pnl_csv))
        .route("/logs.csv", get(logs_csv))
        .route("/stats", get(stats))
        .route("/webhook", post(webhook))
        .route("/fills/reconcile", post(reconcile))
        .route("/admin/halt", post(admin_halt))
        .route("/admin/unhalt", post(admin_unhalt))
        .route("/admin/cooldown", post(admin_cooldown))
        .route("/admin/halt_all", post(admin_halt_all))
        .route("/admin/unhalt_all", post(admin_unhalt_all))
        .route("/admin/reset", post(admin_reset))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct OkBody<T> {
    ok: bool,
    #[serde(flatten)]
    body: T,
}

fn ok<T: Serialize>(body: T) -> Json<OkBody<T>> {
    Json(OkBody { ok: true, body })
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    ok: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    spread_pct: Option<f64>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    spread_pct: Option<f64>,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            spread_pct: None,
        }
    }

    fn bad_request(rejection: JsonRejection) -> Self {
        tracing::warn!(%rejection, "malformed request body");
        Self::new(StatusCode::BAD_REQUEST, "bad_request")
    }

    fn internal(err: io::Error) -> Self {
        tracing::error!(%err, "csv export failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl From<SignalReject> for ApiError {
    fn from(reject: SignalReject) -> Self {
        let status = match reject {
            SignalReject::Denied(DenyReason::GlobalHalt | DenyReason::Halted) => StatusCode::LOCKED,
            SignalReject::Denied(DenyReason::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
            SignalReject::Spread(_) | SignalReject::Paper(_) => StatusCode::BAD_REQUEST,
        };
        let spread_pct = match reject {
            SignalReject::Spread(SpreadReject::WideSpread { spread_pct }) => Some(spread_pct),
            _ => None,
        };

        Self {
            status,
            error: reject.code().to_string(),
            spread_pct,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            ok: false,
            error: self.error,
            spread_pct: self.spread_pct,
        };
        (self.status, Json(body)).into_response()
    }
}

async fn health(State(state): State<AppState>) -> Json<OkBody<HealthSnapshot>> {
    let now_ms = state.now_ms();
    let health = state.desk().await.health(now_ms);
    ok(health)
}

#[derive(Debug, Serialize)]
struct ConfigResponse {
    relay: RelaySettings,
    guard: GuardConfig,
    paper: PaperExecConfig,
    spread: SpreadLimits,
}

async fn config(State(state): State<AppState>) -> Json<OkBody<ConfigResponse>> {
    let desk = state.desk().await;
    ok(ConfigResponse {
        relay: state.settings().clone(),
        guard: desk.guard_config().clone(),
        paper: *desk.paper_config(),
        spread: *desk.spread_limits(),
    })
}

#[derive(Debug, Serialize)]
struct PositionsResponse {
    positions: BTreeMap<String, Position>,
}

async fn positions(State(state): State<AppState>) -> Json<OkBody<PositionsResponse>> {
    let now_ms = state.now_ms();
    let positions = state.desk().await.open_positions(now_ms);
    ok(PositionsResponse { positions })
}

#[derive(Debug, Serialize)]
struct FillsResponse {
    fills: Vec<Fill>,
}

async fn fills(State(state): State<AppState>) -> Json<OkBody<FillsResponse>> {
    let now_ms = state.now_ms();
    let fills = state.desk().await.fills(now_ms);
    ok(FillsResponse { fills })
}

async fn pnl_csv(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let now_ms = state.now_ms();
    let fills = state.desk().await.fills(now_ms);
    let body = fills_csv(&fills).map_err(ApiError::internal)?;

    Ok(([(header::CONTENT_TYPE, CSV_CONTENT_TYPE)], body))
}

async fn logs_csv(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = events_csv(state.desk().await.events()).map_err(ApiError::internal)?;

    Ok(([(header::CONTENT_TYPE, CSV_CONTENT_TYPE)], body))
}

async fn stats(State(state): State<AppState>) -> Json<OkBody<StatsReport>> {
    let now_ms = state.now_ms();
    let report = state.desk().await.stats(now_ms);
    ok(report)
}

#[derive(Debug, Deserialize)]
struct WebhookRequest {
    signal: String,
    symbol: Option<String>,
    notional: Option<f64>,
    price: f64,
    bid: Option<f64>,
    ask: Option<f64>,
    #[serde(alias = "autoCloseSec")]
    auto_close_sec: Option<u64>,
}

#[derive(Debug, Serialize)]
struct WebhookResponse {
    #[serde(flatten)]
    receipt: SignalReceipt,
    auto_close_sec: Option<u64>,
}

async fn webhook(
    State(state): State<AppState>,
    request: Result<Json<WebhookRequest>, JsonRejection>,
) -> Result<Json<OkBody<WebhookResponse>>, ApiError> {
    let Json(request) = request.map_err(ApiError::bad_request)?;
    let signal = request.signal.parse::<SignalKind>().map_err(|err| {
        tracing::warn!(%err, "webhook rejected");
        ApiError::new(StatusCode::BAD_REQUEST, "bad_signal")
    })?;

    let settings = state.settings();
    let symbol = settings.resolve_symbol(request.symbol.as_deref());
    // A half-quoted book is checked as thin rather than skipped.
    let quote = match (request.bid, request.ask) {
        (None, None) => None,
        (bid, ask) => Some(Quote {
            bid: bid.unwrap_or(0.0),
            ask: ask.unwrap_or(0.0),
        }),
    };
    let signal_request = SignalRequest {
        symbol: symbol.clone(),
        signal,
        base_notional: request.notional.unwrap_or(settings.default_notional),
        ref_price: request.price,
        quote,
    };

    let now_ms = state.now_ms();
    let receipt = state
        .desk()
        .await
        .execute_signal(signal_request, now_ms)
        .map_err(|reject| {
            tracing::warn!(%symbol, %signal, reason = %reject, "signal rejected");
            ApiError::from(reject)
        })?;
    tracing::info!(
        %symbol,
        %signal,
        notional = receipt.notional,
        amount = receipt.amount,
        "signal executed"
    );

    let auto_close_sec = request
        .auto_close_sec
        .filter(|secs| *secs > 0 && signal.is_entry());
    if let Some(secs) = auto_close_sec {
        spawn_auto_close(
            state.clone(),
            symbol,
            signal.side().opposite(),
            receipt.amount,
            secs,
        );
    }

    Ok(ok(WebhookResponse {
        receipt,
        auto_close_sec,
    }))
}

/// Closes the entry after `secs`. The timer lives only as long as the process.
fn spawn_auto_close(state: AppState, symbol: String, side: Side, amount: f64, secs: u64) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(secs)).await;
        let now_ms = state.now_ms();
        let closed = state.desk().await.close_position(&symbol, side, amount, now_ms);
        match closed {
            Some(applied) => tracing::info!(
                %symbol,
                realized_pnl = applied.realized_pnl,
                "auto-close filled"
            ),
            None => tracing::info!(%symbol, "auto-close skipped, nothing left to close"),
        }
    });
}

#[derive(Debug, Deserialize)]
struct ReconcileFill {
    id: String,
    symbol: String,
    side: Side,
    price: f64,
    amount: f64,
    #[serde(default)]
    fee: f64,
    ts: Option<u64>,
}

impl ReconcileFill {
    fn into_executed(self, now_ms: u64) -> Result<ExecutedFill, ApiError> {
        let amount = self.amount.abs();
        let valid = self.price.is_finite()
            && self.price > 0.0
            && amount.is_finite()
            && amount > 0.0
            && self.fee.is_finite()
            && self.fee >= 0.0;
        if !valid {
            return Err(ApiError::new(StatusCode::BAD_REQUEST, "invalid_fill"));
        }

        let fill_id = format!("{}:{}", self.id, self.symbol);
        Ok(ExecutedFill::new(
            self.ts.unwrap_or(now_ms),
            self.symbol,
            self.side,
            self.price,
            amount,
            self.fee,
        )
        .with_fill_id(fill_id))
    }
}

#[derive(Debug, Serialize)]
struct ReconcileResponse {
    applied: usize,
}

async fn reconcile(
    State(state): State<AppState>,
    fills: Result<Json<Vec<ReconcileFill>>, JsonRejection>,
) -> Result<Json<OkBody<ReconcileResponse>>, ApiError> {
    let Json(fills) = fills.map_err(ApiError::bad_request)?;
    let now_ms = state.now_ms();
    let fills = fills
        .into_iter()
        .map(|fill| fill.into_executed(now_ms))
        .collect::<Result<Vec<_>, _>>()?;

    let applied = state.desk().await.reconcile_fills(fills, now_ms);
    tracing::info!(applied, "fills reconciled");
    Ok(ok(ReconcileResponse { applied }))
}

#[derive(Debug, Default, Deserialize)]
struct AdminRequest {
    symbol: Option<String>,
    seconds: Option<u64>,
}

impl AdminRequest {
    fn from_body(body: Option<Json<AdminRequest>>) -> Self {
        body.map(|Json(request)| request).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
struct HaltResponse {
    halted: String,
}

#[derive(Debug, Serialize)]
struct UnhaltResponse {
    unhalted: String,
}

#[derive(Debug, Serialize)]
struct CooldownResponse {
    symbol: String,
    seconds: u64,
}

#[derive(Debug, Serialize)]
struct GlobalHaltResponse {
    global_halt: bool,
}

async fn admin_halt(
    State(state): State<AppState>,
    body: Option<Json<AdminRequest>>,
) -> Json<OkBody<HaltResponse>> {
    let request = AdminRequest::from_body(body);
    let symbol = state.settings().resolve_symbol(request.symbol.as_deref());
    let now_ms = state.now_ms();

    state.desk().await.halt_symbol(&symbol, now_ms);
    tracing::info!(%symbol, "symbol halted");
    ok(HaltResponse { halted: symbol })
}

async fn admin_unhalt(
    State(state): State<AppState>,
    body: Option<Json<AdminRequest>>,
) -> Json<OkBody<UnhaltResponse>> {
    let request = AdminRequest::from_body(body);
    let symbol = state.settings().resolve_symbol(request.symbol.as_deref());
    let now_ms = state.now_ms();

    state.desk().await.unhalt_symbol(&symbol, now_ms);
    tracing::info!(%symbol, "symbol unhalted");
    ok(UnhaltResponse { unhalted: symbol })
}

async fn admin_cooldown(
    State(state): State<AppState>,
    body: Option<Json<AdminRequest>>,
) -> Json<OkBody<CooldownResponse>> {
    let request = AdminRequest::from_body(body);
    let symbol = state.settings().resolve_symbol(request.symbol.as_deref());
    let seconds = request.seconds.unwrap_or(DEFAULT_ADMIN_COOLDOWN_SECS);
    let now_ms = state.now_ms();

    state.desk().await.set_cooldown(&symbol, seconds, now_ms);
    tracing::info!(%symbol, seconds, "cooldown set");
    ok(CooldownResponse { symbol, seconds })
}

async fn admin_halt_all(State(state): State<AppState>) -> Json<OkBody<GlobalHaltResponse>> {
    set_global_halt(&state, true).await
}

async fn admin_unhalt_all(State(state): State<AppState>) -> Json<OkBody<GlobalHaltResponse>> {
    set_global_halt(&state, false).await
}

async fn set_global_halt(state: &AppState, halted: bool) -> Json<OkBody<GlobalHaltResponse>> {
    let now_ms = state.now_ms();
    state.desk().await.set_global_halt(halted, now_ms);
    tracing::warn!(halted, "master halt toggled");
    ok(GlobalHaltResponse {
        global_halt: halted,
    })
}

async fn admin_reset(State(state): State<AppState>) -> Json<serde_json::Value> {
    let now_ms = state.now_ms();
    state.desk().await.reset(now_ms);
    tracing::warn!("desk reset");
    Json(json!({ "ok": true }))
}
