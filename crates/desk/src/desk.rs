use std::collections::{BTreeMap, HashMap};
use std::fmt;

use guard::{
    Admission, DenyReason, GuardConfig, GuardConfigError, GuardStateMachine, GuardStatus,
    HaltStatus,
};
use ledger::{
    bucket_key, AppliedFill, DailyBucket, ExecutedFill, Fill, Position, PositionLedger, Side,
    DEFAULT_FILL_CAPACITY, HOUR_MS,
};
use serde::Serialize;

use crate::logging::{
    DeskLogEvent, DeskLogEventKind, DeskLogWriter, InMemoryDeskLog, DEFAULT_EVENT_CAPACITY,
};
use crate::paper_exec::{paper_fill, qty_for_notional, PaperExecConfig, PaperExecError};
use crate::signal::SignalKind;
use crate::spread::{check_spread, Quote, SpreadLimits, SpreadReject};
use crate::stats::PerformanceStats;

const RECENT_EVENTS_IN_STATS: usize = 25;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeskConfig {
    pub guard: GuardConfig,
    pub paper: PaperExecConfig,
    pub spread: SpreadLimits,
    pub fill_capacity: usize,
    pub event_capacity: usize,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            guard: GuardConfig::default(),
            paper: PaperExecConfig::default(),
            spread: SpreadLimits::default(),
            fill_capacity: DEFAULT_FILL_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl DeskConfig {
    pub fn validate(&self) -> Result<(), DeskConfigError> {
        self.guard.validate()?;
        if self.fill_capacity == 0 {
            return Err(DeskConfigError::ZeroFillCapacity);
        }
        if self.event_capacity == 0 {
            return Err(DeskConfigError::ZeroEventCapacity);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeskConfigError {
    Guard(GuardConfigError),
    ZeroFillCapacity,
    ZeroEventCapacity,
}

impl From<GuardConfigError> for DeskConfigError {
    fn from(err: GuardConfigError) -> Self {
        Self::Guard(err)
    }
}

impl fmt::Display for DeskConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guard(err) => write!(f, "invalid guard settings: {err}"),
            Self::ZeroFillCapacity => write!(f, "fill log capacity must be positive"),
            Self::ZeroEventCapacity => write!(f, "event log capacity must be positive"),
        }
    }
}

impl std::error::Error for DeskConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Guard(err) => Some(err),
            Self::ZeroFillCapacity | Self::ZeroEventCapacity => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalRequest {
    pub symbol: String,
    pub signal: SignalKind,
    pub base_notional: f64,
    /// Price the paper fill is simulated against.
    pub ref_price: f64,
    /// Top of book; the spread check is skipped when absent.
    pub quote: Option<Quote>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalReceipt {
    pub symbol: String,
    pub signal: SignalKind,
    pub notional: f64,
    pub fill_price: f64,
    pub amount: f64,
    pub fee: f64,
    pub realized_pnl: f64,
    pub spread_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalReject {
    Denied(DenyReason),
    Spread(SpreadReject),
    Paper(PaperExecError),
}

impl SignalReject {
    pub fn code(self) -> &'static str {
        match self {
            Self::Denied(reason) => reason.as_str(),
            Self::Spread(reject) => reject.as_str(),
            Self::Paper(_) => "invalid_fill",
        }
    }
}

impl fmt::Display for SignalReject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Denied(reason) => write!(f, "{reason}"),
            Self::Spread(reject) => write!(f, "{reject}"),
            Self::Paper(err) => write!(f, "invalid_fill: {err}"),
        }
    }
}

impl std::error::Error for SignalReject {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub global_halt: bool,
    pub daily_key: String,
    pub trades_today: u64,
    pub pnl_today: f64,
    pub trades_last_hour: usize,
    pub cooldown_secs: BTreeMap<String, u64>,
    pub halted: BTreeMap<String, HaltStatus>,
    pub last_spread_pct: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub daily_key: String,
    #[serde(flatten)]
    pub performance: PerformanceStats,
    pub last_events: Vec<DeskLogEvent>,
}

/// Position ledger and trading guards behind one admission API.
///
/// Every public operation first checks the daily bucket; crossing into a new
/// bucket clears positions, fills, loss streaks, cooldowns, halts and the rate
/// window before the operation proceeds.
#[derive(Debug, Clone)]
pub struct TradingDesk {
    guard: GuardStateMachine,
    ledger: PositionLedger,
    events: InMemoryDeskLog,
    paper: PaperExecConfig,
    spread: SpreadLimits,
    last_spread: BTreeMap<String, f64>,
    mark_prices: HashMap<String, f64>,
}

impl TradingDesk {
    pub fn new(config: DeskConfig) -> Result<Self, DeskConfigError> {
        config.validate()?;

        Ok(Self {
            guard: GuardStateMachine::new(config.guard)?,
            ledger: PositionLedger::with_fill_capacity(config.fill_capacity),
            events: InMemoryDeskLog::with_capacity(config.event_capacity),
            paper: config.paper,
            spread: config.spread,
            last_spread: BTreeMap::new(),
            mark_prices: HashMap::new(),
        })
    }

    pub fn guard_config(&self) -> &GuardConfig {
        self.guard.config()
    }

    pub fn paper_config(&self) -> &PaperExecConfig {
        &self.paper
    }

    pub fn spread_limits(&self) -> &SpreadLimits {
        &self.spread
    }

    /// Rolls into the bucket for `now_ms`, returning whether a reset happened.
    pub fn ensure_bucket(&mut self, now_ms: u64) -> bool {
        if !self.guard.roll_over(now_ms) {
            return false;
        }

        self.ledger.clear();
        let key = self.guard.daily().key.clone();
        self.log(now_ms, DeskLogEventKind::DailyReset, format!("Daily reset {key}"));
        true
    }

    pub fn can_execute(&mut self, symbol: &str, now_ms: u64) -> Admission {
        self.ensure_bucket(now_ms);
        self.guard.can_execute(symbol, now_ms)
    }

    pub fn adjusted_notional(&mut self, symbol: &str, base_notional: f64, now_ms: u64) -> f64 {
        self.ensure_bucket(now_ms);
        self.guard.adjusted_notional(symbol, base_notional)
    }

    /// Applies a fill to its position. A fill that reduced or flipped the
    /// position feeds its realized PnL into the symbol's guards.
    pub fn apply_fill(&mut self, fill: ExecutedFill, now_ms: u64) -> AppliedFill {
        self.ensure_bucket(now_ms);
        self.apply_fill_in_bucket(fill, now_ms)
    }

    pub fn record_execution(&mut self, now_ms: u64) {
        self.ensure_bucket(now_ms);
        self.guard.record_execution(now_ms);
    }

    /// Runs a signal through admission, sizing and a simulated fill.
    pub fn execute_signal(
        &mut self,
        request: SignalRequest,
        now_ms: u64,
    ) -> Result<SignalReceipt, SignalReject> {
        let SignalRequest {
            symbol,
            signal,
            base_notional,
            ref_price,
            quote,
        } = request;

        self.set_mark_price(&symbol, ref_price);
        if let Admission::Denied(reason) = self.can_execute(&symbol, now_ms) {
            self.log(
                now_ms,
                DeskLogEventKind::AdmissionDenied,
                format!("DENY {signal} {symbol} reason={reason}"),
            );
            return Err(SignalReject::Denied(reason));
        }

        let spread_pct = match quote {
            Some(quote) => {
                let checked = check_spread(quote, &self.spread);
                let observed = match checked {
                    Ok(spread) | Err(SpreadReject::WideSpread { spread_pct: spread }) => spread,
                    Err(SpreadReject::ThinBook) => f64::INFINITY,
                };
                self.last_spread.insert(symbol.clone(), observed);
                match checked {
                    Ok(spread) => Some(spread),
                    Err(reject) => {
                        self.log(
                            now_ms,
                            DeskLogEventKind::AdmissionDenied,
                            format!("DENY {signal} {symbol} reason={reject}"),
                        );
                        return Err(SignalReject::Spread(reject));
                    }
                }
            }
            None => None,
        };

        let notional = self.guard.adjusted_notional(&symbol, base_notional);
        let side = signal.side();
        let fill = qty_for_notional(notional, ref_price)
            .and_then(|qty| paper_fill(side, ref_price, qty, &self.paper))
            .map_err(SignalReject::Paper)?;

        let applied = self.apply_fill_in_bucket(
            ExecutedFill::new(now_ms, symbol.clone(), side, fill.fill_px, fill.qty, fill.fee),
            now_ms,
        );
        self.guard.record_execution(now_ms);
        self.log(
            now_ms,
            DeskLogEventKind::Execution,
            format!(
                "EXEC {signal} {symbol} notional={notional} qty={} px={}",
                fill.qty, fill.fill_px
            ),
        );

        Ok(SignalReceipt {
            symbol,
            signal,
            notional,
            fill_price: fill.fill_px,
            amount: fill.qty,
            fee: fill.fee,
            realized_pnl: applied.realized_pnl,
            spread_pct,
        })
    }

    /// Records the latest observed price for `symbol`. Non-positive or
    /// non-finite prices are ignored.
    pub fn set_mark_price(&mut self, symbol: &str, price: f64) {
        if price.is_finite() && price > 0.0 {
            self.mark_prices.insert(symbol.to_string(), price);
        }
    }

    pub fn mark_price(&self, symbol: &str) -> Option<f64> {
        self.mark_prices.get(symbol).copied()
    }

    /// Trades up to `amount` of `symbol` on `side` at its latest mark price,
    /// bypassing the guards. The close is booked without slippage or fee, so a
    /// market that has not moved realizes nothing. The amount is capped at the
    /// open quantity and never flips a position. Returns `None` when there is no
    /// mark price or no position for `side` to reduce.
    pub fn close_position(
        &mut self,
        symbol: &str,
        side: Side,
        amount: f64,
        now_ms: u64,
    ) -> Option<AppliedFill> {
        self.ensure_bucket(now_ms);
        let position = self.ledger.position(symbol);
        if position.side() != Some(side.opposite()) {
            return None;
        }
        let amount = amount.min(position.quantity.abs());
        if !(amount.is_finite() && amount > 0.0) {
            return None;
        }
        let mark = self.mark_price(symbol)?;

        let applied = self.apply_fill_in_bucket(
            ExecutedFill::new(now_ms, symbol, side, mark, amount, 0.0),
            now_ms,
        );
        self.log(
            now_ms,
            DeskLogEventKind::AutoClose,
            format!("AUTO-CLOSE {symbol} {} qty={amount} px={mark}", side.as_str()),
        );
        Some(applied)
    }

    /// Applies externally discovered fills once each. Fills already in the log
    /// under the same id, and fills stamped before the current bucket began,
    /// are skipped. Returns how many were applied.
    pub fn reconcile_fills(
        &mut self,
        fills: impl IntoIterator<Item = ExecutedFill>,
        now_ms: u64,
    ) -> usize {
        self.ensure_bucket(now_ms);
        let bucket_start = bucket_start_ms(now_ms, self.guard.config().daily_reset_hour_utc);

        let mut applied = 0;
        for fill in fills {
            if fill.ts < bucket_start {
                continue;
            }
            if let Some(fill_id) = &fill.fill_id {
                if self.ledger.has_fill_id(fill_id) {
                    continue;
                }
            }
            let symbol = fill.symbol.clone();
            let price = fill.price;
            self.apply_fill_in_bucket(fill, now_ms);
            self.set_mark_price(&symbol, price);
            applied += 1;
        }

        if applied > 0 {
            self.log(
                now_ms,
                DeskLogEventKind::Reconciled,
                format!("RECONCILE applied={applied}"),
            );
        }
        applied
    }

    pub fn position(&mut self, symbol: &str, now_ms: u64) -> Position {
        self.ensure_bucket(now_ms);
        self.ledger.position(symbol)
    }

    pub fn open_positions(&mut self, now_ms: u64) -> BTreeMap<String, Position> {
        self.ensure_bucket(now_ms);
        self.ledger.open_positions()
    }

    pub fn fills(&mut self, now_ms: u64) -> Vec<Fill> {
        self.ensure_bucket(now_ms);
        self.ledger.fills().iter().cloned().collect()
    }

    pub fn daily(&mut self, now_ms: u64) -> DailyBucket {
        self.ensure_bucket(now_ms);
        self.guard.daily().clone()
    }

    pub fn guard_status(&mut self, symbol: &str, now_ms: u64) -> GuardStatus {
        self.ensure_bucket(now_ms);
        self.guard.status(symbol, now_ms)
    }

    pub fn global_halt(&self) -> bool {
        self.guard.global_halt()
    }

    pub fn health(&mut self, now_ms: u64) -> HealthSnapshot {
        self.ensure_bucket(now_ms);
        let statuses = self.guard.statuses(now_ms);
        let trades_last_hour = self.guard.trades_last_hour(now_ms);
        let daily = self.guard.daily();

        HealthSnapshot {
            global_halt: self.guard.global_halt(),
            daily_key: daily.key.clone(),
            trades_today: daily.trade_count,
            pnl_today: daily.cumulative_pnl,
            trades_last_hour,
            cooldown_secs: statuses
                .iter()
                .filter_map(|(symbol, status)| Some((symbol.clone(), status.cooldown_secs?)))
                .collect(),
            halted: statuses
                .iter()
                .filter_map(|(symbol, status)| Some((symbol.clone(), status.halt?)))
                .collect(),
            last_spread_pct: self.last_spread.clone(),
        }
    }

    pub fn stats(&mut self, now_ms: u64) -> StatsReport {
        self.ensure_bucket(now_ms);

        StatsReport {
            daily_key: self.guard.daily().key.clone(),
            performance: PerformanceStats::from_fills(self.ledger.fills().iter()),
            last_events: self.events.recent(RECENT_EVENTS_IN_STATS),
        }
    }

    pub fn events(&self) -> impl Iterator<Item = &DeskLogEvent> {
        self.events.events()
    }

    pub fn halt_symbol(&mut self, symbol: &str, now_ms: u64) {
        self.ensure_bucket(now_ms);
        self.guard.halt_symbol(symbol);
        self.log(now_ms, DeskLogEventKind::Halt, format!("HALT {symbol}"));
    }

    pub fn unhalt_symbol(&mut self, symbol: &str, now_ms: u64) {
        self.ensure_bucket(now_ms);
        self.guard.unhalt_symbol(symbol);
        self.log(now_ms, DeskLogEventKind::Unhalt, format!("UNHALT {symbol}"));
    }

    pub fn set_cooldown(&mut self, symbol: &str, secs: u64, now_ms: u64) {
        self.ensure_bucket(now_ms);
        self.guard.set_cooldown(symbol, secs, now_ms);
        self.log(
            now_ms,
            DeskLogEventKind::Cooldown,
            format!("COOLDOWN {symbol} {secs}s"),
        );
    }

    pub fn set_global_halt(&mut self, halted: bool, now_ms: u64) {
        self.guard.set_global_halt(halted);
        let (kind, message) = if halted {
            (DeskLogEventKind::MasterHaltEnabled, "MASTER HALT enabled")
        } else {
            (DeskLogEventKind::MasterHaltDisabled, "MASTER HALT disabled")
        };
        self.log(now_ms, kind, message);
    }

    /// Clears positions, fills, guards, the master halt and observed spreads.
    /// Configuration, the bucket key and the event log survive.
    pub fn reset(&mut self, now_ms: u64) {
        self.ensure_bucket(now_ms);
        self.ledger.clear();
        self.guard.reset();
        self.last_spread.clear();
        self.mark_prices.clear();
        self.log(now_ms, DeskLogEventKind::Reset, "RESET");
    }

    fn apply_fill_in_bucket(&mut self, fill: ExecutedFill, now_ms: u64) -> AppliedFill {
        let symbol = fill.symbol.clone();
        let applied = self.ledger.apply_fill(fill);
        if applied.effect.reduced_exposure() {
            self.guard
                .on_realized_pnl(&symbol, applied.realized_pnl, now_ms);
        }
        applied
    }

    fn log(&mut self, now_ms: u64, kind: DeskLogEventKind, message: impl Into<String>) {
        self.events.write(DeskLogEvent::new(now_ms, kind, message));
    }
}

/// Epoch millisecond at which the bucket containing `now_ms` began.
fn bucket_start_ms(now_ms: u64, reset_hour_utc: u8) -> u64 {
    let key = bucket_key(now_ms, reset_hour_utc);
    let mut start = now_ms - now_ms % HOUR_MS;
    while start >= HOUR_MS && bucket_key(start - 1, reset_hour_utc) == key {
        start -= HOUR_MS;
    }
    start
}
