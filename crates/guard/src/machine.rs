use std::collections::{BTreeMap, HashMap};

use ledger::DailyBucket;

use crate::admission::{Admission, DenyReason};
use crate::config::{GuardConfig, GuardConfigError};
use crate::rate::RateWindow;
use crate::state::{GuardStatus, Halt, SymbolGuard};

/// Per-symbol loss guards plus the global halt, daily bucket and rate window
/// that gate signal execution.
#[derive(Debug, Clone)]
pub struct GuardStateMachine {
    config: GuardConfig,
    symbols: HashMap<String, SymbolGuard>,
    global_halt: bool,
    daily: DailyBucket,
    rate_window: RateWindow,
}

impl GuardStateMachine {
    pub fn new(config: GuardConfig) -> Result<Self, GuardConfigError> {
        config.validate()?;

        Ok(Self {
            config,
            symbols: HashMap::new(),
            global_halt: false,
            daily: DailyBucket::default(),
            rate_window: RateWindow::new(),
        })
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Moves to the bucket for `now_ms`. On a key change every per-symbol
    /// guard and the rate window are cleared and `true` is returned; the
    /// master halt survives.
    pub fn roll_over(&mut self, now_ms: u64) -> bool {
        if !self.daily.roll(now_ms, self.config.daily_reset_hour_utc) {
            return false;
        }

        self.symbols.clear();
        self.rate_window.clear();
        true
    }

    /// Checks, in order, the master halt, the symbol halt and the hourly rate
    /// cap. An elapsed timed halt is lifted here.
    pub fn can_execute(&mut self, symbol: &str, now_ms: u64) -> Admission {
        if self.global_halt {
            return Admission::Denied(DenyReason::GlobalHalt);
        }

        if let Some(guard) = self.symbols.get_mut(symbol) {
            guard.normalize(now_ms);
            if guard.halt.is_some() {
                return Admission::Denied(DenyReason::Halted);
            }
        }

        if self.rate_window.count(now_ms) >= self.config.max_trades_per_hour {
            return Admission::Denied(DenyReason::RateLimited);
        }

        Admission::Allowed
    }

    pub fn adjusted_notional(&self, symbol: &str, base_notional: f64) -> f64 {
        let factor = self.config.reduce_factor(self.loss_streak(symbol));
        (base_notional * factor).max(self.config.min_notional)
    }

    /// Feeds the realized PnL of a position-reducing fill back into the
    /// symbol's loss streak, cooldown and halt.
    pub fn on_realized_pnl(&mut self, symbol: &str, realized_pnl: f64, now_ms: u64) {
        self.daily.add_pnl(realized_pnl);

        if realized_pnl > 0.0 {
            if let Some(guard) = self.symbols.get_mut(symbol) {
                guard.loss_streak = 0;
            }
            return;
        }
        if realized_pnl >= 0.0 || realized_pnl.is_nan() {
            return;
        }

        let cooldown_ms = self.config.cooldown_ms();
        let halt_ms = self.config.loss_halt_ms();
        let max_losses = self.config.max_consecutive_losses;
        let guard = self.symbols.entry(symbol.to_string()).or_default();

        guard.loss_streak = guard.loss_streak.saturating_add(1);
        if cooldown_ms > 0 {
            guard.cooldown_until = Some(now_ms.saturating_add(cooldown_ms));
        }
        if max_losses > 0 && guard.loss_streak >= max_losses {
            guard.halt = Some(if halt_ms > 0 {
                Halt::Until(now_ms.saturating_add(halt_ms))
            } else {
                Halt::Manual
            });
        }
    }

    /// Counts an executed signal against the hourly cap and the daily bucket.
    pub fn record_execution(&mut self, now_ms: u64) {
        self.rate_window.record(now_ms);
        self.daily.add_trade();
    }

    pub fn halt_symbol(&mut self, symbol: &str) {
        self.symbols.entry(symbol.to_string()).or_default().halt = Some(Halt::Manual);
    }

    pub fn unhalt_symbol(&mut self, symbol: &str) {
        if let Some(guard) = self.symbols.get_mut(symbol) {
            guard.halt = None;
            guard.loss_streak = 0;
        }
    }

    pub fn set_cooldown(&mut self, symbol: &str, secs: u64, now_ms: u64) {
        let until = now_ms.saturating_add(secs.saturating_mul(1_000));
        self.symbols.entry(symbol.to_string()).or_default().cooldown_until = Some(until);
    }

    pub fn set_global_halt(&mut self, halted: bool) {
        self.global_halt = halted;
    }

    pub fn global_halt(&self) -> bool {
        self.global_halt
    }

    /// Clears every guard, the master halt, the rate window and the bucket
    /// counters. Configuration and the bucket key are kept.
    pub fn reset(&mut self) {
        self.symbols.clear();
        self.global_halt = false;
        self.rate_window.clear();
        self.daily.clear_counters();
    }

    pub fn loss_streak(&self, symbol: &str) -> u32 {
        self.symbols
            .get(symbol)
            .map_or(0, |guard| guard.loss_streak)
    }

    pub fn status(&mut self, symbol: &str, now_ms: u64) -> GuardStatus {
        let guard = self.symbols.get_mut(symbol).map(|guard| {
            guard.normalize(now_ms);
            *guard
        });
        guard.unwrap_or_default().status(now_ms)
    }

    /// Status of every symbol that currently carries a streak, cooldown or halt.
    pub fn statuses(&mut self, now_ms: u64) -> BTreeMap<String, GuardStatus> {
        self.symbols
            .iter_mut()
            .filter_map(|(symbol, guard)| {
                guard.normalize(now_ms);
                (*guard != SymbolGuard::default())
                    .then(|| (symbol.clone(), guard.status(now_ms)))
            })
            .collect()
    }

    pub fn trades_last_hour(&mut self, now_ms: u64) -> usize {
        self.rate_window.count(now_ms)
    }

    pub fn daily(&self) -> &DailyBucket {
        &self.daily
    }
}
