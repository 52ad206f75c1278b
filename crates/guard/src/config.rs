use std::fmt;

use serde::Serialize;

pub const DEFAULT_MAX_TRADES_PER_HOUR: usize = 60;
pub const DEFAULT_COOLDOWN_AFTER_LOSS_SECS: u64 = 120;
pub const DEFAULT_MAX_CONSECUTIVE_LOSSES: u32 = 3;
pub const DEFAULT_LOSS_HALT_MINUTES: u64 = 10;
pub const DEFAULT_LOSS_REDUCE_FACTORS: [f64; 3] = [1.0, 0.7, 0.4];
pub const DEFAULT_MIN_NOTIONAL: f64 = 5.0;
pub const DEFAULT_DAILY_RESET_HOUR_UTC: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardConfigError {
    InvalidReduceFactor,
    InvalidMinNotional,
    InvalidResetHour,
}

impl fmt::Display for GuardConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidReduceFactor => {
                write!(f, "loss reduce factors must be finite and non-negative")
            }
            Self::InvalidMinNotional => {
                write!(f, "minimum notional must be finite and non-negative")
            }
            Self::InvalidResetHour => write!(f, "daily reset hour must be between 0 and 23"),
        }
    }
}

impl std::error::Error for GuardConfigError {}

/// Limits the guard state machine enforces.
///
/// A zero `max_consecutive_losses` disables loss halting, a zero
/// `cooldown_after_loss_secs` disables the advisory cooldown, and a zero
/// `loss_halt_minutes` makes loss halts manual-unhalt only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardConfig {
    pub max_trades_per_hour: usize,
    pub cooldown_after_loss_secs: u64,
    pub max_consecutive_losses: u32,
    pub loss_halt_minutes: u64,
    pub loss_reduce_factors: Vec<f64>,
    pub min_notional: f64,
    pub daily_reset_hour_utc: u8,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_trades_per_hour: DEFAULT_MAX_TRADES_PER_HOUR,
            cooldown_after_loss_secs: DEFAULT_COOLDOWN_AFTER_LOSS_SECS,
            max_consecutive_losses: DEFAULT_MAX_CONSECUTIVE_LOSSES,
            loss_halt_minutes: DEFAULT_LOSS_HALT_MINUTES,
            loss_reduce_factors: DEFAULT_LOSS_REDUCE_FACTORS.to_vec(),
            min_notional: DEFAULT_MIN_NOTIONAL,
            daily_reset_hour_utc: DEFAULT_DAILY_RESET_HOUR_UTC,
        }
    }
}

impl GuardConfig {
    pub fn validate(&self) -> Result<(), GuardConfigError> {
        if self
            .loss_reduce_factors
            .iter()
            .any(|factor| !factor.is_finite() || *factor < 0.0)
        {
            return Err(GuardConfigError::InvalidReduceFactor);
        }
        if !self.min_notional.is_finite() || self.min_notional < 0.0 {
            return Err(GuardConfigError::InvalidMinNotional);
        }
        if self.daily_reset_hour_utc > 23 {
            return Err(GuardConfigError::InvalidResetHour);
        }

        Ok(())
    }

    pub fn cooldown_ms(&self) -> u64 {
        self.cooldown_after_loss_secs.saturating_mul(1_000)
    }

    pub fn loss_halt_ms(&self) -> u64 {
        self.loss_halt_minutes.saturating_mul(60_000)
    }

    /// Size multiplier for a symbol on `loss_streak` consecutive losses. Streaks
    /// past the end of the list reuse its last factor.
    pub fn reduce_factor(&self, loss_streak: u32) -> f64 {
        let Some(last) = self.loss_reduce_factors.len().checked_sub(1) else {
            return 1.0;
        };
        let index = usize::try_from(loss_streak).unwrap_or(usize::MAX).min(last);
        self.loss_reduce_factors[index]
    }
}
