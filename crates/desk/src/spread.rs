use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_SPREAD_PCT: f64 = 0.03;

/// Top of book as supplied by the exchange collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpreadLimits {
    pub max_spread_pct: f64,
    pub reject_if_thin_book: bool,
}

impl Default for SpreadLimits {
    fn default() -> Self {
        Self {
            max_spread_pct: DEFAULT_MAX_SPREAD_PCT,
            reject_if_thin_book: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpreadReject {
    ThinBook,
    WideSpread { spread_pct: f64 },
}

impl SpreadReject {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ThinBook => "thin_book",
            Self::WideSpread { .. } => "wide_spread",
        }
    }
}

impl fmt::Display for SpreadReject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThinBook => f.write_str("thin_book"),
            Self::WideSpread { spread_pct } => write!(f, "wide_spread ({spread_pct:.4}%)"),
        }
    }
}

impl std::error::Error for SpreadReject {}

/// Quoted spread as a percentage of mid, or `None` for an empty or crossed book.
pub fn spread_pct(quote: Quote) -> Option<f64> {
    let Quote { bid, ask } = quote;
    if !bid.is_finite() || !ask.is_finite() || bid <= 0.0 || ask < bid {
        return None;
    }

    let mid = (ask + bid) / 2.0;
    Some((ask - bid) / mid * 100.0)
}

/// Returns the spread when the book is tradable under `limits`. An unusable
/// book is rejected as thin, or measured as an infinitely wide spread when thin
/// books are tolerated.
pub fn check_spread(quote: Quote, limits: &SpreadLimits) -> Result<f64, SpreadReject> {
    let spread = match spread_pct(quote) {
        Some(spread) => spread,
        None if limits.reject_if_thin_book => return Err(SpreadReject::ThinBook),
        None => f64::INFINITY,
    };

    if spread > limits.max_spread_pct {
        return Err(SpreadReject::WideSpread { spread_pct: spread });
    }

    Ok(spread)
}
