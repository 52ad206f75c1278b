use std::fmt;

use ledger::Side;
use serde::Serialize;

pub const DEFAULT_PAPER_FEE_BPS: f64 = 2.0;
pub const DEFAULT_PAPER_SLIPPAGE_BPS: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PaperExecConfig {
    pub slippage_bps: f64,
    pub fee_bps: f64,
}

impl Default for PaperExecConfig {
    fn default() -> Self {
        Self {
            slippage_bps: DEFAULT_PAPER_SLIPPAGE_BPS,
            fee_bps: DEFAULT_PAPER_FEE_BPS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaperFill {
    pub fill_px: f64,
    pub qty: f64,
    pub notional: f64,
    pub fee: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperExecError {
    InvalidPrice,
    InvalidQuantity,
    InvalidSlippageBps,
    InvalidFeeBps,
    SellFillPriceNonPositive,
}

impl fmt::Display for PaperExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::InvalidPrice => "invalid_price",
            Self::InvalidQuantity => "invalid_quantity",
            Self::InvalidSlippageBps => "invalid_slippage_bps",
            Self::InvalidFeeBps => "invalid_fee_bps",
            Self::SellFillPriceNonPositive => "sell_fill_price_non_positive",
        };
        f.write_str(code)
    }
}

impl std::error::Error for PaperExecError {}

/// Simulated market fill of `qty` against `ref_price`. Buys pay slippage above
/// the reference, sells receive it below; the fee is charged on fill notional.
pub fn paper_fill(
    side: Side,
    ref_price: f64,
    qty: f64,
    config: &PaperExecConfig,
) -> Result<PaperFill, PaperExecError> {
    validate_inputs(ref_price, qty, config)?;

    let slippage_rate = bps_to_rate(config.slippage_bps);
    let fill_px = match side {
        Side::Buy => ref_price * (1.0 + slippage_rate),
        Side::Sell => ref_price * (1.0 - slippage_rate),
    };
    if !fill_px.is_finite() || fill_px <= 0.0 {
        return Err(PaperExecError::SellFillPriceNonPositive);
    }

    let notional = fill_px * qty;
    let fee = notional * bps_to_rate(config.fee_bps);

    Ok(PaperFill {
        fill_px,
        qty,
        notional,
        fee,
    })
}

/// Quantity that spends `notional` at `ref_price`.
pub fn qty_for_notional(notional: f64, ref_price: f64) -> Result<f64, PaperExecError> {
    if !ref_price.is_finite() || ref_price <= 0.0 {
        return Err(PaperExecError::InvalidPrice);
    }
    let qty = notional / ref_price;
    if !qty.is_finite() || qty <= 0.0 {
        return Err(PaperExecError::InvalidQuantity);
    }

    Ok(qty)
}

fn validate_inputs(price: f64, qty: f64, config: &PaperExecConfig) -> Result<(), PaperExecError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(PaperExecError::InvalidPrice);
    }
    if !qty.is_finite() || qty <= 0.0 {
        return Err(PaperExecError::InvalidQuantity);
    }
    if !config.slippage_bps.is_finite() || config.slippage_bps < 0.0 {
        return Err(PaperExecError::InvalidSlippageBps);
    }
    if !config.fee_bps.is_finite() || config.fee_bps < 0.0 {
        return Err(PaperExecError::InvalidFeeBps);
    }

    Ok(())
}

fn bps_to_rate(bps: f64) -> f64 {
    bps / 10_000.0
}
