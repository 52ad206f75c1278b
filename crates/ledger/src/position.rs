use serde::Serialize;

use crate::fills::Side;

/// Net position in one symbol. `quantity > 0` is long, `< 0` is short.
///
/// `avg_cost` is the volume-weighted entry price of the open quantity and is
/// exactly `0.0` whenever the position is flat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Position {
    pub quantity: f64,
    pub avg_cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillEffect {
    /// Opened from flat.
    Open,
    /// Increased an existing position in the same direction.
    Add,
    /// Partially closed; direction and average cost unchanged.
    Reduce,
    /// Closed to exactly flat.
    Close,
    /// Closed and reopened in the opposite direction.
    Flip,
}

impl FillEffect {
    /// Whether the fill realized trading PnL on top of its fee.
    pub fn reduced_exposure(self) -> bool {
        matches!(self, Self::Reduce | Self::Close | Self::Flip)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AppliedFill {
    pub realized_pnl: f64,
    pub effect: FillEffect,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.quantity == 0.0
    }

    pub fn side(&self) -> Option<Side> {
        if self.quantity > 0.0 {
            Some(Side::Buy)
        } else if self.quantity < 0.0 {
            Some(Side::Sell)
        } else {
            None
        }
    }

    /// Applies a fill with weighted-average cost accounting and returns the
    /// realized PnL net of `fee`.
    pub fn apply(&mut self, side: Side, price: f64, amount: f64, fee: f64) -> AppliedFill {
        debug_assert!(price.is_finite() && price > 0.0, "fill price must be positive");
        debug_assert!(amount.is_finite() && amount > 0.0, "fill amount must be positive");
        debug_assert!(fee.is_finite() && fee >= 0.0, "fill fee must be non-negative");

        let signed = side.sign() * amount;
        // Not `-fee`: a zero fee must not report -0.0.
        let mut realized_pnl = 0.0 - fee;

        let effect = if self.is_flat() || self.quantity.signum() == signed.signum() {
            let effect = if self.is_flat() {
                FillEffect::Open
            } else {
                FillEffect::Add
            };
            let held_notional = self.quantity.abs() * self.avg_cost;
            let added_notional = amount * price;
            self.quantity += signed;
            self.avg_cost = (held_notional + added_notional) / self.quantity.abs();
            effect
        } else {
            let held = self.quantity.abs();
            let closable = held.min(amount);
            let per_unit = if self.quantity > 0.0 {
                price - self.avg_cost
            } else {
                self.avg_cost - price
            };
            realized_pnl += per_unit * closable;

            if closable < held {
                self.quantity -= self.quantity.signum() * closable;
                FillEffect::Reduce
            } else {
                self.quantity = 0.0;
                self.avg_cost = 0.0;

                let remainder = amount - closable;
                if remainder > 0.0 {
                    self.quantity = side.sign() * remainder;
                    self.avg_cost = price;
                    FillEffect::Flip
                } else {
                    FillEffect::Close
                }
            }
        };

        debug_assert!(
            !self.is_flat() || self.avg_cost == 0.0,
            "flat position must carry zero average cost"
        );

        AppliedFill {
            realized_pnl,
            effect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FillEffect, Position};
    use crate::fills::Side;

    fn position_at(quantity: f64, avg_cost: f64) -> Position {
        Position {
            quantity,
            avg_cost,
        }
    }

    #[test]
    fn same_direction_fills_blend_average_cost_by_notional() {
        let mut position = Position::default();

        let opened = position.apply(Side::Buy, 100.0, 2.0, 0.1);
        let added = position.apply(Side::Buy, 110.0, 3.0, 0.2);

        assert_eq!(opened.effect, FillEffect::Open);
        assert_eq!(opened.realized_pnl, -0.1);
        assert_eq!(added.effect, FillEffect::Add);
        assert_eq!(added.realized_pnl, -0.2);
        assert_eq!(position.quantity, 5.0);
        assert!((position.avg_cost - 106.0).abs() < 1e-9);
    }

    #[test]
    fn short_adds_keep_positive_average_cost() {
        let mut position = Position::default();

        position.apply(Side::Sell, 50.0, 1.0, 0.0);
        position.apply(Side::Sell, 56.0, 2.0, 0.0);

        assert_eq!(position.quantity, -3.0);
        assert!((position.avg_cost - 54.0).abs() < 1e-9);
    }

    #[test]
    fn partial_close_realizes_closed_portion_and_keeps_average() {
        let mut position = position_at(10.0, 100.0);

        let applied = position.apply(Side::Sell, 105.0, 4.0, 0.5);

        assert_eq!(applied.effect, FillEffect::Reduce);
        assert_eq!(applied.realized_pnl, 20.0 - 0.5);
        assert_eq!(position, position_at(6.0, 100.0));
    }

    #[test]
    fn exact_flatten_resets_average_cost_to_zero() {
        let mut position = Position::default();
        position.apply(Side::Buy, 100.0, 1.0, 0.0);
        position.apply(Side::Buy, 103.0, 2.0, 0.0);

        let applied = position.apply(Side::Sell, 99.0, 3.0, 0.0);

        assert_eq!(applied.effect, FillEffect::Close);
        assert!(applied.realized_pnl < 0.0);
        assert_eq!(position.quantity, 0.0);
        assert_eq!(position.avg_cost, 0.0);
        assert!(position.is_flat());
    }

    #[test]
    fn flip_closes_then_reopens_at_fill_price() {
        let mut position = position_at(10.0, 100.0);

        let applied = position.apply(Side::Sell, 110.0, 15.0, 1.0);

        assert_eq!(applied.effect, FillEffect::Flip);
        assert_eq!(applied.realized_pnl, 100.0 - 1.0);
        assert_eq!(position.quantity, -5.0);
        assert_eq!(position.avg_cost, 110.0);
        assert_eq!(position.side(), Some(Side::Sell));
    }

    #[test]
    fn short_cover_realizes_average_minus_price() {
        let mut position = position_at(-4.0, 200.0);

        let applied = position.apply(Side::Buy, 190.0, 4.0, 0.0);

        assert_eq!(applied.effect, FillEffect::Close);
        assert_eq!(applied.realized_pnl, 40.0);
        assert_eq!(position, Position::default());
    }

    #[test]
    fn only_reducing_effects_report_reduced_exposure() {
        assert!(!FillEffect::Open.reduced_exposure());
        assert!(!FillEffect::Add.reduced_exposure());
        assert!(FillEffect::Reduce.reduced_exposure());
        assert!(FillEffect::Close.reduced_exposure());
        assert!(FillEffect::Flip.reduced_exposure());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "fill amount must be positive")]
    fn non_positive_amount_is_an_invariant_violation() {
        Position::default().apply(Side::Buy, 100.0, -1.0, 0.0);
    }
}
