use std::collections::{BTreeMap, HashMap};

use crate::fills::{ExecutedFill, Fill, FillLog};
use crate::position::{AppliedFill, Position};

/// Per-symbol positions plus the bounded log of every fill applied to them.
#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    positions: HashMap<String, Position>,
    fills: FillLog,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fill_capacity(capacity: usize) -> Self {
        Self {
            positions: HashMap::new(),
            fills: FillLog::with_capacity(capacity),
        }
    }

    pub fn apply_fill(&mut self, fill: ExecutedFill) -> AppliedFill {
        let position = self.positions.entry(fill.symbol.clone()).or_default();
        let applied = position.apply(fill.side, fill.price, fill.amount, fill.fee);

        self.fills.push(Fill {
            ts: fill.ts,
            symbol: fill.symbol,
            side: fill.side,
            price: fill.price,
            amount: fill.amount,
            fee: fill.fee,
            realized_pnl: applied.realized_pnl,
            fill_id: fill.fill_id,
        });

        applied
    }

    pub fn has_fill_id(&self, fill_id: &str) -> bool {
        self.fills.contains_id(fill_id)
    }

    /// Position for `symbol`; flat when the symbol was never traded.
    pub fn position(&self, symbol: &str) -> Position {
        self.positions.get(symbol).copied().unwrap_or_default()
    }

    pub fn open_positions(&self) -> BTreeMap<String, Position> {
        self.positions
            .iter()
            .filter(|(_, position)| !position.is_flat())
            .map(|(symbol, position)| (symbol.clone(), *position))
            .collect()
    }

    pub fn fills(&self) -> &FillLog {
        &self.fills
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.fills.clear();
    }
}
