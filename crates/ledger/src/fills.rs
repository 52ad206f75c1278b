use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

pub const DEFAULT_FILL_CAPACITY: usize = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn sign(self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

/// An executed trade as reported by the venue or the paper simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedFill {
    pub ts: u64,
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub amount: f64,
    pub fee: f64,
    pub fill_id: Option<String>,
}

impl ExecutedFill {
    pub fn new(
        ts: u64,
        symbol: impl Into<String>,
        side: Side,
        price: f64,
        amount: f64,
        fee: f64,
    ) -> Self {
        Self {
            ts,
            symbol: symbol.into(),
            side,
            price,
            amount,
            fee,
            fill_id: None,
        }
    }

    pub fn with_fill_id(mut self, fill_id: impl Into<String>) -> Self {
        self.fill_id = Some(fill_id.into());
        self
    }
}

/// Log entry for a fill after it has been applied to its position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fill {
    pub ts: u64,
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub amount: f64,
    pub fee: f64,
    pub realized_pnl: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FillLog {
    capacity: usize,
    entries: VecDeque<Fill>,
    ids: HashSet<String>,
}

impl Default for FillLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_FILL_CAPACITY)
    }
}

impl FillLog {
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "fill log capacity must be positive");

        Self {
            capacity,
            entries: VecDeque::new(),
            ids: HashSet::new(),
        }
    }

    pub fn push(&mut self, fill: Fill) {
        if let Some(id) = &fill.fill_id {
            self.ids.insert(id.clone());
        }
        self.entries.push_back(fill);

        while self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                if let Some(id) = evicted.fill_id {
                    self.ids.remove(&id);
                }
            }
        }
    }

    pub fn contains_id(&self, fill_id: &str) -> bool {
        self.ids.contains(fill_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fill> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.ids.clear();
    }
}
