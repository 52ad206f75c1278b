use std::sync::Arc;

use desk::{Clock, TradingDesk};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};

pub const DEFAULT_SYMBOL: &str = "BTC/USDT:USDT";
pub const DEFAULT_NOTIONAL: f64 = 20.0;

/// Request defaults applied by the webhook when a signal omits them.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RelaySettings {
    pub default_symbol: String,
    pub default_notional: f64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            default_symbol: DEFAULT_SYMBOL.to_string(),
            default_notional: DEFAULT_NOTIONAL,
        }
    }
}

impl RelaySettings {
    /// Uppercases `requested`, falling back to the default symbol when it is
    /// missing or not a `BASE/QUOTE` pair.
    pub fn resolve_symbol(&self, requested: Option<&str>) -> String {
        match requested.map(|symbol| symbol.trim().to_ascii_uppercase()) {
            Some(symbol) if symbol.contains('/') => symbol,
            _ => self.default_symbol.clone(),
        }
    }
}

/// Shared handle to the desk. A single lock serializes every desk operation,
/// so an admission check and the fill it admits cannot interleave with another
/// request.
#[derive(Clone)]
pub struct AppState {
    desk: Arc<Mutex<TradingDesk>>,
    clock: Arc<dyn Clock>,
    settings: Arc<RelaySettings>,
}

impl AppState {
    pub fn new(desk: TradingDesk, clock: Arc<dyn Clock>, settings: RelaySettings) -> Self {
        Self {
            desk: Arc::new(Mutex::new(desk)),
            clock,
            settings: Arc::new(settings),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    pub async fn desk(&self) -> MutexGuard<'_, TradingDesk> {
        self.desk.lock().await
    }
}
