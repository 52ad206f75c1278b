use std::sync::Arc;

use api::AppState;
use axum::Router;
use desk::{DeskConfigError, SystemClock, TradingDesk};

use crate::config::Config;

pub fn build_app(config: &Config) -> Result<Router, DeskConfigError> {
    let desk = TradingDesk::new(config.desk.clone())?;
    let state = AppState::new(desk, Arc::new(SystemClock), config.relay.clone());

    Ok(api::app(state))
}
