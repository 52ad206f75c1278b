use std::{
    env, fmt,
    net::{AddrParseError, Ipv4Addr, SocketAddr},
    str::FromStr,
};

use api::RelaySettings;
use desk::DeskConfig;
use guard::GuardConfigError;

const DEFAULT_LISTEN_PORT: u16 = 8080;

const ENV_ADDR: &str = "RELAY_SERVER_ADDR";
const ENV_DEFAULT_SYMBOL: &str = "RELAY_DEFAULT_SYMBOL";
const ENV_DEFAULT_NOTIONAL: &str = "RELAY_DEFAULT_NOTIONAL";
const ENV_MAX_TRADES_PER_HOUR: &str = "RELAY_MAX_TRADES_PER_HOUR";
const ENV_COOLDOWN_AFTER_LOSS_SEC: &str = "RELAY_COOLDOWN_AFTER_LOSS_SEC";
const ENV_MAX_CONSEC_LOSSES: &str = "RELAY_MAX_CONSEC_LOSSES";
const ENV_LOSS_HALT_COOLDOWN_MIN: &str = "RELAY_LOSS_HALT_COOLDOWN_MIN";
const ENV_LOSS_REDUCE_FACTORS: &str = "RELAY_LOSS_REDUCE_FACTORS";
const ENV_LOSS_MIN_NOTIONAL: &str = "RELAY_LOSS_MIN_NOTIONAL";
const ENV_DAILY_RESET_HOUR_UTC: &str = "RELAY_DAILY_RESET_HOUR_UTC";
const ENV_MAX_SPREAD_PCT: &str = "RELAY_MAX_SPREAD_PCT";
const ENV_REJECT_IF_THIN_BOOK: &str = "RELAY_REJECT_IF_THIN_BOOK";
const ENV_PAPER_FEE_BPS: &str = "RELAY_PAPER_FEE_BPS";
const ENV_PAPER_SLIPPAGE_BPS: &str = "RELAY_PAPER_SLIPPAGE_BPS";

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub relay: RelaySettings,
    pub desk: DeskConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_LISTEN_PORT)),
            relay: RelaySettings::default(),
            desk: DeskConfig::default(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidListenAddr(AddrParseError),
    Invalid {
        key: &'static str,
        expected: &'static str,
    },
    NonUnicode {
        key: &'static str,
    },
    InvalidGuard(GuardConfigError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidListenAddr(err) => {
                write!(f, "{ENV_ADDR} is not a valid socket address: {err}")
            }
            Self::Invalid { key, expected } => write!(f, "{key} must be {expected}"),
            Self::NonUnicode { key } => write!(f, "{key} contains non-unicode data"),
            Self::InvalidGuard(err) => write!(f, "invalid guard settings: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidListenAddr(err) => Some(err),
            Self::InvalidGuard(err) => Some(err),
            Self::Invalid { .. } | Self::NonUnicode { .. } => None,
        }
    }
}

impl Config {
    /// Reads `RELAY_*` overrides on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = read_env(ENV_ADDR)? {
            config.listen_addr = value.parse().map_err(ConfigError::InvalidListenAddr)?;
        }

        if let Some(value) = read_env(ENV_DEFAULT_SYMBOL)? {
            let symbol = value.trim().to_ascii_uppercase();
            if !symbol.contains('/') {
                return Err(ConfigError::Invalid {
                    key: ENV_DEFAULT_SYMBOL,
                    expected: "a BASE/QUOTE market symbol",
                });
            }
            config.relay.default_symbol = symbol;
        }

        config.relay.default_notional = parse_env(
            ENV_DEFAULT_NOTIONAL,
            config.relay.default_notional,
            "a finite positive number",
            |value: &f64| value.is_finite() && *value > 0.0,
        )?;

        let guard = &mut config.desk.guard;
        guard.max_trades_per_hour = parse_env(
            ENV_MAX_TRADES_PER_HOUR,
            guard.max_trades_per_hour,
            "a non-negative integer",
            |_| true,
        )?;
        guard.cooldown_after_loss_secs = parse_env(
            ENV_COOLDOWN_AFTER_LOSS_SEC,
            guard.cooldown_after_loss_secs,
            "a non-negative integer",
            |_| true,
        )?;
        guard.max_consecutive_losses = parse_env(
            ENV_MAX_CONSEC_LOSSES,
            guard.max_consecutive_losses,
            "a non-negative integer",
            |_| true,
        )?;
        guard.loss_halt_minutes = parse_env(
            ENV_LOSS_HALT_COOLDOWN_MIN,
            guard.loss_halt_minutes,
            "a non-negative integer",
            |_| true,
        )?;
        if let Some(value) = read_env(ENV_LOSS_REDUCE_FACTORS)? {
            guard.loss_reduce_factors =
                serde_json::from_str(&value).map_err(|_| ConfigError::Invalid {
                    key: ENV_LOSS_REDUCE_FACTORS,
                    expected: "a JSON array of numbers",
                })?;
        }
        guard.min_notional = parse_env(
            ENV_LOSS_MIN_NOTIONAL,
            guard.min_notional,
            "a finite non-negative number",
            |value: &f64| value.is_finite() && *value >= 0.0,
        )?;
        guard.daily_reset_hour_utc = parse_env(
            ENV_DAILY_RESET_HOUR_UTC,
            guard.daily_reset_hour_utc,
            "an hour between 0 and 23",
            |hour: &u8| *hour <= 23,
        )?;
        guard.validate().map_err(ConfigError::InvalidGuard)?;

        config.desk.spread.max_spread_pct = parse_env(
            ENV_MAX_SPREAD_PCT,
            config.desk.spread.max_spread_pct,
            "a finite non-negative percentage",
            |value: &f64| value.is_finite() && *value >= 0.0,
        )?;
        if let Some(value) = read_env(ENV_REJECT_IF_THIN_BOOK)? {
            config.desk.spread.reject_if_thin_book =
                parse_bool(value.as_str()).ok_or(ConfigError::Invalid {
                    key: ENV_REJECT_IF_THIN_BOOK,
                    expected: "true or false",
                })?;
        }

        config.desk.paper.fee_bps = parse_env(
            ENV_PAPER_FEE_BPS,
            config.desk.paper.fee_bps,
            "a finite non-negative number of basis points",
            |value: &f64| value.is_finite() && *value >= 0.0,
        )?;
        config.desk.paper.slippage_bps = parse_env(
            ENV_PAPER_SLIPPAGE_BPS,
            config.desk.paper.slippage_bps,
            "a finite non-negative number of basis points",
            |value: &f64| value.is_finite() && *value >= 0.0,
        )?;

        Ok(config)
    }
}

fn read_env(key: &'static str) -> Result<Option<String>, ConfigError> {
    match env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NonUnicode { key }),
    }
}

fn parse_env<T: FromStr>(
    key: &'static str,
    default_value: T,
    expected: &'static str,
    accept: impl Fn(&T) -> bool,
) -> Result<T, ConfigError> {
    let Some(value) = read_env(key)? else {
        return Ok(default_value);
    };

    match value.trim().parse::<T>() {
        Ok(parsed) if accept(&parsed) => Ok(parsed),
        _ => Err(ConfigError::Invalid { key, expected }),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
