use std::fmt;
use std::str::FromStr;

use ledger::Side;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    Long,
    Short,
    CloseLong,
    CloseShort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSignal(pub String);

impl fmt::Display for UnknownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown signal {:?}", self.0)
    }
}

impl std::error::Error for UnknownSignal {}

impl SignalKind {
    pub fn side(self) -> Side {
        match self {
            Self::Long | Self::CloseShort => Side::Buy,
            Self::Short | Self::CloseLong => Side::Sell,
        }
    }

    /// Whether the signal opens exposure rather than closing it.
    pub fn is_entry(self) -> bool {
        matches!(self, Self::Long | Self::Short)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Long => "LONG",
            Self::Short => "SHORT",
            Self::CloseLong => "CLOSE_LONG",
            Self::CloseShort => "CLOSE_SHORT",
        }
    }
}

impl FromStr for SignalKind {
    type Err = UnknownSignal;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "LONG" => Ok(Self::Long),
            "SHORT" => Ok(Self::Short),
            "CLOSE_LONG" => Ok(Self::CloseLong),
            "CLOSE_SHORT" => Ok(Self::CloseShort),
            _ => Err(UnknownSignal(value.to_string())),
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use ledger::Side;

    use super::{SignalKind, UnknownSignal};

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("long".parse::<SignalKind>(), Ok(SignalKind::Long));
        assert_eq!(" Close_Short ".parse::<SignalKind>(), Ok(SignalKind::CloseShort));
        assert_eq!(
            "flat".parse::<SignalKind>(),
            Err(UnknownSignal("flat".to_string()))
        );
    }

    #[test]
    fn closing_signals_trade_against_their_entry() {
        assert_eq!(SignalKind::Long.side(), Side::Buy);
        assert_eq!(SignalKind::CloseLong.side(), Side::Sell);
        assert_eq!(SignalKind::Short.side(), Side::Sell);
        assert_eq!(SignalKind::CloseShort.side(), Side::Buy);
        assert!(SignalKind::Short.is_entry());
        assert!(!SignalKind::CloseShort.is_entry());
    }
}
