use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    GlobalHalt,
    Halted,
    RateLimited,
}

impl DenyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GlobalHalt => "global_halt",
            Self::Halted => "halted",
            Self::RateLimited => "rate_limited",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an admission check. A denial is a designed outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied(DenyReason),
}

impl Admission {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn deny_reason(self) -> Option<DenyReason> {
        match self {
            Self::Allowed => None,
            Self::Denied(reason) => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Admission, DenyReason};

    #[test]
    fn deny_reasons_render_as_wire_codes() {
        assert_eq!(DenyReason::GlobalHalt.to_string(), "global_halt");
        assert_eq!(DenyReason::Halted.to_string(), "halted");
        assert_eq!(
            serde_json::to_value(DenyReason::RateLimited).unwrap(),
            "rate_limited"
        );
    }

    #[test]
    fn admission_exposes_reason_only_when_denied() {
        assert!(Admission::Allowed.is_allowed());
        assert_eq!(Admission::Allowed.deny_reason(), None);
        assert_eq!(
            Admission::Denied(DenyReason::Halted).deny_reason(),
            Some(DenyReason::Halted)
        );
    }
}
