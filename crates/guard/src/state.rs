use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// Stays in force until an explicit unhalt.
    Manual,
    /// Expires at the given epoch millisecond.
    Until(u64),
}

impl Halt {
    pub fn is_active(self, now_ms: u64) -> bool {
        match self {
            Self::Manual => true,
            Self::Until(expiry_ms) => now_ms < expiry_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SymbolGuard {
    pub cooldown_until: Option<u64>,
    pub loss_streak: u32,
    pub halt: Option<Halt>,
}

impl SymbolGuard {
    /// Drops an elapsed timed halt together with the loss streak that caused
    /// it, and forgets an elapsed cooldown. Returns `true` if a halt expired.
    pub fn normalize(&mut self, now_ms: u64) -> bool {
        if self
            .cooldown_until
            .is_some_and(|cooldown_until| now_ms >= cooldown_until)
        {
            self.cooldown_until = None;
        }

        match self.halt {
            Some(halt) if !halt.is_active(now_ms) => {
                self.halt = None;
                self.loss_streak = 0;
                true
            }
            _ => false,
        }
    }

    pub fn status(&self, now_ms: u64) -> GuardStatus {
        let cooldown_secs = self
            .cooldown_until
            .map(|cooldown_until| secs_remaining(cooldown_until, now_ms))
            .filter(|secs| *secs > 0);
        let halt = self.halt.map(|halt| match halt {
            Halt::Manual => HaltStatus::Manual,
            Halt::Until(expiry_ms) => HaltStatus::Timed {
                secs_remaining: secs_remaining(expiry_ms, now_ms),
            },
        });

        GuardStatus {
            loss_streak: self.loss_streak,
            cooldown_secs,
            halt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HaltStatus {
    Manual,
    Timed { secs_remaining: u64 },
}

/// Dashboard view of one symbol's guard state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GuardStatus {
    pub loss_streak: u32,
    pub cooldown_secs: Option<u64>,
    pub halt: Option<HaltStatus>,
}

fn secs_remaining(until_ms: u64, now_ms: u64) -> u64 {
    let remaining_ms = until_ms.saturating_sub(now_ms);
    (remaining_ms + 500) / 1_000
}
