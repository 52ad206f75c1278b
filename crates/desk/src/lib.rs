pub mod clock;
pub mod desk;
pub mod export;
pub mod logging;
pub mod paper_exec;
pub mod signal;
pub mod spread;
pub mod stats;

pub use clock::{Clock, ManualClock, SystemClock};
pub use desk::{
    DeskConfig, DeskConfigError, HealthSnapshot, SignalReceipt, SignalReject, SignalRequest, StatsReport,
    TradingDesk,
};
pub use logging::{DeskLogEvent, DeskLogEventKind};
pub use signal::{SignalKind, UnknownSignal};
pub use spread::{Quote, SpreadLimits, SpreadReject};
