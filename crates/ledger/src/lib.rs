mod bucket;
mod fills;
mod ledger;
mod position;

pub use bucket::{bucket_key, utc_datetime, DailyBucket, HOUR_MS};
pub use fills::{ExecutedFill, Fill, FillLog, Side, DEFAULT_FILL_CAPACITY};
pub use ledger::PositionLedger;
pub use position::{AppliedFill, FillEffect, Position};
