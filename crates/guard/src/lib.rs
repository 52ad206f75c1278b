pub mod admission;
pub mod config;
pub mod machine;
pub mod rate;
pub mod state;

pub use admission::{Admission, DenyReason};
pub use config::{GuardConfig, GuardConfigError};
pub use machine::GuardStateMachine;
pub use state::{GuardStatus, Halt, HaltStatus};
