//! Concrete managers built on the generic [`Manager`](crate::Manager).

pub mod account_summary;
pub mod current_time;
pub mod positions;

pub use account_summary::{AccountSummaryHooks, AccountSummaryManager};
pub use current_time::{CurrentTimeHooks, CurrentTimeManager};
pub use positions::{PositionsHooks, PositionsManager};
