pub mod cron;
pub mod format;
pub mod lifecycle;
pub mod recurrence;
pub mod store;
pub mod tz;
pub mod types;

pub use cron::{CronExpr, CronParseError};
pub use format::{format_next_run, format_timing};
pub use lifecycle::RunOutcome;
pub use recurrence::{next_run, next_runs};
pub use store::{CreateSchedule, ScheduleManager, SchedulePatch};
pub use types::{HistoryEntry, ScheduleFile, ScheduleRecord, ScheduleStatus, Timing};
