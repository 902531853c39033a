pub mod schedule;

// Re-export key types
pub use schedule::{
    format_next_run, format_timing, next_run, next_runs, CreateSchedule, HistoryEntry,
    RunOutcome, ScheduleManager, SchedulePatch, ScheduleRecord, ScheduleStatus, Timing,
};
