use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::schedule::recurrence::next_run;
use crate::schedule::store::ScheduleManager;
use crate::schedule::types::{
    HistoryEntry, ScheduleRecord, ScheduleStatus, AUTO_PAUSE_THRESHOLD,
};

/// Result of one execution attempt, reported by the external executor.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub success: bool,
    pub session_id: Option<String>,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
    pub note: Option<String>,
}

impl RunOutcome {
    pub fn success(session_id: &str) -> Self {
        Self {
            success: true,
            session_id: Some(session_id.to_string()),
            ..Default::default()
        }
    }

    pub fn failure(error: &str) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }
}

impl ScheduleManager {
    /// Apply an execution outcome: append history, update the failure
    /// counter, and move the schedule to its next state.
    ///
    /// Success resets the counter and schedules the next natural
    /// occurrence; a one-time schedule with nothing left transitions to
    /// `Completed`. Failures either schedule a backoff retry (when
    /// enabled and within budget) or count toward auto-pause into
    /// `Error`. `Ok(None)` when the id is unknown.
    pub fn record_outcome(
        &mut self,
        id: &str,
        outcome: RunOutcome,
        now: DateTime<Utc>,
    ) -> Result<Option<ScheduleRecord>> {
        self.refresh_from_disk();
        let Some(record) = self.schedules_mut().iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };

        let mut entry = HistoryEntry {
            executed_at: now,
            session_id: outcome.session_id,
            success: outcome.success,
            error: outcome.error,
            duration_ms: outcome.duration_ms,
            note: outcome.note,
            is_retry: false,
            retry_attempt: None,
        };

        if outcome.success {
            record.consecutive_failures = 0;
            record.next_run_at = next_run(&record.timing, now);
            if record.next_run_at.is_none() {
                record.status = ScheduleStatus::Completed;
                info!("Schedule '{}' completed (id: {})", record.name, record.id);
            }
        } else {
            let failures = record.consecutive_failures + 1;
            record.consecutive_failures = failures;

            if record.retry_on_failure && failures <= record.max_retries {
                // This attempt was itself a retry whenever earlier failures
                // preceded it; either way the entry carries the attempt number.
                entry.is_retry = failures > 1;
                entry.retry_attempt = Some(failures);
                let delay = retry_delay(&record.retry_delay_minutes, failures);
                record.next_run_at = Some(now + Duration::minutes(i64::from(delay)));
                info!(
                    "Schedule '{}' failed (attempt {failures}/{}); retrying in {delay}m",
                    record.name, record.max_retries
                );
            } else {
                // Back to the natural recurrence; a resumed schedule picks up
                // from here.
                record.next_run_at = next_run(&record.timing, now);
                let retries_exhausted = record.retry_on_failure && failures > record.max_retries;
                if retries_exhausted || failures >= AUTO_PAUSE_THRESHOLD {
                    record.status = ScheduleStatus::Error;
                    warn!(
                        "Schedule '{}' auto-paused after {failures} consecutive failures (id: {})",
                        record.name, record.id
                    );
                }
            }
        }

        record.last_run_at = Some(now);
        record.push_history(entry);
        record.updated_at = now;

        let updated = record.clone();
        self.persist()?;
        Ok(Some(updated))
    }
}

/// Backoff delay for the given failure count, clamped to the last
/// configured step. Falls back to 5 minutes when no delays are configured.
fn retry_delay(delays: &[u32], failures: u32) -> u32 {
    if delays.is_empty() {
        return 5;
    }
    let index = (failures.saturating_sub(1) as usize).min(delays.len() - 1);
    delays[index]
}
