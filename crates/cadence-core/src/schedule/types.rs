use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of retained history entries per schedule.
pub const HISTORY_LIMIT: usize = 10;

/// Consecutive failures after which a schedule is auto-paused into `Error`.
pub const AUTO_PAUSE_THRESHOLD: u32 = 3;

/// Recurrence intent for a schedule. One variant per frequency, carrying
/// exactly the fields that frequency needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frequency", rename_all = "lowercase")]
pub enum Timing {
    /// Fire exactly once on `date` (ISO "YYYY-MM-DD") at `time` ("HH:MM").
    #[serde(rename_all = "camelCase")]
    Once {
        date: String,
        time: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timezone: Option<String>,
    },
    /// Fire every day at `time`.
    #[serde(rename_all = "camelCase")]
    Daily {
        time: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timezone: Option<String>,
    },
    /// Fire on the given weekdays (0 = Sunday … 6 = Saturday) at `time`.
    #[serde(rename_all = "camelCase")]
    Weekly {
        time: String,
        days_of_week: Vec<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timezone: Option<String>,
    },
    /// Fire monthly on day-of-month `date` (1–31, clamped to shorter months).
    #[serde(rename_all = "camelCase")]
    Monthly {
        date: u8,
        time: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timezone: Option<String>,
    },
    /// Fire per a 5-field cron expression (minute hour dom month dow).
    #[serde(rename_all = "camelCase")]
    Cron {
        cron_expression: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timezone: Option<String>,
    },
}

impl Timing {
    /// IANA timezone name, if one was configured.
    pub fn timezone(&self) -> Option<&str> {
        match self {
            Timing::Once { timezone, .. }
            | Timing::Daily { timezone, .. }
            | Timing::Weekly { timezone, .. }
            | Timing::Monthly { timezone, .. }
            | Timing::Cron { timezone, .. } => timezone.as_deref(),
        }
    }
}

/// Lifecycle state of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    /// Eligible for due/missed queries.
    Active,
    /// Suspended by the user; resumable.
    Paused,
    /// A one-time schedule that has run; will never fire again.
    Completed,
    /// Auto-paused after repeated failures; resumable (resets the counter).
    Error,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ScheduleStatus::Active => "active",
            ScheduleStatus::Paused => "paused",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Error => "error",
        }
    }
}

/// Outcome of a single execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub executed_at: DateTime<Utc>,
    /// Opaque reference to whatever executed the task (e.g. a session id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Free-form annotation, e.g. "ran late after missed wake".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub is_retry: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_attempt: Option<u32>,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delays() -> Vec<u32> {
    vec![5, 15, 60]
}

/// A persisted schedule record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub timing: Timing,
    /// Opaque payload describing what to run. Owned by the executor; the
    /// engine only passes it through.
    #[serde(default)]
    pub execution: serde_json::Value,
    pub status: ScheduleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Cached next due instant; `None` means "will not run again".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    /// Most-recent-first, capped at [`HISTORY_LIMIT`].
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub retry_on_failure: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delays")]
    pub retry_delay_minutes: Vec<u32>,
    #[serde(default)]
    pub consecutive_failures: u32,
    /// UI hint, passed through untouched.
    #[serde(default)]
    pub open_on_run: bool,
}

impl ScheduleRecord {
    /// Prepend an entry, evicting the oldest past [`HISTORY_LIMIT`].
    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.history.insert(0, entry);
        self.history.truncate(HISTORY_LIMIT);
    }
}

/// Top-level persistence structure: one JSON document per workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleFile {
    pub version: u32,
    pub schedules: Vec<ScheduleRecord>,
}

impl Default for ScheduleFile {
    fn default() -> Self {
        Self {
            version: 1,
            schedules: Vec::new(),
        }
    }
}
