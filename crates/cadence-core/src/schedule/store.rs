use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use tracing::{info, warn};

use crate::schedule::recurrence::next_run;
use crate::schedule::types::{
    HistoryEntry, ScheduleFile, ScheduleRecord, ScheduleStatus, Timing,
};

/// Input for creating a schedule. Identity, timestamps, and the cached
/// `next_run_at` are assigned by the store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSchedule {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    pub timing: Timing,
    #[serde(default)]
    pub execution: serde_json::Value,
    #[serde(default)]
    pub retry_on_failure: bool,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub retry_delay_minutes: Option<Vec<u32>>,
    #[serde(default)]
    pub open_on_run: bool,
}

impl CreateSchedule {
    pub fn new(name: &str, timing: Timing) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            icon: None,
            group: None,
            timing,
            execution: serde_json::Value::Null,
            retry_on_failure: false,
            max_retries: None,
            retry_delay_minutes: None,
            open_on_run: false,
        }
    }
}

/// Distinguishes "field absent" from an explicit JSON `null`, so patches
/// can clear optional fields rather than only overwrite them.
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Partial update; `None` fields are left untouched. The double-option
/// fields treat `Some(None)` (JSON `null`) as "clear".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub icon: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub group: Option<Option<String>>,
    #[serde(default)]
    pub timing: Option<Timing>,
    #[serde(default)]
    pub execution: Option<serde_json::Value>,
    #[serde(default)]
    pub status: Option<ScheduleStatus>,
    #[serde(default)]
    pub retry_on_failure: Option<bool>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub retry_delay_minutes: Option<Vec<u32>>,
    #[serde(default)]
    pub open_on_run: Option<bool>,
}

/// Durable CRUD over the per-workspace schedule document.
///
/// Follows strict load-then-save semantics: every mutation re-reads the
/// file first, applies the change, and writes the whole document back.
/// A single engine instance is assumed to own the file; callers within a
/// process must serialize mutations themselves.
pub struct ScheduleManager {
    path: PathBuf,
    file: ScheduleFile,
}

impl ScheduleManager {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable or corrupt one is logged and treated the same way.
    pub fn load(path: &Path) -> Self {
        let file = if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                    warn!("Failed to parse schedules file: {e}");
                    ScheduleFile::default()
                }),
                Err(e) => {
                    warn!("Failed to read schedules file: {e}");
                    ScheduleFile::default()
                }
            }
        } else {
            ScheduleFile::default()
        };
        Self {
            path: path.to_path_buf(),
            file,
        }
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create store directory '{}'", parent.display())
            })?;
        }
        let json = serde_json::to_string_pretty(&self.file)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("failed to write '{}'", self.path.display()))?;
        Ok(())
    }

    /// Reload from disk before operations (read-modify-write discipline).
    pub fn refresh_from_disk(&mut self) {
        if self.path.exists() {
            match std::fs::read_to_string(&self.path) {
                Ok(content) => {
                    if let Ok(file) = serde_json::from_str(&content) {
                        self.file = file;
                    }
                }
                Err(e) => warn!("Failed to refresh schedules from disk: {e}"),
            }
        }
    }

    /// Create and persist a new schedule.
    pub fn create(&mut self, input: CreateSchedule) -> Result<ScheduleRecord> {
        self.refresh_from_disk();
        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string()[..8].to_string();
        let next_run_at = next_run(&input.timing, now);

        let record = ScheduleRecord {
            id: id.clone(),
            name: input.name,
            description: input.description,
            icon: input.icon,
            group: input.group,
            timing: input.timing,
            execution: input.execution,
            status: ScheduleStatus::Active,
            created_at: now,
            updated_at: now,
            next_run_at,
            last_run_at: None,
            history: Vec::new(),
            retry_on_failure: input.retry_on_failure,
            max_retries: input.max_retries.unwrap_or(3),
            retry_delay_minutes: input.retry_delay_minutes.unwrap_or_else(|| vec![5, 15, 60]),
            consecutive_failures: 0,
            open_on_run: input.open_on_run,
        };

        self.file.schedules.push(record.clone());
        self.save()?;
        info!("Created schedule '{}' (id: {})", record.name, id);
        Ok(record)
    }

    pub fn get(&self, id: &str) -> Option<&ScheduleRecord> {
        self.file.schedules.iter().find(|s| s.id == id)
    }

    /// All schedules (for display / API serialization).
    pub fn list(&mut self) -> &[ScheduleRecord] {
        self.refresh_from_disk();
        &self.file.schedules
    }

    /// Merge `patch` over an existing record. `Ok(None)` when the id is
    /// unknown (an expected race, not an error). `next_run_at` is
    /// recomputed when the timing changes.
    pub fn update(&mut self, id: &str, patch: SchedulePatch) -> Result<Option<ScheduleRecord>> {
        self.refresh_from_disk();
        let now = Utc::now();
        let Some(record) = self.file.schedules.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };

        if let Some(name) = patch.name {
            record.name = name;
        }
        if let Some(description) = patch.description {
            record.description = description;
        }
        if let Some(icon) = patch.icon {
            record.icon = icon;
        }
        if let Some(group) = patch.group {
            record.group = group;
        }
        if let Some(execution) = patch.execution {
            record.execution = execution;
        }
        if let Some(status) = patch.status {
            record.status = status;
        }
        if let Some(retry) = patch.retry_on_failure {
            record.retry_on_failure = retry;
        }
        if let Some(max_retries) = patch.max_retries {
            record.max_retries = max_retries;
        }
        if let Some(delays) = patch.retry_delay_minutes {
            record.retry_delay_minutes = delays;
        }
        if let Some(open_on_run) = patch.open_on_run {
            record.open_on_run = open_on_run;
        }
        if let Some(timing) = patch.timing {
            record.timing = timing;
            record.next_run_at = next_run(&record.timing, now);
        }
        record.updated_at = now;

        let updated = record.clone();
        self.save()?;
        Ok(Some(updated))
    }

    /// Remove a schedule entirely. Returns whether a record was removed.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        self.refresh_from_disk();
        let before = self.file.schedules.len();
        self.file.schedules.retain(|s| s.id != id);
        if self.file.schedules.len() < before {
            self.save()?;
            info!("Deleted schedule {id}");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Suspend a schedule. Its stale `next_run_at` is kept; paused
    /// schedules never appear in due/missed queries anyway.
    pub fn pause(&mut self, id: &str) -> Result<Option<ScheduleRecord>> {
        self.refresh_from_disk();
        let now = Utc::now();
        let Some(record) = self.file.schedules.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        record.status = ScheduleStatus::Paused;
        record.updated_at = now;
        let updated = record.clone();
        self.save()?;
        info!("Paused schedule {id}");
        Ok(Some(updated))
    }

    /// Reactivate a schedule from any prior status (including `Error`),
    /// clearing the failure counter and recomputing `next_run_at`.
    pub fn resume(&mut self, id: &str) -> Result<Option<ScheduleRecord>> {
        self.refresh_from_disk();
        let now = Utc::now();
        let Some(record) = self.file.schedules.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        record.status = ScheduleStatus::Active;
        record.consecutive_failures = 0;
        record.next_run_at = next_run(&record.timing, now);
        record.updated_at = now;
        let updated = record.clone();
        self.save()?;
        info!("Resumed schedule {id}");
        Ok(Some(updated))
    }

    /// Active schedules whose cached due instant has already passed:
    /// runs that should have fired while no process was watching.
    pub fn missed_schedules(&mut self, now: DateTime<Utc>) -> Vec<ScheduleRecord> {
        self.refresh_from_disk();
        self.file
            .schedules
            .iter()
            .filter(|s| {
                s.status == ScheduleStatus::Active
                    && s.next_run_at.is_some_and(|next| next <= now)
            })
            .cloned()
            .collect()
    }

    /// Append an execution record to the bounded history and stamp
    /// `last_run_at`. Returns false when the id is unknown.
    pub fn add_history_entry(&mut self, id: &str, entry: HistoryEntry) -> Result<bool> {
        self.refresh_from_disk();
        let Some(record) = self.file.schedules.iter_mut().find(|s| s.id == id) else {
            return Ok(false);
        };
        record.last_run_at = Some(entry.executed_at);
        record.push_history(entry);
        record.updated_at = Utc::now();
        self.save()?;
        Ok(true)
    }

    pub(crate) fn schedules_mut(&mut self) -> &mut Vec<ScheduleRecord> {
        &mut self.file.schedules
    }

    pub(crate) fn persist(&self) -> Result<()> {
        self.save()
    }
}
