use crate::config::LegacyForwardingConfig;
use crate::steering::types::{ForwardMode, TaskConfig};
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Persisted task list: an ordered JSON array of `TaskConfig` records,
/// rewritten in full on every structural change. The registry is the only
/// writer.
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load all records; a missing file is an empty list.
    pub fn load(&self) -> Result<Vec<TaskConfig>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read task store at {}", self.path.display()))?;
        let tasks: Vec<TaskConfig> = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse task store at {}", self.path.display()))?;
        Ok(tasks)
    }

    /// Rewrite the whole list atomically (temp file + rename), so a crashed
    /// write never leaves a torn store behind.
    pub fn save(&self, tasks: &[TaskConfig]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create store directory {}", parent.display())
            })?;
        }

        let rendered =
            serde_json::to_string_pretty(tasks).context("failed to serialize task store")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, rendered)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }

    /// Load the task list, or seed it: when no task file exists and legacy
    /// flat forwarding settings are present, synthesize one default task from
    /// them and persist the result.
    pub fn load_or_seed(&self, legacy: Option<&LegacyForwardingConfig>) -> Result<Vec<TaskConfig>> {
        if self.exists() {
            return self.load();
        }

        let mut tasks = Vec::new();
        if let Some(legacy) = legacy
            && !legacy.source_chat.trim().is_empty()
            && !legacy.target_chat.trim().is_empty()
        {
            tasks.push(synthesize_default_task(legacy));
            tracing::info!("synthesized default task from legacy forwarding settings");
        }

        self.save(&tasks)?;
        Ok(tasks)
    }
}

fn synthesize_default_task(legacy: &LegacyForwardingConfig) -> TaskConfig {
    let mut task = TaskConfig::new(
        format!("default-{}", uuid::Uuid::new_v4()),
        "Default Task",
        legacy.source_chat.trim(),
        legacy.target_chat.trim(),
    );
    task.forward_delay = legacy.forward_delay.max(0.0);
    task.max_retries = legacy.max_retries;
    task.forward_mode = if legacy.forward_mode.eq_ignore_ascii_case("forward") {
        ForwardMode::Forward
    } else {
        ForwardMode::Copy
    };
    task
}
