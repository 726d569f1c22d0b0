use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::task::Task;

#[derive(Debug)]
pub struct TaskStore {
    slot_path: PathBuf,
    tasks: Vec<Task>,
}

impl TaskStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let slot_path = data_dir.join("tasks.json");
        let tasks = load_slot(&slot_path);

        info!(
            slot = %slot_path.display(),
            count = tasks.len(),
            "opened task store"
        );

        Ok(Self { slot_path, tasks })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[tracing::instrument(skip(self, text))]
    pub fn add(&mut self, text: &str, deadline: DateTime<Utc>) -> anyhow::Result<Option<Uuid>> {
        let text = text.trim();
        if text.is_empty() {
            debug!("add skipped: empty text");
            return Ok(None);
        }

        let task = Task::new(text.to_string(), deadline);
        let id = task.id;
        self.tasks.push(task);
        self.persist()?;

        debug!(count = self.tasks.len(), %id, "task added");
        Ok(Some(id))
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn delete(&mut self, id: Uuid) -> anyhow::Result<bool> {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        if self.tasks.len() == before {
            debug!("delete skipped: id not found");
            return Ok(false);
        }

        self.persist()?;
        Ok(true)
    }

    #[tracing::instrument(skip(self, new_text), fields(id = %id))]
    pub fn edit(&mut self, id: Uuid, new_text: &str) -> anyhow::Result<bool> {
        let new_text = new_text.trim();
        if new_text.is_empty() {
            debug!("edit skipped: empty replacement text");
            return Ok(false);
        }

        let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) else {
            debug!("edit skipped: id not found");
            return Ok(false);
        };

        task.text = new_text.to_string();
        self.persist()?;
        Ok(true)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn toggle_done(&mut self, id: Uuid) -> anyhow::Result<bool> {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) else {
            debug!("toggle skipped: id not found");
            return Ok(false);
        };

        task.done = !task.done;
        self.persist()?;
        Ok(true)
    }

    #[tracing::instrument(skip(self, new_full_order))]
    pub fn reorder(&mut self, new_full_order: Vec<Task>) -> anyhow::Result<bool> {
        if !same_id_set(&self.tasks, &new_full_order) {
            warn!("reorder skipped: proposed order is not a permutation of the current tasks");
            return Ok(false);
        }

        self.tasks = new_full_order;
        self.persist()?;
        Ok(true)
    }

    fn persist(&self) -> anyhow::Result<()> {
        save_slot_atomic(&self.slot_path, &self.tasks)
            .with_context(|| format!("failed to persist {}", self.slot_path.display()))
    }
}

// The slot is best-effort on the way in: anything unreadable means an empty
// list, logged but never surfaced.
fn load_slot(path: &Path) -> Vec<Task> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            debug!(file = %path.display(), error = %err, "no persisted tasks; starting empty");
            return vec![];
        }
    };

    match serde_json::from_str(&raw) {
        Ok(tasks) => tasks,
        Err(err) => {
            warn!(file = %path.display(), error = %err, "malformed task slot; starting empty");
            vec![]
        }
    }
}

#[tracing::instrument(skip(path, tasks))]
fn save_slot_atomic(path: &Path, tasks: &[Task]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = tasks.len(), "saving task slot");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    let serialized = serde_json::to_string_pretty(tasks)?;
    temp.write_all(serialized.as_bytes())?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

fn same_id_set(current: &[Task], proposed: &[Task]) -> bool {
    if current.len() != proposed.len() {
        return false;
    }

    let current_ids: BTreeSet<Uuid> = current.iter().map(|task| task.id).collect();
    let proposed_ids: BTreeSet<Uuid> = proposed.iter().map(|task| task.id).collect();
    proposed_ids.len() == proposed.len() && current_ids == proposed_ids
}
