use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    All,
    Active,
    Overdue,
    Done,
}

impl FromStr for FilterMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "overdue" => Ok(Self::Overdue),
            "done" => Ok(Self::Done),
            other => Err(anyhow!(
                "unknown filter mode: {other} (expected all, active, overdue or done)"
            )),
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::All => "all",
            Self::Active => "active",
            Self::Overdue => "overdue",
            Self::Done => "done",
        };
        write!(f, "{name}")
    }
}

pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    !task.done && task.deadline < now
}

pub fn matches(task: &Task, mode: FilterMode, now: DateTime<Utc>) -> bool {
    match mode {
        FilterMode::All => true,
        FilterMode::Active => !task.done && !is_overdue(task, now),
        FilterMode::Overdue => is_overdue(task, now),
        FilterMode::Done => task.done,
    }
}

pub fn visible<'a>(tasks: &'a [Task], mode: FilterMode, now: DateTime<Utc>) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|task| matches(task, mode, now))
        .collect()
}
