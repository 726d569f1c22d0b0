use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: Uuid,

    pub text: String,

    pub deadline: DateTime<Utc>,

    #[serde(default)]
    pub done: bool,
}

impl Task {
    pub fn new(text: String, deadline: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            deadline,
            done: false,
        }
    }
}
