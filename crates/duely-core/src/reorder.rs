use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::filter::{self, FilterMode};
use crate::task::Task;

// What the gesture collaborator hands us: positions relative to the list the
// user was actually looking at. A missing destination is a canceled gesture.
#[derive(Debug, Clone, Copy)]
pub struct DragResult {
    pub source: usize,
    pub destination: Option<usize>,
}

// Produces the new full order, or None when nothing should change. Hidden
// tasks keep their relative order but move, as one block, after the visible
// ones. Reordering under a narrow filter therefore shuffles hidden tasks
// relative to visible ones; that is the contract, not an accident.
pub fn apply_drag(
    tasks: &[Task],
    mode: FilterMode,
    now: DateTime<Utc>,
    drag: DragResult,
) -> Option<Vec<Task>> {
    let Some(destination) = drag.destination else {
        debug!("drag canceled: no destination");
        return None;
    };

    let mut visible = filter::visible(tasks, mode, now);
    if drag.source >= visible.len() {
        debug!(
            source = drag.source,
            visible = visible.len(),
            "drag skipped: source out of range"
        );
        return None;
    }

    let moved = visible.remove(drag.source);
    let destination = destination.min(visible.len());
    visible.insert(destination, moved);

    let visible_ids: BTreeSet<Uuid> = visible.iter().map(|task| task.id).collect();
    let hidden = tasks.iter().filter(|task| !visible_ids.contains(&task.id));

    Some(visible.into_iter().chain(hidden).cloned().collect())
}
