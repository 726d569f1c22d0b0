use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::store::TaskStore;
use crate::task::Task;

// Strictly in the future and strictly inside the window. A task sitting in
// the window across two ticks is reported twice; there is no suppression.
pub fn due_soon<'a>(tasks: &'a [Task], now: DateTime<Utc>, window: TimeDelta) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|task| !task.done)
        .filter(|task| {
            let until = task.deadline.signed_duration_since(now);
            until > TimeDelta::zero() && until < window
        })
        .collect()
}

#[derive(Debug)]
pub struct Reminder {
    shutdown: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Reminder {
    // The thread holds the live store handle, never a snapshot taken at
    // spawn time, so tasks added mid-session are picked up on the next tick.
    pub fn spawn<F>(
        store: Arc<Mutex<TaskStore>>,
        tick: Duration,
        window: TimeDelta,
        notify: F,
    ) -> Self
    where
        F: Fn(&Task) + Send + 'static,
    {
        let (shutdown, ticks) = mpsc::channel::<()>();

        let handle = std::thread::spawn(move || {
            info!(tick_secs = tick.as_secs(), "reminder timer started");

            loop {
                match ticks.recv_timeout(tick) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }

                let snapshot = match store.lock() {
                    Ok(guard) => guard.tasks().to_vec(),
                    Err(_) => {
                        warn!("task store lock poisoned; reminder timer stopping");
                        break;
                    }
                };

                let now = Utc::now();
                for task in due_soon(&snapshot, now, window) {
                    debug!(id = %task.id, deadline = %task.deadline, "task due soon");
                    notify(task);
                }
            }

            info!("reminder timer stopped");
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Reminder {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone, Utc};

    use super::due_soon;
    use crate::task::Task;

    #[test]
    fn only_strictly_inside_the_window() {
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
        let window = TimeDelta::seconds(60);

        let inside = Task::new("inside".to_string(), now + TimeDelta::seconds(30));
        let at_now = Task::new("at now".to_string(), now);
        let at_edge = Task::new("at edge".to_string(), now + TimeDelta::seconds(60));
        let past = Task::new("past".to_string(), now - TimeDelta::seconds(10));
        let far = Task::new("far".to_string(), now + TimeDelta::hours(1));

        let tasks = vec![inside, at_now, at_edge, past, far];
        let due = due_soon(&tasks, now, window);

        assert_eq!(due.len(), 1);
        assert_eq!(due[0].text, "inside");
    }

    #[test]
    fn done_tasks_are_never_reported() {
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
        let mut task = Task::new("already handled".to_string(), now + TimeDelta::seconds(30));
        task.done = true;

        assert!(due_soon(&[task], now, TimeDelta::seconds(60)).is_empty());
    }

    #[test]
    fn a_later_tick_reports_the_same_task_again() {
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
        let window = TimeDelta::seconds(60);
        let task = Task::new("lingering".to_string(), now + TimeDelta::seconds(45));
        let tasks = vec![task];

        assert_eq!(due_soon(&tasks, now, window).len(), 1);
        let next_tick = now + TimeDelta::seconds(30);
        assert_eq!(due_soon(&tasks, next_tick, window).len(), 1);
    }
}
