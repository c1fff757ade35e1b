use chrono::{Duration, NaiveDateTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::store::TaskStore;
use crate::task::Task;

pub const REMINDER_TITLE: &str = "UTTER REMINDER";

/// Tasks older than this past their due time are never alerted; it bounds
/// the flood of stale reminders after the process was not running.
pub const DEFAULT_WINDOW_SECS: i64 = 300;

/// External notification seam. Implementations carry the desktop
/// notification and the audio cue; failures are the caller's to ignore.
pub trait Notifier {
    fn notify(&self, title: &str, body: &str) -> anyhow::Result<()>;

    fn chime(&self) {}
}

pub fn reminder_body(task: &Task) -> String {
    format!(
        "[{}] {}",
        task.priority.as_str().to_uppercase(),
        task.summary
    )
}

/// Snapshot selection: due, uncompleted, not yet alerted, at-or-past due
/// time, and within the recency window.
#[tracing::instrument(skip(tasks))]
pub fn select_due(tasks: &[Task], now: NaiveDateTime, window: Duration) -> Vec<Uuid> {
    tasks
        .iter()
        .filter(|task| {
            let Some(due) = task.due else {
                return false;
            };
            !task.completed && !task.reminder_sent && now >= due && now - due < window
        })
        .map(|task| task.id)
        .collect()
}

/// One tick of the scheduler: alert each selected task exactly once, then
/// acknowledge the whole batch with a single store write.
#[tracing::instrument(skip(store, notifier))]
pub fn run_sweep(
    store: &mut TaskStore,
    notifier: &dyn Notifier,
    now: NaiveDateTime,
    window: Duration,
) -> anyhow::Result<usize> {
    let selected = select_due(store.all(), now, window);
    if selected.is_empty() {
        debug!("sweep found nothing due");
        return Ok(0);
    }

    for id in &selected {
        let Some(task) = store.all().iter().find(|t| t.id == *id) else {
            continue;
        };
        if let Err(err) = notifier.notify(REMINDER_TITLE, &reminder_body(task)) {
            warn!(error = %err, id = %id, "notification unavailable; skipping side effect");
        }
        notifier.chime();
    }

    let marked = store.mark_reminded(&selected)?;
    info!(alerted = marked, "reminder sweep complete");
    Ok(marked)
}
