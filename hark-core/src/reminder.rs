//! One-shot reminder scheduling
//!
//! Jobs live in a map keyed by id. A single driver task sleeps until the
//! earliest due job (or until the map changes), fires everything that is due
//! and removes it. Scheduling an id that is already pending replaces it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Local;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::{ReminderJob, ScheduleOutcome};

/// Fragments that introduce the time part of a reminder, lowest priority first
const TIME_MARKERS: [&str; 8] = [
    " at ", " on ", " tomorrow", " today", " next ", " in ", " by ", " after ",
];

/// Split the text after "remind me to" into task and time phrase
///
/// Markers are tried from the end of the list; the first one present splits
/// the phrase at its first occurrence. Without a marker the whole phrase is
/// the task and no time is returned.
///
/// # Examples
/// ```
/// use hark::reminder::split_task_and_time;
///
/// assert_eq!(
///     split_task_and_time("call mom at 6 pm"),
///     ("call mom".to_string(), Some("at 6 pm".to_string()))
/// );
/// assert_eq!(
///     split_task_and_time("water the plants"),
///     ("water the plants".to_string(), None)
/// );
/// ```
pub fn split_task_and_time(rest: &str) -> (String, Option<String>) {
    for marker in TIME_MARKERS.iter().rev() {
        if let Some(idx) = rest.find(marker) {
            let task = rest[..idx].trim().to_string();
            let time = rest[idx..].trim().to_string();
            return (task, Some(time));
        }
    }
    (rest.trim().to_string(), None)
}

/// Callback invoked (on a blocking thread) when a job comes due
pub type FireCallback = Arc<dyn Fn(ReminderJob) + Send + Sync>;

struct SchedulerState {
    jobs: Mutex<HashMap<String, ReminderJob>>,
    wake: Notify,
    running: AtomicBool,
    on_fire: FireCallback,
}

/// Background scheduler holding pending one-shot reminders
pub struct ReminderScheduler {
    state: Arc<SchedulerState>,
}

impl ReminderScheduler {
    /// Start the driver task on the given runtime
    pub fn start(runtime: &Handle, on_fire: FireCallback) -> Self {
        let state = Arc::new(SchedulerState {
            jobs: Mutex::new(HashMap::new()),
            wake: Notify::new(),
            running: AtomicBool::new(true),
            on_fire,
        });

        runtime.spawn(drive(Arc::clone(&state)));
        info!("Reminder scheduler started");

        Self { state }
    }

    /// Register a job, replacing any pending job with the same id
    pub fn schedule(&self, job: ReminderJob) -> Result<ScheduleOutcome> {
        let previous = {
            let mut jobs = self.state.jobs.lock();
            if !self.state.running.load(Ordering::SeqCst) {
                return Err(Error::SchedulerStopped);
            }
            debug!("Scheduling {} for {}", job.id, job.fire_at);
            jobs.insert(job.id.clone(), job)
        };

        self.state.wake.notify_one();

        Ok(match previous {
            Some(_) => ScheduleOutcome::Replaced,
            None => ScheduleOutcome::Scheduled,
        })
    }

    /// Snapshot of pending jobs ordered by fire time
    pub fn pending(&self) -> Vec<ReminderJob> {
        let mut jobs: Vec<_> = self.state.jobs.lock().values().cloned().collect();
        jobs.sort_by_key(|j| j.fire_at);
        jobs
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Stop the driver; pending jobs are discarded without firing
    pub fn shutdown(&self) {
        let discarded = {
            let mut jobs = self.state.jobs.lock();
            self.state.running.store(false, Ordering::SeqCst);
            let count = jobs.len();
            jobs.clear();
            count
        };
        self.state.wake.notify_one();
        info!(
            "Reminder scheduler stopped, {} pending job(s) discarded",
            discarded
        );
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            self.shutdown();
        }
    }
}

async fn drive(state: Arc<SchedulerState>) {
    loop {
        let next_due = {
            let jobs = state.jobs.lock();
            if !state.running.load(Ordering::SeqCst) {
                break;
            }
            jobs.values().map(|j| j.fire_at).min()
        };

        let Some(next_due) = next_due else {
            state.wake.notified().await;
            continue;
        };

        // negative deltas mean the job is already due
        let wait = (next_due - Local::now()).to_std().unwrap_or(Duration::ZERO);
        if !wait.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = state.wake.notified() => {}
            }
            continue;
        }

        let due = {
            let mut jobs = state.jobs.lock();
            if !state.running.load(Ordering::SeqCst) {
                break;
            }
            let now = Local::now();
            let ids: Vec<String> = jobs
                .values()
                .filter(|j| j.fire_at <= now)
                .map(|j| j.id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| jobs.remove(&id))
                .collect::<Vec<_>>()
        };

        for job in due {
            info!("Firing reminder {}", job.id);
            let on_fire = Arc::clone(&state.on_fire);
            let handle = tokio::task::spawn_blocking(move || on_fire(job));
            tokio::spawn(async move {
                if let Err(e) = handle.await {
                    warn!("Reminder callback failed: {}", e);
                }
            });
        }
    }

    debug!("Reminder driver exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_at_clause() {
        assert_eq!(
            split_task_and_time("call mom at 6 pm"),
            ("call mom".to_string(), Some("at 6 pm".to_string()))
        );
    }

    #[test]
    fn test_split_tomorrow() {
        assert_eq!(
            split_task_and_time("buy milk tomorrow 8 am"),
            ("buy milk".to_string(), Some("tomorrow 8 am".to_string()))
        );
    }

    #[test]
    fn test_split_prefers_later_markers() {
        // " on " outranks " at ", so the date clause stays with the time
        assert_eq!(
            split_task_and_time("pay rent on 25 december at 7 pm"),
            (
                "pay rent".to_string(),
                Some("on 25 december at 7 pm".to_string())
            )
        );
        assert_eq!(
            split_task_and_time("stretch in 20 minutes"),
            ("stretch".to_string(), Some("in 20 minutes".to_string()))
        );
    }

    #[test]
    fn test_split_without_marker() {
        assert_eq!(
            split_task_and_time("water the plants"),
            ("water the plants".to_string(), None)
        );
    }

    #[test]
    fn test_split_empty() {
        assert_eq!(split_task_and_time(""), (String::new(), None));
    }

    fn collecting_scheduler() -> (
        ReminderScheduler,
        tokio::sync::mpsc::UnboundedReceiver<ReminderJob>,
    ) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let scheduler = ReminderScheduler::start(
            &Handle::current(),
            Arc::new(move |job| {
                let _ = tx.send(job);
            }),
        );
        (scheduler, rx)
    }

    #[tokio::test]
    async fn test_job_fires_once() {
        let (scheduler, mut rx) = collecting_scheduler();
        let job = ReminderJob::new("stretch", Local::now() + chrono::Duration::milliseconds(100));

        assert_eq!(
            scheduler.schedule(job.clone()).unwrap(),
            ScheduleOutcome::Scheduled
        );

        let fired = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fired, job);
        assert!(scheduler.pending().is_empty());

        // one-shot: nothing else arrives
        let again = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
        assert!(again.is_err());
    }

    #[tokio::test]
    async fn test_same_id_replaces() {
        let (scheduler, mut rx) = collecting_scheduler();
        let at = Local::now() + chrono::Duration::milliseconds(200);

        let first = scheduler.schedule(ReminderJob::new("buy milk", at)).unwrap();
        let second = scheduler.schedule(ReminderJob::new("buy milk", at)).unwrap();

        assert_eq!(first, ScheduleOutcome::Scheduled);
        assert_eq!(second, ScheduleOutcome::Replaced);
        assert_eq!(scheduler.pending().len(), 1);

        let fired = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert!(fired.is_some());
        let duplicate = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn test_earlier_job_added_later_fires_first() {
        let (scheduler, mut rx) = collecting_scheduler();
        let now = Local::now();

        scheduler
            .schedule(ReminderJob::new("late", now + chrono::Duration::seconds(30)))
            .unwrap();
        scheduler
            .schedule(ReminderJob::new("early", now + chrono::Duration::milliseconds(100)))
            .unwrap();

        let fired = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fired.task, "early");
        assert_eq!(scheduler.pending().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_discards_pending() {
        let (scheduler, mut rx) = collecting_scheduler();
        scheduler
            .schedule(ReminderJob::new(
                "never",
                Local::now() + chrono::Duration::milliseconds(150),
            ))
            .unwrap();

        scheduler.shutdown();
        assert!(!scheduler.is_running());
        assert!(scheduler.pending().is_empty());

        let fired = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
        assert!(!matches!(fired, Ok(Some(_))));

        let result = scheduler.schedule(ReminderJob::new("after", Local::now()));
        assert!(matches!(result, Err(Error::SchedulerStopped)));
    }
}
