//! Weekly timer that drives scheduled rotations.
//!
//! A [`Scheduler`] holds at most one armed timer. Arming replaces the previous
//! timer under a single lock, so two timers can never be pending at once.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::config::Schedule;

struct Armed {
    schedule: Schedule,
    task: AbortHandle,
}

#[derive(Default)]
pub struct Scheduler {
    slot: Mutex<Option<Armed>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Armed>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm a timer that calls `job` every time `schedule` comes around,
    /// replacing any timer already armed.
    ///
    /// Each firing runs `job` on its own task; disarming or re-arming stops
    /// future firings but never cancels a job already started.
    pub fn arm<F, Fut>(&self, schedule: Schedule, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // Guard: only spawn if inside a Tokio runtime.
        if tokio::runtime::Handle::try_current().is_err() {
            warn!(%schedule, "no async runtime; scheduled rotation not armed");
            return;
        }

        let mut slot = self.lock();
        if let Some(previous) = slot.take() {
            previous.task.abort();
        }

        let handle = tokio::spawn(async move {
            let mut last_fired: Option<DateTime<Local>> = None;
            loop {
                let now = Local::now();
                let from = match last_fired {
                    Some(last) if last > now => last,
                    _ => now,
                };
                let Some(next) = schedule.next_fire_after(&from) else {
                    warn!(%schedule, "schedule has no upcoming fire time; timer stopped");
                    break;
                };
                let wait = (next - now).to_std().unwrap_or_default();
                debug!(next = %next, "scheduled rotation armed");
                tokio::time::sleep(wait).await;
                last_fired = Some(next);
                info!(%schedule, "scheduled rotation firing");
                tokio::spawn(job());
            }
        });

        *slot = Some(Armed {
            schedule,
            task: handle.abort_handle(),
        });
    }

    pub fn disarm(&self) {
        if let Some(armed) = self.lock().take() {
            armed.task.abort();
        }
    }

    pub fn armed_schedule(&self) -> Option<Schedule> {
        self.lock().as_ref().map(|armed| armed.schedule)
    }

    pub fn next_fire(&self) -> Option<DateTime<Local>> {
        self.armed_schedule()
            .and_then(|schedule| schedule.next_fire_after(&Local::now()))
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[test]
    fn arming_outside_a_runtime_is_a_no_op() {
        let scheduler = Scheduler::new();
        scheduler.arm(Schedule::new(0, 0, 0).unwrap(), || async {});
        assert!(scheduler.armed_schedule().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn armed_timer_fires_job() {
        let scheduler = Scheduler::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        scheduler.arm(Schedule::random(), move || {
            let tx = tx.clone();
            async move {
                let _ = tx.send(());
            }
        });

        // Paused time auto-advances to the pending sleep.
        let fired = tokio::time::timeout(Duration::from_secs(8 * 24 * 3600), rx.recv()).await;
        assert!(matches!(fired, Ok(Some(()))));
        scheduler.disarm();
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_previous_timer() {
        let scheduler = Scheduler::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let first = tx.clone();
        scheduler.arm(Schedule::new(2, 10, 0).unwrap(), move || {
            let tx = first.clone();
            async move {
                let _ = tx.send("first");
            }
        });
        scheduler.arm(Schedule::new(4, 18, 45).unwrap(), move || {
            let tx = tx.clone();
            async move {
                let _ = tx.send("second");
            }
        });
        assert_eq!(
            scheduler.armed_schedule(),
            Some(Schedule::new(4, 18, 45).unwrap())
        );

        let fired = rx.recv().await;
        assert_eq!(fired, Some("second"));
        scheduler.disarm();
    }

    #[tokio::test]
    async fn disarm_clears_slot() {
        let scheduler = Scheduler::new();
        scheduler.arm(Schedule::new(1, 1, 1).unwrap(), || async {});
        assert!(scheduler.next_fire().is_some());
        scheduler.disarm();
        assert!(scheduler.armed_schedule().is_none());
        assert!(scheduler.next_fire().is_none());
    }
}
