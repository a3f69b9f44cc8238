//! Periodic overdue scan trigger.
//!
//! Each tick queues an [`NotificationJob::OverdueScan`] for today; the scan
//! itself runs on a notification worker, never on this task.

use std::time::Duration;

use tokio::{
    sync::watch,
    time::{self, MissedTickBehavior},
};

use super::{
    notifications::{NotificationJob, NotificationQueue},
    today,
};

/// Run until `shutdown` flips (or its sender is dropped). The first scan is
/// queued immediately.
pub async fn run_overdue_scans(
    queue: NotificationQueue,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!("Overdue scans scheduled (interval: {}s)", every.as_secs());

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let as_of = today();
                if queue.enqueue(NotificationJob::OverdueScan { as_of }) {
                    tracing::debug!(%as_of, "Overdue scan queued");
                }
            }

            _ = shutdown.changed() => {
                tracing::info!("Shutdown signal received. Stopping overdue scans.");
                break;
            }
        }
    }
}
