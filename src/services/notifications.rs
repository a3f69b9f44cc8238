//! Notification queue and worker pool.
//!
//! Request handlers enqueue jobs without waiting; a fixed set of worker tasks
//! drains the queue. Delivery is best-effort: a job that cannot be queued or
//! fails to send is logged and dropped, never retried, and never reported
//! back to the request that produced it.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        Mutex,
    },
    task::JoinHandle,
};

use crate::{
    error::AppResult,
    models::OverdueMember,
    repository::lending::LendingStore,
    services::email::{EmailMessage, Mailer},
};

/// Work handed to the notification workers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationJob {
    /// Confirm a freshly issued loan to its member
    LoanIssued { loan_id: i32 },
    /// Notify every member holding loans due before `as_of`
    OverdueScan { as_of: NaiveDate },
}

/// Producer side of the notification queue
#[derive(Clone)]
pub struct NotificationQueue {
    sender: mpsc::Sender<NotificationJob>,
}

impl NotificationQueue {
    /// Create a queue holding at most `capacity` pending jobs
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<NotificationJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Queue a job without waiting. Returns `false` if the job was dropped.
    pub fn enqueue(&self, job: NotificationJob) -> bool {
        match self.sender.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                tracing::warn!(?job, "Notification queue full, dropping job");
                false
            }
            Err(TrySendError::Closed(job)) => {
                tracing::warn!(?job, "Notification queue closed, dropping job");
                false
            }
        }
    }
}

/// Outcome of one overdue scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverdueScanReport {
    /// Members that were sent a notice
    pub notified: Vec<i32>,
    /// Members whose notice failed, with the error
    pub failed: Vec<(i32, String)>,
}

/// Executes notification jobs
pub struct NotificationDispatcher {
    store: Arc<dyn LendingStore>,
    mailer: Arc<dyn Mailer>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn LendingStore>, mailer: Arc<dyn Mailer>) -> Self {
        Self { store, mailer }
    }

    pub async fn handle(&self, job: NotificationJob) -> AppResult<()> {
        match job {
            NotificationJob::LoanIssued { loan_id } => self.send_loan_confirmation(loan_id).await,
            NotificationJob::OverdueScan { as_of } => {
                let report = self.scan_overdue(as_of).await?;
                tracing::info!(
                    %as_of,
                    notified = report.notified.len(),
                    failed = report.failed.len(),
                    "Overdue scan finished"
                );
                Ok(())
            }
        }
    }

    /// Email the member of a loan. A loan that no longer exists is skipped.
    pub async fn send_loan_confirmation(&self, loan_id: i32) -> AppResult<()> {
        let Some(notice) = self.store.loan_notice(loan_id).await? else {
            tracing::debug!(loan_id, "Loan not found, skipping confirmation");
            return Ok(());
        };

        self.mailer.send(&EmailMessage::loan_issued(&notice)).await?;
        tracing::debug!(loan_id, member_id = notice.member_id, "Loan confirmation sent");
        Ok(())
    }

    /// Send one notice per member with overdue loans. A failed notice is
    /// recorded and the scan moves on to the next member.
    pub async fn scan_overdue(&self, as_of: NaiveDate) -> AppResult<OverdueScanReport> {
        let members = self.store.overdue_members(as_of).await?;
        let mut report = OverdueScanReport::default();

        for member in members {
            match self.send_overdue_notice(&member).await {
                Ok(()) => report.notified.push(member.member_id),
                Err(e) => {
                    tracing::warn!(
                        member_id = member.member_id,
                        overdue_count = member.overdue_count,
                        error = %e,
                        "Overdue notice failed"
                    );
                    report.failed.push((member.member_id, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    pub async fn send_overdue_notice(&self, member: &OverdueMember) -> AppResult<()> {
        self.mailer.send(&EmailMessage::overdue(member)).await
    }
}

/// Start `workers` tasks draining `receiver`. Workers exit once every
/// [`NotificationQueue`] handle is dropped and the queue is empty.
pub fn spawn_workers(
    dispatcher: Arc<NotificationDispatcher>,
    receiver: mpsc::Receiver<NotificationJob>,
    workers: usize,
) -> Vec<JoinHandle<()>> {
    let receiver = Arc::new(Mutex::new(receiver));

    (0..workers.max(1))
        .map(|worker| {
            let dispatcher = dispatcher.clone();
            let receiver = receiver.clone();

            tokio::spawn(async move {
                loop {
                    let job = receiver.lock().await.recv().await;
                    let Some(job) = job else { break };

                    if let Err(e) = dispatcher.handle(job.clone()).await {
                        tracing::warn!(worker, ?job, error = %e, "Notification job failed");
                    }
                }
                tracing::debug!(worker, "Notification worker stopped");
            })
        })
        .collect()
}
