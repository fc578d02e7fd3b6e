//! Failure monitor: one timer per assignment.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::ledger::{Assignment, Ledger};

/// Start the deadline for `assignment`.
///
/// When `timeout` elapses and the task is still held by this assignment, it
/// goes back into its phase queue so another worker can claim it. The worker
/// holding it is not told; if it reports later its report is ignored.
/// The handle resolves to whether the task was re-queued.
pub fn watch(ledger: Arc<Ledger>, assignment: Assignment, timeout: Duration) -> JoinHandle<bool> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;

        let requeued = ledger.requeue_if_stalled(assignment).await;
        if requeued {
            warn!(
                "{} task {} (token {}) timed out after {:?}, handing it out again",
                assignment.phase.label(),
                assignment.id,
                assignment.token,
                timeout
            );
        }
        requeued
    })
}
