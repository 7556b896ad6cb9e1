//! Per-slot worker lanes
//!
//! Remote work for one slot must never interleave, while work for different
//! slots may run in parallel. Each slot gets a lane: an unbounded channel
//! drained by a dedicated tokio task that runs jobs one after another, in
//! submission order. Lanes are created on first use and live until
//! [`SlotLanes::close`].
//!
//! ```text
//! submit(2, job) ──→ lane 2 ──→ [job, job, ...] run sequentially
//! submit(5, job) ──→ lane 5 ──→ [job]            runs concurrently with lane 2
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

use crate::SyncError;

/// A unit of work queued on a lane
type SlotJob = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Registry of per-slot worker lanes
#[derive(Debug, Default)]
pub struct SlotLanes {
    lanes: DashMap<usize, mpsc::UnboundedSender<SlotJob>>,
    tracker: TaskTracker,
    closed: AtomicBool,
}

impl SlotLanes {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `job` on the lane for `slot`
    ///
    /// Jobs on one slot run in the order they were submitted.
    pub fn submit<F>(&self, slot: usize, job: F) -> Result<(), SyncError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(SyncError::ShuttingDown);
        }

        let mut job: SlotJob = Box::pin(job);
        // A lane whose worker died (a job panicked) is replaced once.
        for _ in 0..2 {
            let sender = self
                .lanes
                .entry(slot)
                .or_insert_with(|| self.spawn_lane(slot))
                .clone();
            match sender.send(job) {
                Ok(()) => {
                    trace!(slot, "Job queued on slot lane");
                    return Ok(());
                }
                Err(mpsc::error::SendError(returned)) => {
                    debug!(slot, "Slot lane worker gone, replacing lane");
                    self.lanes.remove(&slot);
                    job = returned;
                }
            }
        }
        Err(SyncError::ShuttingDown)
    }

    fn spawn_lane(&self, slot: usize) -> mpsc::UnboundedSender<SlotJob> {
        let (tx, mut rx) = mpsc::unbounded_channel::<SlotJob>();
        self.tracker.spawn(async move {
            trace!(slot, "Slot lane started");
            while let Some(job) = rx.recv().await {
                job.await;
            }
            trace!(slot, "Slot lane stopped");
        });
        tx
    }

    /// Number of lanes created so far
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Stops accepting jobs; queued jobs still run to completion
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.lanes.clear();
        self.tracker.close();
    }

    /// Waits for every lane to drain after [`close`](Self::close)
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_same_slot_runs_in_order() {
        let lanes = SlotLanes::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5u64 {
            let log = log.clone();
            lanes
                .submit(2, async move {
                    // Earlier jobs sleep longer; order must still hold
                    tokio::time::sleep(Duration::from_millis(10 * (5 - i))).await;
                    log.lock().unwrap().push(i);
                })
                .unwrap();
        }

        lanes.close();
        lanes.wait().await;
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert!(lanes.is_empty());
    }

    #[tokio::test]
    async fn test_different_slots_run_concurrently() {
        let lanes = SlotLanes::new();
        let (gate_tx, gate_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = oneshot::channel::<()>();

        // Slot 0 blocks until slot 1 has run
        lanes
            .submit(0, async move {
                let _ = gate_rx.await;
                let _ = done_tx.send(());
            })
            .unwrap();
        lanes
            .submit(1, async move {
                let _ = gate_tx.send(());
            })
            .unwrap();

        tokio::time::timeout(Duration::from_secs(1), done_rx)
            .await
            .expect("slot lanes did not run in parallel")
            .unwrap();
        assert_eq!(lanes.len(), 2);
    }

    #[tokio::test]
    async fn test_submit_after_close_fails() {
        let lanes = SlotLanes::new();
        lanes.close();
        let result = lanes.submit(0, async {});
        assert!(matches!(result, Err(SyncError::ShuttingDown)));
    }
}
