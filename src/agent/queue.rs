use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::models::Metric;

/// Jobs allowed in flight per worker before the producer blocks
pub const JOBS_PER_WORKER: usize = 4;

/// One metric bound for one URL, consumed by exactly one worker
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryJob {
    pub metric: Metric,
    pub destination: String,
}

#[derive(Debug, thiserror::Error)]
#[error("delivery queue is closed")]
pub struct QueueClosed(pub DeliveryJob);

/// Producer side of the bounded delivery queue. Dropping every producer
/// closes the queue; workers then drain what is left and stop.
#[derive(Debug, Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<DeliveryJob>,
}

/// Consumer side, shared by all workers
#[derive(Debug, Clone)]
pub struct JobReceiver {
    receiver: Arc<Mutex<mpsc::Receiver<DeliveryJob>>>,
}

impl JobQueue {
    /// Queue sized for `worker_count` workers
    pub fn for_workers(worker_count: usize) -> (JobQueue, JobReceiver) {
        Self::bounded(worker_count.max(1) * JOBS_PER_WORKER)
    }

    pub fn bounded(capacity: usize) -> (JobQueue, JobReceiver) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            JobQueue { sender },
            JobReceiver {
                receiver: Arc::new(Mutex::new(receiver)),
            },
        )
    }

    /// Wait for a free slot, then enqueue
    pub async fn enqueue(&self, job: DeliveryJob) -> Result<(), QueueClosed> {
        self.sender.send(job).await.map_err(|e| QueueClosed(e.0))
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }
}

impl JobReceiver {
    /// Next job, or `None` once the queue is closed and empty
    pub async fn next(&self) -> Option<DeliveryJob> {
        self.receiver.lock().await.recv().await
    }
}
