use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::MetricSink;
use super::queue::{DeliveryJob, JobQueue, JobReceiver};
use super::sampler::SampleSource;
use crate::metrics as telemetry;
use crate::models::Metric;

pub const POLL_COUNT: &str = "PollCount";

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub poll_interval: Duration,
    pub report_interval: Duration,
    pub worker_count: usize,
    /// URL every delivery job is posted to
    pub destination: String,
}

type Samples = Arc<RwLock<HashMap<String, f64>>>;

/// Poll and report loops feeding a fixed pool of delivery workers
pub struct Collector {
    settings: CollectorSettings,
    sampler: Box<dyn SampleSource>,
    sink: Arc<dyn MetricSink>,
}

impl Collector {
    pub fn new(
        settings: CollectorSettings,
        sampler: Box<dyn SampleSource>,
        sink: Arc<dyn MetricSink>,
    ) -> Self {
        Self {
            settings,
            sampler,
            sink,
        }
    }

    /// Run until `cancel` fires, then let the report cycle in progress finish
    /// enqueuing and wait for the workers to drain the queue.
    pub async fn run(self, cancel: CancellationToken) {
        let Self {
            settings,
            sampler,
            sink,
        } = self;

        let samples: Samples = Arc::new(RwLock::new(HashMap::new()));
        let poll_count = Arc::new(AtomicI64::new(0));
        let (queue, receiver) = JobQueue::for_workers(settings.worker_count);

        info!(
            poll_interval_ms = settings.poll_interval.as_millis() as u64,
            report_interval_ms = settings.report_interval.as_millis() as u64,
            workers = settings.worker_count,
            queue_capacity = queue.capacity(),
            destination = %settings.destination,
            "Collector started"
        );

        let workers: Vec<JoinHandle<()>> = (0..settings.worker_count.max(1))
            .map(|id| tokio::spawn(worker(id, receiver.clone(), sink.clone())))
            .collect();
        drop(receiver);

        let poller = tokio::spawn(poll_loop(
            sampler,
            samples.clone(),
            poll_count.clone(),
            settings.poll_interval,
            cancel.clone(),
        ));
        let reporter = tokio::spawn(report_loop(
            queue,
            samples,
            poll_count,
            settings.report_interval,
            settings.destination.clone(),
            cancel,
        ));

        if let Err(e) = poller.await {
            warn!(error = %e, "Poll task ended abnormally");
        }
        if let Err(e) = reporter.await {
            warn!(error = %e, "Report task ended abnormally");
        }
        for handle in workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "Delivery worker ended abnormally");
            }
        }
        info!("Collector stopped");
    }
}

async fn poll_loop(
    mut sampler: Box<dyn SampleSource>,
    samples: Samples,
    poll_count: Arc<AtomicI64>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                let fresh = sampler.sample();
                samples.write().await.extend(fresh);
                let count = poll_count.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(poll_count = count, "Sampled runtime statistics");
            }
        }
    }
}

async fn report_loop(
    queue: JobQueue,
    samples: Samples,
    poll_count: Arc<AtomicI64>,
    period: Duration,
    destination: String,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let jobs = snapshot_jobs(&samples, &poll_count, &destination).await;
                let total = jobs.len();
                // Not cancellable: a started cycle always finishes enqueuing
                for job in jobs {
                    if queue.enqueue(job).await.is_err() {
                        warn!("Delivery queue closed, dropping report cycle");
                        return;
                    }
                }
                debug!(jobs = total, "Report cycle enqueued");
            }
        }
    }
    // Dropping the queue here closes it for the workers
}

/// One gauge job per sample plus the cumulative poll counter
async fn snapshot_jobs(samples: &Samples, poll_count: &AtomicI64, destination: &str) -> Vec<DeliveryJob> {
    let samples = samples.read().await;
    let mut jobs: Vec<DeliveryJob> = samples
        .iter()
        .map(|(name, value)| DeliveryJob {
            metric: Metric::gauge(name.clone(), *value),
            destination: destination.to_string(),
        })
        .collect();
    jobs.push(DeliveryJob {
        metric: Metric::counter(POLL_COUNT, poll_count.load(Ordering::SeqCst)),
        destination: destination.to_string(),
    });
    jobs
}

async fn worker(id: usize, receiver: JobReceiver, sink: Arc<dyn MetricSink>) {
    while let Some(job) = receiver.next().await {
        match sink.deliver(&job).await {
            Ok(()) => telemetry::record_delivery(true),
            Err(e) => {
                telemetry::record_delivery(false);
                warn!(worker = id, metric = %job.metric, error = %e, "Delivery failed, dropping job");
            }
        }
    }
    debug!(worker = id, "Delivery worker finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::sampler::StaticSampler;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<DeliveryJob>>,
        fail_ids: Vec<String>,
    }

    #[async_trait]
    impl MetricSink for RecordingSink {
        async fn deliver(&self, job: &DeliveryJob) -> Result<(), TransportError> {
            if self.fail_ids.contains(&job.metric.id) {
                return Err(TransportError::Cancelled);
            }
            self.delivered.lock().unwrap().push(job.clone());
            Ok(())
        }
    }

    fn settings() -> CollectorSettings {
        CollectorSettings {
            poll_interval: Duration::from_millis(10),
            report_interval: Duration::from_millis(35),
            worker_count: 2,
            destination: "http://localhost:8080/update".to_string(),
        }
    }

    #[tokio::test]
    async fn test_reports_gauges_and_poll_count() {
        let sink = Arc::new(RecordingSink::default());
        let collector = Collector::new(
            settings(),
            Box::new(StaticSampler::new([("Alloc", 10.0), ("HeapSys", 20.0)])),
            sink.clone(),
        );
        let cancel = CancellationToken::new();
        let run = tokio::spawn(collector.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(150)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("collector should stop after cancellation")
            .unwrap();

        let delivered = sink.delivered.lock().unwrap();
        assert!(delivered.iter().any(|j| j.metric == Metric::gauge("Alloc", 10.0)));
        assert!(delivered.iter().any(|j| j.metric == Metric::gauge("HeapSys", 20.0)));

        let poll_counts: Vec<i64> = delivered
            .iter()
            .filter(|j| j.metric.id == POLL_COUNT)
            .filter_map(|j| j.metric.delta())
            .collect();
        assert!(!poll_counts.is_empty());
        // cumulative, never reset between reports
        assert!(poll_counts.windows(2).all(|w| w[0] <= w[1]));
        assert!(delivered.iter().all(|j| j.destination == "http://localhost:8080/update"));
    }

    #[tokio::test]
    async fn test_failed_deliveries_are_dropped() {
        let sink = Arc::new(RecordingSink {
            fail_ids: vec!["Alloc".to_string()],
            ..Default::default()
        });
        let collector = Collector::new(
            settings(),
            Box::new(StaticSampler::new([("Alloc", 1.0), ("Frees", 2.0)])),
            sink.clone(),
        );
        let cancel = CancellationToken::new();
        let run = tokio::spawn(collector.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(120)).await;
        cancel.cancel();
        run.await.unwrap();

        let delivered = sink.delivered.lock().unwrap();
        assert!(delivered.iter().all(|j| j.metric.id != "Alloc"));
        assert!(delivered.iter().any(|j| j.metric.id == "Frees"));
    }

    #[tokio::test]
    async fn test_snapshot_jobs_include_poll_count() {
        let samples: Samples = Arc::new(RwLock::new(HashMap::from([("Alloc".to_string(), 3.0)])));
        let poll_count = AtomicI64::new(5);

        let jobs = snapshot_jobs(&samples, &poll_count, "http://x/update").await;
        assert_eq!(jobs.len(), 2);
        assert!(jobs.contains(&DeliveryJob {
            metric: Metric::counter(POLL_COUNT, 5),
            destination: "http://x/update".to_string(),
        }));
    }
}
