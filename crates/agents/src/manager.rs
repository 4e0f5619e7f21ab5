//! Worker pool: spawns and supervises N delivery workers per node.

use crate::worker::DeliveryWorker;
use campaign_core::JobQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Pause after a queue error before polling again.
const QUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Manages the lifecycle of all delivery workers on this node.
pub struct WorkerPool {
    node_id: String,
    queue: Arc<dyn JobQueue>,
    worker: Arc<DeliveryWorker>,
    handles: Vec<JoinHandle<()>>,
    stop: watch::Sender<bool>,
    shutdown_grace: Duration,
}

impl WorkerPool {
    pub fn new(node_id: impl Into<String>, queue: Arc<dyn JobQueue>, worker: DeliveryWorker) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            node_id: node_id.into(),
            queue,
            worker: Arc::new(worker),
            handles: Vec::new(),
            stop,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// How long [`shutdown`](Self::shutdown) lets running jobs finish.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Spawn `count` workers pulling from the shared queue. At least one
    /// worker is always started.
    pub fn start(&mut self, count: usize) {
        if count == 0 {
            warn!(node = %self.node_id, "Worker count of 0 requested, starting 1");
        }
        let count = count.max(1);

        for i in 0..count {
            let worker_id = format!("{}-worker-{:02}", self.node_id, i);
            let handle = tokio::spawn(run_worker(
                worker_id.clone(),
                self.queue.clone(),
                self.worker.clone(),
                self.stop.subscribe(),
            ));
            self.handles.push(handle);
            info!(worker_id = %worker_id, "Worker spawned");
        }

        info!(
            count,
            node = %self.node_id,
            queue = self.queue.name(),
            "All workers started"
        );
    }

    /// Wait for every worker to exit. Workers exit once the queue reports
    /// it is closed and drained, or after a shutdown request.
    pub async fn wait(&mut self) {
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!(error = %e, "Worker task panicked");
                }
            }
        }
    }

    /// Stop taking new jobs and let every running job finish. Workers still
    /// busy after the grace period are aborted; a durable queue re-delivers
    /// their jobs once the lease expires.
    pub async fn shutdown(&mut self) {
        self.stop.send_replace(true);

        let deadline = tokio::time::Instant::now() + self.shutdown_grace;
        for mut handle in self.handles.drain(..) {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if !e.is_cancelled() {
                        error!(error = %e, "Worker task panicked");
                    }
                }
                Err(_) => {
                    warn!(node = %self.node_id, "Worker still busy after grace period, aborting");
                    handle.abort();
                }
            }
        }
        info!(node = %self.node_id, "Worker pool stopped");
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }
}

async fn run_worker(
    worker_id: String,
    queue: Arc<dyn JobQueue>,
    worker: Arc<DeliveryWorker>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        // Stop only between jobs; a job already dequeued always runs.
        let next = tokio::select! {
            biased;
            _ = stop.wait_for(|stopping| *stopping) => {
                info!(worker_id = %worker_id, "Shutdown requested, worker exiting");
                return;
            }
            next = queue.dequeue() => next,
        };

        let job = match next {
            Ok(Some(job)) => job,
            Ok(None) => break,
            Err(e) => {
                warn!(worker_id = %worker_id, error = %e, "Queue error, backing off");
                tokio::time::sleep(QUEUE_ERROR_BACKOFF).await;
                continue;
            }
        };

        let outcome = worker.execute(&job).await;
        if let Err(e) = queue.ack(&job).await {
            warn!(worker_id = %worker_id, job_id = %job.job_id, error = %e, "Failed to acknowledge job");
        }
        metrics::counter!("delivery.jobs_processed", "worker" => worker_id.clone()).increment(1);
        if outcome.is_success() {
            info!(
                worker_id = %worker_id,
                job_id = %job.job_id,
                campaign_id = %job.campaign_id,
                recipient = %job.recipient,
                "Job completed"
            );
        }
    }

    info!(worker_id = %worker_id, "Queue closed, worker exiting");
}
