//! In-process delayed job queue.
//!
//! Every enqueued job gets its own Tokio timer; when it fires the job moves to
//! a ready channel. Workers share the receiving end behind an async mutex, so
//! each job is received by exactly one worker.

use async_trait::async_trait;
use campaign_core::error::QueueError;
use campaign_core::{JobQueue, SendJob};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

pub struct InProcessQueue {
    /// `None` once closed. Timer tasks hold their own clones.
    ready_tx: Mutex<Option<mpsc::UnboundedSender<SendJob>>>,
    ready_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<SendJob>>,
    waiting: Arc<AtomicUsize>,
}

impl InProcessQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            ready_tx: Mutex::new(Some(tx)),
            ready_rx: tokio::sync::Mutex::new(rx),
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Stop accepting jobs. Jobs already enqueued still fire; `dequeue`
    /// returns `None` once they have all been handed out.
    pub fn close(&self) {
        self.ready_tx.lock().take();
    }

    /// Jobs whose delay has not elapsed yet.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

impl Default for InProcessQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for InProcessQueue {
    async fn enqueue(&self, job: SendJob, run_after: Duration) -> Result<(), QueueError> {
        let tx = self.ready_tx.lock().clone().ok_or(QueueError::Closed)?;

        if run_after.is_zero() {
            return tx.send(job).map_err(|_| QueueError::Closed);
        }

        self.waiting.fetch_add(1, Ordering::SeqCst);
        let waiting = self.waiting.clone();
        tokio::spawn(async move {
            tokio::time::sleep(run_after).await;
            waiting.fetch_sub(1, Ordering::SeqCst);
            if tx.send(job).is_err() {
                debug!("Ready channel dropped before delayed job fired");
            }
        });
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<SendJob>, QueueError> {
        let mut rx = self.ready_rx.lock().await;
        Ok(rx.recv().await)
    }

    fn name(&self) -> &str {
        "in-process"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn job(recipient: &str) -> SendJob {
        SendJob {
            job_id: Uuid::new_v4(),
            campaign_id: Uuid::nil(),
            row_index: 0,
            recipient: recipient.into(),
            subject: "Custom Email".into(),
            template: "Hi".into(),
            fields: BTreeMap::new(),
            delay_offset: Duration::ZERO,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_job_waits_for_its_timer() {
        let queue = InProcessQueue::new();
        queue
            .enqueue(job("later@x"), Duration::from_secs(10))
            .await
            .unwrap();
        queue.enqueue(job("now@x"), Duration::ZERO).await.unwrap();

        let first = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(first.recipient, "now@x");
        assert_eq!(queue.waiting(), 1);

        let start = tokio::time::Instant::now();
        let second = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(second.recipient, "later@x");
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert_eq!(queue.waiting(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_drains_then_ends() {
        let queue = InProcessQueue::new();
        queue
            .enqueue(job("a@x"), Duration::from_secs(1))
            .await
            .unwrap();
        queue.close();

        assert!(matches!(
            queue.enqueue(job("b@x"), Duration::ZERO).await,
            Err(QueueError::Closed)
        ));
        assert_eq!(queue.dequeue().await.unwrap().unwrap().recipient, "a@x");
        assert!(queue.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_consumers_never_share_a_job() {
        let queue = Arc::new(InProcessQueue::new());
        for i in 0..100 {
            queue
                .enqueue(job(&format!("user{i}@x")), Duration::ZERO)
                .await
                .unwrap();
        }
        queue.close();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(job) = queue.dequeue().await.unwrap() {
                    seen.push(job.job_id);
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(total, 100);
        assert_eq!(all.len(), 100);
    }
}
