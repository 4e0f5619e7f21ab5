use async_trait::async_trait;
use campaign_agents::{DeliveryWorker, DispatchScheduler, InProcessQueue, WorkerPool};
use campaign_channels::LogTransport;
use campaign_core::config::DispatchConfig;
use campaign_core::error::TransportError;
use campaign_core::{Dataset, DeliveryTransport};
use campaign_personalization::EchoGenerator;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Captures each delivery together with the elapsed time since creation.
struct TimedTransport {
    started: Instant,
    sent: Mutex<Vec<(String, String, Duration)>>,
    fail_for: Option<String>,
}

impl TimedTransport {
    fn new(fail_for: Option<&str>) -> Self {
        Self {
            started: Instant::now(),
            sent: Mutex::new(Vec::new()),
            fail_for: fail_for.map(String::from),
        }
    }
}

#[async_trait]
impl DeliveryTransport for TimedTransport {
    async fn deliver(&self, recipient: &str, _subject: &str, body: &str) -> Result<u16, TransportError> {
        if self.fail_for.as_deref() == Some(recipient) {
            return Err(TransportError::Request("mailbox unavailable".into()));
        }
        self.sent
            .lock()
            .push((recipient.to_string(), body.to_string(), self.started.elapsed()));
        Ok(202)
    }

    fn name(&self) -> &str {
        "timed"
    }
}

fn order_dataset() -> Dataset {
    Dataset::from_rows(
        vec!["Email".into(), "name".into(), "product".into()],
        vec![
            vec!["ann@x".into(), "Ann".into(), "lamp".into()],
            vec!["bo@x".into(), "Bo".into(), "desk".into()],
            vec!["cy@x".into(), "Cy".into(), "chair".into()],
        ],
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_campaign_runs_end_to_end_with_staggered_sends() {
    let queue = Arc::new(InProcessQueue::new());
    let transport = Arc::new(TimedTransport::new(None));

    let scheduler = DispatchScheduler::new(queue.clone(), DispatchConfig::default());
    let result = scheduler
        .schedule(&order_dataset(), "Dear {name}, your {product} has shipped.")
        .await
        .unwrap();
    assert_eq!(result.scheduled_count, 3);
    queue.close();

    let worker = DeliveryWorker::new(Arc::new(EchoGenerator), transport.clone());
    let mut pool = WorkerPool::new("it", queue, worker);
    pool.start(2);
    pool.wait().await;

    let mut sent = transport.sent.lock().clone();
    sent.sort_by_key(|(_, _, at)| *at);

    let bodies: Vec<&str> = sent.iter().map(|(_, body, _)| body.as_str()).collect();
    assert_eq!(
        bodies,
        vec![
            "Dear Ann, your lamp has shipped.",
            "Dear Bo, your desk has shipped.",
            "Dear Cy, your chair has shipped.",
        ]
    );
    assert!(sent[1].2 >= Duration::from_secs(5));
    assert!(sent[2].2 >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_one_failed_delivery_does_not_stop_the_rest() {
    let queue = Arc::new(InProcessQueue::new());
    let transport = Arc::new(TimedTransport::new(Some("bo@x")));

    let scheduler = DispatchScheduler::new(queue.clone(), DispatchConfig::default());
    scheduler
        .schedule(&order_dataset(), "Hi {name}")
        .await
        .unwrap();
    queue.close();

    let worker = DeliveryWorker::new(Arc::new(EchoGenerator), transport.clone());
    let mut pool = WorkerPool::new("it", queue, worker);
    pool.start(1);
    pool.wait().await;

    let mut recipients: Vec<String> = transport
        .sent
        .lock()
        .iter()
        .map(|(r, _, _)| r.clone())
        .collect();
    recipients.sort();
    assert_eq!(recipients, vec!["ann@x".to_string(), "cy@x".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_dry_run_transport_accepts_everything() {
    let queue = Arc::new(InProcessQueue::new());
    let scheduler = DispatchScheduler::new(queue.clone(), DispatchConfig::default());
    scheduler
        .schedule(&order_dataset(), "Hello {name}")
        .await
        .unwrap();
    queue.close();

    let worker = DeliveryWorker::new(Arc::new(EchoGenerator), Arc::new(LogTransport));
    let mut pool = WorkerPool::new("it", queue.clone(), worker);
    pool.start(2);
    pool.wait().await;

    assert_eq!(queue.waiting(), 0);
}
