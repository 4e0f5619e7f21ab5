//! External capabilities the pipeline depends on.
//!
//! The scheduler, workers, ingestor and aggregator only see these traits;
//! concrete backends (OpenAI-compatible generation, SendGrid, Redis, ClickHouse,
//! in-process fakes) are chosen at startup and passed in as `Arc<dyn …>`.

use crate::error::{GenerationError, QueueError, StoreError, TransportError};
use crate::types::{DeliveryEvent, DeliveryEventType, MetricsSnapshot, SendJob};
use async_trait::async_trait;
use std::time::Duration;

/// Turns a rendered prompt into a message body.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Provider name for metrics/logging.
    fn name(&self) -> &str;
}

/// Sends one message and returns the transport's status code.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn deliver(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<u16, TransportError>;

    fn name(&self) -> &str;
}

/// Deferred job queue. The queue honors `run_after`; callers only compute it.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Hand a job to the queue. Returns once the job is accepted, not executed.
    async fn enqueue(&self, job: SendJob, run_after: Duration) -> Result<(), QueueError>;

    /// Wait for the next due job. Each job is handed to exactly one caller.
    /// `Ok(None)` means the queue is closed and drained.
    async fn dequeue(&self) -> Result<Option<SendJob>, QueueError>;

    /// Mark a dequeued job as finished. Durable queues hand an
    /// unacknowledged job out again once its lease runs out.
    async fn ack(&self, _job: &SendJob) -> Result<(), QueueError> {
        Ok(())
    }

    fn name(&self) -> &str;
}

/// Predicate for [`EventStore::count`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    pub event_type: Option<DeliveryEventType>,
    pub email: Option<String>,
}

impl EventQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn of_type(event_type: DeliveryEventType) -> Self {
        Self {
            event_type: Some(event_type),
            email: None,
        }
    }

    pub fn for_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn matches(&self, event: &DeliveryEvent) -> bool {
        self.event_type
            .as_ref()
            .map_or(true, |t| *t == event.event_type)
            && self.email.as_ref().map_or(true, |e| *e == event.email)
    }
}

/// Append-only event table. Each insert is independently atomic.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert(&self, event: &DeliveryEvent) -> Result<(), StoreError>;

    async fn count(&self, query: &EventQuery) -> Result<u64, StoreError>;

    /// All campaign counters from a single read, optionally for one
    /// recipient. Never assembled from separate `count` calls.
    async fn tally(&self, email: Option<&str>) -> Result<MetricsSnapshot, StoreError>;

    fn name(&self) -> &str;
}
