//! Campaign metrics: counts derived from the event store on every read.

use campaign_core::error::StoreError;
use campaign_core::{EventStore, MetricsSnapshot};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub struct MetricsAggregator {
    store: Arc<dyn EventStore>,
}

impl MetricsAggregator {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Counters over every persisted event. No caching.
    pub async fn snapshot(&self) -> Result<MetricsSnapshot, StoreError> {
        self.compute(None).await
    }

    /// The same counters restricted to one recipient.
    pub async fn snapshot_for(&self, email: &str) -> Result<MetricsSnapshot, StoreError> {
        self.compute(Some(email)).await
    }

    async fn compute(&self, email: Option<&str>) -> Result<MetricsSnapshot, StoreError> {
        let start = Instant::now();
        let snapshot = self.store.tally(email).await?;

        metrics::histogram!("analytics.snapshot_latency_us")
            .record(start.elapsed().as_micros() as f64);
        debug!(
            store = self.store.name(),
            email,
            total_sent = snapshot.total_sent,
            "Metrics snapshot computed"
        );
        Ok(snapshot)
    }
}
