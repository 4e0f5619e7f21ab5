//! Event ingestor: validates inbound delivery-event batches from the
//! transport webhook and persists each well-formed event.

use campaign_core::error::IngestError;
use campaign_core::{DeliveryEvent, DeliveryEventType, EventStore};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outcome of an accepted batch. Skipped items are not itemized back to the
/// sender.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub accepted: usize,
    pub skipped: usize,
}

/// Persists webhook events into the event store.
pub struct EventIngestor {
    store: Arc<dyn EventStore>,
}

impl EventIngestor {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        info!(store = store.name(), "Event ingestor initialized");
        Self { store }
    }

    /// Ingest a raw batch.
    ///
    /// An absent or empty batch is rejected. Malformed items are skipped and
    /// the loop continues. Each insert stands alone: a store failure aborts
    /// the call but leaves earlier inserts of the same batch in place.
    pub async fn ingest(&self, events: Option<Vec<Value>>) -> Result<IngestSummary, IngestError> {
        let events = match events {
            Some(events) if !events.is_empty() => events,
            _ => {
                metrics::counter!("events.empty_batches").increment(1);
                return Err(IngestError::EmptyBatch);
            }
        };

        let mut summary = IngestSummary::default();

        for (index, raw) in events.iter().enumerate() {
            let event = match parse_event(raw) {
                Ok(event) => event,
                Err(field) => {
                    warn!(index, field, "Skipping malformed delivery event");
                    metrics::counter!("events.skipped").increment(1);
                    summary.skipped += 1;
                    continue;
                }
            };

            if let Err(e) = self.store.insert(&event).await {
                error!(
                    error = %e,
                    index,
                    persisted = summary.accepted,
                    "Event store failed, aborting batch"
                );
                metrics::counter!("events.store_errors").increment(1);
                return Err(IngestError::Store(e));
            }

            debug!(email = %event.email, event_type = %event.event_type, "Delivery event stored");
            metrics::counter!("events.ingested", "type" => event.event_type.to_string())
                .increment(1);
            summary.accepted += 1;
        }

        info!(
            accepted = summary.accepted,
            skipped = summary.skipped,
            "Delivery event batch ingested"
        );
        Ok(summary)
    }
}

/// Extract `{email, event, timestamp}`. The error names the offending field.
fn parse_event(raw: &Value) -> Result<DeliveryEvent, &'static str> {
    let email = raw
        .get("email")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or("email")?;
    let event_type = raw
        .get("event")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or("event")?;
    let timestamp = raw
        .get("timestamp")
        .and_then(Value::as_i64)
        .ok_or("timestamp")?;

    Ok(DeliveryEvent {
        email: email.to_string(),
        event_type: DeliveryEventType::from(event_type),
        timestamp,
    })
}
