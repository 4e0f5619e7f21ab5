//! In-process event store for single-node deployments and tests.

use async_trait::async_trait;
use campaign_core::error::StoreError;
use campaign_core::types::PersistedEvent;
use campaign_core::{DeliveryEvent, EventQuery, EventStore, MetricsSnapshot};
use parking_lot::RwLock;

/// Append-only event table behind a read/write lock. The surrogate id is
/// assigned under the write lock, so ids follow insertion order.
#[derive(Default)]
pub struct InMemoryEventStore {
    events: RwLock<Vec<PersistedEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every persisted event, in insertion order.
    pub fn events(&self) -> Vec<PersistedEvent> {
        self.events.read().clone()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn insert(&self, event: &DeliveryEvent) -> Result<(), StoreError> {
        let mut events = self.events.write();
        let id = events.len() as u64 + 1;
        events.push(PersistedEvent {
            id,
            event: event.clone(),
        });
        Ok(())
    }

    async fn count(&self, query: &EventQuery) -> Result<u64, StoreError> {
        let events = self.events.read();
        Ok(events.iter().filter(|p| query.matches(&p.event)).count() as u64)
    }

    async fn tally(&self, email: Option<&str>) -> Result<MetricsSnapshot, StoreError> {
        let events = self.events.read();
        let mut snapshot = MetricsSnapshot::default();
        for persisted in events
            .iter()
            .filter(|p| email.map_or(true, |e| p.event.email == e))
        {
            snapshot.record(&persisted.event.event_type);
        }
        Ok(snapshot)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_core::DeliveryEventType;
    use std::sync::Arc;

    fn event(email: &str, event_type: DeliveryEventType, timestamp: i64) -> DeliveryEvent {
        DeliveryEvent {
            email: email.into(),
            event_type,
            timestamp,
        }
    }

    #[tokio::test]
    async fn test_ids_follow_insert_order() {
        let store = InMemoryEventStore::new();
        store
            .insert(&event("a@x", DeliveryEventType::Sent, 1))
            .await
            .unwrap();
        store
            .insert(&event("a@x", DeliveryEventType::Open, 2))
            .await
            .unwrap();

        let ids: Vec<u64> = store.events().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_count_by_predicate() {
        let store = InMemoryEventStore::new();
        for (email, kind) in [
            ("a@x", DeliveryEventType::Delivered),
            ("b@x", DeliveryEventType::Delivered),
            ("a@x", DeliveryEventType::Open),
        ] {
            store.insert(&event(email, kind, 0)).await.unwrap();
        }

        let delivered = EventQuery::of_type(DeliveryEventType::Delivered);
        assert_eq!(store.count(&EventQuery::all()).await.unwrap(), 3);
        assert_eq!(store.count(&delivered).await.unwrap(), 2);
        assert_eq!(store.count(&delivered.for_email("a@x")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_are_all_kept() {
        let store = Arc::new(InMemoryEventStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for j in 0..25 {
                    let e = event(&format!("user{i}@x"), DeliveryEventType::Open, j);
                    store.insert(&e).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len(), 400);
        let mut ids: Vec<u64> = store.events().iter().map(|p| p.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 400);
    }

    #[tokio::test]
    async fn test_tally_reads_all_counters_at_once() {
        let store = InMemoryEventStore::new();
        for (email, kind) in [
            ("a@x", DeliveryEventType::Sent),
            ("a@x", DeliveryEventType::Delivered),
            ("b@x", DeliveryEventType::Delivered),
            ("b@x", DeliveryEventType::Bounce),
        ] {
            store.insert(&event(email, kind, 0)).await.unwrap();
        }

        let all = store.tally(None).await.unwrap();
        assert_eq!((all.total_sent, all.delivered, all.bounced), (4, 2, 1));

        let b = store.tally(Some("b@x")).await.unwrap();
        assert_eq!((b.total_sent, b.delivered, b.opened, b.bounced), (2, 1, 0, 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_tally_never_sees_half_an_insert_stream() {
        let store = Arc::new(InMemoryEventStore::new());
        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..500 {
                    let e = event(&format!("u{i}@x"), DeliveryEventType::Delivered, i);
                    store.insert(&e).await.unwrap();
                }
            })
        };

        while !writer.is_finished() {
            let snapshot = store.tally(None).await.unwrap();
            assert_eq!(snapshot.delivered, snapshot.total_sent);
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
        assert_eq!(store.tally(None).await.unwrap().delivered, 500);
    }
}
