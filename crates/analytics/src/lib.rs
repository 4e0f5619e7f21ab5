//! Delivery-event persistence and campaign metrics.
//!
//! Stores are append-only; counters are always derived from them at read time.

pub mod aggregator;
pub mod clickhouse_store;
pub mod memory;

pub use aggregator::MetricsAggregator;
pub use clickhouse_store::ClickHouseEventStore;
pub use memory::InMemoryEventStore;
