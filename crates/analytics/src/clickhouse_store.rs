//! ClickHouse-backed event store.
//!
//! One `INSERT` per event keeps every write independent; counts are
//! `SELECT count()` queries so nothing aggregate is ever stored. A snapshot
//! is one `countIf` statement, so its counters come from the same read.

use async_trait::async_trait;
use campaign_core::config::ClickHouseConfig;
use campaign_core::error::StoreError;
use campaign_core::{DeliveryEvent, EventQuery, EventStore, MetricsSnapshot};
use serde::Deserialize;
use tracing::{debug, info};

const TABLE: &str = "delivery_events";

#[derive(Debug, clickhouse::Row, Deserialize)]
struct TallyRow {
    total_sent: u64,
    delivered: u64,
    opened: u64,
    bounced: u64,
}

pub struct ClickHouseEventStore {
    client: clickhouse::Client,
}

impl ClickHouseEventStore {
    /// Connect and create the events table if it does not exist.
    pub async fn new(config: &ClickHouseConfig) -> anyhow::Result<Self> {
        let client = clickhouse::Client::default()
            .with_url(&config.url)
            .with_database(&config.database);

        Self::ensure_schema(&client).await?;

        info!(url = %config.url, database = %config.database, "ClickHouse event store ready");
        Ok(Self { client })
    }

    async fn ensure_schema(client: &clickhouse::Client) -> anyhow::Result<()> {
        client
            .query(
                "CREATE TABLE IF NOT EXISTS delivery_events (
                    id UUID DEFAULT generateUUIDv4(),
                    email String,
                    event_type LowCardinality(String),
                    timestamp Int64,
                    received_at DateTime64(3) DEFAULT now64(3)
                ) ENGINE = MergeTree()
                ORDER BY (event_type, email, received_at)",
            )
            .execute()
            .await?;

        info!("ClickHouse schema verified");
        Ok(())
    }
}

#[async_trait]
impl EventStore for ClickHouseEventStore {
    async fn insert(&self, event: &DeliveryEvent) -> Result<(), StoreError> {
        self.client
            .query(&format!(
                "INSERT INTO {TABLE} (email, event_type, timestamp) VALUES (?, ?, ?)"
            ))
            .bind(event.email.as_str())
            .bind(event.event_type.as_str())
            .bind(event.timestamp)
            .execute()
            .await
            .map_err(store_error)?;

        debug!(email = %event.email, event_type = %event.event_type, "Event inserted");
        Ok(())
    }

    async fn count(&self, query: &EventQuery) -> Result<u64, StoreError> {
        let (sql, params) = count_sql(query);
        let mut q = self.client.query(&sql);
        for param in params {
            q = q.bind(param);
        }
        q.fetch_one::<u64>().await.map_err(store_error)
    }

    async fn tally(&self, email: Option<&str>) -> Result<MetricsSnapshot, StoreError> {
        let mut q = self.client.query(&tally_sql(email.is_some()));
        if let Some(email) = email {
            q = q.bind(email);
        }
        let row = q.fetch_one::<TallyRow>().await.map_err(store_error)?;
        Ok(MetricsSnapshot {
            total_sent: row.total_sent,
            delivered: row.delivered,
            opened: row.opened,
            bounced: row.bounced,
        })
    }

    fn name(&self) -> &str {
        "clickhouse"
    }
}

/// Build the count statement and its bind values, in placeholder order.
fn count_sql(query: &EventQuery) -> (String, Vec<&str>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    if let Some(event_type) = &query.event_type {
        clauses.push("event_type = ?");
        params.push(event_type.as_str());
    }
    if let Some(email) = &query.email {
        clauses.push("email = ?");
        params.push(email.as_str());
    }

    let mut sql = format!("SELECT count() FROM {TABLE}");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    (sql, params)
}

fn tally_sql(by_email: bool) -> String {
    let mut sql = format!(
        "SELECT count() AS total_sent, \
         countIf(event_type = 'delivered') AS delivered, \
         countIf(event_type = 'open') AS opened, \
         countIf(event_type = 'bounce') AS bounced \
         FROM {TABLE}"
    );
    if by_email {
        sql.push_str(" WHERE email = ?");
    }
    sql
}

fn store_error(err: clickhouse::error::Error) -> StoreError {
    match err {
        clickhouse::error::Error::Network(e) => StoreError::Unavailable(e.to_string()),
        other => StoreError::Query(other.to_string()),
    }
}
