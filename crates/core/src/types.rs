use crate::error::DatasetError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::time::Duration;
use utoipa::ToSchema;
use uuid::Uuid;

/// One dataset record: column name to its string form.
pub type Row = BTreeMap<String, String>;

// ─── Dataset ────────────────────────────────────────────────────────────────

/// Ordered table of rows sharing one column set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Build from a header and positional records (CSV-shaped input).
    pub fn from_rows(
        columns: Vec<String>,
        records: Vec<Vec<String>>,
    ) -> Result<Self, DatasetError> {
        let mut rows = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            if record.len() != columns.len() {
                return Err(DatasetError::InconsistentColumns { row: index });
            }
            rows.push(columns.iter().cloned().zip(record).collect());
        }
        Ok(Self { columns, rows })
    }

    /// Build from JSON objects (spreadsheet "all records" shape).
    ///
    /// The first record defines the column set; every later record must carry
    /// exactly the same keys.
    pub fn from_records(
        records: Vec<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<Self, DatasetError> {
        let columns: Vec<String> = match records.first() {
            Some(first) => first.keys().cloned().collect(),
            None => return Ok(Self::default()),
        };

        let mut rows = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            if record.len() != columns.len() || !columns.iter().all(|c| record.contains_key(c)) {
                return Err(DatasetError::InconsistentColumns { row: index });
            }
            rows.push(
                record
                    .into_iter()
                    .map(|(k, v)| (k, display_value(&v)))
                    .collect(),
            );
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_set(&self) -> HashSet<String> {
        self.columns.iter().cloned().collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// String form of a JSON cell. `null` becomes the empty string.
pub fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ─── Jobs ───────────────────────────────────────────────────────────────────

/// Deferred send of one personalized message. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendJob {
    pub job_id: Uuid,
    pub campaign_id: Uuid,
    /// Zero-based position of the source row in the dataset.
    pub row_index: usize,
    pub recipient: String,
    pub subject: String,
    pub template: String,
    pub fields: Row,
    pub delay_offset: Duration,
}

/// Why a row produced no job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "cause", rename_all = "snake_case")]
pub enum SkipReason {
    MissingRecipient,
    EnqueueFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingRecipient => write!(f, "missing an email address"),
            SkipReason::EnqueueFailed(cause) => write!(f, "failed to schedule: {cause}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub row_index: usize,
    pub reason: SkipReason,
}

/// Summary of one scheduling pass over a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub campaign_id: Uuid,
    pub scheduled_count: usize,
    pub skipped: Vec<SkippedRow>,
}

/// Result of executing one job. Failures are reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Success { status_code: u16 },
    Failure { cause: String },
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryOutcome::Success { .. })
    }
}

// ─── Delivery events ────────────────────────────────────────────────────────

/// Delivery-status event kind, as named by the transport's webhook.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeliveryEventType {
    Sent,
    Processed,
    Delivered,
    Deferred,
    Dropped,
    Open,
    Click,
    Bounce,
    SpamReport,
    Unsubscribe,
    GroupUnsubscribe,
    GroupResubscribe,
    Other(String),
}

impl DeliveryEventType {
    pub fn as_str(&self) -> &str {
        match self {
            DeliveryEventType::Sent => "sent",
            DeliveryEventType::Processed => "processed",
            DeliveryEventType::Delivered => "delivered",
            DeliveryEventType::Deferred => "deferred",
            DeliveryEventType::Dropped => "dropped",
            DeliveryEventType::Open => "open",
            DeliveryEventType::Click => "click",
            DeliveryEventType::Bounce => "bounce",
            DeliveryEventType::SpamReport => "spamreport",
            DeliveryEventType::Unsubscribe => "unsubscribe",
            DeliveryEventType::GroupUnsubscribe => "group_unsubscribe",
            DeliveryEventType::GroupResubscribe => "group_resubscribe",
            DeliveryEventType::Other(name) => name,
        }
    }
}

impl From<&str> for DeliveryEventType {
    fn from(value: &str) -> Self {
        match value {
            "sent" => DeliveryEventType::Sent,
            "processed" => DeliveryEventType::Processed,
            "delivered" => DeliveryEventType::Delivered,
            "deferred" => DeliveryEventType::Deferred,
            "dropped" => DeliveryEventType::Dropped,
            "open" => DeliveryEventType::Open,
            "click" => DeliveryEventType::Click,
            "bounce" => DeliveryEventType::Bounce,
            "spamreport" => DeliveryEventType::SpamReport,
            "unsubscribe" => DeliveryEventType::Unsubscribe,
            "group_unsubscribe" => DeliveryEventType::GroupUnsubscribe,
            "group_resubscribe" => DeliveryEventType::GroupResubscribe,
            other => DeliveryEventType::Other(other.to_string()),
        }
    }
}

impl From<String> for DeliveryEventType {
    fn from(value: String) -> Self {
        DeliveryEventType::from(value.as_str())
    }
}

impl From<DeliveryEventType> for String {
    fn from(value: DeliveryEventType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DeliveryEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delivery-status notification. Append-only; repeats are legitimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub email: String,
    pub event_type: DeliveryEventType,
    /// Epoch seconds as reported by the transport.
    pub timestamp: i64,
}

/// An event as held by a store, with its store-assigned surrogate key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedEvent {
    pub id: u64,
    #[serde(flatten)]
    pub event: DeliveryEvent,
}

/// Campaign counters derived from the event store at read time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MetricsSnapshot {
    /// Every persisted event, irrespective of type.
    pub total_sent: u64,
    pub delivered: u64,
    pub opened: u64,
    pub bounced: u64,
}

impl MetricsSnapshot {
    /// Count one event into every counter it belongs to.
    pub fn record(&mut self, event_type: &DeliveryEventType) {
        self.total_sent += 1;
        match event_type {
            DeliveryEventType::Delivered => self.delivered += 1,
            DeliveryEventType::Open => self.opened += 1,
            DeliveryEventType::Bounce => self.bounced += 1,
            _ => {}
        }
    }
}
