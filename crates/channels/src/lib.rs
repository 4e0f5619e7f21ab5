//! Delivery channels and the inbound delivery-event feed.
//!
//! Email: SendGrid transport for scheduled campaign messages.
//! Ingest: validates webhook event batches and persists each event.

pub mod email;
pub mod ingest;

pub use email::{LogTransport, SendGridTransport};
pub use ingest::{EventIngestor, IngestSummary};
