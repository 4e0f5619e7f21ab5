pub mod capabilities;
pub mod config;
pub mod error;
pub mod template;
pub mod types;

pub use capabilities::{DeliveryTransport, EventQuery, EventStore, JobQueue, TextGenerator};
pub use config::AppConfig;
pub use template::{Template, Token};
pub use types::{Dataset, DeliveryEvent, DeliveryEventType, MetricsSnapshot, Row, SendJob};
