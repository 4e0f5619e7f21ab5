use serde::Deserialize;
use std::time::Duration;

/// Root application configuration. Loaded from environment variables
/// with the prefix `CAMPAIGN_EXPRESS__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub clickhouse: ClickHouseConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Campaign scheduling parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Column holding each row's recipient address.
    #[serde(default = "default_recipient_column")]
    pub recipient_column: String,
    /// Spacing between consecutive rows' send times.
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
    #[serde(default = "default_subject")]
    pub default_subject: String,
}

impl DispatchConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.base_delay_secs)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_count")]
    pub count: usize,
    #[serde(default = "default_queue_backend")]
    pub queue_backend: QueueBackend,
    /// How long shutdown waits for in-flight jobs before aborting them.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl WorkerConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_urls")]
    pub urls: Vec<String>,
    #[serde(default = "default_queue_key")]
    pub queue_key: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// A claimed job returns to the queue if it is not acknowledged within
    /// this window.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    ClickHouse,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClickHouseConfig {
    #[serde(default = "default_clickhouse_url")]
    pub url: String,
    #[serde(default = "default_clickhouse_db")]
    pub database: String,
}

/// OpenAI-compatible text generation endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_endpoint")]
    pub endpoint: String,
    /// Empty means generation is disabled and prompts are sent as-is.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

/// SendGrid delivery settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_sendgrid_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_from_email")]
    pub from_email: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    /// Log messages instead of sending them.
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_recipient_column() -> String {
    "Email".to_string()
}
fn default_base_delay_secs() -> u64 {
    5
}
fn default_subject() -> String {
    "Custom Email".to_string()
}
fn default_worker_count() -> usize {
    4
}
fn default_shutdown_grace_secs() -> u64 {
    30
}
fn default_queue_backend() -> QueueBackend {
    QueueBackend::Memory
}
fn default_redis_urls() -> Vec<String> {
    vec!["redis://localhost:6379".to_string()]
}
fn default_queue_key() -> String {
    "campaign-express:send-jobs".to_string()
}
fn default_poll_interval_ms() -> u64 {
    250
}
fn default_lease_secs() -> u64 {
    300
}
fn default_store_backend() -> StoreBackend {
    StoreBackend::Memory
}
fn default_clickhouse_url() -> String {
    "http://localhost:8123".to_string()
}
fn default_clickhouse_db() -> String {
    "campaign_express".to_string()
}
fn default_generation_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_tokens() -> u32 {
    150
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_sendgrid_endpoint() -> String {
    "https://api.sendgrid.com".to_string()
}
fn default_from_email() -> String {
    "campaigns@example.com".to_string()
}
fn default_from_name() -> String {
    "Campaign Express".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            recipient_column: default_recipient_column(),
            base_delay_secs: default_base_delay_secs(),
            default_subject: default_subject(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            queue_backend: default_queue_backend(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            urls: default_redis_urls(),
            queue_key: default_queue_key(),
            poll_interval_ms: default_poll_interval_ms(),
            lease_secs: default_lease_secs(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
        }
    }
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: default_clickhouse_url(),
            database: default_clickhouse_db(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_generation_endpoint(),
            api_key: String::new(),
            model: default_generation_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_sendgrid_endpoint(),
            api_key: String::new(),
            from_email: default_from_email(),
            from_name: default_from_name(),
            dry_run: false,
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            dispatch: DispatchConfig::default(),
            workers: WorkerConfig::default(),
            redis: RedisConfig::default(),
            store: StoreConfig::default(),
            clickhouse: ClickHouseConfig::default(),
            generation: GenerationConfig::default(),
            delivery: DeliveryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("CAMPAIGN_EXPRESS")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("redis.urls"),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that deserialize fine but cannot run.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.workers.count == 0 {
            return Err(config::ConfigError::Message(
                "workers.count must be at least 1".into(),
            ));
        }
        if self.redis.lease_secs == 0 {
            return Err(config::ConfigError::Message(
                "redis.lease_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
