use thiserror::Error;

/// Batch-level rejection: nothing is scheduled when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("email template must not be empty")]
    EmptyTemplate,

    #[error("the dataset must include a '{0}' column")]
    MissingRecipientColumn(String),

    #[error("missing placeholder '{0}' in the dataset")]
    MissingKey(String),
}

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse dataset: {0}")]
    Parse(String),

    #[error("row {row} does not match the dataset header")]
    InconsistentColumns { row: usize },

    #[error("failed to fetch dataset: {0}")]
    Fetch(String),

    #[error("invalid dataset source: {0}")]
    InvalidSource(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersonalizationError {
    #[error("missing placeholder for key: {0}")]
    MissingField(String),

    #[error("text generation failed: {0}")]
    GenerationFailed(String),
}

#[derive(Error, Debug, Clone)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generation service returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("generation service returned no text")]
    EmptyResponse,
}

#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("delivery request failed: {0}")]
    Request(String),

    #[error("delivery rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Error, Debug, Clone)]
pub enum QueueError {
    #[error("job queue is closed")]
    Closed,

    #[error("job queue backend error: {0}")]
    Backend(String),

    #[error("job serialization error: {0}")]
    Serialization(String),
}

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("event store unavailable: {0}")]
    Unavailable(String),

    #[error("event store query failed: {0}")]
    Query(String),
}

#[derive(Error, Debug, Clone)]
pub enum IngestError {
    #[error("no data received")]
    EmptyBatch,

    #[error(transparent)]
    Store(#[from] StoreError),
}
