//! Dataset source: base trait and the shared CSV decoding step.

use async_trait::async_trait;
use campaign_core::error::DatasetError;
use campaign_core::Dataset;
use std::io::Read;

/// Anything that can produce a table of named columns for a campaign.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    async fn load(&self) -> Result<Dataset, DatasetError>;

    /// Source name for logging.
    fn describe(&self) -> String;
}

/// Decode CSV with a header row. Ragged rows are rejected with their index.
pub fn parse_csv<R: Read>(reader: R) -> Result<Dataset, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| DatasetError::Parse(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| DatasetError::Parse(e.to_string()))?;
        records.push(record.iter().map(str::to_string).collect());
    }

    Dataset::from_rows(columns, records)
}
