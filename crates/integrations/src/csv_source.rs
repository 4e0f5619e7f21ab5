//! Flat-file CSV source.

use crate::source::{parse_csv, DatasetSource};
use async_trait::async_trait;
use campaign_core::error::DatasetError;
use campaign_core::Dataset;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
enum CsvInput {
    Path(PathBuf),
    Text(String),
}

/// CSV from a file on disk or from an uploaded body.
#[derive(Debug, Clone)]
pub struct CsvSource {
    input: CsvInput,
}

impl CsvSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            input: CsvInput::Path(path.into()),
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            input: CsvInput::Text(text.into()),
        }
    }
}

#[async_trait]
impl DatasetSource for CsvSource {
    async fn load(&self) -> Result<Dataset, DatasetError> {
        let dataset = match &self.input {
            CsvInput::Path(path) => {
                let bytes = tokio::fs::read(path).await?;
                parse_csv(bytes.as_slice())?
            }
            CsvInput::Text(text) => parse_csv(text.as_bytes())?,
        };

        info!(
            source = %self.describe(),
            rows = dataset.len(),
            columns = dataset.columns().len(),
            "CSV dataset loaded"
        );
        Ok(dataset)
    }

    fn describe(&self) -> String {
        match &self.input {
            CsvInput::Path(path) => format!("csv:{}", path.display()),
            CsvInput::Text(text) => format!("csv:<{} bytes>", text.len()),
        }
    }
}
