//! Published spreadsheet source.
//!
//! Google Sheets share links (`/spreadsheets/d/<id>/edit#gid=<n>`) are rewritten
//! to the sheet's CSV export; links that already point at CSV are fetched as-is.
//! Only spreadsheet-provider hosts are fetched, and the export body is capped
//! before it is parsed.

use crate::source::{parse_csv, DatasetSource};
use async_trait::async_trait;
use campaign_core::error::DatasetError;
use campaign_core::Dataset;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Hosts a sheet link may point at.
const ALLOWED_HOSTS: &[&str] = &["docs.google.com"];

/// Largest export body accepted.
const MAX_EXPORT_BYTES: usize = 10 * 1024 * 1024;

pub struct SpreadsheetSource {
    export_url: Url,
    client: reqwest::Client,
    timeout: Duration,
}

impl SpreadsheetSource {
    pub fn new(sheet_url: &str) -> Result<Self, DatasetError> {
        let export_url = export_url(sheet_url)?;
        debug!(sheet_url, export_url = %export_url, "Resolved spreadsheet export URL");
        Ok(Self {
            export_url,
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(30),
        })
    }

    pub fn export_url(&self) -> &Url {
        &self.export_url
    }
}

#[async_trait]
impl DatasetSource for SpreadsheetSource {
    async fn load(&self) -> Result<Dataset, DatasetError> {
        let mut resp = self
            .client
            .get(self.export_url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| DatasetError::Fetch(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DatasetError::Fetch(format!(
                "spreadsheet export returned {status}"
            )));
        }

        if let Some(len) = resp.content_length() {
            if len > MAX_EXPORT_BYTES as u64 {
                return Err(too_large());
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| DatasetError::Fetch(e.to_string()))?
        {
            append_capped(&mut body, &chunk, MAX_EXPORT_BYTES)?;
        }
        let dataset = parse_csv(body.as_slice())?;

        info!(
            source = %self.describe(),
            rows = dataset.len(),
            "Spreadsheet dataset loaded"
        );
        Ok(dataset)
    }

    fn describe(&self) -> String {
        format!("sheet:{}", self.export_url)
    }
}

fn append_capped(body: &mut Vec<u8>, chunk: &[u8], limit: usize) -> Result<(), DatasetError> {
    if body.len().saturating_add(chunk.len()) > limit {
        return Err(too_large());
    }
    body.extend_from_slice(chunk);
    Ok(())
}

fn too_large() -> DatasetError {
    DatasetError::Fetch(format!(
        "spreadsheet export is larger than {MAX_EXPORT_BYTES} bytes"
    ))
}

/// Map a share link to its CSV export URL.
fn export_url(sheet_url: &str) -> Result<Url, DatasetError> {
    let url = Url::parse(sheet_url)
        .map_err(|e| DatasetError::InvalidSource(format!("{sheet_url}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(DatasetError::InvalidSource(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }

    let host = url.host_str().unwrap_or_default();
    if !ALLOWED_HOSTS.contains(&host) {
        return Err(DatasetError::InvalidSource(format!(
            "'{host}' is not a spreadsheet host"
        )));
    }

    let already_csv = url.path().ends_with(".csv")
        || url
            .query_pairs()
            .any(|(k, v)| (k == "format" || k == "output") && v == "csv");
    if already_csv {
        return Ok(url);
    }

    let segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
    let sheet_id = segments
        .windows(3)
        .find(|w| w[0] == "spreadsheets" && w[1] == "d")
        .map(|w| w[2])
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            DatasetError::InvalidSource(format!("not a spreadsheet link: {sheet_url}"))
        })?;

    // The tab can be named in the fragment (`#gid=`) or the query (`?gid=`).
    let gid = url
        .fragment()
        .and_then(|f| f.strip_prefix("gid="))
        .map(str::to_string)
        .or_else(|| {
            url.query_pairs()
                .find(|(k, _)| k == "gid")
                .map(|(_, v)| v.into_owned())
        });

    let mut export = url.clone();
    export.set_fragment(None);
    export.set_path(&format!("/spreadsheets/d/{sheet_id}/export"));
    {
        let mut query = export.query_pairs_mut();
        query.clear().append_pair("format", "csv");
        if let Some(gid) = &gid {
            query.append_pair("gid", gid);
        }
    }
    Ok(export)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_link_becomes_export() {
        let url = export_url("https://docs.google.com/spreadsheets/d/abc123/edit#gid=0").unwrap();
        assert_eq!(
            url.as_str(),
            "https://docs.google.com/spreadsheets/d/abc123/export?format=csv&gid=0"
        );
    }

    #[test]
    fn test_share_link_without_gid() {
        let url = export_url("https://docs.google.com/spreadsheets/d/abc123/edit?usp=sharing")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://docs.google.com/spreadsheets/d/abc123/export?format=csv"
        );
    }

    #[test]
    fn test_csv_links_are_kept() {
        let link = "https://docs.google.com/spreadsheets/d/e/xyz/pub?output=csv";
        assert_eq!(export_url(link).unwrap().as_str(), link);
    }

    #[test]
    fn test_rejects_csv_on_other_hosts() {
        for url in [
            "https://example.com/audience.csv",
            "http://169.254.169.254/latest/meta-data?output=csv",
            "https://docs.google.com.evil.test/spreadsheets/d/abc/edit",
        ] {
            assert!(
                matches!(export_url(url), Err(DatasetError::InvalidSource(_))),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn test_export_body_is_capped() {
        let mut body = Vec::new();
        append_capped(&mut body, b"Email\n", 10).unwrap();
        append_capped(&mut body, b"a@x\n", 10).unwrap();
        assert_eq!(body, b"Email\na@x\n");

        assert!(matches!(
            append_capped(&mut body, b"b", 10),
            Err(DatasetError::Fetch(_))
        ));
        assert_eq!(body.len(), 10);
    }

    #[test]
    fn test_rejects_non_sheet_links() {
        assert!(matches!(
            export_url("https://example.com/page"),
            Err(DatasetError::InvalidSource(_))
        ));
        assert!(matches!(
            export_url("ftp://docs.google.com/spreadsheets/d/abc/edit"),
            Err(DatasetError::InvalidSource(_))
        ));
        assert!(matches!(
            export_url("not a url"),
            Err(DatasetError::InvalidSource(_))
        ));
    }
}
