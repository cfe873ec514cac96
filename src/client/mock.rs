//! In-memory transport for testing purposes.

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

use super::classify::ApiError;
use super::error::Result;
use super::transport::{RawResponse, Transport};
use crate::models::ResponseFormat;

/// One request seen by a [`MockTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub url: String,
    pub query: String,
    pub start: u64,
    pub size: u64,
}

/// A transport that serves a synthetic, paginated result set.
///
/// Record `i` (1-based) has DOI `10.1000/{i}`. The total reported in every
/// page can be overridden to simulate inconsistent upstream data.
#[derive(Debug)]
pub struct MockTransport {
    format: ResponseFormat,
    records: u64,
    reported_total: Option<String>,
    failure: Option<u16>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    /// Serve `records` JSON records
    pub fn json(records: u64) -> Self {
        Self::new(ResponseFormat::Json, records)
    }

    /// Serve `records` JATS articles
    pub fn xml(records: u64) -> Self {
        Self::new(ResponseFormat::Xml, records)
    }

    /// Answer every request with `status`
    pub fn failing(status: u16) -> Self {
        Self {
            failure: Some(status),
            ..Self::new(ResponseFormat::Json, 0)
        }
    }

    fn new(format: ResponseFormat, records: u64) -> Self {
        Self {
            format,
            records,
            reported_total: None,
            failure: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Report `total` instead of the real record count
    pub fn with_reported_total(mut self, total: impl Into<String>) -> Self {
        self.reported_total = Some(total.into());
        self
    }

    /// Number of requests received
    pub fn calls(&self) -> usize {
        self.lock().len()
    }

    /// Requests received, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().clone()
    }

    /// Forget recorded requests
    pub fn reset(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedRequest>> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn page(&self, start: u64, size: u64) -> String {
        let first = start.max(1);
        let last = (first + size).saturating_sub(1).min(self.records);
        let total = self
            .reported_total
            .clone()
            .unwrap_or_else(|| self.records.to_string());

        match self.format {
            ResponseFormat::Json => {
                let records: Vec<serde_json::Value> = (first..=last)
                    .map(|i| {
                        serde_json::json!({
                            "identifier": format!("doi:10.1000/{}", i),
                            "doi": format!("10.1000/{}", i),
                            "title": format!("Record {}", i),
                        })
                    })
                    .collect();
                serde_json::json!({
                    "result": [{
                        "total": total,
                        "start": start.to_string(),
                        "pageLength": size.to_string(),
                        "recordsDisplayed": records.len().to_string(),
                    }],
                    "records": records,
                })
                .to_string()
            }
            ResponseFormat::Xml => {
                let records: String = (first..=last)
                    .map(|i| {
                        format!(
                            "<article><front><journal-meta><journal-title-group><journal-title>Journal</journal-title></journal-title-group></journal-meta>\
                             <article-meta><article-id pub-id-type=\"doi\">10.1000/{i}</article-id>\
                             <title-group><article-title>Record {i}</article-title></title-group></article-meta></front></article>"
                        )
                    })
                    .collect();
                format!(
                    "<response><result><total>{}</total><start>{}</start></result><records>{}</records></response>",
                    total, start, records
                )
            }
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, url: &str, params: &[(String, String)]) -> Result<RawResponse> {
        let param = |name: &str| {
            params
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
                .unwrap_or_default()
        };
        let start: u64 = param("s").parse().unwrap_or(1);
        let size: u64 = param("p").parse().unwrap_or(0);

        self.lock().push(RecordedRequest {
            url: url.to_string(),
            query: param("q"),
            start,
            size,
        });

        if let Some(status) = self.failure {
            return Err(ApiError::from_status(status).into());
        }
        Ok(RawResponse::ok(self.page(start, size)))
    }
}
