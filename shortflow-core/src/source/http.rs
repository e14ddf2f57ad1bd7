//! HTTP report source.
//!
//! Issues `GET {base_url}/{endpoint}?date=YYYYMMDD&response=html` with a blocking
//! client. Any status other than 200 is an error; retrying is the caller's call.

use super::{ReportSource, SourceError};
use chrono::NaiveDate;
use std::time::Duration;

/// Report source backed by a blocking reqwest client.
pub struct HttpReportSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpReportSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SourceError> {
        let base_url = base_url.into();
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SourceError::Network {
                url: base_url.clone(),
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, base_url })
    }

    /// Full URL for an endpoint, without the query string.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Query parameters sent with every request.
    pub fn query(date: NaiveDate) -> [(&'static str, String); 2] {
        [
            ("date", date.format("%Y%m%d").to_string()),
            ("response", "html".to_string()),
        ]
    }
}

impl ReportSource for HttpReportSource {
    fn name(&self) -> &str {
        "http"
    }

    fn fetch_report(&self, endpoint: &str, date: NaiveDate) -> Result<String, SourceError> {
        let url = self.endpoint_url(endpoint);
        let network_err = |e: reqwest::Error| SourceError::Network {
            url: url.clone(),
            message: e.to_string(),
        };

        let resp = self
            .client
            .get(&url)
            .query(&Self::query(date))
            .send()
            .map_err(network_err)?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(SourceError::Status {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        resp.text().map_err(network_err)
    }
}
