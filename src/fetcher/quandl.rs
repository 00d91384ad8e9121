//! Quandl time-series client
//!
//! Fetches one value column of a dataset over a lookback window ending at
//! the cycle time and reduces it to the oldest and newest observation.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use super::{FetchError, SeriesSource};
use crate::models::{Candidate, FetchOutcome};

/// Production API host
pub const DEFAULT_BASE_URL: &str = "https://www.quandl.com";

/// Date format used in query parameters and observation rows
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct DatasetResponse {
    dataset_data: DatasetData,
}

#[derive(Debug, Deserialize)]
struct DatasetData {
    #[serde(default)]
    data: Vec<Vec<serde_json::Value>>,
}

/// [`SeriesSource`] backed by the Quandl dataset API
pub struct QuandlSource {
    client: Client,
    base_url: Url,
    api_key: String,

    /// Value column index per source database
    columns: HashMap<String, u32>,

    /// How far before `as_of` the old observation is looked up
    lookback: ChronoDuration,
}

impl QuandlSource {
    /// Create a client against the production API with a 10s timeout
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(
        api_key: impl Into<String>,
        columns: HashMap<String, u32>,
    ) -> Result<Self, FetchError> {
        Self::with_config(
            DEFAULT_BASE_URL,
            api_key,
            columns,
            Duration::from_secs(10),
            365,
        )
    }

    /// Create a client with explicit endpoint, timeout and lookback
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidUrl` for an unparseable base URL and
    /// `FetchError::Http` if the HTTP client cannot be created
    pub fn with_config(
        base_url: &str,
        api_key: impl Into<String>,
        columns: HashMap<String, u32>,
        timeout: Duration,
        lookback_days: u32,
    ) -> Result<Self, FetchError> {
        let base_url =
            Url::parse(base_url).map_err(|e| FetchError::InvalidUrl(format!("{base_url}: {e}")))?;
        let client = Client::builder().timeout(timeout).gzip(true).build()?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            columns,
            lookback: ChronoDuration::days(i64::from(lookback_days)),
        })
    }

    /// Build the dataset request URL for a candidate
    pub fn request_url(
        &self,
        candidate: &Candidate,
        as_of: DateTime<Utc>,
    ) -> Result<Url, FetchError> {
        let column = self
            .columns
            .get(&candidate.source)
            .ok_or_else(|| FetchError::MissingColumn(candidate.source.clone()))?;

        let mut url = self
            .base_url
            .join(&format!(
                "/api/v3/datasets/{}/{}/data.json",
                candidate.source, candidate.key
            ))
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        let start = as_of - self.lookback;
        url.query_pairs_mut()
            .append_pair("api_key", &self.api_key)
            .append_pair("column_index", &column.to_string())
            .append_pair("start_date", &start.format(DATE_FORMAT).to_string())
            .append_pair("end_date", &as_of.format(DATE_FORMAT).to_string());

        Ok(url)
    }
}

#[async_trait]
impl SeriesSource for QuandlSource {
    async fn fetch(
        &self,
        candidate: &Candidate,
        as_of: DateTime<Utc>,
    ) -> Result<FetchOutcome, FetchError> {
        let url = self.request_url(candidate, as_of)?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body: DatasetResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        outcome_from_rows(&body.dataset_data.data)
    }

    fn name(&self) -> &'static str {
        "quandl"
    }
}

/// Reduce newest-first `[date, value]` rows to an outcome
pub fn outcome_from_rows(rows: &[Vec<serde_json::Value>]) -> Result<FetchOutcome, FetchError> {
    if rows.len() < 2 {
        return Err(FetchError::InsufficientData(rows.len()));
    }

    let (new_time, new_value) = parse_row(&rows[0])?;
    let (old_time, old_value) = parse_row(&rows[rows.len() - 1])?;

    Ok(FetchOutcome {
        old_value,
        new_value,
        old_time,
        new_time,
    })
}

fn parse_row(row: &[serde_json::Value]) -> Result<(DateTime<Utc>, f64), FetchError> {
    let [date, value] = row else {
        return Err(FetchError::InvalidObservation(format!(
            "expected 2 columns, got {}",
            row.len()
        )));
    };

    let date = date
        .as_str()
        .ok_or_else(|| FetchError::InvalidObservation("date is not a string".into()))?;
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|e| FetchError::InvalidObservation(format!("bad date '{date}': {e}")))?;

    let value = value
        .as_f64()
        .ok_or_else(|| FetchError::InvalidObservation("value is not a number".into()))?;

    Ok((date.and_time(NaiveTime::MIN).and_utc(), value))
}
