//! Warehouse sink: load the raw snapshot into a BigQuery table.
//!
//! Uses the load-job upload API: one `multipart/related` POST carrying the
//! job configuration (JSON) and the Parquet bytes, then polls the job until
//! it reports `DONE`. The destination table is truncated and replaced.

use crate::config::WarehouseConfig;
use brentcast_core::error::SinkError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const API_BASE: &str = "https://bigquery.googleapis.com";
const BOUNDARY: &str = "brentcast_load_boundary";

/// Anything that can take the raw snapshot (Parquet bytes) and land it in a table.
pub trait WarehouseSink: Send + Sync {
    fn destination(&self) -> String;

    fn load_parquet(&self, parquet: &[u8]) -> Result<LoadOutcome, SinkError>;
}

/// Completed load job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadOutcome {
    pub job_id: String,
    pub destination: String,
    pub output_rows: Option<u64>,
}

// ── Job resource (subset) ───────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct JobConfig {
    configuration: JobConfiguration,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct JobConfiguration {
    load: LoadConfiguration,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct LoadConfiguration {
    destination_table: TableReference,
    source_format: String,
    write_disposition: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct TableReference {
    project_id: String,
    dataset_id: String,
    table_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    job_reference: JobReference,
    #[serde(default)]
    status: JobStatus,
    #[serde(default)]
    statistics: Option<JobStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    #[serde(default)]
    state: String,
    #[serde(default)]
    error_result: Option<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct JobStatistics {
    #[serde(default)]
    load: Option<LoadStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadStatistics {
    #[serde(default)]
    output_rows: Option<String>,
}

impl Job {
    /// `Ok(true)` when finished, `Ok(false)` while running, `Err` on a job error.
    fn check(&self) -> Result<bool, SinkError> {
        if let Some(err) = &self.status.error_result {
            return Err(SinkError::Warehouse(format!(
                "job {} failed: {} ({})",
                self.job_reference.job_id, err.message, err.reason
            )));
        }
        Ok(self.status.state == "DONE")
    }

    fn output_rows(&self) -> Option<u64> {
        self.statistics
            .as_ref()?
            .load
            .as_ref()?
            .output_rows
            .as_deref()?
            .parse()
            .ok()
    }
}

// ── BigQuery sink ───────────────────────────────────────────────────

pub struct BigQuerySink {
    client: reqwest::blocking::Client,
    config: WarehouseConfig,
    token: String,
    api_base: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl BigQuerySink {
    /// Build a sink, reading the access token from `config.token_env`.
    pub fn from_config(config: &WarehouseConfig) -> Result<Self, SinkError> {
        let token = std::env::var(&config.token_env).map_err(|_| {
            SinkError::Warehouse(format!(
                "access token variable '{}' is not set",
                config.token_env
            ))
        })?;
        Self::new(config.clone(), token)
    }

    pub fn new(config: WarehouseConfig, token: String) -> Result<Self, SinkError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| SinkError::Warehouse(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            token,
            api_base: API_BASE.into(),
            poll_interval: Duration::from_secs(2),
            max_polls: 150,
        })
    }

    /// Point at a different API root (emulators, tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn job_config(&self) -> JobConfig {
        JobConfig {
            configuration: JobConfiguration {
                load: LoadConfiguration {
                    destination_table: TableReference {
                        project_id: self.config.project.clone(),
                        dataset_id: self.config.dataset.clone(),
                        table_id: self.config.table.clone(),
                    },
                    source_format: "PARQUET".into(),
                    write_disposition: "WRITE_TRUNCATE".into(),
                },
            },
        }
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/upload/bigquery/v2/projects/{}/jobs?uploadType=multipart",
            self.api_base, self.config.project
        )
    }

    fn job_url(&self, reference: &JobReference) -> String {
        let mut url = format!(
            "{}/bigquery/v2/projects/{}/jobs/{}",
            self.api_base, self.config.project, reference.job_id
        );
        if let Some(location) = &reference.location {
            url.push_str("?location=");
            url.push_str(location);
        }
        url
    }

    fn parse_job(response: reqwest::blocking::Response) -> Result<Job, SinkError> {
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| SinkError::Warehouse(format!("reading response: {e}")))?;
        if !status.is_success() {
            return Err(SinkError::Warehouse(format!("HTTP {status}: {body}")));
        }
        serde_json::from_str(&body)
            .map_err(|e| SinkError::Warehouse(format!("unexpected job response: {e}")))
    }
}

impl WarehouseSink for BigQuerySink {
    fn destination(&self) -> String {
        format!(
            "{}.{}.{}",
            self.config.project, self.config.dataset, self.config.table
        )
    }

    fn load_parquet(&self, parquet: &[u8]) -> Result<LoadOutcome, SinkError> {
        let job_json = serde_json::to_string(&self.job_config())
            .map_err(|e| SinkError::Warehouse(format!("job config: {e}")))?;
        let body = multipart_body(&job_json, parquet);

        info!(destination = %self.destination(), bytes = parquet.len(), "submitting warehouse load job");
        let response = self
            .client
            .post(self.upload_url())
            .bearer_auth(&self.token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={BOUNDARY}"),
            )
            .body(body)
            .send()
            .map_err(|e| SinkError::Warehouse(format!("upload request: {e}")))?;
        let mut job = Self::parse_job(response)?;

        let mut polls = 0;
        while !job.check()? {
            if polls >= self.max_polls {
                return Err(SinkError::Warehouse(format!(
                    "job {} still {} after {polls} polls",
                    job.job_reference.job_id, job.status.state
                )));
            }
            polls += 1;
            std::thread::sleep(self.poll_interval);
            debug!(job = %job.job_reference.job_id, state = %job.status.state, "polling load job");
            let response = self
                .client
                .get(self.job_url(&job.job_reference))
                .bearer_auth(&self.token)
                .send()
                .map_err(|e| SinkError::Warehouse(format!("job poll: {e}")))?;
            job = Self::parse_job(response)?;
        }

        let outcome = LoadOutcome {
            job_id: job.job_reference.job_id.clone(),
            destination: self.destination(),
            output_rows: job.output_rows(),
        };
        info!(job = %outcome.job_id, rows = ?outcome.output_rows, "warehouse load complete");
        Ok(outcome)
    }
}

/// `multipart/related` body: JSON metadata part, then the media part.
pub fn multipart_body(metadata_json: &str, media: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(media.len() + metadata_json.len() + 256);
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata_json.as_bytes());
    body.extend_from_slice(format!("\r\n--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}
