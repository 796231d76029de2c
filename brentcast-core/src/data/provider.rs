//! Page sources for the extractor.
//!
//! The `SeriesSource` trait abstracts over where the HTML page comes from
//! (the live portal, a saved copy on disk) so extraction can be exercised
//! offline and mocked in tests.

use crate::error::ExtractionError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Default source page: IPEA daily Brent FOB price series.
pub const IPEA_BRENT_URL: &str =
    "http://www.ipeadata.gov.br/ExibeSerie.aspx?module=m&serid=1650971490&oper=view";

/// Longest pause between retries.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Pause before retry `attempt` (1-based): doubles from `base`, capped at [`MAX_BACKOFF`].
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Trait for anything that can hand back the source page as text.
pub trait SeriesSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Where the page is read from (URL or path), for logs and the run manifest.
    fn location(&self) -> String;

    /// Fetch the full page body.
    fn fetch_page(&self) -> Result<String, ExtractionError>;
}

/// Live HTTP source with bounded retry.
pub struct HttpSource {
    client: reqwest::blocking::Client,
    url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl HttpSource {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, ExtractionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| ExtractionError::Unreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            max_retries,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Execute the GET with exponential backoff on transient failures.
    ///
    /// Connect errors, timeouts and 5xx responses are retried; any other
    /// non-success status fails immediately.
    fn fetch_with_retry(&self) -> Result<String, ExtractionError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.base_delay, attempt);
                debug!(attempt, ?delay, "retrying source fetch");
                std::thread::sleep(delay);
            }

            match self.client.get(&self.url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_server_error() {
                        warn!(%status, url = %self.url, "source returned server error");
                        last_error = Some(ExtractionError::HttpStatus {
                            status: status.as_u16(),
                            url: self.url.clone(),
                        });
                        continue;
                    }

                    if !status.is_success() {
                        return Err(ExtractionError::HttpStatus {
                            status: status.as_u16(),
                            url: self.url.clone(),
                        });
                    }

                    return resp.text().map_err(|e| {
                        ExtractionError::Unreachable(format!("failed to read body: {e}"))
                    });
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        warn!(error = %e, "source fetch failed");
                        last_error = Some(ExtractionError::Unreachable(e.to_string()));
                        continue;
                    }
                    return Err(ExtractionError::Unreachable(e.to_string()));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ExtractionError::Unreachable("max retries exceeded".into())))
    }
}

impl SeriesSource for HttpSource {
    fn name(&self) -> &str {
        "http"
    }

    fn location(&self) -> String {
        self.url.clone()
    }

    fn fetch_page(&self) -> Result<String, ExtractionError> {
        self.fetch_with_retry()
    }
}

/// A saved copy of the page on disk.
pub struct HtmlFileSource {
    path: PathBuf,
}

impl HtmlFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SeriesSource for HtmlFileSource {
    fn name(&self) -> &str {
        "html_file"
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch_page(&self) -> Result<String, ExtractionError> {
        let bytes = std::fs::read(&self.path)?;
        // Saved pages may be Latin-1; keep every byte rather than failing on decode.
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
        })
    }
}
