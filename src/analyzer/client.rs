//! JSON-over-HTTP client for the analyzer daemon.
//!
//! One long-lived [`reqwest::Client`] shared by every worker. Before any job
//! dispatches, [`AnalyzerClient::wait_until_ready`] gates the batch on a TCP
//! readiness probe with exponential back-off; starting work before readiness
//! is a programming error.

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::analyzer::protocol::{AnalyzeReport, AnalyzeRequest, AnalyzerErrorBody};
use crate::core::config::AnalyzerConfig;
use crate::core::errors::{MinerError, Result};

/// Initial readiness-probe back-off.
const PROBE_INITIAL_BACKOFF: Duration = Duration::from_millis(100);

/// Readiness-probe back-off ceiling.
const PROBE_MAX_BACKOFF: Duration = Duration::from_secs(2);

/// Per-probe TCP connect timeout.
const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Back-off schedule for transport-level retries of an analyze request.
const TRANSPORT_RETRY_BACKOFF: [Duration; 2] =
    [Duration::from_millis(500), Duration::from_secs(2)];

/// Client for the analyzer daemon's single `/analyze` endpoint.
pub struct AnalyzerClient {
    http: reqwest::Client,
    config: AnalyzerConfig,
    analyze_url: String,
    probe_addr: String,
}

impl AnalyzerClient {
    /// Build a client for the configured endpoint.
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        let url = reqwest::Url::parse(&config.base_url).map_err(|e| {
            MinerError::config_field(
                format!("invalid analyzer URL '{}': {e}", config.base_url),
                "analyzer.base_url",
            )
        })?;

        let host = url.host_str().ok_or_else(|| {
            MinerError::config_field(
                format!("analyzer URL '{}' has no host", config.base_url),
                "analyzer.base_url",
            )
        })?;
        let port = url.port_or_known_default().unwrap_or(80);
        let probe_addr = format!("{host}:{port}");
        let analyze_url = format!("{}/analyze", config.base_url.trim_end_matches('/'));

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| MinerError::analyzer_protocol(format!("HTTP client setup: {e}"), None))?;

        Ok(Self {
            http,
            config,
            analyze_url,
            probe_addr,
        })
    }

    /// Poll the daemon with TCP connects until it accepts a connection or
    /// the readiness deadline is exhausted.
    pub async fn wait_until_ready(&self) -> Result<()> {
        let deadline = self.config.readiness_timeout();
        let started = Instant::now();
        let mut backoff = PROBE_INITIAL_BACKOFF;

        loop {
            match tokio::time::timeout(PROBE_CONNECT_TIMEOUT, TcpStream::connect(&self.probe_addr))
                .await
            {
                Ok(Ok(_)) => {
                    debug!(
                        "Analyzer ready at {} after {} ms",
                        self.probe_addr,
                        started.elapsed().as_millis()
                    );
                    return Ok(());
                }
                Ok(Err(e)) => debug!("Analyzer probe failed: {e}"),
                Err(_) => debug!("Analyzer probe timed out"),
            }

            if started.elapsed() + backoff > deadline {
                return Err(MinerError::AnalyzerUnreachable {
                    endpoint: self.config.base_url.clone(),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }

            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(PROBE_MAX_BACKOFF);
        }
    }

    /// Submit one analyze request and parse the daemon's report.
    ///
    /// Transport errors (refused, reset, timed out) are retried twice with
    /// 500 ms / 2 s back-off. An HTTP 500 from the daemon is never retried;
    /// the caller attributes it to the commit being analyzed.
    pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeReport> {
        let mut attempt = 0;
        loop {
            match self.http.post(&self.analyze_url).json(request).send().await {
                Ok(response) => return self.parse_response(response).await,
                Err(e) => {
                    if attempt >= TRANSPORT_RETRY_BACKOFF.len() {
                        return Err(MinerError::analyzer_protocol(
                            format!("transport error after {} retries: {e}", attempt),
                            None,
                        ));
                    }
                    let backoff = TRANSPORT_RETRY_BACKOFF[attempt];
                    warn!(
                        "Analyzer transport error ({e}); retrying in {} ms",
                        backoff.as_millis()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn parse_response(&self, response: reqwest::Response) -> Result<AnalyzeReport> {
        match response.status() {
            StatusCode::OK => {
                let body = response.bytes().await.map_err(|e| {
                    MinerError::analyzer_protocol(format!("reading report body: {e}"), Some(200))
                })?;
                serde_json::from_slice(&body).map_err(|e| {
                    MinerError::analyzer_protocol(format!("malformed report JSON: {e}"), Some(200))
                })
            }
            StatusCode::INTERNAL_SERVER_ERROR => {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnalyzerErrorBody>(&body)
                    .map(|b| b.error)
                    .unwrap_or(body);
                Err(MinerError::analyzer_internal(excerpt(&message, 400)))
            }
            status => Err(MinerError::analyzer_protocol(
                format!("unexpected status {status}"),
                Some(status.as_u16()),
            )),
        }
    }
}

/// Truncate a response excerpt for logs and error records.
fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_url_is_derived_from_base() {
        let config = AnalyzerConfig {
            base_url: "http://127.0.0.1:8000/".into(),
            ..AnalyzerConfig::default()
        };
        let client = AnalyzerClient::new(config).unwrap();
        assert_eq!(client.analyze_url, "http://127.0.0.1:8000/analyze");
        assert_eq!(client.probe_addr, "127.0.0.1:8000");
    }

    #[test]
    fn rejects_urls_without_host() {
        let config = AnalyzerConfig {
            base_url: "http://".into(),
            ..AnalyzerConfig::default()
        };
        assert!(AnalyzerClient::new(config).is_err());
    }

    #[test]
    fn excerpt_truncates_long_bodies() {
        let long = "x".repeat(500);
        assert_eq!(excerpt(&long, 400).chars().count(), 401);
        assert_eq!(excerpt("short", 400), "short");
    }

    #[tokio::test]
    async fn readiness_gives_up_after_deadline() {
        // Port 9 (discard) is almost never listening locally.
        let config = AnalyzerConfig {
            base_url: "http://127.0.0.1:9".into(),
            readiness_timeout_ms: 300,
            ..AnalyzerConfig::default()
        };
        let client = AnalyzerClient::new(config).unwrap();
        let err = client.wait_until_ready().await.unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
