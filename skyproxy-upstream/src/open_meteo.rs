//! Open-Meteo client implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use skyproxy_core::constants::{
    DEFAULT_UPSTREAM_TIMEOUT_SECS, DEFAULT_UPSTREAM_URL, MAX_CONFIG_DURATION_SECS,
    UPSTREAM_ERROR_BODY_LIMIT,
};
use skyproxy_core::error::{FetchError, ProxyError, Result};
use skyproxy_core::traits::WeatherFetcher;
use skyproxy_core::types::WeatherPayload;

/// Upstream client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Full forecast URL, query string included
    pub url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_UPSTREAM_URL.into(),
            timeout_seconds: DEFAULT_UPSTREAM_TIMEOUT_SECS,
        }
    }
}

impl UpstreamConfig {
    /// Creates a config for `url` with the default timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Checks that the URL is absolute http(s) and the timeout non-zero.
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| ProxyError::ConfigError(format!("invalid upstream URL '{}': {}", self.url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProxyError::ConfigError(format!(
                "upstream URL must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(ProxyError::ConfigError(
                "upstream timeout must be at least 1 second".into(),
            ));
        }
        if self.timeout_seconds > MAX_CONFIG_DURATION_SECS {
            return Err(ProxyError::ConfigError(format!(
                "upstream timeout ({}s) exceeds the {}s maximum",
                self.timeout_seconds, MAX_CONFIG_DURATION_SECS
            )));
        }
        Ok(())
    }
}

/// Fetches the forecast from Open-Meteo.
///
/// One request per [`fetch`](WeatherFetcher::fetch); no retries.
#[derive(Clone, Debug)]
pub struct OpenMeteoClient {
    config: UpstreamConfig,
    http_client: reqwest::Client,
}

impl OpenMeteoClient {
    /// Creates a client with the default Berlin forecast URL.
    pub fn new() -> Result<Self> {
        Self::with_config(UpstreamConfig::default())
    }

    /// Creates a client with custom configuration.
    pub fn with_config(config: UpstreamConfig) -> Result<Self> {
        config.validate()?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("skyproxy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProxyError::ConfigError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                seconds: self.config.timeout_seconds,
            }
        } else {
            FetchError::Transport(err.to_string())
        }
    }

    async fn request(&self) -> std::result::Result<WeatherPayload, FetchError> {
        let response = self
            .http_client
            .get(&self.config.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FetchError::UpstreamStatus {
                status: status.as_u16(),
                message: truncate(&text, UPSTREAM_ERROR_BODY_LIMIT),
            });
        }

        info!(status_code = status.as_u16(), "Upstream request successful");

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        WeatherPayload::from_slice(&body)
    }
}

#[async_trait]
impl WeatherFetcher for OpenMeteoClient {
    #[instrument(skip(self))]
    async fn fetch(&self) -> std::result::Result<WeatherPayload, FetchError> {
        let result = self.request().await;
        if let Err(err) = &result {
            error!(error = %err, kind = err.kind(), "Failed to fetch weather data from upstream");
        }
        result
    }

    fn describe(&self) -> String {
        self.config.url.clone()
    }
}

fn truncate(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= limit {
        trimmed.to_string()
    } else {
        let mut cut: String = trimmed.chars().take(limit).collect();
        cut.push('…');
        cut
    }
}
