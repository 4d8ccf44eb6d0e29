//! Configuration for pipeline backends

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{PipelineError, Result};
use crate::model::Stage;
use crate::stream::SessionId;

pub const HTTP_URL_ENV: &str = "FUND_PIPELINE_HTTP_URL";
pub const WS_URL_ENV: &str = "FUND_PIPELINE_WS_URL";

/// Backend endpoints and timeouts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Base for plain HTTP calls (mandate upload)
    pub http_base_url: String,

    /// Base for every streaming session
    pub ws_base_url: String,

    /// WebSocket connect timeout
    pub connect_timeout: Duration,

    /// Upload request timeout
    pub request_timeout: Duration,

    /// Fail a session after this long without a frame. Unset waits forever.
    pub idle_timeout: Option<Duration>,

    pub upload_path: String,
    pub mandate_parse_path: String,
    pub sourcing_path: String,
    pub screening_path: String,
    pub risk_path: String,

    /// Query sent with a mandate when the caller gives none
    pub default_query: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            http_base_url: "http://localhost:8000".to_string(),
            ws_base_url: "ws://localhost:8000".to_string(),
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
            idle_timeout: None,
            upload_path: "/api/parse-mandate-upload".to_string(),
            mandate_parse_path: "/api/ws/parse-mandate/option2".to_string(),
            sourcing_path: "/api/ws/filter-companies".to_string(),
            screening_path: "/api/ws/screen".to_string(),
            risk_path: "/risk/analyze".to_string(),
            default_query: "Generate mandate criteria".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Defaults with base URLs overridden from the environment
    pub fn from_env() -> Result<Self> {
        Self::builder().with_env().build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        check_scheme(&self.http_base_url, &["http", "https"])?;
        check_scheme(&self.ws_base_url, &["ws", "wss"])?;

        if self.connect_timeout.is_zero() {
            return Err(PipelineError::Config(
                "connect_timeout must be greater than 0".to_string(),
            ));
        }
        if self.idle_timeout.is_some_and(|t| t.is_zero()) {
            return Err(PipelineError::Config(
                "idle_timeout must be greater than 0 when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn upload_url(&self) -> String {
        join(&self.http_base_url, &self.upload_path)
    }

    pub fn mandate_parse_url(&self, id: SessionId) -> String {
        format!("{}/{id}", join(&self.ws_base_url, &self.mandate_parse_path))
    }

    /// Streaming endpoint for a stage. Only sourcing puts the session id in
    /// the path.
    pub fn stage_url(&self, stage: Stage, id: SessionId) -> String {
        match stage {
            Stage::Sourcing => format!("{}/{id}", join(&self.ws_base_url, &self.sourcing_path)),
            Stage::Screening => join(&self.ws_base_url, &self.screening_path),
            Stage::RiskAnalysis => join(&self.ws_base_url, &self.risk_path),
        }
    }
}

fn join(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn check_scheme(raw: &str, allowed: &[&str]) -> Result<()> {
    let url = Url::parse(raw)
        .map_err(|e| PipelineError::Config(format!("invalid URL '{raw}': {e}")))?;
    if allowed.contains(&url.scheme()) {
        Ok(())
    } else {
        Err(PipelineError::Config(format!(
            "URL '{raw}' must use one of {allowed:?}"
        )))
    }
}

/// Builder for PipelineConfig
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    http_base_url: Option<String>,
    ws_base_url: Option<String>,
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
    default_query: Option<String>,
}

impl PipelineConfigBuilder {
    /// Set the HTTP base URL
    pub fn http_base_url(mut self, url: impl Into<String>) -> Self {
        self.http_base_url = Some(url.into());
        self
    }

    /// Set the WebSocket base URL
    pub fn ws_base_url(mut self, url: impl Into<String>) -> Self {
        self.ws_base_url = Some(url.into());
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = Some(duration);
        self
    }

    /// Set the upload request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set the session idle timeout
    pub fn idle_timeout(mut self, duration: Duration) -> Self {
        self.idle_timeout = Some(duration);
        self
    }

    pub fn default_query(mut self, query: impl Into<String>) -> Self {
        self.default_query = Some(query.into());
        self
    }

    /// Load base URLs from environment
    pub fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var(HTTP_URL_ENV) {
            self.http_base_url = Some(url);
        }
        if let Ok(url) = std::env::var(WS_URL_ENV) {
            self.ws_base_url = Some(url);
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<PipelineConfig> {
        let defaults = PipelineConfig::default();

        let config = PipelineConfig {
            http_base_url: self.http_base_url.unwrap_or(defaults.http_base_url),
            ws_base_url: self.ws_base_url.unwrap_or(defaults.ws_base_url),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            idle_timeout: self.idle_timeout.or(defaults.idle_timeout),
            default_query: self.default_query.unwrap_or(defaults.default_query),
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }
}
