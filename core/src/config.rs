//! Connection settings for `EngineClient`.
//!
//! # Design
//! There is no process-wide default connection. Callers construct a
//! `ClientConfig` and hand it to the client; `from_env` is the one
//! convenience that consults the environment.

use std::time::Duration;

use url::Url;

use crate::error::{ApiError, Result};

/// API version prefixed to every request path.
pub const API_VERSION: &str = "1.16";
pub const DEFAULT_URL: &str = "unix:///var/run/docker.sock";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub url: Url,
    pub api_version: String,
    pub user_agent: String,
    /// Passed to the transport; `None` waits indefinitely.
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| ApiError::Argument(format!("invalid engine url '{url}': {e}")))?;
        Ok(Self {
            url,
            api_version: API_VERSION.to_string(),
            user_agent: default_user_agent(),
            read_timeout: None,
            write_timeout: None,
        })
    }

    /// `DOCKER_URL`, then `DOCKER_HOST`, then the local Unix socket.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("DOCKER_URL")
            .or_else(|_| std::env::var("DOCKER_HOST"))
            .unwrap_or_else(|_| DEFAULT_URL.to_string());
        Self::new(&url)
    }

    pub fn api_version(mut self, version: &str) -> Self {
        self.api_version = version.to_string();
        self
    }

    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Engine URL without a trailing slash, as stamped on each request.
    pub fn host(&self) -> String {
        self.url.as_str().trim_end_matches('/').to_string()
    }
}

fn default_user_agent() -> String {
    format!("engine-client/{}", env!("CARGO_PKG_VERSION"))
}
