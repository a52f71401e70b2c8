//! Configuration for talking to the extraction backend.
//!
//! Every knob lives in [`ClientConfig`], built via [`ClientConfigBuilder`].
//! The base URL is resolved once (by the CLI, from `--base-url` or
//! `BATCHSHEET_API_BASE_URL`) and handed to the transport explicitly; nothing
//! in the library reads the environment at request time.

use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Configuration for a [`crate::session::Session`] and its transport.
///
/// # Example
/// ```rust
/// use batchsheet_client::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("https://extract.example.com/api/")
///     .output_dir("out")
///     .cleanup_after_download(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.base_url, "https://extract.example.com/api");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL without a trailing slash. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Directory the generated spreadsheet is saved into. Default: `.`.
    pub output_dir: PathBuf,

    /// Fetch and save the generated spreadsheet after a successful
    /// extraction. Default: true.
    pub download_spreadsheet: bool,

    /// Ask the backend to delete its temporary files once the spreadsheet
    /// has been saved. Best-effort; failures are only logged. Default: true.
    pub cleanup_after_download: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            output_dir: PathBuf::from("."),
            download_spreadsheet: true,
            cleanup_after_download: true,
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn download_spreadsheet(mut self, v: bool) -> Self {
        self.config.download_spreadsheet = v;
        self
    }

    pub fn cleanup_after_download(mut self, v: bool) -> Self {
        self.config.cleanup_after_download = v;
        self
    }

    /// Build the configuration, validating the base URL.
    pub fn build(mut self) -> Result<ClientConfig, ClientError> {
        let trimmed = self.config.base_url.trim().trim_end_matches('/').to_string();
        if trimmed.is_empty() {
            return Err(ClientError::InvalidConfig("base URL must not be empty".into()));
        }

        let parsed = reqwest::Url::parse(&trimmed).map_err(|e| {
            ClientError::InvalidConfig(format!("base URL '{trimmed}' is not a valid URL: {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::InvalidConfig(format!(
                "base URL must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        self.config.base_url = trimmed;
        Ok(self.config)
    }
}
