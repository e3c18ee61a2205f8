//! Client configuration with sensible defaults.
//!
//! All operational parameters of the client are centralized here.
//! Every value has a documented default.

use serde::{Deserialize, Serialize};

use crate::{ChainbookError, Result};

/// Default directory service endpoint.
pub const DEFAULT_DIRECTORY_URL: &str = "http://127.0.0.1:8080";

/// Client configuration.
///
/// Loaded from CLI flags or a JSON file by the front end and handed to
/// the transport layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the directory service (challenge, verification,
    /// contact storage).
    pub directory_url: String,

    /// Per-request timeout for directory calls, in seconds.
    pub request_timeout_secs: u64,

    /// Connection-establishment timeout for directory calls, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            directory_url: DEFAULT_DIRECTORY_URL.to_string(),
            request_timeout_secs: 10,
            connect_timeout_secs: 5,
        }
    }
}

impl ClientConfig {
    /// Validates all configuration values.
    ///
    /// Returns an error if any value is outside its acceptable range.
    pub fn validate(&self) -> Result<()> {
        if self.directory_url.is_empty() {
            return Err(ChainbookError::ConfigError {
                reason: "directory_url must not be empty".into(),
            });
        }

        if !self.directory_url.starts_with("http://") && !self.directory_url.starts_with("https://")
        {
            return Err(ChainbookError::ConfigError {
                reason: format!("directory_url must be http(s), got '{}'", self.directory_url),
            });
        }

        if self.request_timeout_secs == 0 {
            return Err(ChainbookError::ConfigError {
                reason: "request_timeout_secs must be greater than 0".into(),
            });
        }

        if self.connect_timeout_secs == 0 {
            return Err(ChainbookError::ConfigError {
                reason: "connect_timeout_secs must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_url_rejected() {
        let config = ClientConfig {
            directory_url: String::new(),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_http_url_rejected() {
        let config = ClientConfig {
            directory_url: "ftp://example.com".into(),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = ClientConfig {
            request_timeout_secs: 0,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
