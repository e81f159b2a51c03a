use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "linkedcare.toml";
/// Prefix of environment overrides, e.g. `LINKEDCARE__SERVER__URL`.
pub const ENV_PREFIX: &str = "LINKEDCARE";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub certificate: CertificateSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSettings {
    /// Base address of the Linked Care server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Where the client certificate comes from when none is passed explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CertificateSettings {
    /// A single PEM file holding certificate and private key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// A directory of PEM files to choose from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    /// Preferred file name (or stem) inside `directory`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Force (`true`) or suppress (`false`) the interactive picker; unset means
    /// "attended when stdin is a terminal".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attended: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.request_timeout_secs == 0 {
            return Err("server.request_timeout_secs must be > 0".into());
        }
        if let Some(raw) = &self.server.url {
            let parsed =
                url::Url::parse(raw).map_err(|e| format!("server.url is not a valid URL: {e}"))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(format!(
                    "server.url must use http or https, got {}",
                    parsed.scheme()
                ));
            }
        }
        if self.certificate.file.is_some() && self.certificate.directory.is_some() {
            return Err("certificate.file and certificate.directory are mutually exclusive".into());
        }
        if self.certificate.name.is_some() && self.certificate.directory.is_none() {
            return Err("certificate.name requires certificate.directory".into());
        }
        let level = self.logging.level.to_ascii_lowercase();
        if !matches!(
            level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error" | "off"
        ) && !level.contains('=')
        {
            return Err(format!("logging.level is not a valid filter: {}", self.logging.level));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

pub mod loader {
    use super::{ClientConfig, DEFAULT_CONFIG_FILE, ENV_PREFIX};
    use crate::error::{ClientError, Result};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Loads configuration from `path` (or `linkedcare.toml` in the working
    /// directory) with `LINKEDCARE__SECTION__KEY` environment overrides.
    ///
    /// A missing file is not an error; defaults and the environment apply.
    pub fn load_config(path: Option<&str>) -> Result<ClientConfig> {
        let mut builder = Config::builder();
        let file = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if file.exists() {
            builder = builder.add_source(File::from(file));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| ClientError::config(format!("build error: {e}")))?;
        let merged: ClientConfig = cfg
            .try_deserialize()
            .map_err(|e| ClientError::config(format!("deserialize error: {e}")))?;
        merged.validate().map_err(ClientError::Config)?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = ClientConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_rejects_non_http_url() {
        let mut cfg = ClientConfig::default();
        cfg.server.url = Some("ftp://lc.test".into());
        assert!(cfg.validate().unwrap_err().contains("http or https"));
    }

    #[test]
    fn test_rejects_conflicting_certificate_sources() {
        let mut cfg = ClientConfig::default();
        cfg.certificate.file = Some("a.pem".into());
        cfg.certificate.directory = Some("certs".into());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_accepts_directive_log_filter() {
        let mut cfg = ClientConfig::default();
        cfg.logging.level = "linkedcare_client=debug,info".into();
        assert!(cfg.validate().is_ok());
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().is_err());
    }
}
