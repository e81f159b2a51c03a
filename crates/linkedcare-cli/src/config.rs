use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use linkedcare_client::ClientConfig;
use linkedcare_client::config::loader::load_config;

pub const VALID_KEYS: &[&str] = &[
    "server.url",
    "server.request_timeout_secs",
    "certificate.file",
    "certificate.directory",
    "certificate.name",
    "certificate.attended",
    "logging.level",
];

fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .context("Cannot determine user config directory")?
        .join("linkedcare");
    Ok(dir)
}

pub fn user_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("linkedcare.toml"))
}

/// Loads the effective config: `--config`, else the user file, else `./linkedcare.toml`.
pub fn load(explicit: Option<&str>) -> Result<ClientConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_string()),
        None => user_config_path()
            .ok()
            .filter(|p| p.exists())
            .map(|p| p.to_string_lossy().into_owned()),
    };
    Ok(load_config(path.as_deref())?)
}

/// Reads a config file as written, without defaults from other layers.
pub fn read_file(path: &Path) -> Result<ClientConfig> {
    if !path.exists() {
        return Ok(ClientConfig::default());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
}

pub fn write_file(path: &Path, config: &ClientConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Applies `key = value` to `config` and validates the result.
pub fn set_value(config: &mut ClientConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "server.url" => config.server.url = Some(value.to_string()),
        "server.request_timeout_secs" => {
            config.server.request_timeout_secs = value
                .parse()
                .with_context(|| format!("{key} must be a whole number of seconds"))?;
        }
        "certificate.file" => config.certificate.file = Some(value.into()),
        "certificate.directory" => config.certificate.directory = Some(value.into()),
        "certificate.name" => config.certificate.name = Some(value.to_string()),
        "certificate.attended" => {
            config.certificate.attended = Some(
                value
                    .parse()
                    .with_context(|| format!("{key} must be true or false"))?,
            );
        }
        "logging.level" => config.logging.level = value.to_string(),
        other => anyhow::bail!(
            "Unknown config key: {other}. Valid keys: {}",
            VALID_KEYS.join(", ")
        ),
    }
    config.validate().map_err(|e| anyhow::anyhow!(e))
}

/// Server URL from `--server` / `LINKEDCARE_URL`, then config.
pub fn resolve_server(cli_server: &Option<String>, config: &ClientConfig) -> Result<String> {
    if let Some(s) = cli_server {
        return Ok(s.clone());
    }
    if let Some(s) = &config.server.url {
        return Ok(s.clone());
    }
    anyhow::bail!(
        "No server URL configured. Use --server, set LINKEDCARE_URL, or run: linkedcare config set server.url <url>"
    )
}
