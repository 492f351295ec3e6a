//! Server configuration.
//!
//! Read from an optional TOML file named by `TALLY_CONFIG`, then overridden by
//! environment variables:
//! ```toml
//! bind = "127.0.0.1:8080"
//! database = "tally.db"
//! jwt_secret = "..."
//! jwt_audience = "authenticated"
//! log_format = "json"
//! max_body_bytes = 2097152
//! ```

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => bail!("unknown log format {other:?}, expected \"json\" or \"pretty\""),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub database: PathBuf,
    pub jwt_secret: Option<String>,
    pub jwt_audience: Option<String>,
    pub log_format: LogFormat,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            database: PathBuf::from("tally.db"),
            jwt_secret: None,
            jwt_audience: None,
            log_format: LogFormat::Json,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Load from `TALLY_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self> {
        let base = match std::env::var("TALLY_CONFIG") {
            Ok(path) => {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config file {path}"))?;
                Self::from_toml(&content).with_context(|| format!("parsing config file {path}"))?
            }
            Err(_) => Self::default(),
        };

        let config = base.with_env(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `TALLY_*` overrides. Unrelated variables are ignored.
    pub fn with_env<I>(mut self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                "TALLY_BIND" => self.bind = value,
                "TALLY_DATABASE" => self.database = PathBuf::from(value),
                "TALLY_JWT_SECRET" => self.jwt_secret = Some(value),
                "TALLY_JWT_AUDIENCE" => {
                    self.jwt_audience = Some(value).filter(|v| !v.trim().is_empty())
                }
                "TALLY_LOG_FORMAT" => self.log_format = value.parse()?,
                "TALLY_MAX_BODY_BYTES" => {
                    self.max_body_bytes = value
                        .trim()
                        .parse()
                        .with_context(|| format!("TALLY_MAX_BODY_BYTES={value:?}"))?
                }
                _ => {}
            }
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        match &self.jwt_secret {
            Some(secret) if !secret.trim().is_empty() => {}
            _ => bail!("jwt_secret is required (set TALLY_JWT_SECRET)"),
        }
        if self.max_body_bytes == 0 {
            bail!("max_body_bytes must be greater than zero");
        }
        Ok(())
    }

    pub fn jwt_secret(&self) -> &str {
        self.jwt_secret.as_deref().unwrap_or_default()
    }
}
