//! Application configuration management

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use neume::SchemaSettings;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// YAML model declaration to load
    pub model_path: PathBuf,

    /// Page size used when a list or connection gives no `first`
    pub default_page_size: u64,

    /// Upper bound for any requested page size
    pub max_page_size: u64,

    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = SchemaSettings::default();

        let default_page_size = match env::var("NEUME_DEFAULT_PAGE_SIZE") {
            Ok(v) => v.parse().context("Invalid NEUME_DEFAULT_PAGE_SIZE")?,
            Err(_) => defaults.default_page_size,
        };
        let max_page_size = match env::var("NEUME_MAX_PAGE_SIZE") {
            Ok(v) => v.parse().context("Invalid NEUME_MAX_PAGE_SIZE")?,
            Err(_) => defaults.max_page_size,
        };
        if default_page_size == 0 || default_page_size > max_page_size {
            bail!(
                "NEUME_DEFAULT_PAGE_SIZE ({default_page_size}) must be between 1 and NEUME_MAX_PAGE_SIZE ({max_page_size})"
            );
        }

        Ok(Self {
            model_path: env::var("NEUME_MODEL_PATH")
                .unwrap_or_else(|_| "demos/person_graph.yaml".to_string())
                .into(),

            default_page_size,
            max_page_size,

            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }

    pub fn schema_settings(&self) -> SchemaSettings {
        SchemaSettings {
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
        }
    }
}
