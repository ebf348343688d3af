//! TOML configuration parsing and validation.
//!
//! Content Migrator reads a single file (default `./config/cmig.toml`).
//! Every section except `[db]` is optional and falls back to defaults.
//!
//! ```toml
//! [db]
//! path = "./data/cmig.sqlite"
//!
//! [conversion]
//! delete_source_upon_conversion = false
//! share_private = false
//! convert_if_sharing_capability_disabled = false
//! route_inbound_message_attachments_to_case = true
//! share_type = "viewer"
//! visibility = "all_users"
//! scope_parent_ids = ["acc-001"]
//!
//! [batch]
//! chunk_size = 200
//!
//! [notify]
//! addresses = ["ops@example.com"]
//! webhook_url = "https://hooks.example.com/cmig"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use content_migrator_core::models::{ShareType, Visibility};
use content_migrator_core::options::{ConversionOptions, ParentScope};

/// Largest chunk a single pipeline invocation may be given.
pub const MAX_CHUNK_SIZE: usize = 2000;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub conversion: ConversionConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConversionConfig {
    #[serde(default)]
    pub delete_source_upon_conversion: bool,
    #[serde(default)]
    pub share_private: bool,
    #[serde(default)]
    pub convert_if_sharing_capability_disabled: bool,
    #[serde(default)]
    pub route_inbound_message_attachments_to_case: bool,
    #[serde(default)]
    pub share_type: ShareType,
    #[serde(default)]
    pub visibility: Visibility,
    /// Absent means every parent; an empty list means none.
    #[serde(default)]
    pub scope_parent_ids: Option<Vec<String>>,
}

impl ConversionConfig {
    pub fn options(&self) -> ConversionOptions {
        ConversionOptions {
            delete_source_upon_conversion: self.delete_source_upon_conversion,
            share_private: self.share_private,
            convert_if_sharing_capability_disabled: self.convert_if_sharing_capability_disabled,
            route_inbound_message_attachments_to_case: self
                .route_inbound_message_attachments_to_case,
            share_type: self.share_type,
            visibility: self.visibility,
        }
    }

    pub fn scope(&self) -> ParentScope {
        ParentScope::from_ids(self.scope_parent_ids.clone())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BatchConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifyConfig {
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            webhook_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

impl Config {
    /// Defaults for commands that can run without a config file.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/cmig.sqlite"),
            },
            conversion: ConversionConfig::default(),
            batch: BatchConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;

    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.batch.chunk_size == 0 || config.batch.chunk_size > MAX_CHUNK_SIZE {
        anyhow::bail!("batch.chunk_size must be between 1 and {}", MAX_CHUNK_SIZE);
    }

    if let Some(url) = &config.notify.webhook_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!(
                "notify.webhook_url must start with http:// or https:// (got '{}')",
                url
            );
        }
    }

    if config.notify.timeout_secs == 0 {
        anyhow::bail!("notify.timeout_secs must be > 0");
    }

    Ok(())
}
