/*
[INPUT]:  Built-in defaults, optional YAML file, WORKFLOW__* environment
[OUTPUT]: Resolved CLI configuration
[POS]:    Configuration layer - backend endpoint, storage, logging
[UPDATE]: When adding new configuration options
*/

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use workflow_client::ClientConfig;

/// Looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "workflow-cli.yaml";

const ENV_PREFIX: &str = "WORKFLOW";

/// Top-level configuration for the workflow CLI
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CliConfig {
    /// Backend API root, e.g. `http://localhost:8080/api`
    pub base_url: String,
    /// JSON file holding the persisted session
    pub storage_path: PathBuf,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Tracing filter directive
    pub log_level: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            base_url: client.base_url,
            storage_path: default_storage_path(),
            timeout_secs: client.timeout.as_secs(),
            connect_timeout_secs: client.connect_timeout.as_secs(),
            log_level: "warn".to_string(),
        }
    }
}

impl CliConfig {
    /// Load defaults, then the config file, then environment overrides.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&Self::default()).context("encode default config")?);

        builder = match path {
            Some(path) => builder.add_source(File::from(path).format(FileFormat::Yaml)),
            None => builder.add_source(
                File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false),
            ),
        };

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config: Self = builder
            .build()
            .context("read configuration")?
            .try_deserialize()
            .context("parse configuration")?;
        Ok(config)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }
}

fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("workflow-cli")
        .join("session.json")
}
