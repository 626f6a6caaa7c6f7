//! CLI configuration

use std::path::{Path, PathBuf};

use serde::Deserialize;

use core_kernel::OrgConfig;

/// Configuration file read when none is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "billing.toml";

/// CLI configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Organization settings
    pub organization: OrgConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl CliConfig {
    /// Loads configuration from a TOML file and the environment
    ///
    /// The file is optional unless a path is given explicitly. Environment
    /// variables override the file: `BILLING_LOG_LEVEL`,
    /// `BILLING_ORGANIZATION__CURRENCY`, `BILLING_ORGANIZATION__CREDITOR__IBAN`, ...
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let config: CliConfig = config::Config::builder()
            .add_source(config::File::from(file).required(path.is_some()))
            .add_source(
                config::Environment::with_prefix("BILLING")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config
            .organization
            .validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(config)
    }
}
