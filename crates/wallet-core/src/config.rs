//! Wallet configuration.
//!
//! Loaded from TOML, then overridden from the environment, then validated.
//! Validation reports every problem at once rather than stopping at the
//! first.
//!
//! ```toml
//! broadcast_timeout_secs = 30
//! log_level = "info"
//! log_json = false
//!
//! [[chains]]
//! chain = "eth"
//! evm_chain_id = 1337
//!
//! [[chains]]
//! chain = "btc-test"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::WalletError;
use crate::types::ChainId;

pub const ENV_BROADCAST_TIMEOUT: &str = "WALLET_BROADCAST_TIMEOUT_SECS";
pub const ENV_LOG_LEVEL: &str = "WALLET_LOG_LEVEL";

const MAX_BROADCAST_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WalletConfig {
    /// How long to wait for a broadcast before reporting the outcome as
    /// unknown.
    pub broadcast_timeout_secs: u64,

    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub log_json: bool,

    /// Chains to register, one plugin each.
    pub chains: Vec<ChainConfig>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            broadcast_timeout_secs: 30,
            log_level: "info".into(),
            log_json: false,
            chains: ChainId::ALL
                .iter()
                .map(|&chain| ChainConfig {
                    chain,
                    evm_chain_id: None,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChainConfig {
    pub chain: ChainId,

    /// EIP-155 chain id, only meaningful for `eth`. Defaults to 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm_chain_id: Option<u64>,
}

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<ConfigError> for WalletError {
    fn from(e: ConfigError) -> Self {
        WalletError::Config(e.to_string())
    }
}

impl WalletConfig {
    /// Read `path`, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: WalletConfig = toml::from_str(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate().map_err(ConfigError::Validation)?;

        tracing::debug!(path = %path.display(), chains = config.chains.len(), "loaded config");
        Ok(config)
    }

    /// Parse and validate without consulting the environment.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: WalletConfig = toml::from_str(content)?;
        config.validate().map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// Apply `WALLET_*` overrides fetched through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_BROADCAST_TIMEOUT) {
            self.broadcast_timeout_secs = raw.trim().parse().map_err(|_| {
                ConfigError::Validation(vec![ValidationError::new(
                    ENV_BROADCAST_TIMEOUT,
                    format!("expected whole seconds, got {raw:?}"),
                )])
            })?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.broadcast_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "broadcast_timeout_secs",
                "must be greater than zero",
            ));
        } else if self.broadcast_timeout_secs > MAX_BROADCAST_TIMEOUT_SECS {
            errors.push(ValidationError::new(
                "broadcast_timeout_secs",
                format!("must be at most {MAX_BROADCAST_TIMEOUT_SECS}"),
            ));
        }

        if tracing_subscriber::EnvFilter::try_new(&self.log_level).is_err() {
            errors.push(ValidationError::new(
                "log_level",
                format!("{:?} is not a valid filter directive", self.log_level),
            ));
        }

        if self.chains.is_empty() {
            errors.push(ValidationError::new("chains", "at least one chain is required"));
        }

        let mut seen = HashSet::new();
        for (i, entry) in self.chains.iter().enumerate() {
            if !seen.insert(entry.chain) {
                errors.push(ValidationError::new(
                    format!("chains[{i}].chain"),
                    format!("{} is listed more than once", entry.chain),
                ));
            }
            match (entry.chain, entry.evm_chain_id) {
                (ChainId::Eth, Some(0)) => errors.push(ValidationError::new(
                    format!("chains[{i}].evm_chain_id"),
                    "must be non-zero",
                )),
                (ChainId::Btc | ChainId::BtcTestnet, Some(_)) => {
                    errors.push(ValidationError::new(
                        format!("chains[{i}].evm_chain_id"),
                        format!("not applicable to {}", entry.chain),
                    ))
                }
                _ => {}
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn broadcast_timeout(&self) -> Duration {
        Duration::from_secs(self.broadcast_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = WalletConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.broadcast_timeout(), Duration::from_secs(30));
        assert_eq!(config.chains.len(), 3);
    }

    #[test]
    fn parses_full_document() {
        let config = WalletConfig::from_toml_str(
            r#"
            broadcast_timeout_secs = 5
            log_level = "wallet_core=debug"
            log_json = true

            [[chains]]
            chain = "eth"
            evm_chain_id = 1337

            [[chains]]
            chain = "btc-test"
            "#,
        )
        .unwrap();

        assert_eq!(config.broadcast_timeout_secs, 5);
        assert!(config.log_json);
        assert_eq!(
            config.chains,
            vec![
                ChainConfig {
                    chain: ChainId::Eth,
                    evm_chain_id: Some(1337)
                },
                ChainConfig {
                    chain: ChainId::BtcTestnet,
                    evm_chain_id: None
                },
            ]
        );
    }

    #[test]
    fn empty_document_uses_defaults() {
        assert_eq!(WalletConfig::from_toml_str("").unwrap(), WalletConfig::default());
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(matches!(
            WalletConfig::from_toml_str("broadcast_timeout = 3"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            WalletConfig::from_toml_str("[[chains]]\nchain = \"doge\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn reports_all_problems() {
        let err = WalletConfig::from_toml_str(
            r#"
            broadcast_timeout_secs = 0

            [[chains]]
            chain = "btc"
            evm_chain_id = 1

            [[chains]]
            chain = "btc"
            "#,
        )
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(
                    fields,
                    vec!["broadcast_timeout_secs", "chains[0].evm_chain_id", "chains[1].chain"]
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn overrides_apply() {
        let env: HashMap<&str, &str> =
            HashMap::from([(ENV_BROADCAST_TIMEOUT, "12"), (ENV_LOG_LEVEL, "debug")]);
        let mut config = WalletConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.broadcast_timeout_secs, 12);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn bad_override_is_validation_error() {
        let mut config = WalletConfig::default();
        let result = config.apply_overrides(|key| {
            (key == ENV_BROADCAST_TIMEOUT).then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_level = \"warn\"\n[[chains]]\nchain = \"eth\"").unwrap();
        let config = WalletConfig::load(file.path()).unwrap();
        assert_eq!(config.chains.len(), 1);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let result = WalletConfig::load(Path::new("/nonexistent/wallet.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
