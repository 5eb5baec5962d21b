//! TOML configuration parsing and validation.
//!
//! ```toml
//! [db]
//! path = "./data/facefind.sqlite"
//!
//! [index]
//! dims = 128
//! min_similarity = 0.15
//!
//! [shares]
//! validity_hours = 48
//! code_length = 12
//! max_code_attempts = 5
//!
//! [server]
//! bind = "127.0.0.1:7340"
//! ```

use anyhow::{Context, Result};
use facefind_core::embedding::DEFAULT_DIMS;
use facefind_core::search::DEFAULT_MIN_SIMILARITY;
use facefind_core::share::MIN_CODE_LENGTH;
use facefind_core::SharePolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub shares: SharesConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Floor applied to searches that do not pass their own threshold.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dims: DEFAULT_DIMS,
            min_similarity: DEFAULT_MIN_SIMILARITY,
        }
    }
}

fn default_dims() -> usize {
    DEFAULT_DIMS
}
fn default_min_similarity() -> f64 {
    DEFAULT_MIN_SIMILARITY
}

#[derive(Debug, Deserialize, Clone)]
pub struct SharesConfig {
    #[serde(default = "default_validity_hours")]
    pub validity_hours: i64,
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    #[serde(default = "default_max_code_attempts")]
    pub max_code_attempts: u32,
}

impl Default for SharesConfig {
    fn default() -> Self {
        Self {
            validity_hours: default_validity_hours(),
            code_length: default_code_length(),
            max_code_attempts: default_max_code_attempts(),
        }
    }
}

fn default_validity_hours() -> i64 {
    48
}
fn default_code_length() -> usize {
    12
}
fn default_max_code_attempts() -> u32 {
    5
}

impl SharesConfig {
    pub fn policy(&self) -> SharePolicy {
        SharePolicy {
            validity: chrono::Duration::hours(self.validity_hours),
            code_length: self.code_length,
            max_code_attempts: self.max_code_attempts,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.index.dims == 0 {
        anyhow::bail!("index.dims must be > 0");
    }

    if !(0.0..=1.0).contains(&config.index.min_similarity) {
        anyhow::bail!("index.min_similarity must be in [0.0, 1.0]");
    }

    if config.shares.validity_hours <= 0 {
        anyhow::bail!("shares.validity_hours must be > 0");
    }

    if config.shares.code_length < MIN_CODE_LENGTH {
        anyhow::bail!(
            "shares.code_length must be >= {} (at least 48 bits of entropy)",
            MIN_CODE_LENGTH
        );
    }

    if config.shares.max_code_attempts == 0 {
        anyhow::bail!("shares.max_code_attempts must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "/tmp/facefind.sqlite"

[server]
bind = "127.0.0.1:0"
"#;

    #[test]
    fn test_defaults_applied() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        validate(&config).unwrap();
        assert_eq!(config.index.dims, 128);
        assert!((config.index.min_similarity - 0.15).abs() < 1e-12);
        assert_eq!(config.shares.validity_hours, 48);
        assert_eq!(config.shares.policy().validity, chrono::Duration::hours(48));
    }

    #[test]
    fn test_short_codes_rejected() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.shares.code_length = 6;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.index.min_similarity = 1.2;
        assert!(validate(&config).is_err());
    }
}
