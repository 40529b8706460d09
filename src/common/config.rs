//! Configuration for keyscope runs
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `KEYSCOPE__*` environment variables. The CLI applies its flags last.

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "keyscope.toml";
const ENV_PREFIX: &str = "KEYSCOPE";

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Store connection settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Prefix discovery and aggregation settings
    #[serde(default)]
    pub profile: ProfileConfig,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            profile: ProfileConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load from `path` (or `keyscope.toml` if present) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                builder = builder
                    .add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false));
            }
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.profile.validate()?;
        Ok(config)
    }
}

/// Store connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Logical database index
    #[serde(default)]
    pub db: i64,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub response_timeout_ms: u64,

    /// Send READONLY after connecting so cluster replicas serve reads
    #[serde(default)]
    pub read_only: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    6379
}
fn default_timeout_ms() -> u64 {
    2000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db: 0,
            username: None,
            password: None,
            connect_timeout_ms: default_timeout_ms(),
            response_timeout_ms: default_timeout_ms(),
            read_only: false,
        }
    }
}

impl StoreConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Address without credentials, safe to log.
    pub fn display_addr(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.db)
    }
}

/// Prefix discovery and aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Glob pattern passed to SCAN
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// COUNT hint passed to SCAN
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Minimum number of keys to sample before sampling may stop
    #[serde(default = "default_sample_target")]
    pub sample_target: u64,

    /// Root branches that must look like prefixes before sampling may stop
    #[serde(default = "default_min_prefix_count")]
    pub min_prefix_count: u64,

    /// A prefix is refined further only if it has more members than this
    #[serde(default = "default_min_members")]
    pub min_members: usize,

    /// Discovered prefixes must be strictly shorter than this
    #[serde(default = "default_max_detect_length")]
    pub max_detect_length: usize,

    /// Deeper refinements are kept only if they yield more prefixes than this
    #[serde(default = "default_detail_level")]
    pub detail_level: usize,

    /// Root branch suffix length above which the sampler counts a branch as a prefix
    #[serde(default = "default_branch_suffix_threshold")]
    pub branch_suffix_threshold: usize,

    /// Root branch suffix length above which a summary prefix is registered
    #[serde(default = "default_summary_suffix_threshold")]
    pub summary_suffix_threshold: usize,

    /// Fetch TYPE and DUMP size for every attributed key
    #[serde(default)]
    pub collect_stats: bool,

    /// Log aggregation progress every this many keys (0 disables)
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

fn default_pattern() -> String {
    "*".to_string()
}
fn default_batch_size() -> usize {
    100
}
fn default_sample_target() -> u64 {
    50_000
}
fn default_min_prefix_count() -> u64 {
    10
}
fn default_min_members() -> usize {
    10
}
fn default_max_detect_length() -> usize {
    40
}
fn default_detail_level() -> usize {
    2
}
fn default_branch_suffix_threshold() -> usize {
    3
}
fn default_summary_suffix_threshold() -> usize {
    2
}
fn default_progress_interval() -> u64 {
    800_000
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            batch_size: default_batch_size(),
            sample_target: default_sample_target(),
            min_prefix_count: default_min_prefix_count(),
            min_members: default_min_members(),
            max_detect_length: default_max_detect_length(),
            detail_level: default_detail_level(),
            branch_suffix_threshold: default_branch_suffix_threshold(),
            summary_suffix_threshold: default_summary_suffix_threshold(),
            collect_stats: false,
            progress_interval: default_progress_interval(),
        }
    }
}

impl ProfileConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be at least 1".into()));
        }
        if self.max_detect_length == 0 {
            return Err(Error::InvalidConfig(
                "max_detect_length must be at least 1".into(),
            ));
        }
        if self.pattern.is_empty() {
            return Err(Error::InvalidConfig("scan pattern cannot be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_profile_defaults() {
        let config = ProfileConfig::default();
        assert_eq!(config.pattern, "*");
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.sample_target, 50_000);
        assert_eq!(config.min_prefix_count, 10);
        assert_eq!(config.min_members, 10);
        assert_eq!(config.max_detect_length, 40);
        assert_eq!(config.detail_level, 2);
        assert_eq!(config.branch_suffix_threshold, 3);
        assert!(!config.collect_stats);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = ProfileConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"

[store]
host = "10.0.0.5"
port = 6380
read_only = true

[profile]
pattern = "user:*"
sample_target = 500
collect_stats = true
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.store.host, "10.0.0.5");
        assert_eq!(config.store.port, 6380);
        assert!(config.store.read_only);
        assert_eq!(config.store.connect_timeout_ms, 2000);
        assert_eq!(config.profile.pattern, "user:*");
        assert_eq!(config.profile.sample_target, 500);
        assert!(config.profile.collect_stats);
        assert_eq!(config.profile.max_detect_length, 40);
    }

    #[test]
    fn test_load_rejects_invalid_profile() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[profile]\nbatch_size = 0").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }
}
