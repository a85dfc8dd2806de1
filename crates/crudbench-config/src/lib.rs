//! # crudbench configuration
//!
//! Layered settings for a benchmark run. Precedence, lowest first:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config`, or `./crudbench.toml` when present)
//! 3. `CRUDBENCH_*` environment variables
//! 4. command-line flags, passed in as [`Overrides`]
//!
//! ```rust,no_run
//! use crudbench_config::{BenchConfig, Overrides};
//!
//! # fn main() -> Result<(), crudbench_config::ConfigError> {
//! let config = BenchConfig::load(None, &Overrides::default())?;
//! println!("{}", config.to_toml()?);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "crudbench.toml";

pub const ENV_SQLITE_PATH: &str = "CRUDBENCH_SQLITE_PATH";
pub const ENV_SURREAL_ENDPOINT: &str = "CRUDBENCH_SURREAL_ENDPOINT";
pub const ENV_SURREAL_USER: &str = "CRUDBENCH_SURREAL_USER";
pub const ENV_SURREAL_PASS: &str = "CRUDBENCH_SURREAL_PASS";
pub const ENV_OUTPUT_DIR: &str = "CRUDBENCH_OUTPUT_DIR";
pub const ENV_ITERATIONS: &str = "CRUDBENCH_ITERATIONS";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to serialize config: {0}")]
    Serialize(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Complete benchmark configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub workload: WorkloadConfig,
    pub data: DataConfig,
    pub sqlite: SqliteSection,
    pub surrealdb: SurrealSection,
    pub output: OutputConfig,
}

/// Tier sizes, repetitions and the per-call guard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    pub sizes: Vec<usize>,
    pub iterations: usize,
    pub operation_timeout_secs: u64,
    /// Empty both backends before the first tier
    pub reset_before_run: bool,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            sizes: vec![10, 100, 1_000, 10_000],
            iterations: 1,
            operation_timeout_secs: 300,
            reset_before_run: false,
        }
    }
}

/// Input files; without them a synthetic population is generated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// CSV feeding the relational backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tabular_path: Option<PathBuf>,
    /// JSON array feeding the document backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hierarchical_path: Option<PathBuf>,
    /// Size of the synthetic fallback; raised to the largest tier if smaller
    pub synthetic_count: usize,
    pub synthetic_seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            tabular_path: None,
            hierarchical_path: None,
            synthetic_count: 10_000,
            synthetic_seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteSection {
    /// Database file, or `:memory:`
    pub path: PathBuf,
    pub wal_mode: bool,
    pub foreign_keys: bool,
    pub busy_timeout_ms: u32,
}

impl Default for SqliteSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("crudbench.db"),
            wal_mode: true,
            foreign_keys: true,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurrealSection {
    /// `mem://` or `ws://host:port`
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for SurrealSection {
    fn default() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            namespace: "crudbench".to_string(),
            database: "heart_disease".to_string(),
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub file_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            file_prefix: "crud_performance_results".to_string(),
        }
    }
}

/// Command-line values; `None` leaves the lower layers alone
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub sizes: Option<Vec<usize>>,
    pub iterations: Option<usize>,
    pub operation_timeout_secs: Option<u64>,
    pub reset_before_run: Option<bool>,
    pub tabular_path: Option<PathBuf>,
    pub hierarchical_path: Option<PathBuf>,
    pub synthetic_count: Option<usize>,
    pub synthetic_seed: Option<u64>,
    pub sqlite_path: Option<PathBuf>,
    pub surreal_endpoint: Option<String>,
    pub output_dir: Option<PathBuf>,
}

impl BenchConfig {
    /// Load configuration with precedence: defaults < file < env < overrides
    pub fn load(config_file: Option<&Path>, overrides: &Overrides) -> ConfigResult<Self> {
        let mut config = Self::from_file_or_default(config_file)?;
        config.apply_env_from(|key| std::env::var(key).ok())?;
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Read `path`, or the default file if present, or fall back to defaults
    ///
    /// An explicitly named file that does not exist is an error.
    pub fn from_file_or_default(config_file: Option<&Path>) -> ConfigResult<Self> {
        match config_file {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    debug!("No config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;
        info!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Parse TOML text; missing sections and keys take their defaults
    pub fn from_toml_str(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|e| e.to_string())
    }

    /// Apply `CRUDBENCH_*` variables through `lookup`
    pub fn apply_env_from<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_SQLITE_PATH) {
            self.sqlite.path = PathBuf::from(path);
        }
        if let Some(endpoint) = lookup(ENV_SURREAL_ENDPOINT) {
            self.surrealdb.endpoint = endpoint;
        }
        if let Some(user) = lookup(ENV_SURREAL_USER) {
            self.surrealdb.username = Some(user);
        }
        if let Some(pass) = lookup(ENV_SURREAL_PASS) {
            self.surrealdb.password = Some(pass);
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.output.directory = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_ITERATIONS) {
            self.workload.iterations = raw.trim().parse().map_err(|_| {
                ConfigError::invalid(ENV_ITERATIONS, format!("'{}' is not a count", raw))
            })?;
        }
        Ok(())
    }

    /// Apply command-line values (highest priority)
    pub fn apply_overrides(&mut self, o: &Overrides) {
        if let Some(sizes) = &o.sizes {
            self.workload.sizes = sizes.clone();
        }
        if let Some(iterations) = o.iterations {
            self.workload.iterations = iterations;
        }
        if let Some(secs) = o.operation_timeout_secs {
            self.workload.operation_timeout_secs = secs;
        }
        if let Some(reset) = o.reset_before_run {
            self.workload.reset_before_run = reset;
        }
        if let Some(path) = &o.tabular_path {
            self.data.tabular_path = Some(path.clone());
        }
        if let Some(path) = &o.hierarchical_path {
            self.data.hierarchical_path = Some(path.clone());
        }
        if let Some(count) = o.synthetic_count {
            self.data.synthetic_count = count;
        }
        if let Some(seed) = o.synthetic_seed {
            self.data.synthetic_seed = seed;
        }
        if let Some(path) = &o.sqlite_path {
            self.sqlite.path = path.clone();
        }
        if let Some(endpoint) = &o.surreal_endpoint {
            self.surrealdb.endpoint = endpoint.clone();
        }
        if let Some(dir) = &o.output_dir {
            self.output.directory = dir.clone();
        }
    }

    /// Reject values the runner cannot use
    pub fn validate(&self) -> ConfigResult<()> {
        let sizes = &self.workload.sizes;
        if sizes.is_empty() {
            return Err(ConfigError::invalid("workload.sizes", "at least one size is required"));
        }
        if sizes.contains(&0) {
            return Err(ConfigError::invalid("workload.sizes", "sizes must be positive"));
        }
        if sizes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::invalid(
                "workload.sizes",
                format!("sizes must be strictly ascending, got {:?}", sizes),
            ));
        }
        if self.workload.iterations == 0 {
            return Err(ConfigError::invalid("workload.iterations", "must be at least 1"));
        }
        if self.workload.operation_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "workload.operation_timeout_secs",
                "must be at least 1",
            ));
        }
        if self.surrealdb.username.is_some() != self.surrealdb.password.is_some() {
            return Err(ConfigError::invalid(
                "surrealdb.username",
                "username and password must be set together",
            ));
        }
        if self.output.file_prefix.trim().is_empty() {
            return Err(ConfigError::invalid("output.file_prefix", "must not be empty"));
        }
        Ok(())
    }

    /// Number of synthetic patients to generate: never fewer than the largest tier
    pub fn synthetic_population(&self) -> usize {
        let largest = self.workload.sizes.last().copied().unwrap_or(0);
        self.data.synthetic_count.max(largest)
    }

    /// Render as TOML with credentials masked
    pub fn to_toml(&self) -> ConfigResult<String> {
        let mut shown = self.clone();
        if shown.surrealdb.password.is_some() {
            shown.surrealdb.password = Some("********".to_string());
        }
        toml::to_string_pretty(&shown).map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}
