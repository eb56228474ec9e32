//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are layered in order:
//!
//! 1. Built-in defaults (`TrackerConfig::default()`)
//! 2. `config/tracker.toml` (optional)
//! 3. `config/tracker.{environment}.toml` (optional)
//! 4. `TRACKER__SECTION__KEY` environment variables
//!
//! An explicitly supplied file path replaces steps 2 and 3 and must exist.

use super::error::{ConfigResult, ConfigurationError};
use super::TrackerConfig;
use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const ENV_PREFIX: &str = "TRACKER";
const ENV_SEPARATOR: &str = "__";
const DEFAULT_CONFIG_DIR: &str = "config";

/// Loaded, validated configuration together with where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: TrackerConfig,
    environment: String,
    sources: Vec<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection from `./config`
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory(Path::new(DEFAULT_CONFIG_DIR), &environment)
    }

    /// Load `tracker.toml` and `tracker.{environment}.toml` from a directory
    pub fn load_from_directory(dir: &Path, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        let base = dir.join("tracker.toml");
        let overlay = dir.join(format!("tracker.{environment}.toml"));

        let sources: Vec<PathBuf> = [base, overlay].into_iter().filter(|p| p.is_file()).collect();

        debug!(
            environment = %environment,
            directory = %dir.display(),
            files = sources.len(),
            "Loading tracker configuration"
        );

        Self::build(&sources, environment, None)
    }

    /// Load from one explicit file; the file must exist
    pub fn load_from_file(path: &Path) -> ConfigResult<Arc<ConfigManager>> {
        if !path.is_file() {
            return Err(ConfigurationError::ConfigFileNotFound {
                path: path.to_path_buf(),
            });
        }
        Self::build(&[path.to_path_buf()], &Self::detect_environment(), None)
    }

    /// Load with an explicit set of environment overrides instead of the process
    /// environment. Keys use the same `TRACKER__SECTION__KEY` form.
    pub fn load_with_overrides(
        path: Option<&Path>,
        overrides: HashMap<String, String>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let sources: Vec<PathBuf> = path.map(Path::to_path_buf).into_iter().collect();
        Self::build(&sources, &Self::detect_environment(), Some(overrides))
    }

    fn build(
        files: &[PathBuf],
        environment: &str,
        env_source: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let mut builder = Config::builder();
        for file in files {
            builder = builder.add_source(File::from(file.as_path()).format(FileFormat::Toml));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(env_source),
        );

        let config: TrackerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        info!(
            environment = %environment,
            poll_interval_seconds = config.poller.poll_interval_seconds,
            max_age_seconds = config.poller.max_age_seconds,
            max_check_count = config.poller.max_check_count,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            sources: files.to_vec(),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Files that contributed to the configuration, in load order
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Current deployment environment from `TRACKER_ENV` (default `development`)
    pub fn detect_environment() -> String {
        std::env::var("TRACKER_ENV")
            .or_else(|_| std::env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }
}
