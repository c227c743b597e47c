use crate::cli::Cli;
use crate::error::{ConfigError, ConfigResult as Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Main binding configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub logging: LoggingConfig,
}

/// Where to find the native TiXI library
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LibraryConfig {
    /// Explicit path to the shared library; overrides `name`
    pub path: Option<PathBuf>,
    /// Library name without platform prefix/suffix
    pub name: String,
    /// Libraries loaded before TiXI, in order
    pub dependencies: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level when RUST_LOG is not set
    pub level: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            path: None,
            name: "tixi3".to_string(),
            dependencies: vec![],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl LibraryConfig {
    /// File name or path handed to the dynamic loader for TiXI itself
    pub fn library_file(&self) -> OsString {
        match &self.path {
            Some(path) => path.clone().into_os_string(),
            None => libloading::library_filename(&self.name),
        }
    }

    /// Platform file names of the dependencies, in load order
    pub fn dependency_files(&self) -> Vec<OsString> {
        self.dependencies
            .iter()
            .map(libloading::library_filename)
            .collect()
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: file -> environment -> CLI
    pub fn load_config(cli: &Cli) -> Result<Config> {
        let mut config = match &cli.config {
            Some(config_path) => Self::load_from_file(config_path)?,
            None => Self::find_config_file()?.unwrap_or_default(),
        };

        config = Self::apply_environment_overrides(config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub fn find_config_file() -> Result<Option<Config>> {
        let config_names = ["tixi.toml", "tixi.json", ".tixi.toml", ".tixi.json"];

        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path)?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("tixi-rs");
            for name in &config_names {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path)?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(path) = env.get("TIXI_LIBRARY_PATH") {
            if path.trim().is_empty() {
                return Err(ConfigError::Environment(
                    "TIXI_LIBRARY_PATH is set but empty".to_string(),
                ));
            }
            config.library.path = Some(PathBuf::from(path));
        }

        if let Some(name) = env.get("TIXI_LIBRARY_NAME") {
            config.library.name = name.trim().to_string();
        }

        if let Some(dependencies) = env.get("TIXI_LIBRARY_DEPENDENCIES") {
            config.library.dependencies = dependencies
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(level) = env.get("TIXI_LOG_LEVEL") {
            let level = level.trim().to_lowercase();
            if !LOG_LEVELS.contains(&level.as_str()) {
                return Err(ConfigError::Environment(format!(
                    "Invalid TIXI_LOG_LEVEL value: {}",
                    level
                )));
            }
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if let Some(library) = &cli.library {
            config.library.path = Some(library.clone());
        }

        if cli.quiet {
            config.logging.level = "error".to_string();
        } else if cli.verbose >= 2 {
            config.logging.level = "trace".to_string();
        } else if cli.verbose == 1 {
            config.logging.level = "debug".to_string();
        }

        config
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if config.library.path.is_none() && config.library.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Library name must not be empty when no library path is set".to_string(),
            ));
        }

        if let Some(path) = &config.library.path
            && path.as_os_str().is_empty()
        {
            return Err(ConfigError::Validation(
                "Library path must not be empty".to_string(),
            ));
        }

        if config
            .library
            .dependencies
            .iter()
            .any(|dependency| dependency.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "Dependency library names must not be empty".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Unknown log level: {}",
                config.logging.level
            )));
        }

        Ok(())
    }
}
