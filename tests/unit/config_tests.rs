use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use tempfile::NamedTempFile;

use tixi_rs::config::EnvProvider;
use tixi_rs::{Cli, Config, ConfigError, ConfigManager, LibraryConfig};

struct FixedEnv(HashMap<&'static str, &'static str>);

impl EnvProvider for FixedEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).map(|value| value.to_string())
    }
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.library.name, "tixi3");
    assert!(config.library.path.is_none());
    assert!(config.library.dependencies.is_empty());
    assert_eq!(config.logging.level, "warn");
    assert!(ConfigManager::validate_config(&config).is_ok());
}

#[test]
fn test_partial_file_keeps_defaults() {
    let mut file = NamedTempFile::with_suffix(".toml").unwrap();
    writeln!(file, "[logging]\nlevel = \"info\"").unwrap();

    let config = ConfigManager::load_from_file(file.path()).unwrap();
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.library, LibraryConfig::default());
}

#[test]
fn test_precedence_file_then_environment_then_cli() {
    let mut file = NamedTempFile::with_suffix(".json").unwrap();
    let json = r#"{"library": {"name": "tixi", "dependencies": ["xml2"]},
        "logging": {"level": "info"}}"#;
    file.write_all(json.as_bytes()).unwrap();

    let config = ConfigManager::load_from_file(file.path()).unwrap();
    assert_eq!(config.library.name, "tixi");

    let env = FixedEnv(HashMap::from([
        ("TIXI_LIBRARY_NAME", "tixi3"),
        ("TIXI_LIBRARY_DEPENDENCIES", "z, xml2,,xslt"),
    ]));
    let config = ConfigManager::apply_environment_overrides_with(&env, config).unwrap();
    assert_eq!(config.library.name, "tixi3");
    assert_eq!(config.library.dependencies, vec!["z", "xml2", "xslt"]);
    assert_eq!(config.logging.level, "info");

    let cli = Cli::try_parse_from(["tixi", "--library", "/opt/tixi/libtixi3.so", "-q", "version"])
        .unwrap();
    let config = ConfigManager::merge_with_cli(config, &cli);
    assert_eq!(
        config.library.path,
        Some(PathBuf::from("/opt/tixi/libtixi3.so"))
    );
    assert_eq!(config.logging.level, "error");
    assert!(ConfigManager::validate_config(&config).is_ok());
}

#[test]
fn test_explicit_missing_config_file() {
    let cli =
        Cli::try_parse_from(["tixi", "--config", "/nonexistent/tixi.toml", "version"]).unwrap();

    match ConfigManager::load_config(&cli) {
        Err(ConfigError::FileNotFound { path }) => {
            assert_eq!(path, PathBuf::from("/nonexistent/tixi.toml"));
        }
        other => panic!("Expected FileNotFound, got {:?}", other),
    }
}

#[test]
fn test_library_path_overrides_name() {
    let config = LibraryConfig {
        path: Some(PathBuf::from("/opt/tixi/libtixi3.so")),
        name: "ignored".to_string(),
        dependencies: vec![],
    };
    assert_eq!(config.library_file(), "/opt/tixi/libtixi3.so");
}
