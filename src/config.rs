// Configuration File Support
//
// This module provides configuration file parsing for scangate.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from the XDG config directory: ~/.config/scangate/config.toml

use crate::provision::{
    is_path_component, DEFAULT_INSTALLER_URL, DEFAULT_TOOL_NAME, DEFAULT_TOOL_VERSION,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Scanner provisioning configuration
    pub scanner: ScannerConfig,

    /// Report output configuration
    pub reports: ReportsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Scanner provisioning configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScannerConfig {
    /// Executable name, also the tool cache key
    pub name: String,

    /// Version to install when none is given on the command line
    pub version: String,

    /// Location of the installer script
    pub installer_url: String,

    /// Tool cache root (default: platform cache dir)
    pub cache_dir: Option<PathBuf>,

    /// Where fresh installs are staged before caching (default: system temp dir)
    pub install_dir: Option<PathBuf>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_TOOL_NAME.to_string(),
            version: DEFAULT_TOOL_VERSION.to_string(),
            installer_url: DEFAULT_INSTALLER_URL.to_string(),
            cache_dir: None,
            install_dir: None,
        }
    }
}

impl ScannerConfig {
    /// Tool cache root, falling back to `<cache dir>/scangate/tools`
    pub fn cache_root(&self) -> PathBuf {
        if let Some(ref dir) = self.cache_dir {
            return dir.clone();
        }
        match directories::ProjectDirs::from("com", "scangate", "scangate") {
            Some(dirs) => dirs.cache_dir().join("tools"),
            None => std::env::temp_dir().join("scangate").join("tools"),
        }
    }

    /// Staging root for installs
    pub fn install_root(&self) -> PathBuf {
        self.install_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("scangate").join("install"))
    }
}

/// Report output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportsConfig {
    /// Directory that `results.sarif` / `results.json` are written to
    pub output_dir: PathBuf,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load configuration from a specific path
    ///
    /// A missing file yields the defaults. Environment overrides are applied
    /// and the result validated.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if
    /// the resulting configuration is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            config
        } else {
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/scangate/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "scangate", "scangate") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("scangate")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - SCANGATE_LOG_LEVEL
    /// - SCANGATE_LOG_FORMAT
    /// - SCANGATE_SCANNER_VERSION
    /// - SCANGATE_CACHE_DIR
    /// - SCANGATE_OUTPUT_DIR
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("SCANGATE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("SCANGATE_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(version) = std::env::var("SCANGATE_SCANNER_VERSION") {
            if !version.trim().is_empty() {
                self.scanner.version = version;
            }
        }
        if let Ok(dir) = std::env::var("SCANGATE_CACHE_DIR") {
            if !dir.is_empty() {
                self.scanner.cache_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(dir) = std::env::var("SCANGATE_OUTPUT_DIR") {
            if !dir.is_empty() {
                self.reports.output_dir = PathBuf::from(dir);
            }
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        if self.scanner.name.trim().is_empty() {
            anyhow::bail!("Scanner name must not be empty");
        }
        if !is_path_component(&self.scanner.name) {
            anyhow::bail!("Invalid scanner name: {}", self.scanner.name);
        }
        if self.scanner.version.trim().is_empty() {
            anyhow::bail!("Scanner version must not be empty");
        }
        if !is_path_component(&self.scanner.version) {
            anyhow::bail!(
                "Invalid scanner version: {}. Must not contain path separators or '..'",
                self.scanner.version
            );
        }
        if self.scanner.installer_url.trim().is_empty() {
            anyhow::bail!("Scanner installer URL must not be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Tests touching process environment must not interleave
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_VARS: [&str; 5] = [
        "SCANGATE_LOG_LEVEL",
        "SCANGATE_LOG_FORMAT",
        "SCANGATE_SCANNER_VERSION",
        "SCANGATE_CACHE_DIR",
        "SCANGATE_OUTPUT_DIR",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "compact");
        assert_eq!(config.scanner.name, "grype");
        assert_eq!(config.scanner.version, DEFAULT_TOOL_VERSION);
        assert_eq!(config.reports.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_scanner_fields() {
        let mut config = Config::default();
        config.scanner.version = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scanner.name = String::new();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scanner.installer_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension("nonexistent");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_valid_toml_config() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging]
level = "debug"
format = "json"

[scanner]
version = "v0.80.0"
cache_dir = "/var/cache/scangate"

[reports]
output_dir = "reports"
"#;
        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.scanner.name, "grype");
        assert_eq!(config.scanner.version, "v0.80.0");
        assert_eq!(config.scanner.cache_root(), PathBuf::from("/var/cache/scangate"));
        assert_eq!(config.reports.output_dir, PathBuf::from("reports"));
    }

    #[test]
    fn test_load_invalid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[logging\nlevel = \"debug\"\n").unwrap();
        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        std::env::set_var("SCANGATE_LOG_LEVEL", "debug");
        std::env::set_var("SCANGATE_LOG_FORMAT", "json");
        std::env::set_var("SCANGATE_SCANNER_VERSION", "v1.2.3");
        std::env::set_var("SCANGATE_CACHE_DIR", "/tmp/tool-cache");
        std::env::set_var("SCANGATE_OUTPUT_DIR", "/tmp/reports");

        let config = Config::default().apply_env_overrides();
        clear_env();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.scanner.version, "v1.2.3");
        assert_eq!(config.scanner.cache_dir, Some(PathBuf::from("/tmp/tool-cache")));
        assert_eq!(config.reports.output_dir, PathBuf::from("/tmp/reports"));
    }

    #[test]
    fn test_env_overrides_ignore_blank_values() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        std::env::set_var("SCANGATE_SCANNER_VERSION", "");
        std::env::set_var("SCANGATE_OUTPUT_DIR", "");

        let config = Config::default().apply_env_overrides();
        clear_env();

        assert_eq!(config.scanner.version, DEFAULT_TOOL_VERSION);
        assert_eq!(config.reports.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_default_cache_root_ends_with_tools() {
        let config = ScannerConfig::default();
        assert!(config.cache_root().ends_with("tools"));
        assert!(config.install_root().ends_with("install"));
    }

    #[test]
    fn test_config_path() {
        assert!(Config::config_path().ends_with("config.toml"));
    }

    #[test]
    fn test_config_validation_rejects_path_like_version() {
        for version in ["../x", "v1/../../etc", ".."] {
            let mut config = Config::default();
            config.scanner.version = version.to_string();
            assert!(config.validate().is_err(), "version {} should be rejected", version);
        }

        let mut config = Config::default();
        config.scanner.name = "bin/grype".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_log_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let mut config = Config::default();
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "Log level {} should be valid", level);
        }
    }
}
