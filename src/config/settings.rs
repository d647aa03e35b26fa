use crate::audit::RotationPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    DirectoryNotFound,

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    pub git: GitConfig,
    pub audit: AuditConfig,
    pub errors: ErrorConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GitConfig {
    /// Executable name or path, resolved through `PATH` when bare
    pub executable: String,
    /// Extra environment passed to every git invocation
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AuditConfig {
    pub log_commands: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
    /// Roll the log once it reaches this size
    #[serde(default = "default_rotate_bytes")]
    pub rotate_bytes: u64,
    /// Rolled logs kept next to the current one
    #[serde(default = "default_keep_rotated")]
    pub keep_rotated: usize,
}

fn default_rotate_bytes() -> u64 {
    RotationPolicy::default().max_bytes
}

fn default_keep_rotated() -> usize {
    RotationPolicy::default().keep
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ErrorConfig {
    /// Number of failures kept in the reporter history
    pub history_capacity: usize,
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let home = std::env::var("HOME").map_err(|_| ConfigError::DirectoryNotFound)?;
        Ok(PathBuf::from(home).join(".config").join("mrgit"))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location, falling back to defaults
    /// when no file has been written yet
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default_config());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        Ok(())
    }

    /// Create default configuration
    pub fn default_config() -> Self {
        Config {
            git: GitConfig {
                executable: "git".to_string(),
                env: BTreeMap::new(),
            },
            audit: AuditConfig {
                log_commands: false,
                log_path: None,
                rotate_bytes: default_rotate_bytes(),
                keep_rotated: default_keep_rotated(),
            },
            errors: ErrorConfig {
                history_capacity: 100,
            },
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        if self.git.executable.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "git.executable must not be empty".to_string(),
            ));
        }

        if let Some(key) = self.git.env.keys().find(|k| k.is_empty() || k.contains('=')) {
            return Err(ConfigError::InvalidValue(format!(
                "Invalid environment variable name: '{}'",
                key
            )));
        }

        if self.audit.rotate_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "audit.rotate_bytes must be greater than 0".to_string(),
            ));
        }

        if self.errors.history_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "history_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn audit_rotation(&self) -> RotationPolicy {
        RotationPolicy {
            max_bytes: self.audit.rotate_bytes,
            keep: self.audit.keep_rotated,
        }
    }

    /// Audit log location, explicit path first, then the config directory
    pub fn audit_log_path(&self) -> Option<PathBuf> {
        if !self.audit.log_commands {
            return None;
        }
        self.audit
            .log_path
            .clone()
            .or_else(|| Self::config_dir().ok().map(|dir| dir.join("history.log")))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default_config();
        assert_eq!(config.git.executable, "git");
        assert!(config.git.env.is_empty());
        assert!(!config.audit.log_commands);
        assert_eq!(config.errors.history_capacity, 100);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_executable() {
        let mut config = Config::default_config();
        config.git.executable = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_env_name() {
        let mut config = Config::default_config();
        config.git.env.insert("A=B".to_string(), "x".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_history() {
        let mut config = Config::default_config();
        config.errors.history_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_audit_log_path_disabled() {
        let config = Config::default_config();
        assert_eq!(config.audit_log_path(), None);
    }

    #[test]
    fn test_audit_log_path_explicit() {
        let mut config = Config::default_config();
        config.audit.log_commands = true;
        config.audit.log_path = Some(PathBuf::from("/tmp/mrgit.log"));
        assert_eq!(config.audit_log_path(), Some(PathBuf::from("/tmp/mrgit.log")));
    }

    #[test]
    fn test_audit_rotation_defaults_when_omitted() {
        let config: Config = toml::from_str(
            "[git]\nexecutable = \"git\"\n[audit]\nlog_commands = true\n[errors]\nhistory_capacity = 5\n",
        )
        .unwrap();
        assert_eq!(config.audit_rotation(), RotationPolicy::default());

        let mut config = config;
        config.audit.rotate_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default_config();
        config.git.executable = "/usr/bin/git".to_string();
        config
            .git
            .env
            .insert("GIT_CONFIG_NOSYSTEM".to_string(), "1".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "[git]\nexecutable = \"\"\n[audit]\nlog_commands = false\n[errors]\nhistory_capacity = 5\n",
        )
        .unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_serialize_deserialize() {
        let config = Config::default_config();
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();

        assert_eq!(config.git.executable, parsed.git.executable);
        assert_eq!(config.errors.history_capacity, parsed.errors.history_capacity);
    }
}
