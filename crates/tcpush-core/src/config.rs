//! Configuration for the tcpush command-line front end
//!
//! The wire protocol has no settings. This file only supplies defaults for
//! the CLI flags. Configuration is loaded from:
//! - macOS: ~/Library/Application Support/com.tcpush.tcpush/config.toml
//! - Linux: ~/.config/tcpush/config.toml
//! - Windows: %APPDATA%/tcpush/tcpush/config/config.toml

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::{AllowAll, CredentialVerifier, StaticCredentials};
use crate::{CHUNK_SIZE, DEFAULT_DESTINATION, DEFAULT_PORT, LISTEN_BACKLOG};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sending side defaults
    pub sender: SenderConfig,
    /// Receiving side defaults
    pub receiver: ReceiverConfig,
    /// Optional credential gate in front of `send`
    pub auth: AuthConfig,
}

/// Sender configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Port to connect to when none is given
    pub port: u16,
    /// Bytes per read/write
    pub chunk_size: usize,
    /// Connect deadline in seconds (unset = block until the OS gives up)
    pub connect_timeout_secs: Option<u64>,
    /// Per-write deadline in seconds (unset = no deadline)
    pub write_timeout_secs: Option<u64>,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            chunk_size: CHUNK_SIZE,
            connect_timeout_secs: None,
            write_timeout_secs: None,
        }
    }
}

impl SenderConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        secs(self.connect_timeout_secs)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        secs(self.write_timeout_secs)
    }
}

/// Receiver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind address
    pub bind: IpAddr,
    /// Listen backlog
    pub backlog: i32,
    /// Destination file
    pub destination: PathBuf,
    /// Bytes per read/write
    pub chunk_size: usize,
    /// Per-read deadline in seconds (unset = wait for the peer indefinitely)
    pub read_timeout_secs: Option<u64>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            backlog: LISTEN_BACKLOG,
            destination: PathBuf::from(DEFAULT_DESTINATION),
            chunk_size: CHUNK_SIZE,
            read_timeout_secs: None,
        }
    }
}

impl ReceiverConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        secs(self.read_timeout_secs)
    }
}

/// Credential gate configuration.
///
/// With both fields set, `send` requires matching credentials. With neither,
/// sending is open. Anything in between is rejected by [`Config::validate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub user: Option<String>,
    pub password: Option<String>,
}

impl AuthConfig {
    pub fn is_enabled(&self) -> bool {
        self.user.is_some() && self.password.is_some()
    }

    /// Build the verifier this configuration describes
    pub fn verifier(&self) -> Box<dyn CredentialVerifier> {
        match (&self.user, &self.password) {
            (Some(user), Some(password)) => Box::new(StaticCredentials::new(user, password)),
            _ => Box::new(AllowAll),
        }
    }
}

/// Zero means "no deadline"
fn secs(value: Option<u64>) -> Option<Duration> {
    value.filter(|s| *s > 0).map(Duration::from_secs)
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path).unwrap_or_else(|e| {
                warn!("Failed to load config from {:?}: {}, using defaults", path, e);
                Self::default()
            }),
            None => {
                debug!("No config directory found, using defaults");
                Self::default()
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject values the transfer code can't use
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sender.chunk_size == 0 {
            return Err(ConfigError::Invalid("sender.chunk_size must be > 0".into()));
        }
        if self.receiver.chunk_size == 0 {
            return Err(ConfigError::Invalid("receiver.chunk_size must be > 0".into()));
        }
        if self.sender.port == 0 {
            return Err(ConfigError::Invalid("sender.port must be 1-65535".into()));
        }
        if self.receiver.backlog < 1 {
            return Err(ConfigError::Invalid("receiver.backlog must be >= 1".into()));
        }
        if self.auth.user.is_some() != self.auth.password.is_some() {
            return Err(ConfigError::Invalid(
                "auth.user and auth.password must be set together".into(),
            ));
        }
        Ok(())
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<(), ConfigError> {
        match Self::default_path() {
            Some(path) => self.save_to(&path),
            None => Err(ConfigError::NoConfigDir),
        }
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "tcpush", "tcpush")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Generate a sample configuration file content
    pub fn sample() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// I/O error
    Io(String),
    /// Parse error
    Parse(String),
    /// Serialization error
    Serialize(String),
    /// A value is out of range
    Invalid(String),
    /// No config directory available
    NoConfigDir,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Serialize(e) => write!(f, "Serialization error: {}", e),
            ConfigError::Invalid(e) => write!(f, "Invalid value: {}", e),
            ConfigError::NoConfigDir => write!(f, "No configuration directory available"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sender.port, 8080);
        assert_eq!(config.sender.chunk_size, 8192);
        assert_eq!(config.receiver.port, 8080);
        assert_eq!(config.receiver.backlog, 5);
        assert_eq!(config.receiver.destination, PathBuf::from("received_file.txt"));
        assert!(config.receiver.bind.is_unspecified());
        assert!(config.sender.connect_timeout().is_none());
        assert!(!config.auth.is_enabled());
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
            [receiver]
            port = 9000
            read_timeout_secs = 30
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.receiver.port, 9000);
        assert_eq!(config.receiver.read_timeout(), Some(Duration::from_secs(30)));
        // Other values should be defaults
        assert_eq!(config.sender.port, 8080);
        assert_eq!(config.receiver.chunk_size, 8192);
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let toml_str = r#"
            [sender]
            write_timeout_secs = 0
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.sender.write_timeout().is_none());
    }

    #[test]
    fn test_sample_config() {
        let sample = Config::sample();
        assert!(sample.contains("[sender]"));
        assert!(sample.contains("[receiver]"));
    }

    #[test]
    fn test_config_load_missing() {
        let config = Config::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.receiver.port, 8080);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.sender.chunk_size = 65536;
        config.auth.user = Some("admin".into());
        config.auth.password = Some("secret".into());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.sender.chunk_size, 65536);
        assert!(loaded.auth.is_enabled());
        assert!(loaded.auth.verifier().verify("admin", "secret"));
        assert!(!loaded.auth.verifier().verify("admin", "wrong"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, "[sender]\nchunk_size = 0\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Invalid(_))
        ));

        std::fs::write(&path, "[auth]\nuser = \"admin\"\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Invalid(_))
        ));

        std::fs::write(&path, "[receiver\nport = ").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_no_auth_allows_everyone() {
        let config = Config::default();
        assert!(config.auth.verifier().verify("anyone", "anything"));
    }
}
