//! Configuration structs with sensible defaults and RON persistence.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name of the persisted configuration.
pub const CONFIG_FILE: &str = "config.ron";

/// Platform config directory for the proxy, e.g. `~/.config/portal`.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("portal"))
}

/// Top-level proxy configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Where clients connect.
    pub listener: ListenerConfig,
    /// Backend servers clients can be sent to, in display order.
    pub servers: Vec<ServerEntry>,
    /// Name of the server new clients are sent to.
    pub default_server: String,
    /// Per-session settings.
    pub session: SessionConfig,
    /// Logging settings.
    pub log: LogConfig,
}

/// Client-facing listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Address to bind.
    pub bind_address: String,
    /// Port to bind.
    pub bind_port: u16,
    /// Maximum concurrent clients.
    pub max_clients: usize,
}

/// A named backend server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerEntry {
    /// Name used by operators and in logs.
    pub name: String,
    /// `host:port` to dial.
    pub address: String,
}

/// Per-session configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Messages buffered between an upstream reader and its session.
    pub incoming_capacity: usize,
    /// Delay before an injected end-of-stream ends the session, in ms.
    pub eof_linger_ms: u64,
    /// Payloads at least this large are LZ4-compressed. `None` disables
    /// compression.
    pub compression_threshold: Option<usize>,
    /// Directory for per-session packet traces. Tracing is off when unset.
    pub trace_dir: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (e.g., "debug", "info", "warn"). `RUST_LOG` wins over it.
    pub level: String,
}

// --- Default implementations ---

impl Default for Config {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            servers: vec![ServerEntry {
                name: "lobby".to_string(),
                address: "127.0.0.1:25566".to_string(),
            }],
            default_server: "lobby".to_string(),
            session: SessionConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            bind_port: 25565,
            max_clients: 1024,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            incoming_capacity: 256,
            eof_linger_ms: 1000,
            compression_threshold: Some(256),
            trace_dir: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ListenerConfig {
    /// `bind_address:bind_port`.
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }
}

impl SessionConfig {
    /// [`SessionConfig::eof_linger_ms`] as a duration.
    pub fn eof_linger(&self) -> Duration {
        Duration::from_millis(self.eof_linger_ms)
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let config = Self::read(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let new_config = Self::read(&config_dir.join(CONFIG_FILE))?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// Look up a backend server by name.
    pub fn server(&self, name: &str) -> Option<&ServerEntry> {
        self.servers.iter().find(|s| s.name == name)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for server in &self.servers {
            if !seen.insert(server.name.as_str()) {
                return Err(ConfigError::DuplicateServer(server.name.clone()));
            }
        }
        if self.server(&self.default_server).is_none() {
            return Err(ConfigError::UnknownDefaultServer(
                self.default_server.clone(),
            ));
        }
        Ok(())
    }

    fn read(config_path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(config_path).map_err(ConfigError::ReadError)?;
        let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("bind_port: 25565"));
        assert!(ron_str.contains("default_server: \"lobby\""));
        assert!(ron_str.contains("eof_linger_ms: 1000"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(listener: (bind_port: 30000))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.listener.bind_port, 30000);
        assert_eq!(config.listener.bind_address, "0.0.0.0");
        assert_eq!(config.session, SessionConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_unknown_default_server_rejected() {
        let config = Config {
            default_server: "hub".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownDefaultServer(name)) if name == "hub"
        ));
    }

    #[test]
    fn test_duplicate_server_rejected() {
        let mut config = Config::default();
        config.servers.push(config.servers[0].clone());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateServer(name)) if name == "lobby"
        ));
    }

    #[test]
    fn test_server_lookup() {
        let mut config = Config::default();
        config.servers.push(ServerEntry {
            name: "survival".to_string(),
            address: "10.0.0.2:25565".to_string(),
        });
        assert_eq!(
            config.server("survival").map(|s| s.address.as_str()),
            Some("10.0.0.2:25565")
        );
        assert!(config.server("creative").is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.listener.bind_port = 25570;
        config.session.trace_dir = Some(dir.path().join("traces"));

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "(default_server: \"nowhere\")",
        )
        .unwrap();
        assert!(matches!(
            Config::load_or_create(dir.path()),
            Err(ConfigError::UnknownDefaultServer(_))
        ));
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.session.eof_linger_ms = 250;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert_eq!(result.unwrap().session.eof_linger(), Duration::from_millis(250));
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        assert!(config.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }

    #[test]
    fn test_socket_address() {
        assert_eq!(ListenerConfig::default().socket_address(), "0.0.0.0:25565");
    }
}
