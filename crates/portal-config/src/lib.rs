//! Configuration for the proxy.
//!
//! Settings persist to disk as RON in the platform config directory. Any
//! field may be omitted from the file; missing fields take their defaults.
//! Command-line flags override what was loaded.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CONFIG_FILE, Config, ListenerConfig, LogConfig, ServerEntry, SessionConfig, default_config_dir,
};
pub use error::ConfigError;
