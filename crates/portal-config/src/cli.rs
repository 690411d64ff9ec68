//! Command-line argument parsing for the proxy.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Proxy command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "portal", about = "Game protocol proxy")]
pub struct CliArgs {
    /// Address to accept clients on.
    #[arg(long)]
    pub bind: Option<String>,

    /// Port to accept clients on.
    #[arg(long)]
    pub port: Option<u16>,

    /// Server new clients are sent to.
    #[arg(long)]
    pub default_server: Option<String>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Write per-session packet traces into this directory.
    #[arg(long)]
    pub trace_dir: Option<PathBuf>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref addr) = args.bind {
            self.listener.bind_address = addr.clone();
        }
        if let Some(port) = args.port {
            self.listener.bind_port = port;
        }
        if let Some(ref name) = args.default_server {
            self.default_server = name.clone();
        }
        if let Some(ref level) = args.log_level {
            self.log.level = level.clone();
        }
        if let Some(ref dir) = args.trace_dir {
            self.session.trace_dir = Some(dir.clone());
        }
    }
}
