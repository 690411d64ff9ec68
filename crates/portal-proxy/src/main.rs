//! Portal: a game protocol proxy that can move connected players between
//! backend servers without disconnecting them.
//!
//! Run with: `cargo run -p portal-proxy -- --port 25565`

mod console;
mod listener;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use portal_config::{CliArgs, Config, default_config_dir};
use portal_net::{Message, MessageTag};
use portal_session::{HookError, PacketHooks};
use tokio::io::BufReader;
use tracing::{debug, error, info};

use crate::listener::Proxy;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(default_config_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut config = match Config::load_or_create(&config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("portal: {e}");
            return ExitCode::FAILURE;
        }
    };
    config.apply_cli_overrides(&args);
    if let Err(e) = config.validate() {
        eprintln!("portal: {e}");
        return ExitCode::FAILURE;
    }

    portal_log::init_logging(
        Some(&config_dir.join("logs")),
        cfg!(debug_assertions),
        Some(&config),
    );

    info!("Portal proxy");
    info!(
        "Listening on {} | default server: {} | {} server(s) configured",
        config.listener.socket_address(),
        config.default_server,
        config.servers.len(),
    );

    let config = Arc::new(config);
    let proxy = Arc::new(Proxy::new(Config::clone(&config)).with_hooks(world_hooks()));
    let sessions = proxy.sessions();

    tokio::spawn(console::run(
        BufReader::new(tokio::io::stdin()),
        Arc::clone(&config),
        Arc::clone(&sessions),
    ));

    let running = Arc::clone(&proxy);
    let server = tokio::spawn(async move { running.run().await });

    tokio::select! {
        result = server => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("Listener failed: {e}");
                    return ExitCode::FAILURE;
                }
                Err(e) => {
                    error!("Listener task failed: {e}");
                    return ExitCode::FAILURE;
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            proxy.shutdown();
        }
    }

    if !sessions.is_empty().await {
        info!("Kicking {} session(s)", sessions.len().await);
        sessions.kick_all("Proxy shutting down").await;
        // Same grace period an injected end-of-stream gets.
        tokio::time::sleep(config.session.eof_linger()).await;
    }
    info!("Portal stopped");
    ExitCode::SUCCESS
}

/// Hooks every session runs.
fn world_hooks() -> PacketHooks {
    let mut hooks = PacketHooks::new();
    hooks.register(
        MessageTag::JoinWorld,
        |msg: &Message| -> Result<(), HookError> {
            if let Message::JoinWorld(join) = msg {
                debug!(
                    dimension = %join.dimension_id,
                    game_mode = join.game_mode,
                    "client entering world"
                );
            }
            Ok(())
        },
    );
    hooks
}
