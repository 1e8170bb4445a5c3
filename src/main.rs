//! tidekv server binary.
//!
//! Parses flags, sets up logging, builds the shared keyspace, starts active
//! expiry and serves clients until Ctrl+C.

use clap::Parser;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tidekv::commands::CommandHandler;
use tidekv::connection::{handle_connection, ConnectionStats};
use tidekv::{Config, Keyspace};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn print_banner(config: &Config) {
    println!(
        r#"
  _   _     _       _
 | |_(_) __| | ___ | | ____   __
 | __| |/ _` |/ _ \| |/ /\ \ / /
 | |_| | (_| |  __/|   <  \ V /
  \__|_|\__,_|\___||_|\_\  \_/

tidekv v{} - in-memory data-structure server
──────────────────────────────────────────────
Listening on {}  (max keys: {})
Use Ctrl+C to shut down.
"#,
        tidekv::VERSION,
        config.bind_address(),
        config.max_keys,
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let keyspace = Arc::new(Keyspace::new(config.store_config(), config.expiry_config()));
    keyspace.start_expiry()?;
    info!(
        max_keys = config.max_keys,
        sweep_interval_ms = config.sweep_interval_ms,
        sweep_sample_size = config.sweep_sample_size,
        "keyspace ready"
    );

    let listener = TcpListener::bind(config.bind_address()).await?;
    print_banner(&config);
    info!(address = %config.bind_address(), "listening");

    let commands = CommandHandler::with_config(Arc::clone(&keyspace), &config);
    let stats = Arc::new(ConnectionStats::new());

    tokio::select! {
        _ = accept_loop(listener, commands, Arc::clone(&stats)) => {}
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => info!("shutdown signal received"),
                Err(err) => error!(error = %err, "failed to listen for Ctrl+C"),
            }
        }
    }

    keyspace.stop_expiry();
    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        "server stopped"
    );
    Ok(())
}

async fn accept_loop(listener: TcpListener, commands: CommandHandler, stats: Arc<ConnectionStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                if let Err(err) = stream.set_nodelay(true) {
                    error!(client = %addr, error = %err, "failed to set TCP_NODELAY");
                }
                tokio::spawn(handle_connection(
                    stream,
                    addr,
                    commands.clone(),
                    Arc::clone(&stats),
                ));
            }
            Err(err) => error!(error = %err, "failed to accept connection"),
        }
    }
}
