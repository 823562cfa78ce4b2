//! tosdb Server Binary
//!
//! Starts the TCP server for tosdb.

use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tosdb::{Catalog, Config, Server, WireFormat};
use tracing_subscriber::{fmt, EnvFilter};

/// tosdb Server
#[derive(Parser, Debug)]
#[command(name = "tosdb-server")]
#[command(about = "Networked file-backed database catalog")]
#[command(version)]
struct Args {
    /// Catalog root directory
    #[arg(short, long, default_value = "./data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "10")]
    max_connections: usize,

    /// Seconds a client may stay idle before it is disconnected (0 disables)
    #[arg(short = 't', long, default_value = "300")]
    read_timeout_secs: u64,

    /// Wire format spoken on the listener
    #[arg(short, long, value_enum, default_value_t = WireArg::Text)]
    wire_format: WireArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WireArg {
    Text,
    Binary,
}

impl From<WireArg> for WireFormat {
    fn from(arg: WireArg) -> Self {
        match arg {
            WireArg::Text => WireFormat::Text,
            WireArg::Binary => WireFormat::Binary,
        }
    }
}

/// Map command-line arguments onto the server config
fn build_config(args: &Args) -> Config {
    Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .read_timeout_ms(args.read_timeout_secs.saturating_mul(1000))
        .wire_format(args.wire_format.into())
        .build()
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tosdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("tosdb Server v{}", tosdb::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    let config = build_config(&args);

    // Open catalog
    let catalog = match Catalog::open(&config.data_dir) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!("Failed to open catalog: {}", e);
            std::process::exit(1);
        }
    };

    let mut server = match Server::bind(config, catalog) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    // Ctrl+C only flips the shutdown flag; the accept loop does the cleanup
    let shutdown = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received shutdown signal, initiating shutdown...");
        shutdown.shutdown();
    }) {
        tracing::warn!("Could not install signal handler: {}", e);
    }

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
