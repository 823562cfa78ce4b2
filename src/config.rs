//! Configuration for tosdb
//!
//! Centralized configuration with sensible defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{Result, TosError};

/// Main configuration for a tosdb server instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Catalog Configuration
    // -------------------------------------------------------------------------
    /// Root directory of the catalog
    /// Internal structure:
    ///   {data_dir}/
    ///     └── {database}/
    ///           └── {table}.tbl      (table file holding its schema)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Deadline for receiving one complete command (milliseconds, 0 disables)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 disables)
    pub write_timeout_ms: u64,

    /// Wire format spoken on the listener
    pub wire_format: WireFormat,
}

/// Wire format of a listener
///
/// A listener speaks exactly one format; the two are never mixed on one socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    /// Newline-terminated text commands with a prompt (canonical)
    #[default]
    Text,

    /// Fixed-header binary frames
    Binary,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            listen_addr: "0.0.0.0:8080".to_string(),
            max_connections: 10,
            read_timeout_ms: 300_000, // 5 minutes
            write_timeout_ms: 5000,
            wire_format: WireFormat::Text,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the configuration for values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(TosError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }

        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(TosError::Config(format!(
                "invalid listen address '{}' (expected host:port)",
                self.listen_addr
            )));
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (catalog root)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the wire format
    pub fn wire_format(mut self, format: WireFormat) -> Self {
        self.config.wire_format = format;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
