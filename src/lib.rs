//! # tosdb
//!
//! A networked front-end to a file-backed database catalog:
//! - Databases are directories, tables are files, each table file holds its checksummed schema
//! - Line-oriented text protocol (optional binary framing per listener)
//! - One worker thread and one session per connection, bounded concurrency
//! - Supervised shutdown
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │           (accept loop + connection permits)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ one thread per connection
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   Connection                                 │
//! │        (line framing, parser, write response + prompt)       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Session                                   │
//! │    (NoDatabaseSelected | DatabaseSelected(db), dispatch)     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ shared, stateless
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Catalog                                   │
//! │        ({root}/{db}/{table}.tbl holding the schema)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod catalog;
pub mod client;
pub mod network;
pub mod protocol;
pub mod session;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use catalog::Catalog;
pub use client::Client;
pub use config::{Config, WireFormat};
pub use error::{Result, TosError};
pub use network::{Server, ShutdownHandle};
pub use session::{Session, SessionState};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tosdb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
