//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single non-blocking acceptor loop
//! - One worker thread per connection, bounded by connection permits
//! - Each worker owns its `Session`; only the catalog is shared

mod connection;
mod limiter;
mod server;

pub use connection::Connection;
pub use limiter::{ConnectionLimiter, ConnectionPermit};
pub use server::{Server, ShutdownHandle};
