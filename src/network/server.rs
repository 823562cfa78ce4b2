//! TCP Server
//!
//! Accepts connections and dispatches them to worker threads.
//!
//! ## Lifecycle
//! 1. `bind()` opens the listener (non-blocking, so shutdown can be observed)
//! 2. `run()` accepts until a `ShutdownHandle` fires
//! 3. On shutdown: stop accepting, shut down every open client socket, join
//!    all workers, return; the listener is released when the server drops

use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::catalog::Catalog;
use crate::config::{Config, WireFormat};
use crate::error::{Result, TosError};
use crate::protocol::{self, Response};

use super::connection::Connection;
use super::limiter::{ConnectionLimiter, ConnectionPermit};

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Cloneable trigger for a graceful shutdown
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Ask the server to stop; safe to call from any thread, any number of times
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// TCP server for tosdb
pub struct Server {
    config: Config,
    catalog: Arc<Catalog>,
    listener: TcpListener,
    limiter: Arc<ConnectionLimiter>,
    shutdown: ShutdownHandle,

    /// Socket handles of live connections, used to close them on shutdown
    open_streams: Arc<Mutex<HashMap<u64, TcpStream>>>,

    /// Worker threads that have not been joined yet
    workers: HashMap<u64, JoinHandle<()>>,

    /// Workers report their id here when they finish
    finished_tx: Sender<u64>,
    finished_rx: Receiver<u64>,

    next_id: AtomicU64,
}

impl Server {
    /// Bind the listener described by `config`
    pub fn bind(config: Config, catalog: Arc<Catalog>) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(&config.listen_addr)?;
        listener.set_nonblocking(true)?;

        let (finished_tx, finished_rx) = unbounded();

        Ok(Self {
            limiter: ConnectionLimiter::new(config.max_connections),
            config,
            catalog,
            listener,
            shutdown: ShutdownHandle::default(),
            open_streams: Arc::new(Mutex::new(HashMap::new())),
            workers: HashMap::new(),
            finished_tx,
            finished_rx,
            next_id: AtomicU64::new(1),
        })
    }

    /// Address the listener is bound to (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle that stops `run()` from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.limiter.active()
    }

    /// Start the server (blocking until shutdown)
    pub fn run(&mut self) -> Result<()> {
        tracing::info!(
            "Listening on {} ({:?} protocol, max {} connections)",
            self.local_addr()?,
            self.config.wire_format,
            self.config.max_connections
        );

        while !self.shutdown.is_shutdown() {
            match self.listener.accept() {
                Ok((stream, peer)) => self.accept(stream, peer),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    self.reap_finished();
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    // A failed accept only affects that one connection
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        self.drain();
        Ok(())
    }

    /// Hand an accepted stream to a new worker, or refuse it when full
    fn accept(&mut self, stream: TcpStream, peer: SocketAddr) {
        let Some(permit) = self.limiter.try_acquire() else {
            tracing::warn!(
                "Rejecting {}: {} connections already open",
                peer,
                self.limiter.max()
            );
            reject(stream, self.limiter.max(), self.config.wire_format);
            return;
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::info!("New client connected from {} (session {})", peer, id);

        if let Err(e) = self.spawn_worker(id, stream, permit) {
            tracing::warn!("Failed to start session {} for {}: {}", id, peer, e);
            self.open_streams.lock().remove(&id);
        }
    }

    fn spawn_worker(&mut self, id: u64, stream: TcpStream, permit: ConnectionPermit) -> Result<()> {
        // Accepted sockets may inherit non-blocking mode from the listener
        stream.set_nonblocking(false)?;
        self.open_streams.lock().insert(id, stream.try_clone()?);

        let mut connection = Connection::new(
            stream,
            Arc::clone(&self.catalog),
            id,
            self.config.wire_format,
        )?;
        connection.set_timeouts(self.config.read_timeout_ms, self.config.write_timeout_ms)?;

        let open_streams = Arc::clone(&self.open_streams);
        let finished_tx = self.finished_tx.clone();

        let handle = thread::Builder::new()
            .name(format!("tosdb-session-{}", id))
            .spawn(move || {
                let _permit = permit;

                if let Err(e) = connection.handle() {
                    tracing::warn!("Session {} ({}) failed: {}", id, connection.peer_addr(), e);
                }
                tracing::info!("Client disconnected: {} (session {})", connection.peer_addr(), id);

                open_streams.lock().remove(&id);
                let _ = finished_tx.send(id);
            })?;

        self.workers.insert(id, handle);
        Ok(())
    }

    /// Join workers that have already finished
    fn reap_finished(&mut self) {
        for id in self.finished_rx.try_iter() {
            if let Some(handle) = self.workers.remove(&id) {
                if handle.join().is_err() {
                    tracing::error!("Session {} worker panicked", id);
                }
            }
        }
    }

    /// Close every open session and wait for its worker
    fn drain(&mut self) {
        let open: Vec<(u64, TcpStream)> = self.open_streams.lock().drain().collect();
        tracing::info!("Shutting down: closing {} open connection(s)", open.len());

        for (id, stream) in open {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                tracing::debug!("Session {} socket already closed: {}", id, e);
            }
        }

        for (id, handle) in self.workers.drain() {
            if handle.join().is_err() {
                tracing::error!("Session {} worker panicked", id);
            }
        }
        // Drop the completion notices of the workers joined above
        self.finished_rx.try_iter().for_each(drop);

        tracing::info!("All sessions closed");
    }
}

/// Tell an over-limit client why it is being dropped
fn reject(mut stream: TcpStream, max: usize, wire_format: WireFormat) {
    let _ = stream.set_nonblocking(false);
    let response = Response::error(format!("Server busy ({} connections max)", max));

    let _ = match wire_format {
        WireFormat::Text => stream.write_all(response.render_text().as_bytes()).map_err(TosError::from),
        WireFormat::Binary => protocol::write_response(&mut stream, &response),
    };
    let _ = stream.shutdown(Shutdown::Both);
}
