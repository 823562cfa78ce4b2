//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::catalog::Catalog;
use crate::config::WireFormat;
use crate::error::{Result, TosError};
use crate::protocol::{
    self, parse_line, read_line, write_text_response, LineRead, Response, MAX_COMMAND_LENGTH,
    PROMPT, WELCOME_MESSAGE,
};
use crate::session::Session;

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered, with a per-command deadline)
    reader: BufReader<DeadlineStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Shared catalog
    catalog: Arc<Catalog>,

    /// Per-connection state
    session: Session,

    /// Format spoken on this connection
    wire_format: WireFormat,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O and a fresh session
    pub fn new(
        stream: TcpStream,
        catalog: Arc<Catalog>,
        id: u64,
        wire_format: WireFormat,
    ) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(DeadlineStream::new(read_stream)),
            writer: BufWriter::new(write_stream),
            catalog,
            session: Session::new(id),
            wire_format,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 disables)
    ///
    /// `read_ms` bounds how long a client may take to deliver one complete
    /// command, counted from when the server starts waiting for it.
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        let write_stream = self.writer.get_ref();

        self.reader.get_mut().limit = (read_ms > 0).then(|| Duration::from_millis(read_ms));
        if write_ms > 0 {
            write_stream.set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }

        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Returns `Ok` when the client disconnects, exits or times out; `Err`
    /// only for unexpected transport failures.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!(
            "Session {} established from {}",
            self.session.id(),
            self.peer_addr
        );

        let result = match self.wire_format {
            WireFormat::Text => self.serve_text(),
            WireFormat::Binary => self.serve_binary(),
        };

        match result {
            Err(TosError::Io(ref e)) if is_disconnect(e) => {
                tracing::debug!("Client {} went away: {}", self.peer_addr, e);
                Ok(())
            }
            Err(TosError::Io(ref e)) if is_timeout(e) => {
                tracing::info!("Closing idle connection from {}", self.peer_addr);
                Ok(())
            }
            other => other,
        }
    }

    /// Text protocol loop: welcome, then read/dispatch/write until done
    fn serve_text(&mut self) -> Result<()> {
        self.writer.write_all(WELCOME_MESSAGE.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.write_all(PROMPT.as_bytes())?;
        self.writer.flush()?;

        loop {
            // Read next command
            self.reader.get_mut().start_command();
            let command = match read_line(&mut self.reader, MAX_COMMAND_LENGTH) {
                Ok(LineRead::Eof) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Ok(LineRead::TooLong(len)) => Err(TosError::CommandTooLong {
                    len,
                    max: MAX_COMMAND_LENGTH,
                }),
                Ok(LineRead::Line(line)) => parse_line(&line),
                Err(e @ TosError::Io(_)) => return Err(e),
                Err(e) => Err(e),
            };

            let (response, disconnect) = match command {
                Ok(command) => {
                    let disconnect = command.is_disconnect();
                    (self.dispatch(command), disconnect)
                }
                Err(e) => (Response::from_error(&e), false),
            };

            if disconnect {
                write_text_response(&mut self.writer, &response, None)?;
                self.close();
                tracing::debug!("Client {} exited", self.peer_addr);
                return Ok(());
            }

            write_text_response(&mut self.writer, &response, Some(PROMPT))?;
        }
    }

    /// Binary protocol loop: one response frame per command frame
    fn serve_binary(&mut self) -> Result<()> {
        loop {
            self.reader.get_mut().start_command();
            let response = match protocol::read_command(&mut self.reader) {
                Ok(command) => self.dispatch(command),
                Err(TosError::Io(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(e @ TosError::Io(_)) => return Err(e),
                Err(e) => Response::from_error(&e),
            };

            if let Err(e) = protocol::write_response(&mut self.writer, &response) {
                match e {
                    TosError::Io(_) => return Err(e),
                    // Payload did not fit a frame; report that instead
                    other => {
                        protocol::write_response(&mut self.writer, &Response::from_error(&other))?
                    }
                }
            }
        }
    }

    fn dispatch(&mut self, command: protocol::Command) -> Response {
        tracing::trace!("Received command from {}: {:?}", self.peer_addr, command);
        self.session.dispatch(&self.catalog, command)
    }

    /// Shut down both directions of the socket
    fn close(&mut self) {
        let _ = self.writer.flush();
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Get the session
    pub fn session(&self) -> &Session {
        &self.session
    }
}

/// Read half of a connection that fails with `TimedOut` once the deadline
/// for the current command has passed
struct DeadlineStream {
    stream: TcpStream,
    limit: Option<Duration>,
    deadline: Option<Instant>,
}

impl DeadlineStream {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            limit: None,
            deadline: None,
        }
    }

    /// Start the clock for the next command
    fn start_command(&mut self) {
        self.deadline = self.limit.and_then(|limit| Instant::now().checked_add(limit));
    }
}

impl Read for DeadlineStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(deadline) = self.deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "command not received in time",
                ));
            }
            self.stream.set_read_timeout(Some(remaining))?;
        }
        self.stream.read(buf)
    }
}

/// Errors that mean the peer is gone rather than a server fault
fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
    )
}

/// Read timeout (Windows reports TimedOut instead of WouldBlock)
fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
