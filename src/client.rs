//! Text protocol client
//!
//! Blocking client used by `tosdb-cli` and the integration tests.
//!
//! The server ends every response with the prompt, so a response is read by
//! collecting bytes until the buffer ends with [`PROMPT`]. After `exit` no
//! prompt follows and the response runs until the server closes the socket.

use std::io::{BufReader, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{Result, TosError};
use crate::protocol::{write_line, DEFAULT_PORT, PROMPT};

/// Connection to a tosdb server speaking the text protocol
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    greeting: String,
}

impl Client {
    /// Connect and consume the greeting
    ///
    /// `addr` may omit the port, in which case 8080 is used.
    pub fn connect(addr: &str) -> Result<Self> {
        let addr = resolve_addr(addr)?;
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;

        let mut client = Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: stream,
            greeting: String::new(),
        };

        let (greeting, prompted) = client.read_until_prompt()?;
        if !prompted {
            // Busy servers send an error line and hang up instead of a prompt
            return Err(TosError::Network(format!(
                "server refused the connection: {}",
                greeting.trim_end()
            )));
        }
        client.greeting = greeting;

        Ok(client)
    }

    /// Text the server sent before the first prompt
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Bound how long a single response may take
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }

    /// Send one command line and return the response text (prompt stripped)
    pub fn execute(&mut self, line: &str) -> Result<String> {
        write_line(&mut self.writer, line)?;
        match self.read_until_prompt()? {
            (text, _) if !text.is_empty() => Ok(text),
            _ => Err(TosError::Network("server closed the connection".to_string())),
        }
    }

    /// Send `exit` and return the parting message
    pub fn exit(mut self) -> Result<String> {
        write_line(&mut self.writer, "exit")?;

        let mut rest = String::new();
        self.reader.read_to_string(&mut rest)?;
        Ok(rest)
    }

    /// Read until the prompt or EOF; the flag tells whether the prompt arrived
    fn read_until_prompt(&mut self) -> Result<(String, bool)> {
        let prompt = PROMPT.as_bytes();
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];

        while !buf.ends_with(prompt) {
            if self.reader.read(&mut byte)? == 0 {
                break;
            }
            buf.push(byte[0]);
        }

        let prompted = buf.ends_with(prompt);
        if prompted {
            buf.truncate(buf.len() - prompt.len());
        }

        let text = String::from_utf8(buf)
            .map_err(|e| TosError::Protocol(format!("response is not UTF-8: {}", e)))?;
        Ok((text, prompted))
    }
}

/// Resolve `host` or `host:port`, defaulting the port to 8080
pub fn resolve_addr(addr: &str) -> Result<SocketAddr> {
    let with_port = if addr.parse::<SocketAddr>().is_ok() || addr.contains(':') {
        addr.to_string()
    } else {
        format!("{}:{}", addr, DEFAULT_PORT)
    };

    with_port
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| TosError::Network(format!("could not resolve '{}'", addr)))
}
