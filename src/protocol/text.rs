//! Text framing
//!
//! Line-oriented framing for the canonical text protocol.
//!
//! ```text
//! server: Connected to TOS Database Server\n
//! server: TOS>
//! client: make db alpha\n
//! server: Database 'alpha' created successfully\n
//! server: TOS>
//! ```

use std::io::{BufRead, Write};

use crate::error::{Result, TosError};

use super::Response;

/// Outcome of reading one line
#[derive(Debug, PartialEq, Eq)]
pub enum LineRead {
    /// A complete line, terminator stripped
    Line(String),

    /// A line longer than the limit; it was consumed up to its terminator
    TooLong(usize),

    /// The peer closed the connection before sending anything
    Eof,
}

/// Read one `\n`-terminated line of at most `max_len` bytes.
///
/// A trailing `\r` is stripped. Bytes of an overlong line are drained without
/// being buffered, so a client cannot grow server memory by omitting newlines.
/// A final line without terminator at EOF is returned as a line.
pub fn read_line<R: BufRead>(reader: &mut R, max_len: usize) -> Result<LineRead> {
    let mut line = Vec::new();
    let mut total = 0usize;
    let mut saw_any = false;

    loop {
        let available = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        if available.is_empty() {
            if !saw_any {
                return Ok(LineRead::Eof);
            }
            break;
        }
        saw_any = true;

        let (chunk, found_newline) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (&available[..pos], true),
            None => (available, false),
        };

        total += chunk.len();
        // Keep one extra byte for a possible '\r'
        if total <= max_len + 1 {
            line.extend_from_slice(chunk);
        }

        let consumed = chunk.len() + usize::from(found_newline);
        reader.consume(consumed);

        if found_newline {
            break;
        }
    }

    let stripped_len = if line.last() == Some(&b'\r') && total <= max_len + 1 {
        line.pop();
        total - 1
    } else {
        total
    };

    if stripped_len > max_len {
        return Ok(LineRead::TooLong(stripped_len));
    }

    String::from_utf8(line)
        .map(LineRead::Line)
        .map_err(|_| TosError::Malformed("command is not valid UTF-8".to_string()))
}

/// Write a response, followed by the prompt unless `prompt` is `None`
pub fn write_text_response<W: Write>(writer: &mut W, response: &Response, prompt: Option<&str>) -> Result<()> {
    writer.write_all(response.render_text().as_bytes())?;
    if let Some(prompt) = prompt {
        writer.write_all(prompt.as_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a command line
pub fn write_line<W: Write>(writer: &mut W, line: &str) -> Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
