//! Binary protocol codec
//!
//! Encoding and decoding functions for the binary wire format.
//!
//! ## Wire Format
//!
//! ### Request (Command) Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Type (1) │ Len (2)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//! Length is big-endian.
//!
//! ### Payload by Command Type
//! - MAKE_DB (0x01):     database name (UTF-8)
//! - MAKE_TABLE (0x02):  table name (64, NUL-padded) + column count (1) + column records
//! - OPEN_DB (0x03):     database name
//! - SHOW_STRUCT (0x04): table name
//! - SHOW_ALL_DB (0x05): empty
//! - SHOW_TABLES (0x06): empty
//!
//! ### Column Record
//! ```text
//! ┌──────────────────────┬──────────┬──────────┐
//! │ Name (32, NUL-padded)│ Type (1) │ Len (2)  │
//! └──────────────────────┴──────────┴──────────┘
//! ```
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (2)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//! SHOW_STRUCT success payloads are column records, list payloads are
//! newline-separated names, everything else is a UTF-8 message.

use std::io::{self, Read, Write};

use bytes::{Buf, BufMut, BytesMut};

use crate::catalog::{Column, ColumnType, MAX_COLUMNS, MAX_COLUMN_NAME, MAX_TABLE_NAME};
use crate::error::{Result, TosError};

use super::{Body, Command, CommandType, Response, Status};

/// Header size: 1 byte type/status + 2 bytes length
pub const HEADER_SIZE: usize = 3;

/// Maximum accepted command payload
pub const MAX_FRAME_PAYLOAD: usize = 1024;

/// Size of one column record
pub const COLUMN_RECORD_SIZE: usize = MAX_COLUMN_NAME + 1 + 2;

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Only commands with a binary type can be encoded.
pub fn encode_command(command: &Command) -> Result<Vec<u8>> {
    let cmd_type = command.command_type().ok_or_else(|| {
        TosError::Protocol(format!("{:?} has no binary encoding", command))
    })?;

    let mut payload = BytesMut::new();
    match command {
        Command::CreateDatabase { name } | Command::SelectDatabase { name } => {
            payload.put_slice(name.as_bytes());
        }
        Command::ShowStructure { table } => {
            payload.put_slice(table.as_bytes());
        }
        Command::CreateTable { name, columns } => {
            put_padded(&mut payload, name, MAX_TABLE_NAME)?;
            if columns.len() > MAX_COLUMNS {
                return Err(TosError::Protocol(format!(
                    "too many columns: {} (max {})",
                    columns.len(),
                    MAX_COLUMNS
                )));
            }
            payload.put_u8(columns.len() as u8);
            put_columns(&mut payload, columns)?;
        }
        _ => {}
    }

    frame(cmd_type as u8, &payload)
}

/// Decode a command from bytes (header + payload)
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (cmd_type, payload) = split_frame(bytes)?;
    Ok(decode_command_payload(cmd_type, payload))
}

/// Interpret a command payload
///
/// Never fails: a payload that does not fit its type becomes
/// `Command::Malformed` so the session can answer it.
pub fn decode_command_payload(cmd_type: u8, payload: &[u8]) -> Command {
    let Some(cmd_type) = CommandType::from_code(cmd_type) else {
        return Command::malformed(format!("unknown command type 0x{:02x}", cmd_type));
    };

    let result = match cmd_type {
        CommandType::MakeDb => utf8(payload, "database name")
            .map(|name| Command::CreateDatabase { name }),
        CommandType::OpenDb => utf8(payload, "database name")
            .map(|name| Command::SelectDatabase { name }),
        CommandType::ShowStruct => utf8(payload, "table name")
            .map(|table| Command::ShowStructure { table }),
        CommandType::ShowAllDb => expect_empty(payload).map(|_| Command::ListDatabases),
        CommandType::ShowTables => expect_empty(payload).map(|_| Command::ListTables),
        CommandType::MakeTable => decode_make_table(payload),
    };

    result.unwrap_or_else(|e| match e {
        TosError::Malformed(reason) => Command::Malformed { reason },
        other => Command::malformed(other.to_string()),
    })
}

fn decode_make_table(mut payload: &[u8]) -> Result<Command> {
    if payload.len() < MAX_TABLE_NAME + 1 {
        return Err(TosError::Malformed(format!(
            "MAKE_TABLE payload too short: {} bytes",
            payload.len()
        )));
    }

    let name = get_padded(&mut payload, MAX_TABLE_NAME, "table name")?;
    let count = payload.get_u8() as usize;

    if count > MAX_COLUMNS {
        return Err(TosError::Malformed(format!(
            "too many columns: {} (max {})",
            count, MAX_COLUMNS
        )));
    }
    if payload.len() != count * COLUMN_RECORD_SIZE {
        return Err(TosError::Malformed(format!(
            "MAKE_TABLE: expected {} column bytes, got {}",
            count * COLUMN_RECORD_SIZE,
            payload.len()
        )));
    }

    let columns = decode_columns(payload)?;
    Ok(Command::CreateTable { name, columns })
}

// =============================================================================
// Column Records
// =============================================================================

/// Encode columns as consecutive fixed-size records
pub fn encode_columns(columns: &[Column]) -> Result<Vec<u8>> {
    let mut buf = BytesMut::with_capacity(columns.len() * COLUMN_RECORD_SIZE);
    put_columns(&mut buf, columns)?;
    Ok(buf.to_vec())
}

/// Decode consecutive column records
pub fn decode_columns(mut bytes: &[u8]) -> Result<Vec<Column>> {
    if bytes.len() % COLUMN_RECORD_SIZE != 0 {
        return Err(TosError::Malformed(format!(
            "column data of {} bytes is not a multiple of {}",
            bytes.len(),
            COLUMN_RECORD_SIZE
        )));
    }

    let mut columns = Vec::with_capacity(bytes.len() / COLUMN_RECORD_SIZE);
    while bytes.has_remaining() {
        let name = get_padded(&mut bytes, MAX_COLUMN_NAME, "column name")?;
        let code = bytes.get_u8();
        let length = bytes.get_u16();

        let col_type = ColumnType::from_code(code).ok_or_else(|| {
            TosError::Malformed(format!("column '{}': unknown type code {}", name, code))
        })?;

        columns.push(Column {
            name,
            col_type,
            length,
        });
    }

    Ok(columns)
}

fn put_columns(buf: &mut BytesMut, columns: &[Column]) -> Result<()> {
    for column in columns {
        put_padded(buf, &column.name, MAX_COLUMN_NAME)?;
        buf.put_u8(column.col_type as u8);
        buf.put_u16(column.length);
    }
    Ok(())
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// A decoded response frame
///
/// The payload is kept raw; its shape depends on the command it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub status: Status,
    pub payload: Vec<u8>,
}

impl ResponseFrame {
    pub fn is_ok(&self) -> bool {
        self.status == Status::Success
    }

    /// Payload as a UTF-8 message
    pub fn message(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Payload as a list of names
    pub fn names(&self) -> Vec<String> {
        self.message()
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Payload as column records (SHOW_STRUCT)
    pub fn columns(&self) -> Result<Vec<Column>> {
        decode_columns(&self.payload)
    }
}

/// Encode a response to bytes
///
/// Format: status (1) + payload_len (2) + payload
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    let payload = match &response.body {
        Body::Message(message) => message.as_bytes().to_vec(),
        Body::List { items, .. } => items.join("\n").into_bytes(),
        Body::Structure { columns, .. } => encode_columns(columns)?,
    };

    frame(response.status as u8, &payload)
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<ResponseFrame> {
    let (status_byte, payload) = split_frame(bytes)?;

    let status = match status_byte {
        0x00 => Status::Success,
        0x01 => Status::Error,
        _ => {
            return Err(TosError::Protocol(format!(
                "Unknown response status: 0x{:02x}",
                status_byte
            )))
        }
    };

    Ok(ResponseFrame {
        status,
        payload: payload.to_vec(),
    })
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete command from a stream
///
/// Blocks until a complete frame is received. An oversized payload is drained
/// and reported as `CommandTooLong`, leaving the stream at the next frame.
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    let (cmd_type, payload) = read_frame(reader, MAX_FRAME_PAYLOAD)?;
    Ok(decode_command_payload(cmd_type, &payload))
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let bytes = encode_command(command)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<ResponseFrame> {
    let (status, payload) = read_frame(reader, u16::MAX as usize)?;

    let mut full_message = Vec::with_capacity(HEADER_SIZE + payload.len());
    full_message.push(status);
    full_message.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    full_message.extend_from_slice(&payload);

    decode_response(&full_message)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

fn read_frame<R: Read>(reader: &mut R, max_payload: usize) -> Result<(u8, Vec<u8>)> {
    // Read header first
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let frame_type = header[0];
    let payload_len = u16::from_be_bytes([header[1], header[2]]) as usize;

    if payload_len > max_payload {
        // Skip the payload so the next frame starts cleanly
        io::copy(&mut reader.by_ref().take(payload_len as u64), &mut io::sink())?;
        return Err(TosError::CommandTooLong {
            len: payload_len,
            max: max_payload,
        });
    }

    let mut payload = vec![0u8; payload_len];
    if payload_len > 0 {
        reader.read_exact(&mut payload)?;
    }

    Ok((frame_type, payload))
}

// =============================================================================
// Helpers
// =============================================================================

fn frame(frame_type: u8, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > u16::MAX as usize {
        return Err(TosError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload.len(),
            u16::MAX
        )));
    }

    let mut message = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    message.put_u8(frame_type);
    message.put_u16(payload.len() as u16);
    message.put_slice(payload);
    Ok(message.to_vec())
}

fn split_frame(bytes: &[u8]) -> Result<(u8, &[u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(TosError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let payload_len = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;
    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(TosError::Protocol(format!(
            "Incomplete payload: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    Ok((bytes[0], &bytes[HEADER_SIZE..total_len]))
}

fn put_padded(buf: &mut BytesMut, value: &str, width: usize) -> Result<()> {
    let bytes = value.as_bytes();
    if bytes.len() > width {
        return Err(TosError::Protocol(format!(
            "'{}' does not fit in {} bytes",
            value, width
        )));
    }
    buf.put_slice(bytes);
    buf.put_bytes(0, width - bytes.len());
    Ok(())
}

fn get_padded(buf: &mut &[u8], width: usize, what: &str) -> Result<String> {
    let field = &buf[..width];
    let end = field.iter().position(|&b| b == 0).unwrap_or(width);
    let value = utf8(&field[..end], what)?;
    buf.advance(width);
    Ok(value)
}

fn utf8(bytes: &[u8], what: &str) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| TosError::Malformed(format!("{} is not valid UTF-8", what)))
}

fn expect_empty(payload: &[u8]) -> Result<()> {
    if payload.is_empty() {
        Ok(())
    } else {
        Err(TosError::Malformed(format!(
            "unexpected payload of {} bytes",
            payload.len()
        )))
    }
}
