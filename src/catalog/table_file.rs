//! Table files
//!
//! A table is a single file `<table>.tbl` whose content is its schema. The
//! file only ever appears complete: it is written under a temporary name in
//! the database directory, synced, and then linked into place without
//! replacing an existing table.
//!
//! ## File Format
//! ```text
//! ┌──────────┬──────────┬────────────┬──────────────────────┬──────────┐
//! │Magic (4) │Version(2)│ BodyLen(4) │ Body (bincode schema)│ CRC32(4) │
//! └──────────┴──────────┴────────────┴──────────────────────┴──────────┘
//! ```
//! All integers little-endian; the CRC covers the body only.

use std::fs;
use std::io::Write;
use std::path::Path;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, TosError};

use super::schema::TableSchema;

/// Magic bytes identifying a table file
pub const MAGIC: &[u8; 4] = b"TSCH";

/// Table file format version
pub const VERSION: u16 = 1;

/// Magic (4) + Version (2) + BodyLen (4)
const HEADER_SIZE: usize = 10;

/// CRC32 trailer
const FOOTER_SIZE: usize = 4;

/// Serialize a schema into table file bytes
pub fn encode(schema: &TableSchema) -> Result<Vec<u8>> {
    let body = bincode::serialize(schema)?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + body.len() + FOOTER_SIZE);
    buf.put_slice(MAGIC);
    buf.put_u16_le(VERSION);
    buf.put_u32_le(body.len() as u32);
    buf.put_slice(&body);
    buf.put_u32_le(crc32fast::hash(&body));

    Ok(buf.to_vec())
}

/// Parse table file bytes, verifying magic, version, length and checksum
pub fn decode(table: &str, bytes: &[u8]) -> Result<TableSchema> {
    let corrupt = |reason: String| TosError::CorruptSchema {
        table: table.to_string(),
        reason,
    };

    if bytes.len() < HEADER_SIZE + FOOTER_SIZE {
        return Err(corrupt(format!("file too short ({} bytes)", bytes.len())));
    }

    let mut header = &bytes[..HEADER_SIZE];
    let mut magic = [0u8; 4];
    header.copy_to_slice(&mut magic);
    if &magic != MAGIC {
        return Err(corrupt(format!("bad magic {:?}", magic)));
    }

    let version = header.get_u16_le();
    if version != VERSION {
        return Err(corrupt(format!("unsupported version {}", version)));
    }

    let body_len = header.get_u32_le() as usize;
    if bytes.len() != HEADER_SIZE + body_len + FOOTER_SIZE {
        return Err(corrupt(format!(
            "length mismatch: header says {} body bytes, file has {}",
            body_len,
            bytes.len().saturating_sub(HEADER_SIZE + FOOTER_SIZE)
        )));
    }

    let body = &bytes[HEADER_SIZE..HEADER_SIZE + body_len];
    let mut footer = &bytes[HEADER_SIZE + body_len..];
    let stored_crc = footer.get_u32_le();
    let actual_crc = crc32fast::hash(body);
    if stored_crc != actual_crc {
        return Err(corrupt(format!(
            "checksum mismatch: stored {:08x}, computed {:08x}",
            stored_crc, actual_crc
        )));
    }

    bincode::deserialize(body).map_err(|e| corrupt(e.to_string()))
}

/// Publish a new table file at `path`
///
/// Fails with `AlreadyExists` (leaving the existing file untouched) if a
/// table is already there. No partial file is ever visible at `path`.
pub fn publish(dir: &Path, path: &Path, schema: &TableSchema) -> Result<()> {
    let bytes = encode(schema)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".tosdb-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;

    // The temp file is removed when the error drops it
    tmp.persist_noclobber(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read and verify a table file
pub fn read(path: &Path, table: &str) -> Result<TableSchema> {
    let bytes = fs::read(path)?;
    decode(table, &bytes)
}
