//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Text Protocol (canonical)
//!
//! Newline-terminated UTF-8 command lines of at most 512 bytes. The server
//! greets with a welcome line and a prompt, answers every command with one or
//! more lines and repeats the prompt, except after `exit`.
//!
//! ### Commands
//! - `make db <name>`
//! - `make table <name> [col:TYPE ...]`
//! - `use <name>`
//! - `show databases` / `show tables` / `show structure <table>`
//! - `exit`
//!
//! ## Binary Protocol (opt-in per listener)
//!
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Type (1) │ Len (2)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: SUCCESS
//! - 0x01: ERROR

mod codec;
mod command;
mod parser;
mod response;
mod text;

pub use codec::{
    decode_columns, decode_command, decode_command_payload, decode_response, encode_columns,
    encode_command, encode_response, read_command, read_response, write_command,
    write_response, ResponseFrame, COLUMN_RECORD_SIZE, HEADER_SIZE, MAX_FRAME_PAYLOAD,
};
pub use command::{Command, CommandType};
pub use parser::{parse_column_spec, parse_line};
pub use response::{Body, Response, Status};
pub use text::{read_line, write_line, write_text_response, LineRead};

/// Maximum length of a text command line in bytes
pub const MAX_COMMAND_LENGTH: usize = 512;

/// Default TCP port
pub const DEFAULT_PORT: u16 = 8080;

/// First line sent to a text client
pub const WELCOME_MESSAGE: &str = "Connected to TOS Database Server";

/// Prompt sent after the welcome line and after every response
pub const PROMPT: &str = "TOS> ";
