//! Response definitions
//!
//! Represents responses to clients, independent of the wire format.

use crate::catalog::Column;
use crate::error::TosError;

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Success = 0x00,
    Error = 0x01,
}

/// Response content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// A single human-readable line
    Message(String),

    /// A sorted list of names; `empty` is shown when there are none
    List { items: Vec<String>, empty: &'static str },

    /// Columns of a table
    Structure { table: String, columns: Vec<Column> },
}

/// A response to send to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Content
    pub body: Body,
}

impl Response {
    /// Create a success response carrying a message
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            body: Body::Message(message.into()),
        }
    }

    /// Create an ERROR response
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            body: Body::Message(message.into()),
        }
    }

    /// Map an error to an ERROR response
    pub fn from_error(err: &TosError) -> Self {
        Self::error(err.to_string())
    }

    /// Create a success response listing names
    pub fn list(items: Vec<String>, empty: &'static str) -> Self {
        Self {
            status: Status::Success,
            body: Body::List { items, empty },
        }
    }

    /// Create a success response describing a table
    pub fn structure(table: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            status: Status::Success,
            body: Body::Structure {
                table: table.into(),
                columns,
            },
        }
    }

    /// Parting acknowledgment for `exit`
    pub fn goodbye() -> Self {
        Self::ok("Goodbye")
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Success
    }

    /// Render as newline-terminated text lines
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        match &self.body {
            Body::Message(message) => {
                if self.status == Status::Error {
                    out.push_str("Error: ");
                }
                out.push_str(message);
                out.push('\n');
            }
            Body::List { items, empty } => {
                if items.is_empty() {
                    out.push_str(empty);
                    out.push('\n');
                }
                for item in items {
                    out.push_str(item);
                    out.push('\n');
                }
            }
            Body::Structure { table, columns } => {
                out.push_str(&format!("Table '{}':\n", table));
                for column in columns {
                    out.push_str(&format!("  {}\n", column));
                }
            }
        }

        out
    }
}
