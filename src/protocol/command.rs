//! Command definitions
//!
//! Represents commands from clients.

use crate::catalog::Column;

/// Binary command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    MakeDb = 0x01,
    MakeTable = 0x02,
    OpenDb = 0x03,
    ShowStruct = 0x04,
    ShowAllDb = 0x05,
    ShowTables = 0x06,
}

impl CommandType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(CommandType::MakeDb),
            0x02 => Some(CommandType::MakeTable),
            0x03 => Some(CommandType::OpenDb),
            0x04 => Some(CommandType::ShowStruct),
            0x05 => Some(CommandType::ShowAllDb),
            0x06 => Some(CommandType::ShowTables),
            _ => None,
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `make db <name>`
    CreateDatabase { name: String },

    /// `make table <name> [col:type ...]`
    CreateTable { name: String, columns: Vec<Column> },

    /// `use <name>`
    SelectDatabase { name: String },

    /// `show databases`
    ListDatabases,

    /// `show tables`
    ListTables,

    /// `show structure <table>`
    ShowStructure { table: String },

    /// `exit`
    Disconnect,

    /// Blank line
    NoOp,

    /// Input that matched no rule of the grammar
    Malformed { reason: String },
}

impl Command {
    /// Get the binary command type, if the command has one
    pub fn command_type(&self) -> Option<CommandType> {
        match self {
            Command::CreateDatabase { .. } => Some(CommandType::MakeDb),
            Command::CreateTable { .. } => Some(CommandType::MakeTable),
            Command::SelectDatabase { .. } => Some(CommandType::OpenDb),
            Command::ShowStructure { .. } => Some(CommandType::ShowStruct),
            Command::ListDatabases => Some(CommandType::ShowAllDb),
            Command::ListTables => Some(CommandType::ShowTables),
            Command::Disconnect | Command::NoOp | Command::Malformed { .. } => None,
        }
    }

    pub fn is_disconnect(&self) -> bool {
        matches!(self, Command::Disconnect)
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Command::Malformed {
            reason: reason.into(),
        }
    }
}
