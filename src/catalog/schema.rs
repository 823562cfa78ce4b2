//! Schema definitions
//!
//! Column types, column definitions and the naming rules shared by databases,
//! tables and columns.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TosError};

/// Maximum database name length in bytes
pub const MAX_DB_NAME: usize = 64;

/// Maximum table name length in bytes
pub const MAX_TABLE_NAME: usize = 64;

/// Maximum column name length in bytes
pub const MAX_COLUMN_NAME: usize = 32;

/// Maximum number of columns per table
pub const MAX_COLUMNS: usize = 16;

/// Length given to a VARCHAR column declared without one
pub const DEFAULT_VARCHAR_LENGTH: u16 = 255;

/// Column data types
///
/// The discriminants are the type codes used by the binary wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ColumnType {
    Int = 1,
    Varchar = 2,
    Text = 3,
    Boolean = 4,
    Float = 5,
}

impl ColumnType {
    /// Look up a type by its wire code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ColumnType::Int),
            2 => Some(ColumnType::Varchar),
            3 => Some(ColumnType::Text),
            4 => Some(ColumnType::Boolean),
            5 => Some(ColumnType::Float),
            _ => None,
        }
    }

    /// Look up a type by its keyword (ASCII case-insensitive)
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_uppercase().as_str() {
            "INT" => Some(ColumnType::Int),
            "VARCHAR" => Some(ColumnType::Varchar),
            "TEXT" => Some(ColumnType::Text),
            "BOOLEAN" => Some(ColumnType::Boolean),
            "FLOAT" => Some(ColumnType::Float),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            ColumnType::Int => "INT",
            ColumnType::Varchar => "VARCHAR",
            ColumnType::Text => "TEXT",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Float => "FLOAT",
        }
    }
}

/// A single column of a table schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name (unique within its table)
    pub name: String,

    /// Data type
    pub col_type: ColumnType,

    /// Declared length, only meaningful for VARCHAR (0 otherwise)
    pub length: u16,
}

impl Column {
    /// Create a column of a fixed-size type
    pub fn new(name: impl Into<String>, col_type: ColumnType) -> Self {
        let length = match col_type {
            ColumnType::Varchar => DEFAULT_VARCHAR_LENGTH,
            _ => 0,
        };
        Self {
            name: name.into(),
            col_type,
            length,
        }
    }

    /// Create a VARCHAR column with an explicit length
    pub fn varchar(name: impl Into<String>, length: u16) -> Self {
        Self {
            name: name.into(),
            col_type: ColumnType::Varchar,
            length,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.col_type {
            ColumnType::Varchar => write!(f, "{} VARCHAR({})", self.name, self.length),
            other => write!(f, "{} {}", self.name, other.keyword()),
        }
    }
}

/// Schema of a table as persisted in its table file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<Column>,
}

// =============================================================================
// Validation
// =============================================================================

/// Check that a name is usable as a single path component.
///
/// Allowed: ASCII letters, digits, `_` and `-`, not starting with `-`,
/// 1..=max_len bytes.
pub fn validate_name(kind: &'static str, name: &str, max_len: usize) -> Result<()> {
    let invalid = |reason: String| TosError::InvalidName {
        kind,
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("name is empty".to_string()));
    }
    if name.len() > max_len {
        return Err(invalid(format!("longer than {} bytes", max_len)));
    }
    if name.starts_with('-') {
        return Err(invalid("must not start with '-'".to_string()));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(invalid(format!("character '{}' not allowed", c)));
    }

    Ok(())
}

pub fn validate_database_name(name: &str) -> Result<()> {
    validate_name("database", name, MAX_DB_NAME)
}

pub fn validate_table_name(name: &str) -> Result<()> {
    validate_name("table", name, MAX_TABLE_NAME)
}

/// Check a column list: count, names, lengths and uniqueness
pub fn validate_columns(columns: &[Column]) -> Result<()> {
    if columns.len() > MAX_COLUMNS {
        return Err(TosError::Malformed(format!(
            "too many columns: {} (max {})",
            columns.len(),
            MAX_COLUMNS
        )));
    }

    let mut seen = HashSet::with_capacity(columns.len());
    for column in columns {
        validate_name("column", &column.name, MAX_COLUMN_NAME)?;

        if !seen.insert(column.name.as_str()) {
            return Err(TosError::Malformed(format!(
                "duplicate column '{}'",
                column.name
            )));
        }

        match column.col_type {
            ColumnType::Varchar if column.length == 0 => {
                return Err(TosError::Malformed(format!(
                    "column '{}': VARCHAR length must be at least 1",
                    column.name
                )));
            }
            ColumnType::Varchar => {}
            _ if column.length != 0 => {
                return Err(TosError::Malformed(format!(
                    "column '{}': only VARCHAR takes a length",
                    column.name
                )));
            }
            _ => {}
        }
    }

    Ok(())
}
