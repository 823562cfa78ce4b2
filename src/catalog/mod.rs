//! Catalog Module
//!
//! Filesystem-mapped persistence for databases and tables.
//!
//! ## Layout
//! ```text
//! {root}/
//!   ├── alpha/                 (database)
//!   │     └── users.tbl        (table file: column definitions, checksummed)
//!   └── beta/
//! ```
//!
//! Databases and tables are never deleted; once created they are immutable.

mod schema;
mod store;
mod table_file;

pub use schema::{
    validate_columns, validate_database_name, validate_name, validate_table_name, Column,
    ColumnType, TableSchema, DEFAULT_VARCHAR_LENGTH, MAX_COLUMNS, MAX_COLUMN_NAME, MAX_DB_NAME,
    MAX_TABLE_NAME,
};
pub use store::{Catalog, TABLE_EXTENSION};
