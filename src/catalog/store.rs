//! Catalog Store
//!
//! Maps databases to directories and tables to files under a root path.
//!
//! ## Responsibilities
//! - Create databases and tables with exclusive-create semantics
//! - Persist each table's schema as the content of its table file
//! - List databases/tables in sorted order
//! - Report table structure

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Result, TosError};

use super::schema::{
    validate_columns, validate_database_name, validate_table_name, Column, TableSchema,
};
use super::table_file;

/// Extension of table files
pub const TABLE_EXTENSION: &str = "tbl";

/// Filesystem-backed catalog of databases and tables
///
/// ## Concurrency:
/// - Holds no in-process mutable state; all methods take `&self`
/// - Creation relies on `create_dir` / a no-clobber link, which are atomic at
///   the filesystem level: of two racing creators exactly one wins
/// - A table file is visible only once its schema is complete
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Root directory; one subdirectory per database
    root: PathBuf,
}

impl Catalog {
    /// Open a catalog rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::debug!("Catalog opened at {}", root.display());
        Ok(Self { root })
    }

    /// Root directory of the catalog
    pub fn root(&self) -> &Path {
        &self.root
    }

    // =========================================================================
    // Databases
    // =========================================================================

    /// Create a database directory
    ///
    /// Fails with `DatabaseExists` if the directory is already present.
    pub fn create_database(&self, name: &str) -> Result<()> {
        validate_database_name(name)?;

        match fs::create_dir(self.database_path(name)) {
            Ok(()) => {
                tracing::info!("Created database '{}'", name);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(TosError::DatabaseExists(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check whether a database exists
    ///
    /// Invalid names never exist.
    pub fn database_exists(&self, name: &str) -> bool {
        validate_database_name(name).is_ok() && self.database_path(name).is_dir()
    }

    /// List all databases, sorted by name
    pub fn list_databases(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            // Skip anything we could not have created ourselves
            if let Some(name) = entry.file_name().to_str() {
                if validate_database_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// Create a table inside `db_name` with the given columns
    ///
    /// The schema is written to a temporary file and linked into place as
    /// `<table>.tbl` in one step, so readers see either no table or the full
    /// schema. The loser of a race gets `TableExists`.
    pub fn create_table(&self, db_name: &str, table_name: &str, columns: &[Column]) -> Result<()> {
        validate_table_name(table_name)?;
        validate_columns(columns)?;
        self.require_database(db_name)?;

        let schema = TableSchema {
            name: table_name.to_string(),
            columns: columns.to_vec(),
        };

        let published = table_file::publish(
            &self.database_path(db_name),
            &self.table_path(db_name, table_name),
            &schema,
        );
        match published {
            Ok(()) => {}
            Err(TosError::Io(e)) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(TosError::TableExists {
                    database: db_name.to_string(),
                    table: table_name.to_string(),
                });
            }
            Err(e) => {
                tracing::warn!("Failed to create table '{}.{}': {}", db_name, table_name, e);
                return Err(e);
            }
        }

        tracing::info!(
            "Created table '{}' in database '{}' ({} columns)",
            table_name,
            db_name,
            columns.len()
        );
        Ok(())
    }

    /// List the tables of a database, sorted by name
    pub fn list_tables(&self, db_name: &str) -> Result<Vec<String>> {
        self.require_database(db_name)?;

        let mut names = Vec::new();
        for entry in fs::read_dir(self.database_path(db_name))? {
            let entry = entry?;
            let path = entry.path();

            if !entry.file_type()?.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(TABLE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_table_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    /// Check whether a table exists in a database
    pub fn table_exists(&self, db_name: &str, table_name: &str) -> bool {
        self.database_exists(db_name)
            && validate_table_name(table_name).is_ok()
            && self.table_path(db_name, table_name).is_file()
    }

    /// Columns of a table, in declaration order
    ///
    /// A table file without a readable schema is reported as `CorruptSchema`.
    pub fn table_structure(&self, db_name: &str, table_name: &str) -> Result<Vec<Column>> {
        self.require_database(db_name)?;

        if !self.table_exists(db_name, table_name) {
            return Err(TosError::NoSuchTable {
                database: db_name.to_string(),
                table: table_name.to_string(),
            });
        }

        let schema = table_file::read(&self.table_path(db_name, table_name), table_name)?;
        Ok(schema.columns)
    }

    // =========================================================================
    // Paths
    // =========================================================================

    fn require_database(&self, db_name: &str) -> Result<()> {
        if self.database_exists(db_name) {
            Ok(())
        } else {
            Err(TosError::NoSuchDatabase(db_name.to_string()))
        }
    }

    /// Directory of a database
    pub fn database_path(&self, db_name: &str) -> PathBuf {
        self.root.join(db_name)
    }

    /// File backing a table
    pub fn table_path(&self, db_name: &str, table_name: &str) -> PathBuf {
        self.database_path(db_name)
            .join(format!("{}.{}", table_name, TABLE_EXTENSION))
    }
}
