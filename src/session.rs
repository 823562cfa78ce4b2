//! Session Module
//!
//! Per-connection state machine and command dispatcher.
//!
//! ## States
//! ```text
//!                    use <db> (exists)
//!   ┌────────────────────┐ ───────────────▶ ┌──────────────────────┐
//!   │ NoDatabaseSelected │                  │ DatabaseSelected(db) │ ◀─┐
//!   └────────────────────┘                  └──────────────────────┘ ──┘
//!                                                use <other> (exists)
//! ```
//!
//! ## Responsibilities
//! - Track the selected database of one connection
//! - Gate table-scoped commands on a selected database
//! - Route commands to the catalog and turn every outcome into a `Response`

use crate::catalog::Catalog;
use crate::error::{Result, TosError};
use crate::protocol::{Command, Response};

/// Selection state of a session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    NoDatabaseSelected,
    DatabaseSelected(String),
}

/// State of one client connection
///
/// Owned exclusively by the worker serving the connection; never shared.
#[derive(Debug)]
pub struct Session {
    /// Connection id (for logging)
    id: u64,

    /// Current selection
    state: SessionState,
}

impl Session {
    /// Create a session with no database selected
    pub fn new(id: u64) -> Self {
        Self {
            id,
            state: SessionState::NoDatabaseSelected,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Name of the selected database, if any
    pub fn selected_database(&self) -> Option<&str> {
        match &self.state {
            SessionState::DatabaseSelected(db) => Some(db),
            SessionState::NoDatabaseSelected => None,
        }
    }

    /// Execute a command and produce exactly one response
    ///
    /// Errors never escape: they become ERROR responses and the session
    /// continues. Only `SelectDatabase` changes state, and only on success.
    pub fn dispatch(&mut self, catalog: &Catalog, command: Command) -> Response {
        tracing::debug!("Session {} dispatching {:?}", self.id, command);

        match self.execute(catalog, command) {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Session {} command failed: {}", self.id, e);
                Response::from_error(&e)
            }
        }
    }

    fn execute(&mut self, catalog: &Catalog, command: Command) -> Result<Response> {
        match command {
            Command::CreateDatabase { name } => {
                catalog.create_database(&name)?;
                Ok(Response::ok(format!(
                    "Database '{}' created successfully",
                    name
                )))
            }

            Command::SelectDatabase { name } => {
                if !catalog.database_exists(&name) {
                    return Err(TosError::NoSuchDatabase(name));
                }
                let message = format!("Database changed to '{}'", name);
                self.state = SessionState::DatabaseSelected(name);
                Ok(Response::ok(message))
            }

            Command::CreateTable { name, columns } => {
                let db = self.require_selection()?;
                catalog.create_table(db, &name, &columns)?;
                Ok(Response::ok(format!(
                    "Table '{}' created successfully in database '{}'",
                    name, db
                )))
            }

            Command::ListDatabases => {
                let names = catalog.list_databases()?;
                Ok(Response::list(names, "(no databases)"))
            }

            Command::ListTables => {
                let db = self.require_selection()?;
                let names = catalog.list_tables(db)?;
                Ok(Response::list(names, "(no tables)"))
            }

            Command::ShowStructure { table } => {
                let db = self.require_selection()?;
                let columns = catalog.table_structure(db, &table)?;
                Ok(Response::structure(table, columns))
            }

            Command::Disconnect => Ok(Response::goodbye()),

            Command::NoOp => Err(TosError::Malformed("empty command".to_string())),

            Command::Malformed { reason } => Err(TosError::Malformed(reason)),
        }
    }

    fn require_selection(&self) -> Result<&str> {
        self.selected_database().ok_or(TosError::NoDatabaseSelected)
    }
}
