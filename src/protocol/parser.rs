//! Command parser
//!
//! Turns one line of text into a [`Command`].
//!
//! ## Grammar
//! ```text
//! make db <name>
//! make table <name> [col:TYPE | col:VARCHAR(n) ...]
//! use <name>
//! show databases
//! show tables
//! show structure <table>
//! exit
//! ```
//! Verbs are case-sensitive; type keywords are not.

use crate::catalog::{validate_columns, Column, ColumnType, DEFAULT_VARCHAR_LENGTH};
use crate::error::{Result, TosError};

use super::{Command, MAX_COMMAND_LENGTH};

/// Parse one command line (without its terminator)
///
/// Only an overlong line is an error; everything else that does not match the
/// grammar comes back as `Command::Malformed`.
pub fn parse_line(line: &str) -> Result<Command> {
    if line.len() > MAX_COMMAND_LENGTH {
        return Err(TosError::CommandTooLong {
            len: line.len(),
            max: MAX_COMMAND_LENGTH,
        });
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();

    let command = match tokens.as_slice() {
        [] => Command::NoOp,

        ["make"] => Command::malformed("expected 'make db <name>' or 'make table <name> ...'"),
        ["make", "db"] => Command::malformed("database name required"),
        ["make", "db", name] => Command::CreateDatabase {
            name: name.to_string(),
        },
        ["make", "db", _, extra, ..] => unexpected(extra),
        ["make", "table"] => Command::malformed("table name required"),
        ["make", "table", name, specs @ ..] => parse_create_table(name, specs),
        ["make", other, ..] => Command::malformed(format!(
            "unknown object '{}' (expected 'db' or 'table')",
            other
        )),

        ["use"] => Command::malformed("database name required"),
        ["use", name] => Command::SelectDatabase {
            name: name.to_string(),
        },
        ["use", _, extra, ..] => unexpected(extra),

        ["show"] => Command::malformed("expected 'databases', 'tables' or 'structure <table>'"),
        ["show", "databases"] => Command::ListDatabases,
        ["show", "tables"] => Command::ListTables,
        ["show", "structure"] => Command::malformed("table name required"),
        ["show", "structure", table] => Command::ShowStructure {
            table: table.to_string(),
        },
        ["show", "databases" | "tables", extra, ..] => unexpected(extra),
        ["show", "structure", _, extra, ..] => unexpected(extra),
        ["show", other, ..] => Command::malformed(format!("cannot show '{}'", other)),

        ["exit"] => Command::Disconnect,
        ["exit", extra, ..] => unexpected(extra),

        [verb, ..] => Command::malformed(format!("unknown command '{}'", verb)),
    };

    Ok(command)
}

fn unexpected(token: &str) -> Command {
    Command::malformed(format!("unexpected argument '{}'", token))
}

fn parse_create_table(name: &str, specs: &[&str]) -> Command {
    let columns = match specs
        .iter()
        .map(|spec| parse_column_spec(spec))
        .collect::<Result<Vec<_>>>()
    {
        Ok(columns) => columns,
        Err(e) => return Command::malformed(reason_of(e)),
    };

    if let Err(e) = validate_columns(&columns) {
        return Command::malformed(reason_of(e));
    }

    Command::CreateTable {
        name: name.to_string(),
        columns,
    }
}

fn reason_of(err: TosError) -> String {
    match err {
        TosError::Malformed(reason) => reason,
        other => other.to_string(),
    }
}

/// Parse a `name:TYPE` or `name:VARCHAR(n)` column spec
pub fn parse_column_spec(spec: &str) -> Result<Column> {
    let (name, type_spec) = spec.split_once(':').ok_or_else(|| {
        TosError::Malformed(format!("column '{}' must be written as name:TYPE", spec))
    })?;

    if name.is_empty() {
        return Err(TosError::Malformed(format!("column '{}' has no name", spec)));
    }

    let (keyword, length) = match type_spec.split_once('(') {
        Some((keyword, rest)) => {
            let digits = rest.strip_suffix(')').ok_or_else(|| {
                TosError::Malformed(format!("column '{}': missing ')'", name))
            })?;
            let length = digits.parse::<u16>().map_err(|_| {
                TosError::Malformed(format!(
                    "column '{}': invalid length '{}' (1..={})",
                    name,
                    digits,
                    u16::MAX
                ))
            })?;
            (keyword, Some(length))
        }
        None => (type_spec, None),
    };

    let col_type = ColumnType::from_keyword(keyword).ok_or_else(|| {
        TosError::Malformed(format!(
            "column '{}': unknown type '{}' (expected INT, VARCHAR, TEXT, BOOLEAN or FLOAT)",
            name, keyword
        ))
    })?;

    match (col_type, length) {
        (ColumnType::Varchar, Some(0)) => Err(TosError::Malformed(format!(
            "column '{}': VARCHAR length must be at least 1",
            name
        ))),
        (ColumnType::Varchar, Some(length)) => Ok(Column::varchar(name, length)),
        (ColumnType::Varchar, None) => Ok(Column::varchar(name, DEFAULT_VARCHAR_LENGTH)),
        (_, Some(_)) => Err(TosError::Malformed(format!(
            "column '{}': only VARCHAR takes a length",
            name
        ))),
        (other, None) => Ok(Column::new(name, other)),
    }
}
