//! Tests for Catalog
//!
//! These tests verify:
//! - Opening/creating the catalog root
//! - Database creation, duplicate rejection and listing
//! - Table creation, schema persistence and structure queries
//! - Name validation
//! - Concurrent creation races

use std::fs;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

use tempfile::TempDir;
use tosdb::catalog::{Catalog, Column, ColumnType};
use tosdb::TosError;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_catalog() -> (TempDir, Catalog) {
    let temp_dir = TempDir::new().unwrap();
    let catalog = Catalog::open(temp_dir.path().join("data")).unwrap();
    (temp_dir, catalog)
}

fn sample_columns() -> Vec<Column> {
    vec![
        Column::new("id", ColumnType::Int),
        Column::varchar("name", 20),
        Column::new("active", ColumnType::Boolean),
    ]
}

/// Sorted list of every path under `root`, relative to it
fn snapshot(root: &Path) -> Vec<String> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<String>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            out.push(path.strip_prefix(root).unwrap().display().to_string());
            if path.is_dir() {
                walk(&path, root, out);
            }
        }
    }

    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_creates_root() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("nested").join("data");
    assert!(!root.exists());

    let catalog = Catalog::open(&root).unwrap();

    assert!(root.is_dir());
    assert_eq!(catalog.root(), root.as_path());
    assert!(catalog.list_databases().unwrap().is_empty());
}

#[test]
fn test_open_existing_root_keeps_databases() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("data");

    Catalog::open(&root).unwrap().create_database("kept").unwrap();
    let reopened = Catalog::open(&root).unwrap();

    assert!(reopened.database_exists("kept"));
}

// =============================================================================
// Database Tests
// =============================================================================

#[test]
fn test_create_database_makes_directory() {
    let (_temp, catalog) = setup_temp_catalog();

    catalog.create_database("alpha").unwrap();

    assert!(catalog.database_path("alpha").is_dir());
    assert!(catalog.database_exists("alpha"));
    assert!(!catalog.database_exists("beta"));
}

#[test]
fn test_duplicate_database_is_rejected_without_side_effects() {
    let (_temp, catalog) = setup_temp_catalog();

    catalog.create_database("alpha").unwrap();
    let after_first = snapshot(catalog.root());

    let err = catalog.create_database("alpha").unwrap_err();
    assert!(err.is_already_exists());
    assert!(matches!(err, TosError::DatabaseExists(ref name) if name == "alpha"));

    assert_eq!(snapshot(catalog.root()), after_first);
}

#[test]
fn test_list_databases_sorted() {
    let (_temp, catalog) = setup_temp_catalog();

    for name in ["gamma", "alpha", "beta"] {
        catalog.create_database(name).unwrap();
    }

    assert_eq!(
        catalog.list_databases().unwrap(),
        vec!["alpha", "beta", "gamma"]
    );
}

#[test]
fn test_list_databases_ignores_stray_files() {
    let (_temp, catalog) = setup_temp_catalog();

    catalog.create_database("real").unwrap();
    fs::write(catalog.root().join("notes.txt"), b"not a database").unwrap();

    assert_eq!(catalog.list_databases().unwrap(), vec!["real"]);
}

#[test]
fn test_invalid_database_names() {
    let (_temp, catalog) = setup_temp_catalog();

    let too_long = "x".repeat(65);
    for name in ["", "..", "a/b", "with space", "-dash", too_long.as_str()] {
        let err = catalog.create_database(name).unwrap_err();
        assert!(
            matches!(err, TosError::InvalidName { .. }),
            "expected InvalidName for {:?}, got {:?}",
            name,
            err
        );
    }

    assert!(catalog.list_databases().unwrap().is_empty());
    assert!(!catalog.database_exists(".."));
}

#[test]
fn test_database_name_at_length_limit() {
    let (_temp, catalog) = setup_temp_catalog();
    let name = "d".repeat(64);

    catalog.create_database(&name).unwrap();
    assert!(catalog.database_exists(&name));
}

// =============================================================================
// Table Tests
// =============================================================================

#[test]
fn test_create_table_writes_table_file() {
    let (_temp, catalog) = setup_temp_catalog();
    catalog.create_database("shop").unwrap();

    catalog.create_table("shop", "orders", &sample_columns()).unwrap();

    let table_path = catalog.table_path("shop", "orders");
    assert!(table_path.is_file());
    assert_eq!(fs::metadata(&table_path).unwrap().len(), 0);
    assert!(table_path.ends_with("shop/orders.tbl"));
}

#[test]
fn test_create_table_requires_database() {
    let (_temp, catalog) = setup_temp_catalog();

    let err = catalog
        .create_table("missing", "orders", &sample_columns())
        .unwrap_err();

    assert!(matches!(err, TosError::NoSuchDatabase(ref db) if db == "missing"));
}

#[test]
fn test_duplicate_table_is_rejected() {
    let (_temp, catalog) = setup_temp_catalog();
    catalog.create_database("shop").unwrap();
    catalog.create_table("shop", "orders", &sample_columns()).unwrap();

    let err = catalog
        .create_table("shop", "orders", &[Column::new("other", ColumnType::Text)])
        .unwrap_err();

    assert!(err.is_already_exists());
    // The first schema survives
    assert_eq!(
        catalog.table_structure("shop", "orders").unwrap(),
        sample_columns()
    );
}

#[test]
fn test_same_table_name_in_two_databases() {
    let (_temp, catalog) = setup_temp_catalog();
    catalog.create_database("a").unwrap();
    catalog.create_database("b").unwrap();

    catalog.create_table("a", "t", &[Column::new("x", ColumnType::Int)]).unwrap();
    catalog.create_table("b", "t", &[Column::new("y", ColumnType::Float)]).unwrap();

    assert_eq!(catalog.table_structure("a", "t").unwrap()[0].name, "x");
    assert_eq!(catalog.table_structure("b", "t").unwrap()[0].name, "y");
}

#[test]
fn test_table_structure_preserves_order_and_lengths() {
    let (_temp, catalog) = setup_temp_catalog();
    catalog.create_database("shop").unwrap();

    let columns = vec![
        Column::new("id", ColumnType::Int),
        Column::varchar("name", 20),
        Column::new("bio", ColumnType::Text),
        Column::new("active", ColumnType::Boolean),
        Column::new("score", ColumnType::Float),
    ];
    catalog.create_table("shop", "people", &columns).unwrap();

    assert_eq!(catalog.table_structure("shop", "people").unwrap(), columns);
}

#[test]
fn test_table_without_columns() {
    let (_temp, catalog) = setup_temp_catalog();
    catalog.create_database("shop").unwrap();

    catalog.create_table("shop", "empty", &[]).unwrap();

    assert!(catalog.table_structure("shop", "empty").unwrap().is_empty());
}

#[test]
fn test_table_structure_missing_table() {
    let (_temp, catalog) = setup_temp_catalog();
    catalog.create_database("shop").unwrap();

    let err = catalog.table_structure("shop", "ghost").unwrap_err();
    assert!(matches!(err, TosError::NoSuchTable { ref table, .. } if table == "ghost"));
}

#[test]
fn test_table_file_without_schema_is_corrupt() {
    let (_temp, catalog) = setup_temp_catalog();
    catalog.create_database("legacy").unwrap();
    fs::write(catalog.table_path("legacy", "old"), b"").unwrap();

    let err = catalog.table_structure("legacy", "old").unwrap_err();
    assert!(matches!(err, TosError::CorruptSchema { ref table, .. } if table == "old"));
}

#[test]
fn test_corrupt_table_file_is_reported() {
    let (_temp, catalog) = setup_temp_catalog();
    catalog.create_database("shop").unwrap();
    catalog.create_table("shop", "orders", &sample_columns()).unwrap();

    let table_path = catalog.table_path("shop", "orders");
    let mut bytes = fs::read(&table_path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&table_path, bytes).unwrap();

    let err = catalog.table_structure("shop", "orders").unwrap_err();
    assert!(matches!(err, TosError::CorruptSchema { .. }));
}

#[test]
fn test_create_table_leaves_only_the_table_file() {
    let (_temp, catalog) = setup_temp_catalog();
    catalog.create_database("shop").unwrap();
    catalog.create_table("shop", "orders", &sample_columns()).unwrap();
    let _ = catalog.create_table("shop", "orders", &[]);

    assert_eq!(
        snapshot(&catalog.database_path("shop")),
        vec!["orders.tbl"]
    );
}

#[test]
fn test_list_tables_sorted_and_skips_stray_files() {
    let (_temp, catalog) = setup_temp_catalog();
    catalog.create_database("shop").unwrap();

    for name in ["orders", "customers", "items"] {
        catalog.create_table("shop", name, &sample_columns()).unwrap();
    }

    let db_dir = catalog.database_path("shop");
    fs::write(db_dir.join("notes.txt"), b"x").unwrap();
    fs::write(db_dir.join("bad name.tbl"), b"x").unwrap();
    fs::write(db_dir.join(".tosdb-abc.tmp"), b"x").unwrap();
    fs::create_dir(db_dir.join("nested.tbl")).unwrap();

    assert_eq!(
        catalog.list_tables("shop").unwrap(),
        vec!["customers", "items", "orders"]
    );
}

#[test]
fn test_list_tables_missing_database() {
    let (_temp, catalog) = setup_temp_catalog();

    let err = catalog.list_tables("nowhere").unwrap_err();
    assert!(matches!(err, TosError::NoSuchDatabase(_)));
}

#[test]
fn test_invalid_columns_are_rejected_before_touching_disk() {
    let (_temp, catalog) = setup_temp_catalog();
    catalog.create_database("shop").unwrap();

    let duplicated = vec![
        Column::new("id", ColumnType::Int),
        Column::new("id", ColumnType::Text),
    ];
    let err = catalog.create_table("shop", "bad", &duplicated).unwrap_err();
    assert!(matches!(err, TosError::Malformed(_)));

    let too_many: Vec<Column> = (0..17)
        .map(|i| Column::new(format!("c{}", i), ColumnType::Int))
        .collect();
    let err = catalog.create_table("shop", "wide", &too_many).unwrap_err();
    assert!(matches!(err, TosError::Malformed(_)));

    assert!(catalog.list_tables("shop").unwrap().is_empty());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_create_database_exactly_one_wins() {
    let (_temp, catalog) = setup_temp_catalog();
    let catalog = Arc::new(catalog);
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let catalog = Arc::clone(&catalog);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                catalog.create_database("race")
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let wins = results.iter().filter(|r| r.is_ok()).count();
    let losses = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.is_already_exists()))
        .count();

    assert_eq!(wins, 1);
    assert_eq!(losses, threads - 1);
    assert_eq!(catalog.list_databases().unwrap(), vec!["race"]);
}

#[test]
fn test_concurrent_create_table_exactly_one_wins() {
    let (_temp, catalog) = setup_temp_catalog();
    catalog.create_database("shop").unwrap();
    let catalog = Arc::new(catalog);
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let catalog = Arc::clone(&catalog);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let columns = vec![Column::new(format!("col{}", i), ColumnType::Int)];
                barrier.wait();
                catalog.create_table("shop", "contested", &columns).map(|_| i)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<usize> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();

    assert_eq!(winners.len(), 1);
    assert!(results
        .iter()
        .filter(|r| r.is_err())
        .all(|r| matches!(r, Err(TosError::TableExists { .. }))));

    // The stored schema belongs to the winner
    let columns = catalog.table_structure("shop", "contested").unwrap();
    assert_eq!(columns, vec![Column::new(format!("col{}", winners[0]), ColumnType::Int)]);
}

#[test]
fn test_listed_tables_always_have_their_full_schema() {
    let (_temp, catalog) = setup_temp_catalog();
    catalog.create_database("shop").unwrap();
    let catalog = Arc::new(catalog);
    let columns = vec![Column::new("id", ColumnType::Int), Column::varchar("n", 20)];
    let tables = 300;

    let writer = {
        let catalog = Arc::clone(&catalog);
        let columns = columns.clone();
        thread::spawn(move || {
            for i in 0..tables {
                catalog
                    .create_table("shop", &format!("t{}", i), &columns)
                    .unwrap();
            }
        })
    };

    let reader = {
        let catalog = Arc::clone(&catalog);
        thread::spawn(move || {
            let mut reads = 0;
            loop {
                let listed = catalog.list_tables("shop").unwrap();
                for table in &listed {
                    assert_eq!(
                        catalog.table_structure("shop", table).unwrap(),
                        columns,
                        "table {} seen before its schema was complete",
                        table
                    );
                    reads += 1;
                }
                if listed.len() == tables {
                    return reads;
                }
            }
        })
    };

    writer.join().unwrap();
    assert!(reader.join().unwrap() >= tables);
}
