//! Server Tests
//!
//! Tests against a live server on an ephemeral port:
//! - Greeting, prompt and `exit` handling on the text protocol
//! - Isolation and concurrency between sessions
//! - Connection limit, idle timeout and graceful shutdown
//! - The binary wire format

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tempfile::TempDir;
use tosdb::catalog::{Column, ColumnType};
use tosdb::config::ConfigBuilder;
use tosdb::protocol::{read_response, write_command, Command, Status, PROMPT};
use tosdb::{Catalog, Client, Config, Server, ShutdownHandle, WireFormat};

struct TestServer {
    _dir: TempDir,
    addr: SocketAddr,
    catalog: Arc<Catalog>,
    shutdown: ShutdownHandle,
    thread: Option<JoinHandle<tosdb::Result<()>>>,
}

impl TestServer {
    fn start() -> Self {
        Self::start_with(|builder| builder)
    }

    fn start_with(tweak: impl FnOnce(ConfigBuilder) -> ConfigBuilder) -> Self {
        let dir = TempDir::new().unwrap();
        let config = tweak(
            Config::builder()
                .data_dir(dir.path().join("data"))
                .listen_addr("127.0.0.1:0"),
        )
        .build();

        let catalog = Arc::new(Catalog::open(&config.data_dir).unwrap());
        let mut server = Server::bind(config, Arc::clone(&catalog)).unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();

        let thread = thread::spawn(move || server.run());

        Self {
            _dir: dir,
            addr,
            catalog,
            shutdown,
            thread: Some(thread),
        }
    }

    fn connect(&self) -> Client {
        let client = Client::connect(&self.addr.to_string()).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        client
    }

    /// Stop the server and wait for `run()` to return
    fn stop(&mut self) -> tosdb::Result<()> {
        self.shutdown.shutdown();
        match self.thread.take() {
            Some(thread) => thread.join().unwrap(),
            None => Ok(()),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

// =============================================================================
// Text Protocol Tests
// =============================================================================

#[test]
fn test_welcome_and_prompt() {
    let server = TestServer::start();

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());

    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    assert_eq!(line, "Connected to TOS Database Server\n");

    let mut prompt = vec![0u8; PROMPT.len()];
    std::io::Read::read_exact(&mut reader, &mut prompt).unwrap();
    assert_eq!(prompt, PROMPT.as_bytes());

    stream.write_all(b"show databases\r\n").unwrap();
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    assert_eq!(line, "(no databases)\n");
}

#[test]
fn test_full_session() {
    let server = TestServer::start();
    let mut client = server.connect();

    assert_eq!(client.greeting(), "Connected to TOS Database Server\n");
    assert_eq!(
        client.execute("make db alpha").unwrap(),
        "Database 'alpha' created successfully\n"
    );
    assert_eq!(
        client.execute("use alpha").unwrap(),
        "Database changed to 'alpha'\n"
    );
    assert_eq!(
        client.execute("make table t1 id:INT name:VARCHAR(20)").unwrap(),
        "Table 't1' created successfully in database 'alpha'\n"
    );
    assert_eq!(client.execute("show tables").unwrap(), "t1\n");
    assert_eq!(
        client.execute("show structure t1").unwrap(),
        "Table 't1':\n  id INT\n  name VARCHAR(20)\n"
    );

    assert_eq!(client.exit().unwrap(), "Goodbye\n");
}

#[test]
fn test_errors_keep_connection_open() {
    let server = TestServer::start();
    let mut client = server.connect();

    assert_eq!(
        client.execute("show tables").unwrap(),
        "Error: No database selected. Use 'use <name>' first\n"
    );
    assert_eq!(
        client.execute("").unwrap(),
        "Error: Invalid command syntax: empty command\n"
    );
    assert!(client
        .execute("launch rockets")
        .unwrap()
        .starts_with("Error: Invalid command syntax"));

    assert_eq!(client.execute("show databases").unwrap(), "(no databases)\n");
}

#[test]
fn test_overlong_line_is_rejected_and_skipped() {
    let server = TestServer::start();
    let mut client = server.connect();

    let long = format!("make db {}", "x".repeat(600));
    let out = client.execute(&long).unwrap();
    assert!(out.starts_with("Error: Command too long"), "got {:?}", out);

    // Nothing of the long line leaked into the next command
    assert_eq!(client.execute("show databases").unwrap(), "(no databases)\n");
    assert!(server.catalog.list_databases().unwrap().is_empty());
}

#[test]
fn test_exit_closes_only_that_connection() {
    let server = TestServer::start();
    let first = server.connect();
    let mut second = server.connect();

    assert_eq!(first.exit().unwrap(), "Goodbye\n");
    assert_eq!(
        second.execute("make db still_here").unwrap(),
        "Database 'still_here' created successfully\n"
    );
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_sessions_have_independent_selection() {
    let server = TestServer::start();
    server.catalog.create_database("a").unwrap();
    server.catalog.create_database("b").unwrap();

    let mut first = server.connect();
    let mut second = server.connect();

    first.execute("use a").unwrap();
    second.execute("use b").unwrap();
    first.execute("make table only_in_a").unwrap();

    assert_eq!(first.execute("show tables").unwrap(), "only_in_a\n");
    assert_eq!(second.execute("show tables").unwrap(), "(no tables)\n");
}

#[test]
fn test_concurrent_clients_create_databases() {
    let server = TestServer::start();
    let addr = server.addr.to_string();

    let handles: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|name| {
            let addr = addr.clone();
            thread::spawn(move || {
                let mut client = Client::connect(&addr).unwrap();
                client.execute(&format!("make db {}", name)).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap().contains("created successfully"));
    }

    let mut client = server.connect();
    assert_eq!(client.execute("show databases").unwrap(), "a\nb\n");
}

#[test]
fn test_racing_creates_have_one_winner() {
    let server = TestServer::start_with(|b| b.max_connections(8));
    let addr = server.addr.to_string();
    let barrier = Arc::new(Barrier::new(6));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let addr = addr.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut client = Client::connect(&addr).unwrap();
                barrier.wait();
                client.execute("make db race").unwrap()
            })
        })
        .collect();

    let outputs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = outputs
        .iter()
        .filter(|out| out.as_str() == "Database 'race' created successfully\n")
        .count();
    let losers = outputs
        .iter()
        .filter(|out| out.as_str() == "Error: Database 'race' already exists\n")
        .count();

    assert_eq!(winners, 1);
    assert_eq!(losers, 5);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_connection_limit() {
    let server = TestServer::start_with(|b| b.max_connections(1));

    let mut holder = server.connect();
    let refused = Client::connect(&server.addr.to_string());

    match refused {
        Err(e) => assert!(e.to_string().contains("Server busy (1 connections max)")),
        Ok(_) => panic!("second connection should have been refused"),
    }

    // The admitted session is unaffected
    assert_eq!(holder.execute("show databases").unwrap(), "(no databases)\n");

    // Once it leaves, a new client gets in
    holder.exit().unwrap();
    let mut admitted = None;
    for _ in 0..50 {
        if let Ok(client) = Client::connect(&server.addr.to_string()) {
            admitted = Some(client);
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
    assert!(admitted.is_some());
}

#[test]
fn test_idle_connection_times_out() {
    let server = TestServer::start_with(|b| b.read_timeout_ms(200));
    let mut client = server.connect();

    thread::sleep(Duration::from_millis(800));

    assert!(client.execute("show databases").is_err());
}

#[test]
fn test_trickled_line_still_times_out() {
    let server = TestServer::start_with(|b| b.read_timeout_ms(300));

    let mut stream = TcpStream::connect(server.addr).unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut greeting = String::new();
    reader.read_line(&mut greeting).unwrap();

    // One byte every 50ms: each read is quick, the line never completes
    for _ in 0..30 {
        if stream.write_all(b"x").is_err() {
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }

    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let mut rest = Vec::new();
    match std::io::Read::read_to_end(&mut reader, &mut rest) {
        Ok(_) => assert_eq!(rest, PROMPT.as_bytes()),
        Err(e) => assert!(
            !matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut),
            "server kept the connection open: {}",
            e
        ),
    }
}

#[test]
fn test_prompt_commands_beat_the_timeout() {
    let server = TestServer::start_with(|b| b.read_timeout_ms(300));
    let mut client = server.connect();

    for _ in 0..5 {
        thread::sleep(Duration::from_millis(150));
        assert_eq!(client.execute("show databases").unwrap(), "(no databases)\n");
    }
}

#[test]
fn test_shutdown_stops_run_and_closes_sessions() {
    let mut server = TestServer::start();
    let mut client = server.connect();
    client.execute("make db kept").unwrap();

    server.stop().unwrap();

    assert!(client.execute("show databases").is_err());
    assert!(server.catalog.database_exists("kept"));

    // The listener is gone once run() has returned
    assert!(TcpStream::connect_timeout(&server.addr, Duration::from_millis(200)).is_err());
}

// =============================================================================
// Binary Protocol Tests
// =============================================================================

#[test]
fn test_binary_listener_round_trip() {
    let server = TestServer::start_with(|b| b.wire_format(WireFormat::Binary));

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    let mut send = |command: Command| {
        write_command(&mut stream, &command).unwrap();
        read_response(&mut stream).unwrap()
    };

    let created = send(Command::CreateDatabase {
        name: "shop".to_string(),
    });
    assert_eq!(created.status, Status::Success);
    assert_eq!(created.message(), "Database 'shop' created successfully");

    let unselected = send(Command::ListTables);
    assert_eq!(unselected.status, Status::Error);
    assert!(unselected.message().contains("No database selected"));

    send(Command::SelectDatabase {
        name: "shop".to_string(),
    });
    let columns = vec![Column::new("id", ColumnType::Int), Column::varchar("sku", 12)];
    let table = send(Command::CreateTable {
        name: "items".to_string(),
        columns: columns.clone(),
    });
    assert!(table.is_ok());

    assert_eq!(send(Command::ListDatabases).names(), vec!["shop"]);
    assert_eq!(send(Command::ListTables).names(), vec!["items"]);

    let structure = send(Command::ShowStructure {
        table: "items".to_string(),
    });
    assert_eq!(structure.columns().unwrap(), columns);
}

#[test]
fn test_binary_unknown_type_gets_error_frame() {
    let server = TestServer::start_with(|b| b.wire_format(WireFormat::Binary));

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    stream.write_all(&[0x09, 0x00, 0x00]).unwrap();
    let response = read_response(&mut stream).unwrap();

    assert_eq!(response.status, Status::Error);
    assert!(response.message().contains("unknown command type"));
}
