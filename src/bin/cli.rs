//! tosdb CLI Client
//!
//! Interactive command-line client for a tosdb server.

use std::io::{self, BufRead, Write};

use clap::Parser;
use tosdb::protocol::PROMPT;
use tosdb::Client;

/// tosdb CLI
#[derive(Parser, Debug)]
#[command(name = "tosdb-cli")]
#[command(about = "Interactive client for the tosdb catalog server")]
#[command(after_help = "Example: tosdb-cli 192.168.1.100")]
struct Args {
    /// Server address (host or host:port, default port 8080)
    server: String,
}

fn main() {
    let args = Args::parse();

    let mut client = match Client::connect(&args.server) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Connection failed: {}", e);
            std::process::exit(1);
        }
    };

    println!("Connected to server at {}", args.server);
    print!("{}{}", client.greeting(), PROMPT);
    let _ = io::stdout().flush();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Failed to read input: {}", e);
                break;
            }
        };

        if line.trim() == "exit" {
            break;
        }

        match client.execute(&line) {
            Ok(response) => {
                print!("{}{}", response, PROMPT);
                let _ = io::stdout().flush();
            }
            Err(e) => {
                println!("Server disconnected: {}", e);
                std::process::exit(1);
            }
        }
    }

    println!("Disconnecting from server...");
    if let Ok(parting) = client.exit() {
        print!("{}", parting);
    }
}
