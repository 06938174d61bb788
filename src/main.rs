//! Console front-end for the payload courier.
//!
//! This is a thin presentation layer: it renders registry and session
//! snapshots and forwards user intents into the session. All Bluetooth work
//! happens in the library.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, mpsc};

use ble_courier::core::bluetooth::EVENT_CHANNEL_CAPACITY;
use ble_courier::{BluestGateway, PeripheralId, PeripheralSession, SessionConfig, drive};

// Initialize logging
fn setup_logging() {
    env_logger::init();
    log::info!("Logging initialized");
}

fn print_help() {
    println!("commands:");
    println!("  list            discovered peripherals");
    println!("  status          session snapshot");
    println!("  connect <n>     connect to peripheral n from `list`");
    println!("  send <text>     write a payload to the connected peripheral");
    println!("  disconnect      drop the active connection");
    println!("  scan            resume scanning after a disconnect");
    println!("  quit");
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    let config = match env::args().nth(1) {
        Some(path) => SessionConfig::load_config(&PathBuf::from(path)).await?,
        None => SessionConfig::default(),
    };

    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let gateway = BluestGateway::new(&config, events_tx).await?;
    let session = Arc::new(Mutex::new(PeripheralSession::new(gateway, config)));

    tokio::spawn(drive(session.clone(), events_rx));

    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));

        match command {
            "" => {}
            "list" => {
                let session = session.lock().await;
                if session.registry().is_empty() {
                    println!("(no peripherals discovered yet)");
                }
                for (index, record) in session.registry().iter().enumerate() {
                    println!("{:3}  {}  [{}]", index, record.name, record.id);
                }
            }
            "status" => {
                let snapshot = session.lock().await.snapshot();
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
            "connect" => match rest.trim().parse::<usize>() {
                Ok(index) => {
                    let id: Option<PeripheralId> = {
                        let session = session.lock().await;
                        session.registry().iter().nth(index).map(|r| r.id.clone())
                    };
                    match id {
                        Some(id) => {
                            if let Err(e) = session.lock().await.select_device(&id).await {
                                eprintln!("error: {}", e);
                            }
                        }
                        None => eprintln!("error: no peripheral at index {}", index),
                    }
                }
                Err(_) => eprintln!("usage: connect <n>"),
            },
            "send" => {
                if let Err(e) = session.lock().await.submit_payload(rest).await {
                    eprintln!("error: {}", e);
                }
            }
            "disconnect" => {
                if let Err(e) = session.lock().await.disconnect().await {
                    eprintln!("error: {}", e);
                }
            }
            "scan" => {
                if let Err(e) = session.lock().await.resume_scan().await {
                    eprintln!("error: {}", e);
                }
            }
            "quit" | "exit" => break,
            _ => print_help(),
        }
    }

    Ok(())
}
