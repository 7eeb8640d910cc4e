//! Interactive operator front end for the wsprobe harness.
//!
//! Thin glue only: reads line commands, sequences calls into the core, and
//! prints whatever the status reporter hands back.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use wsprobe_client::status::LogReporter;
use wsprobe_client::{
    ConfigRecord, ConfigStore, ConnectionManager, FileStore, KeyValueStore, MemoryStore,
    SessionProvisioner, StatusKind, StatusReporter,
};

const HELP: &str = "\
commands:
  show                 print the current config record
  set <field> <value>  update a config field (restBaseUrl, wsBaseUrl, username,
                       apiKey, sessionId, adminUsername, adminPassword)
  provision            exchange username/apiKey for a session token
  connect              open the broker connection
  disconnect           close the broker connection
  start                send the admin start signal
  quit                 exit";

fn set_field(record: &mut ConfigRecord, field: &str, value: &str) -> bool {
    let slot = match field {
        "restBaseUrl" => &mut record.rest_base_url,
        "wsBaseUrl" => &mut record.ws_base_url,
        "username" => &mut record.username,
        "apiKey" => &mut record.api_key,
        "sessionId" => &mut record.session_id,
        "adminUsername" => &mut record.admin_username,
        "adminPassword" => &mut record.admin_password,
        _ => return false,
    };
    *slot = value.to_string();
    true
}

fn show(record: &ConfigRecord) {
    println!("  restBaseUrl   = {}", record.rest_base_url);
    println!("  wsBaseUrl     = {}", record.ws_base_url);
    println!("  username      = {}", record.username);
    println!("  apiKey        = {}", record.api_key);
    println!("  sessionId     = {}", record.session_id);
    println!("  adminUsername = {}", record.admin_username);
    println!("  adminPassword = {}", record.admin_password);
}

#[tokio::main]
async fn main() -> Result<()> {
    wsprobe_client::logging::init();

    let store: Arc<dyn KeyValueStore> = match FileStore::new() {
        Some(fs) => Arc::new(fs),
        None => {
            tracing::warn!("no config directory available, settings will not persist");
            Arc::new(MemoryStore::new())
        }
    };
    let config = ConfigStore::new(store);
    let mut record = config.read();

    let reporter: Arc<dyn StatusReporter> = Arc::new(LogReporter);
    let manager = ConnectionManager::new(reporter.clone());
    let provisioner = SessionProvisioner::new();

    println!("wsprobe - exchange websocket harness");
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut parts = line.trim().splitn(3, ' ');
        match parts.next().unwrap_or("") {
            "" => {}
            "help" => println!("{HELP}"),
            "show" => show(&record),
            "set" => match (parts.next(), parts.next()) {
                (Some(field), Some(value)) => {
                    if set_field(&mut record, field, value) {
                        config.write(&record);
                    } else {
                        reporter.on_status(&format!("unknown field: {field}"), StatusKind::Error);
                    }
                }
                _ => reporter.on_status("usage: set <field> <value>", StatusKind::Error),
            },
            "provision" => {
                match provisioner
                    .provision(&record.rest_base_url, &record.username, &record.api_key)
                    .await
                {
                    Ok(token) => {
                        record.session_id = token.token;
                        config.write(&record);
                        reporter.on_status(
                            &format!("session provisioned for {}", token.username),
                            StatusKind::Ok,
                        );
                    }
                    Err(e) => reporter.on_status(&e.to_string(), StatusKind::Error),
                }
            }
            "connect" => {
                // Validation failures are already reported through the status
                // interface; nothing extra to do here.
                let _ = manager.connect(&record);
            }
            "disconnect" => manager.disconnect(),
            "start" => {
                if let Err(e) =
                    manager.send_start(&record.admin_username, &record.admin_password)
                {
                    reporter.on_status(&e.to_string(), StatusKind::Error);
                }
            }
            "quit" | "exit" => break,
            other => {
                reporter.on_status(&format!("unknown command: {other}"), StatusKind::Error);
            }
        }
    }

    manager.disconnect();
    Ok(())
}
