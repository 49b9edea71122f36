//! SwarmKV Client - interactive REPL for a swarm node
//!
//! Usage:
//!   swarmkv-client -H <host> -P <port>
//!
//! Commands are read one per line from standard input:
//!   GET <uuid>
//!   SET <uuid> <value>
//!   DELETE <uuid>

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::Mutex;
use uuid::Uuid;

use swarmkv::swarm::{validate_address, PeerInfo, SwarmView};

/// SwarmKV REPL client
#[derive(Parser)]
#[command(name = "swarmkv-client")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Contact node host
    #[arg(short = 'H', long = "host")]
    host: String,

    /// Contact node port
    #[arg(short = 'P', long = "port")]
    port: u16,
}

struct ClientState {
    contact_address: String,
    view: SwarmView,
}

struct Client {
    http: reqwest::Client,
    state: Mutex<ClientState>,
}

impl Client {
    async fn bootstrap(contact_address: String) -> Result<Self, String> {
        let http = reqwest::Client::new();
        let view = request_view(&http, &contact_address)
            .await
            .map_err(|e| format!("fatal: could not reach {contact_address}: {e}"))?;
        Ok(Self {
            http,
            state: Mutex::new(ClientState {
                contact_address,
                view,
            }),
        })
    }

    /// One tick of the view-refresh loop: re-request the view from the
    /// contact; on failure, fail over to the first cached peer that
    /// answers, and emit a reconnect notice.
    async fn refresh(&self) {
        let (contact_address, cached_peers) = {
            let state = self.state.lock().await;
            (state.contact_address.clone(), state.view.nodes.clone())
        };

        if let Ok(view) = request_view(&self.http, &contact_address).await {
            let mut state = self.state.lock().await;
            state.view = view;
            return;
        }

        for address in cached_peers.keys() {
            if *address == contact_address {
                continue;
            }
            if let Ok(view) = request_view(&self.http, address).await {
                let mut state = self.state.lock().await;
                state.contact_address = address.clone();
                state.view = view;
                notices::reconnected(address);
                return;
            }
        }
        // Every cached peer failed; keep the stale view until the next
        // user action also fails.
    }

    async fn ordered_peers(&self) -> Vec<PeerInfo> {
        self.state.lock().await.view.nodes.values().cloned().collect()
    }

    fn replication_factor_of(view: &SwarmView) -> usize {
        view.replication_factor
    }

    async fn get(&self, key: Uuid) -> String {
        let peers = self.ordered_peers().await;
        for peer in &peers {
            if let Some(value) = self.probe(&peer.address, key).await {
                return value;
            }
        }
        "Not found".to_string()
    }

    async fn set(&self, key: Uuid, value: String) -> String {
        let (peers, replication_factor) = {
            let state = self.state.lock().await;
            (
                state.view.nodes.values().cloned().collect::<Vec<_>>(),
                Self::replication_factor_of(&state.view),
            )
        };

        let mut holders: Vec<String> = Vec::new();
        for peer in &peers {
            if self.probe(&peer.address, key).await.is_some() {
                holders.push(peer.address.clone());
            }
        }

        if holders.is_empty() && peers.len() >= replication_factor {
            let mut candidates = peers;
            candidates.sort_by_key(|p| p.records_count);
            holders = candidates
                .into_iter()
                .take(replication_factor)
                .map(|p| p.address)
                .collect();
        }

        if holders.is_empty() {
            return "Failed to write/read an entry".to_string();
        }

        let value = value;
        let writes = holders.iter().map(|address| {
            let address = address.clone();
            let value = value.clone();
            async move { self.write(&address, key, &value).await }
        });
        let results = futures::future::join_all(writes).await;
        let successes = results.into_iter().filter(|ok| *ok).count();

        if successes == 0 {
            "Failed to write/read an entry".to_string()
        } else {
            format!("Created ({successes} replicas)")
        }
    }

    async fn delete(&self, key: Uuid) -> String {
        let peers = self.ordered_peers().await;
        let mut holders: Vec<String> = Vec::new();
        for peer in &peers {
            if self.probe(&peer.address, key).await.is_some() {
                holders.push(peer.address.clone());
            }
        }

        if holders.is_empty() {
            return "Error: not found".to_string();
        }

        let deletes = holders.iter().map(|address| {
            let address = address.clone();
            async move { self.delete_one(&address, key).await }
        });
        let results = futures::future::join_all(deletes).await;
        let successes = results.into_iter().filter(|ok| *ok).count();
        format!("Deleted ({successes} replicas)")
    }

    async fn probe(&self, address: &str, key: Uuid) -> Option<String> {
        let url = format!("http://{address}/find");
        let body = serde_json::json!({"command": "GET", "args": [key.to_string()]});
        let response = self.http.post(&url).json(&body).send().await.ok()?;
        if response.status() != reqwest::StatusCode::OK {
            return None;
        }
        let parsed: serde_json::Value = response.json().await.ok()?;
        parsed
            .get("value")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    async fn write(&self, address: &str, key: Uuid, value: &str) -> bool {
        let url = format!("http://{address}/set");
        let body = serde_json::json!({"command": "SET", "args": [key.to_string(), value]});
        matches!(
            self.http.post(&url).json(&body).send().await,
            Ok(r) if r.status() == reqwest::StatusCode::OK
        )
    }

    async fn delete_one(&self, address: &str, key: Uuid) -> bool {
        let url = format!("http://{address}/delete");
        let body = serde_json::json!({"command": "DELETE", "args": [key.to_string()]});
        matches!(
            self.http.post(&url).json(&body).send().await,
            Ok(r) if r.status() == reqwest::StatusCode::OK
        )
    }
}

async fn request_view(http: &reqwest::Client, address: &str) -> Result<SwarmView, reqwest::Error> {
    let url = format!("http://{address}/view");
    let response = http.post(&url).json(&serde_json::json!({})).send().await?;
    response.json::<SwarmView>().await
}

/// Parses a raw REPL line into a verb and validated UUIDv4 key, rejecting
/// anything malformed before any network I/O happens.
enum ParsedCommand {
    Get(Uuid),
    Set(Uuid, String),
    Delete(Uuid),
}

fn parse_line(line: &str) -> Result<ParsedCommand, String> {
    let line = line.trim();
    if line.is_empty() {
        return Err("Empty value.".to_string());
    }
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 2 {
        return Err("Wrong command value.".to_string());
    }
    let verb = fields[0];
    let args = &fields[1..];

    match verb {
        "GET" | "DELETE" => {
            if args.len() != 1 {
                return Err("Wrong command arguments count.".to_string());
            }
            let key = parse_uuid4(args[0])?;
            if verb == "GET" {
                Ok(ParsedCommand::Get(key))
            } else {
                Ok(ParsedCommand::Delete(key))
            }
        }
        "SET" => {
            if args.len() != 2 {
                return Err("Wrong command arguments count.".to_string());
            }
            let key = parse_uuid4(args[0])?;
            Ok(ParsedCommand::Set(key, args[1].to_string()))
        }
        _ => Err("Unsupported command.".to_string()),
    }
}

/// Not just any UUID: the key must parse *and* carry version 4.
fn parse_uuid4(raw: &str) -> Result<Uuid, String> {
    let key = Uuid::parse_str(raw).map_err(|_| "Error: Key is not a proper UUID4".to_string())?;
    if key.get_version_num() != 4 {
        return Err("Error: Key is not a proper UUID4".to_string());
    }
    Ok(key)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if validate_address(&format!("{}:{}", cli.host, cli.port)).is_err() {
        eprintln!("Usage: swarmkv-client -H <host> -P <port>");
        std::process::exit(1);
    }

    let contact_address = format!("{}:{}", cli.host, cli.port);
    let client = match Client::bootstrap(contact_address.clone()).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    let client = Arc::new(client);

    {
        let state = client.state.lock().await;
        notices::connected(&state.contact_address, state.view.nodes.keys());
    }

    let refresher = Arc::clone(&client);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            refresher.refresh().await;
        }
    });

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(_)) => {
                eprintln!("Input error.");
                continue;
            }
            None => break,
        };

        match parse_line(&line) {
            Ok(ParsedCommand::Get(key)) => {
                println!("{}", client.get(key).await);
            }
            Ok(ParsedCommand::Set(key, value)) => {
                println!("{}", client.set(key, value).await);
            }
            Ok(ParsedCommand::Delete(key)) => {
                println!("{}", client.delete(key).await);
            }
            Err(message) => {
                eprintln!("{message}");
            }
        }
        io::stdout().flush().ok();
    }
}

/// Startup/reconnect notices printed to the terminal.
mod notices {
    pub fn connected<'a>(contact_address: &str, known: impl Iterator<Item = &'a String>) {
        println!("Connected to a database of Warehouse 13 at {contact_address}");
        println!("Known nodes:");
        for address in known {
            println!("{address}");
        }
    }

    pub fn reconnected(address: &str) {
        println!("Reconnected to a database of Warehouse 13 at {address}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_uuid4() {
        assert!(parse_uuid4("not-a-uuid").is_err());
        // A valid UUID but version 1, not 4.
        assert!(parse_uuid4("6fa459ea-ee8a-1ce9-bf5e-9cf2d4a07d7e").is_err());
    }

    #[test]
    fn accepts_uuid4() {
        assert!(parse_uuid4("550e8400-e29b-41d4-a716-446655440000").is_ok());
    }

    #[test]
    fn parse_line_rejects_wrong_arg_counts() {
        assert!(parse_line("GET a b").is_err());
        assert!(parse_line("SET a").is_err());
        assert!(parse_line("DELETE").is_err());
    }

    #[test]
    fn parse_line_rejects_unknown_verb() {
        assert!(matches!(parse_line("PING 1"), Err(_)));
    }

    #[test]
    fn parse_line_accepts_well_formed_set() {
        let parsed =
            parse_line("SET 550e8400-e29b-41d4-a716-446655440000 hello").unwrap();
        assert!(matches!(parsed, ParsedCommand::Set(_, ref v) if v == "hello"));
    }
}
