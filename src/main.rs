//! SwarmKV - Gossip-Replicated In-Memory Key-Value Swarm
//!
//! A node binary: binds a request surface, joins an existing swarm if
//! told to, and runs the heartbeat broadcaster and pruner until signaled
//! to stop.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swarmkv::config::NodeConfig;
use swarmkv::error::{Error, Result};
use swarmkv::heartbeat::{request_view, HeartbeatEngine};
use swarmkv::store::RecordStore;
use swarmkv::swarm::{validate_address, PeerInfo, Swarm};
use swarmkv::api::HttpServer;

/// SwarmKV - gossip-replicated in-memory key-value swarm node
#[derive(Parser)]
#[command(name = "swarmkv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file. When given, overrides -H/-P/etc below.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Host/address to bind (must be host:port, port 1-65535)
    #[arg(short = 'H', long = "host")]
    host: Option<String>,

    /// Port to bind (must be 1-65535)
    #[arg(short = 'P', long = "port")]
    port: Option<u16>,

    /// Replication factor: number of nodes that should hold any given key.
    /// Defaults to the config file's value, or 2 if neither is given.
    #[arg(long = "replication_factor")]
    replication_factor: Option<usize>,

    /// Existing node host to join through (optional; requires EP too)
    #[arg(long = "EH")]
    existing_host: Option<String>,

    /// Existing node port to join through (optional; requires EH too)
    #[arg(long = "EP")]
    existing_port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file without starting the node
    CheckConfig {
        /// Path to config file to check (defaults to --config path)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if let Some(Commands::CheckConfig { file }) = &cli.command {
        let path = file.clone().or_else(|| cli.config.clone());
        return run_check_config(path);
    }

    match resolve_config(&cli) {
        Ok(config) => run_node(config).await,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

fn init_logging(level: &str) {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build a `NodeConfig` from `--config` (if given) with any explicitly-set
/// `-H/-P/-replication_factor/-EH/-EP` flags applied on top, so CLI flags
/// win over the file when both are given. Without `--config`, `-H`/`-P`
/// are required, exactly as the bare-flags protocol in the external
/// interface demands.
fn resolve_config(cli: &Cli) -> Result<NodeConfig> {
    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_file(path)?,
        None => {
            let host = cli
                .host
                .as_ref()
                .ok_or_else(|| Error::Config("-H/--host is required".into()))?;
            let port = cli
                .port
                .ok_or_else(|| Error::Config("-P/--port is required".into()))?;
            let bind_address = format!("{host}:{port}");
            validate_address(&bind_address)?;
            NodeConfig::default_with_bind(bind_address)
        }
    };

    if let (Some(host), Some(port)) = (&cli.host, cli.port) {
        let bind_address = format!("{host}:{port}");
        validate_address(&bind_address)?;
        config.node.bind_address = bind_address;
    }

    if let Some(replication_factor) = cli.replication_factor {
        if replication_factor == 0 {
            return Err(Error::Config("replication_factor must be >= 1".into()));
        }
        config.cluster.replication_factor = replication_factor;
    }

    match (&cli.existing_host, cli.existing_port) {
        (None, None) => {}
        (Some(h), Some(p)) => {
            let addr = format!("{h}:{p}");
            validate_address(&addr)?;
            config.cluster.existing_address = Some(addr);
        }
        (Some(_), None) => {
            return Err(Error::Config("-EP is required when -EH is given".into()))
        }
        (None, Some(_)) => {
            return Err(Error::Config("-EH is required when -EP is given".into()))
        }
    }

    config.logging.level = cli.log_level.clone();
    config.validate()?;
    Ok(config)
}

fn run_check_config(path: Option<PathBuf>) -> Result<()> {
    let Some(path) = path else {
        eprintln!("Error: no config file given (pass --config or check-config --file)");
        std::process::exit(1);
    };

    println!();
    println!("SwarmKV Configuration Check");
    println!("===========================");
    println!();

    if !path.exists() {
        println!("ERROR: config file not found: {}", path.display());
        std::process::exit(1);
    }
    println!("OK  config file: {}", path.display());

    match NodeConfig::from_file(&path) {
        Ok(config) => {
            println!("OK  config parses as valid TOML");
            println!("OK  node.bind_address: {}", config.node.bind_address);
            println!("OK  cluster.replication_factor: {}", config.cluster.replication_factor);
            if let Some(existing) = &config.cluster.existing_address {
                println!("OK  cluster.existing_address: {existing}");
            } else {
                println!("--  cluster.existing_address: unset, will start standalone");
            }
            println!("OK  logging.level: {}", config.logging.level);
            Ok(())
        }
        Err(e) => {
            println!("ERROR: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_node(config: NodeConfig) -> Result<()> {
    tracing::info!("starting SwarmKV node on {}", config.node.bind_address);

    let store = Arc::new(RecordStore::new());
    let http = reqwest::Client::new();

    let swarm = if let Some(existing) = &config.cluster.existing_address {
        tracing::info!("joining swarm via {existing}");
        let seed_view = request_view(
            &http,
            existing,
            Some(PeerInfo {
                address: config.node.bind_address.clone(),
                records_count: 0,
            }),
        )
        .await?;
        Arc::new(Swarm::from_seed_view(
            config.node.bind_address.clone(),
            seed_view,
        ))
    } else {
        tracing::info!("no existing swarm given, starting standalone");
        Arc::new(Swarm::standalone(
            config.node.bind_address.clone(),
            config.cluster.replication_factor,
        ))
    };

    let http_server = HttpServer::new(
        config.node.bind_address.clone(),
        Arc::clone(&store),
        Arc::clone(&swarm),
    );

    let heartbeat = Arc::new(HeartbeatEngine::new(
        Arc::clone(&swarm),
        Arc::clone(&store),
        config.heartbeat_interval(),
        config.prune_timeout(),
    ));
    let broadcaster_engine = Arc::clone(&heartbeat);
    let pruner_engine = Arc::clone(&heartbeat);

    tokio::select! {
        result = http_server.start() => {
            if let Err(e) = result {
                tracing::error!("request surface error: {e}");
            }
        }
        _ = broadcaster_engine.run_broadcaster() => {}
        _ = pruner_engine.run_pruner() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
    }

    tracing::info!("SwarmKV node shutdown complete");
    Ok(())
}
