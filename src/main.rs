use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod client;
mod cluster;
mod error;
mod load_generator;
mod metrics;
mod node;
mod sampler;
mod stats;

use error::MonitorError;
use node::Node;
use sampler::{NodeConn, Sampler};

/// Per-command OPS monitor and seeding benchmark for Redis.
#[derive(Debug, Parser)]
#[command(name = "redis-cmdwatch", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll command statistics across servers and print one rate line
    /// per interval.
    Watch(WatchArgs),
    /// Seed synthetic keys into one server and report write latency and
    /// memory cost.
    Seed(SeedArgs),
}

#[derive(Debug, Args)]
struct WatchArgs {
    /// Server to monitor, as HOST:PORT. Repeat to monitor several servers.
    #[arg(long = "host-port", value_name = "HOST:PORT", required = true)]
    host_port: Vec<String>,

    /// Treat the first --host-port as a cluster seed: the monitored set
    /// becomes every master reported by CLUSTER NODES.
    #[arg(long)]
    cluster: bool,

    /// Comma-separated commands to track by name. When non-empty,
    /// --ignore-commands has no effect.
    #[arg(long, value_name = "CSV", default_value = "")]
    commands: String,

    /// Comma-separated commands folded into ETC. Applied only when
    /// --commands is empty.
    #[arg(long, value_name = "CSV", default_value_t = stats::IGNORE_CMDS.join(","))]
    ignore_commands: String,

    /// Password forwarded to every node connection.
    #[arg(long)]
    password: Option<String>,

    /// Seconds between sampling iterations.
    #[arg(long, default_value_t = 1)]
    interval: u64,
}

#[derive(Debug, Args)]
struct SeedArgs {
    /// Server to seed, as HOST:PORT.
    #[arg(long = "host-port", value_name = "HOST:PORT")]
    host_port: String,

    /// Password for the connection.
    #[arg(long)]
    password: Option<String>,

    /// Number of synthetic keys to write.
    #[arg(long, default_value_t = 10_000)]
    keys: u64,

    /// Value shape for each key.
    #[arg(long, value_enum, default_value = "string")]
    value_kind: load_generator::ValueKind,

    /// Payload size in bytes.
    #[arg(long, default_value_t = 64)]
    value_size: usize,

    /// Emit the report as one JSON object instead of the text block.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Watch(args) => run_watch(args).await,
        Command::Seed(args) => run_seed(args).await,
    };

    if let Err(err) = result {
        error!("{err:#}");
        std::process::exit(1);
    }
}

// ─── watch ───────────────────────────────────────────────────────

async fn run_watch(args: WatchArgs) -> anyhow::Result<()> {
    let mut nodes = args
        .host_port
        .iter()
        .map(|s| s.parse::<Node>())
        .collect::<Result<Vec<_>, _>>()?;

    if args.cluster {
        let seed = nodes.first().cloned().ok_or(MonitorError::NoNodes)?;
        nodes = cluster::discover_master_nodes(&seed, args.password.as_deref()).await;
    }
    if nodes.is_empty() {
        return Err(MonitorError::NoNodes.into());
    }

    let allow = stats::parse_csv(&args.commands);
    let deny = stats::parse_csv(&args.ignore_commands);
    print_banner(&nodes, args.cluster, &allow, &deny);

    // One long-lived connection per node, reused by every iteration.
    let mut conns = Vec::with_capacity(nodes.len());
    for node in &nodes {
        let conn = client::connect(node, args.password.as_deref())
            .await
            .with_context(|| format!("connecting to {node}"))?;
        conns.push(NodeConn {
            node: node.clone(),
            conn,
        });
    }

    let shutdown = CancellationToken::new();
    spawn_ctrl_c_listener(shutdown.clone());

    let filter = stats::CommandFilter::new(allow, deny);
    Sampler::new(conns, filter, Duration::from_secs(args.interval))
        .run(shutdown)
        .await?;

    Ok(())
}

fn print_banner(nodes: &[Node], cluster: bool, allow: &[String], deny: &[String]) {
    println!("-----------------------------------");
    println!("* Servers:");
    for node in nodes {
        println!("    {node}");
    }
    println!();
    println!("* Number of Servers: {}", nodes.len());
    println!("* Cluster : {cluster}");
    println!("* Command: {}", allow.join(", "));
    println!("* Ignore Command: {}", deny.join(", "));
    println!("-----------------------------------");
}

fn spawn_ctrl_c_listener(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
}

// ─── seed ────────────────────────────────────────────────────────

async fn run_seed(args: SeedArgs) -> anyhow::Result<()> {
    let node: Node = args.host_port.parse()?;
    let conn = client::connect(&node, args.password.as_deref())
        .await
        .with_context(|| format!("connecting to {node}"))?;

    println!(
        "Seeding {} {} keys into {}...",
        args.keys,
        args.value_kind.label(),
        node
    );

    let report = load_generator::run(
        conn,
        load_generator::SeedConfig {
            keys: args.keys,
            value_kind: args.value_kind,
            value_size: args.value_size,
        },
    )
    .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print_human();
    }

    Ok(())
}
