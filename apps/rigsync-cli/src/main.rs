mod scenario;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rigsync_common::FieldId;
use rigsync_net::NetConfig;
use tracing_subscriber::EnvFilter;

use crate::scenario::{Scenario, Summary};

#[derive(Parser)]
#[command(name = "rigsync-cli", about = "CLI tool for rigidbody replication")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and the replicated field table
    Info,
    /// Run a built-in session with owned and server bodies
    Simulate {
        /// Number of network ticks to run
        #[arg(short, long, default_value = "100")]
        ticks: u64,
        /// Number of clients joining the session
        #[arg(short, long, default_value = "3")]
        clients: u32,
        /// RNG seed for packet loss and reordering
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Probability of dropping an unreliable packet
        #[arg(short, long, default_value = "0.0")]
        loss: f32,
        /// Swap adjacent unreliable packets at random
        #[arg(short, long)]
        reorder: bool,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a scenario described in a YAML file
    Scenario {
        path: PathBuf,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("rigsync-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("replicated fields:");
            for field in FieldId::ALL {
                println!("  {field:?}: {:?}", field.delivery());
            }
        }
        Commands::Simulate {
            ticks,
            clients,
            seed,
            loss,
            reorder,
            json,
        } => {
            let net = NetConfig {
                unreliable_loss: loss,
                reorder_unreliable: reorder,
                seed,
            };
            let scenario = scenario::demo(clients, ticks, net);
            tracing::info!(clients, ticks, seed, loss, reorder, "simulating");
            let summary = scenario::run(&scenario)?;
            report(&summary, json)?;
        }
        Commands::Scenario { path, json } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let scenario = Scenario::from_yaml(&text)?;
            tracing::info!(path = %path.display(), bodies = scenario.bodies.len(), "running scenario");
            let summary = scenario::run(&scenario)?;
            report(&summary, json)?;
        }
    }

    Ok(())
}

fn report(summary: &Summary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!(
        "Session: ticks={}, clients={}, envelopes={}, applied={}, rejected={}",
        summary.ticks,
        summary.clients,
        summary.session.envelopes_sent,
        summary.session.updates_applied,
        summary.session.rejected
    );
    let net = &summary.network;
    println!(
        "Network: sent={}, delivered={}, dropped={}, reordered={}, bytes={}",
        net.sent, net.delivered, net.dropped, net.reordered, net.bytes
    );
    for body in &summary.bodies {
        let authority = body
            .authority
            .map(|p| p.to_string())
            .unwrap_or_else(|| "none".into());
        println!(
            "Body {}: authority={}, velocity={:?}, divergence={:.4} (max {:.4})",
            body.index, authority, body.velocity, body.final_divergence, body.max_divergence
        );
    }
    Ok(())
}
