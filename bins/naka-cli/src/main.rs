//! naka-cli — Query a running naka-node or compute coefficients offline.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use naka_core::traits::CoefficientCalculator;
use naka_core::{Comparison, Fraction, StakeDistribution, ThresholdPolicy};
use naka_engine::ConcentrationEngine;
use naka_node_lib::api::{CoefficientRow, CoefficientsResponse};
use naka_node_lib::NodeConfig;

/// Command-line client for naka.
#[derive(Parser)]
#[command(name = "naka-cli")]
#[command(version, about = "Nakamoto coefficients across networks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every network's previous and current coefficient.
    Coefficients(QueryArgs),
    /// Show the node's last refresh cycle.
    Status(QueryArgs),
    /// Compute a coefficient from a distribution JSON file.
    Compute(ComputeArgs),
    /// Print the built-in network table.
    Networks,
}

#[derive(Args)]
struct QueryArgs {
    /// Base URL of a naka-node HTTP server.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Print raw JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ComputeArgs {
    /// JSON file holding a stake distribution.
    #[arg(short, long)]
    file: PathBuf,

    /// Threshold fraction, e.g. "1/3" or "0.33".
    #[arg(long)]
    threshold: Fraction,

    /// Boundary rule: strict_greater (>) or greater_or_equal (>=).
    #[arg(long)]
    comparison: Comparison,

    /// Allowed gap between an asserted total and the entry sum, in basis points.
    #[arg(long)]
    tolerance_bps: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Coefficients(args) => coefficients(args).await,
        Commands::Status(args) => status(args).await,
        Commands::Compute(args) => compute(args),
        Commands::Networks => networks(),
    }
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")
}

async fn get_json(url: &str) -> Result<serde_json::Value> {
    let resp = http_client()?
        .get(url)
        .send()
        .await
        .with_context(|| format!("Request to {url} failed"))?;
    if !resp.status().is_success() {
        bail!("{url} returned {}", resp.status());
    }
    resp.json().await.context("Response is not valid JSON")
}

async fn coefficients(args: QueryArgs) -> Result<()> {
    let url = format!("{}/naka-coeffs", args.url.trim_end_matches('/'));
    let body = get_json(&url).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let resp: CoefficientsResponse =
        serde_json::from_value(body).context("Unexpected response shape")?;
    print_table(&resp.coefficients);
    Ok(())
}

fn print_table(rows: &[CoefficientRow]) {
    println!("{:<8} {:<20} {:>6} {:>6} {:>7}", "TOKEN", "CHAIN", "PREV", "CURR", "CHANGE");
    for row in rows {
        println!(
            "{:<8} {:<20} {:>6} {:>6} {:>+7}",
            row.chain_token,
            row.chain_name,
            row.naka_co_prev_val,
            row.naka_co_curr_val,
            row.naka_co_change_val
        );
    }
}

async fn status(args: QueryArgs) -> Result<()> {
    let url = format!("{}/api/status", args.url.trim_end_matches('/'));
    let body = get_json(&url).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("\n=== NODE STATUS ===");
    println!("Version:    {}", body["version"].as_str().unwrap_or("?"));
    println!("Configured: {}", body["configured"]);
    println!("Published:  {}", body["published"]);
    let cycle = &body["last_cycle"];
    if cycle.is_null() {
        println!("No refresh cycle has finished yet.");
        return Ok(());
    }
    println!("\nCycle {} ({} → {})", cycle["cycle"], cycle["started_at"], cycle["finished_at"]);
    println!("Cancelled:  {}", cycle["cancelled"]);
    println!("Succeeded:  {}", cycle["succeeded"]);
    if let Some(failures) = cycle["failures"].as_array() {
        for f in failures {
            println!("  FAILED {}: {}", f["token"], f["cause"]);
        }
    }
    Ok(())
}

fn compute(args: ComputeArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let distribution: StakeDistribution =
        serde_json::from_str(&raw).context("File is not a valid stake distribution")?;

    let mut policy = ThresholdPolicy::new(args.threshold, args.comparison);
    if let Some(bps) = args.tolerance_bps {
        policy = policy.with_total_tolerance_bps(bps);
    }

    let result = ConcentrationEngine
        .compute(&distribution, &policy)
        .with_context(|| format!("Computing coefficient for {}", distribution.token))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn networks() -> Result<()> {
    let networks = NodeConfig::builtin_networks()?;
    println!("{:<8} {:<16} {:<12} {:<8} {:<18} {:<12}", "TOKEN", "CHAIN", "COLLECTOR", "FRACTION", "COMPARISON", "MODE");
    for n in networks {
        println!(
            "{:<8} {:<16} {:<12} {:<8} {:<18} {:<12}",
            n.token,
            n.chain_name,
            n.collector.kind(),
            n.threshold.to_string(),
            format!("{:?}", n.comparison),
            format!("{:?}", n.weight_mode)
        );
    }
    Ok(())
}
