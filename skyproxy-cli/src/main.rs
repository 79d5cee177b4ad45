//! skyproxy CLI
//!
//! Runs the caching weather proxy, or talks to the upstream directly.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skyproxy_api::{ApiConfig, ApiServer};
use skyproxy_core::traits::WeatherFetcher;
use skyproxy_upstream::OpenMeteoClient;

/// skyproxy - caching, rate-limited weather API proxy
#[derive(Parser)]
#[command(name = "skyproxy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080", env = "SKYPROXY_PORT")]
        port: u16,
        /// Bind address
        #[arg(short, long, default_value = "0.0.0.0", env = "SKYPROXY_BIND")]
        bind: String,
    },

    /// Fetch the forecast once, bypassing the cache
    Fetch {
        /// Print the raw upstream JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Serve { port, bind } => cmd_serve(port, &bind).await,
        Commands::Fetch { json } => cmd_fetch(json).await,
        Commands::Config => cmd_config(),
    }
}

fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        "skyproxy=debug,tower_http=debug"
    } else {
        "skyproxy=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

fn load_config() -> Result<ApiConfig> {
    let config = ApiConfig::from_env().context("Failed to read configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Run the proxy server
async fn cmd_serve(port: u16, bind: &str) -> Result<()> {
    let config = load_config()?;

    println!("{}", "🌤  Starting skyproxy...".cyan().bold());
    println!("   {} http://{}:{}/api/weather", "Listening on:".green(), bind, port);
    println!("   {} http://{}:{}/health", "Health check:".dimmed(), bind, port);
    println!("   {} {}", "Upstream:".dimmed(), config.upstream.url);
    println!(
        "   {} {}s, {} {} req/{}s ({})",
        "Cache TTL:".dimmed(),
        config.cache.ttl_seconds,
        "rate limit:".dimmed(),
        config.rate_limit.max_requests,
        config.rate_limit.window_seconds,
        config.rate_limit.policy,
    );
    println!("\n   Press Ctrl+C to stop.\n");

    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;
    let server = ApiServer::new(config).context("Failed to build server")?;
    server.run(addr).await.context("Server error")?;

    Ok(())
}

/// Fetch the forecast once
async fn cmd_fetch(json: bool) -> Result<()> {
    let config = load_config()?;
    let client = OpenMeteoClient::with_config(config.upstream)
        .context("Failed to build upstream client")?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message(format!("Fetching {}", client.describe()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let started = std::time::Instant::now();
    let result = client.fetch().await;
    spinner.finish_and_clear();

    let payload = result.context("Upstream fetch failed")?;
    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Fetch complete");

    if json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("{}", "🌡  Current forecast".green().bold());
    match (payload.latitude(), payload.longitude()) {
        (Some(lat), Some(lon)) => println!("   {} {:.2}, {:.2}", "Location:".dimmed(), lat, lon),
        _ => println!("   {} unknown", "Location:".dimmed()),
    }
    match payload.current_temperature() {
        Some(temp) => println!("   {} {:.1} °C", "Now:".dimmed(), temp),
        None => println!("   {} n/a", "Now:".dimmed()),
    }
    if let Some(hourly) = payload.hourly_temperatures() {
        let min = hourly.iter().copied().fold(f64::INFINITY, f64::min);
        let max = hourly.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !hourly.is_empty() {
            println!(
                "   {} {} values, {:.1} to {:.1} °C",
                "Hourly:".dimmed(),
                hourly.len(),
                min,
                max
            );
        }
    }
    if !payload.has_required_fields() {
        println!("   {} payload is missing expected fields", "⚠".yellow());
    }
    println!("   {} {:?}", "Took:".dimmed(), started.elapsed());

    Ok(())
}

/// Print the effective configuration
fn cmd_config() -> Result<()> {
    let config = ApiConfig::from_env().context("Failed to read configuration")?;
    println!("{}", serde_json::to_string_pretty(&config)?);

    if let Err(err) = config.validate() {
        println!("\n{} {}", "✗".red(), err);
    } else {
        println!("\n{} configuration is valid", "✓".green());
    }
    Ok(())
}
