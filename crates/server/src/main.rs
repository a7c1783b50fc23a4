//! Waypoint Server
//!
//! Axum server exposing the query pipeline over HTTP with server-sent
//! progress events, plus a one-shot `run` command for the terminal.

mod api;
mod config;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use waypoint_core::skills::RadkitReasoning;
use waypoint_core::swarm::{Coordinator, Pipeline, ProgressBridge, StatusRegistry};
use waypoint_core::tools::CapabilityRegistry;

use api::AppState;
use config::{PersistedConfig, Settings};

#[derive(Parser, Debug)]
#[command(author, version, about = "Waypoint - plan, search and answer")]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (overrides config and WAYPOINT_PORT)
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },
    /// Answer one query in the terminal
    Run {
        query: String,
        /// Print every stage's details
        #[arg(long)]
        show_steps: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose => EnvFilter::new("debug"),
        Err(_) => EnvFilter::new("info"),
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

/// Config file, then environment, then CLI flags
async fn load_settings(cli: PersistedConfig) -> anyhow::Result<Settings> {
    let mut config = PersistedConfig::load().await;
    config.merge(PersistedConfig::from_env());
    config.merge(cli);
    Settings::resolve(config)
}

fn build_coordinator(settings: &Settings) -> Coordinator {
    let pipeline = Pipeline::standard(
        Arc::new(RadkitReasoning::new(settings.reasoning.clone())),
        CapabilityRegistry::with_defaults(settings.searxng_url.clone(), settings.search_max_results),
    );
    Coordinator::new(pipeline, StatusRegistry::new())
}

async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let coordinator = build_coordinator(&settings);
    let bridge = ProgressBridge::new(coordinator.clone())
        .with_poll_interval(Duration::from_millis(settings.poll_interval_ms));
    let addr = format!("{}:{}", settings.host, settings.port);

    let app = api::router(AppState {
        coordinator,
        bridge,
        settings: Arc::new(settings),
    });

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Waypoint server running at http://{}", addr);
    tracing::info!("   Agents: /api/v1/agents/run (POST, SSE), /api/v1/agents/status");
    tracing::info!("   Config: /api/v1/config (GET, PATCH)");
    tracing::info!("   Docs:   /api/v1/openapi.json");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_once(settings: Settings, query: &str, show_steps: bool) -> anyhow::Result<()> {
    let coordinator = build_coordinator(&settings);
    println!("🚀 Running query: {}", query);

    let mut runs = coordinator.run(query);
    let mut last_error: Option<String> = None;
    let mut final_state = None;
    while let Some(snapshot) = runs.next().await {
        println!("▶ {} -> {}", snapshot.stage, snapshot.next);
        if show_steps {
            if let Some(entry) = snapshot.state.message_log.last() {
                println!("   {}: {}", entry.sender, entry.content);
            }
            println!("{}", serde_json::to_string_pretty(&snapshot.state)?);
        }
        if snapshot.state.error != last_error {
            if let Some(error) = snapshot.state.error.as_deref() {
                eprintln!("⚠️ {}", error);
            }
            last_error = snapshot.state.error.clone();
        }
        final_state = Some(snapshot.state);
    }

    match final_state.and_then(|state| state.summary) {
        Some(summary) => {
            println!("\n{}", summary.answer_text);
            println!("\nConfidence: {}", summary.confidence);
            if let Some(limitations) = summary.limitations {
                println!("Limitations: {}", limitations);
            }
            Ok(())
        }
        None => anyhow::bail!("Run finished without a summary"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Some(CliCommand::Run { query, show_steps }) => {
            let settings = load_settings(PersistedConfig::default()).await?;
            run_once(settings, &query, show_steps).await
        }
        Some(CliCommand::Serve { port, host }) => {
            let settings = load_settings(PersistedConfig {
                port,
                host,
                ..Default::default()
            })
            .await?;
            run_server(settings).await
        }
        None => run_server(load_settings(PersistedConfig::default()).await?).await,
    }
}
