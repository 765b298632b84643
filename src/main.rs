//! WolfGate command-line harness.
//!
//! Connects to a TWS-compatible gateway, runs one manager to completion and
//! prints the collected state as JSON.

mod report;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use report::{AccountSummaryReport, CurrentTimeReport, PositionsReport, Report, Session};
use wolfgate_engine::managers::{AccountSummaryManager, CurrentTimeManager, PositionsManager};
use wolfgate_engine::{sink_manager, Engine, EngineError, EngineOptions, Framing};

/// WolfGate -- gateway client engine harness.
#[derive(Parser, Debug)]
#[command(name = "wolfgate", version = "1.0.0")]
struct Args {
    /// Engine options file (JSON). Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Gateway host
    #[arg(long)]
    host: Option<String>,

    /// Gateway port
    #[arg(long)]
    port: Option<u16>,

    /// Client ID
    #[arg(long = "client-id")]
    client_id: Option<i32>,

    /// Wire framing
    #[arg(long, value_enum)]
    framing: Option<FramingArg>,

    /// Seconds to wait for the operation to complete
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FramingArg {
    Legacy,
    V100,
}

impl From<FramingArg> for Framing {
    fn from(arg: FramingArg) -> Self {
        match arg {
            FramingArg::Legacy => Framing::Legacy,
            FramingArg::V100 => Framing::V100,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask the server for its clock
    CurrentTime,
    /// Snapshot of all positions
    Positions,
    /// Account summary values
    AccountSummary {
        /// Account group
        #[arg(long, default_value = "All")]
        group: String,

        /// Comma-separated tags
        #[arg(
            long,
            value_delimiter = ',',
            default_value = "NetLiquidation,TotalCashValue,BuyingPower"
        )]
        tags: Vec<String>,
    },
}

fn load_options(args: &Args) -> Result<EngineOptions, String> {
    let mut options = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            serde_json::from_str(&text)
                .map_err(|e| format!("invalid options in {}: {e}", path.display()))?
        }
        None => EngineOptions::default(),
    };
    if let Some(host) = &args.host {
        options.host = host.clone();
    }
    if let Some(port) = args.port {
        options.port = port;
    }
    if let Some(client_id) = args.client_id {
        options.client_id = client_id;
    }
    if let Some(framing) = args.framing {
        options.framing = framing.into();
    }
    Ok(options)
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("failed to serialize report: {e}"),
    }
}

fn session(engine: &Engine) -> Session {
    Session {
        address: engine.options().address(),
        server_version: engine.server_version(),
        server_time: engine.server_time().to_string(),
        client_id: engine.client_id(),
    }
}

async fn run(engine: &Engine, command: &Command, timeout: Duration) -> Result<(), EngineError> {
    match command {
        Command::CurrentTime => {
            let clock = CurrentTimeManager::start(engine).await?;
            let (_, outcome) = sink_manager(clock.manager(), timeout, 1).await;
            outcome?;
            let data = CurrentTimeReport {
                session: session(engine),
                time: clock.time(),
            };
            print_json(&Report::success("current time", data));
        }
        Command::Positions => {
            let positions = PositionsManager::start(engine).await?;
            let (updates, outcome) = sink_manager(positions.manager(), timeout, usize::MAX).await;
            outcome?;
            let rows = positions.positions();
            let data = PositionsReport {
                session: session(engine),
                updates,
                count: rows.len(),
                positions: rows,
            };
            print_json(&Report::success("positions", data));
        }
        Command::AccountSummary { group, tags } => {
            let summary = AccountSummaryManager::start(engine, group, tags.clone()).await?;
            let (updates, outcome) = sink_manager(summary.manager(), timeout, usize::MAX).await;
            outcome?;
            let data = AccountSummaryReport {
                session: session(engine),
                updates,
                req_id: summary.req_id(),
                values: summary.values(),
            };
            print_json(&Report::success("account summary", data));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let options = match load_options(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        address = %options.address(),
        client_id = options.client_id,
        framing = ?options.framing,
        "connecting"
    );

    let engine = match Engine::connect(options).await {
        Ok(engine) => engine,
        Err(e) => {
            print_json(&Report::failure("connect", &e));
            std::process::exit(1);
        }
    };

    // Ctrl+C stops the engine; running managers then close with what they have.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let shutdown_tx = Arc::new(std::sync::Mutex::new(Some(shutdown_tx)));
    let handler = ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl+C, shutting down...");
        if let Ok(mut slot) = shutdown_tx.lock() {
            if let Some(tx) = slot.take() {
                let _ = tx.send(());
            }
        }
    });
    if let Err(e) = handler {
        tracing::warn!(error = %e, "Ctrl+C handler not installed");
    }
    {
        let engine = engine.clone();
        tokio::spawn(async move {
            if shutdown_rx.await.is_ok() {
                engine.stop().await;
            }
        });
    }

    let timeout = Duration::from_secs(args.timeout);
    let outcome = run(&engine, &args.command, timeout).await;
    engine.stop().await;

    if let Err(e) = outcome {
        print_json(&Report::failure("request failed", &e));
        std::process::exit(1);
    }
}
