//! Herald agent-check daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   Load balancer                 ┌──────────────────────────────────────────┐
//!   agent-check probe             │                 HERALD                   │
//!   ──────────────────────────────┼─▶ net::Responder ──▶ agent::Scheduler    │
//!                                 │        │                  │  respond()    │
//!   "<token>\n", close            │        │                  ▼               │
//!   ◀─────────────────────────────┼────────┘            StateCache          │
//!                                 │                           ▲               │
//!                                 │    every interval         │ store         │
//!                                 │    agent::Sampler ────────┘               │
//!                                 │        │                                  │
//!                                 │        ├─▶ plugins::DataSource::run()     │
//!                                 │        └─▶ rules::RuleEngine::evaluate()  │
//!                                 │                                           │
//!                                 │   config · lifecycle · observability      │
//!                                 └──────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use herald::lifecycle::startup::{self, StartupOptions};
use herald::observability::logging::{self, LogLevel};

#[derive(Parser)]
#[command(name = "herald")]
#[command(about = "Agent-check daemon reporting backend load to a TCP load balancer", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "/etc/herald/config.toml")]
    config: PathBuf,

    /// Listen address, overridden by `bind` in the config file
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Listen port, overridden by `port` in the config file
    #[arg(short, long, default_value_t = 5555)]
    port: u16,

    #[arg(short, long, value_enum, default_value_t = LogLevel::Info)]
    loglevel: LogLevel,

    /// Plugin entry to run instead of the default one
    #[arg(long)]
    plugin: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.loglevel);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "herald starting");

    let options = StartupOptions {
        config_path: cli.config,
        bind: cli.bind,
        port: cli.port,
        plugin: cli.plugin,
    };

    match startup::run(&options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            ExitCode::from(e.exit_code())
        }
    }
}
