//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Select and instantiate the plugin, build its rules
//! - Start sampling, then bind the listener and serve
//!
//! # Design Decisions
//! - Fail fast: every configuration fault surfaces before the listener binds
//! - Subsystems initialize in order, not concurrently
//! - The listener starts last (traffic only when ready)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;

use crate::agent::{PluginSettings, Scheduler};
use crate::config::{load_config, AgentConfig, ConfigError, PluginEntry};
use crate::lifecycle::shutdown::ShutdownCoordinator;
use crate::lifecycle::signals;
use crate::net::{Listener, ListenerError, Responder};
use crate::observability::metrics;
use crate::plugins::{PluginRegistry, RegistryError};
use crate::rules::{RuleEngine, RuleError};

/// Fatal errors raised before the agent starts serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("plugin error: {0}")]
    Registry(#[from] RegistryError),

    #[error("no plugin entry named '{0}'")]
    NoMatchingPlugin(String),

    #[error("invalid rules for plugin '{name}': {error}")]
    Rules { name: String, error: RuleError },

    #[error("listener error: {0}")]
    Listener(#[from] ListenerError),
}

impl StartupError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            StartupError::NoMatchingPlugin(_) => 2,
            _ => 1,
        }
    }
}

/// Values coming from the command line.
#[derive(Debug, Clone)]
pub struct StartupOptions {
    pub config_path: PathBuf,
    pub bind: String,
    pub port: u16,
    /// Plugin entry to run instead of the default one.
    pub plugin: Option<String>,
}

/// Pick the plugin entry to run: the requested name, else the one marked
/// `default`, else the first.
pub fn select_entry<'a>(
    config: &'a AgentConfig,
    requested: Option<&str>,
) -> Result<&'a PluginEntry, StartupError> {
    let found = match requested {
        Some(name) => config.plugins.iter().find(|p| p.name == name),
        None => config
            .plugins
            .iter()
            .find(|p| p.default)
            .or_else(|| config.plugins.first()),
    };
    found.ok_or_else(|| StartupError::NoMatchingPlugin(requested.unwrap_or("default").to_string()))
}

/// A fully initialized agent, bound and ready to serve.
pub struct Agent {
    scheduler: Arc<Scheduler>,
    responder: Responder,
    coordinator: Arc<ShutdownCoordinator>,
    shutdown_rx: broadcast::Receiver<()>,
    drain_timeout: Duration,
}

impl Agent {
    /// Build every subsystem from a validated configuration.
    pub async fn prepare(config: &AgentConfig, options: &StartupOptions) -> Result<Self, StartupError> {
        let entry = select_entry(config, options.plugin.as_deref())?;

        let registry = PluginRegistry::with_builtin()?;
        let source = registry.instantiate(entry)?;
        let rules = RuleEngine::from_entry(entry).map_err(|error| StartupError::Rules {
            name: entry.name.clone(),
            error,
        })?;

        let settings = PluginSettings::from_entry(entry);
        let drain_timeout = settings.stop_timeout;
        let scheduler = Arc::new(Scheduler::new(settings, source, rules));
        scheduler.start();

        let address = config.listen_address(&options.bind, options.port);
        let listener = match Listener::bind(&address, config.max_connections).await {
            Ok(listener) => listener,
            Err(e) => {
                scheduler.stop().await;
                return Err(e.into());
            }
        };

        let coordinator = Arc::new(ShutdownCoordinator::new(scheduler.clone()));
        let shutdown_rx = coordinator.subscribe();
        let responder = Responder::new(listener, scheduler.clone());

        Ok(Self {
            scheduler,
            responder,
            coordinator,
            shutdown_rx,
            drain_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.responder.local_addr()
    }

    pub fn coordinator(&self) -> Arc<ShutdownCoordinator> {
        self.coordinator.clone()
    }

    pub fn scheduler(&self) -> Arc<Scheduler> {
        self.scheduler.clone()
    }

    /// Serve until the coordinator fires, then drain in-flight connections.
    pub async fn run(self) {
        match self.responder.local_addr() {
            Ok(addr) => tracing::info!(address = %addr, plugin = %self.scheduler.name(), "Serving agent checks"),
            Err(e) => tracing::warn!(error = %e, "Could not read listener address"),
        }

        let tracker = self.responder.serve(self.shutdown_rx).await;

        if !tracker.wait_idle(self.drain_timeout).await {
            tracing::warn!(
                active_connections = tracker.active_count(),
                "Connections still open after drain timeout"
            );
        }
        tracing::info!("Shutdown complete");
    }
}

/// Run the daemon until a termination signal is handled.
pub async fn run(options: &StartupOptions) -> Result<(), StartupError> {
    let config = load_config(&options.config_path)?;

    tracing::info!(
        path = %options.config_path.display(),
        plugins = config.plugins.len(),
        max_connections = config.max_connections,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let agent = Agent::prepare(&config, options).await?;
    signals::spawn(agent.coordinator());
    agent.run().await;
    Ok(())
}
