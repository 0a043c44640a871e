//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGINT and SIGTERM (Ctrl+C elsewhere)
//! - Hand every signal to the shutdown coordinator, which ignores repeats
//!
//! # Design Decisions
//! - Handlers are registered before `spawn` returns, so a signal sent once
//!   the agent is serving is never lost to the default disposition

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::ShutdownCoordinator;

/// Register the signal handlers and spawn the task forwarding them.
pub fn spawn(coordinator: Arc<ShutdownCoordinator>) -> Option<JoinHandle<()>> {
    match Signals::install() {
        Ok(signals) => Some(tokio::spawn(signals.forward(coordinator))),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install signal handlers");
            None
        }
    }
}

#[cfg(unix)]
struct Signals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn forward(mut self, coordinator: Arc<ShutdownCoordinator>) {
        loop {
            let name = tokio::select! {
                _ = self.interrupt.recv() => "SIGINT",
                _ = self.terminate.recv() => "SIGTERM",
            };
            dispatch(&coordinator, name);
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn forward(self, coordinator: Arc<ShutdownCoordinator>) {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                return;
            }
            dispatch(&coordinator, "ctrl-c");
        }
    }
}

fn dispatch(coordinator: &Arc<ShutdownCoordinator>, signal: &'static str) {
    tracing::info!(signal, "Signal received");
    let coordinator = coordinator.clone();
    tokio::spawn(async move {
        coordinator.trigger().await;
    });
}
