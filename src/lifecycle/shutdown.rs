//! Shutdown coordination for the agent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::agent::Scheduler;

/// Coordinator for graceful shutdown.
///
/// The first trigger stops the scheduler, then tells every subscriber (the
/// responder's accept loop) to wind down. Later triggers are ignored.
pub struct ShutdownCoordinator {
    stopping: AtomicBool,
    scheduler: Arc<Scheduler>,
    tx: broadcast::Sender<()>,
}

impl ShutdownCoordinator {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            stopping: AtomicBool::new(false),
            scheduler,
            tx,
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Run the shutdown sequence once. Returns false if it already ran.
    pub async fn trigger(&self) -> bool {
        if self.stopping.swap(true, Ordering::SeqCst) {
            tracing::info!("Stop is already in progress");
            return false;
        }

        tracing::info!("Shutting down");
        let outcome = self.scheduler.stop().await;
        tracing::debug!(outcome = ?outcome, "Scheduler stopped");

        // No receivers just means nothing is serving yet.
        let _ = self.tx.send(());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Phase, PluginSettings};
    use crate::config::{PluginEntry, RuleEntry};
    use crate::plugins::static_value::StaticSource;
    use crate::rules::RuleEngine;
    use tokio::sync::broadcast::error::TryRecvError;

    fn coordinator() -> (Arc<Scheduler>, ShutdownCoordinator) {
        let mut entry = PluginEntry::new("queue", "static");
        entry.interval = 60;
        entry.thresholds = vec![RuleEntry::new("up", "<7000")];
        let scheduler = Arc::new(Scheduler::new(
            PluginSettings::from_entry(&entry),
            Arc::new(StaticSource::new(serde_json::json!(1))),
            RuleEngine::from_entry(&entry).unwrap(),
        ));
        scheduler.start();
        (scheduler.clone(), ShutdownCoordinator::new(scheduler))
    }

    #[tokio::test]
    async fn second_trigger_is_ignored() {
        let (scheduler, coordinator) = coordinator();
        let mut rx = coordinator.subscribe();

        assert!(coordinator.trigger().await);
        assert!(coordinator.is_stopping());
        assert_eq!(scheduler.phase(), Phase::Stopped);
        assert!(rx.try_recv().is_ok());

        assert!(!coordinator.trigger().await);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn concurrent_triggers_tear_down_once() {
        let (_scheduler, coordinator) = coordinator();
        let coordinator = Arc::new(coordinator);
        let mut rx = coordinator.subscribe();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let c = coordinator.clone();
                tokio::spawn(async move { c.trigger().await })
            })
            .collect();

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert!(rx.try_recv().is_ok());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }
}
