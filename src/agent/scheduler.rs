//! Sampling task lifecycle and request-time response selection.
//!
//! # Responsibilities
//! - Run the sampler periodically in a background task
//! - Sample inline per request when no interval is configured
//! - Substitute the staleness response for outdated state
//! - Stop the task within a bounded time
//!
//! # Design Decisions
//! - The sleep between cycles is cancellable, stop never waits a full interval
//! - A cycle stuck in `run()` is aborted after `stop_timeout`
//! - Stopping twice is a no-op

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::agent::sampler::Sampler;
use crate::agent::settings::PluginSettings;
use crate::agent::state::State;
use crate::observability::metrics;
use crate::plugins::DataSource;
use crate::rules::RuleEngine;

/// Scheduler lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// How a call to [`Scheduler::stop`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No background task existed (synchronous mode or never started).
    NoTask,
    /// The task finished its current cycle and exited.
    Graceful,
    /// The task did not exit within `stop_timeout` and was aborted.
    Aborted,
    /// Another caller already stopped or is stopping the scheduler.
    AlreadyStopping,
}

/// Drives one plugin instance.
#[derive(Debug)]
pub struct Scheduler {
    settings: PluginSettings,
    sampler: Arc<Sampler>,
    phase: Mutex<Phase>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(settings: PluginSettings, source: Arc<dyn DataSource>, rules: RuleEngine) -> Self {
        let sampler = Arc::new(Sampler::new(&settings, source, rules));
        Self {
            settings,
            sampler,
            phase: Mutex::new(Phase::Idle),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &PluginSettings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        *lock(&self.phase)
    }

    /// Current cached state.
    pub fn snapshot(&self) -> Arc<State> {
        self.sampler.state().load()
    }

    /// Start sampling. In periodic mode this spawns the background task.
    ///
    /// Must be called from within a Tokio runtime. Calling it again is a no-op.
    pub fn start(&self) {
        // Held until the handle is stored so a concurrent stop() cannot miss it.
        let mut task = lock(&self.task);
        {
            let mut phase = lock(&self.phase);
            if *phase != Phase::Idle {
                tracing::debug!(plugin = %self.name(), phase = ?*phase, "Scheduler already started");
                return;
            }
            *phase = Phase::Running;
        }

        if self.settings.is_synchronous() {
            tracing::info!(plugin = %self.name(), "Sampling on every request");
            return;
        }

        tracing::info!(
            plugin = %self.name(),
            interval_secs = self.settings.interval.as_secs(),
            "Starting periodic sampling"
        );
        let handle = tokio::spawn(sample_loop(
            self.sampler.clone(),
            self.settings.interval,
            self.cancel.clone(),
        ));
        *task = Some(handle);
    }

    /// Produce the token for one agent-check request.
    pub async fn respond(&self) -> String {
        if self.settings.is_synchronous() && !self.cancel.is_cancelled() {
            // Failures are logged by the sampler; the previous state stays.
            let _ = self.sampler.cycle().await;
        }

        let state = self.snapshot();
        let stale = state.is_stale(self.settings.staleness_interval, Instant::now());
        metrics::record_response(self.name(), stale);

        if stale {
            tracing::warn!(
                plugin = %self.name(),
                age_secs = state.age(Instant::now()).as_secs(),
                staleness_interval_secs = self.settings.staleness_interval.as_secs(),
                "State is stale, sending staleness response"
            );
            self.settings.staleness_response.clone()
        } else {
            state.value.clone()
        }
    }

    /// Stop sampling, waiting at most `stop_timeout` for the task.
    pub async fn stop(&self) -> StopOutcome {
        {
            let mut phase = lock(&self.phase);
            if matches!(*phase, Phase::Stopping | Phase::Stopped) {
                return StopOutcome::AlreadyStopping;
            }
            *phase = Phase::Stopping;
        }

        self.cancel.cancel();
        let handle = lock(&self.task).take();

        let outcome = match handle {
            None => StopOutcome::NoTask,
            Some(mut handle) => match time::timeout(self.settings.stop_timeout, &mut handle).await {
                Ok(_) => StopOutcome::Graceful,
                Err(_) => {
                    tracing::warn!(
                        plugin = %self.name(),
                        stop_timeout_secs = self.settings.stop_timeout.as_secs(),
                        "Sampling task did not stop in time, aborting"
                    );
                    handle.abort();
                    StopOutcome::Aborted
                }
            },
        };

        *lock(&self.phase) = Phase::Stopped;
        tracing::info!(plugin = %self.name(), outcome = ?outcome, "Sampling stopped");
        outcome
    }
}

async fn sample_loop(sampler: Arc<Sampler>, interval: time::Duration, cancel: CancellationToken) {
    while !cancel.is_cancelled() {
        // Errors are logged inside the cycle.
        let _ = sampler.cycle().await;

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = time::sleep(interval) => {}
        }
    }
    tracing::debug!(plugin = %sampler.name(), "Sampling loop exited");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PluginEntry, RuleEntry};
    use crate::plugins::SourceError;
    use futures_util::future::BoxFuture;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Returns `values[n]` on the n-th run, then fails once exhausted.
    #[derive(Debug)]
    struct Sequence {
        values: Vec<Value>,
        calls: AtomicUsize,
    }

    impl Sequence {
        fn new(values: Vec<Value>) -> Arc<Self> {
            Arc::new(Self {
                values,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl DataSource for Sequence {
        fn kind(&self) -> &'static str {
            "sequence"
        }

        fn target(&self) -> String {
            "memory".into()
        }

        fn run(&self) -> BoxFuture<'_, Result<Value, SourceError>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let result = self.values.get(n).cloned().ok_or(SourceError::Status(500));
            Box::pin(async move { result })
        }
    }

    #[derive(Debug)]
    struct Hanging;

    impl DataSource for Hanging {
        fn kind(&self) -> &'static str {
            "hanging"
        }

        fn target(&self) -> String {
            "never".into()
        }

        fn run(&self) -> BoxFuture<'_, Result<Value, SourceError>> {
            Box::pin(futures_util::future::pending())
        }
    }

    fn entry(interval: u64) -> PluginEntry {
        let mut entry = PluginEntry::new("queue", "static");
        entry.interval = interval;
        entry.thresholds = vec![RuleEntry::new("up", "<7000"), RuleEntry::new("drain", ">7000")];
        entry
    }

    fn scheduler(entry: &PluginEntry, source: Arc<dyn DataSource>) -> Scheduler {
        Scheduler::new(
            PluginSettings::from_entry(entry),
            source,
            RuleEngine::from_entry(entry).unwrap(),
        )
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn synchronous_mode_samples_per_request() {
        let source = Sequence::new(vec![serde_json::json!(5000), serde_json::json!(8000)]);
        let s = scheduler(&entry(0), source.clone());
        s.start();

        assert_eq!(s.respond().await, "up");
        assert_eq!(s.respond().await, "drain");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn synchronous_failure_returns_previous_value() {
        let source = Sequence::new(vec![serde_json::json!(5000)]);
        let s = scheduler(&entry(0), source);
        s.start();

        assert_eq!(s.respond().await, "up");
        assert_eq!(s.respond().await, "up");
    }

    #[tokio::test]
    async fn patterns_fall_back_to_default_response() {
        let mut e = PluginEntry::new("status", "static");
        e.patterns = vec![RuleEntry::new("ready", ".*healthy.*")];
        e.default_response = "maint".into();
        let source = Sequence::new(vec![
            serde_json::json!("system healthy"),
            serde_json::json!("system degraded"),
        ]);
        let s = scheduler(&e, source);
        s.start();

        assert_eq!(s.respond().await, "ready");
        assert_eq!(s.respond().await, "maint");
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_mode_serves_cached_state() {
        let source = Sequence::new(vec![serde_json::json!(5000), serde_json::json!(8000)]);
        let s = scheduler(&entry(5), source.clone());
        s.start();
        settle().await;

        assert_eq!(s.respond().await, "up");
        assert_eq!(s.respond().await, "up");
        assert_eq!(source.calls(), 1);

        time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(s.respond().await, "drain");
        assert_eq!(source.calls(), 2);

        // Third run fails, state is kept.
        time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(s.respond().await, "drain");

        assert_eq!(s.stop().await, StopOutcome::Graceful);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_state_gets_staleness_response() {
        let mut e = entry(3600);
        e.staleness_interval = 30;
        e.staleness_response = "down".into();
        let s = scheduler(&e, Sequence::new(vec![serde_json::json!(5000)]));
        s.start();
        settle().await;

        time::advance(Duration::from_secs(29)).await;
        assert_eq!(s.respond().await, "up");

        time::advance(Duration::from_secs(2)).await;
        assert_eq!(s.respond().await, "down");

        s.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn noop_staleness_response_is_empty() {
        let mut e = entry(3600);
        e.staleness_interval = 1;
        e.staleness_response = "noop".into();
        let s = scheduler(&e, Sequence::new(vec![serde_json::json!(5000)]));
        s.start();
        settle().await;

        time::advance(Duration::from_secs(2)).await;
        assert_eq!(s.respond().await, "");
        s.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_sleep_and_is_idempotent() {
        let source = Sequence::new(vec![serde_json::json!(5000)]);
        let s = scheduler(&entry(3600), source.clone());
        s.start();
        settle().await;

        let started = Instant::now();
        assert_eq!(s.stop().await, StopOutcome::Graceful);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(s.phase(), Phase::Stopped);

        assert_eq!(s.stop().await, StopOutcome::AlreadyStopping);
        time::advance(Duration::from_secs(7200)).await;
        settle().await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_source_is_aborted_after_timeout() {
        let mut e = entry(1);
        e.stop_timeout = 2;
        let s = scheduler(&e, Arc::new(Hanging));
        s.start();
        settle().await;

        let started = Instant::now();
        assert_eq!(s.stop().await, StopOutcome::Aborted);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(s.phase(), Phase::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_start_and_stop_leave_no_task_behind() {
        for _ in 0..100 {
            let mut e = entry(1);
            e.stop_timeout = 1;
            let s = Arc::new(scheduler(&e, Sequence::new(vec![serde_json::json!(5000)])));

            let starter = {
                let s = s.clone();
                tokio::spawn(async move { s.start() })
            };
            let stopper = {
                let s = s.clone();
                tokio::spawn(async move { s.stop().await })
            };
            starter.await.unwrap();
            let outcome = stopper.await.unwrap();

            assert!(lock(&s.task).is_none(), "task leaked after {outcome:?}");
            assert_eq!(s.phase(), Phase::Stopped);
        }
    }

    #[tokio::test]
    async fn synchronous_stop_has_no_task() {
        let s = scheduler(&entry(0), Sequence::new(vec![]));
        s.start();
        assert_eq!(s.stop().await, StopOutcome::NoTask);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_all_get_a_token() {
        let values = (0..64).map(|i| serde_json::json!(i * 200)).collect();
        let s = Arc::new(scheduler(&entry(0), Sequence::new(values)));
        s.start();

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let s = s.clone();
                tokio::spawn(async move { s.respond().await })
            })
            .collect();

        for task in tasks {
            let token = task.await.unwrap();
            assert!(token == "up" || token == "drain" || token.is_empty(), "{token}");
        }
    }
}
