//! Cached response state.
//!
//! # Design Decisions
//! - Value and timestamp live in one immutable `State`
//! - Writers swap the whole `Arc<State>`, readers never see a mixed pair
//! - Reads never wait for a sampling cycle

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::time::Instant;

/// The last computed response and when it was computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    pub value: String,
    pub timestamp: Instant,
}

impl State {
    /// A state computed now.
    pub fn new(value: impl Into<String>) -> Self {
        Self::at(value, Instant::now())
    }

    /// A state computed at `timestamp`.
    pub fn at(value: impl Into<String>, timestamp: Instant) -> Self {
        Self {
            value: value.into(),
            timestamp,
        }
    }

    /// Time elapsed since the state was written.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.timestamp)
    }

    /// Whether the state is older than `window`. A zero window never expires.
    pub fn is_stale(&self, window: Duration, now: Instant) -> bool {
        !window.is_zero() && self.age(now) > window
    }
}

/// Single-slot cache shared between the sampler and responders.
pub struct StateCache {
    inner: ArcSwap<State>,
}

impl StateCache {
    /// Create a cache holding the empty response, timestamped now.
    pub fn new() -> Self {
        Self {
            inner: ArcSwap::from_pointee(State::new("")),
        }
    }

    /// Current state.
    pub fn load(&self) -> Arc<State> {
        self.inner.load_full()
    }

    /// Replace the state with `value`, timestamped now.
    pub fn store(&self, value: impl Into<String>) {
        self.replace(State::new(value));
    }

    /// Replace the whole state.
    pub fn replace(&self, state: State) {
        self.inner.store(Arc::new(state));
    }
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StateCache").field(&self.load()).finish()
    }
}
