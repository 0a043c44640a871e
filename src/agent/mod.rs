//! Agent core: sampling, cached state and response selection.
//!
//! # Data Flow
//! ```text
//! Scheduler::start
//!     interval > 0: background task → Sampler::cycle every interval
//!     interval = 0: nothing, each request samples inline
//!
//! Sampler::cycle
//!     DataSource::run → RuleEngine::evaluate → token (or default response)
//!     → StateCache::store
//!
//! Scheduler::respond
//!     StateCache::load → staleness check → token
//! ```
//!
//! # Design Decisions
//! - One plugin instance per process
//! - Failed cycles leave the cached state untouched
//! - The cache is an `ArcSwap`, responders never block the sampler

pub mod sampler;
pub mod scheduler;
pub mod settings;
pub mod state;

pub use sampler::{SampleError, Sampler};
pub use scheduler::{Phase, Scheduler, StopOutcome};
pub use settings::PluginSettings;
pub use state::{State, StateCache};
