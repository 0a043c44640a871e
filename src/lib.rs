//! Herald: load feedback agent for TCP load balancers.

pub mod agent;
pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod plugins;
pub mod rules;

pub use agent::{Scheduler, StopOutcome};
pub use config::AgentConfig;
pub use lifecycle::{Agent, ShutdownCoordinator, StartupError, StartupOptions};
