//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → select plugin → registry → rules → Scheduler::start
//!     → bind listener → serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → latch → Scheduler::stop → close listener
//!     → drain in-flight connections → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → ShutdownCoordinator::trigger
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listener
//! - Ordered shutdown: stop sampling, stop accepting, drain
//! - Repeated signals are logged and ignored

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::ShutdownCoordinator;
pub use startup::{Agent, StartupError, StartupOptions};
