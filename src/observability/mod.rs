//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! agent::Sampler   → metrics.rs (sample outcome, duration)
//! net::Responder   → metrics.rs (responses, active connections)
//!                  → tracing.rs (per-connection span)
//! everything       → logging.rs (structured log events on stderr)
//! ```
//!
//! # Design Decisions
//! - Metrics are recorded unconditionally, the exporter is optional
//! - Log level comes from the CLI, `RUST_LOG` overrides it

pub mod logging;
pub mod metrics;
pub mod tracing;
