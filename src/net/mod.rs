//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, max_connections permits)
//!     → connection.rs (id + tracking for the shutdown drain)
//!     → responder.rs (Scheduler::respond → "<token>\n" → close)
//! ```
//!
//! # Design Decisions
//! - Nothing is read from the client, the token is written immediately
//! - Each connection runs in its own task, a slow client never delays another
//! - Closing the listener does not cut in-flight writes, they are drained

pub mod connection;
pub mod listener;
pub mod responder;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
pub use responder::Responder;
