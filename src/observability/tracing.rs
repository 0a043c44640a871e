//! Span helpers.

use std::net::SocketAddr;

use tracing::Span;

use crate::net::ConnectionId;

/// Span covering one agent-check exchange.
pub fn connection_span(id: ConnectionId, peer: SocketAddr) -> Span {
    tracing::info_span!("connection", connection_id = %id, peer_addr = %peer)
}
