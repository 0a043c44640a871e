//! Agent-check protocol: one token line per connection.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::agent::Scheduler;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{Listener, ListenerError};
use crate::observability::tracing::connection_span;

/// Serves the scheduler's current token to every connecting client.
pub struct Responder {
    listener: Listener,
    scheduler: Arc<Scheduler>,
    tracker: ConnectionTracker,
}

impl Responder {
    pub fn new(listener: Listener, scheduler: Arc<Scheduler>) -> Self {
        Self {
            listener,
            scheduler,
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` fires, then close the listener.
    ///
    /// Returns the tracker so the caller can wait for in-flight writes.
    pub async fn serve(self, mut shutdown: broadcast::Receiver<()>) -> ConnectionTracker {
        let mut closing = false;
        loop {
            tokio::select! {
                _ = shutdown.recv(), if !closing => {
                    tracing::info!("Responder received shutdown signal, closing listener");
                    self.listener.close();
                    closing = true;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let guard = self.tracker.track();
                        let scheduler = self.scheduler.clone();
                        let span = connection_span(guard.id(), peer);

                        tokio::spawn(
                            async move {
                                if let Err(e) = answer(stream, &scheduler).await {
                                    tracing::warn!(error = %e, "Failed to write response");
                                }
                                drop(permit);
                                drop(guard);
                            }
                            .instrument(span),
                        );
                    }
                    // Reached once the shutdown arm has closed the listener.
                    Err(ListenerError::Closed) => break,
                    Err(e) => tracing::warn!(error = %e, "Accept failed"),
                },
            }
        }

        self.tracker
    }
}

async fn answer(mut stream: TcpStream, scheduler: &Scheduler) -> std::io::Result<()> {
    let token = scheduler.respond().await;
    tracing::debug!(response = %token, "Sending response");
    stream.write_all(format!("{}\n", token).as_bytes()).await?;
    stream.shutdown().await
}
