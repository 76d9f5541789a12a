//! Async navigation driver.
//!
//! Runs a [`NavigationSession`] on a single task so fixes, routing results
//! and source changes are applied one at a time:
//!
//! ```text
//!   LocationUpdate ──mpsc──► ┌──────────────────┐ ──watch──► ProgressState
//!                            │ NavigationDriver │ ──mpsc───► NavigationEvent
//!   RoutingProvider ◄──────► └──────────────────┘
//!   (one request at a time)
//! ```
//!
//! The routing call is polled inside the same `select!` loop as incoming
//! fixes, so tracking continues while a reroute is outstanding.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, OptionFuture};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::progress::{ProgressState, Route};
use crate::provider::{RouteRequest, RoutingError, RoutingProvider};
use crate::session::{NavigationEvent, NavigationSession};
use crate::stabilizer::Fix;

/// Input to the driver from the location source.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationUpdate {
    Fix(Fix),
    /// The source changed (e.g. simulated to live); history is cleared.
    SourceSwitched,
    /// The source failed or permission was revoked.
    Unavailable { reason: String },
}

type PendingRoute = BoxFuture<'static, Result<Route, RoutingError>>;

/// Owns a session and a routing provider for the lifetime of a navigation.
pub struct NavigationDriver<P> {
    session: NavigationSession,
    provider: Arc<P>,
    progress_tx: watch::Sender<Option<ProgressState>>,
}

impl<P: RoutingProvider + 'static> NavigationDriver<P> {
    /// Create a driver and the receiver for progress snapshots.
    pub fn new(
        session: NavigationSession,
        provider: Arc<P>,
    ) -> (Self, watch::Receiver<Option<ProgressState>>) {
        let (progress_tx, progress_rx) = watch::channel(session.progress().cloned());
        (
            Self {
                session,
                provider,
                progress_tx,
            },
            progress_rx,
        )
    }

    pub fn session(&self) -> &NavigationSession {
        &self.session
    }

    /// Run until cancelled or the location channel closes.
    ///
    /// When the channel closes with a reroute outstanding, the result is
    /// still applied before returning. Cancellation abandons it and records
    /// the attempt as failed, so the returned session can reroute again.
    pub async fn run(
        self,
        mut location_rx: mpsc::Receiver<LocationUpdate>,
        event_tx: mpsc::Sender<NavigationEvent>,
        cancel: CancellationToken,
    ) -> NavigationSession {
        let Self {
            mut session,
            provider,
            progress_tx,
        } = self;

        info!(provider = provider.name(), "Navigation driver starting");

        let mut pending: Option<PendingRoute> = None;
        let mut source_closed = false;

        loop {
            if source_closed && pending.is_none() {
                break;
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    if pending.take().is_some() {
                        debug!("Abandoning outstanding reroute request");
                        session.apply_reroute_result(Err(RoutingError::Cancelled));
                    }
                    info!("Navigation driver cancelled");
                    break;
                }

                Some(result) = OptionFuture::from(pending.as_mut()), if pending.is_some() => {
                    pending = None;
                    let events = session.apply_reroute_result(result);
                    forward(&event_tx, events).await;
                }

                update = location_rx.recv(), if !source_closed => {
                    let Some(update) = update else {
                        debug!("Location channel closed");
                        source_closed = true;
                        continue;
                    };

                    match update {
                        LocationUpdate::Fix(fix) => {
                            let Some(update) = session.on_fix(fix) else {
                                continue;
                            };
                            progress_tx.send_replace(Some(update.progress.clone()));
                            if let Some(request) = update.reroute_request {
                                pending = Some(request_route(&provider, request));
                            }
                            forward(&event_tx, update.events).await;
                        }
                        LocationUpdate::SourceSwitched => {
                            if session.is_suspended() {
                                session.resume_source();
                            } else {
                                session.switch_source();
                            }
                        }
                        LocationUpdate::Unavailable { reason } => {
                            let events = session.source_unavailable(reason);
                            forward(&event_tx, events).await;
                        }
                    }
                }
            }
        }

        info!(
            complete = session.is_complete(),
            reroute_attempts = session.reroute_stats().attempts,
            "Navigation driver stopped"
        );
        session
    }
}

fn request_route<P: RoutingProvider + 'static>(
    provider: &Arc<P>,
    request: RouteRequest,
) -> PendingRoute {
    let provider = Arc::clone(provider);
    info!(
        provider = provider.name(),
        origin = %request.origin,
        destination = %request.destination,
        profile = %request.profile,
        "Requesting reroute"
    );
    async move { provider.request_route(&request).await }.boxed()
}

async fn forward(event_tx: &mpsc::Sender<NavigationEvent>, events: Vec<NavigationEvent>) {
    for event in events {
        if event_tx.send(event).await.is_err() {
            debug!("Event receiver dropped");
            return;
        }
    }
}
