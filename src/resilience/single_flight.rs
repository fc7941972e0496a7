//! Single-flight credential refresh.
//!
//! Concurrent callers that hit a 401 share one refresh exchange instead of each
//! spending the (rotating) refresh token on its own. The exchange runs in a
//! spawned task, so a caller that gives up on its request neither cancels the
//! refresh nor leaves the in-flight slot occupied.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::auth::notifier::AuthStateNotifier;
use crate::auth::refresher::SessionRefresher;
use crate::helpers::time::get_instant;
use crate::observability::metrics::get_metrics;
use crate::store::credential_store::{CredentialStore, PendingWrite};
use crate::store::session::{AccessToken, RefreshToken, Session};

static SUCCESS_MSG: &str = "success";
static ERROR_MSG: &str = "error";

/// Why a shared refresh failed. Cloneable so every waiter gets a copy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct RefreshFailure(pub String);

type SharedRefresh = Shared<BoxFuture<'static, Result<Session, RefreshFailure>>>;

struct InFlight {
    id: u64,
    refresh: SharedRefresh,
}

pub struct RefreshCoordinator {
    store: Arc<CredentialStore>,
    refresher: SessionRefresher,
    notifier: Arc<dyn AuthStateNotifier>,
    // guards the slot and orders refresh writes against readers of the slot
    in_flight: Arc<Mutex<Option<InFlight>>>,
    next_id: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<CredentialStore>,
        refresher: SessionRefresher,
        notifier: Arc<dyn AuthStateNotifier>,
    ) -> Self {
        Self {
            store,
            refresher,
            notifier,
            in_flight: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }

    /// Fresh session for a caller whose request carrying `stale` was rejected.
    ///
    /// - store already holds another authenticated session: returned as is
    /// - store was cleared since `stale` was read: fails without a refresh
    /// - a refresh is running: its result is shared
    /// - otherwise a new refresh starts
    ///
    /// On failure the store has been cleared (unless a newer session was
    /// written meanwhile) and the notifier informed.
    pub async fn refresh_after(&self, stale: &AccessToken) -> Result<Session, RefreshFailure> {
        let refresh = {
            let mut slot = self.in_flight.lock();

            let current = self.store.read();
            if current.access != *stale {
                if current.is_authenticated() {
                    debug!("session already refreshed by a concurrent caller");
                    get_metrics().refresh_coalesced.inc();
                    return Ok(current);
                }
                if current == Session::empty() {
                    debug!("session cleared while the request was in flight");
                    return Err(RefreshFailure("session cleared".to_owned()));
                }
            }

            match slot.as_ref() {
                Some(in_flight) => {
                    debug!("joining in-flight refresh #{}", in_flight.id);
                    get_metrics().refresh_coalesced.inc();
                    in_flight.refresh.clone()
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let refresh = self.spawn_refresh(id, current.refresh);
                    *slot = Some(InFlight { id, refresh: refresh.clone() });
                    refresh
                }
            }
        };

        refresh.await
    }

    /// Refreshes regardless of the access token currently held
    pub async fn refresh_now(&self) -> Result<Session, RefreshFailure> {
        let current = self.store.read();
        self.refresh_after(&current.access).await
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    // must be called with the slot locked, the task takes the same lock to swap in its result
    // and saves it to the backend after releasing it
    fn spawn_refresh(&self, id: u64, used: RefreshToken) -> SharedRefresh {
        let store = self.store.clone();
        let refresher = self.refresher.clone();
        let notifier = self.notifier.clone();
        let in_flight = self.in_flight.clone();

        info!("refresh #{} started", id);
        let task = tokio::spawn(async move {
            let metrics = get_metrics();
            let start = get_instant();
            let exchanged = refresher.refresh(&used).await;

            let (outcome, pending, cleared) = {
                let mut slot = in_flight.lock();
                let published = match exchanged {
                    Ok(session) => match store.swap_if(&used, session.clone()) {
                        Some(pending) => (Ok(session), Some(pending), false),
                        // login or logout replaced the session while refreshing
                        None => current_or_failure(&store, "session replaced during refresh"),
                    },
                    Err(e) => {
                        warn!("refresh #{} failed: {}", id, e);
                        match store.swap_if(&used, Session::empty()) {
                            // nothing to announce when there was no session to begin with
                            Some(pending) => (Err(RefreshFailure(e.to_string())), Some(pending), !used.is_empty()),
                            None => current_or_failure(&store, &e.to_string()),
                        }
                    }
                };
                if slot.as_ref().map(|f| f.id) == Some(id) {
                    *slot = None;
                }
                published
            };

            if let Some(pending) = pending {
                store.persist(pending).await;
            }

            let label = if outcome.is_ok() { SUCCESS_MSG } else { ERROR_MSG };
            metrics.refreshes.with_label_values(&[label]).inc();
            metrics.refresh_duration.with_label_values(&[label]).observe(start.elapsed().as_secs_f64());
            info!("refresh #{} finished: {}", id, label);

            if cleared {
                notifier.on_session_cleared();
            }
            outcome
        });

        task.map(|joined| {
            joined.unwrap_or_else(|e| Err(RefreshFailure(format!("refresh task failed: {}", e))))
        })
        .boxed()
        .shared()
    }
}

type Published = (Result<Session, RefreshFailure>, Option<PendingWrite>, bool);

fn current_or_failure(store: &CredentialStore, reason: &str) -> Published {
    let current = store.read();
    if current.is_authenticated() {
        (Ok(current), None, false)
    } else {
        (Err(RefreshFailure(reason.to_owned())), None, false)
    }
}
