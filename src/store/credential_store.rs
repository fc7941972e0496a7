use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::observability::metrics::get_metrics;
use crate::store::backend::{MemoryBackend, SessionBackend};
use crate::store::session::{RefreshToken, Session, SessionState};

/// Single owner of the current session.
///
/// Every component holds it through an `Arc`; all mutation goes through
/// [`CredentialStore::write`] and [`CredentialStore::clear`]. The in-memory
/// session is authoritative and swapped synchronously, the backend mirrors it
/// afterwards without any session lock held.
pub struct CredentialStore {
    current: RwLock<Versioned>,
    backend: Box<dyn SessionBackend>,
    // version of the last session handed to the backend, saves run one at a time
    persisted: tokio::sync::Mutex<u64>,
}

struct Versioned {
    session: Session,
    version: u64,
}

/// In-memory swap that still has to reach the backend
#[must_use]
pub(crate) struct PendingWrite {
    version: u64,
    session: Session,
}

impl CredentialStore {
    /// Volatile store, starts unauthenticated
    pub fn in_memory() -> Self {
        Self::with_session(Box::new(MemoryBackend::default()), Session::empty())
    }

    /// Restores the session persisted by `backend`
    pub async fn load(backend: Box<dyn SessionBackend>) -> Self {
        let session = match backend.load().await {
            Ok(session) => session,
            Err(e) => {
                warn!("credential backend '{}' load failed, starting unauthenticated: {}", backend.name(), e);
                get_metrics().persistence_failures.with_label_values(&["load"]).inc();
                Session::empty()
            }
        };
        info!("credential store loaded from '{}', state: {}", backend.name(), session.state().as_str());
        Self::with_session(backend, session)
    }

    fn with_session(backend: Box<dyn SessionBackend>, session: Session) -> Self {
        set_authenticated_gauge(&session);
        Self {
            current: RwLock::new(Versioned { session, version: 0 }),
            backend,
            persisted: tokio::sync::Mutex::new(0),
        }
    }

    /// Current session, absent tokens read as empty strings
    pub fn read(&self) -> Session {
        self.current.read().session.clone()
    }

    pub fn state(&self) -> SessionState {
        self.current.read().session.state()
    }

    /// Replaces both tokens together
    pub async fn write(&self, session: Session) {
        let pending = {
            let mut current = self.current.write();
            swap(&mut current, session)
        };
        self.persist(pending).await;
    }

    pub async fn clear(&self) {
        self.write(Session::empty()).await;
    }

    /// Writes `session` only while the stored refresh token is still `expected`.
    /// Returns false when another writer (login, logout) got there first.
    pub async fn compare_and_write(&self, expected: &RefreshToken, session: Session) -> bool {
        match self.swap_if(expected, session) {
            Some(pending) => {
                self.persist(pending).await;
                true
            }
            None => false,
        }
    }

    /// In-memory half of [`CredentialStore::compare_and_write`]
    pub(crate) fn swap_if(&self, expected: &RefreshToken, session: Session) -> Option<PendingWrite> {
        let mut current = self.current.write();
        if current.session.refresh != *expected {
            debug!("refresh token rotated by another writer, write skipped");
            return None;
        }
        Some(swap(&mut current, session))
    }

    /// Saves a swapped session unless a newer one already reached the backend,
    /// so the backend ends up with the same last session as readers see
    pub(crate) async fn persist(&self, pending: PendingWrite) {
        let mut persisted = self.persisted.lock().await;
        if *persisted >= pending.version {
            debug!("session v{} superseded before it was saved", pending.version);
            return;
        }
        if let Err(e) = self.backend.save(&pending.session).await {
            warn!("credential backend '{}' save failed: {}", self.backend.name(), e);
            get_metrics().persistence_failures.with_label_values(&["save"]).inc();
        }
        *persisted = pending.version;
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn swap(current: &mut Versioned, session: Session) -> PendingWrite {
    if current.session.state() != session.state() {
        debug!("session state {} -> {}", current.session.state().as_str(), session.state().as_str());
        get_metrics().session_transitions.with_label_values(&[session.state().as_str()]).inc();
    }
    set_authenticated_gauge(&session);
    current.version += 1;
    current.session = session.clone();
    PendingWrite { version: current.version, session }
}

fn set_authenticated_gauge(session: &Session) {
    get_metrics().authenticated.set(i64::from(session.is_authenticated()));
}
