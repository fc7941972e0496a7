use tokio::sync::broadcast::{self, Receiver, Sender};
use tracing::debug;

/// Informed whenever a session is established or cleared, so caches that
/// depend on it ("is a session active", "current user") can be invalidated.
pub trait AuthStateNotifier: Send + Sync {
    fn on_session_established(&self);

    fn on_session_cleared(&self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl AuthStateNotifier for NoopNotifier {
    fn on_session_established(&self) {}

    fn on_session_cleared(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    Established,
    Cleared,
}

const BUFFER_SIZE: usize = 16;

/// Publishes [`AuthEvent`]s to any number of subscribers
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: Sender<AuthEvent>,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUFFER_SIZE);
        Self { sender }
    }

    pub fn subscribe(&self) -> Receiver<AuthEvent> {
        self.sender.subscribe()
    }

    fn publish(&self, event: AuthEvent) {
        // no subscribers is fine
        if let Err(err) = self.sender.send(event) {
            debug!("auth event {:?} has no subscribers: {}", event, err);
        }
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthStateNotifier for BroadcastNotifier {
    fn on_session_established(&self) {
        self.publish(AuthEvent::Established);
    }

    fn on_session_cleared(&self) {
        self.publish(AuthEvent::Cleared);
    }
}
