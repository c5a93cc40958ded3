use tokio::sync::broadcast;
use tracing::debug;

/// Buffer size for the session event channel.
/// Slow subscribers lag rather than block the pipeline.
const EVENT_BUFFER_SIZE: usize = 16;

/// Changes in session state, published to whoever hosts the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { identity: String },
    LoggedOut,
    /// The server rejected the credential. The store has already been
    /// cleared; the host should reset to the login view.
    Invalidated { status: u16, path: String },
}

/// Publisher for [`SessionEvent`]s.
///
/// Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: SessionEvent) {
        match self.tx.send(event) {
            Ok(receivers) => debug!(receivers, "Session event published"),
            Err(broadcast::error::SendError(event)) => {
                debug!(?event, "Session event dropped, no subscribers")
            }
        }
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
