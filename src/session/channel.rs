//! Publish/subscribe topic for session lifecycle signals between tabs.
//!
//! Storage-change notifications never reach the tab that made the change, so
//! listeners drop signals whose origin is their own tab.

use std::fmt;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;
use ulid::Ulid;

const DEFAULT_CAPACITY: usize = 64;

/// Identifies one tab (one gate instance) sharing the session storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TabId(Ulid);

impl TabId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalKind {
    /// A token was written to storage.
    Issued,
    /// The token was removed from storage.
    Invalidated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSignal {
    pub origin: TabId,
    pub kind: SignalKind,
}

#[derive(Clone, Debug)]
pub struct SessionChannel {
    sender: broadcast::Sender<SessionSignal>,
}

impl SessionChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a signal; returns how many listeners were attached.
    pub fn publish(&self, origin: TabId, kind: SignalKind) -> usize {
        self.sender
            .send(SessionSignal { origin, kind })
            .unwrap_or(0)
    }

    #[must_use]
    pub fn subscribe(&self, tab: TabId) -> SessionListener {
        SessionListener {
            tab,
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for SessionChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct SessionListener {
    tab: TabId,
    receiver: broadcast::Receiver<SessionSignal>,
}

impl SessionListener {
    /// Waits for the next signal from another tab. `None` once the channel closes.
    pub async fn recv(&mut self) -> Option<SessionSignal> {
        loop {
            match self.receiver.recv().await {
                Ok(signal) if signal.origin == self.tab => {}
                Ok(signal) => return Some(signal),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(tab = %self.tab, skipped, "session listener lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-delivered signal from another tab, without waiting.
    pub fn try_recv(&mut self) -> Option<SessionSignal> {
        loop {
            match self.receiver.try_recv() {
                Ok(signal) if signal.origin == self.tab => {}
                Ok(signal) => return Some(signal),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(tab = %self.tab, skipped, "session listener lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}
