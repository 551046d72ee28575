//! Buffer for signals that arrive before the local peer exists.
//!
//! The remote side may start negotiating while local capture is still
//! pending. Those payloads are kept in arrival order, keyed by session, and
//! handed to the new peer exactly once. After the flush, live signals go
//! straight to the peer. Clearing unbinds the session so nothing stale
//! reaches a later peer.

use std::collections::VecDeque;

use duel_core::{Role, SessionId};
use thiserror::Error;

/// Default number of early signals kept per session.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedSignal {
    pub from: Role,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("signal backlog exceeded {0} entries")]
    Overflow(usize),
    #[error("signal for session {0} does not match the bound session")]
    StaleSession(SessionId),
    #[error("queue already flushed")]
    AlreadyFlushed,
}

#[derive(Debug)]
pub struct SignalQueue {
    session: Option<SessionId>,
    items: VecDeque<QueuedSignal>,
    capacity: usize,
    flushed: bool,
}

impl Default for SignalQueue {
    fn default() -> Self {
        SignalQueue::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl SignalQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        SignalQueue {
            session: None,
            items: VecDeque::new(),
            capacity,
            flushed: false,
        }
    }

    /// Key the queue to `session`. Signals buffered for another session are
    /// discarded; signals already buffered for this one are kept.
    pub fn bind(&mut self, session: &SessionId) {
        if self.session.as_ref() != Some(session) {
            self.clear();
            self.session = Some(session.clone());
        }
    }

    /// Buffer one signal. An unbound queue binds to the first session seen.
    pub fn push(&mut self, session: &SessionId, signal: QueuedSignal) -> Result<(), QueueError> {
        if self.flushed {
            return Err(QueueError::AlreadyFlushed);
        }
        match &self.session {
            Some(bound) if bound != session => {
                return Err(QueueError::StaleSession(session.clone()));
            }
            Some(_) => {}
            None => self.session = Some(session.clone()),
        }
        if self.items.len() >= self.capacity {
            return Err(QueueError::Overflow(self.capacity));
        }
        self.items.push_back(signal);
        Ok(())
    }

    /// Take every buffered signal in arrival order. Yields `None` on every
    /// call after the first until the queue is cleared.
    pub fn flush(&mut self) -> Option<Vec<QueuedSignal>> {
        if self.flushed {
            return None;
        }
        self.flushed = true;
        Some(self.items.drain(..).collect())
    }

    /// Drop everything and unbind.
    pub fn clear(&mut self) {
        self.items.clear();
        self.session = None;
        self.flushed = false;
    }

    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
