//! Shared view of outstanding requests and connectivity.
//!
//! A `PendingRequestTracker` is constructed once per session and cloned into
//! whatever needs it; clones share the same counter and online flag. It never
//! performs I/O: the host feeds connectivity changes in through
//! [`PendingRequestTracker::set_online`] and UI code reads the counters.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// A change in connectivity, reported only on an actual transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityEvent {
    WentOnline,
    WentOffline,
}

impl fmt::Display for ConnectivityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectivityEvent::WentOnline => write!(f, "online"),
            ConnectivityEvent::WentOffline => write!(f, "offline"),
        }
    }
}

struct TrackerState {
    pending: AtomicUsize,
    online: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct PendingRequestTracker {
    state: Arc<TrackerState>,
}

impl PendingRequestTracker {
    /// `online` is the environment's reported connectivity at startup.
    pub fn new(online: bool) -> Self {
        let (online, _) = watch::channel(online);
        Self {
            state: Arc::new(TrackerState {
                pending: AtomicUsize::new(0),
                online,
            }),
        }
    }

    pub fn add_pending_request(&self) -> usize {
        self.state.pending.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the counter, never below zero.
    pub fn remove_pending_request(&self) -> usize {
        let previous = self
            .state
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or_else(|n| n);
        previous.saturating_sub(1)
    }

    pub fn pending_count(&self) -> usize {
        self.state.pending.load(Ordering::Acquire)
    }

    pub fn has_pending(&self) -> bool {
        self.pending_count() > 0
    }

    /// Count one request for as long as the returned guard lives.
    pub fn track(&self) -> PendingGuard {
        self.add_pending_request();
        PendingGuard {
            tracker: self.clone(),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.state.online.borrow()
    }

    /// Record the latest connectivity signal from the host.
    pub fn set_online(&self, online: bool) -> Option<ConnectivityEvent> {
        let changed = self.state.online.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if !changed {
            return None;
        }

        let event = if online {
            ConnectivityEvent::WentOnline
        } else {
            ConnectivityEvent::WentOffline
        };
        tracing::info!(%event, pending = self.pending_count(), "connectivity changed");
        Some(event)
    }

    /// Watch the online flag; receivers wake on every transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.online.subscribe()
    }
}

impl Default for PendingRequestTracker {
    fn default() -> Self {
        Self::new(true)
    }
}

impl fmt::Debug for PendingRequestTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequestTracker")
            .field("pending", &self.pending_count())
            .field("online", &self.is_online())
            .finish()
    }
}

/// Removes its pending request when dropped.
#[must_use = "the request stops being counted as soon as the guard is dropped"]
pub struct PendingGuard {
    tracker: PendingRequestTracker,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.tracker.remove_pending_request();
    }
}
