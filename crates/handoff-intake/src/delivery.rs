// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Delivery state machine — decides whether a staged path is buffered for the
// App's first poll or pushed to it straight away.
//
// Readiness moves `NotReady -> Ready` once, when the App registers its
// channel, and never goes back. While not ready, a single pending slot holds
// the latest staged path (last write wins). Once ready, every staged path is
// pushed to the registered listener and the slot is left alone.
//
// The state lives behind an `Arc<Mutex<>>` shared by the intake component and
// the channel adapter so that a host calling from more than one thread still
// sees exactly one pending value and an atomic read-and-clear. Listeners are
// invoked after the lock is released.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use handoff_core::ChannelReadiness;
use tracing::{debug, info, warn};

/// Receiver for `onNewFileIntent` pushes.
///
/// Fire-and-forget: nothing is returned and nothing is retried. A listener
/// that is not actually listening simply loses the push.
pub trait FileIntentListener: Send + Sync {
    fn on_new_file_intent(&self, path: &Path);
}

impl<F> FileIntentListener for F
where
    F: Fn(&Path) + Send + Sync,
{
    fn on_new_file_intent(&self, path: &Path) {
        self(path)
    }
}

/// Where a staged path went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routing {
    /// Stored for the App's poll. `replaced` is the unconsumed path it
    /// overwrote, if any.
    Buffered { replaced: Option<PathBuf> },
    /// Handed to the registered listener.
    Pushed,
}

#[derive(Default)]
struct DeliveryState {
    readiness: ChannelReadiness,
    pending: Option<PathBuf>,
    listener: Option<Arc<dyn FileIntentListener>>,
}

/// Shared handle on the delivery state. Cloning shares the same state.
#[derive(Clone, Default)]
pub struct DeliveryContext {
    state: Arc<Mutex<DeliveryState>>,
}

impl DeliveryContext {
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation below leaves the state consistent, so a panic on
    // another thread cannot leave it half-updated.
    fn lock(&self) -> MutexGuard<'_, DeliveryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn readiness(&self) -> ChannelReadiness {
        self.lock().readiness
    }

    pub fn is_ready(&self) -> bool {
        self.readiness() == ChannelReadiness::Ready
    }

    /// Peek at the pending slot without consuming it.
    pub fn pending(&self) -> Option<PathBuf> {
        self.lock().pending.clone()
    }

    /// Register the App's listener, moving to `Ready`.
    ///
    /// Returns `false` (and keeps the first listener) if already registered.
    /// A pending path is not flushed here; the App collects it by polling.
    pub fn register(&self, listener: Arc<dyn FileIntentListener>) -> bool {
        let mut state = self.lock();
        if state.readiness == ChannelReadiness::Ready {
            warn!("delivery channel already registered; keeping the first listener");
            return false;
        }
        state.readiness = ChannelReadiness::Ready;
        state.listener = Some(listener);
        info!(
            pending = state.pending.is_some(),
            "delivery channel registered"
        );
        true
    }

    /// Route a freshly staged path according to the current readiness.
    pub fn deliver(&self, path: &Path) -> Routing {
        let listener = {
            let mut state = self.lock();
            match (state.readiness, state.listener.clone()) {
                (ChannelReadiness::Ready, Some(listener)) => listener,
                _ => {
                    let replaced = state.pending.replace(path.to_path_buf());
                    if let Some(old) = &replaced {
                        warn!(
                            dropped = %old.display(),
                            kept = %path.display(),
                            "unconsumed pending path overwritten"
                        );
                    } else {
                        debug!(path = %path.display(), "path buffered until the app polls");
                    }
                    return Routing::Buffered { replaced };
                }
            }
        };

        debug!(path = %path.display(), "pushing path to listener");
        listener.on_new_file_intent(path);
        Routing::Pushed
    }

    /// Read and clear the pending slot in one step.
    pub fn take_pending(&self) -> Option<PathBuf> {
        self.lock().pending.take()
    }
}

impl fmt::Debug for DeliveryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("DeliveryContext")
            .field("readiness", &state.readiness)
            .field("pending", &state.pending)
            .field("listener", &state.listener.is_some())
            .finish()
    }
}
