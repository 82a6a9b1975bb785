//! Process-wide set of live clients.
//!
//! Grounded on the `RouterHub` peer map's design: a plain `HashMap`
//! behind a single mutex rather than a reader-writer lock, because the
//! critical sections here are as short as the hub's — insert/remove a
//! handle, or walk the map posting non-blocking wakeups.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::client::{ClientHandle, ClientId, StopReason};

/// The registry. A client appears here iff
/// its loop is running — `ClientRunner` adds itself after setup succeeds
/// and removes itself during teardown, never from another task.
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientId, ClientHandle>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly-running client. O(1) amortised.
    pub fn add(&self, handle: ClientHandle) {
        self.clients.lock().insert(handle.id(), handle);
    }

    /// Unregister a client tearing down. O(1) amortised. A no-op if the
    /// id is already gone: add-then-remove leaves the registry
    /// unchanged, and a double-remove is harmless.
    pub fn remove(&self, id: ClientId) {
        self.clients.lock().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.lock().contains_key(&id)
    }

    /// Apply `f` to every live client while holding the lock for the
    /// whole iteration. `f` must not block on the
    /// registry itself — it only ever sees a [`ClientHandle`], whose one
    /// operation (`signal_stop`) is a non-blocking channel send, so
    /// reentrancy is structurally impossible.
    pub fn for_each(&self, mut f: impl FnMut(&ClientHandle)) {
        let clients = self.clients.lock();
        for handle in clients.values() {
            f(handle);
        }
    }

    /// Broadcast a stop signal to every live client. Each client tears
    /// itself down on its own task, removing itself from the registry
    /// under the same lock discipline as ordinary teardown — this reuses
    /// the normal exit path rather than a forced close.
    pub fn shutdown(&self) {
        self.for_each(|handle| handle.signal_stop(StopReason::Shutdown));
    }
}
