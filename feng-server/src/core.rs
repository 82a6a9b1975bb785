//! The top-level `Core` value: rather than scattering the registry,
//! worker-pool capacity, and vhost table as
//! free-standing globals, they're fields of one value threaded through
//! the `Listener` and `Admitter`. Makes shutdown ordering explicit (drop
//! `Core`, everything it owns goes with it) and test setup hermetic (each
//! test builds its own `Core` instead of sharing process-wide state).

use std::sync::Arc;

use feng_connection::registry::ClientRegistry;
use feng_core::monitor::{create_monitor, SocketEvent, SocketEventSender, SocketMonitor};
use feng_core::options::ConnectionOptions;

use crate::vhost::VirtualHostTable;

/// A non-blocking counting semaphore built from a pre-filled bounded
/// `flume` channel: acquiring is a channel receive, releasing is a
/// channel send performed by the permit's `Drop`. Sized to
/// `ConnectionOptions::worker_pool_max`, this is what bounds how many
/// `ClientRunner` tasks may be live at once.
pub struct WorkerPool {
    tx: flume::Sender<()>,
    rx: flume::Receiver<()>,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = flume::bounded(capacity.max(1));
        for _ in 0..capacity {
            // Capacity matches the channel bound, so this never blocks.
            tx.try_send(()).expect("freshly created bounded channel has room");
        }
        Self { tx, rx }
    }

    /// Wait for a free worker slot. Resolves once a permit is available;
    /// dropping the returned [`WorkerPermit`] returns the slot.
    pub async fn acquire(&self) -> WorkerPermit {
        self.rx
            .recv_async()
            .await
            .expect("WorkerPool keeps its own sender alive");
        WorkerPermit {
            tx: self.tx.clone(),
        }
    }

    /// Slots currently free, for metrics/tests.
    pub fn available(&self) -> usize {
        self.rx.len()
    }
}

/// RAII guard occupying one worker-pool slot; returns it on drop.
pub struct WorkerPermit {
    tx: flume::Sender<()>,
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        let _ = self.tx.try_send(());
    }
}

/// Everything a running server needs: the live-client registry, the
/// worker-pool capacity gate, the vhost table, and the tuned connection
/// options. Build one per server instance (or one per test).
pub struct Core {
    pub registry: Arc<ClientRegistry>,
    pub vhosts: Arc<VirtualHostTable>,
    pub worker_pool: Arc<WorkerPool>,
    pub options: ConnectionOptions,
    monitor_tx: SocketEventSender,
    /// Kept alive so `events()` can always produce a receiver, even if
    /// every previously-handed-out `SocketMonitor` has been dropped —
    /// `flume` closes the channel once every receiver is gone, which
    /// would otherwise make a later `events()` call return a
    /// permanently-closed receiver.
    monitor_rx: SocketMonitor,
}

impl Core {
    pub fn new(options: ConnectionOptions) -> Self {
        let worker_pool = Arc::new(WorkerPool::new(options.worker_pool_max));
        let (monitor_tx, monitor_rx) = create_monitor();
        Self {
            registry: Arc::new(ClientRegistry::new()),
            vhosts: Arc::new(VirtualHostTable::new()),
            worker_pool,
            options,
            monitor_tx,
            monitor_rx,
        }
    }

    /// Broadcast a stop signal to every live client.
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }

    /// Subscribe to the accept path's socket lifecycle events
    /// (`Listening`, `Accepted`, `Rejected`, ...). `flume::Receiver` is a
    /// competing consumer, not a broadcast: a second subscriber splits
    /// events with the first rather than duplicating them, so this is
    /// meant for a single observer (e.g. a metrics/logging task).
    pub fn events(&self) -> SocketMonitor {
        self.monitor_rx.clone()
    }

    /// Emit a socket lifecycle event. A send failure only happens if
    /// every `SocketMonitor` has been dropped, which can't occur while
    /// `Core` holds its own receiver — so this never fails in practice.
    pub fn emit_event(&self, event: SocketEvent) {
        let _ = self.monitor_tx.send(event);
    }
}

impl Default for Core {
    fn default() -> Self {
        Self::new(ConnectionOptions::default())
    }
}
