//! Minimal virtual-host table. Routing tables, demuxer plug-in loading,
//! and per-host configuration are out of scope; the core only needs a
//! connection counter per host.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use feng_connection::traits::VirtualHostHandle;

/// One named virtual host. The only state the connection core can see
/// through [`VirtualHostHandle`] is `connection_count`; routing tables,
/// demuxer plug-ins, and per-host policy live in the RTSP layer above
/// this crate.
#[derive(Debug)]
pub struct VirtualHost {
    name: String,
    connection_count: AtomicUsize,
}

impl VirtualHost {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connection_count: AtomicUsize::new(0),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connection_count.load(Ordering::SeqCst)
    }
}

impl VirtualHostHandle for VirtualHost {
    fn name(&self) -> &str {
        &self.name
    }

    fn connection_opened(&self) {
        self.connection_count.fetch_add(1, Ordering::SeqCst);
    }

    fn connection_closed(&self) {
        self.connection_count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Name-keyed table of virtual hosts, with a `default` entry always
/// present so the `Admitter` has somewhere to attribute a connection
/// when the RTSP layer above hasn't resolved a `Host:`/vhost yet.
pub struct VirtualHostTable {
    hosts: Mutex<HashMap<String, Arc<VirtualHost>>>,
}

impl VirtualHostTable {
    pub fn new() -> Self {
        let mut hosts = HashMap::new();
        hosts.insert("default".to_string(), Arc::new(VirtualHost::new("default")));
        Self {
            hosts: Mutex::new(hosts),
        }
    }

    /// Insert (or replace) a named virtual host.
    pub fn insert(&self, host: Arc<VirtualHost>) {
        self.hosts.lock().insert(host.name().to_string(), host);
    }

    /// Look up a virtual host by name, falling back to `default` if the
    /// name is unknown.
    pub fn get_or_default(&self, name: &str) -> Arc<VirtualHost> {
        let hosts = self.hosts.lock();
        hosts
            .get(name)
            .or_else(|| hosts.get("default"))
            .expect("default vhost is always present")
            .clone()
    }
}

impl Default for VirtualHostTable {
    fn default() -> Self {
        Self::new()
    }
}
