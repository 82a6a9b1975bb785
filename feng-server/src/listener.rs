//! Accept loop.
//!
//! Grounded on a standard worker-pool accept loop: bind, loop
//! `accept()`, spawn a task per connection, log and keep going on error
//! rather than letting one bad accept bring the loop down.

use std::net::SocketAddr;
use std::sync::Arc;

use compio::net::TcpListener;
use tracing::{error, info};

use feng_core::endpoint::Endpoint;
use feng_core::monitor::SocketEvent;

use crate::admitter::{Admitter, HandlerFactory};
use crate::core::Core;

/// Binds one TCP listening socket and hands every accepted connection to
/// the [`Admitter`].
///
/// SCTP is a feature-gated transport this crate anticipates, but compio
/// has no native SCTP socket type and no crate in this workspace's stack
/// provides one — `Listener` only ever binds TCP. See DESIGN.md for why
/// that gap is left honest rather than papered over with a fabricated
/// dependency.
pub struct Listener {
    tcp: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let tcp = TcpListener::bind(addr).await?;
        let local_addr = tcp.local_addr()?;
        info!(%local_addr, "listening for RTSP connections");
        Ok(Self { tcp, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections forever. Each accepted socket is classified
    /// (today: always TCP) and handed off to the `Admitter` on its own
    /// spawned task; an unknown or unresolvable protocol — `local_addr`/
    /// `peer_addr` failing on the freshly accepted socket — is rejected
    /// without ever constructing a `Client` (see `Admitter::admit_tcp`).
    /// Accept errors are logged at ERROR and the loop continues; they
    /// never propagate to the caller.
    pub async fn run(self, core: Arc<Core>, handlers: Arc<dyn HandlerFactory>) {
        core.emit_event(SocketEvent::Listening(Endpoint::Tcp(self.local_addr)));

        loop {
            match self.tcp.accept().await {
                Ok((stream, peer_addr)) => {
                    core.emit_event(SocketEvent::Accepted(Endpoint::Tcp(peer_addr)));
                    let core = core.clone();
                    let handlers = handlers.clone();
                    compio::runtime::spawn(async move {
                        Admitter::accept_tcp(core, handlers, stream, peer_addr).await;
                    })
                    .detach();
                }
                Err(e) => {
                    error!(error = %e, "accept failed");
                }
            }
        }
    }
}
