//! Turns an accepted socket into a running [`Client`].
//!
//! Grounded on the usual bind/from_stream construction sequence:
//! resolve addresses, apply socket tuning, then hand a ready-to-run
//! value to the caller — the caller here being the worker pool rather
//! than the socket's own internal dispatch loop.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};

use feng_connection::client::{Client, TransportKind};
use feng_connection::output::Transport;
use feng_connection::runner::ClientRunner;
use feng_connection::traits::{RequestHandler, VirtualHostHandle};
use feng_core::endpoint::Endpoint;
use feng_core::monitor::SocketEvent;
use feng_core::options::ConnectionOptions;
use feng_core::tcp::enable_tcp_nodelay;

use crate::core::Core;

/// Produces a fresh RTSP request handler for each newly admitted client.
///
/// The connection core never implements RTSP semantics itself; this is
/// the seam the surrounding server uses to plug its parser and method
/// dispatcher in. Any `Fn() -> Box<dyn RequestHandler> + Send + Sync`
/// closure implements it for free.
pub trait HandlerFactory: Send + Sync {
    fn build(&self) -> Box<dyn RequestHandler>;
}

impl<F> HandlerFactory for F
where
    F: Fn() -> Box<dyn RequestHandler> + Send + Sync,
{
    fn build(&self) -> Box<dyn RequestHandler> {
        self()
    }
}

pub struct Admitter;

impl Admitter {
    /// Build a `Client` around an accepted TCP stream: resolve local and
    /// peer addresses once, apply `TCP_NODELAY`, increment the vhost's
    /// connection counter, and allocate the arena-backed input buffer and
    /// output queue. Does not install a request handler or
    /// spawn the client's loop — the caller does both.
    pub fn admit_tcp(
        stream: compio::net::TcpStream,
        vhost: Arc<dyn VirtualHostHandle>,
        options: &ConnectionOptions,
    ) -> std::io::Result<Client> {
        let local_addr = stream.local_addr()?;
        let peer_addr = stream.peer_addr()?;
        enable_tcp_nodelay(&stream)?;

        let local_host = local_addr.to_string();
        let peer_host = peer_addr.to_string();
        vhost.connection_opened();

        Ok(Client::new(
            TransportKind::Tcp,
            stream,
            local_addr,
            peer_addr,
            local_host,
            peer_host,
            Transport::new_tcp(options.max_output_queue_bytes),
            vhost,
        ))
    }

    /// Full admit-then-run sequence for one accepted TCP connection,
    /// invoked as its own spawned task by [`crate::listener::Listener`].
    ///
    /// Acquires a worker-pool permit before doing any other work — a
    /// server at capacity holds the connection in the kernel's accept
    /// queue rather than spending a task and an arena on it, until a slot
    /// frees up or the peer gives up and disconnects.
    pub async fn accept_tcp(
        core: Arc<Core>,
        handlers: Arc<dyn HandlerFactory>,
        stream: compio::net::TcpStream,
        peer_addr: SocketAddr,
    ) {
        let permit = core.worker_pool.acquire().await;

        let vhost = core.vhosts.get_or_default("default");
        let mut client = match Self::admit_tcp(stream, vhost, &core.options) {
            Ok(client) => client,
            Err(e) => {
                error!(%peer_addr, error = %e, "admission failed, rejecting connection");
                core.emit_event(SocketEvent::Rejected {
                    endpoint: Endpoint::Tcp(peer_addr),
                    reason: e.to_string(),
                });
                return;
            }
        };
        client.set_handler(handlers.build());

        let client_id = client.id();
        info!(client = %client_id, %peer_addr, "client admitted");

        let runner = ClientRunner::new(
            client,
            core.registry.clone(),
            core.options.live_stream_bye_timeout,
            core.options.stream_timeout,
        );

        let reason = runner.run().await;
        info!(client = %client_id, %reason, "client task finished");
        drop(permit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feng_connection::traits::{ReadOutcome, RtpSession};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingVhost {
        count: AtomicUsize,
    }

    impl VirtualHostHandle for CountingVhost {
        fn name(&self) -> &str {
            "default"
        }
        fn connection_opened(&self) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
        fn connection_closed(&self) {
            self.count.fetch_sub(1, Ordering::SeqCst);
        }
    }

    struct NoopHandler;

    impl RequestHandler for NoopHandler {
        fn on_readable(&mut self, _client: &mut Client, _data: &[u8]) -> ReadOutcome {
            ReadOutcome::NeedMore
        }
        fn rtp_sessions(&self) -> &[Arc<dyn RtpSession>] {
            &[]
        }
    }

    #[compio::test]
    async fn admit_tcp_increments_vhost_and_allocates_arena() {
        let (server, _client_io) = feng_core::test_support::duplex_pair().await.unwrap();
        let vhost_concrete = Arc::new(CountingVhost {
            count: AtomicUsize::new(0),
        });
        let vhost: Arc<dyn VirtualHostHandle> = vhost_concrete.clone();
        let options = ConnectionOptions::default();

        let mut client = Admitter::admit_tcp(server, vhost, &options).unwrap();
        assert!(client.input_arena_mut().is_some());
        assert_eq!(vhost_concrete.count.load(Ordering::SeqCst), 1);
    }

    #[compio::test]
    async fn accept_tcp_runs_to_completion_and_releases_permit() {
        let core = Arc::new(Core::new(ConnectionOptions::default().with_worker_pool_max(1)));

        let (server, client_io) = feng_core::test_support::duplex_pair().await.unwrap();
        let peer_addr = client_io.local_addr().unwrap();
        let handlers: Arc<dyn HandlerFactory> = Arc::new(|| -> Box<dyn RequestHandler> { Box::new(NoopHandler) });

        drop(client_io);

        let core_available_before = core.worker_pool.available();
        Admitter::accept_tcp(core.clone(), handlers, server, peer_addr).await;

        assert_eq!(core.worker_pool.available(), core_available_before);
        assert!(core.registry.is_empty());
    }
}
