//! Per-client event loop.
//!
//! Rendered as an async task rather than a native-thread event loop: the
//! teacher's runtime (`compio`) schedules cooperatively within a task the
//! same way the C original's event-loop library schedules callbacks
//! within a pool thread, so one `compio` task per client is the
//! idiomatic rendering of "per-client event loop on a pool thread".
//! Grounded on the socket actor's split-pump shape: drain pending
//! writes, then attempt a read, repeat.

use std::cell::Cell;
use std::io;
use std::time::{Duration, Instant};

use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use futures::FutureExt;
use tracing::{error, info, warn};

use feng_core::alloc::SlabMut;
use feng_core::error::{ConnectionError, Result};
use feng_core::poison::PoisonGuard;

use crate::client::{Client, PairRole, StopReason, TransportKind};
use crate::output::Transport;
use crate::registry::ClientRegistry;
use crate::timeout_monitor::{TickOutcome, TimeoutMonitor};
use crate::traits::ReadOutcome;

thread_local! {
    /// Per-task system-error sink: required because the
    /// event-loop library's system-error reporting is a callback without
    /// context"). Here it plays the analogous role for reactor/timer
    /// registration failures discovered during `ClientRunner::setup`:
    /// set once, read once, never threaded through call sites.
    static SYSERR: Cell<Option<io::Error>> = const { Cell::new(None) };
}

fn take_syserr() -> Option<io::Error> {
    SYSERR.with(|cell| cell.take())
}

fn set_syserr(err: io::Error) {
    SYSERR.with(|cell| cell.set(Some(err)));
}

const READ_CHUNK: usize = 8192;

/// Drives one [`Client`] from admission to teardown.
pub struct ClientRunner {
    client: Client,
    registry: std::sync::Arc<ClientRegistry>,
    monitor: TimeoutMonitor,
    stream_timeout: Duration,
}

impl ClientRunner {
    pub fn new(
        client: Client,
        registry: std::sync::Arc<ClientRegistry>,
        live_stream_bye_timeout: Duration,
        stream_timeout: Duration,
    ) -> Self {
        Self {
            client,
            registry,
            monitor: TimeoutMonitor::new(live_stream_bye_timeout, stream_timeout),
            stream_timeout,
        }
    }

    /// Validate the loop can actually start before registering the client.
    /// Today the only failure mode modeled is a TCP client admitted
    /// without an input arena (should be unreachable — `Client::new`
    /// always allocates one for TCP) and SCTP clients, whose read/write
    /// pump this crate does not implement (see DESIGN.md for why: no
    /// SCTP socket type exists anywhere in this dependency stack).
    fn setup(&mut self) -> io::Result<()> {
        match self.client.transport_kind() {
            TransportKind::Tcp => {
                if self.client.input_arena_mut().is_none() {
                    return Err(io::Error::new(
                        io::ErrorKind::Other,
                        "TCP client admitted without an input arena",
                    ));
                }
                Ok(())
            }
            #[cfg(feature = "sctp")]
            TransportKind::Sctp => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "SCTP read/write pump is not implemented in this build",
            )),
        }
    }

    /// Run until the loop is stopped, returning why.
    pub async fn run(mut self) -> StopReason {
        let client_id = self.client.id();

        if let Err(err) = self.setup() {
            set_syserr(err);
            error!(client = %client_id, error = %take_syserr().unwrap(), "loop initialisation failed");
            return self.teardown(StopReason::ProtocolError).await;
        }

        let handle = self.client.handle();
        self.registry.add(handle);
        info!(client = %client_id, peer = %self.client.peer_host(), "client registered");

        let stop_rx = self.client.stop_signal();

        let reason = loop {
            if let Err(e) = self.drain_output().await {
                warn!(client = %client_id, error = %e, "write pump failed");
                break StopReason::ProtocolError;
            }

            enum Event {
                Stop(StopReason),
                Tick,
                Read(BufResult<usize, SlabMut>),
            }

            let read_buf = self
                .client
                .input_arena_mut()
                .expect("setup() guarantees a TCP arena")
                .alloc_mut(READ_CHUNK);

            // The repeating timer. Recreated each iteration rather than
            // a persistent interval handle: it rearms itself on every
            // tick, and since `TimeoutMonitor::tick` measures real elapsed idle time
            // (not tick count), a period that drifts slightly whenever
            // a read or stop signal wins the race first does not affect
            // the soft/hard timeout invariants.
            //
            // Driven at the *soft* interval, not the hard one: a sweep
            // every `stream_timeout` would let a session that's already
            // idle at loop start jump straight past `[soft, hard)` on
            // the very first tick, skipping the RTCP BYE the hard kick
            // is supposed to be preceded by. Ticking every
            // `live_stream_bye_timeout` guarantees the sweep observes
            // the soft window at least once before a session can cross
            // the hard threshold, since the hard threshold is a whole
            // multiple (≥2x) of the soft one.
            let sleep = compio::time::sleep(self.monitor.live_stream_bye_timeout());

            let event = futures::select! {
                stop = stop_rx.recv_async().fuse() => {
                    Event::Stop(stop.unwrap_or(StopReason::Shutdown))
                }
                () = sleep.fuse() => Event::Tick,
                res = self.client.stream_mut().read(read_buf).fuse() => Event::Read(res),
            };

            match event {
                Event::Stop(reason) => break reason,
                Event::Tick => {
                    match self.monitor.tick(&mut self.client, Instant::now()) {
                        TickOutcome::HardTimeout => break StopReason::HardTimeout,
                        TickOutcome::Continue => {}
                    }
                }
                Event::Read(BufResult(Ok(0), _)) => break StopReason::Eof,
                Event::Read(BufResult(Ok(n), buf)) => {
                    let bytes = buf.freeze();
                    match self.dispatch_read(&bytes[..n]) {
                        Ok(()) => {}
                        Err(_) => break StopReason::ProtocolError,
                    }
                }
                Event::Read(BufResult(Err(e), _)) => {
                    warn!(client = %client_id, error = %e, "read error");
                    break StopReason::ProtocolError;
                }
            }
        };

        self.registry.remove(client_id);
        self.teardown(reason).await
    }

    /// Feed newly-read bytes to the external `RequestHandler`, queueing
    /// any response it produces. A `FatalError` outcome propagates as an
    /// `Err` so the caller stops the loop: runtime transport
    /// and protocol errors collapse to the same "stop and free" policy).
    fn dispatch_read(&mut self, data: &[u8]) -> Result<()> {
        let Some(mut handler) = self.client.take_handler() else {
            return Ok(());
        };
        let outcome = handler.on_readable(&mut self.client, data);
        self.client.set_handler(handler);

        match outcome {
            ReadOutcome::NeedMore => Ok(()),
            ReadOutcome::Response(resp) => self.client.write_data(resp),
            ReadOutcome::FatalError => {
                Err(ConnectionError::protocol("request handler reported a fatal error"))
            }
        }
    }

    /// Drain whatever is queued in the output path, writing it to the
    /// socket. Partial TCP writes leave the remainder at the head of the
    /// queue for the next call.
    ///
    /// Each write to the socket is wrapped in a [`PoisonGuard`]: if the
    /// write future is ever dropped before it resolves (the task itself
    /// gets cancelled mid-write, e.g. by a runtime shutdown outside this
    /// crate's own stop mechanism), the client is left poisoned and
    /// every subsequent write is refused rather than risking a
    /// half-written frame followed by an unrelated one.
    async fn drain_output(&mut self) -> Result<()> {
        if self.client.is_poisoned() {
            return Err(ConnectionError::protocol(
                "write pump poisoned by a previously cancelled write",
            ));
        }

        loop {
            if self.client.output().is_empty() {
                return Ok(());
            }
            let next = match self.client.output_mut() {
                Transport::Tcp(q) => q.pop_front(),
                Transport::Sctp(q) => q.pop_front().map(|(_, b)| b),
            };
            let Some(buf) = next else {
                return Ok(());
            };

            let len = buf.len();
            let res = {
                // Scoped so the guard's and the stream's borrows of
                // `self.client` both end here, before the branches below
                // need to borrow `self.client` again for the queue and
                // the flush.
                let guard = PoisonGuard::new(&mut self.client.poisoned);
                let BufResult(res, _) =
                    self.client.stream.write(feng_core::alloc::IoBytes::new(buf.clone())).await;
                guard.disarm();
                res
            };
            match res {
                Ok(written) if written == len => continue,
                Ok(written) => {
                    let remainder = buf.slice(written..);
                    if let Transport::Tcp(q) = self.client.output_mut() {
                        q.requeue_front(remainder);
                    }
                    self.client.stream_mut().flush().await?;
                    return Ok(());
                }
                Err(e) => return Err(ConnectionError::Io(e)),
            }
        }
    }

    /// Stop/unregister already done by the
    /// caller for `self`; this handles the HTTP-tunnel pair asymmetry and
    /// logs the removal.
    async fn teardown(self, reason: StopReason) -> StopReason {
        let client_id = self.client.id();
        self.client.vhost().connection_closed();

        if let Some((sibling, role)) = self.client.pair() {
            match role {
                PairRole::Post => {
                    sibling.signal_stop(reason);
                }
                PairRole::Get => {
                    // Free self only; the POST side frees itself on its
                    // own disconnect (the asymmetric teardown rule).
                }
                PairRole::None => unreachable!("pair is Some but role is None"),
            }
        }

        info!(client = %client_id, %reason, "client removed");
        reason
    }
}
