//! The `Client` — one per accepted RTSP control connection.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use compio::net::TcpStream;
use feng_core::alloc::IoArena;
use feng_core::error::Result;

use crate::output::{Transport, SCTP_CONTROL_STREAM};
use crate::traits::{RequestHandler, RtpSession, VirtualHostHandle};

/// Process-wide unique client identifier. Used as the registry key and
/// embedded in [`ClientHandle`] so a back-reference never needs the
/// `Client` itself — a back-reference only ever needs to ask "stop this loop".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// Transport family a `Client` was admitted over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Tcp,
    #[cfg_attr(not(feature = "sctp"), allow(dead_code))]
    Sctp,
}

/// Which side of an RTSP-over-HTTP tunnel pair a `Client` is.
///
/// The asymmetric teardown rule keys off this: the POST
/// side carries RTSP requests and is responsible for freeing its sibling
/// first; the GET side frees only itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairRole {
    /// Not part of an HTTP tunnel pair.
    None,
    /// The GET (server→client) half.
    Get,
    /// The POST (client→server) half; carries RTSP requests.
    Post,
}

/// A cheap, `Clone`able, cross-task reference to a live `Client`.
///
/// This is the only thing another task may hold: it exposes nothing but
/// "stop this client's loop". Sending on a closed channel (the client already
/// tore down) is silently ignored; a repeat stop signal is harmless.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ClientId,
    stop_tx: flume::Sender<StopReason>,
}

/// Why a client's loop stopped, threaded through for the teardown log
/// line and for test assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Eof,
    ProtocolError,
    HardTimeout,
    Shutdown,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Eof => "eof",
            Self::ProtocolError => "protocol-error",
            Self::HardTimeout => "hard-timeout",
            Self::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

impl ClientHandle {
    pub(crate) fn new(id: ClientId, stop_tx: flume::Sender<StopReason>) -> Self {
        Self { id, stop_tx }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Signal this client's loop to stop. Non-blocking, safe to call
    /// from any task, and idempotent: once the loop has exited the
    /// channel is dropped and this becomes a silent no-op.
    pub fn signal_stop(&self, reason: StopReason) {
        let _ = self.stop_tx.try_send(reason);
    }
}

/// The unit owned by one task for its entire lifetime.
///
/// No field here is ever touched by another task directly; the only
/// cross-task interaction is through a cloned [`ClientHandle`] posting a
/// stop signal — a pair's link is symmetric by construction.
pub struct Client {
    id: ClientId,
    transport_kind: TransportKind,
    /// Crate-visible (rather than behind an accessor) so
    /// [`crate::runner::ClientRunner::drain_output`] can borrow this and
    /// `poisoned` independently in the same scope — splitting the borrow
    /// through a method call would tie both to one `&mut self.client`
    /// borrow for as long as either return value lives.
    pub(crate) stream: TcpStream,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    local_host: String,
    peer_host: String,
    /// Arena-backed read buffer. Present for TCP (byte-stream framing);
    /// SCTP has message semantics and needs no reassembly buffer.
    input_arena: Option<IoArena>,
    output: Transport,
    handler: Option<Box<dyn RequestHandler>>,
    /// Interleaved RTP channel id -> session, for `TimeoutMonitor` and
    /// RTCP BYE routing.
    rtp_channels: HashMap<u16, Arc<dyn RtpSession>>,
    vhost: Arc<dyn VirtualHostHandle>,
    pair: Option<(ClientHandle, PairRole)>,
    stop_rx: flume::Receiver<StopReason>,
    self_handle: ClientHandle,
    /// Set by a [`feng_core::poison::PoisonGuard`] armed around the write
    /// pump's socket write; stays `true` if that future is ever dropped
    /// mid-flight (task cancellation) instead of running to completion,
    /// marking the connection as no longer safe to write to. Crate-visible
    /// for the same borrow-splitting reason as `stream`.
    pub(crate) poisoned: bool,
}

impl Client {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport_kind: TransportKind,
        stream: TcpStream,
        local_addr: SocketAddr,
        peer_addr: SocketAddr,
        local_host: String,
        peer_host: String,
        output: Transport,
        vhost: Arc<dyn VirtualHostHandle>,
    ) -> Self {
        let id = ClientId::next();
        let (stop_tx, stop_rx) = flume::unbounded();
        let self_handle = ClientHandle::new(id, stop_tx);
        let input_arena = match transport_kind {
            TransportKind::Tcp => Some(IoArena::new()),
            #[cfg(feature = "sctp")]
            TransportKind::Sctp => None,
        };
        Self {
            id,
            transport_kind,
            stream,
            local_addr,
            peer_addr,
            local_host,
            peer_host,
            input_arena,
            output,
            handler: None,
            rtp_channels: HashMap::new(),
            vhost,
            pair: None,
            stop_rx,
            self_handle,
            poisoned: false,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport_kind
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn local_host(&self) -> &str {
        &self.local_host
    }

    pub fn peer_host(&self) -> &str {
        &self.peer_host
    }

    pub fn handle(&self) -> ClientHandle {
        self.self_handle.clone()
    }

    pub fn vhost(&self) -> &Arc<dyn VirtualHostHandle> {
        &self.vhost
    }

    /// Install the RTSP request handler once the RTSP layer has resolved
    /// which session/method dispatcher owns this connection.
    pub fn set_handler(&mut self, handler: Box<dyn RequestHandler>) {
        self.handler = Some(handler);
    }

    pub fn handler_mut(&mut self) -> Option<&mut Box<dyn RequestHandler>> {
        self.handler.as_mut()
    }

    /// Take the handler out so it can be called with `&mut self` as an
    /// argument (see [`crate::runner::ClientRunner::dispatch_read`]):
    /// the trait method signature takes `&mut Client`, so the handler
    /// cannot remain borrowed from inside the very `Client` it is
    /// passed. Put it back with [`Client::set_handler`] afterwards.
    pub fn take_handler(&mut self) -> Option<Box<dyn RequestHandler>> {
        self.handler.take()
    }

    pub fn attach_rtp_session(&mut self, channel: u16, session: Arc<dyn RtpSession>) {
        self.rtp_channels.insert(channel, session);
    }

    pub fn rtp_session(&self, channel: u16) -> Option<&Arc<dyn RtpSession>> {
        self.rtp_channels.get(&channel)
    }

    pub fn rtp_sessions(&self) -> impl Iterator<Item = &Arc<dyn RtpSession>> {
        self.rtp_channels.values()
    }

    /// Link two `Client`s as an RTSP-over-HTTP tunnel pair. Establishes
    /// the back-pointer on both sides in one call so a pair link
    /// (`A.pair = B iff B.pair = A`) can never be only half set up.
    pub fn link_pair(&mut self, sibling: ClientHandle, role: PairRole) {
        self.pair = Some((sibling, role));
    }

    pub fn pair(&self) -> Option<&(ClientHandle, PairRole)> {
        self.pair.as_ref()
    }

    pub fn input_arena_mut(&mut self) -> Option<&mut IoArena> {
        self.input_arena.as_mut()
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Whether a previous write was cancelled mid-flight, per
    /// [`feng_core::poison::PoisonGuard`]. Once poisoned, the write pump
    /// refuses further writes rather than risk sending a corrupt
    /// continuation onto the wire.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn stop_signal(&self) -> flume::Receiver<StopReason> {
        self.stop_rx.clone()
    }

    /// Enqueue a complete RTSP control message. The public write entry
    /// point: takes ownership, callers must not observe
    /// `buf` afterwards.
    pub fn write_data(&mut self, buf: Bytes) -> Result<()> {
        self.output.write(SCTP_CONTROL_STREAM, buf)
    }

    /// Enqueue an interleaved RTP/RTCP frame on the given channel id.
    /// Over TCP this still goes through the single ordered byte queue
    /// (the caller has already framed it with the `$`-channel-length
    /// prefix); over SCTP it becomes its own message on that stream id.
    pub fn write_interleaved(&mut self, channel: u16, buf: Bytes) -> Result<()> {
        self.output.write(channel, buf)
    }

    pub fn output_mut(&mut self) -> &mut Transport {
        &mut self.output
    }

    pub fn output(&self) -> &Transport {
        &self.output
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("transport_kind", &self.transport_kind)
            .field("peer_host", &self.peer_host)
            .finish_non_exhaustive()
    }
}
