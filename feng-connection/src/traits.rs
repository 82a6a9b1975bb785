//! External-collaborator interfaces.
//!
//! The connection core is deliberately ignorant of RTSP semantics, RTP
//! scheduling, and virtual-host configuration — those live in the
//! surrounding server and are reached only through these traits. This
//! mirrors how the protocol crates here never reach into the socket
//! actor's internals: the actor calls out through a narrow channel/trait
//! seam instead.

use bytes::Bytes;
use std::time::Instant;

use crate::client::Client;

/// Outcome of feeding newly-read bytes to the RTSP request handler.
#[derive(Debug)]
pub enum ReadOutcome {
    /// The handler consumed the bytes but needs more before it can act
    /// (a partial request is buffered inside the handler).
    NeedMore,
    /// The handler produced a complete response to write back.
    Response(Bytes),
    /// The handler hit a fatal protocol error; the loop should stop.
    FatalError,
}

/// The RTSP request parser and method dispatcher, out of scope for this
/// crate and implemented by the surrounding server.
///
/// `on_readable` is the read-callback delegate: the connection core hands it
/// raw bytes off the wire and it hands back either more buffering, a
/// response to write, or a fatal error that ends the connection.
pub trait RequestHandler: Send {
    /// Feed bytes read from the client's socket to the RTSP parser.
    fn on_readable(&mut self, client: &mut Client, data: &[u8]) -> ReadOutcome;

    /// RTP sessions currently attached to this client's RTSP session, for
    /// `TimeoutMonitor` to sweep. Empty before SETUP.
    fn rtp_sessions(&self) -> &[std::sync::Arc<dyn RtpSession>];
}

/// Whether an RTP session is produced live (an encoder) or read back from
/// storage (a file). Only LIVE sessions get the soft RTCP-BYE warning;
/// both kinds get the hard kick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Live,
    Stored,
}

/// An RTP session attached to an RTSP session, referenced read-only by
/// the timeout monitor: the core treats it read-only except for the RTCP
/// BYE emission it triggers.
pub trait RtpSession: Send + Sync {
    /// Wall-clock time of the last packet sent on this session.
    fn last_packet_send_time(&self) -> Instant;

    /// Whether this session is produced live or read from storage.
    fn source_kind(&self) -> SourceKind;

    /// Emit an RTCP Sender Report with BYE. Soft signal: does not stop
    /// the client's loop, and deliberately does not reset
    /// `last_packet_send_time` (see DESIGN.md for the rationale) — a
    /// persistently idle LIVE session will emit BYE once per timer tick
    /// until the hard kick takes over.
    fn send_rtcp_bye(&self);
}

/// Non-owning handle to a virtual host's connection counter.
///
/// The core's only interaction with vhost configuration (routing tables,
/// demuxer plugins, per-host policy — all out of scope for this crate) is
/// incrementing/decrementing this counter on admit/teardown, keeping
/// `vhost.connection_count` equal to the number of live clients with that
/// vhost.
pub trait VirtualHostHandle: Send + Sync {
    /// Human-readable name, for log lines.
    fn name(&self) -> &str;

    /// Increment the live-connection count. Called once at admit time.
    fn connection_opened(&self);

    /// Decrement the live-connection count. Called once at teardown.
    fn connection_closed(&self);
}
