//! Feng RTSP client connection core.
//!
//! Owns the per-client event loop, the process-wide client registry, the
//! RTP-session timeout sweep, and the TCP/SCTP write-strategy dispatch.
//! Everything RTSP-specific — message parsing, method handlers, RTP
//! scheduling, virtual-host routing — is reached only through the
//! collaborator traits in [`traits`]; this crate never implements RTSP
//! semantics itself.

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod output;
pub mod registry;
pub mod runner;
pub mod timeout_monitor;
pub mod traits;

pub mod prelude {
    pub use crate::client::{Client, ClientHandle, ClientId, PairRole, StopReason, TransportKind};
    pub use crate::output::Transport;
    pub use crate::registry::ClientRegistry;
    pub use crate::runner::ClientRunner;
    pub use crate::timeout_monitor::TimeoutMonitor;
    pub use crate::traits::{ReadOutcome, RequestHandler, RtpSession, SourceKind, VirtualHostHandle};
}
