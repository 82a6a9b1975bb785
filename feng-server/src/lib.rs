//! Feng RTSP server: accept loop, admission, and the top-level [`Core`]
//! value tying the connection crates together.
//!
//! This crate is the public surface: it binds sockets, admits clients
//! onto a bounded worker pool, and exposes a minimal virtual-host table.
//! RTSP parsing, RTP scheduling, and configuration-file loading are the
//! surrounding application's job, reached only through
//! `feng_connection::traits::{RequestHandler, RtpSession}`.

#![allow(clippy::module_name_repetitions)]

pub mod admitter;
pub mod core;
pub mod dev_tracing;
pub mod listener;
pub mod vhost;

pub mod prelude {
    pub use crate::admitter::{Admitter, HandlerFactory};
    pub use crate::core::{Core, WorkerPermit, WorkerPool};
    pub use crate::listener::Listener;
    pub use crate::vhost::{VirtualHost, VirtualHostTable};
}
