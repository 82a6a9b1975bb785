//! Feng Connection Core
//!
//! Runtime-agnostic building blocks shared by the client connection core:
//! - Pinned / io_uring-safe allocation (`alloc`)
//! - Transport endpoint addressing (`endpoint`)
//! - Error types (`error`)
//! - Accept-path socket monitoring (`monitor`)
//! - Connection configuration (`options`)
//! - Cancellation-safe write guard (`poison`)
//! - TCP socket plumbing (`tcp`)

#![deny(unsafe_code)]
// Allow some pedantic lints that are intentional in this crate
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::needless_pass_by_ref_mut)]
#![allow(clippy::match_same_arms)]
pub mod alloc;
pub mod endpoint;
pub mod error;
pub mod monitor;
pub mod options;
pub mod poison;
pub mod tcp;

#[cfg(feature = "test-support")]
pub mod test_support;

// Optional: a small prelude to make downstream crates ergonomic.
// Keep it minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::alloc::{IoArena, SlabMut};
    pub use crate::endpoint::Endpoint;
    pub use crate::error::{ConnectionError, Result};
    pub use crate::monitor::{create_monitor, SocketEvent, SocketMonitor};
    pub use crate::options::ConnectionOptions;
    pub use crate::poison::PoisonGuard;
}
