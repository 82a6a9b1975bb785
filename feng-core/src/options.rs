//! Connection configuration options.
//!
//! Timeouts, buffer sizes, and worker-pool sizing for the client
//! connection core.

use std::time::Duration;

/// RTCP BYE soft-timeout: fired when a live stream appears to have gone
/// silent, giving the client a chance to tear down gracefully before the
/// hard kick.
pub const LIVE_STREAM_BYE_TIMEOUT: Duration = Duration::from_secs(6);

/// Hard stream timeout: no RTP/RTCP activity for this long and the client
/// loop is stopped outright.
///
/// Must be a multiple of [`LIVE_STREAM_BYE_TIMEOUT`] so the soft timeout
/// always has at least one full interval to take effect before the hard
/// kick; the ratio is asserted at compile time below.
pub const STREAM_TIMEOUT: Duration = Duration::from_secs(12);

const _: () = assert!(
    STREAM_TIMEOUT.as_millis() % LIVE_STREAM_BYE_TIMEOUT.as_millis() == 0,
    "STREAM_TIMEOUT must be a whole multiple of LIVE_STREAM_BYE_TIMEOUT"
);
const _: () = assert!(
    STREAM_TIMEOUT.as_millis() / LIVE_STREAM_BYE_TIMEOUT.as_millis() >= 2,
    "STREAM_TIMEOUT must be at least 2x LIVE_STREAM_BYE_TIMEOUT"
);

/// Default worker-pool capacity, scaled off the number of available CPUs.
///
/// A connection-heavy RTSP server is bounded in practice by open file
/// descriptors rather than CPU, but pulling the soft `RLIMIT_NOFILE`
/// would mean reaching for a dependency nothing else in this codebase
/// uses; `num_cpus`-scaling gives a sane default that operators can
/// override via [`ConnectionOptions::with_worker_pool_max`] to match
/// their actual fd ulimit.
pub fn worker_pool_default() -> usize {
    num_cpus::get().saturating_mul(256).max(16)
}

/// Connection configuration options.
///
/// These options control timeouts, buffer sizes, worker-pool sizing, and
/// output-queue backpressure for accepted client connections.
///
/// # Examples
///
/// ```
/// use feng_core::options::ConnectionOptions;
/// use std::time::Duration;
///
/// let opts = ConnectionOptions::default()
///     .with_stream_timeout(Duration::from_secs(20))
///     .with_max_output_queue_bytes(Some(4 * 1024 * 1024));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Soft (RTCP BYE) stream timeout. Defaults to [`LIVE_STREAM_BYE_TIMEOUT`].
    pub live_stream_bye_timeout: Duration,

    /// Hard stream timeout that stops the client loop. Defaults to
    /// [`STREAM_TIMEOUT`].
    pub stream_timeout: Duration,

    /// Maximum number of concurrently admitted clients.
    ///
    /// Defaults to [`worker_pool_default()`]. Admitter rejects new
    /// connections once this many client tasks are live.
    pub worker_pool_max: usize,

    /// Read buffer size (bytes).
    ///
    /// Size of arena-allocated buffers used when reading from the
    /// network.
    pub read_buffer_size: usize,

    /// Write buffer size (bytes).
    ///
    /// Initial capacity of the per-client output queue's staging buffer.
    pub write_buffer_size: usize,

    /// Optional cap on the number of bytes an `OutputPath` may queue
    /// before it is considered backed up and the connection is dropped.
    ///
    /// `None` (default) matches the unbounded-queue behavior of the
    /// original design; set this to bound memory under a slow-reader
    /// client.
    pub max_output_queue_bytes: Option<usize>,

    /// Accept-loop backlog passed to the listening socket.
    pub listen_backlog: i32,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            live_stream_bye_timeout: LIVE_STREAM_BYE_TIMEOUT,
            stream_timeout: STREAM_TIMEOUT,
            worker_pool_max: worker_pool_default(),
            read_buffer_size: 8192,
            write_buffer_size: 8192,
            max_output_queue_bytes: None,
            listen_backlog: 1024,
        }
    }
}

impl ConnectionOptions {
    /// Create new connection options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the soft (RTCP BYE) stream timeout.
    pub fn with_live_stream_bye_timeout(mut self, timeout: Duration) -> Self {
        self.live_stream_bye_timeout = timeout;
        self
    }

    /// Set the hard stream timeout.
    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Set the worker pool (concurrent client) maximum.
    pub fn with_worker_pool_max(mut self, max: usize) -> Self {
        self.worker_pool_max = max;
        self
    }

    /// Set read buffer size.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set write buffer size.
    pub fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Set both read and write buffer sizes (convenience method).
    pub fn with_buffer_sizes(mut self, read_size: usize, write_size: usize) -> Self {
        self.read_buffer_size = read_size;
        self.write_buffer_size = write_size;
        self
    }

    /// Set the output-queue backpressure cap.
    pub fn with_max_output_queue_bytes(mut self, limit: Option<usize>) -> Self {
        self.max_output_queue_bytes = limit;
        self
    }

    /// Set the listen backlog.
    pub fn with_listen_backlog(mut self, backlog: i32) -> Self {
        self.listen_backlog = backlog;
        self
    }

    /// Validate that the configured timeouts preserve the invariant that
    /// the hard timeout is at least two soft intervals.
    pub fn validate(&self) -> std::io::Result<()> {
        if self.live_stream_bye_timeout.is_zero() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "live_stream_bye_timeout cannot be zero",
            ));
        }
        if self.stream_timeout < self.live_stream_bye_timeout.saturating_mul(2) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "stream_timeout must be at least 2x live_stream_bye_timeout",
            ));
        }
        Ok(())
    }
}
