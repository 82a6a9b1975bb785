//! Write-strategy dispatch.
//!
//! Rendered as a tagged variant rather than a function-pointer-per-client:
//! `Transport` carries both the selected strategy and its state, so a
//! write never has to guess which queueing discipline applies.

use std::collections::VecDeque;

use bytes::Bytes;
use feng_core::error::{ConnectionError, Result};

/// TCP queued write strategy.
///
/// Writes enqueue an owned buffer at the tail; the write pump in
/// [`crate::runner::ClientRunner`] drains from the head, leaving any
/// partial-write remainder in place.
/// Byte order on the wire matches enqueue order.
#[derive(Debug, Default)]
pub struct TcpQueue {
    queue: VecDeque<Bytes>,
    queued_bytes: usize,
    max_bytes: Option<usize>,
}

impl TcpQueue {
    pub fn new(max_bytes: Option<usize>) -> Self {
        Self {
            queue: VecDeque::new(),
            queued_bytes: 0,
            max_bytes,
        }
    }

    pub fn push(&mut self, buf: Bytes) -> Result<()> {
        if let Some(limit) = self.max_bytes {
            if self.queued_bytes + buf.len() > limit {
                return Err(ConnectionError::OutputQueueFull { limit });
            }
        }
        self.queued_bytes += buf.len();
        self.queue.push_back(buf);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn queued_bytes(&self) -> usize {
        self.queued_bytes
    }

    /// Pop the buffer at the head of the queue for the write pump to
    /// send. Any unsent remainder is pushed back to the front by the
    /// caller via [`TcpQueue::requeue_front`].
    pub fn pop_front(&mut self) -> Option<Bytes> {
        let buf = self.queue.pop_front();
        if let Some(b) = &buf {
            self.queued_bytes -= b.len();
        }
        buf
    }

    /// Restore a partially-written buffer to the head of the queue.
    pub fn requeue_front(&mut self, remainder: Bytes) {
        if remainder.is_empty() {
            return;
        }
        self.queued_bytes += remainder.len();
        self.queue.push_front(remainder);
    }
}

/// SCTP message-oriented write strategy.
///
/// Each entry is one complete message tagged with the stream id the
/// caller chose (RTSP control vs. an interleaved RTP channel). There is
/// no byte-level reassembly: the kernel preserves per-stream ordering,
/// so the queue here only exists to let the write pump hand messages to
/// the socket one at a time without blocking the read pump.
#[derive(Debug, Default)]
pub struct SctpDirect {
    queue: VecDeque<(u16, Bytes)>,
}

impl SctpDirect {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    pub fn push(&mut self, stream_id: u16, buf: Bytes) {
        self.queue.push_back((stream_id, buf));
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pop_front(&mut self) -> Option<(u16, Bytes)> {
        self.queue.pop_front()
    }
}

/// The RTSP control stream id for SCTP transports; interleaved RTP
/// channels use their channel id as the SCTP stream id directly.
pub const SCTP_CONTROL_STREAM: u16 = 0;

/// Per-client write strategy, selected at admit time and invariant
/// thereafter.
#[derive(Debug)]
pub enum Transport {
    Tcp(TcpQueue),
    #[cfg_attr(not(feature = "sctp"), allow(dead_code))]
    Sctp(SctpDirect),
}

impl Transport {
    pub fn new_tcp(max_output_queue_bytes: Option<usize>) -> Self {
        Self::Tcp(TcpQueue::new(max_output_queue_bytes))
    }

    #[cfg(feature = "sctp")]
    pub fn new_sctp() -> Self {
        Self::Sctp(SctpDirect::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Tcp(q) => q.is_empty(),
            Self::Sctp(q) => q.is_empty(),
        }
    }

    /// Enqueue a complete message, taking ownership. The caller must not
    /// observe `buf` afterwards.
    pub fn write(&mut self, stream_id: u16, buf: Bytes) -> Result<()> {
        match self {
            Self::Tcp(q) => q.push(buf),
            Self::Sctp(q) => {
                q.push(stream_id, buf);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_queue_preserves_enqueue_order() {
        let mut t = Transport::new_tcp(None);
        t.write(0, Bytes::from_static(b"first")).unwrap();
        t.write(0, Bytes::from_static(b"second")).unwrap();
        if let Transport::Tcp(q) = &mut t {
            assert_eq!(q.pop_front().unwrap(), Bytes::from_static(b"first"));
            assert_eq!(q.pop_front().unwrap(), Bytes::from_static(b"second"));
            assert!(q.is_empty());
        } else {
            panic!("expected Tcp transport");
        }
    }

    #[test]
    fn tcp_queue_rejects_over_cap() {
        let mut t = Transport::new_tcp(Some(4));
        assert!(t.write(0, Bytes::from_static(b"hello")).is_err());
    }

    #[test]
    fn tcp_queue_requeue_front_preserves_remainder() {
        let mut q = TcpQueue::new(None);
        q.push(Bytes::from_static(b"0123456789")).unwrap();
        let buf = q.pop_front().unwrap();
        // Simulate a partial write of 4 bytes.
        let remainder = buf.slice(4..);
        q.requeue_front(remainder);
        assert_eq!(q.pop_front().unwrap(), Bytes::from_static(b"456789"));
    }
}
