//! Periodic per-client RTP session timeout sweep.

use std::time::{Duration, Instant};

use tracing::info;

use crate::client::Client;
use crate::traits::SourceKind;

/// Result of one [`TimeoutMonitor::tick`] call: whether the client's
/// loop must stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    HardTimeout,
}

/// Stateless sweep over a client's attached RTP sessions, invoked from
/// the repeating timer inside that client's own loop (never from another
/// task — there is nothing here to synchronize).
pub struct TimeoutMonitor {
    live_stream_bye_timeout: Duration,
    stream_timeout: Duration,
}

impl TimeoutMonitor {
    pub fn new(live_stream_bye_timeout: Duration, stream_timeout: Duration) -> Self {
        Self {
            live_stream_bye_timeout,
            stream_timeout,
        }
    }

    /// The soft (RTCP BYE) interval — also the period `ClientRunner` drives
    /// its repeating sweep at, so the soft window can never be skipped.
    pub fn live_stream_bye_timeout(&self) -> Duration {
        self.live_stream_bye_timeout
    }

    /// Check every session attached to `client`, emitting a soft RTCP
    /// BYE for idle LIVE sessions and returning [`TickOutcome::HardTimeout`]
    /// the first time *any* session (LIVE or STORED) has been idle for at
    /// least `stream_timeout`.
    pub fn tick(&self, client: &mut Client, now: Instant) -> TickOutcome {
        let Some(handler) = client.handler_mut() else {
            return TickOutcome::Continue;
        };
        let sessions = handler.rtp_sessions();
        let mut hard = false;

        for session in sessions {
            let idle = now.saturating_duration_since(session.last_packet_send_time());

            if session.source_kind() == SourceKind::Live && idle >= self.live_stream_bye_timeout {
                info!(client = %client.id(), ?idle, "soft stream timeout, sending RTCP BYE");
                session.send_rtcp_bye();
                // Deliberately does not update last_packet_send_time (see
                // DESIGN.md for the rationale): a persistently idle
                // LIVE session will re-emit BYE on every tick until the
                // hard kick below takes over.
            }

            if idle >= self.stream_timeout {
                hard = true;
            }
        }

        if hard {
            info!(client = %client.id(), "hard stream timeout, stopping client loop");
            TickOutcome::HardTimeout
        } else {
            TickOutcome::Continue
        }
    }
}
