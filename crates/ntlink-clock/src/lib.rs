//! Server/client clock offset estimation for ntlink.
//!
//! The client periodically sends its local time on the reserved time topic.
//! The server answers with its own time and echoes the client's send time,
//! which lets the client measure the round trip and estimate how far the
//! server clock runs ahead of its own:
//!
//! ```text
//! rtt    = recv - send
//! offset = (server + rtt / 2) - recv
//! ```
//!
//! Each reply replaces the previous estimate outright; there is no
//! filtering. The estimate survives reconnects.
//!
//! # Integration
//!
//! [`ClockSync`] is plain state. The client driver owns the timer:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = sync_timer.tick() => {
//!             let send = clock.probe(local.now_micros());
//!             queue_time_record(send);
//!         }
//!         // ... on a time reply:
//!         // clock.on_reply(server, echoed, local.now_micros());
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, trace, warn};

/// Default period between time-sync probes while connected.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Local clocks
// ---------------------------------------------------------------------------

/// A source of local time in microseconds.
pub trait LocalClock: Send + Sync + 'static {
    /// Current local time in microseconds.
    fn now_micros(&self) -> i64;
}

/// Wall-clock time: microseconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl LocalClock for SystemClock {
    fn now_micros(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(since) => i64::try_from(since.as_micros()).unwrap_or(i64::MAX),
            // Clock set before 1970.
            Err(e) => -i64::try_from(e.duration().as_micros()).unwrap_or(i64::MAX),
        }
    }
}

/// A clock that only moves when told to. For tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_us: i64) -> Self {
        Self {
            now: AtomicI64::new(start_us),
        }
    }

    pub fn set(&self, now_us: i64) {
        self.now.store(now_us, Ordering::SeqCst);
    }

    pub fn advance(&self, by_us: i64) {
        self.now.fetch_add(by_us, Ordering::SeqCst);
    }
}

impl LocalClock for ManualClock {
    fn now_micros(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counters describing the sync exchange so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Probes handed out by [`ClockSync::probe`].
    pub probes_sent: u64,
    /// Replies that produced a new offset.
    pub replies_accepted: u64,
    /// Replies discarded (negative round trip or out-of-range times).
    pub replies_rejected: u64,
    /// Round trip of the last accepted reply, in microseconds.
    pub last_rtt_us: Option<i64>,
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

/// Offset estimator for one client.
#[derive(Debug, Default)]
pub struct ClockSync {
    offset_us: i64,
    stats: SyncStats,
}

impl ClockSync {
    /// Starts with a zero offset: server time is assumed equal to local time
    /// until the first reply arrives.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a probe is going out and returns the value to send on
    /// the time topic: the local send time itself.
    pub fn probe(&mut self, local_now_us: i64) -> i64 {
        self.stats.probes_sent += 1;
        trace!(send_us = local_now_us, "time probe");
        local_now_us
    }

    /// Applies a server reply.
    ///
    /// `server_time_us` is the reply's timestamp, `echoed_send_us` the local
    /// send time the server echoed back, `local_recv_us` the local time the
    /// reply arrived. Returns the new offset, or `None` if the reply was
    /// discarded.
    pub fn on_reply(
        &mut self,
        server_time_us: i64,
        echoed_send_us: i64,
        local_recv_us: i64,
    ) -> Option<i64> {
        let Some(rtt) = local_recv_us.checked_sub(echoed_send_us) else {
            return self.reject(server_time_us, echoed_send_us, local_recv_us);
        };
        if rtt < 0 {
            self.stats.replies_rejected += 1;
            warn!(
                send_us = echoed_send_us,
                recv_us = local_recv_us,
                "time reply echoes a send time in the future; discarding"
            );
            return None;
        }

        let Some(offset) = server_time_us
            .checked_add(rtt / 2)
            .and_then(|t| t.checked_sub(local_recv_us))
        else {
            return self.reject(server_time_us, echoed_send_us, local_recv_us);
        };
        if offset != self.offset_us {
            debug!(rtt_us = rtt, old = self.offset_us, new = offset, "clock offset updated");
        }
        self.offset_us = offset;
        self.stats.replies_accepted += 1;
        self.stats.last_rtt_us = Some(rtt);
        Some(offset)
    }

    /// Current estimate of `server_time - local_time`, in microseconds.
    pub fn offset_us(&self) -> i64 {
        self.offset_us
    }

    /// Estimated server time at the given local time.
    pub fn server_time_us(&self, local_now_us: i64) -> i64 {
        local_now_us.saturating_add(self.offset_us)
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    fn reject(&mut self, server_us: i64, send_us: i64, recv_us: i64) -> Option<i64> {
        self.stats.replies_rejected += 1;
        warn!(server_us, send_us, recv_us, "time reply out of range; discarding");
        None
    }
}
