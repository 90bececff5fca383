//! Congestion-window evolution.
//!
//! Below `ssthresh` the window grows by one segment per cumulative-ack
//! advance (slow start). Above it, a byte accumulator `incr` implements
//! additive increase: each advance contributes roughly `mss²/incr` bytes,
//! and the window grows by one segment whenever a full window of bytes has
//! accumulated. Loss reacts multiplicatively: a retransmission timeout
//! collapses the window to one segment, a fast retransmit halves to the
//! in-flight level and keeps transmitting.

use std::cmp::max;
use tracing::debug;

pub(crate) const SSTHRESH_INIT: u32 = 2;
pub(crate) const SSTHRESH_MIN: u32 = 2;

#[derive(Debug)]
pub(crate) struct CongestionController {
    cwnd: u32,
    ssthresh: u32,
    /// Byte accumulator for additive increase.
    incr: u32,
}

impl CongestionController {
    pub fn new() -> CongestionController {
        CongestionController {
            cwnd: 0,
            ssthresh: SSTHRESH_INIT,
            incr: 0,
        }
    }

    /// Current window in segments.
    pub fn window(&self) -> u32 {
        self.cwnd
    }

    /// Grow the window after `snd_una` advanced. Growth is capped at the
    /// peer's advertised window: inflating past what the peer accepts
    /// cannot increase throughput.
    pub fn on_ack_advance(&mut self, mss: u32, rmt_wnd: u32) {
        if self.cwnd >= rmt_wnd {
            return;
        }
        if self.cwnd < self.ssthresh {
            self.cwnd += 1;
            self.incr += mss;
        } else {
            if self.incr < mss {
                self.incr = mss;
            }
            self.incr += mss.saturating_mul(mss) / self.incr + mss / 16;
            if (self.cwnd + 1).saturating_mul(mss) <= self.incr {
                self.cwnd += 1;
            }
        }
        if self.cwnd > rmt_wnd {
            self.cwnd = rmt_wnd;
            self.incr = rmt_wnd.saturating_mul(mss);
        }
    }

    /// A fast retransmit fired: the path still delivers, so halve to the
    /// in-flight level and continue above the threshold.
    pub fn on_fast_retransmit(&mut self, inflight: u32, resend_trigger: u32, mss: u32) {
        self.ssthresh = max(inflight / 2, SSTHRESH_MIN);
        self.cwnd = self.ssthresh.saturating_add(resend_trigger);
        self.incr = self.cwnd.saturating_mul(mss);
        debug!("fast retransmit: ssthresh={}, cwnd={}", self.ssthresh, self.cwnd);
    }

    /// A retransmission timer fired: collapse to one segment in flight.
    pub fn on_loss(&mut self, mss: u32) {
        self.ssthresh = max(self.cwnd / 2, SSTHRESH_MIN);
        self.cwnd = 1;
        self.incr = mss;
        debug!("retransmission timeout: ssthresh={}, cwnd=1", self.ssthresh);
    }

    /// Keep at least one segment transmittable; applied after every data
    /// flush.
    pub fn floor(&mut self, mss: u32) {
        if self.cwnd < 1 {
            self.cwnd = 1;
            self.incr = mss;
        }
    }

    #[cfg(test)]
    pub fn set_internals(&mut self, cwnd: u32, ssthresh: u32, incr: u32) {
        self.cwnd = cwnd;
        self.ssthresh = ssthresh;
        self.incr = incr;
    }

    #[cfg(test)]
    pub fn internals(&self) -> (u32, u32, u32) {
        (self.cwnd, self.ssthresh, self.incr)
    }
}
