//! The sliding-window sender.
//!
//! Outbound data is fragmented onto the *send queue*, which has no size
//! limit other than the caller's willingness to buffer. Each flush promotes
//! queued segments into the *send buffer* while the transmit window has
//! room, assigning sequence numbers on promotion. Buffered segments stay
//! until acknowledged - cumulatively via `una` or selectively via ACK
//! segments - and are retransmitted on timeout or after enough duplicate
//! ACKs (fast retransmit).

use std::collections::VecDeque;

use tracing::trace;

use crate::error::SendError;
use crate::segment::Segment;
use crate::seq::{seq_before, seq_diff};
use crate::wire::Command;

/// Hard cap on fragments per message: `frg` counts down from `count - 1`
/// in a single byte.
const MAX_FRAGMENTS: usize = 256;

/// Header values stamped when a segment moves from the send queue into the
/// send buffer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SendStamp {
    pub conv: u32,
    pub current: u32,
    /// Initial per-segment RTO.
    pub rto: u32,
    /// Advertised free receive-queue slots.
    pub wnd: u16,
    /// Cumulative ack to piggyback.
    pub una: u32,
}

/// Retransmission policy for one data-flush walk.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FlushPolicy {
    pub current: u32,
    pub rto: u32,
    /// Extra slack on the first-transmission deadline (conservative profile
    /// only).
    pub rto_min_slack: u32,
    /// Linear instead of doubling RTO backoff.
    pub nodelay: bool,
    /// Duplicate-ack count that triggers a fast retransmit.
    pub resend_trigger: u32,
    /// Transmission count up to which fast retransmit stays eligible;
    /// 0 disables the bound.
    pub fast_limit: u32,
    pub wnd: u16,
    pub una: u32,
    /// Transmission count at which the session is declared dead.
    pub dead_link: u32,
}

/// What one data-flush walk observed; drives the congestion reaction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FlushOutcome {
    /// At least one retransmission timer fired.
    pub lost: bool,
    /// At least one fast retransmit fired.
    pub fast_resent: bool,
    /// Some segment reached the dead-link transmission count.
    pub dead: bool,
    /// Timeout retransmissions in this walk.
    pub timeout_resends: u32,
}

#[derive(Debug)]
pub(crate) struct SendWindow {
    /// Lowest sequence number not yet cumulatively acknowledged.
    snd_una: u32,
    /// Next sequence number to assign on promotion.
    snd_nxt: u32,
    /// Fragmented application data waiting for window room; unsequenced.
    queue: VecDeque<Segment>,
    /// Sequenced segments awaiting acknowledgement, sorted by `sn`.
    buf: VecDeque<Segment>,
}

impl SendWindow {
    pub fn new() -> SendWindow {
        SendWindow {
            snd_una: 0,
            snd_nxt: 0,
            queue: VecDeque::new(),
            buf: VecDeque::new(),
        }
    }

    pub fn una(&self) -> u32 {
        self.snd_una
    }

    pub fn next_sn(&self) -> u32 {
        self.snd_nxt
    }

    /// Segments in flight (promoted but not cumulatively acknowledged).
    pub fn inflight(&self) -> u32 {
        self.snd_nxt.wrapping_sub(self.snd_una)
    }

    /// Segments waiting to be sent or acknowledged.
    pub fn pending(&self) -> usize {
        self.queue.len() + self.buf.len()
    }

    /// Fragment `data` onto the send queue.
    ///
    /// In stream mode the queued tail segment is topped up to `mss` first
    /// and message boundaries are not preserved; otherwise fragments carry
    /// the countdown `frg` so the receiver can rebuild the message. An
    /// empty `data` still queues one empty segment outside stream mode.
    pub fn push(
        &mut self,
        mut data: &[u8],
        mss: usize,
        stream: bool,
        fragment_limit: usize,
    ) -> Result<(), SendError> {
        let original_len = data.len();

        if stream {
            if let Some(tail) = self.queue.back_mut() {
                if tail.payload.len() < mss {
                    let extend = data.len().min(mss - tail.payload.len());
                    tail.payload.extend_from_slice(&data[..extend]);
                    tail.header.len = tail.payload.len() as u32;
                    tail.header.frg = 0;
                    data = &data[extend..];
                }
            }
            if data.is_empty() {
                return Ok(());
            }
        }

        let count = if data.len() <= mss { 1 } else { data.len().div_ceil(mss) };
        if count >= fragment_limit.min(MAX_FRAGMENTS) {
            return Err(SendError::FragmentLimit(original_len));
        }

        for i in 0..count {
            let take = data.len().min(mss);
            let mut seg = Segment::data(data[..take].to_vec());
            seg.header.frg = if stream { 0 } else { (count - 1 - i) as u8 };
            self.queue.push_back(seg);
            data = &data[take..];
        }
        Ok(())
    }

    /// Promote queued segments into the send buffer while the transmit
    /// window `wnd` (in segments) has room, assigning sequence numbers.
    pub fn promote(&mut self, wnd: u32, stamp: SendStamp) {
        while seq_diff(self.snd_nxt, self.snd_una.wrapping_add(wnd)) < 0 {
            let Some(mut seg) = self.queue.pop_front() else {
                break;
            };
            seg.header.conv = stamp.conv;
            seg.header.cmd = Command::Push.into();
            seg.header.wnd = stamp.wnd;
            seg.header.ts = stamp.current;
            seg.header.sn = self.snd_nxt;
            seg.header.una = stamp.una;
            seg.resend_at = stamp.current;
            seg.rto = stamp.rto;
            self.snd_nxt = self.snd_nxt.wrapping_add(1);
            self.buf.push_back(seg);
        }
    }

    /// Cumulative ack: retire every buffered segment with `sn < una`.
    pub fn ack_cumulative(&mut self, una: u32) {
        while let Some(front) = self.buf.front() {
            if seq_before(front.header.sn, una) {
                self.buf.pop_front();
            } else {
                break;
            }
        }
        self.shrink();
    }

    /// Selective ack: retire the buffered segment with exactly this `sn`.
    /// Out-of-range or already-retired numbers are ignored.
    pub fn ack_segment(&mut self, sn: u32) {
        if seq_before(sn, self.snd_una) || !seq_before(sn, self.snd_nxt) {
            return;
        }
        for (idx, seg) in self.buf.iter().enumerate() {
            if seg.header.sn == sn {
                self.buf.remove(idx);
                break;
            }
            if seq_before(sn, seg.header.sn) {
                break;
            }
        }
        self.shrink();
    }

    /// Re-derive `snd_una` from the buffer head after acknowledgements.
    fn shrink(&mut self) {
        self.snd_una = match self.buf.front() {
            Some(seg) => seg.header.sn,
            None => self.snd_nxt,
        };
    }

    /// Duplicate-ack accounting: every buffered segment older than
    /// `max_ack` (the highest sn acknowledged by one datagram) was
    /// overtaken and moves closer to a fast retransmit.
    pub fn apply_fast_acks(&mut self, max_ack: u32) {
        if seq_before(max_ack, self.snd_una) || !seq_before(max_ack, self.snd_nxt) {
            return;
        }
        for seg in self.buf.iter_mut() {
            if seq_before(seg.header.sn, max_ack) {
                seg.fast_acks += 1;
            } else {
                break;
            }
        }
    }

    /// Millisecond distance to the earliest scheduled retransmission, for
    /// host sleep scheduling. `Some(0)` means a timer already fired.
    pub fn earliest_resend(&self, current: u32) -> Option<i32> {
        let mut earliest: Option<i32> = None;
        for seg in &self.buf {
            let diff = seq_diff(seg.resend_at, current);
            if diff <= 0 {
                return Some(0);
            }
            if earliest.map_or(true, |e| diff < e) {
                earliest = Some(diff);
            }
        }
        earliest
    }

    /// Walk the send buffer deciding what to (re)transmit now, handing
    /// each due segment to `emit` with its volatile header fields freshly
    /// stamped.
    pub fn flush_data(&mut self, policy: FlushPolicy, mut emit: impl FnMut(&Segment)) -> FlushOutcome {
        let mut outcome = FlushOutcome::default();

        for seg in self.buf.iter_mut() {
            let mut needs_send = false;
            if seg.transmits == 0 {
                // first transmission
                needs_send = true;
                seg.transmits = 1;
                seg.rto = policy.rto;
                seg.resend_at = policy.current.wrapping_add(seg.rto + policy.rto_min_slack);
            } else if seq_diff(policy.current, seg.resend_at) >= 0 {
                // retransmission timeout
                needs_send = true;
                seg.transmits += 1;
                outcome.timeout_resends += 1;
                seg.rto += if policy.nodelay { policy.rto } else { seg.rto.max(policy.rto) };
                seg.resend_at = policy.current.wrapping_add(seg.rto);
                outcome.lost = true;
                trace!("timeout retransmit of sn {} (attempt {})", seg.header.sn, seg.transmits);
            } else if seg.fast_acks >= policy.resend_trigger
                && (seg.transmits <= policy.fast_limit || policy.fast_limit == 0)
            {
                // enough later segments were acknowledged past this one
                needs_send = true;
                seg.transmits += 1;
                seg.fast_acks = 0;
                seg.resend_at = policy.current.wrapping_add(seg.rto);
                outcome.fast_resent = true;
                trace!("fast retransmit of sn {}", seg.header.sn);
            }

            if needs_send {
                seg.header.ts = policy.current;
                seg.header.wnd = policy.wnd;
                seg.header.una = policy.una;
                emit(seg);
                if seg.transmits >= policy.dead_link {
                    outcome.dead = true;
                }
            }
        }

        outcome
    }

    #[cfg(test)]
    pub fn queued_segments(&self) -> &VecDeque<Segment> {
        &self.queue
    }

    #[cfg(test)]
    pub fn buffered_segments(&self) -> &VecDeque<Segment> {
        &self.buf
    }

    #[cfg(test)]
    pub fn buffered_segments_mut(&mut self) -> &mut VecDeque<Segment> {
        &mut self.buf
    }
}
