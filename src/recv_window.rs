//! The reassembly receiver.
//!
//! Arriving data segments land in the *receive buffer*: in-window only,
//! kept sorted by sequence number, duplicates dropped. Whenever the buffer
//! head continues the contiguous sequence, it slides into the *receive
//! queue*, from which the application consumes whole messages - a message
//! being a run of segments whose fragment countdown ends at 0.

use std::collections::VecDeque;

use tracing::trace;

use crate::error::RecvError;
use crate::segment::Segment;
use crate::seq::{seq_before, seq_diff};

#[derive(Debug)]
pub(crate) struct ReceiveWindow {
    /// Next sequence number expected in order.
    rcv_nxt: u32,
    /// Window size in segments.
    wnd: u16,
    /// Out-of-order segments waiting for their predecessors.
    buf: VecDeque<Segment>,
    /// Contiguous run of segments ready for consumption.
    queue: VecDeque<Segment>,
}

impl ReceiveWindow {
    pub fn new(wnd: u16) -> ReceiveWindow {
        ReceiveWindow {
            rcv_nxt: 0,
            wnd,
            buf: VecDeque::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn next_sn(&self) -> u32 {
        self.rcv_nxt
    }

    pub fn window(&self) -> u16 {
        self.wnd
    }

    pub fn set_window(&mut self, wnd: u16) {
        self.wnd = wnd;
    }

    /// Receive-queue slots still advertisable to the peer.
    pub fn unused_slots(&self) -> u16 {
        (self.wnd as usize).saturating_sub(self.queue.len()) as u16
    }

    /// `true` while the receive queue has no advertisable room left.
    pub fn is_saturated(&self) -> bool {
        self.queue.len() >= self.wnd as usize
    }

    /// `true` iff `sn` falls into the current receive window.
    pub fn accepts(&self, sn: u32) -> bool {
        !seq_before(sn, self.rcv_nxt)
            && seq_diff(sn, self.rcv_nxt.wrapping_add(self.wnd as u32)) < 0
    }

    /// File an arrived data segment. Out-of-window and duplicate segments
    /// are dropped silently; everything else is inserted in `sn` order and
    /// the contiguous prefix slides into the receive queue.
    pub fn on_data(&mut self, seg: Segment) {
        let sn = seg.header.sn;
        if !self.accepts(sn) {
            trace!("dropping out-of-window data sn {}", sn);
            return;
        }

        // scan from the back: fresh segments usually extend the buffer
        let mut insert_at = self.buf.len();
        let mut duplicate = false;
        for (idx, held) in self.buf.iter().enumerate().rev() {
            if held.header.sn == sn {
                duplicate = true;
                break;
            }
            if seq_before(held.header.sn, sn) {
                insert_at = idx + 1;
                break;
            }
            insert_at = idx;
        }
        if duplicate {
            trace!("dropping duplicate data sn {}", sn);
            return;
        }

        self.buf.insert(insert_at, seg);
        self.advance();
    }

    /// Slide the contiguous prefix of the receive buffer into the queue,
    /// bounded by the window.
    pub fn advance(&mut self) {
        loop {
            let head_is_next = self
                .buf
                .front()
                .map_or(false, |front| front.header.sn == self.rcv_nxt);
            if !head_is_next || self.queue.len() >= self.wnd as usize {
                break;
            }
            let seg = self.buf.pop_front().expect("head existence checked above");
            self.queue.push_back(seg);
            self.rcv_nxt = self.rcv_nxt.wrapping_add(1);
        }
    }

    /// Total payload length of the next complete message, if every one of
    /// its fragments is already queued.
    pub fn peek_size(&self) -> Option<usize> {
        let front = self.queue.front()?;
        if front.header.frg == 0 {
            return Some(front.payload.len());
        }
        if self.queue.len() < front.header.frg as usize + 1 {
            return None;
        }
        let mut total = 0;
        for seg in &self.queue {
            total += seg.payload.len();
            if seg.header.frg == 0 {
                break;
            }
        }
        Some(total)
    }

    /// Drain the next complete message into `out`, returning its length.
    pub fn read(&mut self, out: &mut [u8]) -> Result<usize, RecvError> {
        if self.queue.is_empty() {
            return Err(RecvError::Empty);
        }
        let size = self.peek_size().ok_or(RecvError::Incomplete)?;
        if size > out.len() {
            return Err(RecvError::BufferTooSmall { needed: size, capacity: out.len() });
        }

        let mut written = 0;
        while let Some(seg) = self.queue.pop_front() {
            out[written..written + seg.payload.len()].copy_from_slice(&seg.payload);
            written += seg.payload.len();
            if seg.header.frg == 0 {
                break;
            }
        }
        debug_assert_eq!(written, size);
        Ok(written)
    }

    #[cfg(test)]
    pub fn buffered_sns(&self) -> Vec<u32> {
        self.buf.iter().map(|s| s.header.sn).collect()
    }

    #[cfg(test)]
    pub fn queued_sns(&self) -> Vec<u32> {
        self.queue.iter().map(|s| s.header.sn).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::SegmentHeader;
    use rstest::rstest;

    fn data_segment(sn: u32, frg: u8, payload: &[u8]) -> Segment {
        Segment::from_wire(
            SegmentHeader {
                sn,
                frg,
                len: payload.len() as u32,
                ..SegmentHeader::default()
            },
            payload.to_vec(),
        )
    }

    fn window_with(sns: &[u32]) -> ReceiveWindow {
        let mut window = ReceiveWindow::new(128);
        for &sn in sns {
            window.on_data(data_segment(sn, 0, &[sn as u8]));
        }
        window
    }

    #[rstest]
    #[case::in_order(&[0, 1, 2], vec![0, 1, 2], vec![], 3)]
    #[case::reordered(&[2, 0, 1], vec![0, 1, 2], vec![], 3)]
    #[case::gap_blocks(&[0, 2, 3], vec![0], vec![2, 3], 1)]
    #[case::gap_then_fill(&[2, 3, 0, 1], vec![0, 1, 2, 3], vec![], 4)]
    #[case::duplicates_dropped(&[0, 1, 1, 0, 2], vec![0, 1, 2], vec![], 3)]
    #[case::duplicate_in_buffer(&[5, 5, 3], vec![], vec![3, 5], 0)]
    fn test_on_data_ordering(
        #[case] arrivals: &[u32],
        #[case] expected_queue: Vec<u32>,
        #[case] expected_buf: Vec<u32>,
        #[case] expected_rcv_nxt: u32,
    ) {
        let window = window_with(arrivals);

        assert_eq!(window.queued_sns(), expected_queue);
        assert_eq!(window.buffered_sns(), expected_buf);
        assert_eq!(window.next_sn(), expected_rcv_nxt);
    }

    #[rstest]
    #[case::below_window(2, 1, false)]
    #[case::at_next(2, 2, true)]
    #[case::inside(2, 100, true)]
    #[case::at_upper_edge(2, 130, false)]
    #[case::far_above(2, 5_000, false)]
    fn test_accepts(#[case] rcv_nxt_target: u32, #[case] sn: u32, #[case] expected: bool) {
        let mut window = ReceiveWindow::new(128);
        for sn in 0..rcv_nxt_target {
            window.on_data(data_segment(sn, 0, b"x"));
        }
        assert_eq!(window.next_sn(), rcv_nxt_target);

        assert_eq!(window.accepts(sn), expected);
    }

    #[test]
    fn test_advance_stops_at_full_queue() {
        let mut window = ReceiveWindow::new(128);
        window.set_window(2);

        for sn in 0..4 {
            window.on_data(data_segment(sn, 0, b"x"));
        }

        assert_eq!(window.queued_sns(), vec![0, 1]);
        assert_eq!(window.buffered_sns(), vec![2, 3]);
        assert!(window.is_saturated());
        assert_eq!(window.unused_slots(), 0);

        let mut out = [0u8; 8];
        window.read(&mut out).unwrap();
        window.advance();
        assert_eq!(window.queued_sns(), vec![1, 2]);
    }

    #[rstest]
    #[case::empty(&[], None)]
    #[case::single(&[(0, 0, 3)], Some(3))]
    #[case::fragmented_complete(&[(0, 1, 4), (1, 0, 2)], Some(6))]
    #[case::fragmented_incomplete(&[(0, 2, 4), (1, 1, 4)], None)]
    #[case::second_message_pending(&[(0, 0, 3), (1, 1, 5)], Some(3))]
    fn test_peek_size(#[case] segments: &[(u32, u8, usize)], #[case] expected: Option<usize>) {
        let mut window = ReceiveWindow::new(128);
        for &(sn, frg, len) in segments {
            window.on_data(data_segment(sn, frg, &vec![0u8; len]));
        }

        assert_eq!(window.peek_size(), expected);
    }

    #[test]
    fn test_read_joins_fragments() {
        let mut window = ReceiveWindow::new(128);
        window.on_data(data_segment(0, 2, b"one"));
        window.on_data(data_segment(1, 1, b"two"));
        window.on_data(data_segment(2, 0, b"three"));
        window.on_data(data_segment(3, 0, b"next"));

        let mut out = [0u8; 32];
        let len = window.read(&mut out).unwrap();

        assert_eq!(&out[..len], b"onetwothree");
        assert_eq!(window.queued_sns(), vec![3]);

        let len = window.read(&mut out).unwrap();
        assert_eq!(&out[..len], b"next");
    }

    #[test]
    fn test_read_errors() {
        let mut window = ReceiveWindow::new(128);
        let mut out = [0u8; 4];

        assert_eq!(window.read(&mut out), Err(RecvError::Empty));

        window.on_data(data_segment(0, 1, b"half"));
        assert_eq!(window.read(&mut out), Err(RecvError::Incomplete));

        window.on_data(data_segment(1, 0, b"done"));
        assert_eq!(
            window.read(&mut out),
            Err(RecvError::BufferTooSmall { needed: 8, capacity: 4 })
        );

        let mut out = [0u8; 8];
        assert_eq!(window.read(&mut out), Ok(8));
        assert_eq!(&out, b"halfdone");
    }
}
