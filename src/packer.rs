//! MTU-bounded packing of outbound segments into datagrams.
//!
//! All flush stages (acknowledgements, window probes, data) append to one
//! shared scratch buffer. The buffer drains to the sink whenever the next
//! segment would push the datagram past the MTU, and once more at the end
//! of a flush pass - so small control segments piggyback on data datagrams
//! instead of paying for their own.

use bytes::BytesMut;

use crate::sink::DatagramSink;
use crate::wire::{SegmentHeader, HEADER_LEN};

#[derive(Debug)]
pub(crate) struct DatagramPacker {
    buf: BytesMut,
    mtu: usize,
}

impl DatagramPacker {
    /// Scratch sized to hold a drained datagram plus one maximum-size
    /// segment without reallocating.
    fn scratch_capacity(mtu: usize) -> usize {
        3 * (mtu + HEADER_LEN)
    }

    pub fn new(mtu: usize) -> DatagramPacker {
        DatagramPacker {
            buf: BytesMut::with_capacity(Self::scratch_capacity(mtu)),
            mtu,
        }
    }

    pub fn set_mtu(&mut self, mtu: usize) {
        self.buf = BytesMut::with_capacity(Self::scratch_capacity(mtu));
        self.mtu = mtu;
    }

    /// Append one segment, draining the current datagram first if the
    /// segment would not fit any more.
    pub fn push(&mut self, header: &SegmentHeader, payload: &[u8], sink: &mut dyn DatagramSink) {
        if self.buf.len() + HEADER_LEN + payload.len() > self.mtu {
            self.flush(sink);
        }
        header.ser(&mut self.buf);
        self.buf.extend_from_slice(payload);
    }

    /// Drain the pending datagram, if any. The sink never sees an empty
    /// buffer.
    pub fn flush(&mut self, sink: &mut dyn DatagramSink) {
        if self.buf.is_empty() {
            return;
        }
        sink.send_datagram(&self.buf);
        self.buf.clear();
    }
}
