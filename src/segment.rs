use crate::wire::{Command, SegmentHeader};

/// One owned protocol segment: header, payload, and the sender-side
/// retransmission metadata that never goes on the wire.
///
/// Segments are move-only. Outbound they travel send queue -> send buffer
/// and are dropped on acknowledgement; inbound they travel receive buffer
/// -> receive queue and are dropped when the application consumes them.
#[derive(Debug, Default)]
pub(crate) struct Segment {
    pub header: SegmentHeader,
    pub payload: Vec<u8>,

    /// Earliest time this segment is retransmitted.
    pub resend_at: u32,
    /// Per-segment RTO, backed off on every timeout.
    pub rto: u32,
    /// ACKs for later sequence numbers seen since the last (re)send.
    pub fast_acks: u32,
    /// How often this segment has been transmitted.
    pub transmits: u32,
}

impl Segment {
    /// A fresh outbound data segment. `conv`, `sn` and the window fields
    /// are stamped when the segment enters the send buffer.
    pub fn data(payload: Vec<u8>) -> Segment {
        Segment {
            header: SegmentHeader {
                cmd: Command::Push.into(),
                len: payload.len() as u32,
                ..SegmentHeader::default()
            },
            payload,
            ..Segment::default()
        }
    }

    /// An inbound segment as parsed off the wire.
    pub fn from_wire(header: SegmentHeader, payload: Vec<u8>) -> Segment {
        Segment { header, payload, ..Segment::default() }
    }
}
