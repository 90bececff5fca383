//! The on-wire segment layout.
//!
//! Every segment is a fixed 24-byte header optionally followed by payload;
//! datagrams concatenate one or more segments. Multi-byte fields are
//! little-endian on both ends regardless of host endianness, so mixed
//! builds interoperate bit-exactly.

use bytes::{Buf, BufMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::InputError;

/// Header bytes preceding every segment payload.
pub const HEADER_LEN: usize = 24;

/// Smallest MTU the engine accepts: one header plus room for payload.
pub const MIN_MTU: usize = 50;

/// Command byte of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Command {
    /// Data segment.
    Push = 81,
    /// Acknowledgement of a single `sn`, echoing its send timestamp.
    Ack = 82,
    /// Ask the peer to advertise its receive window.
    WindowAsk = 83,
    /// Advertise the local receive window (answer to `WindowAsk`).
    WindowTell = 84,
}

/// The 24-byte segment header.
///
/// `cmd` is kept as the raw byte: the input pipeline must check the
/// conversation id before it may reject an unknown command, so decoding is
/// deferred to [`SegmentHeader::command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentHeader {
    pub conv: u32,
    pub cmd: u8,
    /// Fragment countdown: `count - 1` on the first fragment of a message,
    /// 0 on the last.
    pub frg: u8,
    /// Free receive-queue slots of the sending side.
    pub wnd: u16,
    pub ts: u32,
    pub sn: u32,
    /// Cumulative acknowledgement: every sn below this has been received.
    pub una: u32,
    /// Payload bytes following this header.
    pub len: u32,
}

impl SegmentHeader {
    pub fn ser(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.conv);
        buf.put_u8(self.cmd);
        buf.put_u8(self.frg);
        buf.put_u16_le(self.wnd);
        buf.put_u32_le(self.ts);
        buf.put_u32_le(self.sn);
        buf.put_u32_le(self.una);
        buf.put_u32_le(self.len);
    }

    pub fn deser(buf: &mut impl Buf) -> Result<SegmentHeader, InputError> {
        if buf.remaining() < HEADER_LEN {
            return Err(InputError::Malformed);
        }
        Ok(SegmentHeader {
            conv: buf.get_u32_le(),
            cmd: buf.get_u8(),
            frg: buf.get_u8(),
            wnd: buf.get_u16_le(),
            ts: buf.get_u32_le(),
            sn: buf.get_u32_le(),
            una: buf.get_u32_le(),
            len: buf.get_u32_le(),
        })
    }

    /// Decode the command byte.
    pub fn command(&self) -> Result<Command, InputError> {
        Command::try_from(self.cmd).map_err(|_| InputError::UnknownCommand(self.cmd))
    }
}
