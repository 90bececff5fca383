//! A reliable, ordered, connection-oriented message transport built on an
//! unreliable datagram substrate (typically UDP), with explicit and tunable
//! latency/throughput trade-offs.
//!
//! ## Design goals
//!
//! * TCP-like delivery guarantees - every message arrives, exactly once, in
//!   the order it was sent - without TCP's latency behavior under loss:
//!   * selective acknowledgements so a single dropped datagram does not
//!     stall acknowledgement of everything behind it
//!   * fast retransmit driven by duplicate-ack counting instead of waiting
//!     for a retransmission timer
//!   * configurable retransmission timers with either conservative
//!     (doubling) or aggressive (linear) backoff
//!   * congestion control that can be disabled entirely for interactive
//!     workloads (games, real-time control) where the application knows its
//!     bandwidth envelope better than AIMD does
//! * The abstraction is sending / receiving *messages* (defined-length
//!   chunks of data), not a byte stream; an optional stream mode coalesces
//!   consecutive sends to save per-segment overhead
//! * Big messages are fragmented below the configured MTU and reassembled
//!   on the receive side; there is no IP-level fragmentation
//! * No connection handshake: both endpoints agree out-of-band on a 32-bit
//!   conversation id, and sequence state syncs implicitly from zero
//! * The engine performs no I/O and owns no sockets or clocks. The host
//!   feeds inbound datagrams via [`Session::input`], drives time via
//!   [`Session::update`], and receives outbound datagrams through a
//!   [`DatagramSink`] it installs. [`Session::check`] tells the host how
//!   long it may sleep. This keeps the engine deterministic and
//!   single-threaded; one session must only ever be driven from one task.
//!
//! ## Wire format
//!
//! A datagram is a concatenation of segments, each a fixed 24-byte header
//! followed by `len` payload bytes. All multi-byte fields are
//! little-endian:
//!
//! ```ascii
//!  0: conv (u32) - conversation id, must match on both endpoints
//!  4: cmd  (u8)  - 81 PUSH | 82 ACK | 83 window probe | 84 window advertise
//!  5: frg  (u8)  - fragment countdown; 0 marks the last fragment of a message
//!  6: wnd  (u16) - sender's free receive-queue slots (flow control)
//!  8: ts   (u32) - millisecond send timestamp, echoed back in ACKs
//! 12: sn   (u32) - sequence number (PUSH), or the sn being acknowledged (ACK)
//! 16: una  (u32) - lowest sn the sender still awaits an ACK for (cumulative)
//! 20: len  (u32) - payload byte count following this header
//! ```
//!
//! Sequence numbers and timestamps live in a wrapping 32-bit space; all
//! comparisons go through signed differences.
//!
//! ## Flow and congestion control
//!
//! The transmit window is the minimum of the configured send window, the
//! peer's advertised receive window, and (unless disabled) a congestion
//! window evolved with slow start and additive-increase /
//! multiplicative-decrease. A peer advertising a zero window is probed
//! explicitly with exponential backoff, since a closed window leaves no
//! data to piggyback window updates on.

pub mod wire;

mod config;
mod congestion;
mod error;
mod packer;
mod probe;
mod recv_window;
mod rtt;
mod segment;
mod send_window;
mod seq;
mod session;
mod sink;

pub use config::SessionConfig;
pub use error::{ConfigError, InputError, RecvError, SendError};
pub use session::Session;
pub use sink::{DatagramSink, FnSink};

#[cfg(test)]
mod tests {
    use tracing::Level;

    #[ctor::ctor]
    fn init_test_logging() {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(Level::DEBUG)
            .try_init()
            .ok();
    }
}
