//! Outbound datagram abstraction.

#[cfg(test)]
use mockall::automock;

/// Where flushed datagrams go - typically a UDP socket bound to a peer
/// address, or a test harness.
///
/// The engine calls this synchronously from within `flush`/`update`, only
/// ever with a non-empty buffer. Implementations must not drive the same
/// session from inside the callback; the engine is single-threaded and
/// mid-mutation while it emits.
#[cfg_attr(test, automock)]
pub trait DatagramSink {
    /// Hand one ready datagram to the substrate. Delivery failures are the
    /// sink's business: the engine relies on retransmission, not on send
    /// results.
    fn send_datagram(&mut self, datagram: &[u8]);
}

/// Adapter implementing [`DatagramSink`] for a plain closure.
pub struct FnSink<F>(pub F);

impl<F: FnMut(&[u8])> DatagramSink for FnSink<F> {
    fn send_datagram(&mut self, datagram: &[u8]) {
        (self.0)(datagram)
    }
}
