use thiserror::Error;

/// Errors surfaced by [`Session::send`](crate::Session::send).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The message would fragment into more segments than the receive
    /// window could ever hold at once, so the peer could never reassemble
    /// it.
    #[error("message of {0} bytes exceeds the fragment limit")]
    FragmentLimit(usize),
}

/// Errors surfaced by [`Session::recv`](crate::Session::recv).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecvError {
    /// The receive queue holds no segments.
    #[error("no message queued")]
    Empty,
    /// The next message is fragmented and not all fragments have arrived
    /// in the receive queue yet.
    #[error("next message is incomplete")]
    Incomplete,
    /// The caller's buffer cannot hold the next message.
    #[error("buffer of {capacity} bytes cannot hold the next message of {needed} bytes")]
    BufferTooSmall { needed: usize, capacity: usize },
}

/// Errors surfaced by [`Session::input`](crate::Session::input).
///
/// Any of these aborts parsing of the offending datagram; segments already
/// consumed from it stay applied. Protocol-level deviations that are
/// expected under packet loss (duplicates, stale ACKs, out-of-window data)
/// are not errors - they are dropped silently so the session keeps making
/// progress.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    /// The datagram is too short for a segment header, or belongs to a
    /// different conversation.
    #[error("malformed datagram")]
    Malformed,
    /// A segment header declares more payload than the datagram holds.
    #[error("truncated segment payload")]
    Truncated,
    /// The command byte is not one the protocol defines.
    #[error("unknown command byte {0}")]
    UnknownCommand(u8),
}

/// Errors surfaced by the configuration setters on a live session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The MTU cannot hold a segment header plus a useful amount of payload.
    #[error("mtu of {0} bytes is below the 50 byte minimum")]
    MtuTooSmall(usize),
}
