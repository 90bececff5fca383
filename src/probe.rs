//! Zero-window probing.
//!
//! A peer advertising a zero receive window leaves the sender with nothing
//! to transmit, and therefore nothing for the peer to piggyback a window
//! update on. The sender breaks the deadlock by asking explicitly: after an
//! initial 7 s wait a `WindowAsk` is scheduled, and the wait grows by half
//! per round, capped at 120 s, until the window reopens.

use tracing::trace;

use crate::seq::seq_diff;

pub(crate) const PROBE_WAIT_INIT: u32 = 7_000;
pub(crate) const PROBE_WAIT_LIMIT: u32 = 120_000;

#[derive(Debug, Default)]
pub(crate) struct WindowProbe {
    ts_probe: u32,
    probe_wait: u32,
    ask_send: bool,
    ask_tell: bool,
}

impl WindowProbe {
    pub fn new() -> WindowProbe {
        WindowProbe::default()
    }

    /// The peer asked for our window: answer with `WindowTell` next flush.
    pub fn request_tell(&mut self) {
        self.ask_tell = true;
    }

    /// Advance the probe schedule against the currently known remote
    /// window. Called once per flush.
    pub fn update(&mut self, current: u32, rmt_wnd: u16) {
        if rmt_wnd != 0 {
            self.ts_probe = 0;
            self.probe_wait = 0;
            return;
        }
        if self.probe_wait == 0 {
            self.probe_wait = PROBE_WAIT_INIT;
            self.ts_probe = current.wrapping_add(self.probe_wait);
        } else if seq_diff(current, self.ts_probe) >= 0 {
            if self.probe_wait < PROBE_WAIT_INIT {
                self.probe_wait = PROBE_WAIT_INIT;
            }
            self.probe_wait += self.probe_wait / 2;
            if self.probe_wait > PROBE_WAIT_LIMIT {
                self.probe_wait = PROBE_WAIT_LIMIT;
            }
            self.ts_probe = current.wrapping_add(self.probe_wait);
            self.ask_send = true;
            trace!("zero window persists; probing again in {} ms", self.probe_wait);
        }
    }

    /// Consume the pending probe requests for this flush pass:
    /// `(ask_peer_window, tell_own_window)`.
    pub fn take_requests(&mut self) -> (bool, bool) {
        let requests = (self.ask_send, self.ask_tell);
        self.ask_send = false;
        self.ask_tell = false;
        requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_window_needs_no_probe() {
        let mut probe = WindowProbe::new();

        probe.update(0, 128);
        assert_eq!(probe.take_requests(), (false, false));
    }

    #[test]
    fn test_first_zero_window_only_schedules() {
        let mut probe = WindowProbe::new();

        probe.update(1_000, 0);
        assert_eq!(probe.take_requests(), (false, false));

        // still inside the initial wait
        probe.update(1_000 + PROBE_WAIT_INIT - 1, 0);
        assert_eq!(probe.take_requests(), (false, false));
    }

    #[test]
    fn test_probe_fires_and_backs_off() {
        let mut probe = WindowProbe::new();

        probe.update(0, 0);
        probe.update(PROBE_WAIT_INIT, 0);
        assert_eq!(probe.take_requests(), (true, false));

        // the wait grew by half; the next probe fires 10.5 s later
        probe.update(PROBE_WAIT_INIT + 10_499, 0);
        assert_eq!(probe.take_requests(), (false, false));
        probe.update(PROBE_WAIT_INIT + 10_500, 0);
        assert_eq!(probe.take_requests(), (true, false));
    }

    #[test]
    fn test_backoff_caps_at_limit() {
        let mut probe = WindowProbe::new();

        probe.update(0, 0);
        let mut now = 0u32;
        for _ in 0..16 {
            now = now.wrapping_add(PROBE_WAIT_LIMIT);
            probe.update(now, 0);
        }
        let _ = probe.take_requests();

        // a reopened window resets the schedule completely
        probe.update(now, 64);
        probe.update(now + 1, 0);
        assert_eq!(probe.take_requests(), (false, false));
    }

    #[test]
    fn test_tell_request_is_consumed_once() {
        let mut probe = WindowProbe::new();

        probe.request_tell();
        assert_eq!(probe.take_requests(), (false, true));
        assert_eq!(probe.take_requests(), (false, false));
    }
}
