use anyhow::bail;

use crate::wire::MIN_MTU;

/// Lower bound on the receive window: a maximally fragmented message must
/// always fit, or it could never be reassembled.
pub(crate) const RECEIVE_WINDOW_MIN: u16 = 128;

pub(crate) const INTERVAL_MIN: u32 = 10;
pub(crate) const INTERVAL_MAX: u32 = 5_000;

/// Tuning knobs for a [`Session`](crate::Session).
///
/// [`Default`] is the conservative, TCP-like profile. Interactive
/// applications that care about tail latency more than about bandwidth
/// start from [`low_latency`](SessionConfig::low_latency) instead. All
/// knobs except the MTU can also be adjusted on a live session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Largest datagram handed to the sink, headers included.
    pub mtu: usize,
    /// Send window in segments.
    pub send_window: u16,
    /// Receive window in segments; values below 128 are raised to 128.
    pub receive_window: u16,
    /// Internal flush cadence in milliseconds, clamped to 10..=5000.
    pub interval: u32,
    /// Non-zero enables the aggressive timer profile: a 30 ms minimum RTO
    /// instead of 100 ms, and linear instead of doubling RTO backoff.
    pub nodelay: u32,
    /// Duplicate-ack count that triggers fast retransmit; 0 disables it.
    pub fast_resend: u32,
    /// Disable the congestion window, leaving only peer flow control.
    pub no_congestion_window: bool,
    /// Stream mode: message boundaries are not preserved and consecutive
    /// sends coalesce up to one MSS.
    pub stream: bool,
    /// Transmission count for a single segment after which the session is
    /// declared dead.
    pub dead_link: u32,
}

impl Default for SessionConfig {
    fn default() -> SessionConfig {
        SessionConfig {
            mtu: 1400,
            send_window: 32,
            receive_window: RECEIVE_WINDOW_MIN,
            interval: 100,
            nodelay: 0,
            fast_resend: 0,
            no_congestion_window: false,
            stream: false,
            dead_link: 20,
        }
    }
}

impl SessionConfig {
    /// The aggressive profile: short flush cadence, low minimum RTO,
    /// linear backoff, fast retransmit after two duplicate ACKs, and no
    /// congestion window.
    pub fn low_latency() -> SessionConfig {
        SessionConfig {
            interval: 10,
            nodelay: 1,
            fast_resend: 2,
            no_congestion_window: true,
            ..SessionConfig::default()
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mtu < MIN_MTU {
            bail!("mtu of {} bytes is below the minimum of {}", self.mtu, MIN_MTU);
        }
        if self.send_window == 0 {
            bail!("send window must hold at least one segment");
        }
        if self.dead_link == 0 {
            bail!("dead link threshold must allow at least one transmission");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SessionConfig::default().validate().is_ok());
        assert!(SessionConfig::low_latency().validate().is_ok());
    }

    #[rstest]
    #[case::tiny_mtu(SessionConfig { mtu: 49, ..SessionConfig::default() })]
    #[case::zero_send_window(SessionConfig { send_window: 0, ..SessionConfig::default() })]
    #[case::zero_dead_link(SessionConfig { dead_link: 0, ..SessionConfig::default() })]
    fn test_rejects_unusable_config(#[case] config: SessionConfig) {
        assert!(config.validate().is_err());
    }
}
