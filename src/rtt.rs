//! Round-trip estimation (Jacobson/Karels) driving the retransmission
//! timeout.
//!
//! Samples come from ACKs echoing the timestamp a segment was sent with.
//! The RTO is the smoothed RTT plus four times its smoothed variance,
//! lower-bounded by the flush interval (a sample cannot be observed faster
//! than the engine flushes) and clamped into `[min_rto, 60 s]`.

pub(crate) const RTO_DEFAULT: u32 = 200;
pub(crate) const RTO_MAX: u32 = 60_000;
/// Lower RTO clamp in the conservative profile.
pub(crate) const RTO_MIN_NORMAL: u32 = 100;
/// Lower RTO clamp with `nodelay` enabled.
pub(crate) const RTO_MIN_NODELAY: u32 = 30;

#[derive(Debug)]
pub(crate) struct RttEstimator {
    srtt: u32,
    rttval: u32,
    rto: u32,
    min_rto: u32,
}

impl RttEstimator {
    pub fn new() -> RttEstimator {
        RttEstimator {
            srtt: 0,
            rttval: 0,
            rto: RTO_DEFAULT,
            min_rto: RTO_MIN_NORMAL,
        }
    }

    pub fn rto(&self) -> u32 {
        self.rto
    }

    pub fn set_min_rto(&mut self, min_rto: u32) {
        self.min_rto = min_rto;
    }

    #[cfg(test)]
    pub fn min_rto(&self) -> u32 {
        self.min_rto
    }

    /// Feed one validated RTT sample in milliseconds. `interval` is the
    /// flush cadence.
    pub fn on_sample(&mut self, rtt: u32, interval: u32) {
        if self.srtt == 0 {
            self.srtt = rtt;
            self.rttval = rtt / 2;
        } else {
            let delta = self.srtt.abs_diff(rtt) as u64;
            self.rttval = ((3 * self.rttval as u64 + delta) / 4) as u32;
            self.srtt = ((7 * self.srtt as u64 + rtt as u64) / 8).max(1) as u32;
        }
        let rto = self.srtt as u64 + (interval as u64).max(4 * self.rttval as u64);
        self.rto = rto.max(self.min_rto as u64).min(RTO_MAX as u64) as u32;
    }

    #[cfg(test)]
    pub fn set_internals(&mut self, srtt: u32, rttval: u32) {
        self.srtt = srtt;
        self.rttval = rttval;
    }

    #[cfg(test)]
    pub fn internals(&self) -> (u32, u32) {
        (self.srtt, self.rttval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let est = RttEstimator::new();
        assert_eq!(est.rto(), RTO_DEFAULT);
        assert_eq!(est.min_rto(), RTO_MIN_NORMAL);
    }

    #[rstest]
    #[case::first_sample(0, 0, 100, 100, 100, 50, 300)]
    #[case::first_sample_fast(0, 0, 100, 10, 10, 5, 100)]
    #[case::ewma(100, 50, 100, 200, 112, 62, 360)]
    #[case::ewma_shrinking(100, 50, 100, 20, 90, 57, 318)]
    #[case::variance_floor(100, 0, 50, 100, 100, 0, 150)]
    #[case::srtt_floor(1, 0, 100, 0, 1, 0, 101)]
    #[case::clamp_max(0, 0, 100, 100_000, 100_000, 50_000, 60_000)]
    fn test_on_sample(
        #[case] srtt: u32,
        #[case] rttval: u32,
        #[case] interval: u32,
        #[case] sample: u32,
        #[case] expected_srtt: u32,
        #[case] expected_rttval: u32,
        #[case] expected_rto: u32,
    ) {
        let mut est = RttEstimator::new();
        est.set_internals(srtt, rttval);

        est.on_sample(sample, interval);

        assert_eq!(est.internals(), (expected_srtt, expected_rttval));
        assert_eq!(est.rto(), expected_rto);
    }

    #[rstest]
    #[case::normal_floor(RTO_MIN_NORMAL, 1, 100)]
    #[case::nodelay_floor(RTO_MIN_NODELAY, 1, 30)]
    #[case::custom_floor(10, 1, 11)]
    fn test_min_rto_clamp(#[case] min_rto: u32, #[case] sample: u32, #[case] expected_rto: u32) {
        let mut est = RttEstimator::new();
        est.set_min_rto(min_rto);

        est.on_sample(sample, 10);

        assert_eq!(est.rto(), expected_rto);
    }
}
