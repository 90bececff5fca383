//! Arithmetic over the wrapping 32-bit sequence space.
//!
//! Sequence numbers and millisecond timestamps both wrap; any comparison
//! between two of them must go through the signed difference. A naive `<`
//! on the raw values gives the wrong answer near the wrap-around point.

/// Signed distance from `earlier` to `later`, positive iff `later` is ahead.
#[inline]
pub(crate) fn seq_diff(later: u32, earlier: u32) -> i32 {
    later.wrapping_sub(earlier) as i32
}

/// `true` iff `a` is strictly before `b` in wrapping order.
#[inline]
pub(crate) fn seq_before(a: u32, b: u32) -> bool {
    seq_diff(a, b) < 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::equal(5, 5, 0)]
    #[case::ahead(7, 5, 2)]
    #[case::behind(5, 7, -2)]
    #[case::wrap_ahead(2, u32::MAX - 1, 4)]
    #[case::wrap_behind(u32::MAX - 1, 2, -4)]
    #[case::zero_vs_max(0, u32::MAX, 1)]
    fn test_seq_diff(#[case] later: u32, #[case] earlier: u32, #[case] expected: i32) {
        assert_eq!(seq_diff(later, earlier), expected);
    }

    #[rstest]
    #[case::equal(5, 5, false)]
    #[case::before(5, 6, true)]
    #[case::after(6, 5, false)]
    #[case::wrap(u32::MAX, 3, true)]
    #[case::wrap_reverse(3, u32::MAX, false)]
    fn test_seq_before(#[case] a: u32, #[case] b: u32, #[case] expected: bool) {
        assert_eq!(seq_before(a, b), expected);
    }
}
