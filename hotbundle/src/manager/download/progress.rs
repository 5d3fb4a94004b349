//! Progress mapping for the download pipeline.
//!
//! Each pipeline stage reports bytes processed against a total. This module
//! turns those byte counts into percentages on the overall 0-100 scale and
//! suppresses repeats so callbacks only fire when the visible value changes.

use std::cell::Cell;

/// Sub-range of the overall scale owned by the fetch stage.
pub const FETCH_RANGE: (u8, u8) = (10, 70);

/// Sub-range of the overall scale owned by the extract stage.
pub const EXTRACT_RANGE: (u8, u8) = (75, 90);

/// Map a stage-local percentage into `[min, max]`.
///
/// Input above 100 is clamped.
///
/// # Example
///
/// ```
/// use hotbundle::manager::download::scale_percent;
///
/// assert_eq!(scale_percent(0, 10, 70), 10);
/// assert_eq!(scale_percent(50, 10, 70), 40);
/// assert_eq!(scale_percent(100, 75, 90), 90);
/// ```
pub fn scale_percent(percent: u8, min: u8, max: u8) -> u8 {
    let percent = u32::from(percent.min(100));
    let (min, max) = (u32::from(min), u32::from(max.max(min)));
    ((percent * (max - min)) / 100 + min) as u8
}

/// Per-stage progress tracker.
///
/// Converts `(done, total)` byte counts into overall percentages and only
/// forwards a value when the stage-local percentage changed. Totals of 0 or 1
/// are treated as unknown and produce no updates.
pub struct StageProgress<'a> {
    range: (u8, u8),
    last_percent: Cell<u8>,
    sink: &'a dyn Fn(u8),
}

impl<'a> StageProgress<'a> {
    /// Create a tracker that reports into `range` through `sink`.
    pub fn new(range: (u8, u8), sink: &'a dyn Fn(u8)) -> Self {
        Self {
            range,
            last_percent: Cell::new(0),
            sink,
        }
    }

    /// Record that `done` of `total` bytes have been processed.
    pub fn update(&self, done: u64, total: u64) {
        if total <= 1 {
            return;
        }

        let percent = ((done.min(total) * 100) / total) as u8;
        if percent != self.last_percent.get() {
            self.last_percent.set(percent);
            (self.sink)(scale_percent(percent, self.range.0, self.range.1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::RefCell;

    #[test]
    fn test_scale_percent_bounds() {
        assert_eq!(scale_percent(0, FETCH_RANGE.0, FETCH_RANGE.1), 10);
        assert_eq!(scale_percent(100, FETCH_RANGE.0, FETCH_RANGE.1), 70);
        assert_eq!(scale_percent(0, EXTRACT_RANGE.0, EXTRACT_RANGE.1), 75);
        assert_eq!(scale_percent(100, EXTRACT_RANGE.0, EXTRACT_RANGE.1), 90);
    }

    #[test]
    fn test_scale_percent_clamps_input() {
        assert_eq!(scale_percent(250, 10, 70), 70);
    }

    #[test]
    fn test_stage_progress_suppresses_repeats() {
        let seen = RefCell::new(Vec::new());
        let sink = |p: u8| seen.borrow_mut().push(p);
        let progress = StageProgress::new(FETCH_RANGE, &sink);

        progress.update(1, 1000); // 0% - same as initial, suppressed
        progress.update(500, 1000);
        progress.update(501, 1000); // still 50%
        progress.update(1000, 1000);

        assert_eq!(*seen.borrow(), vec![40, 70]);
    }

    #[test]
    fn test_stage_progress_ignores_unknown_total() {
        let seen = RefCell::new(Vec::new());
        let sink = |p: u8| seen.borrow_mut().push(p);
        let progress = StageProgress::new(EXTRACT_RANGE, &sink);

        progress.update(10, 0);
        progress.update(10, 1);

        assert!(seen.borrow().is_empty());
    }

    proptest! {
        #[test]
        fn prop_scaled_value_stays_in_range(percent in 0u8..=255, min in 0u8..=100, span in 0u8..=100) {
            let max = min.saturating_add(span).min(100);
            let scaled = scale_percent(percent, min, max);
            prop_assert!(scaled >= min && scaled <= max);
        }

        #[test]
        fn prop_scaled_value_is_monotonic(a in 0u8..=100, b in 0u8..=100) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(scale_percent(lo, 10, 70) <= scale_percent(hi, 10, 70));
        }
    }
}
