//! Tap tempo: median-filtered BPM from recent tap intervals.

use arrayvec::ArrayVec;

const MAX_TAPS: usize = 8;
/// A gap longer than this restarts the tap ring.
const RESET_INTERVAL_US: u64 = 2_000_000;
const BPM_MIN: f32 = 20.0;
const BPM_MAX: f32 = 300.0;

/// Collects tap timestamps and publishes a median-filtered BPM.
pub struct TapTempo {
    taps: ArrayVec<u64, MAX_TAPS>,
    bpm: f32,
}

impl Default for TapTempo {
    fn default() -> Self {
        Self::new()
    }
}

impl TapTempo {
    pub fn new() -> Self {
        Self { taps: ArrayVec::new(), bpm: 120.0 }
    }

    /// Seed from the project tempo and forget previous taps.
    pub fn reset(&mut self, bpm: f32) {
        self.taps.clear();
        self.bpm = bpm;
    }

    /// Register a tap at `now_us`.
    pub fn tap(&mut self, now_us: u64) {
        if let Some(&last) = self.taps.last() {
            if now_us.saturating_sub(last) > RESET_INTERVAL_US {
                self.taps.clear();
            }
        }
        if self.taps.is_full() {
            self.taps.remove(0);
        }
        self.taps.push(now_us);

        if self.taps.len() >= 2 {
            let mut intervals: ArrayVec<u64, { MAX_TAPS - 1 }> = ArrayVec::new();
            for pair in self.taps.windows(2) {
                intervals.push(pair[1] - pair[0]);
            }
            intervals.sort_unstable();
            let median = intervals[intervals.len() / 2];
            if median > 0 {
                self.bpm = (60_000_000.0 / median as f32).clamp(BPM_MIN, BPM_MAX);
            }
        }
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_taps_give_their_rate() {
        let mut tempo = TapTempo::new();
        // 500 ms between taps = 120 BPM
        for i in 0..5 {
            tempo.tap(i * 500_000);
        }
        assert!((tempo.bpm() - 120.0).abs() < 0.5);
    }

    #[test]
    fn median_rejects_one_bad_tap() {
        let mut tempo = TapTempo::new();
        tempo.tap(0);
        tempo.tap(500_000);
        tempo.tap(1_000_000);
        // one late tap does not drag the published tempo with it
        tempo.tap(1_900_000);
        tempo.tap(2_400_000);
        assert!((tempo.bpm() - 120.0).abs() < 0.5);
    }

    #[test]
    fn long_gap_restarts_the_ring() {
        let mut tempo = TapTempo::new();
        tempo.tap(0);
        tempo.tap(250_000); // 240 BPM
        assert!((tempo.bpm() - 240.0).abs() < 1.0);

        tempo.tap(10_000_000);
        // a single tap after the gap leaves the tempo unchanged
        assert!((tempo.bpm() - 240.0).abs() < 1.0);
        tempo.tap(10_600_000); // 100 BPM
        assert!((tempo.bpm() - 100.0).abs() < 1.0);
    }

    #[test]
    fn bpm_is_clamped() {
        let mut tempo = TapTempo::new();
        tempo.tap(0);
        tempo.tap(50_000); // 1200 BPM
        assert_eq!(tempo.bpm(), BPM_MAX);
    }

    #[test]
    fn reset_seeds_bpm() {
        let mut tempo = TapTempo::new();
        tempo.reset(93.5);
        assert_eq!(tempo.bpm(), 93.5);
    }
}
