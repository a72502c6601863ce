use hdrhistogram::Histogram;
use serde::Serialize;

// HdrHistogram range: 1 μs → 60 s, 3 significant figures.
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 60_000_000;
const HIST_SIGFIG: u8 = 3;

/// Collects per-write latencies for one seeding run.
///
/// Single-writer by construction — the seeder issues writes sequentially —
/// so no locking is involved.
pub struct LatencyRecorder {
    hist: Histogram<u64>,
    total_us: u64,
}

impl LatencyRecorder {
    pub fn new() -> Self {
        Self {
            hist: Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
                .expect("histogram creation"),
            total_us: 0,
        }
    }

    /// Records one observation, clamped to ≥ 1 μs so it lands in range.
    pub fn record(&mut self, us: u64) {
        let _ = self.hist.record(us.max(1));
        self.total_us += us;
    }

    /// Sum of all raw (unclamped) observations.
    pub fn total_us(&self) -> u64 {
        self.total_us
    }

    pub fn summary(&self) -> LatencySummary {
        LatencySummary::from_histogram(&self.hist)
    }
}

impl Default for LatencyRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency breakdown for the seed report, in microseconds throughout.
#[derive(Debug, Clone, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    pub min_us: u64,
    pub max_us: u64,
    pub mean_us: f64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
}

impl LatencySummary {
    fn from_histogram(hist: &Histogram<u64>) -> Self {
        if hist.is_empty() {
            return Self {
                count: 0,
                min_us: 0,
                max_us: 0,
                mean_us: 0.0,
                p50_us: 0,
                p95_us: 0,
                p99_us: 0,
            };
        }

        Self {
            count: hist.len(),
            min_us: hist.min(),
            max_us: hist.max(),
            mean_us: hist.mean(),
            p50_us: hist.value_at_percentile(50.0),
            p95_us: hist.value_at_percentile(95.0),
            p99_us: hist.value_at_percentile(99.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_recorder_reports_zeros() {
        let summary = LatencyRecorder::new().summary();
        assert_eq!(summary.count, 0);
        assert_eq!(summary.min_us, 0);
        assert_eq!(summary.max_us, 0);
        assert_eq!(summary.mean_us, 0.0);
    }

    #[test]
    fn summary_tracks_recorded_values() {
        let mut rec = LatencyRecorder::new();
        for us in [100, 200, 300, 400] {
            rec.record(us);
        }

        let summary = rec.summary();
        assert_eq!(summary.count, 4);
        assert_eq!(summary.min_us, 100);
        // 3 significant figures — exact at this magnitude.
        assert_eq!(summary.max_us, 400);
        assert_eq!(rec.total_us(), 1000);
        assert!(summary.mean_us > 100.0 && summary.mean_us < 400.0);
    }

    #[test]
    fn zero_observation_is_clamped_not_lost() {
        let mut rec = LatencyRecorder::new();
        rec.record(0);
        assert_eq!(rec.summary().count, 1);
        assert_eq!(rec.summary().min_us, 1);
        assert_eq!(rec.total_us(), 0);
    }
}
