//! Progress accounting for the alignment pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Monotonic counter of aligned bases against a pre-computed total.
/// Workers increment it per completed record; thresholds are logged as
/// they are crossed.
pub struct ProgressMeter {
    total: u64,
    done: AtomicU64,
    start: Instant,
}

impl ProgressMeter {
    /// A meter expecting `total` bases of work.
    pub fn new(total: u64) -> Self {
        Self {
            total,
            done: AtomicU64::new(0),
            start: Instant::now(),
        }
    }

    /// Record `n` aligned bases; logs every crossed decile.
    pub fn increment(&self, n: u64) {
        let before = self.done.fetch_add(n, Ordering::Relaxed);
        if self.total == 0 {
            return;
        }
        let after = before + n;
        let decile_before = before * 10 / self.total;
        let decile_after = (after * 10 / self.total).min(10);
        if decile_after > decile_before {
            info!(
                "aligned {} of {} bp ({}%)",
                after.min(self.total),
                self.total,
                decile_after * 10
            );
        }
    }

    /// Bases recorded so far.
    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    /// Log the final tally and throughput.
    pub fn finish(&self) {
        let done = self.done();
        let secs = self.start.elapsed().as_secs_f64();
        let rate = if secs > 0.0 { done as f64 / secs } else { 0.0 };
        info!("aligned {} bp in {:.2} s ({:.0} bp/s)", done, secs, rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_accumulate() {
        let meter = ProgressMeter::new(1000);
        meter.increment(100);
        meter.increment(250);
        assert_eq!(meter.done(), 350);
    }

    #[test]
    fn test_zero_total_does_not_divide() {
        let meter = ProgressMeter::new(0);
        meter.increment(10);
        assert_eq!(meter.done(), 10);
        meter.finish();
    }
}
