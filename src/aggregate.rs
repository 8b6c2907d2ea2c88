//! Time-windowed aggregation of frame tallies.
//!
//! Exactly one window is open at any time. Every processed frame is folded into it,
//! then `maybe_flush` decides whether the window closes. Closing snapshots the counts
//! into a `WindowSummary`, zeroes the counters and moves the flush anchor to the
//! closing frame's time. There is no timer: a window can only close on a frame.

use chrono::NaiveDateTime;
use std::time::Duration;

use crate::taxonomy::{FrameTally, Taxonomy};

/// Default interval between flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Timestamp layout used for persisted and printed summaries.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Immutable snapshot of a closed window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowSummary {
    /// Wall-clock time of the flush.
    pub timestamp: NaiveDateTime,
    /// Session time of the flush, measured from session start.
    pub elapsed: Duration,
    pub counts: FrameTally,
}

impl WindowSummary {
    pub fn total(&self) -> u64 {
        self.counts.total()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Owner of the single live aggregation window.
#[derive(Debug)]
pub struct WindowAggregator {
    interval: Duration,
    last_flush: Duration,
    running: FrameTally,
    frames_in_window: u64,
}

impl WindowAggregator {
    pub fn new(taxonomy: &Taxonomy, interval: Duration) -> Self {
        Self {
            interval,
            last_flush: Duration::ZERO,
            running: taxonomy.empty_tally(),
            frames_in_window: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Session time of the last flush (zero before the first).
    pub fn last_flush(&self) -> Duration {
        self.last_flush
    }

    pub fn running(&self) -> &FrameTally {
        &self.running
    }

    /// Processed frames folded into the current window.
    pub fn frames_in_window(&self) -> u64 {
        self.frames_in_window
    }

    pub fn ingest(&mut self, tally: &FrameTally) {
        self.running.absorb(tally);
        self.frames_in_window += 1;
    }

    /// True once `now` is at least one interval past the last flush (inclusive).
    pub fn is_due(&self, now: Duration) -> bool {
        now.saturating_sub(self.last_flush) >= self.interval
    }

    /// Close the window if it is due.
    ///
    /// `now` is the session time of the frame just processed and `timestamp` its
    /// wall-clock stamp.
    pub fn maybe_flush(&mut self, now: Duration, timestamp: NaiveDateTime) -> Option<WindowSummary> {
        if !self.is_due(now) {
            return None;
        }
        let summary = WindowSummary {
            timestamp,
            elapsed: now,
            counts: self.running.clone(),
        };
        self.running.reset();
        self.frames_in_window = 0;
        self.last_flush = now;
        Some(summary)
    }

    /// Fold the counts of a summary that could not be persisted back into the live
    /// window, so the next successful flush still carries them.
    pub fn restore(&mut self, summary: &WindowSummary) {
        self.running.absorb(&summary.counts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(14, 30, 5)
            .unwrap()
    }

    fn car_tally(taxonomy: &Taxonomy, cars: usize) -> FrameTally {
        let mut tally = taxonomy.empty_tally();
        let car = taxonomy.index_of("car").unwrap();
        for _ in 0..cars {
            tally.record(car);
        }
        tally
    }

    #[test]
    fn summary_equals_sum_of_ingested_tallies() {
        let taxonomy = Taxonomy::default();
        let mut agg = WindowAggregator::new(&taxonomy, Duration::from_secs(5));

        let mut frame = car_tally(&taxonomy, 2);
        frame.record(taxonomy.index_of("van").unwrap());
        agg.ingest(&frame);
        agg.ingest(&car_tally(&taxonomy, 1));
        agg.ingest(&taxonomy.empty_tally());
        assert_eq!(agg.frames_in_window(), 3);

        let summary = agg
            .maybe_flush(Duration::from_secs(5), stamp())
            .expect("window due");
        assert_eq!(summary.total(), 4);
        assert_eq!(summary.counts.count_of(&taxonomy, "car"), 3);
        assert_eq!(summary.counts.count_of(&taxonomy, "van"), 1);

        assert!(agg.running().is_zero());
        assert!(agg.running().counts().iter().all(|c| *c == 0));
        assert_eq!(agg.frames_in_window(), 0);
    }

    #[test]
    fn flush_is_inclusive_and_reanchors_on_flush() {
        let taxonomy = Taxonomy::default();
        let mut agg = WindowAggregator::new(&taxonomy, Duration::from_secs(5));

        assert!(agg
            .maybe_flush(Duration::from_millis(4_999), stamp())
            .is_none());

        let first = agg
            .maybe_flush(Duration::from_millis(5_200), stamp())
            .expect("first flush at 5.2s");
        assert_eq!(first.elapsed, Duration::from_millis(5_200));
        assert_eq!(agg.last_flush(), Duration::from_millis(5_200));

        assert!(agg
            .maybe_flush(Duration::from_millis(10_000), stamp())
            .is_none());
        assert!(agg
            .maybe_flush(Duration::from_millis(10_199), stamp())
            .is_none());
        let second = agg
            .maybe_flush(Duration::from_millis(10_200), stamp())
            .expect("second flush at 10.2s");
        assert!(second.elapsed > first.elapsed);
    }

    #[test]
    fn exact_boundary_flushes_immediately() {
        let taxonomy = Taxonomy::default();
        let mut agg = WindowAggregator::new(&taxonomy, Duration::from_secs(1));
        assert!(agg.maybe_flush(Duration::from_secs(1), stamp()).is_some());
        assert!(agg.maybe_flush(Duration::from_secs(2), stamp()).is_some());
    }

    #[test]
    fn clock_going_backwards_never_flushes() {
        let taxonomy = Taxonomy::default();
        let mut agg = WindowAggregator::new(&taxonomy, Duration::from_secs(1));
        agg.maybe_flush(Duration::from_secs(3), stamp()).unwrap();
        assert!(agg.maybe_flush(Duration::from_secs(2), stamp()).is_none());
    }

    #[test]
    fn restored_counts_roll_into_next_window() {
        let taxonomy = Taxonomy::default();
        let mut agg = WindowAggregator::new(&taxonomy, Duration::from_secs(1));
        agg.ingest(&car_tally(&taxonomy, 3));
        let lost = agg.maybe_flush(Duration::from_secs(1), stamp()).unwrap();
        agg.restore(&lost);

        agg.ingest(&car_tally(&taxonomy, 2));
        let next = agg.maybe_flush(Duration::from_secs(2), stamp()).unwrap();
        assert_eq!(next.counts.count_of(&taxonomy, "car"), 5);
        assert_eq!(next.total(), 5);
    }

    #[test]
    fn summary_formats_timestamp() {
        let taxonomy = Taxonomy::default();
        let mut agg = WindowAggregator::new(&taxonomy, DEFAULT_FLUSH_INTERVAL);
        let summary = agg.maybe_flush(Duration::from_secs(6), stamp()).unwrap();
        assert_eq!(summary.timestamp_string(), "2024-01-15 14:30:05");
        assert_eq!(summary.elapsed_secs(), 6.0);
    }
}
