//! Session time sources.
//!
//! The aggregator works on durations since session start. A clock maps a frame to
//! that duration and to the wall-clock stamp written with each summary.

use chrono::{Local, NaiveDateTime};
use serde::Deserialize;
use std::time::{Duration, Instant};

/// Which time base drives window flushes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockKind {
    /// Real elapsed time since the session started.
    #[default]
    Wall,
    /// Time derived from the frame index and the source's nominal rate.
    Stream,
}

impl ClockKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "wall" => Some(Self::Wall),
            "stream" => Some(Self::Stream),
            _ => None,
        }
    }

    /// Build the clock for a session that started at `started`.
    ///
    /// A stream clock needs a known source rate; without one the wall clock is used.
    pub fn build(self, source_fps: Option<f64>, started: Instant) -> Box<dyn SessionClock> {
        match (self, source_fps.filter(|fps| fps.is_finite() && *fps > 0.0)) {
            (Self::Stream, Some(fps)) => Box::new(StreamClock::new(fps)),
            (Self::Stream, None) => {
                log::warn!("stream clock requested but source rate is unknown; using wall clock");
                Box::new(WallClock::new(started))
            }
            (Self::Wall, _) => Box::new(WallClock::new(started)),
        }
    }
}

pub trait SessionClock {
    /// Session time at which frame `frame_index` (1-based) finished reading.
    fn elapsed(&self, frame_index: u64) -> Duration;

    /// Wall-clock stamp for a moment `elapsed` into the session.
    fn timestamp(&self, elapsed: Duration) -> NaiveDateTime;
}

/// Monotonic real time since session start.
pub struct WallClock {
    started: Instant,
}

impl WallClock {
    pub fn new(started: Instant) -> Self {
        Self { started }
    }
}

impl SessionClock for WallClock {
    fn elapsed(&self, _frame_index: u64) -> Duration {
        self.started.elapsed()
    }

    fn timestamp(&self, _elapsed: Duration) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Frame-index time: frame `i` sits at `i / fps` seconds.
pub struct StreamClock {
    fps: f64,
    started_at: NaiveDateTime,
}

impl StreamClock {
    pub fn new(fps: f64) -> Self {
        Self::starting_at(fps, Local::now().naive_local())
    }

    pub fn starting_at(fps: f64, started_at: NaiveDateTime) -> Self {
        Self { fps, started_at }
    }
}

impl SessionClock for StreamClock {
    fn elapsed(&self, frame_index: u64) -> Duration {
        Duration::from_secs_f64(frame_index as f64 / self.fps)
    }

    fn timestamp(&self, elapsed: Duration) -> NaiveDateTime {
        match chrono::Duration::from_std(elapsed) {
            Ok(offset) => self.started_at + offset,
            Err(_) => self.started_at,
        }
    }
}
