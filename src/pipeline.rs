//! Pipeline driver: source → sampler → detector → classifier → aggregator → sink.
//!
//! One thread, one frame at a time. Cancellation is checked between frames and never
//! interrupts an in-flight detection. Whatever ends the session, the source is
//! released exactly once and a `SessionReport` is handed to the observer.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::aggregate::{WindowAggregator, WindowSummary};
use crate::classify::Classifier;
use crate::clock::ClockKind;
use crate::config::CounterConfig;
use crate::detect::Detector;
use crate::error::CounterError;
use crate::ingest::VideoSource;
use crate::observer::PipelineObserver;
use crate::sampler::FrameSampler;
use crate::sink::SummarySink;

/// Shared cancellation flag, checked once per frame.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Route SIGINT/SIGTERM to this token. Only one handler may be installed per process.
    pub fn install_ctrlc_handler(&self) -> Result<()> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            if token.is_cancelled() {
                log::warn!("second interrupt received; still finishing the current frame");
            }
            token.cancel();
        })?;
        Ok(())
    }
}

/// Why a session stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    EndOfStream,
    Cancelled,
    /// The source failed mid-stream; frames read so far were still counted.
    SourceError(String),
    /// The source never opened; no frame was read.
    SourceUnavailable,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionReport {
    pub frames_read: u64,
    pub frames_processed: u64,
    /// Summaries persisted successfully.
    pub flushes: u64,
    pub detection_failures: u64,
    pub sink_failures: u64,
    /// Wall time from session start to release of the source.
    pub elapsed: Duration,
    pub destination: String,
    pub end: SessionEnd,
}

#[derive(Default)]
struct SessionStats {
    frames_read: u64,
    frames_processed: u64,
    flushes: u64,
    detection_failures: u64,
    sink_failures: u64,
}

pub struct Pipeline<S, D, K> {
    source: S,
    detector: D,
    sink: K,
    classifier: Classifier,
    target_fps: Option<f64>,
    flush_interval: Duration,
    clock: ClockKind,
}

impl<S, D, K> Pipeline<S, D, K>
where
    S: VideoSource,
    D: Detector,
    K: SummarySink,
{
    /// Build a pipeline from an explicit configuration. Nothing is opened yet.
    pub fn new(config: &CounterConfig, source: S, detector: D, sink: K) -> Self {
        Self {
            source,
            detector,
            sink,
            classifier: Classifier::new(config.taxonomy.clone(), config.confidence_threshold),
            target_fps: config.target_fps,
            flush_interval: config.flush_interval,
            clock: config.clock,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Run one session to completion.
    ///
    /// Returns `Err` only when the source cannot be opened (`CounterError::SourceUnavailable`).
    /// Detection and sink failures are logged, counted in the report, and the run goes on.
    pub fn run(
        &mut self,
        cancel: &CancelToken,
        observer: &mut dyn PipelineObserver,
    ) -> Result<SessionReport> {
        let started = Instant::now();
        let mut stats = SessionStats::default();

        if let Err(err) = self.source.connect() {
            self.source.release();
            let report = self.report(stats, started, SessionEnd::SourceUnavailable);
            observer.on_session_end(&report);
            return Err(CounterError::SourceUnavailable {
                identifier: self.source.identifier().to_string(),
                reason: format!("{err:#}"),
            }
            .into());
        }

        let info = self.source.info();
        let sampler = FrameSampler::new(info.fps, self.target_fps);
        let clock = self.clock.build(info.fps, started);
        let mut aggregator = WindowAggregator::new(self.classifier.taxonomy(), self.flush_interval);
        log::info!(
            "pipeline: source {} ({}x{}), stride {}, detector {}",
            self.source.identifier(),
            info.width,
            info.height,
            sampler.stride(),
            self.detector.name()
        );
        observer.on_session_start(&info, &sampler);

        if let Err(err) = self.detector.warm_up() {
            log::warn!("detector warm-up failed: {err:#}");
        }

        let end = loop {
            if cancel.is_cancelled() {
                break SessionEnd::Cancelled;
            }
            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break SessionEnd::EndOfStream,
                Err(err) => {
                    log::error!("source {} failed: {err:#}", self.source.identifier());
                    break SessionEnd::SourceError(format!("{err:#}"));
                }
            };
            stats.frames_read += 1;
            let index = stats.frames_read;

            if !sampler.accepts(index) {
                observer.on_frame(index, None);
                continue;
            }

            let detections = match self.detector.detect(&frame) {
                Ok(detections) => detections,
                Err(err) => {
                    let failure = CounterError::DetectionFailure {
                        frame: index,
                        reason: format!("{err:#}"),
                    };
                    log::warn!("{failure}; counting the frame as empty");
                    stats.detection_failures += 1;
                    Vec::new()
                }
            };
            let tally = self.classifier.classify(&detections);
            aggregator.ingest(&tally);
            stats.frames_processed += 1;
            observer.on_frame(index, Some(&tally));

            let now = clock.elapsed(index);
            if let Some(summary) = aggregator.maybe_flush(now, clock.timestamp(now)) {
                self.persist(summary, &mut aggregator, &mut stats, observer);
            }
        };

        self.source.release();
        let report = self.report(stats, started, end);
        log::info!(
            "pipeline: session ended ({:?}) after {} frames, {} records",
            report.end,
            report.frames_read,
            report.flushes
        );
        observer.on_session_end(&report);
        Ok(report)
    }

    fn persist(
        &mut self,
        summary: WindowSummary,
        aggregator: &mut WindowAggregator,
        stats: &mut SessionStats,
        observer: &mut dyn PipelineObserver,
    ) {
        match self.sink.append(&summary) {
            Ok(()) => {
                log::debug!(
                    "pipeline: wrote window at {:.2}s ({} vehicles) to {}",
                    summary.elapsed_secs(),
                    summary.total(),
                    self.sink.destination()
                );
                stats.flushes += 1;
                observer.on_flush(&summary, self.classifier.taxonomy());
            }
            Err(err) => {
                let failure = CounterError::SinkWrite {
                    destination: self.sink.destination(),
                    reason: format!("{err:#}"),
                };
                log::error!("{failure}; keeping the counts for the next window");
                aggregator.restore(&summary);
                stats.sink_failures += 1;
            }
        }
    }

    fn report(&self, stats: SessionStats, started: Instant, end: SessionEnd) -> SessionReport {
        SessionReport {
            frames_read: stats.frames_read,
            frames_processed: stats.frames_processed,
            flushes: stats.flushes,
            detection_failures: stats.detection_failures,
            sink_failures: stats.sink_failures,
            elapsed: started.elapsed(),
            destination: self.sink.destination(),
            end,
        }
    }
}
