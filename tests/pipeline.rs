use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use vehicle_counter::{
    open_source, CancelToken, ClockKind, CounterConfig, CounterError, Detection, Detector, Frame,
    FrameTally, MemorySink, Pipeline, PipelineObserver, SessionEnd, SessionReport,
    SilentObserver, SummarySink, SyntheticSource, VideoInfo, VideoSource, WindowSummary,
};

/// Reports one car at 0.9 on every call, failing on the listed calls.
struct ScriptedDetector {
    calls: u64,
    fail_on: HashSet<u64>,
}

impl ScriptedDetector {
    fn one_car() -> Self {
        Self {
            calls: 0,
            fail_on: HashSet::new(),
        }
    }

    fn failing_on(calls: &[u64]) -> Self {
        Self {
            calls: 0,
            fail_on: calls.iter().copied().collect(),
        }
    }
}

impl Detector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        self.calls += 1;
        if self.fail_on.contains(&self.calls) {
            return Err(anyhow!("inference backend crashed"));
        }
        Ok(vec![
            Detection::new("car", 0.9),
            Detection::new("pedestrian", 0.95),
            Detection::new("bus", 0.2),
        ])
    }
}

/// Wraps a source and counts lifecycle calls.
struct CountingSource {
    inner: SyntheticSource,
    releases: Rc<Cell<u32>>,
    fail_connect: bool,
}

impl CountingSource {
    fn new(identifier: &str, releases: Rc<Cell<u32>>) -> Self {
        Self {
            inner: SyntheticSource::new(identifier).expect("synthetic source"),
            releases,
            fail_connect: false,
        }
    }
}

impl VideoSource for CountingSource {
    fn identifier(&self) -> &str {
        self.inner.identifier()
    }

    fn connect(&mut self) -> Result<()> {
        if self.fail_connect {
            return Err(anyhow!("no such file"));
        }
        self.inner.connect()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.inner.next_frame()
    }

    fn release(&mut self) {
        self.releases.set(self.releases.get() + 1);
        self.inner.release();
    }

    fn info(&self) -> VideoInfo {
        self.inner.info()
    }
}

/// Cancels the session once the given frame has been read.
struct CancelAfter {
    frame: u64,
    token: CancelToken,
    end: Option<SessionReport>,
}

impl PipelineObserver for CancelAfter {
    fn on_frame(&mut self, index: u64, _tally: Option<&FrameTally>) {
        if index == self.frame {
            self.token.cancel();
        }
    }

    fn on_session_end(&mut self, report: &SessionReport) {
        self.end = Some(report.clone());
    }
}

/// Keeps the final session report.
#[derive(Default)]
struct EndRecorder {
    end: Option<SessionReport>,
}

impl PipelineObserver for EndRecorder {
    fn on_session_end(&mut self, report: &SessionReport) {
        self.end = Some(report.clone());
    }
}

/// Fails every append until `failures` is exhausted.
#[derive(Default)]
struct FlakySink {
    failures: u32,
    records: Vec<WindowSummary>,
}

impl SummarySink for FlakySink {
    fn append(&mut self, summary: &WindowSummary) -> Result<()> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(anyhow!("disk full"));
        }
        self.records.push(summary.clone());
        Ok(())
    }

    fn destination(&self) -> String {
        "flaky".to_string()
    }
}

fn stream_config() -> CounterConfig {
    CounterConfig {
        target_fps: Some(15.0),
        flush_interval: Duration::from_secs(1),
        clock: ClockKind::Stream,
        ..CounterConfig::default()
    }
}

#[test]
fn two_second_video_yields_two_windows_of_fifteen_cars() -> Result<()> {
    let config = stream_config();
    let source = SyntheticSource::new("stub://e2e?frames=60&fps=30&width=8&height=8")?;
    let mut pipeline = Pipeline::new(
        &config,
        source,
        ScriptedDetector::one_car(),
        MemorySink::new(),
    );

    let report = pipeline.run(&CancelToken::new(), &mut SilentObserver)?;

    assert_eq!(report.end, SessionEnd::EndOfStream);
    assert_eq!(report.frames_read, 60);
    assert_eq!(report.frames_processed, 30);
    assert_eq!(report.flushes, 2);
    assert_eq!(pipeline.detector().calls, 30);

    let records = pipeline.sink().records();
    assert_eq!(records.len(), 2);
    for record in records {
        assert_eq!(record.total(), 15);
        assert_eq!(record.counts.count_of(&config.taxonomy, "car"), 15);
        assert_eq!(record.counts.count_of(&config.taxonomy, "bus"), 0);
        assert_eq!(record.counts.counts().iter().sum::<u64>(), 15);
    }
    assert_eq!(records[0].elapsed, Duration::from_secs(1));
    assert_eq!(records[1].elapsed, Duration::from_secs(2));
    assert!(records[0].timestamp < records[1].timestamp);
    Ok(())
}

#[test]
fn cancellation_after_frame_ten_stops_reading() -> Result<()> {
    let releases = Rc::new(Cell::new(0));
    let source = CountingSource::new("stub://cancel?frames=100&width=4&height=4", releases.clone());
    let token = CancelToken::new();
    let mut observer = CancelAfter {
        frame: 10,
        token: token.clone(),
        end: None,
    };
    let mut pipeline = Pipeline::new(
        &stream_config(),
        source,
        ScriptedDetector::one_car(),
        MemorySink::new(),
    );

    let report = pipeline.run(&token, &mut observer)?;

    assert_eq!(report.end, SessionEnd::Cancelled);
    assert_eq!(report.frames_read, 10);
    assert_eq!(pipeline.source().inner.frames_emitted(), 10);
    assert_eq!(releases.get(), 1);
    let end = observer.end.expect("session summary emitted");
    assert_eq!(end.frames_read, 10);
    assert_eq!(end.destination, "memory");
    Ok(())
}

#[test]
fn unopenable_source_aborts_before_reading() {
    let releases = Rc::new(Cell::new(0));
    let mut source = CountingSource::new("stub://missing", releases.clone());
    source.fail_connect = true;
    let mut observer = CancelAfter {
        frame: 0,
        token: CancelToken::new(),
        end: None,
    };
    let mut pipeline = Pipeline::new(
        &stream_config(),
        source,
        ScriptedDetector::one_car(),
        MemorySink::new(),
    );

    let err = pipeline
        .run(&CancelToken::new(), &mut observer)
        .expect_err("connect failure is fatal");

    match err.downcast_ref::<CounterError>() {
        Some(CounterError::SourceUnavailable { identifier, .. }) => {
            assert_eq!(identifier, "stub://missing");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(releases.get(), 1);
    assert_eq!(pipeline.detector().calls, 0);
    assert!(pipeline.sink().records().is_empty());
    let end = observer.end.expect("session summary emitted");
    assert_eq!(end.end, SessionEnd::SourceUnavailable);
    assert_eq!(end.frames_read, 0);
}

#[test]
fn detection_failure_counts_frame_as_empty() -> Result<()> {
    let config = stream_config();
    let source = SyntheticSource::new("stub://faults?frames=30&fps=30&width=4&height=4")?;
    let mut pipeline = Pipeline::new(
        &config,
        source,
        ScriptedDetector::failing_on(&[3, 7]),
        MemorySink::new(),
    );

    let report = pipeline.run(&CancelToken::new(), &mut SilentObserver)?;

    assert_eq!(report.end, SessionEnd::EndOfStream);
    assert_eq!(report.frames_processed, 15);
    assert_eq!(report.detection_failures, 2);
    let records = pipeline.sink().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].total(), 13);
    Ok(())
}

#[test]
fn failed_append_carries_counts_into_next_window() -> Result<()> {
    let config = stream_config();
    let source = SyntheticSource::new("stub://flaky?frames=60&fps=30&width=4&height=4")?;
    let sink = FlakySink {
        failures: 1,
        ..FlakySink::default()
    };
    let mut pipeline = Pipeline::new(&config, source, ScriptedDetector::one_car(), sink);

    let report = pipeline.run(&CancelToken::new(), &mut SilentObserver)?;

    assert_eq!(report.sink_failures, 1);
    assert_eq!(report.flushes, 1);
    let records = &pipeline.sink().records;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].total(), 30);
    assert_eq!(records[0].elapsed, Duration::from_secs(2));
    Ok(())
}

#[test]
fn unknown_source_rate_processes_every_frame() -> Result<()> {
    let config = stream_config();
    let source = SyntheticSource::new("stub://norate?frames=12&fps=0&width=4&height=4")?;
    let mut pipeline = Pipeline::new(
        &config,
        source,
        ScriptedDetector::one_car(),
        MemorySink::new(),
    );

    let report = pipeline.run(&CancelToken::new(), &mut SilentObserver)?;

    assert_eq!(report.frames_read, 12);
    assert_eq!(report.frames_processed, 12);
    Ok(())
}

#[test]
fn remote_identifier_is_reported_as_unavailable() {
    let mut observer = EndRecorder::default();
    let mut pipeline = Pipeline::new(
        &stream_config(),
        open_source("rtsp://cam/1"),
        ScriptedDetector::one_car(),
        MemorySink::new(),
    );

    let err = pipeline
        .run(&CancelToken::new(), &mut observer)
        .expect_err("remote sources cannot be opened");

    match err.downcast_ref::<CounterError>() {
        Some(CounterError::SourceUnavailable { identifier, reason }) => {
            assert_eq!(identifier, "rtsp://cam/1");
            assert!(reason.contains("not local"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    let end = observer.end.expect("session summary emitted");
    assert_eq!(end.end, SessionEnd::SourceUnavailable);
    assert_eq!(end.frames_read, 0);
    assert_eq!(pipeline.detector().calls, 0);
}

#[test]
fn wall_clock_session_with_long_interval_writes_nothing() -> Result<()> {
    let config = CounterConfig {
        target_fps: Some(15.0),
        flush_interval: Duration::from_secs(3_600),
        ..CounterConfig::default()
    };
    assert_eq!(config.clock, ClockKind::Wall);
    let mut observer = EndRecorder::default();
    let mut pipeline = Pipeline::new(
        &config,
        open_source("stub://wall?frames=20&fps=30&width=4&height=4"),
        ScriptedDetector::one_car(),
        MemorySink::new(),
    );

    let report = pipeline.run(&CancelToken::new(), &mut observer)?;

    assert_eq!(report.end, SessionEnd::EndOfStream);
    assert_eq!(report.frames_read, 20);
    assert_eq!(report.frames_processed, 10);
    assert_eq!(report.flushes, 0);
    assert_eq!(report.sink_failures, 0);
    assert_eq!(report.destination, "memory");
    assert!(report.elapsed < Duration::from_secs(3_600));
    assert!(pipeline.sink().records().is_empty());
    assert_eq!(observer.end, Some(report));
    Ok(())
}
