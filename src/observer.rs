//! Progress notifications from the pipeline driver.
//!
//! Observers are read-only: they see what the pipeline did but cannot change it. A
//! cancellation request is the only way back in, through the `CancelToken`.

use crate::aggregate::WindowSummary;
use crate::ingest::VideoInfo;
use crate::pipeline::{SessionEnd, SessionReport};
use crate::sampler::FrameSampler;
use crate::taxonomy::{FrameTally, Taxonomy};
use crate::ui::rule;

pub trait PipelineObserver {
    /// Source connected and cadence decided.
    fn on_session_start(&mut self, _info: &VideoInfo, _sampler: &FrameSampler) {}

    /// Frame `index` (1-based) was read. `tally` is present for processed frames.
    fn on_frame(&mut self, _index: u64, _tally: Option<&FrameTally>) {}

    /// A summary was persisted.
    fn on_flush(&mut self, _summary: &WindowSummary, _taxonomy: &Taxonomy) {}

    fn on_session_end(&mut self, _report: &SessionReport) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default)]
pub struct SilentObserver;

impl PipelineObserver for SilentObserver {}

/// Prints session progress to stdout.
#[derive(Debug, Default)]
pub struct ConsoleObserver;

impl PipelineObserver for ConsoleObserver {
    fn on_session_start(&mut self, info: &VideoInfo, sampler: &FrameSampler) {
        match info.fps {
            Some(fps) => println!("Video: {}x{} @ {:.2}fps", info.width, info.height, fps),
            None => println!("Video: {}x{} @ unknown fps", info.width, info.height),
        }
        println!("{}", sampler.describe());
        println!("\nStarting detection...\n");
    }

    fn on_flush(&mut self, summary: &WindowSummary, taxonomy: &Taxonomy) {
        println!("{}", flush_line(summary, taxonomy));
    }

    fn on_session_end(&mut self, report: &SessionReport) {
        match &report.end {
            SessionEnd::EndOfStream => println!("End of video or cannot read frame"),
            SessionEnd::Cancelled => println!("\nStopping detection..."),
            SessionEnd::SourceError(reason) => println!("Stopped reading frames: {}", reason),
            SessionEnd::SourceUnavailable => {}
        }
        for line in summary_lines(report) {
            println!("{line}");
        }
    }
}

/// One line per persisted window, categories in column order.
pub fn flush_line(summary: &WindowSummary, taxonomy: &Taxonomy) -> String {
    let breakdown = taxonomy
        .categories()
        .iter()
        .enumerate()
        .map(|(i, category)| format!("{}: {}", category.column(), summary.counts.get(i)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "[{}] Elapsed: {:.2}s | Vehicles: {} | {}",
        summary.timestamp_string(),
        summary.elapsed_secs(),
        summary.total(),
        breakdown
    )
}

fn summary_lines(report: &SessionReport) -> Vec<String> {
    let mut lines = vec![
        format!("\n{}", rule()),
        "Session Summary:".to_string(),
        format!("Total Time: {:.2} seconds", report.elapsed.as_secs_f64()),
        format!("Total Frames Read: {}", report.frames_read),
        format!("Frames Processed: {}", report.frames_processed),
        format!("Records Written: {}", report.flushes),
    ];
    if report.detection_failures > 0 {
        lines.push(format!("Detection Failures: {}", report.detection_failures));
    }
    if report.sink_failures > 0 {
        lines.push(format!("Failed Writes: {}", report.sink_failures));
    }
    lines.push(format!("Results saved to: {}", report.destination));
    lines.push(rule());
    lines
}
