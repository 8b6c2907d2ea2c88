//! Vehicle counter
//!
//! Counts vehicles in a video stream and records per-category totals at a fixed
//! interval to an append-only CSV file.
//!
//! # Architecture
//!
//! One synchronous pipeline, one frame at a time:
//!
//! 1. **Source** (`ingest`): local video file, capture device, or synthetic `stub://` stream.
//! 2. **Sampler** (`sampler`): forwards every `S`-th frame so detection runs near the target rate.
//! 3. **Detector** (`detect`): opaque backend returning labelled, scored boxes.
//! 4. **Classifier** (`classify`): drops low-confidence and unknown labels, tallies the rest.
//! 5. **Aggregator** (`aggregate`): sums tallies and closes a window once per interval.
//! 6. **Sink** (`sink`): appends each closed window as one durable CSV row.
//!
//! `pipeline::Pipeline` drives the stages; `observer` reports progress to the operator.

pub mod aggregate;
pub mod classify;
pub mod clock;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod observer;
pub mod pipeline;
pub mod sampler;
pub mod sink;
pub mod taxonomy;
pub mod ui;

pub use aggregate::{WindowAggregator, WindowSummary, DEFAULT_FLUSH_INTERVAL, TIMESTAMP_FORMAT};
pub use classify::{Classifier, DEFAULT_CONFIDENCE_THRESHOLD};
pub use clock::{ClockKind, SessionClock, StreamClock, WallClock};
pub use config::CounterConfig;
pub use detect::{open_detector, BoundingBox, Detection, Detector, DetectorSettings, StubDetector};
pub use error::CounterError;
pub use frame::Frame;
pub use ingest::{open_source, FileSource, SyntheticSource, VideoInfo, VideoSource};
pub use observer::{ConsoleObserver, PipelineObserver, SilentObserver};
pub use pipeline::{CancelToken, Pipeline, SessionEnd, SessionReport};
pub use sampler::FrameSampler;
pub use sink::{CsvSink, MemorySink, SummarySink, DEFAULT_OUTPUT_PATH};
pub use taxonomy::{Category, FrameTally, Taxonomy, DEFAULT_CATEGORIES};
