//! Frame ingestion sources.
//!
//! This module provides the sources the pipeline reads frames from:
//! - Synthetic `stub://` streams (demos and tests)
//! - Local video files and capture devices (feature: ingest-file-ffmpeg)
//!
//! Every source follows the same lifecycle: construct with an identifier, `connect`,
//! pull frames with `next_frame` until it yields `None`, then `release`. The pipeline
//! owns its source exclusively and always releases it, whatever ends the session.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod synthetic;

use anyhow::Result;

use crate::frame::Frame;

pub use file::FileSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// Nominal properties reported by a connected source.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VideoInfo {
    /// Nominal frame rate, `None` when the container does not report one.
    pub fps: Option<f64>,
    pub width: u32,
    pub height: u32,
}

pub trait VideoSource {
    /// Identifier the source was created from (path, device or stub URL).
    fn identifier(&self) -> &str;

    /// Open the underlying stream. Failure here aborts the session.
    fn connect(&mut self) -> Result<()>;

    /// Next decoded frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying stream. Safe to call more than once.
    fn release(&mut self);

    /// Nominal properties. Meaningful after `connect`.
    fn info(&self) -> VideoInfo;
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn identifier(&self) -> &str {
        (**self).identifier()
    }

    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn info(&self) -> VideoInfo {
        (**self).info()
    }
}

/// Create the source named by `identifier` (not yet connected).
///
/// Identifiers that cannot be served still produce a source; its `connect` fails.
pub fn open_source(identifier: &str) -> Box<dyn VideoSource> {
    Box::new(FileSource::new(identifier))
}
