//! Video file and capture-device source.
//!
//! `FileSource` resolves an identifier to a backend:
//! - `stub://…` → synthetic frames
//! - a bare integer `N` → capture device `/dev/videoN` (feature: ingest-file-ffmpeg)
//! - anything else → local video file (feature: ingest-file-ffmpeg)
//!
//! Remote URLs are rejected; this counter reads local media only.

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegSource;
use super::synthetic::SyntheticSource;
use super::{VideoInfo, VideoSource};
use crate::frame::Frame;

/// Local video source.
///
/// Construction never fails: an identifier that cannot be served is kept and its
/// error is returned from `connect`, so the session still starts and reports it.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegSource),
    Unavailable { identifier: String, reason: String },
}

impl FileSource {
    pub fn new(identifier: &str) -> Self {
        let backend = match Self::select_backend(identifier) {
            Ok(backend) => backend,
            Err(err) => FileBackend::Unavailable {
                identifier: identifier.to_string(),
                reason: format!("{err:#}"),
            },
        };
        Self { backend }
    }

    fn select_backend(identifier: &str) -> Result<FileBackend> {
        if identifier.trim().is_empty() {
            return Err(anyhow!("video source identifier must not be empty"));
        }
        if identifier.starts_with("stub://") {
            return Ok(FileBackend::Synthetic(SyntheticSource::new(identifier)?));
        }
        if identifier.contains("://") {
            return Err(anyhow!(
                "video source '{}' is not local (no URL schemes)",
                identifier
            ));
        }

        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            Ok(FileBackend::Ffmpeg(FfmpegSource::new(resolve_local_path(
                identifier,
            ))))
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(anyhow!(
                "reading '{}' requires the ingest-file-ffmpeg feature",
                resolve_local_path(identifier)
            ))
        }
    }
}

/// Map a bare device index to its device node; other identifiers are file paths.
pub fn resolve_local_path(identifier: &str) -> String {
    let trimmed = identifier.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        format!("/dev/video{}", trimmed)
    } else {
        identifier.to_string()
    }
}

impl VideoSource for FileSource {
    fn identifier(&self) -> &str {
        match &self.backend {
            FileBackend::Synthetic(source) => source.identifier(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.identifier(),
            FileBackend::Unavailable { identifier, .. } => identifier,
        }
    }

    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.connect(),
            FileBackend::Unavailable { reason, .. } => Err(anyhow!("{}", reason)),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
            FileBackend::Unavailable { identifier, .. } => {
                Err(anyhow!("video source {} is not connected", identifier))
            }
        }
    }

    fn release(&mut self) {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.release(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.release(),
            FileBackend::Unavailable { .. } => {}
        }
    }

    fn info(&self) -> VideoInfo {
        match &self.backend {
            FileBackend::Synthetic(source) => source.info(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.info(),
            FileBackend::Unavailable { .. } => VideoInfo::default(),
        }
    }
}
