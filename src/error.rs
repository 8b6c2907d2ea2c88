use thiserror::Error;

/// Failures the pipeline distinguishes when deciding whether to keep running.
///
/// These travel inside `anyhow::Error`; callers recover them with `downcast_ref`.
#[derive(Debug, Error)]
pub enum CounterError {
    /// The video source could not be opened. Fatal before the frame loop starts.
    #[error("could not open video source '{identifier}': {reason}")]
    SourceUnavailable { identifier: String, reason: String },

    /// The detector failed on one frame. The frame is counted as empty.
    #[error("detection failed on frame {frame}: {reason}")]
    DetectionFailure { frame: u64, reason: String },

    /// A summary could not be appended. The run continues.
    #[error("failed to append summary to {destination}: {reason}")]
    SinkWrite { destination: String, reason: String },
}
