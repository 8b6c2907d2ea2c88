use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Object detector.
///
/// The pipeline treats implementations as opaque: pixels go in, labelled detections
/// come out. An empty vector means "nothing found" and is not an error; `Err` is
/// reserved for genuine failures, which the pipeline logs and counts as an empty
/// frame.
pub trait Detector {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on one frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, run once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        (**self).detect(frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
