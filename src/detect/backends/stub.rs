use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};

use crate::detect::backend::Detector;
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::Frame;

/// Most objects the stub reports in one frame.
const MAX_OBJECTS: usize = 4;

/// Deterministic detector for demos and tests.
///
/// Hashes the frame and derives up to four labelled detections from the digest, so
/// identical frames always produce identical output.
pub struct StubDetector {
    labels: Vec<String>,
}

impl StubDetector {
    pub fn new<S: AsRef<str>>(labels: &[S]) -> Result<Self> {
        if labels.is_empty() {
            return Err(anyhow!("stub detector needs at least one label"));
        }
        Ok(Self {
            labels: labels.iter().map(|l| l.as_ref().to_string()).collect(),
        })
    }
}

impl Detector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let mut hasher = Sha256::new();
        hasher.update(frame.width.to_le_bytes());
        hasher.update(frame.height.to_le_bytes());
        hasher.update(frame.pixels());
        let digest: [u8; 32] = hasher.finalize().into();

        let objects = digest[0] as usize % (MAX_OBJECTS + 1);
        let width = frame.width as f32;
        let height = frame.height as f32;

        let detections = (0..objects)
            .map(|k| {
                let label = &self.labels[digest[1 + k] as usize % self.labels.len()];
                let confidence = digest[5 + k] as f32 / 255.0;
                let bytes = &digest[9 + 4 * k..13 + 4 * k];
                let x = bytes[0] as f32 / 255.0 * width * 0.75;
                let y = bytes[1] as f32 / 255.0 * height * 0.75;
                let w = (bytes[2] as f32 / 255.0 * 0.25 + 0.05) * width;
                let h = (bytes[3] as f32 / 255.0 * 0.25 + 0.05) * height;
                Detection::new(label.clone(), confidence).with_bbox(BoundingBox::new(x, y, w, h))
            })
            .collect();
        Ok(detections)
    }
}
