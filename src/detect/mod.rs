//! Object detection seam.
//!
//! The pipeline only sees the `Detector` trait. `open_detector` picks a backend from
//! the configured model location: `stub://…` selects the deterministic stub, anything
//! else is loaded as an ONNX model (feature: backend-tract).

mod backend;
mod backends;
mod result;

use anyhow::Result;

pub use backend::Detector;
pub use backends::StubDetector;
#[cfg(feature = "backend-tract")]
pub use backends::TractDetector;
pub use result::{non_max_suppression, BoundingBox, Detection};

/// Default model location, relative to the working directory.
pub const DEFAULT_MODEL_PATH: &str = "runs/detect/train/weights/best.onnx";
/// Default IoU above which overlapping same-label boxes are merged.
pub const DEFAULT_NMS_IOU: f32 = 0.45;
/// Default square model input edge, in pixels.
pub const DEFAULT_MODEL_INPUT: u32 = 640;

/// Everything needed to construct a detector backend.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorSettings {
    /// Model location, or `stub://<name>` for the stub backend.
    pub model_path: String,
    /// Class index → label table for the model's outputs.
    pub class_names: Vec<String>,
    /// Candidates below this score are dropped inside the backend.
    pub confidence_floor: f32,
    pub nms_iou: f32,
    pub input_width: u32,
    pub input_height: u32,
}

impl DetectorSettings {
    pub fn is_stub(&self) -> bool {
        self.model_path.starts_with("stub://")
    }
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_MODEL_PATH.to_string(),
            class_names: crate::taxonomy::DEFAULT_CATEGORIES
                .iter()
                .map(|(label, _)| label.to_string())
                .collect(),
            confidence_floor: crate::classify::DEFAULT_CONFIDENCE_THRESHOLD,
            nms_iou: DEFAULT_NMS_IOU,
            input_width: DEFAULT_MODEL_INPUT,
            input_height: DEFAULT_MODEL_INPUT,
        }
    }
}

/// Construct the backend named by `settings.model_path`.
pub fn open_detector(settings: &DetectorSettings) -> Result<Box<dyn Detector>> {
    if settings.is_stub() {
        log::info!("detector: stub backend ({})", settings.model_path);
        return Ok(Box::new(StubDetector::new(&settings.class_names)?));
    }

    #[cfg(feature = "backend-tract")]
    {
        let detector = TractDetector::new(
            &settings.model_path,
            settings.input_width,
            settings.input_height,
            settings.class_names.clone(),
        )?
        .with_confidence_floor(settings.confidence_floor)
        .with_iou_threshold(settings.nms_iou);
        log::info!(
            "detector: tract backend, model {} ({} classes)",
            settings.model_path,
            settings.class_names.len()
        );
        Ok(Box::new(detector))
    }
    #[cfg(not(feature = "backend-tract"))]
    {
        anyhow::bail!(
            "loading model '{}' requires the backend-tract feature",
            settings.model_path
        )
    }
}
