#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::Detector;
use crate::detect::result::{non_max_suppression, BoundingBox, Detection};
use crate::frame::Frame;

/// Number of box coordinates (cx, cy, w, h) preceding class scores in each anchor.
const CXYWH: usize = 4;

/// Tract-based YOLO detector.
///
/// Loads a local ONNX export with a single `[1, 4 + classes, anchors]` output, as
/// produced by YOLOv8/YOLO11 detection heads. Frames are stretched to the model input
/// size and boxes are projected back to frame coordinates.
pub struct TractDetector {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_width: u32,
    input_height: u32,
    class_names: Vec<String>,
    confidence_floor: f32,
    iou_threshold: f32,
}

impl TractDetector {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        input_width: u32,
        input_height: u32,
        class_names: Vec<String>,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        if class_names.is_empty() {
            return Err(anyhow!("class names are required to label model outputs"));
        }
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_height as usize, input_width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_width,
            input_height,
            class_names,
            confidence_floor: 0.25,
            iou_threshold: 0.45,
        })
    }

    /// Drop candidates scoring below `floor` before suppression.
    pub fn with_confidence_floor(mut self, floor: f32) -> Self {
        self.confidence_floor = floor;
        self
    }

    pub fn with_iou_threshold(mut self, iou: f32) -> Self {
        self.iou_threshold = iou;
        self
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let image = RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        let resized = if frame.width == self.input_width && frame.height == self.input_height {
            image
        } else {
            image::imageops::resize(
                &image,
                self.input_width,
                self.input_height,
                FilterType::Triangle,
            )
        };

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.input_height as usize, self.input_width as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        Ok(input.into_tensor())
    }

    fn decode(&self, outputs: TVec<TValue>, frame: &Frame) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let preds = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = preds.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 || shape[1] != CXYWH + self.class_names.len() {
            return Err(anyhow!(
                "unexpected output shape {:?} for {} classes",
                shape,
                self.class_names.len()
            ));
        }
        let anchors = shape[2];
        let scale_x = frame.width as f32 / self.input_width as f32;
        let scale_y = frame.height as f32 / self.input_height as f32;

        let mut detections = Vec::new();
        for anchor in 0..anchors {
            let (class_id, score) = (0..self.class_names.len())
                .map(|c| (c, preds[[0, CXYWH + c, anchor]]))
                .fold((0, f32::NEG_INFINITY), |best, x| if x.1 > best.1 { x } else { best });
            if !(score >= self.confidence_floor) {
                continue;
            }
            let cx = preds[[0, 0, anchor]] * scale_x;
            let cy = preds[[0, 1, anchor]] * scale_y;
            let w = preds[[0, 2, anchor]] * scale_x;
            let h = preds[[0, 3, anchor]] * scale_y;
            let x = (cx - w / 2.0).clamp(0.0, frame.width as f32);
            let y = (cy - h / 2.0).clamp(0.0, frame.height as f32);
            detections.push(
                Detection::new(self.class_names[class_id].clone(), score)
                    .with_bbox(BoundingBox::new(x, y, w, h)),
            );
        }

        non_max_suppression(&mut detections, self.iou_threshold);
        Ok(detections)
    }
}

impl Detector for TractDetector {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Frame::new(
            vec![0; (self.input_width * self.input_height * 3) as usize],
            self.input_width,
            self.input_height,
        )?;
        self.detect(&blank).map(|_| ())
    }
}
