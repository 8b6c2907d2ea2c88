/// Frame decimation by integer stride.
///
/// Frame `i` (1-based) is forwarded for detection iff `i % stride == 0`, where
/// `stride = max(1, round(source_fps / target_fps))`. An unknown source rate or an
/// unset/non-positive target processes every frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameSampler {
    stride: u64,
    source_fps: Option<f64>,
}

impl FrameSampler {
    pub fn new(source_fps: Option<f64>, target_fps: Option<f64>) -> Self {
        let source_fps = source_fps.filter(|fps| fps.is_finite() && *fps > 0.0);
        let target_fps = target_fps.filter(|fps| fps.is_finite() && *fps > 0.0);
        let stride = match (source_fps, target_fps) {
            (Some(source), Some(target)) => ((source / target).round() as u64).max(1),
            _ => 1,
        };
        Self { stride, source_fps }
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn accepts(&self, frame_index: u64) -> bool {
        frame_index % self.stride == 0
    }

    /// Achieved processing rate, when the source rate is known.
    pub fn effective_fps(&self) -> Option<f64> {
        self.source_fps.map(|fps| fps / self.stride as f64)
    }

    /// Operator-facing description of the cadence.
    pub fn describe(&self) -> String {
        match (self.stride, self.effective_fps()) {
            (1, Some(fps)) => format!("Processing all frames ({:.1} fps)", fps),
            (1, None) => "Processing all frames (source rate unknown)".to_string(),
            (stride, Some(fps)) => {
                format!("Processing every {} frame(s) (~{:.1} fps)", stride, fps)
            }
            (stride, None) => format!("Processing every {} frame(s)", stride),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_rounds_rate_ratio() {
        assert_eq!(FrameSampler::new(Some(30.0), Some(15.0)).stride(), 2);
        assert_eq!(FrameSampler::new(Some(30.0), Some(10.0)).stride(), 3);
        assert_eq!(FrameSampler::new(Some(29.97), Some(15.0)).stride(), 2);
        assert_eq!(FrameSampler::new(Some(25.0), Some(10.0)).stride(), 3);
        assert_eq!(FrameSampler::new(Some(30.0), Some(60.0)).stride(), 1);
        assert_eq!(FrameSampler::new(Some(30.0), Some(45.0)).stride(), 1);
    }

    #[test]
    fn unknown_or_unset_rates_process_every_frame() {
        assert_eq!(FrameSampler::new(None, Some(15.0)).stride(), 1);
        assert_eq!(FrameSampler::new(Some(0.0), Some(15.0)).stride(), 1);
        assert_eq!(FrameSampler::new(Some(30.0), None).stride(), 1);
        assert_eq!(FrameSampler::new(Some(30.0), Some(0.0)).stride(), 1);
        assert_eq!(FrameSampler::new(Some(30.0), Some(-5.0)).stride(), 1);
        assert_eq!(FrameSampler::new(Some(f64::NAN), Some(5.0)).stride(), 1);
    }

    #[test]
    fn accepts_every_stride_th_frame() {
        let sampler = FrameSampler::new(Some(30.0), Some(15.0));
        let accepted: Vec<u64> = (1..=10).filter(|i| sampler.accepts(*i)).collect();
        assert_eq!(accepted, vec![2, 4, 6, 8, 10]);
        assert_eq!(sampler.effective_fps(), Some(15.0));
    }

    #[test]
    fn describes_cadence() {
        assert_eq!(
            FrameSampler::new(Some(30.0), Some(15.0)).describe(),
            "Processing every 2 frame(s) (~15.0 fps)"
        );
        assert_eq!(
            FrameSampler::new(Some(30.0), None).describe(),
            "Processing all frames (30.0 fps)"
        );
    }
}
