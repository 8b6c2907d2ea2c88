use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::aggregate::DEFAULT_FLUSH_INTERVAL;
use crate::classify::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::clock::ClockKind;
use crate::detect::DetectorSettings;
use crate::sink::DEFAULT_OUTPUT_PATH;
use crate::taxonomy::{Category, Taxonomy};

const DEFAULT_SOURCE: &str = "testvid-1.mp4";
const DEFAULT_TARGET_FPS: f64 = 15.0;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CounterConfigFile {
    source: Option<String>,
    target_fps: Option<f64>,
    interval_secs: Option<f64>,
    confidence_threshold: Option<f32>,
    output: Option<PathBuf>,
    categories: Option<Vec<CategoryFile>>,
    clock: Option<ClockKind>,
    detector: Option<DetectorConfigFile>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CategoryFile {
    Label(String),
    Named { label: String, column: String },
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    model_path: Option<String>,
    class_names: Option<Vec<String>>,
    nms_iou: Option<f32>,
    input_width: Option<u32>,
    input_height: Option<u32>,
}

/// Complete run configuration, handed to the pipeline at construction.
#[derive(Debug, Clone)]
pub struct CounterConfig {
    /// Video file path, device index, or `stub://` URL.
    pub source: String,
    /// Target processing rate; `None` processes every frame.
    pub target_fps: Option<f64>,
    pub flush_interval: Duration,
    pub confidence_threshold: f32,
    pub output: PathBuf,
    pub taxonomy: Taxonomy,
    pub clock: ClockKind,
    pub detector: DetectorSettings,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            target_fps: Some(DEFAULT_TARGET_FPS),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            output: PathBuf::from(DEFAULT_OUTPUT_PATH),
            taxonomy: Taxonomy::default(),
            clock: ClockKind::Wall,
            detector: DetectorSettings::default(),
        }
    }
}

impl CounterConfig {
    /// Defaults, then the file named by `VEHICLE_COUNTER_CONFIG`, then environment
    /// overrides. The result is validated.
    pub fn load() -> Result<Self> {
        let config_path = env_value("VEHICLE_COUNTER_CONFIG").map(PathBuf::from);
        Self::load_with(config_path.as_deref())
    }

    /// Same layering as `load`, with an explicit config file in place of the
    /// `VEHICLE_COUNTER_CONFIG` lookup.
    pub fn load_with(config_path: Option<&Path>) -> Result<Self> {
        let file_cfg = match config_path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overlaid with one config file, no environment.
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: CounterConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let taxonomy = match file.categories {
            Some(entries) => parse_categories(entries)?,
            None => defaults.taxonomy,
        };
        let detector_file = file.detector.unwrap_or_default();
        let confidence_threshold = file
            .confidence_threshold
            .unwrap_or(defaults.confidence_threshold);
        let detector = DetectorSettings {
            model_path: detector_file
                .model_path
                .unwrap_or(defaults.detector.model_path),
            class_names: detector_file
                .class_names
                .unwrap_or_else(|| taxonomy.labels().map(str::to_string).collect()),
            confidence_floor: confidence_threshold,
            nms_iou: detector_file.nms_iou.unwrap_or(defaults.detector.nms_iou),
            input_width: detector_file
                .input_width
                .unwrap_or(defaults.detector.input_width),
            input_height: detector_file
                .input_height
                .unwrap_or(defaults.detector.input_height),
        };
        let flush_interval = match file.interval_secs {
            Some(secs) => duration_from_secs(secs)?,
            None => defaults.flush_interval,
        };
        Ok(Self {
            source: file.source.unwrap_or(defaults.source),
            target_fps: file.target_fps.or(defaults.target_fps),
            flush_interval,
            confidence_threshold,
            output: file.output.unwrap_or(defaults.output),
            taxonomy,
            clock: file.clock.unwrap_or(defaults.clock),
            detector,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(model) = env_value("VEHICLE_COUNTER_MODEL") {
            self.detector.model_path = model;
        }
        if let Some(source) = env_value("VEHICLE_COUNTER_SOURCE") {
            self.source = source;
        }
        if let Some(fps) = env_value("VEHICLE_COUNTER_TARGET_FPS") {
            self.target_fps = parse_target_fps(&fps)?;
        }
        if let Some(interval) = env_value("VEHICLE_COUNTER_INTERVAL_SECS") {
            let secs: f64 = interval.parse().map_err(|_| {
                anyhow!("VEHICLE_COUNTER_INTERVAL_SECS must be a number of seconds")
            })?;
            self.flush_interval = duration_from_secs(secs)?;
        }
        if let Some(confidence) = env_value("VEHICLE_COUNTER_CONFIDENCE") {
            self.set_confidence_threshold(confidence.parse().map_err(|_| {
                anyhow!("VEHICLE_COUNTER_CONFIDENCE must be a number between 0 and 1")
            })?);
        }
        if let Some(output) = env_value("VEHICLE_COUNTER_OUTPUT") {
            self.output = PathBuf::from(output);
        }
        if let Some(categories) = env_value("VEHICLE_COUNTER_CATEGORIES") {
            let labels = split_csv(&categories);
            if !labels.is_empty() {
                self.set_taxonomy(Taxonomy::from_labels(labels.as_slice())?);
            }
        }
        if let Some(clock) = env_value("VEHICLE_COUNTER_CLOCK") {
            self.clock = ClockKind::parse(&clock)
                .ok_or_else(|| anyhow!("VEHICLE_COUNTER_CLOCK must be 'wall' or 'stream'"))?;
        }
        Ok(())
    }

    /// Set the counting threshold; the detector's candidate floor follows it.
    pub fn set_confidence_threshold(&mut self, threshold: f32) {
        self.confidence_threshold = threshold;
        self.detector.confidence_floor = threshold;
    }

    /// Replace the taxonomy. The stub detector labels follow it.
    pub fn set_taxonomy(&mut self, taxonomy: Taxonomy) {
        if self.detector.is_stub() {
            self.detector.class_names = taxonomy.labels().map(str::to_string).collect();
        }
        self.taxonomy = taxonomy;
    }

    pub fn validate(&mut self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!(
                "confidence threshold must be within 0..=1 (got {})",
                self.confidence_threshold
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(anyhow!("flush interval must be greater than zero"));
        }
        if let Some(fps) = self.target_fps {
            if !fps.is_finite() {
                return Err(anyhow!("target fps must be a finite number"));
            }
            if fps <= 0.0 {
                self.target_fps = None;
            }
        }
        if self.source.trim().is_empty() {
            return Err(anyhow!("video source must not be empty"));
        }
        if self.detector.class_names.is_empty() {
            return Err(anyhow!("detector class names must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.detector.nms_iou) {
            return Err(anyhow!("nms_iou must be within 0..=1"));
        }
        if self.detector.input_width == 0 || self.detector.input_height == 0 {
            return Err(anyhow!("model input dimensions must be non-zero"));
        }
        Ok(())
    }
}

/// Parse a target rate. Empty, `all` or `none` mean every frame.
pub fn parse_target_fps(value: &str) -> Result<Option<f64>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("all") || value.eq_ignore_ascii_case("none")
    {
        return Ok(None);
    }
    let fps: f64 = value
        .parse()
        .map_err(|_| anyhow!("target fps must be a number, 'all' or 'none' (got '{}')", value))?;
    Ok((fps > 0.0).then_some(fps))
}

fn duration_from_secs(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(anyhow!("flush interval must be a positive number of seconds"));
    }
    Ok(Duration::from_secs_f64(secs))
}

fn parse_categories(entries: Vec<CategoryFile>) -> Result<Taxonomy> {
    let categories = entries
        .into_iter()
        .map(|entry| match entry {
            CategoryFile::Label(label) => Category::from_label(&label),
            CategoryFile::Named { label, column } => Category::new(&label, &column),
        })
        .collect::<Result<Vec<_>>>()?;
    Taxonomy::new(categories)
}

fn read_config_file(path: &Path) -> Result<CounterConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
