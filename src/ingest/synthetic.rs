//! Synthetic frame source.
//!
//! `stub://<name>?frames=60&fps=30&width=64&height=48` yields a finite stream of
//! generated frames whose pixels change every frame. Parameters are optional.

use anyhow::{anyhow, Context, Result};

use super::{VideoInfo, VideoSource};
use crate::frame::Frame;

/// Largest accepted edge for generated frames, in pixels.
pub const MAX_SYNTHETIC_DIMENSION: u32 = 8192;

#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticConfig {
    pub name: String,
    /// Frames before end of stream.
    pub frames: u64,
    /// Reported nominal rate; `0` reports an unknown rate.
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "synthetic".to_string(),
            frames: 300,
            fps: 30.0,
            width: 320,
            height: 240,
        }
    }
}

impl SyntheticConfig {
    /// Parse a `stub://` identifier.
    pub fn parse(identifier: &str) -> Result<Self> {
        let rest = identifier
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("synthetic sources use stub:// identifiers"))?;
        let (name, query) = rest.split_once('?').unwrap_or((rest, ""));

        let mut config = Self::default();
        if !name.is_empty() {
            config.name = name.to_string();
        }
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed stub parameter '{}'", pair))?;
            match key {
                "frames" => config.frames = parse_value(key, value)?,
                "fps" => config.fps = parse_value(key, value)?,
                "width" => config.width = parse_value(key, value)?,
                "height" => config.height = parse_value(key, value)?,
                _ => return Err(anyhow!("unknown stub parameter '{}'", key)),
            }
        }
        if !config.fps.is_finite() || config.fps < 0.0 {
            return Err(anyhow!("stub fps must be a non-negative number"));
        }
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("stub frame dimensions must be non-zero"));
        }
        if config.width > MAX_SYNTHETIC_DIMENSION || config.height > MAX_SYNTHETIC_DIMENSION {
            return Err(anyhow!(
                "stub frame dimensions {}x{} exceed {} pixels per edge",
                config.width,
                config.height,
                MAX_SYNTHETIC_DIMENSION
            ));
        }
        Ok(config)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("invalid value '{}' for stub parameter '{}'", value, key))
}

/// Finite generated stream.
pub struct SyntheticSource {
    identifier: String,
    config: SyntheticConfig,
    frame_count: u64,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(identifier: &str) -> Result<Self> {
        let config = SyntheticConfig::parse(identifier)?;
        Ok(Self::with_config(identifier, config))
    }

    pub fn with_config(identifier: &str, config: SyntheticConfig) -> Self {
        Self {
            identifier: identifier.to_string(),
            config,
            frame_count: 0,
            connected: false,
        }
    }

    pub fn frames_emitted(&self) -> u64 {
        self.frame_count
    }

    fn generate_pixels(&self) -> Result<Vec<u8>> {
        let byte_count = (self.config.width as usize)
            .checked_mul(self.config.height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| {
                anyhow!(
                    "stub frame {}x{} is too large",
                    self.config.width,
                    self.config.height
                )
            })?;
        let scene = self.frame_count / 50;
        Ok((0..byte_count)
            .map(|i| ((i as u64 + self.frame_count + scene) % 256) as u8)
            .collect())
    }
}

impl VideoSource for SyntheticSource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!("source: connected to {} (synthetic)", self.identifier);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected {
            return Err(anyhow!("synthetic source {} is not connected", self.identifier));
        }
        if self.frame_count >= self.config.frames {
            return Ok(None);
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels()?;
        Frame::new(pixels, self.config.width, self.config.height).map(Some)
    }

    fn release(&mut self) {
        if self.connected {
            log::debug!("source: released {}", self.identifier);
        }
        self.connected = false;
    }

    fn info(&self) -> VideoInfo {
        VideoInfo {
            fps: (self.config.fps > 0.0).then_some(self.config.fps),
            width: self.config.width,
            height: self.config.height,
        }
    }
}
