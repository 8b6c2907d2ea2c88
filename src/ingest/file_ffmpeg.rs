//! FFmpeg-backed decoding for local files and capture devices.
//!
//! The input is opened in `connect`, so an unreadable file or missing device surfaces
//! as a connect failure. Frames are converted to RGB24 in memory.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;

use super::{VideoInfo, VideoSource};
use crate::frame::Frame;

pub(crate) struct FfmpegSource {
    path: String,
    state: Option<DecodeState>,
    info: VideoInfo,
    frame_count: u64,
}

struct DecodeState {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    draining: bool,
}

impl FfmpegSource {
    pub(crate) fn new(path: String) -> Self {
        Self {
            path,
            state: None,
            info: VideoInfo::default(),
            frame_count: 0,
        }
    }

    fn open_input(&self) -> Result<ffmpeg::format::context::Input> {
        if self.path.starts_with("/dev/video") {
            ffmpeg::device::register_all();
            let format = ffmpeg::device::input::video()
                .find(|f| f.name().split(',').any(|n| n == "video4linux2" || n == "v4l2"))
                .ok_or_else(|| anyhow!("ffmpeg was built without video4linux2 input"))?;
            let context = ffmpeg::format::open_with(
                &self.path,
                &ffmpeg::format::Format::Input(format),
                ffmpeg::Dictionary::new(),
            )
            .with_context(|| format!("failed to open capture device '{}'", self.path))?;
            Ok(context.input())
        } else {
            ffmpeg::format::input(&self.path)
                .with_context(|| format!("failed to open file input '{}' with ffmpeg", self.path))
        }
    }
}

impl VideoSource for FfmpegSource {
    fn identifier(&self) -> &str {
        &self.path
    }

    fn connect(&mut self) -> Result<()> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = self.open_input()?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("'{}' has no video track", self.path))?;
        let stream_index = input_stream.index();
        let rate = input_stream.avg_frame_rate();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        let fps = if rate.denominator() != 0 {
            Some(f64::from(rate)).filter(|fps| fps.is_finite() && *fps > 0.0)
        } else {
            None
        };
        self.info = VideoInfo {
            fps,
            width: decoder.width(),
            height: decoder.height(),
        };
        self.state = Some(DecodeState {
            input,
            stream_index,
            decoder,
            scaler,
            draining: false,
        });
        log::info!("source: connected to {} (ffmpeg)", self.path);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| anyhow!("ffmpeg source {} is not connected", self.path))?;

        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if state.decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb_frame = ffmpeg::frame::Video::empty();
                state
                    .scaler
                    .run(&decoded, &mut rgb_frame)
                    .context("scale frame to RGB")?;
                let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
                self.frame_count += 1;
                return Frame::new(pixels, width, height).map(Some);
            }
            if state.draining {
                return Ok(None);
            }

            let stream_index = state.stream_index;
            let packet = state
                .input
                .packets()
                .find(|(stream, _)| stream.index() == stream_index)
                .map(|(_, packet)| packet);
            match packet {
                Some(packet) => state
                    .decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?,
                None => {
                    state.decoder.send_eof().context("flush ffmpeg decoder")?;
                    state.draining = true;
                }
            }
        }
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::debug!(
                "source: released {} after {} frames",
                self.path,
                self.frame_count
            );
        }
    }

    fn info(&self) -> VideoInfo {
        self.info
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let packed = data
            .get(..row_bytes * height as usize)
            .context("ffmpeg frame is shorter than its dimensions")?;
        return Ok((packed.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(
            data.get(start..start + row_bytes)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }
    Ok((pixels, width, height))
}
