//! demo - end-to-end synthetic run of the vehicle counter
//!
//! Feeds a generated `stub://` stream through the stub detector with the stream clock,
//! so the run needs no model or video file and its intervals follow frame time.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use vehicle_counter::ui::{Console, UiMode};
use vehicle_counter::{
    open_detector, CancelToken, ClockKind, ConsoleObserver, CounterConfig, CsvSink,
    DetectorSettings, Pipeline, SyntheticSource,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Length of the synthetic video in seconds.
    #[arg(long, default_value_t = 20)]
    seconds: u64,
    /// Nominal frame rate of the synthetic video.
    #[arg(long, default_value_t = 30)]
    fps: u32,
    /// Target processing rate.
    #[arg(long, default_value_t = 15.0)]
    target_fps: f64,
    /// Seconds between recorded rows.
    #[arg(long, default_value_t = 5.0)]
    interval: f64,
    /// CSV output path.
    #[arg(long, default_value = "demo_out/vehicle_counts.csv")]
    out: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }
    if !args.interval.is_finite() || args.interval <= 0.0 {
        return Err(anyhow!("interval must be a positive number of seconds"));
    }

    let frames = args.seconds * u64::from(args.fps);
    let source_id = format!(
        "stub://demo?frames={}&fps={}&width=160&height=120",
        frames, args.fps
    );

    let defaults = CounterConfig::default();
    let mut config = CounterConfig {
        source: source_id.clone(),
        target_fps: Some(args.target_fps),
        flush_interval: Duration::from_secs_f64(args.interval),
        output: args.out.clone(),
        clock: ClockKind::Stream,
        detector: DetectorSettings {
            model_path: "stub://demo".to_string(),
            ..defaults.detector.clone()
        },
        ..defaults
    };
    config.validate()?;

    let console = Console::detect(UiMode::Auto);
    console.banner(&config);

    let detector = open_detector(&config.detector)?;
    let sink = {
        let _stage = console.stage("Preparing output");
        CsvSink::initialize(&config.output, &config.taxonomy)?
    };
    let source = SyntheticSource::new(&source_id)?;

    let cancel = CancelToken::new();
    cancel.install_ctrlc_handler()?;

    let mut pipeline = Pipeline::new(&config, source, detector, sink);
    let report = pipeline.run(&cancel, &mut ConsoleObserver)?;

    println!("demo complete:");
    println!("  frames read: {}", report.frames_read);
    println!("  frames processed: {}", report.frames_processed);
    println!("  records written: {}", report.flushes);
    println!("  output: {}", pipeline.sink().path().display());
    Ok(())
}
