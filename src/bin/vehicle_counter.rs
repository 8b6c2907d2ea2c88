//! vehicle_counter - count vehicles in a video and record totals per interval
//!
//! Configuration layers, lowest first: built-in defaults, the config file
//! (`--config` / `VEHICLE_COUNTER_CONFIG`), `VEHICLE_COUNTER_*` environment variables,
//! then command-line flags.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use vehicle_counter::config::parse_target_fps;
use vehicle_counter::ui::{Console, UiMode};
use vehicle_counter::{
    open_detector, open_source, CancelToken, ClockKind, ConsoleObserver, CounterConfig, CsvSink,
    Pipeline, Taxonomy,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON or TOML config file.
    #[arg(long, env = "VEHICLE_COUNTER_CONFIG")]
    config: Option<PathBuf>,
    /// Video file path or capture device index.
    #[arg(long)]
    source: Option<String>,
    /// Detector model location (`stub://<name>` for the built-in stub).
    #[arg(long)]
    model: Option<String>,
    /// Target processing rate in frames per second, or `all`.
    #[arg(long)]
    target_fps: Option<String>,
    /// Seconds between recorded rows.
    #[arg(long)]
    interval: Option<f64>,
    /// Minimum detection confidence to count (0..=1).
    #[arg(long)]
    confidence: Option<f32>,
    /// CSV output path.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Comma-separated category labels, in column order.
    #[arg(long, value_delimiter = ',')]
    categories: Option<Vec<String>>,
    /// Time base for intervals: `wall` or `stream`.
    #[arg(long)]
    clock: Option<String>,
    /// Console style: auto, plain or pretty.
    #[arg(long)]
    ui: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = resolve_config(&args)?;
    let console = Console::detect(UiMode::parse(args.ui.as_deref()));
    console.banner(&config);

    let detector = {
        let _stage = console.stage("Loading model");
        open_detector(&config.detector)?
    };
    println!(
        "Model loaded successfully! Classes: {}",
        config.detector.class_names.len()
    );

    let sink = {
        let _stage = console.stage("Preparing output");
        CsvSink::initialize(&config.output, &config.taxonomy)?
    };
    let source = open_source(&config.source);

    let cancel = CancelToken::new();
    cancel.install_ctrlc_handler()?;
    println!("\nPress Ctrl-C to stop\n");

    let mut pipeline = Pipeline::new(&config, source, detector, sink);
    let mut observer = ConsoleObserver;
    match pipeline.run(&cancel, &mut observer) {
        Ok(report) => {
            log::info!(
                "vehicle_counter finished: {} frames read, {} records written to {}",
                report.frames_read,
                report.flushes,
                report.destination
            );
            Ok(())
        }
        Err(err) => {
            log::error!("vehicle_counter aborted: {err:#}");
            Err(err)
        }
    }
}

fn resolve_config(args: &Args) -> Result<CounterConfig> {
    let mut config = CounterConfig::load_with(args.config.as_deref())?;
    if let Some(source) = &args.source {
        config.source = source.clone();
    }
    if let Some(model) = &args.model {
        config.detector.model_path = model.clone();
    }
    if let Some(target) = &args.target_fps {
        config.target_fps = parse_target_fps(target)?;
    }
    if let Some(interval) = args.interval {
        if !interval.is_finite() || interval <= 0.0 {
            anyhow::bail!("--interval must be a positive number of seconds");
        }
        config.flush_interval = Duration::from_secs_f64(interval);
    }
    if let Some(confidence) = args.confidence {
        config.set_confidence_threshold(confidence);
    }
    if let Some(output) = &args.output {
        config.output = output.clone();
    }
    if let Some(categories) = &args.categories {
        config.set_taxonomy(Taxonomy::from_labels(categories.as_slice())?);
    }
    if let Some(clock) = &args.clock {
        config.clock = ClockKind::parse(clock)
            .ok_or_else(|| anyhow::anyhow!("--clock must be 'wall' or 'stream'"))?;
    }
    config.validate()?;
    Ok(config)
}
