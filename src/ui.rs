//! Operator-facing console output: the startup banner and setup stage spinners.
//!
//! Spinners are drawn only on a terminal; otherwise each stage prints a plain line.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;
use std::time::{Duration, Instant};

use crate::config::CounterConfig;

const RULE_WIDTH: usize = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn parse(flag: Option<&str>) -> Self {
        match flag {
            Some("plain") => Self::Plain,
            Some("pretty") => Self::Pretty,
            _ => Self::Auto,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Console {
    mode: UiMode,
    is_tty: bool,
}

impl Console {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    /// Console for the current process, probing stderr for a terminal.
    pub fn detect(mode: UiMode) -> Self {
        Self::new(mode, std::io::stderr().is_terminal())
    }

    fn pretty(&self) -> bool {
        match self.mode {
            UiMode::Pretty => true,
            UiMode::Auto => self.is_tty,
            UiMode::Plain => false,
        }
    }

    /// Print the startup banner describing the run.
    pub fn banner(&self, config: &CounterConfig) {
        println!("{}", rule());
        println!("VEHICLE COUNTER");
        println!("{}", rule());
        for line in banner_lines(config) {
            println!("{line}");
        }
        println!("{}", rule());
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }
}

pub fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn banner_lines(config: &CounterConfig) -> Vec<String> {
    let target = match config.target_fps {
        Some(fps) => format!("{fps} fps"),
        None => "every frame".to_string(),
    };
    vec![
        format!("Model: {}", config.detector.model_path),
        format!("Video source: {}", config.source),
        format!("Target processing: {}", target),
        format!(
            "Record interval: {:.1} seconds",
            config.flush_interval.as_secs_f64()
        ),
        format!("Confidence threshold: {}", config.confidence_threshold),
        format!("Output file: {}", config.output.display()),
        format!(
            "Categories: {}",
            config.taxonomy.labels().collect::<Vec<_>>().join(", ")
        ),
    ]
}

/// Marks a setup stage finished, with its duration, when dropped.
pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let message = format!("✔ {} ({})", self.name, format_duration(self.start.elapsed()));
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

pub fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
