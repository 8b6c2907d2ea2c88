//! Append-only persistence of window summaries.
//!
//! `CsvSink` writes one header row when it creates the destination and one row per
//! summary after that. Existing files are never truncated or re-headed, so the same
//! destination accumulates records across runs.

use anyhow::{anyhow, Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::aggregate::WindowSummary;
use crate::taxonomy::Taxonomy;

/// Default destination file.
pub const DEFAULT_OUTPUT_PATH: &str = "vehicle_counts.csv";

/// Durable destination for window summaries.
pub trait SummarySink {
    /// Persist one summary. Must be durable before returning.
    fn append(&mut self, summary: &WindowSummary) -> Result<()>;

    /// Human-readable destination, used in session reports.
    fn destination(&self) -> String;
}

impl<S: SummarySink + ?Sized> SummarySink for Box<S> {
    fn append(&mut self, summary: &WindowSummary) -> Result<()> {
        (**self).append(summary)
    }

    fn destination(&self) -> String {
        (**self).destination()
    }
}

/// CSV file sink.
#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
    columns: usize,
}

impl CsvSink {
    /// Open `path` for appending, creating it with a header row if it does not exist.
    ///
    /// Calling this again on the same path is a no-op apart from validation.
    pub fn initialize<P: AsRef<Path>>(path: P, taxonomy: &Taxonomy) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let header = header_line(taxonomy);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {}", parent.display()))?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(header.as_bytes())
                    .with_context(|| format!("writing header to {}", path.display()))?;
                file.sync_all()?;
                log::info!("created {} with header", path.display());
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                prepare_existing(&path, &header)?;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("opening output {}", path.display()));
            }
        }

        Ok(Self {
            path,
            columns: taxonomy.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SummarySink for CsvSink {
    fn append(&mut self, summary: &WindowSummary) -> Result<()> {
        if summary.counts.counts().len() != self.columns {
            return Err(anyhow!(
                "summary has {} category counts, destination expects {}",
                summary.counts.counts().len(),
                self.columns
            ));
        }
        let record = format_record(summary);
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {} for append", self.path.display()))?;
        // One write per record keeps rows whole under O_APPEND.
        file.write_all(record.as_bytes())
            .with_context(|| format!("appending record to {}", self.path.display()))?;
        file.sync_data()
            .with_context(|| format!("syncing {}", self.path.display()))?;
        Ok(())
    }

    fn destination(&self) -> String {
        self.path.display().to_string()
    }
}

/// Header row, newline-terminated.
pub fn header_line(taxonomy: &Taxonomy) -> String {
    let mut line = taxonomy.header().join(",");
    line.push('\n');
    line
}

/// One data row, newline-terminated.
pub fn format_record(summary: &WindowSummary) -> String {
    let mut fields = Vec::with_capacity(3 + summary.counts.counts().len());
    fields.push(summary.timestamp_string());
    fields.push(format!("{:.2}", summary.elapsed_secs()));
    fields.push(summary.total().to_string());
    fields.extend(summary.counts.counts().iter().map(|c| c.to_string()));
    let mut line = fields.join(",");
    line.push('\n');
    line
}

/// Make an existing destination safe to append to.
///
/// An empty file gets its header. A file whose last row was cut short gets a line
/// break so the next record starts on its own row.
fn prepare_existing(path: &Path, header: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening existing output {}", path.display()))?;
    let len = file.metadata()?.len();

    if len == 0 {
        file.write_all(header.as_bytes())
            .with_context(|| format!("writing header to {}", path.display()))?;
        file.sync_all()?;
        log::info!("wrote header to empty {}", path.display());
        return Ok(());
    }

    let mut first_line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut first_line)?;
    if first_line.trim_end() != header.trim_end() {
        log::warn!(
            "{} has a different header ({}); appending with current columns ({})",
            path.display(),
            first_line.trim_end(),
            header.trim_end()
        );
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        log::warn!(
            "{} ends with an incomplete row; starting a new line",
            path.display()
        );
        file.write_all(b"\n")?;
        file.sync_data()?;
    }
    Ok(())
}

/// In-memory sink, for tests and dry runs.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    records: Vec<WindowSummary>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[WindowSummary] {
        &self.records
    }
}

impl SummarySink for MemorySink {
    fn append(&mut self, summary: &WindowSummary) -> Result<()> {
        self.records.push(summary.clone());
        Ok(())
    }

    fn destination(&self) -> String {
        "memory".to_string()
    }
}
