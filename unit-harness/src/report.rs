use crate::HarnessError;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Line-oriented sink for the human-readable report.
///
/// Assertions may write through it from any thread before the process is
/// torn down, so the writer sits behind a mutex.
pub struct Reporter {
  out: Mutex<Box<dyn Write + Send>>,
}

impl Reporter {
  pub fn new(writer: impl Write + Send + 'static) -> Self {
    Self {
      out: Mutex::new(Box::new(writer)),
    }
  }

  pub fn stdout() -> Self {
    Self::new(io::stdout())
  }

  pub fn line(&self, args: fmt::Arguments<'_>) {
    let mut out = self.out.lock();
    // A closed stdout must not turn into a test failure.
    let _ = out.write_fmt(args);
    let _ = out.write_all(b"\n");
  }

  pub fn blank(&self) {
    let _ = self.out.lock().write_all(b"\n");
  }

  pub fn flush(&self) {
    let _ = self.out.lock().flush();
  }
}

impl fmt::Debug for Reporter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Reporter").finish_non_exhaustive()
  }
}

/// Cloneable in-memory writer, handy for capturing a run's output.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn contents(&self) -> String {
    String::from_utf8_lossy(&self.0.lock()).into_owned()
  }
}

impl Write for SharedBuffer {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.lock().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
  Passed,
  Failed,
  Skipped,
}

impl fmt::Display for Outcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let value = match self {
      Outcome::Passed => "passed",
      Outcome::Failed => "failed",
      Outcome::Skipped => "skipped",
    };
    f.write_str(value)
  }
}

/// Per-iteration counters. Every virtual case that passed the pattern filter
/// counts once in `total`; disabled ones land in `disabled` and never run.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct Counters {
  pub total: usize,
  pub disabled: usize,
  pub success: usize,
  pub skipped: usize,
  pub failed: usize,
}

impl Counters {
  pub fn ran(&self) -> usize {
    self.success + self.skipped + self.failed
  }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CaseResult {
  pub name: String,
  pub outcome: Outcome,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub duration_ms: Option<u128>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct IterationReport {
  pub iteration: u64,
  pub counters: Counters,
  pub elapsed_ms: u128,
  pub results: Vec<CaseResult>,
}

impl IterationReport {
  pub fn failed_names(&self) -> impl Iterator<Item = &str> + '_ {
    self
      .results
      .iter()
      .filter(|result| result.outcome == Outcome::Failed)
      .map(|result| result.name.as_str())
  }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RunSummary {
  pub schema_version: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub seed: Option<u64>,
  pub total_failed: usize,
  pub iterations: Vec<IterationReport>,
}

pub(crate) fn plural(count: usize) -> String {
  match count {
    1 => "1 test".to_string(),
    n => format!("{n} tests"),
  }
}

pub(crate) fn print_banner(reporter: &Reporter, report: &IterationReport, print_time: bool) {
  let counters = &report.counters;
  if print_time {
    reporter.line(format_args!(
      "[==========] {} ran. ({} ms total)",
      plural(counters.ran()),
      report.elapsed_ms
    ));
  } else {
    reporter.line(format_args!("[==========] {} ran.", plural(counters.ran())));
  }
  reporter.line(format_args!("[  PASSED  ] {}.", plural(counters.success)));
  if counters.skipped > 0 {
    reporter.line(format_args!("[   SKIP   ] {}.", plural(counters.skipped)));
  }
  if counters.disabled > 0 {
    reporter.line(format_args!("[ DISABLED ] {}.", plural(counters.disabled)));
  }
  if counters.failed > 0 {
    reporter.line(format_args!(
      "[  FAILED  ] {}, listed below:",
      plural(counters.failed)
    ));
    for name in report.failed_names() {
      reporter.line(format_args!("[  FAILED  ] {name}"));
    }
  }
  reporter.flush();
}

/// Write a pretty, deterministic JSON report to `path`, creating parent
/// directories as needed.
pub fn write_json_report<T: Serialize>(path: &Path, report: &T) -> Result<(), HarnessError> {
  let report_err = |source: io::Error| HarnessError::Report {
    path: path.to_path_buf(),
    source,
  };

  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    fs::create_dir_all(parent).map_err(report_err)?;
  }

  let file = fs::File::create(path).map_err(report_err)?;
  let mut writer = BufWriter::new(file);
  serde_json::to_writer_pretty(&mut writer, report)
    .map_err(|err| report_err(io::Error::from(err)))?;
  writeln!(writer).map_err(report_err)?;
  writer.flush().map_err(report_err)
}
