use crate::compare::Precision;
use crate::filter::PatternFilter;
use clap::Parser;
use std::path::PathBuf;

/// Command-line flags understood by every test binary built on the harness.
#[derive(Debug, Clone, Parser)]
#[command(
  about = "Run the unit tests compiled into this binary",
  disable_version_flag = true
)]
pub struct Cli {
  /// List the selected tests instead of running them.
  #[arg(long = "list_tests")]
  pub list_tests: bool,

  /// `:`-separated glob patterns; a pattern starting with `-` excludes.
  #[arg(long = "filter", value_name = "PATTERNS", allow_hyphen_values = true)]
  pub filter: Option<String>,

  /// Run tests whose name starts with `DISABLED_` too.
  #[arg(long = "also_run_disabled_tests")]
  pub also_run_disabled_tests: bool,

  /// Number of iterations; negative repeats forever.
  #[arg(
    long = "repeat",
    value_name = "N",
    default_value_t = 1,
    allow_negative_numbers = true
  )]
  pub repeat: i64,

  /// Randomize the order of the tests on each iteration.
  #[arg(long = "shuffle")]
  pub shuffle: bool,

  /// Seed for `--shuffle`; derived from the clock when absent.
  #[arg(long = "random_seed", value_name = "N")]
  pub random_seed: Option<u64>,

  /// Print the elapsed time of each test.
  #[arg(
    long = "print_time",
    value_name = "0|1",
    default_value_t = 1,
    num_args = 0..=1,
    default_missing_value = "1",
    value_parser = clap::value_parser!(u8).range(0..=1)
  )]
  pub print_time: u8,

  /// Trap into the debugger when a check fails.
  #[arg(long = "break_on_failure")]
  pub break_on_failure: bool,

  /// Also write the results as JSON to this path.
  #[arg(long = "json_report", value_name = "PATH")]
  pub json_report: Option<PathBuf>,

  /// Emit tracing events to stderr (filtered by `RUST_LOG`).
  #[arg(long)]
  pub trace: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
  Times(u64),
  Forever,
}

impl Repeat {
  pub fn from_count(count: i64) -> Self {
    match u64::try_from(count) {
      Ok(times) => Repeat::Times(times),
      Err(_) => Repeat::Forever,
    }
  }
}

/// Validated run configuration.
#[derive(Debug, Clone)]
pub struct RunOptions {
  pub list_tests: bool,
  pub filter: PatternFilter,
  pub also_run_disabled: bool,
  pub repeat: Repeat,
  pub shuffle: bool,
  pub random_seed: Option<u64>,
  pub print_time: bool,
  pub break_on_failure: bool,
  pub precision: Precision,
  pub json_report: Option<PathBuf>,
  pub trace: bool,
}

impl Default for RunOptions {
  fn default() -> Self {
    Self {
      list_tests: false,
      filter: PatternFilter::all(),
      also_run_disabled: false,
      repeat: Repeat::Times(1),
      shuffle: false,
      random_seed: None,
      print_time: true,
      break_on_failure: false,
      precision: Precision::default(),
      json_report: None,
      trace: false,
    }
  }
}

impl From<Cli> for RunOptions {
  fn from(cli: Cli) -> Self {
    let filter = match cli.filter.as_deref() {
      Some(raw) => PatternFilter::parse(raw),
      None => PatternFilter::all(),
    };
    Self {
      list_tests: cli.list_tests,
      filter,
      also_run_disabled: cli.also_run_disabled_tests,
      repeat: Repeat::from_count(cli.repeat),
      shuffle: cli.shuffle,
      random_seed: cli.random_seed,
      print_time: cli.print_time != 0,
      break_on_failure: cli.break_on_failure,
      precision: Precision::default(),
      json_report: cli.json_report,
      trace: cli.trace,
    }
  }
}
