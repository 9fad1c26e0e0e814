//! Process-level driver: flag handling, the repeat loop, shuffling, listing
//! and the final exit code.

use crate::context::fatal;
use crate::filter::PatternFilter;
use crate::hooks::{Hooks, NoHooks};
use crate::options::{Cli, Repeat, RunOptions};
use crate::random::{seed_from_time, shuffle, Lcg};
use crate::registry::Registry;
use crate::report::{write_json_report, Counters, Reporter, RunSummary, REPORT_SCHEMA_VERSION};
use crate::runner::Runner;
use crate::HarnessError;
use clap::Parser;
use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use tracing_subscriber::{fmt, EnvFilter};

pub struct Harness {
  registry: Registry,
  hooks: Box<dyn Hooks>,
  reporter: Arc<Reporter>,
}

impl Harness {
  pub fn new(registry: Registry) -> Self {
    Self {
      registry,
      hooks: Box::new(NoHooks),
      reporter: Arc::new(Reporter::stdout()),
    }
  }

  pub fn with_hooks(mut self, hooks: impl Hooks + 'static) -> Self {
    self.hooks = Box::new(hooks);
    self
  }

  /// Sends the human-readable report somewhere other than stdout.
  pub fn with_output(mut self, writer: impl Write + Send + 'static) -> Self {
    self.reporter = Arc::new(Reporter::new(writer));
    self
  }

  pub fn registry(&self) -> &Registry {
    &self.registry
  }

  /// Prints the cases accepted by `filter`, grouped by suite in name order.
  /// Parameterized cases list one line per value with the value rendered in
  /// a column aligned across the suite.
  pub fn list_tests(&self, filter: &PatternFilter) {
    let mut groups: Vec<(&str, Vec<(String, Option<&str>)>)> = Vec::new();
    for key in self.registry.sorted() {
      let case = self.registry.case(key.case);
      if !filter.matches(&case.full_name(key.param)) {
        continue;
      }
      let (label, value) = match (key.param, case.params()) {
        (Some(index), Some(params)) => (
          format!("{}/{index}", case.name()),
          params.rendered.get(index).map(String::as_str),
        ),
        _ => (case.name().to_string(), None),
      };
      match groups.last_mut() {
        Some((suite, entries)) if *suite == case.suite() => entries.push((label, value)),
        _ => groups.push((case.suite(), vec![(label, value)])),
      }
    }

    for (suite, entries) in &groups {
      self.reporter.line(format_args!("{suite}."));
      let width = entries
        .iter()
        .filter(|(_, value)| value.is_some())
        .map(|(label, _)| label.len())
        .max()
        .unwrap_or(0);
      for (label, value) in entries {
        match value {
          Some(value) => self
            .reporter
            .line(format_args!("  {label:<width$}  # {value}")),
          None => self.reporter.line(format_args!("  {label}")),
        }
      }
    }
    self.reporter.flush();
  }

  /// Runs the selected cases as many times as `options.repeat` asks.
  ///
  /// With [`Repeat::Forever`] this only returns if the process is stopped
  /// from outside, and per-iteration results are not retained.
  pub fn run(&mut self, options: &RunOptions) -> RunSummary {
    let main_thread = thread::current().id();
    let seed = options
      .shuffle
      .then(|| options.random_seed.unwrap_or_else(seed_from_time));
    let mut rng = seed.map(Lcg::new);
    if let Some(seed) = seed {
      self.reporter.line(format_args!(
        "Note: Randomizing tests' orders with a seed of {seed} ."
      ));
    }
    tracing::info!(
      cases = self.registry.len(),
      repeat = ?options.repeat,
      seed = ?seed,
      "starting run"
    );

    let mut summary = RunSummary {
      schema_version: REPORT_SCHEMA_VERSION,
      seed,
      ..RunSummary::default()
    };
    let mut last = Counters::default();

    self.hooks.before_all_tests();
    let mut iteration: u64 = 0;
    loop {
      if let Repeat::Times(times) = options.repeat {
        if iteration >= times {
          break;
        }
      }
      if options.repeat != Repeat::Times(1) {
        self.reporter.blank();
        self.reporter.line(format_args!(
          "Repeating all tests (iteration {}) . . .",
          iteration + 1
        ));
        self.reporter.blank();
      }
      if let Some(rng) = rng.as_mut() {
        shuffle(self.registry.order_mut(), rng);
      }

      let report = Runner::new(
        &self.registry,
        options,
        self.hooks.as_mut(),
        &self.reporter,
        main_thread,
        iteration,
      )
      .run_iteration();

      summary.total_failed = summary.total_failed.saturating_add(report.counters.failed);
      last = report.counters;
      if options.repeat != Repeat::Forever {
        summary.iterations.push(report);
      }
      iteration += 1;
    }
    self.hooks.after_all_tests(&last);

    summary
  }

  /// Lists or runs according to `options` and writes the JSON report if one
  /// was requested.
  pub fn execute(&mut self, options: &RunOptions) -> Result<RunSummary, HarnessError> {
    if options.list_tests {
      self.list_tests(&options.filter);
      return Ok(RunSummary {
        schema_version: REPORT_SCHEMA_VERSION,
        ..RunSummary::default()
      });
    }

    let summary = self.run(options);
    if let Some(path) = &options.json_report {
      write_json_report(path, &summary)?;
      tracing::debug!(path = %path.display(), "wrote JSON report");
    }
    Ok(summary)
  }
}

/// Entry point for a test binary: parses the process arguments, lets `build`
/// register the cases, runs them and maps the failed count to the exit code.
pub fn harness_main<F, E>(build: F) -> ExitCode
where
  F: FnOnce(&mut Registry) -> Result<(), E>,
  E: std::fmt::Display,
{
  harness_main_from(std::env::args_os(), build)
}

pub fn harness_main_from<I, T, F, E>(args: I, build: F) -> ExitCode
where
  I: IntoIterator<Item = T>,
  T: Into<OsString> + Clone,
  F: FnOnce(&mut Registry) -> Result<(), E>,
  E: std::fmt::Display,
{
  let cli = match Cli::try_parse_from(args) {
    Ok(cli) => cli,
    Err(err) => {
      let _ = err.print();
      // `--help` lands here too and is not an error.
      return if err.use_stderr() {
        ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(2))
      } else {
        ExitCode::SUCCESS
      };
    }
  };
  init_tracing(cli.trace);
  let options = RunOptions::from(cli);

  let mut registry = Registry::new();
  if let Err(err) = build(&mut registry) {
    fatal(format_args!("{err:#}"));
  }

  let mut harness = Harness::new(registry);
  match harness.execute(&options) {
    Ok(summary) => failed_exit_code(summary.total_failed),
    Err(err) => print_error(err),
  }
}

fn failed_exit_code(failed: usize) -> ExitCode {
  ExitCode::from(exit_status(failed))
}

fn exit_status(failed: usize) -> u8 {
  u8::try_from(failed).unwrap_or(u8::MAX)
}

fn print_error(err: impl std::fmt::Display) -> ExitCode {
  eprintln!("error: {err}");
  ExitCode::from(1)
}

fn init_tracing(enable: bool) {
  if !enable {
    return;
  }

  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = fmt()
    .with_env_filter(env_filter)
    .with_writer(std::io::stderr);
  if let Err(err) = builder.try_init() {
    eprintln!("failed to install tracing subscriber: {err}");
  }
}
