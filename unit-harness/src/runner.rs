//! The per-iteration run loop and the stage dispatcher for a single case.

use crate::context::{fatal, Signal, Stage, TestContext};
use crate::filter::is_disabled;
use crate::hooks::{CaseInfo, Hooks};
use crate::options::RunOptions;
use crate::registry::{CaseId, Registry, TestCase, TestKind};
use crate::report::{print_banner, CaseResult, IterationReport, Outcome, Reporter};
use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
  Passed,
  Failed,
  Skipped,
}

/// A case selected for this iteration together with the parameter indices
/// (or `[None]`) that passed the pattern filter.
#[derive(Debug, Clone)]
struct Planned {
  case: CaseId,
  units: Vec<Option<usize>>,
}

pub(crate) struct Runner<'a> {
  registry: &'a Registry,
  options: &'a RunOptions,
  hooks: &'a mut dyn Hooks,
  reporter: &'a Arc<Reporter>,
  main_thread: ThreadId,
  report: IterationReport,
}

impl<'a> Runner<'a> {
  pub(crate) fn new(
    registry: &'a Registry,
    options: &'a RunOptions,
    hooks: &'a mut dyn Hooks,
    reporter: &'a Arc<Reporter>,
    main_thread: ThreadId,
    iteration: u64,
  ) -> Self {
    Self {
      registry,
      options,
      hooks,
      reporter,
      main_thread,
      report: IterationReport {
        iteration,
        ..IterationReport::default()
      },
    }
  }

  /// Walks the registration list once, running every selected case.
  pub(crate) fn run_iteration(mut self) -> IterationReport {
    let started = Instant::now();
    let plan = self.plan();
    let runnable: usize = plan.iter().map(|planned| planned.units.len()).sum();
    self.reporter.line(format_args!(
      "[==========] Running {}.",
      crate::report::plural(runnable)
    ));

    let registry = self.registry;
    for planned in &plan {
      self.run_case(registry.case(planned.case), &planned.units);
    }

    self.report.elapsed_ms = started.elapsed().as_millis();
    print_banner(self.reporter, &self.report, self.options.print_time);
    tracing::info!(
      iteration = self.report.iteration,
      passed = self.report.counters.success,
      failed = self.report.counters.failed,
      skipped = self.report.counters.skipped,
      "iteration finished"
    );
    self.report
  }

  /// Applies the pattern filter and the disabled rule in registration order.
  /// The first entry of a parameterized case schedules all of its selected
  /// indices; the case's later entries are then passed over.
  fn plan(&mut self) -> Vec<Planned> {
    let order = self.registry.order();
    let mut seen = HashSet::new();
    let mut plan = Vec::new();

    for entry in order.values() {
      if !seen.insert(entry.case) {
        continue;
      }
      let case = self.registry.case(entry.case);
      let units: Vec<Option<usize>> = match case.params() {
        None => vec![None],
        Some(params) => (0..params.len()).map(Some).collect(),
      };
      let units: Vec<Option<usize>> = units
        .into_iter()
        .filter(|unit| self.options.filter.matches(&case.full_name(*unit)))
        .collect();
      if units.is_empty() {
        continue;
      }

      self.report.counters.total += units.len();
      if is_disabled(case.name()) && !self.options.also_run_disabled {
        tracing::debug!(case = %case.full_name(None), "skipping disabled case");
        self.report.counters.disabled += units.len();
        continue;
      }

      plan.push(Planned {
        case: entry.case,
        units,
      });
    }

    plan
  }

  fn run_case(&mut self, case: &TestCase, units: &[Option<usize>]) {
    let Some((&first, rest)) = units.split_first() else {
      return;
    };
    let info = CaseInfo {
      suite: case.suite(),
      name: case.name(),
      kind: case.kind(),
    };
    let has_fixture = case.kind() != TestKind::Simple;
    let t = TestContext::new(
      case.full_name(None),
      self.main_thread,
      self.options.break_on_failure,
      self.options.precision,
      Arc::clone(self.reporter),
    );
    let mut instance = case.instantiate();

    // Idle -> Setup
    self.announce(case, first);
    t.enter(Stage::Setup);
    let mut setup = Verdict::Passed;
    if has_fixture {
      self.hooks.before_setup(&info);
      setup = guard(&t, || instance.set_up(&t));
      self.hooks.after_setup(&info, setup == Verdict::Passed);
    }
    if setup == Verdict::Passed && t.take_skip() {
      setup = Verdict::Skipped;
    }

    // Verdicts are held back until Teardown has finished.
    let mut verdicts: Vec<(Option<usize>, Verdict, Option<Duration>)> =
      Vec::with_capacity(units.len());
    if setup == Verdict::Passed {
      // Setup -> Run
      t.enter(Stage::Run);
      for (position, &unit) in units.iter().enumerate() {
        if position > 0 {
          self.announce(case, unit);
        }
        t.set_param(unit);
        self.hooks.before_test(&info, unit);
        let started = Instant::now();
        let verdict = guard(&t, || instance.run(&t, unit));
        let elapsed = started.elapsed();
        self.hooks.after_test(&info, unit, verdict == Verdict::Passed);
        verdicts.push((unit, verdict, Some(elapsed)));

        if verdict != Verdict::Passed {
          let dropped = &units[position + 1..];
          if !dropped.is_empty() {
            tracing::warn!(
              case = %case.full_name(None),
              remaining = dropped.len(),
              "parameter loop aborted by failure"
            );
          }
          for &unit in dropped {
            self.announce(case, unit);
            verdicts.push((unit, Verdict::Skipped, None));
          }
          break;
        }
      }
      t.set_param(None);
    } else {
      verdicts.push((first, setup, None));
      for &unit in rest {
        self.announce(case, unit);
        verdicts.push((unit, setup, None));
      }
    }

    // Run -> Teardown
    t.enter(Stage::Teardown);
    if has_fixture {
      self.hooks.before_teardown(&info);
      let teardown = guard(&t, || instance.tear_down(&t));
      self.hooks.after_teardown(&info);
      if teardown != Verdict::Passed {
        fatal(format_args!(
          "teardown of {} must not fail",
          case.full_name(None)
        ));
      }
    }

    // Teardown -> Done
    for (unit, verdict, elapsed) in verdicts {
      self.record(case, unit, verdict, elapsed);
    }
    t.enter(Stage::Done);
  }

  fn announce(&self, case: &TestCase, unit: Option<usize>) {
    self
      .reporter
      .line(format_args!("[ RUN      ] {}", case.full_name(unit)));
  }

  fn record(
    &mut self,
    case: &TestCase,
    unit: Option<usize>,
    verdict: Verdict,
    elapsed: Option<Duration>,
  ) {
    let name = case.full_name(unit);
    let counters = &mut self.report.counters;
    let outcome = match verdict {
      Verdict::Passed => {
        counters.success += 1;
        match elapsed.filter(|_| self.options.print_time) {
          Some(elapsed) => self.reporter.line(format_args!(
            "[       OK ] {name} ({} ms)",
            elapsed.as_millis()
          )),
          None => self.reporter.line(format_args!("[       OK ] {name}")),
        }
        Outcome::Passed
      }
      Verdict::Failed => {
        counters.failed += 1;
        self.reporter.line(format_args!("[  FAILED  ] {name}"));
        Outcome::Failed
      }
      Verdict::Skipped => {
        counters.skipped += 1;
        self.reporter.line(format_args!("[   SKIP   ] {name}"));
        Outcome::Skipped
      }
    };
    self.reporter.flush();

    self.report.results.push(CaseResult {
      name,
      outcome,
      duration_ms: elapsed.map(|elapsed| elapsed.as_millis()),
    });
  }
}

/// Runs one stage, turning an unwind into a verdict. Failures raised by the
/// checks carry a [`Signal`]; any other panic counts as a failure too.
fn guard(t: &TestContext, stage: impl FnOnce()) -> Verdict {
  match panic::catch_unwind(AssertUnwindSafe(stage)) {
    Ok(()) => Verdict::Passed,
    Err(payload) => match payload.downcast_ref::<Signal>() {
      Some(signal) if signal.is_failure() => Verdict::Failed,
      Some(signal) => fatal(format_args!(
        "unexpected unwind signal {signal:?} in {}",
        t.full_name()
      )),
      None => {
        let reason = panic_message(payload.as_ref());
        t.reporter()
          .line(format_args!("{}: panicked: {reason}", t.full_name()));
        Verdict::Failed
      }
    },
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    (*message).to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic".to_string()
  }
}
