use crate::compare::Precision;
use crate::report::Reporter;
use std::fmt;
use std::io::Write;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Where a case currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Stage {
  Idle,
  Setup,
  Run,
  Teardown,
  Done,
}

impl Stage {
  fn from_u8(raw: u8) -> Self {
    match raw {
      1 => Stage::Setup,
      2 => Stage::Run,
      3 => Stage::Teardown,
      4 => Stage::Done,
      _ => Stage::Idle,
    }
  }
}

/// Unwind payload carried from a failing check back to the stage guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Signal(u8);

impl Signal {
  /// The only bit ever raised by an unwind. Skips are requested through
  /// [`TestContext::skip_test`] and never unwind.
  pub(crate) const FAILURE: u8 = 1;

  pub(crate) fn is_failure(self) -> bool {
    self.0 & Self::FAILURE != 0
  }
}

const NO_PARAM: usize = usize::MAX;

/// Handle passed to every setup, body and teardown callback.
///
/// Checks that fail write their diagnostic and then unwind straight back to
/// the stage boundary of the running case. Only the thread that started the
/// run may do that; a failure reported from any other thread aborts the
/// process.
pub struct TestContext {
  full_name: String,
  main_thread: ThreadId,
  break_on_failure: bool,
  precision: Precision,
  reporter: Arc<Reporter>,
  stage: AtomicU8,
  param: AtomicUsize,
  skip_requested: AtomicBool,
}

impl TestContext {
  pub(crate) fn new(
    full_name: String,
    main_thread: ThreadId,
    break_on_failure: bool,
    precision: Precision,
    reporter: Arc<Reporter>,
  ) -> Self {
    Self {
      full_name,
      main_thread,
      break_on_failure,
      precision,
      reporter,
      stage: AtomicU8::new(Stage::Idle as u8),
      param: AtomicUsize::new(NO_PARAM),
      skip_requested: AtomicBool::new(false),
    }
  }

  /// `suite.case` of the running case (without a parameter suffix).
  pub fn full_name(&self) -> &str {
    &self.full_name
  }

  pub fn stage(&self) -> Stage {
    Stage::from_u8(self.stage.load(Ordering::Relaxed))
  }

  /// Index of the value the parameterized body is currently running with.
  pub fn param_index(&self) -> Option<usize> {
    match self.param.load(Ordering::Relaxed) {
      NO_PARAM => None,
      index => Some(index),
    }
  }

  pub fn precision(&self) -> Precision {
    self.precision
  }

  /// Marks the case as skipped. Only legal while the fixture is being set up;
  /// the setup callback keeps running and the body is never entered.
  pub fn skip_test(&self) {
    if self.stage() != Stage::Setup {
      fatal(format_args!(
        "skip_test() called outside of setup in {} (stage {:?})",
        self.full_name,
        self.stage()
      ));
    }
    tracing::debug!(case = %self.full_name, "skip requested during setup");
    self.skip_requested.store(true, Ordering::Relaxed);
  }

  /// Fails the case unconditionally.
  #[track_caller]
  pub fn fail(&self, message: impl fmt::Display) -> ! {
    let location = Location::caller();
    self.report_failure(format_args!(
      "{}:{}: failure\n  {message}",
      location.file(),
      location.line()
    ))
  }

  /// Unwinds to the boundary of the current stage carrying a failure.
  pub fn signal_failure(&self) -> ! {
    self.unwind(Signal(Signal::FAILURE))
  }

  pub(crate) fn report_failure(&self, diagnostic: fmt::Arguments<'_>) -> ! {
    self.reporter.line(diagnostic);
    self.reporter.flush();
    if self.break_on_failure {
      trap_debugger();
    }
    self.signal_failure()
  }

  fn unwind(&self, signal: Signal) -> ! {
    if thread::current().id() != self.main_thread {
      fatal(format_args!(
        "failure in {} signaled from a thread other than the one running the tests",
        self.full_name
      ));
    }
    std::panic::resume_unwind(Box::new(signal))
  }

  pub(crate) fn enter(&self, stage: Stage) {
    tracing::trace!(case = %self.full_name, ?stage, "stage transition");
    self.stage.store(stage as u8, Ordering::Relaxed);
  }

  pub(crate) fn set_param(&self, param: Option<usize>) {
    self.param.store(param.unwrap_or(NO_PARAM), Ordering::Relaxed);
  }

  pub(crate) fn take_skip(&self) -> bool {
    self.skip_requested.swap(false, Ordering::Relaxed)
  }

  pub(crate) fn reporter(&self) -> &Reporter {
    &self.reporter
  }
}

impl fmt::Debug for TestContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TestContext")
      .field("full_name", &self.full_name)
      .field("stage", &self.stage())
      .field("param", &self.param_index())
      .finish_non_exhaustive()
  }
}

/// Reports a broken harness contract and aborts the process.
pub fn fatal(message: impl fmt::Display) -> ! {
  tracing::error!(%message, "fatal harness error");
  let _ = std::io::stdout().flush();
  eprintln!("fatal: {message}");
  std::process::abort()
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn trap_debugger() {
  // SAFETY: a breakpoint instruction touches no memory; without a debugger
  // attached the process receives SIGTRAP.
  unsafe { std::arch::asm!("int3") }
}

#[cfg(target_arch = "aarch64")]
fn trap_debugger() {
  // SAFETY: as above.
  unsafe { std::arch::asm!("brk #0xf000") }
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
fn trap_debugger() {
  std::process::abort()
}
