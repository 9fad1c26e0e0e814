use crate::registry::TestKind;
use crate::report::Counters;

/// Identity of the case a hook fires for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseInfo<'a> {
  pub suite: &'a str,
  pub name: &'a str,
  pub kind: TestKind,
}

/// Instrumentation callbacks around the run.
///
/// Every `before_*` call is matched by its `after_*` counterpart, including
/// when the stage in between failed.
pub trait Hooks {
  fn before_all_tests(&mut self) {}

  fn after_all_tests(&mut self, _last: &Counters) {}

  fn before_setup(&mut self, _case: &CaseInfo<'_>) {}

  fn after_setup(&mut self, _case: &CaseInfo<'_>, _passed: bool) {}

  fn before_teardown(&mut self, _case: &CaseInfo<'_>) {}

  fn after_teardown(&mut self, _case: &CaseInfo<'_>) {}

  fn before_test(&mut self, _case: &CaseInfo<'_>, _param: Option<usize>) {}

  fn after_test(&mut self, _case: &CaseInfo<'_>, _param: Option<usize>, _passed: bool) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl Hooks for NoHooks {}
