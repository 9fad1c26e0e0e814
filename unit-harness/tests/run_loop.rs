use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tempfile::tempdir;
use unit_harness::{
  check, check_eq, check_lt, params, CaseInfo, Counters, Fixture, Harness, Hooks, Outcome,
  PatternFilter, Registry, Repeat, RunOptions, RunSummary, SharedBuffer, Stage, TestContext,
};

fn options() -> RunOptions {
  RunOptions {
    print_time: false,
    ..RunOptions::default()
  }
}

fn run(registry: Registry, options: &RunOptions) -> (RunSummary, String) {
  let buffer = SharedBuffer::new();
  let mut harness = Harness::new(registry).with_output(buffer.clone());
  let summary = harness.run(options);
  (summary, buffer.contents())
}

fn run_lines(output: &str) -> Vec<&str> {
  output
    .lines()
    .filter_map(|line| line.strip_prefix("[ RUN      ] "))
    .collect()
}

#[derive(Default)]
struct Counter {
  value: u32,
}

impl Fixture for Counter {
  fn set_up(&mut self, t: &TestContext) {
    check!(t, t.stage() == Stage::Setup);
    self.value = 1;
  }
}

#[derive(Default)]
struct Accumulator {
  sum: u32,
}

impl Fixture for Accumulator {}

fn mixed_registry() -> Registry {
  let mut registry = Registry::new();
  registry
    .add_simple("Basics", "arithmetic", |t: &TestContext| {
      check_eq!(t, 2 + 2, 4);
      check_lt!(t, 1.0f64, 2.0f64);
    })
    .unwrap();
  registry
    .add_fixture::<Counter>("Basics", "fixture_state", |f, t| {
      check_eq!(t, f.value, 1, "set_up must run first");
      check!(t, t.stage() == Stage::Run);
    })
    .unwrap();
  registry
    .add_parameterized::<(), u32>(
      "Basics",
      "ten_values",
      params![0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
      |_, t, value| {
        check_eq!(t, t.param_index(), Some(*value as usize));
      },
    )
    .unwrap();
  registry
}

#[test]
fn simple_fixture_and_parameterized_cases_all_pass() {
  let (summary, output) = run(mixed_registry(), &options());

  assert_eq!(summary.total_failed, 0);
  let counters = summary.iterations[0].counters;
  assert_eq!(
    counters,
    Counters {
      total: 12,
      disabled: 0,
      success: 12,
      skipped: 0,
      failed: 0,
    }
  );
  assert!(output.contains("[==========] Running 12 tests.\n"));
  assert!(output.contains("[       OK ] Basics.ten_values/9\n"));
  assert!(output.contains("[==========] 12 tests ran.\n"));
  assert!(output.contains("[  PASSED  ] 12 tests.\n"));
  assert!(!output.contains("FAILED"));
}

#[test]
fn wildcard_filter_selects_only_parameterized_values() {
  let mut registry = Registry::new();
  registry.add_simple("S", "plain", |_t: &TestContext| {}).unwrap();
  registry
    .add_parameterized::<(), i32>("S", "p3", params![1, 2, 3], |_, _, _| {})
    .unwrap();

  let options = RunOptions {
    filter: PatternFilter::parse("*/*"),
    ..options()
  };
  let (summary, output) = run(registry, &options);

  assert_eq!(summary.iterations[0].counters.total, 3);
  assert_eq!(run_lines(&output), ["S.p3/0", "S.p3/1", "S.p3/2"]);
}

#[test]
fn parameterized_values_share_one_fixture() {
  let total = Rc::new(Cell::new(0));
  let seen = Rc::clone(&total);
  let mut registry = Registry::new();
  registry
    .add_parameterized::<Accumulator, u32>(
      "Sum",
      "accumulates",
      params![1, 2, 3],
      move |fixture, _t, value| {
        fixture.sum += value;
        seen.set(fixture.sum);
      },
    )
    .unwrap();

  let (summary, _) = run(registry, &options());
  assert_eq!(summary.iterations[0].counters.success, 3);
  assert_eq!(total.get(), 6);
}

#[test]
fn failures_stay_local_to_their_case() {
  let mut registry = Registry::new();
  registry
    .add_simple("Iso", "fails", |t: &TestContext| {
      check_eq!(t, 1, 2, "values differ by {}", 1);
      unreachable!("a failed check does not return");
    })
    .unwrap();
  registry
    .add_simple("Iso", "passes", |t: &TestContext| check!(t, true))
    .unwrap();

  let (summary, output) = run(registry, &options());
  let counters = summary.iterations[0].counters;
  assert_eq!((counters.success, counters.failed), (1, 1));
  assert_eq!(summary.total_failed, 1);
  assert!(output.contains("expected: '1' == '2'"));
  assert!(output.contains("actual: 1 vs 2"));
  assert!(output.contains("message: values differ by 1"));
  assert!(output.contains("[  FAILED  ] Iso.fails\n[ RUN      ] Iso.passes\n"));
  assert!(output.contains("[  FAILED  ] 1 test, listed below:\n[  FAILED  ] Iso.fails\n"));
}

#[test]
fn foreign_panics_count_as_failures() {
  let mut registry = Registry::new();
  registry
    .add_simple("Panics", "unwrap_none", |_t: &TestContext| {
      let missing: Option<u8> = None;
      missing.unwrap();
    })
    .unwrap();

  let (summary, output) = run(registry, &options());
  assert_eq!(summary.total_failed, 1);
  assert!(output.contains("Panics.unwrap_none: panicked:"));
}

#[test]
fn failing_value_stops_the_parameter_loop() {
  let mut registry = Registry::new();
  registry
    .add_parameterized::<(), u32>("Loop", "stops", params![0, 1, 2], |_, t, value| {
      check_lt!(t, *value, 1u32);
    })
    .unwrap();

  let (summary, output) = run(registry, &options());
  let report = &summary.iterations[0];
  let outcomes: Vec<(&str, Outcome)> = report
    .results
    .iter()
    .map(|result| (result.name.as_str(), result.outcome))
    .collect();
  assert_eq!(
    outcomes,
    [
      ("Loop.stops/0", Outcome::Passed),
      ("Loop.stops/1", Outcome::Failed),
      ("Loop.stops/2", Outcome::Skipped),
    ]
  );
  assert_eq!(report.counters.ran(), report.counters.total);
  assert!(output.contains("[==========] Running 3 tests.\n"));
  assert!(output.contains("[   SKIP   ] Loop.stops/2\n"));
  assert!(output.contains("[==========] 3 tests ran.\n"));
}

thread_local! {
  static ORDER_OUTPUT: SharedBuffer = SharedBuffer::new();
  static SEEN_IN_TEARDOWN: Cell<Option<(bool, bool)>> = const { Cell::new(None) };
}

#[derive(Default)]
struct InspectsReportInTeardown;

impl Fixture for InspectsReportInTeardown {
  fn tear_down(&mut self, _t: &TestContext) {
    let output = ORDER_OUTPUT.with(SharedBuffer::contents);
    let announced = output.contains("[ RUN      ] Order.c\n");
    let verdict = output.contains("[       OK ] Order.c");
    SEEN_IN_TEARDOWN.with(|seen| seen.set(Some((announced, verdict))));
  }
}

#[test]
fn verdict_line_follows_teardown() {
  let mut registry = Registry::new();
  registry
    .add_fixture::<InspectsReportInTeardown>("Order", "c", |_, _| {})
    .unwrap();

  let buffer = ORDER_OUTPUT.with(SharedBuffer::clone);
  let mut harness = Harness::new(registry).with_output(buffer.clone());
  let summary = harness.run(&options());

  assert_eq!(summary.iterations[0].counters.success, 1);
  assert_eq!(SEEN_IN_TEARDOWN.with(Cell::get), Some((true, false)));
  assert!(buffer.contents().contains("[       OK ] Order.c\n"));
}

#[derive(Default)]
struct SkipsInSetup;

impl Fixture for SkipsInSetup {
  fn set_up(&mut self, t: &TestContext) {
    t.skip_test();
  }
}

#[test]
fn skip_requested_in_setup_bypasses_the_body() {
  let ran = Rc::new(Cell::new(false));
  let flag = Rc::clone(&ran);
  let mut registry = Registry::new();
  registry
    .add_fixture::<SkipsInSetup>("Skip", "body", move |_, _| flag.set(true))
    .unwrap();

  let (summary, output) = run(registry, &options());
  assert!(!ran.get());
  assert_eq!(summary.iterations[0].counters.skipped, 1);
  assert_eq!(summary.total_failed, 0);
  assert!(output.contains("[   SKIP   ] Skip.body\n"));
  assert!(output.contains("[   SKIP   ] 1 test.\n"));
}

#[test]
fn disabled_cases_only_run_on_request() {
  let build = || {
    let mut registry = Registry::new();
    registry
      .add_simple("Off", "DISABLED_broken", |t: &TestContext| t.fail("should not run"))
      .unwrap();
    registry.add_simple("Off", "enabled", |_t: &TestContext| {}).unwrap();
    registry
  };

  let (summary, output) = run(build(), &options());
  let counters = summary.iterations[0].counters;
  assert_eq!((counters.total, counters.disabled, counters.success), (2, 1, 1));
  assert!(output.contains("[ DISABLED ] 1 test.\n"));
  assert!(!output.contains("Off.DISABLED_broken"));

  let options = RunOptions {
    also_run_disabled: true,
    ..options()
  };
  let (summary, output) = run(build(), &options);
  assert_eq!(summary.total_failed, 1);
  assert!(output.contains("[  FAILED  ] Off.DISABLED_broken\n"));
}

fn ten_cases() -> Registry {
  let mut registry = Registry::new();
  for index in 0..10 {
    registry
      .add_simple("Shuffle", format!("case{index}"), |_t: &TestContext| {})
      .unwrap();
  }
  registry
}

#[test]
fn same_seed_reproduces_the_shuffled_order() {
  let seeded = |seed| RunOptions {
    shuffle: true,
    random_seed: Some(seed),
    ..options()
  };

  let (first, output_a) = run(ten_cases(), &seeded(1));
  let (_, output_b) = run(ten_cases(), &seeded(1));
  let (_, output_c) = run(ten_cases(), &seeded(2));

  assert_eq!(first.seed, Some(1));
  assert!(output_a.contains("Note: Randomizing tests' orders with a seed of 1 ."));
  let order_a = run_lines(&output_a);
  assert_eq!(order_a.len(), 10);
  assert_eq!(order_a, run_lines(&output_b));
  assert_ne!(order_a, run_lines(&output_c));
}

#[test]
fn repeat_accumulates_failures_across_iterations() {
  let mut registry = Registry::new();
  registry
    .add_simple("Rep", "always_fails", |t: &TestContext| t.fail("nope"))
    .unwrap();
  registry.add_simple("Rep", "passes", |_t: &TestContext| {}).unwrap();

  let options = RunOptions {
    repeat: Repeat::Times(3),
    ..options()
  };
  let (summary, output) = run(registry, &options);
  assert_eq!(summary.iterations.len(), 3);
  assert_eq!(summary.total_failed, 3);
  assert!(summary.iterations.iter().all(|report| report.counters.failed == 1));
  assert!(output.contains("Repeating all tests (iteration 3) . . ."));
}

#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Vec<String>>>);

impl Recorder {
  fn events(&self) -> Vec<String> {
    self.0.borrow().clone()
  }

  fn push(&self, event: String) {
    self.0.borrow_mut().push(event);
  }
}

impl Hooks for Recorder {
  fn before_all_tests(&mut self) {
    self.push("before_all".into());
  }

  fn after_all_tests(&mut self, last: &Counters) {
    self.push(format!("after_all failed={}", last.failed));
  }

  fn before_setup(&mut self, case: &CaseInfo<'_>) {
    self.push(format!("before_setup {}", case.name));
  }

  fn after_setup(&mut self, case: &CaseInfo<'_>, passed: bool) {
    self.push(format!("after_setup {} {passed}", case.name));
  }

  fn before_teardown(&mut self, case: &CaseInfo<'_>) {
    self.push(format!("before_teardown {}", case.name));
  }

  fn after_teardown(&mut self, case: &CaseInfo<'_>) {
    self.push(format!("after_teardown {}", case.name));
  }

  fn before_test(&mut self, case: &CaseInfo<'_>, param: Option<usize>) {
    self.push(format!("before_test {} {param:?}", case.name));
  }

  fn after_test(&mut self, case: &CaseInfo<'_>, param: Option<usize>, passed: bool) {
    self.push(format!("after_test {} {param:?} {passed}", case.name));
  }
}

#[derive(Default)]
struct FailsInSetup;

impl Fixture for FailsInSetup {
  fn set_up(&mut self, t: &TestContext) {
    t.fail("setup broke");
  }
}

#[test]
fn hooks_stay_balanced_when_stages_fail() {
  let recorder = Recorder::default();
  let mut registry = Registry::new();
  registry
    .add_fixture::<FailsInSetup>("Hooks", "setup_fails", |_, _| {})
    .unwrap();
  registry
    .add_fixture::<Counter>("Hooks", "body_fails", |_, t| t.fail("body broke"))
    .unwrap();
  registry.add_simple("Hooks", "simple", |_t: &TestContext| {}).unwrap();

  let buffer = SharedBuffer::new();
  let mut harness = Harness::new(registry)
    .with_output(buffer.clone())
    .with_hooks(recorder.clone());
  let summary = harness.run(&options());
  assert_eq!(summary.total_failed, 2);

  assert_eq!(
    recorder.events(),
    [
      "before_all",
      "before_setup setup_fails",
      "after_setup setup_fails false",
      "before_teardown setup_fails",
      "after_teardown setup_fails",
      "before_setup body_fails",
      "after_setup body_fails true",
      "before_test body_fails None",
      "after_test body_fails None false",
      "before_teardown body_fails",
      "after_teardown body_fails",
      "before_test simple None",
      "after_test simple None true",
      "after_all failed=2",
    ]
  );
}

#[test]
fn json_report_lands_on_disk() {
  let dir = tempdir().unwrap();
  let path = dir.path().join("out").join("report.json");
  let options = RunOptions {
    json_report: Some(path.clone()),
    ..options()
  };

  let mut harness = Harness::new(mixed_registry()).with_output(SharedBuffer::new());
  let summary = harness.execute(&options).unwrap();
  assert_eq!(summary.total_failed, 0);

  let raw = std::fs::read_to_string(&path).unwrap();
  let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
  assert_eq!(parsed["schema_version"], 1);
  assert_eq!(parsed["total_failed"], 0);
  assert_eq!(parsed["iterations"][0]["counters"]["total"], 12);
  assert_eq!(
    parsed["iterations"][0]["results"][2]["name"],
    "Basics.ten_values/0"
  );
}

#[test]
fn listing_runs_nothing() {
  let buffer = SharedBuffer::new();
  let mut harness = Harness::new(mixed_registry()).with_output(buffer.clone());
  let options = RunOptions {
    list_tests: true,
    ..options()
  };
  let summary = harness.execute(&options).unwrap();

  assert!(summary.iterations.is_empty());
  let output = buffer.contents();
  assert!(output.starts_with("Basics.\n  arithmetic\n  fixture_state\n"));
  assert!(output.contains("  ten_values/0  # 0\n"));
  assert!(!output.contains("[ RUN      ]"));
}
