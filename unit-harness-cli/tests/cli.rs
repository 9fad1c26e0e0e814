use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

fn harness() -> Command {
  Command::cargo_bin("unit-harness-cli").unwrap()
}

fn stdout_of(args: &[&str]) -> String {
  let output = harness().args(args).output().unwrap();
  String::from_utf8_lossy(&output.stdout).into_owned()
}

fn scenario(name: &str) -> Command {
  let mut cmd = harness();
  cmd
    .env("UNIT_HARNESS_CLI_SCENARIO", name)
    .arg("--filter=Scenario.*");
  cmd
}

fn run_order(stdout: &str) -> Vec<String> {
  stdout
    .lines()
    .filter_map(|line| line.strip_prefix("[ RUN      ] "))
    .map(str::to_string)
    .collect()
}

#[test]
fn default_run_passes_and_exits_zero() {
  harness()
    .assert()
    .success()
    .stdout(contains("[==========] Running 9 tests."))
    .stdout(contains("[       OK ] Parity.doubles_are_even/3 ("))
    .stdout(contains("[   SKIP   ] Network.reachable\n"))
    .stdout(contains("[  PASSED  ] 8 tests."))
    .stdout(contains("[ DISABLED ] 1 test."));
}

#[test]
fn exit_code_counts_failed_cases() {
  harness()
    .arg("--also_run_disabled_tests")
    .assert()
    .failure()
    .code(1)
    .stdout(contains("expected: '1 + 1' == '3'"))
    .stdout(contains("[  FAILED  ] 1 test, listed below:\n[  FAILED  ] Known.DISABLED_broken\n"));

  harness()
    .args(["--also_run_disabled_tests", "--repeat=2"])
    .assert()
    .code(2);
}

#[test]
fn list_tests_prints_names_without_running() {
  harness()
    .arg("--list_tests")
    .assert()
    .success()
    .stdout(contains("Arithmetic.\n  floats\n  integers\n"))
    .stdout(contains(
      "Parity.\n  doubles_are_even/0  # 1\n  doubles_are_even/1  # 7\n  doubles_are_even/2  # 12\n  doubles_are_even/3  # 255\n",
    ))
    .stdout(contains("[ RUN").not());
}

#[test]
fn filter_accepts_negative_patterns() {
  let stdout = stdout_of(&["--filter=Parity.*:-*/3", "--print_time=0"]);
  assert_eq!(
    run_order(&stdout),
    [
      "Parity.doubles_are_even/0",
      "Parity.doubles_are_even/1",
      "Parity.doubles_are_even/2",
    ]
  );
  assert!(stdout.contains("[       OK ] Parity.doubles_are_even/0\n"));
}

#[test]
fn shuffle_is_reproducible_from_the_seed() {
  let first = stdout_of(&["--shuffle", "--random_seed=5", "--print_time=0"]);
  let second = stdout_of(&["--shuffle", "--random_seed=5", "--print_time=0"]);
  assert!(first.starts_with("Note: Randomizing tests' orders with a seed of 5 .\n"));
  assert_eq!(run_order(&first), run_order(&second));
  assert_eq!(run_order(&first).len(), 9);
}

#[test]
fn help_exits_zero() {
  harness()
    .arg("--help")
    .assert()
    .success()
    .stdout(contains("--random_seed"))
    .stdout(contains("--also_run_disabled_tests"));
}

#[test]
fn invalid_print_time_is_a_usage_error() {
  harness()
    .arg("--print_time=2")
    .assert()
    .failure()
    .code(2);
}

#[test]
fn json_report_is_written() {
  let dir = tempdir().unwrap();
  let path = dir.path().join("report.json");
  harness()
    .arg(format!("--json_report={}", path.display()))
    .assert()
    .success();

  let report: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
  assert_eq!(report["schema_version"], 1);
  assert_eq!(report["total_failed"], 0);
  let counters = &report["iterations"][0]["counters"];
  assert_eq!(counters["total"], 10);
  assert_eq!(counters["disabled"], 1);
  assert_eq!(counters["skipped"], 1);
}

#[test]
fn failure_from_another_thread_aborts() {
  scenario("cross_thread_failure")
    .assert()
    .failure()
    .stderr(contains(
      "fatal: failure in Scenario.cross_thread_failure signaled from a thread other than",
    ))
    .stdout(contains("[       OK ] Scenario.cross_thread_failure").not());
}

#[test]
fn failing_teardown_aborts_before_the_verdict() {
  scenario("teardown_failure")
    .assert()
    .failure()
    .stdout(contains("[ RUN      ] Scenario.teardown_failure"))
    .stdout(contains("[       OK ] Scenario.teardown_failure").not())
    .stderr(contains(
      "fatal: teardown of Scenario.teardown_failure must not fail",
    ));
}

#[test]
fn skip_outside_setup_aborts() {
  scenario("skip_outside_setup")
    .assert()
    .failure()
    .stderr(contains(
      "fatal: skip_test() called outside of setup in Scenario.skip_outside_setup",
    ));
}

#[test]
fn duplicate_registration_aborts_before_running() {
  scenario("duplicate_registration")
    .assert()
    .failure()
    .stderr(contains("fatal: registering scenario duplicate_registration"))
    .stderr(contains("duplicate test Arithmetic.integers"))
    .stdout(contains("[ RUN").not());
}
