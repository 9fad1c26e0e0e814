use anyhow::{bail, Context, Result};
use std::collections::VecDeque;
use std::env;
use std::process::ExitCode;
use std::thread;
use unit_harness::{
  check, check_eq, check_ge, check_lt, check_ne, harness_main, params, Fixture, Registry,
  TestContext,
};

#[derive(Default)]
struct Queue {
  items: VecDeque<u32>,
}

impl Fixture for Queue {
  fn set_up(&mut self, _t: &TestContext) {
    self.items.extend([1, 2, 3]);
  }

  fn tear_down(&mut self, _t: &TestContext) {
    self.items.clear();
  }
}

#[derive(Default)]
struct NeedsNetwork;

impl Fixture for NeedsNetwork {
  fn set_up(&mut self, t: &TestContext) {
    t.skip_test();
  }
}

/// Selects one extra misbehaving case that breaks a harness contract.
const SCENARIO_VAR: &str = "UNIT_HARNESS_CLI_SCENARIO";

#[derive(Default)]
struct FailsInTeardown;

impl Fixture for FailsInTeardown {
  fn tear_down(&mut self, t: &TestContext) {
    check_eq!(t, 1, 2, "teardown must not fail");
  }
}

fn register_scenario(registry: &mut Registry, scenario: &str) -> Result<()> {
  match scenario {
    "cross_thread_failure" => {
      registry.add_simple("Scenario", "cross_thread_failure", |t: &TestContext| {
        thread::scope(|scope| {
          scope.spawn(|| t.fail("signaled from a worker thread"));
        });
      })
    }
    "teardown_failure" => {
      registry.add_fixture::<FailsInTeardown>("Scenario", "teardown_failure", |_, _| {})
    }
    "skip_outside_setup" => {
      registry.add_simple("Scenario", "skip_outside_setup", |t: &TestContext| {
        t.skip_test()
      })
    }
    "duplicate_registration" => {
      registry.add_simple("Arithmetic", "integers", |_t: &TestContext| {})
    }
    other => bail!("unknown scenario {other:?}"),
  }
  .with_context(|| format!("registering scenario {scenario}"))?;
  Ok(())
}

fn register(registry: &mut Registry) -> Result<()> {
  registry
    .add_simple("Arithmetic", "integers", |t: &TestContext| {
      check_eq!(t, 6 * 7, 42);
      check_ne!(t, i64::MIN, i64::MAX);
      check_ge!(t, u8::MAX, 255);
    })
    .context("registering Arithmetic.integers")?;
  registry
    .add_simple("Arithmetic", "floats", |t: &TestContext| {
      check_eq!(t, 0.1f64 + 0.2f64, 0.3f64, "ULP equality absorbs rounding");
      check_ne!(t, f32::NAN, f32::NAN);
      check_lt!(t, 1.0f32, 1.5f32);
    })
    .context("registering Arithmetic.floats")?;
  registry
    .add_simple("Text", "strings", |t: &TestContext| {
      let greeting = format!("{}, {}", "hello", "world");
      check_eq!(t, greeting.as_str(), "hello, world");
      check!(t, greeting.starts_with("hello"));
    })
    .context("registering Text.strings")?;
  registry
    .add_fixture::<Queue>("Queue", "pops_in_order", |queue, t| {
      check_eq!(t, queue.items.pop_front(), Some(1));
      check_eq!(t, queue.items.len(), 2usize);
    })
    .context("registering Queue.pops_in_order")?;
  registry
    .add_parameterized::<(), u64>(
      "Parity",
      "doubles_are_even",
      params![1, 7, 12, 255],
      |_, t, value| {
        check_eq!(t, (value * 2) % 2, 0, "value {value}");
      },
    )
    .context("registering Parity.doubles_are_even")?;
  registry
    .add_fixture::<NeedsNetwork>("Network", "reachable", |_, t| {
      t.fail("the body of a skipped case never runs")
    })
    .context("registering Network.reachable")?;
  registry
    .add_simple("Known", "DISABLED_broken", |t: &TestContext| {
      check_eq!(t, 1 + 1, 3);
    })
    .context("registering Known.DISABLED_broken")?;

  if let Ok(scenario) = env::var(SCENARIO_VAR) {
    register_scenario(registry, &scenario)?;
  }
  Ok(())
}

fn main() -> ExitCode {
  harness_main(register)
}
