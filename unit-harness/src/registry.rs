//! Declared test cases and the two structures indexing them.
//!
//! Every registered case, and every value of a parameterized case, gets one
//! node in the sorted [`RbTree`] (used for listing and duplicate detection)
//! and one node in the registration [`NodeList`], whose order is the order
//! cases execute in.

use crate::context::TestContext;
use crate::list::NodeList;
use crate::rbtree::{Insertion, RbTree};
use crate::HarnessError;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
  Simple,
  Fixture,
  Parameterized,
}

/// Shared state for a suite of cases with common setup and teardown.
///
/// A fresh value is created with [`Default`] for every case; `set_up` runs
/// before the body and `tear_down` always runs afterwards, even when setup or
/// the body failed. `tear_down` must not fail.
pub trait Fixture: Default + 'static {
  fn set_up(&mut self, _t: &TestContext) {}

  fn tear_down(&mut self, _t: &TestContext) {}
}

impl Fixture for () {}

/// Values for a parameterized case plus the text they were written as.
#[derive(Debug, Clone)]
pub struct ParamValues<T> {
  pub values: Vec<T>,
  pub source: &'static str,
  pub type_name: &'static str,
}

impl<T> ParamValues<T> {
  pub fn new(values: Vec<T>, source: &'static str) -> Self {
    Self {
      values,
      source,
      type_name: std::any::type_name::<T>(),
    }
  }
}

/// Builds [`ParamValues`] from literal values, remembering their source text.
#[macro_export]
macro_rules! params {
  ($($value:expr),* $(,)?) => {
    $crate::ParamValues::new(vec![$($value),*], stringify!($($value),*))
  };
}

/// Diagnostic description of a parameterized case's values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSet {
  pub type_name: &'static str,
  pub source: &'static str,
  pub rendered: Vec<String>,
}

impl ParamSet {
  pub fn len(&self) -> usize {
    self.rendered.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rendered.is_empty()
  }
}

pub(crate) trait CaseBody {
  fn instantiate(&self) -> Box<dyn CaseInstance + '_>;
}

/// One invocation of a case: owns the fixture state across its stages.
pub(crate) trait CaseInstance {
  fn set_up(&mut self, t: &TestContext);

  fn run(&mut self, t: &TestContext, param: Option<usize>);

  fn tear_down(&mut self, t: &TestContext);
}

struct SimpleBody<B>(B);

struct SimpleInstance<'a>(&'a dyn Fn(&TestContext));

impl<B: Fn(&TestContext) + 'static> CaseBody for SimpleBody<B> {
  fn instantiate(&self) -> Box<dyn CaseInstance + '_> {
    Box::new(SimpleInstance(&self.0))
  }
}

impl CaseInstance for SimpleInstance<'_> {
  fn set_up(&mut self, _t: &TestContext) {}

  fn run(&mut self, t: &TestContext, _param: Option<usize>) {
    (self.0)(t)
  }

  fn tear_down(&mut self, _t: &TestContext) {}
}

struct FixtureBody<F, B> {
  body: B,
  _fixture: PhantomData<fn() -> F>,
}

struct FixtureInstance<'a, F> {
  state: F,
  body: &'a dyn Fn(&mut F, &TestContext),
}

impl<F: Fixture, B: Fn(&mut F, &TestContext) + 'static> CaseBody for FixtureBody<F, B> {
  fn instantiate(&self) -> Box<dyn CaseInstance + '_> {
    Box::new(FixtureInstance {
      state: F::default(),
      body: &self.body,
    })
  }
}

impl<F: Fixture> CaseInstance for FixtureInstance<'_, F> {
  fn set_up(&mut self, t: &TestContext) {
    self.state.set_up(t)
  }

  fn run(&mut self, t: &TestContext, _param: Option<usize>) {
    (self.body)(&mut self.state, t)
  }

  fn tear_down(&mut self, t: &TestContext) {
    self.state.tear_down(t)
  }
}

struct ParamBody<F, T, B> {
  values: Vec<T>,
  body: B,
  _fixture: PhantomData<fn() -> F>,
}

struct ParamInstance<'a, F, T> {
  state: F,
  values: &'a [T],
  body: &'a dyn Fn(&mut F, &TestContext, &T),
}

impl<F, T, B> CaseBody for ParamBody<F, T, B>
where
  F: Fixture,
  T: 'static,
  B: Fn(&mut F, &TestContext, &T) + 'static,
{
  fn instantiate(&self) -> Box<dyn CaseInstance + '_> {
    Box::new(ParamInstance {
      state: F::default(),
      values: &self.values,
      body: &self.body,
    })
  }
}

impl<F: Fixture, T> CaseInstance for ParamInstance<'_, F, T> {
  fn set_up(&mut self, t: &TestContext) {
    self.state.set_up(t)
  }

  fn run(&mut self, t: &TestContext, param: Option<usize>) {
    if let Some(value) = param.and_then(|index| self.values.get(index)) {
      (self.body)(&mut self.state, t, value)
    }
  }

  fn tear_down(&mut self, t: &TestContext) {
    self.state.tear_down(t)
  }
}

/// A declared test: identity, kind, and its stage callbacks.
pub struct TestCase {
  suite: String,
  name: String,
  kind: TestKind,
  params: Option<ParamSet>,
  body: Box<dyn CaseBody>,
}

impl TestCase {
  pub fn suite(&self) -> &str {
    &self.suite
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn kind(&self) -> TestKind {
    self.kind
  }

  pub fn params(&self) -> Option<&ParamSet> {
    self.params.as_ref()
  }

  /// `suite.case`, or `suite.case/<index>` for one value of a parameterized
  /// case.
  pub fn full_name(&self, param: Option<usize>) -> String {
    match param {
      Some(index) => format!("{}.{}/{index}", self.suite, self.name),
      None => format!("{}.{}", self.suite, self.name),
    }
  }

  pub(crate) fn instantiate(&self) -> Box<dyn CaseInstance + '_> {
    self.body.instantiate()
  }
}

impl fmt::Debug for TestCase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TestCase")
      .field("suite", &self.suite)
      .field("name", &self.name)
      .field("kind", &self.kind)
      .field("params", &self.params)
      .finish_non_exhaustive()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaseId(usize);

impl CaseId {
  pub fn index(self) -> usize {
    self.0
  }
}

/// A schedulable unit: a whole case, or one value of a parameterized case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VirtualCase {
  pub case: CaseId,
  pub param: Option<usize>,
}

#[derive(Debug, Default)]
pub struct Registry {
  cases: Vec<TestCase>,
  index: RbTree<VirtualCase>,
  order: NodeList<VirtualCase>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_simple(
    &mut self,
    suite: impl Into<String>,
    name: impl Into<String>,
    body: impl Fn(&TestContext) + 'static,
  ) -> Result<CaseId, HarnessError> {
    self.register(
      suite.into(),
      name.into(),
      TestKind::Simple,
      None,
      Box::new(SimpleBody(body)),
    )
  }

  pub fn add_fixture<F: Fixture>(
    &mut self,
    suite: impl Into<String>,
    name: impl Into<String>,
    body: impl Fn(&mut F, &TestContext) + 'static,
  ) -> Result<CaseId, HarnessError> {
    self.register(
      suite.into(),
      name.into(),
      TestKind::Fixture,
      None,
      Box::new(FixtureBody {
        body,
        _fixture: PhantomData::<fn() -> F>,
      }),
    )
  }

  /// Registers one virtual case per value. The body receives the value for
  /// the index being run; use `()` as the fixture when no shared state is
  /// needed.
  pub fn add_parameterized<F: Fixture, T: fmt::Debug + 'static>(
    &mut self,
    suite: impl Into<String>,
    name: impl Into<String>,
    values: ParamValues<T>,
    body: impl Fn(&mut F, &TestContext, &T) + 'static,
  ) -> Result<CaseId, HarnessError> {
    let suite = suite.into();
    let name = name.into();
    if values.values.is_empty() {
      return Err(HarnessError::EmptyParameters { suite, name });
    }

    let params = ParamSet {
      type_name: values.type_name,
      source: values.source,
      rendered: values.values.iter().map(|v| format!("{v:?}")).collect(),
    };
    self.register(
      suite,
      name,
      TestKind::Parameterized,
      Some(params),
      Box::new(ParamBody {
        values: values.values,
        body,
        _fixture: PhantomData::<fn() -> F>,
      }),
    )
  }

  fn register(
    &mut self,
    suite: String,
    name: String,
    kind: TestKind,
    params: Option<ParamSet>,
    body: Box<dyn CaseBody>,
  ) -> Result<CaseId, HarnessError> {
    let cases = &self.cases;
    let existing = self.index.find(|key| {
      let other = &cases[key.case.0];
      (suite.as_bytes(), name.as_bytes()).cmp(&(other.suite.as_bytes(), other.name.as_bytes()))
    });
    if existing.is_some() {
      return Err(HarnessError::DuplicateTest { suite, name });
    }

    let id = CaseId(self.cases.len());
    let virtual_count = params.as_ref().map(ParamSet::len);
    tracing::trace!(%suite, %name, ?kind, "registering test case");
    self.cases.push(TestCase {
      suite,
      name,
      kind,
      params,
      body,
    });

    let keys: Vec<VirtualCase> = match virtual_count {
      None => vec![VirtualCase {
        case: id,
        param: None,
      }],
      Some(count) => (0..count)
        .map(|index| VirtualCase {
          case: id,
          param: Some(index),
        })
        .collect(),
    };
    for key in keys {
      let cases = &self.cases;
      if let Insertion::Duplicate(_) = self.index.insert(key, |a, b| compare_keys(cases, a, b)) {
        let case = &self.cases[id.0];
        return Err(HarnessError::DuplicateTest {
          suite: case.suite.clone(),
          name: case.name.clone(),
        });
      }
      self.order.push_back(key);
    }

    Ok(id)
  }

  pub fn case(&self, id: CaseId) -> &TestCase {
    &self.cases[id.0]
  }

  pub fn cases(&self) -> &[TestCase] {
    &self.cases
  }

  /// Number of virtual cases.
  pub fn len(&self) -> usize {
    self.order.len()
  }

  pub fn is_empty(&self) -> bool {
    self.order.is_empty()
  }

  pub fn full_name(&self, key: VirtualCase) -> String {
    self.case(key.case).full_name(key.param)
  }

  /// Virtual cases ordered by (suite, case, index).
  pub fn sorted(&self) -> impl Iterator<Item = VirtualCase> + '_ {
    self.index.iter().map(|(_, key)| *key)
  }

  /// Virtual cases in execution order.
  pub fn order(&self) -> &NodeList<VirtualCase> {
    &self.order
  }

  pub(crate) fn order_mut(&mut self) -> &mut NodeList<VirtualCase> {
    &mut self.order
  }
}

fn compare_keys(cases: &[TestCase], a: &VirtualCase, b: &VirtualCase) -> Ordering {
  let lhs = &cases[a.case.0];
  let rhs = &cases[b.case.0];
  lhs
    .suite
    .as_bytes()
    .cmp(rhs.suite.as_bytes())
    .then_with(|| lhs.name.as_bytes().cmp(rhs.name.as_bytes()))
    .then_with(|| a.param.cmp(&b.param))
}
