use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub mod compare;
pub mod context;
pub mod driver;
pub mod filter;
pub mod hooks;
pub mod list;
pub mod options;
pub mod random;
pub mod rbtree;
pub mod registry;
pub mod report;
mod runner;

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
  #[error("duplicate test {suite}.{name}")]
  DuplicateTest { suite: String, name: String },
  #[error("parameterized test {suite}.{name} has no values")]
  EmptyParameters { suite: String, name: String },
  #[error("failed to write report {}: {source}", path.display())]
  Report {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

pub use compare::almost_equal_f32;
pub use compare::almost_equal_f64;
pub use compare::CheckValue;
pub use compare::CmpOp;
pub use compare::Precision;
pub use context::fatal;
pub use context::Stage;
pub use context::TestContext;
pub use driver::harness_main;
pub use driver::harness_main_from;
pub use driver::Harness;
pub use filter::glob_match;
pub use filter::is_disabled;
pub use filter::PatternFilter;
pub use hooks::CaseInfo;
pub use hooks::Hooks;
pub use hooks::NoHooks;
pub use options::Cli;
pub use options::Repeat;
pub use options::RunOptions;
pub use random::shuffle;
pub use random::Lcg;
pub use registry::CaseId;
pub use registry::Fixture;
pub use registry::ParamSet;
pub use registry::ParamValues;
pub use registry::Registry;
pub use registry::TestCase;
pub use registry::TestKind;
pub use registry::VirtualCase;
pub use report::CaseResult;
pub use report::Counters;
pub use report::IterationReport;
pub use report::Outcome;
pub use report::Reporter;
pub use report::RunSummary;
pub use report::SharedBuffer;
