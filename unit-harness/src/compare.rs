//! Typed comparisons behind the `check_*!` macros.
//!
//! Floating point equality is measured in units in the last place (ULPs):
//! both operands are mapped from sign-magnitude bits onto a monotonic biased
//! integer line and the distance between them is compared to a tolerance.
//! NaN never compares equal to anything.

use crate::context::TestContext;
use std::cmp::Ordering;
use std::fmt;
use std::panic::Location;

pub const DEFAULT_MAX_ULPS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precision {
  pub float_ulps: u32,
  pub double_ulps: u64,
}

impl Default for Precision {
  fn default() -> Self {
    Self {
      float_ulps: DEFAULT_MAX_ULPS,
      double_ulps: u64::from(DEFAULT_MAX_ULPS),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

impl CmpOp {
  pub fn symbol(self) -> &'static str {
    match self {
      CmpOp::Eq => "==",
      CmpOp::Ne => "!=",
      CmpOp::Lt => "<",
      CmpOp::Le => "<=",
      CmpOp::Gt => ">",
      CmpOp::Ge => ">=",
    }
  }

  /// Evaluates the operator given the ordering of the left operand relative
  /// to the right one. Unordered operands only satisfy `!=`.
  pub fn holds(self, ordering: Option<Ordering>) -> bool {
    let Some(ordering) = ordering else {
      return self == CmpOp::Ne;
    };
    match self {
      CmpOp::Eq => ordering == Ordering::Equal,
      CmpOp::Ne => ordering != Ordering::Equal,
      CmpOp::Lt => ordering == Ordering::Less,
      CmpOp::Le => ordering != Ordering::Greater,
      CmpOp::Gt => ordering == Ordering::Greater,
      CmpOp::Ge => ordering != Ordering::Less,
    }
  }

  /// Floating point variant: equality is ULP-based, ordering is native.
  fn holds_approx(self, almost_equal: bool, less: bool, greater: bool) -> bool {
    match self {
      CmpOp::Eq => almost_equal,
      CmpOp::Ne => !almost_equal,
      CmpOp::Lt => !almost_equal && less,
      CmpOp::Le => almost_equal || less,
      CmpOp::Gt => !almost_equal && greater,
      CmpOp::Ge => almost_equal || greater,
    }
  }
}

impl fmt::Display for CmpOp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.symbol())
  }
}

/// A value the comparison layer knows how to compare and print.
pub trait CheckValue {
  fn compare(&self, op: CmpOp, rhs: &Self, precision: &Precision) -> bool;

  fn render(&self) -> String;
}

macro_rules! impl_check_value_ord {
  ($($ty:ty),* $(,)?) => {
    $(
      impl CheckValue for $ty {
        fn compare(&self, op: CmpOp, rhs: &Self, _precision: &Precision) -> bool {
          op.holds(self.partial_cmp(rhs))
        }

        fn render(&self) -> String {
          self.to_string()
        }
      }
    )*
  };
}

impl_check_value_ord!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, bool);

impl CheckValue for char {
  fn compare(&self, op: CmpOp, rhs: &Self, _precision: &Precision) -> bool {
    op.holds(self.partial_cmp(rhs))
  }

  fn render(&self) -> String {
    format!("{self:?}")
  }
}

impl CheckValue for str {
  fn compare(&self, op: CmpOp, rhs: &Self, _precision: &Precision) -> bool {
    op.holds(Some(self.as_bytes().cmp(rhs.as_bytes())))
  }

  fn render(&self) -> String {
    format!("{self:?}")
  }
}

impl CheckValue for String {
  fn compare(&self, op: CmpOp, rhs: &Self, precision: &Precision) -> bool {
    self.as_str().compare(op, rhs.as_str(), precision)
  }

  fn render(&self) -> String {
    self.as_str().render()
  }
}

impl<T: ?Sized> CheckValue for *const T {
  fn compare(&self, op: CmpOp, rhs: &Self, _precision: &Precision) -> bool {
    let lhs = self.cast::<()>() as usize;
    let rhs = rhs.cast::<()>() as usize;
    op.holds(Some(lhs.cmp(&rhs)))
  }

  fn render(&self) -> String {
    format!("{:p}", self.cast::<()>())
  }
}

impl<T: ?Sized> CheckValue for *mut T {
  fn compare(&self, op: CmpOp, rhs: &Self, precision: &Precision) -> bool {
    self.cast_const().compare(op, &rhs.cast_const(), precision)
  }

  fn render(&self) -> String {
    self.cast_const().render()
  }
}

impl CheckValue for f32 {
  fn compare(&self, op: CmpOp, rhs: &Self, precision: &Precision) -> bool {
    let equal = almost_equal_f32(*self, *rhs, precision.float_ulps);
    op.holds_approx(equal, self < rhs, self > rhs)
  }

  fn render(&self) -> String {
    format!("{self:?}")
  }
}

impl CheckValue for f64 {
  fn compare(&self, op: CmpOp, rhs: &Self, precision: &Precision) -> bool {
    let equal = almost_equal_f64(*self, *rhs, precision.double_ulps);
    op.holds_approx(equal, self < rhs, self > rhs)
  }

  fn render(&self) -> String {
    format!("{self:?}")
  }
}

impl<T: CheckValue + ?Sized> CheckValue for &T {
  fn compare(&self, op: CmpOp, rhs: &Self, precision: &Precision) -> bool {
    (**self).compare(op, *rhs, precision)
  }

  fn render(&self) -> String {
    (**self).render()
  }
}

impl<T: CheckValue> CheckValue for Option<T> {
  fn compare(&self, op: CmpOp, rhs: &Self, precision: &Precision) -> bool {
    match (self, rhs) {
      (Some(lhs), Some(rhs)) => lhs.compare(op, rhs, precision),
      (None, None) => op.holds(Some(Ordering::Equal)),
      (None, Some(_)) => op.holds(Some(Ordering::Less)),
      (Some(_), None) => op.holds(Some(Ordering::Greater)),
    }
  }

  fn render(&self) -> String {
    match self {
      Some(value) => format!("Some({})", value.render()),
      None => "None".to_string(),
    }
  }
}

fn biased_f32(bits: u32) -> u32 {
  const SIGN: u32 = 1 << 31;
  if bits & SIGN != 0 {
    (!bits).wrapping_add(1)
  } else {
    bits | SIGN
  }
}

fn biased_f64(bits: u64) -> u64 {
  const SIGN: u64 = 1 << 63;
  if bits & SIGN != 0 {
    (!bits).wrapping_add(1)
  } else {
    bits | SIGN
  }
}

/// Distance in ULPs between two finite or infinite `f32`s.
pub fn ulp_distance_f32(a: f32, b: f32) -> u32 {
  biased_f32(a.to_bits()).abs_diff(biased_f32(b.to_bits()))
}

pub fn ulp_distance_f64(a: f64, b: f64) -> u64 {
  biased_f64(a.to_bits()).abs_diff(biased_f64(b.to_bits()))
}

pub fn almost_equal_f32(a: f32, b: f32, max_ulps: u32) -> bool {
  if a.is_nan() || b.is_nan() {
    return false;
  }
  ulp_distance_f32(a, b) <= max_ulps
}

pub fn almost_equal_f64(a: f64, b: f64, max_ulps: u64) -> bool {
  if a.is_nan() || b.is_nan() {
    return false;
  }
  ulp_distance_f64(a, b) <= max_ulps
}

impl TestContext {
  /// Compares `lhs` against `rhs` and fails the case when `op` does not hold.
  ///
  /// Usually reached through [`check_eq!`](crate::check_eq) and friends,
  /// which fill in the source text of both operands.
  #[track_caller]
  pub fn check<V: CheckValue + ?Sized>(
    &self,
    op: CmpOp,
    lhs: &V,
    rhs: &V,
    lhs_expr: &str,
    rhs_expr: &str,
    message: Option<fmt::Arguments<'_>>,
  ) {
    if lhs.compare(op, rhs, &self.precision()) {
      return;
    }

    let location = Location::caller();
    let mut diagnostic = format!(
      "{}:{}: failure\n            expected: '{lhs_expr}' {op} '{rhs_expr}'\n              actual: {} vs {}",
      location.file(),
      location.line(),
      lhs.render(),
      rhs.render(),
    );
    if let Some(message) = message {
      diagnostic.push_str(&format!("\n             message: {message}"));
    }
    self.report_failure(format_args!("{diagnostic}"))
  }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __check_op {
  ($t:expr, $op:ident, $lhs:expr, $rhs:expr, $message:expr) => {
    $t.check(
      $crate::CmpOp::$op,
      &$lhs,
      &$rhs,
      stringify!($lhs),
      stringify!($rhs),
      $message,
    )
  };
}

/// Fails the case unless the boolean condition holds.
#[macro_export]
macro_rules! check {
  ($t:expr, $cond:expr $(,)?) => {
    $crate::__check_op!($t, Eq, $cond, true, None)
  };
  ($t:expr, $cond:expr, $($arg:tt)+) => {
    $crate::__check_op!($t, Eq, $cond, true, Some(format_args!($($arg)+)))
  };
}

#[macro_export]
macro_rules! check_eq {
  ($t:expr, $lhs:expr, $rhs:expr $(,)?) => {
    $crate::__check_op!($t, Eq, $lhs, $rhs, None)
  };
  ($t:expr, $lhs:expr, $rhs:expr, $($arg:tt)+) => {
    $crate::__check_op!($t, Eq, $lhs, $rhs, Some(format_args!($($arg)+)))
  };
}

#[macro_export]
macro_rules! check_ne {
  ($t:expr, $lhs:expr, $rhs:expr $(,)?) => {
    $crate::__check_op!($t, Ne, $lhs, $rhs, None)
  };
  ($t:expr, $lhs:expr, $rhs:expr, $($arg:tt)+) => {
    $crate::__check_op!($t, Ne, $lhs, $rhs, Some(format_args!($($arg)+)))
  };
}

#[macro_export]
macro_rules! check_lt {
  ($t:expr, $lhs:expr, $rhs:expr $(,)?) => {
    $crate::__check_op!($t, Lt, $lhs, $rhs, None)
  };
  ($t:expr, $lhs:expr, $rhs:expr, $($arg:tt)+) => {
    $crate::__check_op!($t, Lt, $lhs, $rhs, Some(format_args!($($arg)+)))
  };
}

#[macro_export]
macro_rules! check_le {
  ($t:expr, $lhs:expr, $rhs:expr $(,)?) => {
    $crate::__check_op!($t, Le, $lhs, $rhs, None)
  };
  ($t:expr, $lhs:expr, $rhs:expr, $($arg:tt)+) => {
    $crate::__check_op!($t, Le, $lhs, $rhs, Some(format_args!($($arg)+)))
  };
}

#[macro_export]
macro_rules! check_gt {
  ($t:expr, $lhs:expr, $rhs:expr $(,)?) => {
    $crate::__check_op!($t, Gt, $lhs, $rhs, None)
  };
  ($t:expr, $lhs:expr, $rhs:expr, $($arg:tt)+) => {
    $crate::__check_op!($t, Gt, $lhs, $rhs, Some(format_args!($($arg)+)))
  };
}

#[macro_export]
macro_rules! check_ge {
  ($t:expr, $lhs:expr, $rhs:expr $(,)?) => {
    $crate::__check_op!($t, Ge, $lhs, $rhs, None)
  };
  ($t:expr, $lhs:expr, $rhs:expr, $($arg:tt)+) => {
    $crate::__check_op!($t, Ge, $lhs, $rhs, Some(format_args!($($arg)+)))
  };
}
