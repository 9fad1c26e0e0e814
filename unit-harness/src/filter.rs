/// Prefix that keeps a case out of the run unless disabled cases are
/// explicitly requested.
pub const DISABLED_PREFIX: &str = "DISABLED_";

/// Positive and negative glob patterns matched against `suite.case` names.
///
/// The raw form is a `:`-separated list. A sub-pattern starting with `-` is
/// negative. A name is rejected when any negative pattern matches, otherwise
/// accepted when there are no positive patterns or one of them matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternFilter {
  positive: Vec<String>,
  negative: Vec<String>,
}

impl PatternFilter {
  /// Accepts every name.
  pub fn all() -> Self {
    Self::default()
  }

  pub fn parse(raw: &str) -> Self {
    let mut filter = Self::default();
    for pattern in raw.split(':') {
      match pattern.strip_prefix('-') {
        Some(negative) => filter.negative.push(negative.to_string()),
        None if pattern.is_empty() => {}
        None => filter.positive.push(pattern.to_string()),
      }
    }
    filter
  }

  pub fn is_empty(&self) -> bool {
    self.positive.is_empty() && self.negative.is_empty()
  }

  pub fn positive(&self) -> &[String] {
    &self.positive
  }

  pub fn negative(&self) -> &[String] {
    &self.negative
  }

  pub fn matches(&self, full_name: &str) -> bool {
    if self
      .negative
      .iter()
      .any(|pattern| glob_match(pattern, full_name))
    {
      return false;
    }

    self.positive.is_empty()
      || self
        .positive
        .iter()
        .any(|pattern| glob_match(pattern, full_name))
  }
}

/// Whether the bare case name marks the case as disabled.
pub fn is_disabled(case_name: &str) -> bool {
  case_name.starts_with(DISABLED_PREFIX)
}

/// Case-sensitive glob match where `?` matches exactly one character and `*`
/// matches any run of characters, including an empty one.
///
/// These are the only two metacharacters. `[`, `]`, `{` and `}` match
/// themselves, which is why this is not built on `globset`: its bracket and
/// alternation syntax would change the meaning of existing filters.
pub fn glob_match(pattern: &str, text: &str) -> bool {
  let pattern: Vec<char> = pattern.chars().collect();
  let text: Vec<char> = text.chars().collect();

  let mut p = 0;
  let mut t = 0;
  // Position of the last `*` seen and the text offset it currently absorbs up
  // to; on a mismatch we retry with the star swallowing one more character.
  let mut backtrack: Option<(usize, usize)> = None;

  while t < text.len() {
    match pattern.get(p) {
      Some('*') => {
        backtrack = Some((p, t));
        p += 1;
      }
      Some('?') => {
        p += 1;
        t += 1;
      }
      Some(&c) if c == text[t] => {
        p += 1;
        t += 1;
      }
      _ => match backtrack {
        Some((star, absorbed)) => {
          p = star + 1;
          t = absorbed + 1;
          backtrack = Some((star, absorbed + 1));
        }
        None => return false,
      },
    }
  }

  pattern[p..].iter().all(|c| *c == '*')
}
