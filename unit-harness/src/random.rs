use crate::list::NodeList;
use std::time::{SystemTime, UNIX_EPOCH};

const MULTIPLIER: u64 = 6364136223846793005;

/// 64-bit linear congruential generator emitting the high 31 bits of state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lcg {
  state: u64,
}

impl Lcg {
  pub fn new(seed: u64) -> Self {
    Self { state: seed }
  }

  pub fn seed(&mut self, seed: u64) {
    self.state = seed;
  }

  pub fn next_u32(&mut self) -> u32 {
    self.state = self.state.wrapping_mul(MULTIPLIER).wrapping_add(1);
    (self.state >> 33) as u32
  }
}

/// Seed used when the caller did not supply one.
pub fn seed_from_time() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|elapsed| elapsed.as_secs() ^ u64::from(elapsed.subsec_nanos()))
    .unwrap_or(0)
}

/// Reorders `list` by repeatedly drawing a random remaining node, unlinking
/// it, and appending it to a fresh order that then replaces the list.
pub fn shuffle<T>(list: &mut NodeList<T>, rng: &mut Lcg) {
  let mut fresh = Vec::with_capacity(list.len());
  while !list.is_empty() {
    let index = rng.next_u32() as usize % list.len();
    let Some(id) = list.nth(index) else {
      break;
    };
    list.erase(id);
    fresh.push(id);
  }

  for id in fresh {
    list.relink_back(id);
  }
}
