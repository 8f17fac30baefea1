//! Initiative rolling.
//!
//! The contract is that a higher bonus means a statistically higher roll:
//! the bonus raises both the floor and the width of the draw. The exact
//! distribution is a named, swappable strategy so tables can pick another
//! (or tests can pin the dice).

use rand::rngs::ThreadRng;
use rand::Rng;

/// Produces one initiative value per entity.
pub trait InitiativeRoller {
    /// Roll a single initiative value for an entity with the given bonus.
    fn roll(&mut self, bonus: i32) -> i32;
}

/// Default strategy.
///
/// Draws `bonus + 1d(20 + bonus)` for non-negative bonuses, so the bonus
/// lifts the floor by itself and widens the die on top. A negative bonus
/// shifts the whole draw down without widening it.
pub struct WeightedRoller<R: Rng = ThreadRng> {
    rng: R,
}

impl WeightedRoller<ThreadRng> {
    pub fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }
}

impl Default for WeightedRoller<ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> WeightedRoller<R> {
    /// Use an explicit RNG (seeded or mock) instead of the thread RNG.
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> InitiativeRoller for WeightedRoller<R> {
    fn roll(&mut self, bonus: i32) -> i32 {
        let sides = 20 + bonus.max(0);
        bonus + self.rng.gen_range(1..=sides)
    }
}

/// Classic tabletop draw: `1d20 + bonus`.
pub struct D20Roller<R: Rng = ThreadRng> {
    rng: R,
}

impl D20Roller<ThreadRng> {
    pub fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }
}

impl Default for D20Roller<ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> D20Roller<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> InitiativeRoller for D20Roller<R> {
    fn roll(&mut self, bonus: i32) -> i32 {
        self.rng.gen_range(1..=20) + bonus
    }
}
