//! The external math-problem collaborator.
//!
//! Mirrors the library interface the protocol assumes: one initialisation
//! (construction seeds the generator) and three draws — an operation name,
//! an integer operand, a float operand.  Built on `rand`'s `StdRng` so
//! tests can construct a seeded instance and get reproducible problems.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::calc::Op;

/// Operand ranges.  Kept modest so products stay far from the wire type's
/// limits (overflow is still defined behaviour, just not interesting to
/// hand out).
const INT_RANGE: std::ops::RangeInclusive<i32> = -10_000..=10_000;
const FLOAT_RANGE: std::ops::Range<f64> = -100.0..100.0;

/// Random source for assignment generation.
pub struct CalcLib {
    rng: StdRng,
}

impl CalcLib {
    /// Initialise from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Initialise from a fixed seed; problems become reproducible.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw one of the eight operation names.
    pub fn random_type(&mut self) -> &'static str {
        Op::ALL[self.rng.random_range(0..Op::ALL.len())].name()
    }

    /// Draw an integer operand.
    pub fn random_int(&mut self) -> i32 {
        self.rng.random_range(INT_RANGE)
    }

    /// Draw a float operand.
    pub fn random_float(&mut self) -> f64 {
        self.rng.random_range(FLOAT_RANGE)
    }
}

impl Default for CalcLib {
    fn default() -> Self {
        Self::new()
    }
}
