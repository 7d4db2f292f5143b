use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// `RND`'s PRNG state. Explicit seeding (rather than thread-local entropy)
/// makes `RND(n<0)`'s reseed-and-sample behavior exactly reproducible
/// across repeated runs of the same program within one process.
pub struct RandomState {
    rng: ChaCha8Rng,
}

impl RandomState {
    pub fn new(seed: u64) -> Self {
        Self { rng: ChaCha8Rng::seed_from_u64(seed) }
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// `RND(0|absent)` → uniform `[0, 1)`. `RND(n>0)` → integer `[0, n)`.
    /// `RND(n<0)` reseeds with `|n|` first, then returns a fresh `[0, 1)`
    /// sample (spec.md §4.H).
    pub fn sample(&mut self, arg: f64) -> f64 {
        if arg < 0.0 {
            self.reseed(arg.abs() as u64);
            self.rng.gen::<f64>()
        } else if arg > 0.0 {
            self.rng.gen_range(0..(arg as i64).max(1)) as f64
        } else {
            self.rng.gen::<f64>()
        }
    }
}

impl Default for RandomState {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_produces_same_sequence() {
        let mut a = RandomState::new(42);
        let mut b = RandomState::new(42);
        assert_eq!(a.sample(0.0), b.sample(0.0));
        assert_eq!(a.sample(0.0), b.sample(0.0));
    }

    #[test]
    fn positive_arg_samples_bounded_integer_range() {
        let mut r = RandomState::new(7);
        for _ in 0..50 {
            let v = r.sample(6.0);
            assert!(v >= 0.0 && v < 6.0 && v.fract() == 0.0);
        }
    }

    #[test]
    fn negative_arg_reseeds_deterministically() {
        let mut a = RandomState::new(1);
        a.sample(-99.0);
        let first = a.sample(0.0);
        let mut b = RandomState::new(999_999);
        b.sample(-99.0);
        let second = b.sample(0.0);
        assert_eq!(first, second);
    }
}
