//! Deterministic PRNG for reproducible stress tests.

/// Minimal xorshift64 PRNG, deterministic and reproducible.
///
/// Use a fixed non-zero seed so test runs are identical.
pub struct Xorshift64(u64);

impl Xorshift64 {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub const fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    /// Returns `usize` in `[min, max)`.
    pub fn range_usize(&mut self, min: usize, max: usize) -> usize {
        assert!(min < max, "empty range {min}..{max}");
        let span = (max - min) as u64;
        min + usize::try_from(self.next_u64() % span).unwrap_or(0)
    }

    /// Returns `true` with probability `1 / n`.
    pub fn one_in(&mut self, n: u64) -> bool {
        self.next_u64() % n == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = Xorshift64::new(42);
        let mut b = Xorshift64::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn test_range_bounds() {
        let mut rng = Xorshift64::new(7);
        for _ in 0..1000 {
            let v = rng.range_usize(3, 9);
            assert!((3..9).contains(&v));
        }
    }
}
