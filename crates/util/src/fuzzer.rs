use rand::{rngs::OsRng, Rng, RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use std::sync::{Arc, Mutex, MutexGuard};

/// Seeded source of randomness for generated documents and operations.
///
/// Uses the xoshiro256** PRNG so that a failing randomized test can be
/// replayed from its seed.
///
/// # Examples
///
/// ```
/// use wave_model_util::fuzzer::Fuzzer;
///
/// let fuzzer = Fuzzer::new(Some([7u8; 32]));
/// let n = fuzzer.random_int(1, 10);
/// assert!((1..=10).contains(&n));
///
/// let tags = ["p", "line", "body"];
/// assert!(tags.contains(fuzzer.pick(&tags)));
/// ```
pub struct Fuzzer {
    /// The seed used to initialize the PRNG.
    pub seed: [u8; 32],
    rng: Arc<Mutex<Xoshiro256StarStar>>,
}

impl Fuzzer {
    /// Create a new fuzzer with an optional seed.
    ///
    /// If no seed is provided, a random seed will be generated using `OsRng`.
    pub fn new(seed: Option<[u8; 32]>) -> Self {
        let seed = seed.unwrap_or_else(|| {
            let mut bytes = [0u8; 32];
            OsRng.fill_bytes(&mut bytes);
            bytes
        });

        Self {
            seed,
            rng: Arc::new(Mutex::new(Xoshiro256StarStar::from_seed(seed))),
        }
    }

    /// Seed from a single number, convenient for test loops.
    pub fn from_u64(seed: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&seed.to_le_bytes());
        Self::new(Some(bytes))
    }

    // A panic inside a caller's closure cannot leave the PRNG state torn.
    fn rng(&self) -> MutexGuard<'_, Xoshiro256StarStar> {
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Generate a random integer in the range [min, max] (inclusive).
    pub fn random_int(&self, min: i64, max: i64) -> i64 {
        self.rng().gen_range(min..=max)
    }

    /// Generate a random index in `0..len`. `len` must be positive.
    pub fn random_index(&self, len: usize) -> usize {
        self.rng().gen_range(0..len)
    }

    /// Pick a random element from a non-empty slice.
    pub fn pick<'a, T>(&self, elements: &'a [T]) -> &'a T {
        &elements[self.random_index(elements.len())]
    }

    /// Repeat a callback `times` times and collect results.
    pub fn repeat<T, F>(&self, times: usize, mut callback: F) -> Vec<T>
    where
        F: FnMut() -> T,
    {
        (0..times).map(|_| callback()).collect()
    }

    /// Generate a random f64 in the range [0, 1).
    pub fn random(&self) -> f64 {
        self.rng().gen::<f64>()
    }

    /// Generate a random boolean with the given probability of being true.
    pub fn random_bool(&self, probability: f64) -> bool {
        self.rng().gen_bool(probability)
    }

    /// Generate a random string of the specified length from the given characters.
    pub fn random_string(&self, len: usize, chars: &str) -> String {
        let chars: Vec<char> = chars.chars().collect();
        let mut rng = self.rng();
        (0..len)
            .map(|_| chars[rng.gen_range(0..chars.len())])
            .collect()
    }

    /// Shuffle a slice in place (Fisher-Yates).
    pub fn shuffle<T>(&self, items: &mut [T]) {
        let mut rng = self.rng();
        for i in (1..items.len()).rev() {
            let j = rng.gen_range(0..=i);
            items.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuzzer_random_int() {
        let fuzzer = Fuzzer::new(None);
        for _ in 0..100 {
            let n = fuzzer.random_int(1, 10);
            assert!((1..=10).contains(&n));
        }
    }

    #[test]
    fn test_fuzzer_pick() {
        let fuzzer = Fuzzer::new(None);
        let choices = vec!["a", "b", "c"];
        for _ in 0..100 {
            let picked = fuzzer.pick(&choices);
            assert!(choices.contains(picked));
        }
    }

    #[test]
    fn test_fuzzer_repeat() {
        let fuzzer = Fuzzer::new(None);
        let results: Vec<i32> = fuzzer.repeat(5, || 42);
        assert_eq!(results, vec![42, 42, 42, 42, 42]);
    }

    #[test]
    fn test_fuzzer_reproducible() {
        let fuzzer1 = Fuzzer::from_u64(17);
        let fuzzer2 = Fuzzer::from_u64(17);
        for _ in 0..10 {
            assert_eq!(fuzzer1.random_int(0, 1000), fuzzer2.random_int(0, 1000));
        }
        assert_eq!(fuzzer1.random_string(8, "xyz"), fuzzer2.random_string(8, "xyz"));
    }

    #[test]
    fn test_fuzzer_random() {
        let fuzzer = Fuzzer::new(None);
        for _ in 0..100 {
            let r = fuzzer.random();
            assert!((0.0..1.0).contains(&r));
        }
    }

    #[test]
    fn test_fuzzer_random_bool() {
        let fuzzer = Fuzzer::from_u64(3);
        let mut has_true = false;
        let mut has_false = false;
        for _ in 0..100 {
            if fuzzer.random_bool(0.5) {
                has_true = true;
            } else {
                has_false = true;
            }
        }
        assert!(has_true && has_false);
    }

    #[test]
    fn test_fuzzer_random_string() {
        let fuzzer = Fuzzer::new(None);
        let s = fuzzer.random_string(10, "abc");
        assert_eq!(s.len(), 10);
        assert!(s.chars().all(|c| "abc".contains(c)));
    }

    #[test]
    fn test_fuzzer_shuffle_is_permutation() {
        let fuzzer = Fuzzer::from_u64(99);
        let mut items: Vec<u32> = (0..20).collect();
        fuzzer.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }
}
