use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{Mode, ZRng};

/// [ZRng] over ChaCha8, which gives the same sequence for a seed on every platform
pub struct ChaChaRng {
    mode: Mode,
    limit: u16,
    counter: u16,
    rng: ChaCha8Rng,
}

impl ChaChaRng {
    /// Random mode, with a fixed seed or from entropy
    pub fn new(seed: Option<u64>) -> ChaChaRng {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        ChaChaRng {
            mode: Mode::Random,
            limit: 1,
            counter: 1,
            rng,
        }
    }
}

impl ZRng for ChaChaRng {
    fn type_name(&self) -> &str {
        "ChaCha8"
    }

    fn seed(&mut self, seed: u64) {
        self.rng = match seed {
            0 => ChaCha8Rng::from_entropy(),
            s => ChaCha8Rng::seed_from_u64(s),
        };
        self.mode = Mode::Random;
    }

    fn predictable(&mut self, limit: u16) {
        self.limit = limit.max(1);
        self.counter = 1;
        self.mode = Mode::Predictable;
    }

    fn random(&mut self, range: u16) -> u16 {
        let range = range.max(1);
        match self.mode {
            Mode::Predictable => {
                // The counter runs to the limit, the result is then folded into range
                let v = (self.counter - 1) % range + 1;
                self.counter = if self.counter >= self.limit {
                    1
                } else {
                    self.counter + 1
                };
                v
            }
            Mode::Random => self.rng.gen_range(1..=range),
        }
    }

    fn mode(&self) -> Mode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_range() {
        let mut rng = ChaChaRng::new(None);
        assert_eq!(rng.mode(), Mode::Random);
        for _ in 0..1000 {
            let v = rng.random(6);
            assert!((1..=6).contains(&v));
        }
        assert_eq!(rng.random(1), 1);
    }

    #[test]
    fn test_seeded_sequence_repeats() {
        let mut a = ChaChaRng::new(Some(1234));
        let mut b = ChaChaRng::new(None);
        b.seed(1234);
        let sa: Vec<u16> = (0..20).map(|_| a.random(100)).collect();
        let sb: Vec<u16> = (0..20).map(|_| b.random(100)).collect();
        assert_eq!(sa, sb);
    }

    #[test]
    fn test_predictable() {
        let mut rng = ChaChaRng::new(None);
        rng.predictable(3);
        assert_eq!(rng.mode(), Mode::Predictable);
        let s: Vec<u16> = (0..7).map(|_| rng.random(10)).collect();
        assert_eq!(s, &[1, 2, 3, 1, 2, 3, 1]);

        rng.predictable(5);
        let s: Vec<u16> = (0..5).map(|_| rng.random(2)).collect();
        assert_eq!(s, &[1, 2, 1, 2, 1]);

        rng.seed(99);
        assert_eq!(rng.mode(), Mode::Random);
    }
}
