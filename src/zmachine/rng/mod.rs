//! Random numbers for `random`.
//!
//! A generator is either random (seeded or from entropy) or predictable, counting
//! 1, 2, ... up to a limit and starting again.
use std::fmt;

pub mod chacha_rng;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    Random,
    Predictable,
}

pub trait ZRng {
    /// Name used in logs
    fn type_name(&self) -> &str;

    /// Reseed and switch to [Mode::Random]. A seed of 0 takes the seed from entropy.
    fn seed(&mut self, seed: u64);

    /// Switch to [Mode::Predictable], counting up to `limit`
    fn predictable(&mut self, limit: u16);

    /// Next value in `1..=range`
    fn random(&mut self, range: u16) -> u16;

    fn mode(&self) -> Mode;
}

impl fmt::Debug for dyn ZRng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.type_name(), self.mode())
    }
}
