//! RNG trait abstraction for the automaton and world generation
//!
//! Rules are generic over `WorldRng` so tests can drive them with a
//! scripted sequence while the scheduler hands each chunk a seeded
//! `Xoshiro256StarStar`.

/// Random number generator trait for world simulation
pub trait WorldRng {
    /// Generate random boolean with 50% probability
    fn gen_bool(&mut self) -> bool;

    /// Generate random u32 over the full range
    fn gen_u32(&mut self) -> u32;

    /// Uniform value in `0..bound` (`bound` must be non-zero)
    fn gen_below(&mut self, bound: u32) -> u32 {
        self.gen_u32() % bound
    }

    /// True once in `chance` draws on average
    fn one_in(&mut self, chance: u32) -> bool {
        chance <= 1 || self.gen_below(chance) == 0
    }
}

// Blanket implementation for any type implementing rand::Rng
impl<T: ?Sized + rand::Rng> WorldRng for T {
    fn gen_bool(&mut self) -> bool {
        rand::Rng::r#gen(self)
    }

    fn gen_u32(&mut self) -> u32 {
        rand::Rng::r#gen(self)
    }
}
