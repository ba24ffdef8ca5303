//! Randomness abstraction.

use rand::seq::SliceRandom;
use rand::Rng;

/// Uniform random choices.
///
/// The picker works on indices so it stays object safe; callers permute
/// their own sequences with the returned order.
pub trait RandomPicker: Send + Sync {
    /// A uniformly random permutation of `0..len`.
    fn permutation(&self, len: usize) -> Vec<usize>;

    /// A uniformly random index in `0..n`. `n` must be non-zero.
    ///
    /// Trivia only needs permutations; single draws are for mods like a
    /// prize wheel that pick one outcome.
    fn pick(&self, n: usize) -> usize;
}

/// Shuffles `items` in place using `picker`.
pub fn shuffle<T>(picker: &dyn RandomPicker, items: &mut Vec<T>) {
    let order = picker.permutation(items.len());
    let mut slots: Vec<Option<T>> = items.drain(..).map(Some).collect();
    items.extend(order.into_iter().filter_map(|i| slots.get_mut(i).and_then(Option::take)));
}

/// Thread-local RNG backed picker.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomPicker for ThreadRandom {
    fn permutation(&self, len: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(&mut rand::thread_rng());
        order
    }

    fn pick(&self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..n)
    }
}
