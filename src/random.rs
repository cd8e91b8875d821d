//! Seed-derived random streams.
//!
//! Every unit of parallel work (an annealing chain, a generation's parent
//! selection, one offspring) draws from its own generator whose seed is
//! derived from the master seed and the unit's coordinates. Results are
//! therefore independent of how many worker threads execute the work.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// The generator type used throughout the crate.
pub type SiteRng = ChaCha8Rng;

/// Stream identifiers used when deriving per-task seeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// One annealing chain.
    Chain = 1,
    /// Random padding of the initial refiner population.
    Padding = 2,
    /// Parent selection within a generation.
    Generation = 3,
    /// Variation (crossover + mutation) of a single offspring.
    Offspring = 4,
    /// Niching tie-breaks within a generation.
    Niching = 5,
}

/// Creates a generator from a 64-bit seed.
pub fn create_rng(seed: u64) -> SiteRng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Derives a child seed from a master seed, a stream, and an index path.
///
/// Uses SplitMix64 finalization over the combined words, so neighbouring
/// indices produce unrelated seeds.
pub fn derive_seed(master: u64, stream: Stream, path: &[u64]) -> u64 {
    let mut state = splitmix64(master ^ (stream as u64).wrapping_mul(0xA076_1D64_78BD_642F));
    for &p in path {
        state = splitmix64(state ^ p.wrapping_add(0xE703_7ED1_A0B4_28DB));
    }
    state
}

/// Convenience: a generator for `stream` at `path` under `master`.
pub fn stream_rng(master: u64, stream: Stream, path: &[u64]) -> SiteRng {
    create_rng(derive_seed(master, stream, path))
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
