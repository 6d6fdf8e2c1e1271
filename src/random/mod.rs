//! Independent, reproducible random number streams stored on a `Context`.
//!
//! Each stream is keyed by a type defined with `define_rng!` and is seeded
//! from the context's base seed plus a hash of the stream's name, so adding
//! draws to one stream never shifts the values produced by another.
mod context_ext;
mod macros;
mod sampling_algorithms;

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;

pub use context_ext::ContextRandomExt;
pub use macros::define_rng;
pub use sampling_algorithms::sample_without_replacement;

use crate::define_data_plugin;
use crate::rand::SeedableRng;

pub trait RngId: Copy + Clone + Any {
    type RngType: SeedableRng;
    fn get_name() -> &'static str;
}

// This is a wrapper that allows for future support for different types of
// random number generators (anything that implements SeedableRng is valid).
struct RngHolder {
    rng: Box<dyn Any>,
}

struct RngData {
    base_seed: u64,
    rng_holders: RefCell<HashMap<TypeId, RngHolder>>,
}

// Registers a data container which stores:
// * base_seed: A base seed for all rngs
// * rng_holders: A map of rngs, keyed by their RngId. Note that this is
//   stored in a RefCell to allow for mutable borrow without requiring a
//   mutable borrow of the Context itself.
define_data_plugin!(
    RngPlugin,
    RngData,
    RngData {
        base_seed: 0,
        rng_holders: RefCell::new(HashMap::new()),
    }
);
