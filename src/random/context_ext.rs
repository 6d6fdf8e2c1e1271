use std::any::TypeId;
use std::cell::RefMut;

use log::trace;
use xxhash_rust::xxh3::xxh3_64;

use crate::context::Context;
use crate::error::SimError;
use crate::rand::distr::uniform::{SampleRange, SampleUniform};
use crate::rand::distr::weighted::WeightedIndex;
use crate::rand::distr::Distribution;
use crate::rand::{Rng, SeedableRng};
use crate::random::{RngHolder, RngId, RngPlugin};

/// Borrows the stream for `R`, creating it on first use. A stream's seed is
/// the base seed offset by the hash of the stream name.
///
/// Panics if `init_random` was never called on this context.
fn stream<R: RngId + 'static>(context: &Context) -> RefMut<'_, R::RngType> {
    let data = context
        .get_data(RngPlugin)
        .expect("init_random must be called before drawing random numbers");

    RefMut::map(data.rng_holders.borrow_mut(), |holders| {
        let holder = holders.entry(TypeId::of::<R>()).or_insert_with(|| {
            let seed = data.base_seed.wrapping_add(xxh3_64(R::get_name().as_bytes()));
            trace!("opening stream {} (seed={seed})", R::get_name());
            RngHolder {
                rng: Box::new(R::RngType::seed_from_u64(seed)),
            }
        });
        holder
            .rng
            .downcast_mut::<R::RngType>()
            .expect("stream registered under a foreign type")
    })
}

/// Random draws on a `Context`, one reproducible stream per `RngId`.
pub trait ContextRandomExt {
    /// Sets the base seed. Existing streams are dropped and re-created from
    /// the new seed when they are next used.
    fn init_random(&mut self, base_seed: u64);

    /// Runs `sampler` against the stream for `rng_id`.
    fn sample<R: RngId + 'static, T>(
        &self,
        rng_id: R,
        sampler: impl FnOnce(&mut R::RngType) -> T,
    ) -> T;

    /// One draw from `distribution`.
    fn sample_distr<R: RngId + 'static, T>(
        &self,
        rng_id: R,
        distribution: impl Distribution<T>,
    ) -> T
    where
        R::RngType: Rng;

    /// One uniform draw from `range`.
    fn sample_range<R: RngId + 'static, S, T>(&self, rng_id: R, range: S) -> T
    where
        R::RngType: Rng,
        S: SampleRange<T>,
        T: SampleUniform;

    /// True when a uniform draw on `[0, 1)` falls below `p`. Values of `p`
    /// at or above 1 always succeed and values at or below 0 never do.
    fn sample_chance<R: RngId + 'static>(&self, rng_id: R, p: f64) -> bool
    where
        R::RngType: Rng;

    /// Index into `weights`, chosen in proportion to the weight.
    ///
    /// # Errors
    ///
    /// Returns a `SamplingError` when the weights are empty, negative, or
    /// sum to zero.
    fn sample_weighted<R: RngId + 'static>(
        &self,
        rng_id: R,
        weights: &[f64],
    ) -> Result<usize, SimError>
    where
        R::RngType: Rng;
}

impl ContextRandomExt for Context {
    fn init_random(&mut self, base_seed: u64) {
        trace!("random base seed {base_seed}");
        let data = self.get_data_mut(RngPlugin);
        data.base_seed = base_seed;
        data.rng_holders.get_mut().clear();
    }

    fn sample<R: RngId + 'static, T>(
        &self,
        _rng_id: R,
        sampler: impl FnOnce(&mut R::RngType) -> T,
    ) -> T {
        sampler(&mut stream::<R>(self))
    }

    fn sample_distr<R: RngId + 'static, T>(
        &self,
        rng_id: R,
        distribution: impl Distribution<T>,
    ) -> T
    where
        R::RngType: Rng,
    {
        self.sample(rng_id, |rng| distribution.sample(rng))
    }

    fn sample_range<R: RngId + 'static, S, T>(&self, rng_id: R, range: S) -> T
    where
        R::RngType: Rng,
        S: SampleRange<T>,
        T: SampleUniform,
    {
        self.sample(rng_id, |rng| rng.random_range(range))
    }

    fn sample_chance<R: RngId + 'static>(&self, rng_id: R, p: f64) -> bool
    where
        R::RngType: Rng,
    {
        let draw: f64 = self.sample(rng_id, |rng| rng.random());
        draw < p
    }

    fn sample_weighted<R: RngId + 'static>(
        &self,
        rng_id: R,
        weights: &[f64],
    ) -> Result<usize, SimError>
    where
        R::RngType: Rng,
    {
        let index = WeightedIndex::new(weights)
            .map_err(|err| SimError::SamplingError(format!("bad weights {weights:?}: {err}")))?;
        Ok(self.sample(rng_id, |rng| index.sample(rng)))
    }
}
