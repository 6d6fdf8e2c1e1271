//! Sampling helpers that refuse to silently truncate.

use crate::error::SimError;
use crate::rand::seq::index::sample as choose_range;
use crate::rand::Rng;

/// Draws `amount` distinct indices from `0..length`, in random order.
///
/// Returns a `SamplingError` when more indices are requested than exist.
pub fn sample_without_replacement<R>(
    rng: &mut R,
    length: usize,
    amount: usize,
) -> Result<Vec<usize>, SimError>
where
    R: Rng + ?Sized,
{
    if amount > length {
        return Err(SimError::SamplingError(format!(
            "cannot draw {amount} distinct items from a pool of {length}"
        )));
    }
    Ok(choose_range(rng, length, amount).into_vec())
}
