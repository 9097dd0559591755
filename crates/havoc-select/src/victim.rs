//! Random victim selection.

use havoc_core::Instance;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::error::{SelectError, SelectResult};

/// Pick up to `max_kill` distinct victims uniformly at random.
///
/// `max_kill` below one is treated as one. Fails with
/// [`SelectError::NoEligibleCandidate`] when `candidates` is empty.
pub fn select_victims<R>(
    candidates: &[Instance],
    max_kill: usize,
    rng: &mut R,
) -> SelectResult<Vec<Instance>>
where
    R: Rng + ?Sized,
{
    if candidates.is_empty() {
        return Err(SelectError::NoEligibleCandidate);
    }

    let mut victims = candidates.to_vec();
    victims.shuffle(rng);
    victims.truncate(max_kill.max(1));

    debug!(
        candidates = candidates.len(),
        victims = victims.len(),
        "selected victims"
    );
    Ok(victims)
}
