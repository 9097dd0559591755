//! Owner deduplication.
//!
//! Instances sharing a controller are interchangeable for resilience
//! testing, so at most one of them stays in the pool.

use std::collections::HashMap;

use havoc_core::Instance;
use rand::Rng;
use tracing::trace;

/// Reduce `instances` to one uniformly chosen instance per controller.
///
/// Unowned instances are kept in input order, followed by one
/// pick per owner in the order owners were first seen.
pub fn dedupe_by_owner<R>(instances: Vec<Instance>, rng: &mut R) -> Vec<Instance>
where
    R: Rng + ?Sized,
{
    let mut unowned = Vec::new();
    let mut owners: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Instance>> = HashMap::new();

    for instance in instances {
        let Some(uid) = instance.controller_ref().map(|r| r.uid.clone()) else {
            unowned.push(instance);
            continue;
        };
        groups
            .entry(uid.clone())
            .or_insert_with(|| {
                owners.push(uid);
                Vec::new()
            })
            .push(instance);
    }

    let mut result = unowned;
    for uid in owners {
        let Some(mut group) = groups.remove(&uid) else {
            continue;
        };
        if group.is_empty() {
            continue;
        }
        let size = group.len();
        let pick = group.swap_remove(rng.gen_range(0..size));
        trace!(owner = %uid, size, pick = %pick.key(), "kept one instance of owner");
        result.push(pick);
    }
    result
}
