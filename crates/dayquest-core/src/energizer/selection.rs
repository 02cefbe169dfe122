use rand::seq::SliceRandom;
use rand::Rng;

use crate::content::{Catalog, EnergizerId};

/// Pick up to `count` energizers, preferring ones not yet in `used`.
///
/// When fewer than `count` unused energizers remain the whole catalog is
/// eligible again.
pub fn pick_candidates<R: Rng + ?Sized>(
    catalog: &Catalog,
    used: &[EnergizerId],
    count: usize,
    rng: &mut R,
) -> Vec<EnergizerId> {
    let unused: Vec<&EnergizerId> = catalog
        .energizers
        .iter()
        .map(|e| &e.id)
        .filter(|id| !used.contains(id))
        .collect();

    let pool: Vec<&EnergizerId> = if unused.len() >= count {
        unused
    } else {
        catalog.energizers.iter().map(|e| &e.id).collect()
    };

    pool.choose_multiple(rng, count)
        .map(|id| (*id).clone())
        .collect()
}
