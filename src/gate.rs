//! Top-k selection policy for hidden and output layers.
//!
//! After a whole layer has its raw activations computed, the gate keeps only
//! the `k` highest-activation units, and even those only when they clear an
//! absolute floor. Ranking uses a stable sort so that ties resolve to the
//! lower unit index, keeping results reproducible within a run.

use std::cmp::Ordering;

/// Compute the active mask for one layer.
///
/// Ranks `activations` descending (stable, so ties keep index order) and
/// marks the top `k` entries whose value strictly exceeds `floor`. Entries
/// ranked beyond `k`, or at/under the floor, stay inactive. The activations
/// themselves are not modified; callers clamp the survivors.
///
/// `k` larger than the layer is treated as the whole layer; `k == 0` leaves
/// everything inactive.
#[must_use]
pub fn top_k_mask(activations: &[f32], k: usize, floor: f32) -> Vec<bool> {
    let mut order: Vec<usize> = (0..activations.len()).collect();
    // Stable sort: equal activations keep ascending index order.
    order.sort_by(|&a, &b| {
        activations[b]
            .partial_cmp(&activations[a])
            .unwrap_or(Ordering::Equal)
    });

    let mut mask = vec![false; activations.len()];
    for &idx in order.iter().take(k) {
        if activations[idx] > floor {
            mask[idx] = true;
        }
    }
    mask
}
