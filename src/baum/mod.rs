pub mod duo_baum;
pub mod duo_level;
pub mod hap_baum;
pub mod hap_level;
pub mod node_map;
pub mod recomb_level;
pub mod recomb_nodes;
pub mod recomb_single_baum;
pub mod single_baum;
pub mod single_level;

/**
 * Floor applied to forward and backward state values before normalization.
 * A positive value that underflows below this floor is clamped up to it.
 */
pub(crate) const MIN_STATE_VALUE: f32 = 100.0 * f32::MIN_POSITIVE;

/**
 * Number of level objects a sampler driver keeps live. In low-memory mode
 * the window holds one run of recent levels plus checkpoints spaced so
 * that any past level can be rebuilt by re-running the forward recursion
 * from the nearest checkpoint; the triangular layout needs
 * ceil((sqrt(1 + 8n) + 1) / 2) slots for n levels.
 */
pub(crate) fn checkpoint_window(n_levels: usize, low_mem: bool) -> usize {
    assert!(n_levels > 0);
    if low_mem {
        let w = (((1.0 + 8.0 * n_levels as f64).sqrt() + 1.0) / 2.0).ceil() as usize;
        std::cmp::min(w, n_levels)
    } else {
        n_levels
    }
}

/**
 * Derives the per-sample random stream from the driver seed, so sampled
 * output does not depend on how samples are distributed over workers.
 */
pub(crate) fn mix_seed(seed: i64, stream: usize) -> u64 {
    let mut z = (seed as u64).wrapping_add((stream as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/**
 * Number of levels inspected by the per-individual capacity pruning pass.
 */
pub(crate) const PRUNE_SAMPLE_SIZE: usize = 20;
