//! Source vertex selection for approximate betweenness centrality.
//!
//! Exact BC sums dependency contributions over every vertex as a source;
//! approximate BC instead samples a subset and scales the result, trading
//! accuracy for a much smaller number of forward/backward sweeps. The
//! sample itself is pluggable behind [`SourceSampler`] so a caller with
//! domain knowledge (e.g. bias towards high-degree vertices) can supply
//! their own; [`UniformSampler`] is the reference implementation used when
//! none is supplied.

use nanorand::Rng;

/// Picks the source vertices an approximate run draws its samples from.
/// Implementations only need to produce *some* set of `count` vertex ids
/// in `0..node_count`; duplicates are permitted and simply spend an extra
/// sweep re-visiting the same source.
pub trait SourceSampler {
    fn sample(&self, node_count: usize, count: usize) -> Vec<u64>;
}

/// Draws `count` sources independently and uniformly at random from
/// `0..node_count`, the same `nanorand::tls_rng()` pattern used for
/// per-step neighbor selection elsewhere in this crate.
#[derive(Default)]
pub struct UniformSampler;

impl SourceSampler for UniformSampler {
    fn sample(&self, node_count: usize, count: usize) -> Vec<u64> {
        if node_count == 0 {
            return Vec::new();
        }
        let mut rng = nanorand::tls_rng();
        (0..count).map(|_| rng.generate_range(0..node_count) as u64).collect()
    }
}
