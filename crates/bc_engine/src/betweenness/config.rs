//! Tuning constants and the run configuration for a betweenness centrality
//! computation.

/// Sentinel distance for an unreached vertex. Must be distinct from any
/// valid BFS level.
pub const INF_COST: u32 = u32::MAX;

/// Sentinel epsilon requesting exact BC rather than sampled approximation.
pub const CENTRALITY_EXACT: f32 = 0.0;

/// Width of a virtual warp for `RANDOM`/`HIGH` partitioned accelerator
/// partitions: the number of lanes that cooperatively stride-walk one
/// vertex's edge list. Chosen to amortize per-vertex dispatch overhead
/// without starving low-degree vertices of parallelism.
pub const VWARP_MEDIUM_WARP_WIDTH: usize = 8;

/// Number of frontier entries a single accelerator lane claims per
/// iteration of the atomic work-stealing loop, the default for
/// [`BetweennessConfig::warp_batch_size`].
pub const VWARP_MEDIUM_BATCH_SIZE: usize = 32;

/// Upper bound on the number of worker threads cooperating on a single
/// accelerator batch, modeling a GPU thread block; also the virtual warp
/// width used for `LOW` (leaf-heavy) partitions, which give a single
/// high-degree vertex the whole block's width rather than a medium warp.
pub const MAX_THREADS_PER_BLOCK: usize = 256;

/// Picks the virtual warp width, i.e. the number of lanes that
/// cooperatively stride-walk one vertex's edge list, for an accelerator
/// partition given the algorithm it was partitioned with. `RANDOM`/`HIGH`
/// partitions use the medium warp width; `LOW` partitions use a full
/// block width so a high-degree hub's edge list gets as much of the
/// block's parallelism as the CSR skew needs.
pub fn warp_width(algorithm: super::partition::PartitionAlgorithm) -> usize {
    use super::partition::PartitionAlgorithm::*;
    match algorithm {
        Random | High => VWARP_MEDIUM_WARP_WIDTH,
        Low => MAX_THREADS_PER_BLOCK,
    }
}

#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct BetweennessConfig {
    /// Accuracy knob. [`CENTRALITY_EXACT`] requests exact BC; any positive
    /// value requests approximate BC over a sampled source set.
    #[cfg_attr(feature = "clap", clap(long, default_value_t = CENTRALITY_EXACT))]
    pub epsilon: f32,

    /// Number of frontier entries a single accelerator lane claims per
    /// iteration of the atomic work-stealing loop in the forward and
    /// backward kernels. CPU partitions ignore this knob.
    #[cfg_attr(feature = "clap", clap(long, default_value_t = VWARP_MEDIUM_BATCH_SIZE))]
    pub warp_batch_size: usize,
}

impl Default for BetweennessConfig {
    fn default() -> Self {
        Self {
            epsilon: CENTRALITY_EXACT,
            warp_batch_size: VWARP_MEDIUM_BATCH_SIZE,
        }
    }
}

impl BetweennessConfig {
    pub fn new(epsilon: f32) -> Self {
        Self {
            epsilon,
            ..Self::default()
        }
    }

    pub fn is_exact(&self) -> bool {
        self.epsilon <= CENTRALITY_EXACT
    }
}

/// Computes the number of source vertices to sample for approximate BC,
/// following the common `c * log(n) / epsilon^2` Hoeffding-style bound
/// used by approximate betweenness samplers.
pub fn sample_count(node_count: usize, epsilon: f32) -> usize {
    if node_count == 0 {
        return 0;
    }
    let n = node_count as f32;
    let raw = (n.ln().max(1.0)) / (epsilon * epsilon);
    (raw.ceil() as usize).clamp(1, node_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_count_is_bounded_by_node_count() {
        assert_eq!(sample_count(5, 0.1), 5);
        assert!(sample_count(1_000_000, 0.1) <= 1_000_000);
    }

    #[test]
    fn zero_nodes_samples_zero() {
        assert_eq!(sample_count(0, 0.1), 0);
    }

    #[test]
    fn low_partitions_get_full_block_width() {
        use super::super::partition::PartitionAlgorithm;
        assert_eq!(warp_width(PartitionAlgorithm::Low), MAX_THREADS_PER_BLOCK);
        assert_eq!(warp_width(PartitionAlgorithm::Random), VWARP_MEDIUM_WARP_WIDTH);
        assert_eq!(warp_width(PartitionAlgorithm::High), VWARP_MEDIUM_WARP_WIDTH);
    }
}
