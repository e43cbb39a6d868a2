//! The backward sweep: Brandes' dependency accumulation.
//!
//! Processes levels in descending order, from the highest level any
//! vertex was discovered at during the forward sweep down to level `1`.
//! For each vertex `v` at the current level, `delta[v]` sums, over every
//! successor `w` one level deeper, `(numSPs[v] / numSPs[w]) * (delta[w] +
//! 1)`; the sum is both stored as `v`'s own delta and folded into its
//! running `betweenness` total.
//!
//! The level counter is never mutated in place: it is derived from the
//! round's superstep number the same way [`super::forward`] derives its
//! BFS level, which keeps every partition's notion of "current level" in
//! lockstep without a shared atomic. Superstep 1 is a warm-up superstep
//! with no kernel work, existing only so the placeholder gather for level
//! `max_level + 1` runs before any real computation — mirroring the
//! specification's `engine_superstep() > 1` guard.

use std::sync::Mutex;

use rayon::prelude::*;

use super::config::{warp_width, MAX_THREADS_PER_BLOCK};
use super::engine::{Direction, RoundHooks, SuperstepCtx};
use super::grooves::MessageFabric;
use super::id::GlobalId;
use super::partition::{Partition, PartitionKind};
use super::state::{PartitionState, PartitionUnit};

/// The backward sweep's unit of work: a partition paired with its
/// per-source state.
pub type BackwardUnit<'a> = PartitionUnit<'a>;

const CPU_CHUNK_SIZE: u32 = 256;

/// Host staging buffer for the final betweenness scores, keyed by the
/// engine-wide vertex id. Populated once, by [`BackwardRound::aggr`], on
/// the last superstep of the last source's backward round — the same
/// point an accelerator partition's `betweenness` array would be copied
/// device-to-host before aggregation.
pub struct Aggregator {
    out: Mutex<Vec<f32>>,
    scale: f32,
}

impl Aggregator {
    pub fn new(total_node_count: usize, scale: f32) -> Self {
        Self {
            out: Mutex::new(vec![0.0; total_node_count]),
            scale,
        }
    }

    pub fn into_scores(self) -> Vec<f32> {
        self.out.into_inner().expect("aggregator mutex was never poisoned")
    }
}

/// Drives one full backward sweep for a single source vertex, given the
/// `max_level` the matching forward sweep reached.
pub struct BackwardRound<'a> {
    fabric: &'a MessageFabric,
    max_level: u32,
    /// `Some` only for the last source of a run, so aggregation happens
    /// exactly once.
    aggregator: Option<&'a Aggregator>,
    /// Local vids a single accelerator lane claims per work-stealing step;
    /// see [`super::config::BetweennessConfig::warp_batch_size`].
    warp_batch_size: usize,
}

impl<'a> BackwardRound<'a> {
    pub fn new(
        fabric: &'a MessageFabric,
        max_level: u32,
        aggregator: Option<&'a Aggregator>,
        warp_batch_size: usize,
    ) -> Self {
        Self {
            fabric,
            max_level,
            aggregator,
            warp_batch_size,
        }
    }

    /// The level being processed this superstep, or `max_level + 1` for
    /// the warm-up superstep and beyond. Valid processing happens only
    /// when the result is in `1..=max_level`.
    fn level_at(&self, superstep: usize) -> i64 {
        self.max_level as i64 - superstep as i64 + 2
    }

    fn edge_contribution(&self, partition: &Partition, state: &PartitionState, my_sps: f32, nbr: GlobalId, level: u32) -> f32 {
        if nbr.partition() == partition.id {
            let w = nbr.local() as usize;
            if state.distance[w].load(std::sync::atomic::Ordering::Acquire) == level + 1 {
                let nbr_sps = state.num_sps[w].load(std::sync::atomic::Ordering::Acquire);
                if nbr_sps > 0 {
                    let nbr_delta = state.delta[w].load(std::sync::atomic::Ordering::Acquire);
                    return (my_sps / nbr_sps as f32) * (nbr_delta + 1.0);
                }
            }
            0.0
        } else {
            let mirror = state
                .remote_mirror(nbr.partition())
                .expect("partition referenced a remote vertex with no backing mirror");
            let slot = partition
                .boundary(nbr.partition())
                .expect("partition referenced a remote vertex with no backing boundary")
                .slot_of(nbr.local() as u32);
            if mirror.distance[slot as usize].load(std::sync::atomic::Ordering::Acquire) == level + 1 {
                let nbr_sps = mirror.num_sps[slot as usize].load(std::sync::atomic::Ordering::Acquire);
                if nbr_sps > 0 {
                    let channel = self
                        .fabric
                        .pull_channel(nbr.partition(), partition.id)
                        .expect("partition referenced a remote vertex with no backing pull channel");
                    let nbr_delta = channel.read(slot);
                    return (my_sps / nbr_sps as f32) * (nbr_delta + 1.0);
                }
            }
            0.0
        }
    }

    /// Computes `local`'s dependency value, optionally via a virtual warp
    /// of `lanes` lanes cooperatively striding across its successor list:
    /// lane `i` sums edges `i, i + lanes, i + 2*lanes, ...` into its own
    /// partial, then every lane's partial is folded down with a classic
    /// halving-prefix-sum reduction. `lanes == 1` (the CPU path)
    /// degenerates to a single partial, i.e. the reduction is a no-op.
    fn dependency(&self, unit: &BackwardUnit<'a>, local: u32, level: u32, lanes: usize) -> f32 {
        let PartitionUnit { partition, state } = *unit;
        let my_sps = state.num_sps[local as usize].load(std::sync::atomic::Ordering::Acquire) as f32;
        let neighbors = partition.csr.neighbors(local);
        let degree = neighbors.len();
        let lanes = lanes.max(1).min(degree.max(1));
        let mut partials = vec![0.0f32; lanes];

        for (lane, partial) in partials.iter_mut().enumerate() {
            let mut idx = lane;
            while idx < degree {
                *partial += self.edge_contribution(partition, state, my_sps, neighbors[idx], level);
                idx += lanes;
            }
        }

        halving_reduce(&mut partials)
    }

    fn kernel_cpu(&self, unit: &BackwardUnit<'a>, level: u32) {
        let PartitionUnit { state, .. } = *unit;
        let local_count = state.local_count();
        let next_idx = std::sync::atomic::AtomicU32::new(0);

        // The outer claimed-chunk loop is the only writer of a given local
        // vertex's `delta` slot, so that store needs no read-modify-write;
        // `betweenness` still uses `fetch_add` since it accumulates across
        // sources run out of the same `PartitionState`.
        rayon::broadcast(|_| loop {
            let start = next_idx.fetch_add(CPU_CHUNK_SIZE, std::sync::atomic::Ordering::AcqRel);
            if start >= local_count {
                break;
            }
            let end = (start + CPU_CHUNK_SIZE).min(local_count);
            for local in start..end {
                if state.distance[local as usize].load(std::sync::atomic::Ordering::Acquire) == level {
                    let sum = self.dependency(unit, local, level, 1);
                    state.delta[local as usize].store(sum, std::sync::atomic::Ordering::Release);
                    state.betweenness[local as usize].fetch_add(sum, std::sync::atomic::Ordering::AcqRel);
                }
            }
        });
    }

    fn kernel_accelerator(&self, unit: &BackwardUnit<'a>, level: u32) {
        let PartitionUnit { partition, state } = *unit;
        let local_count = state.local_count();
        let next_idx = std::sync::atomic::AtomicU32::new(0);
        let lane_count = rayon::current_num_threads().min(MAX_THREADS_PER_BLOCK);
        let claim_size = self.warp_batch_size.max(1) as u32;
        let width = warp_width(partition.algorithm);

        (0..lane_count).into_par_iter().for_each(|_| loop {
            let start = next_idx.fetch_add(claim_size, std::sync::atomic::Ordering::AcqRel);
            if start >= local_count {
                break;
            }
            let end = (start + claim_size).min(local_count);
            for local in start..end {
                if state.distance[local as usize].load(std::sync::atomic::Ordering::Acquire) == level {
                    let sum = self.dependency(unit, local, level, width);
                    // Only write back a nonzero partial: `delta` and
                    // `betweenness` both already hold 0 from the reset, so
                    // a zero sum needs no store, mirroring the
                    // warp_offset == 0 / partial > 0 guard a real kernel
                    // uses to skip spurious zero-writes to global memory.
                    if sum != 0.0 {
                        state.delta[local as usize].store(sum, std::sync::atomic::Ordering::Release);
                        state.betweenness[local as usize].fetch_add(sum, std::sync::atomic::Ordering::AcqRel);
                    }
                }
            }
        });
    }
}

/// Folds a virtual warp's per-lane partial sums down to lane 0's value via
/// repeated halving: each step adds the upper half onto the lower half,
/// carrying an odd leftover into the first slot.
fn halving_reduce(partials: &mut [f32]) -> f32 {
    let mut len = partials.len();
    while len > 1 {
        let half = len / 2;
        for i in 0..half {
            partials[i] += partials[i + half];
        }
        if len % 2 == 1 {
            partials[0] += partials[len - 1];
        }
        len = half;
    }
    partials.first().copied().unwrap_or(0.0)
}

impl<'a> RoundHooks<BackwardUnit<'a>> for BackwardRound<'a> {
    fn direction(&self) -> Direction {
        Direction::Pull
    }

    fn kernel(&self, unit: &BackwardUnit<'a>, ctx: &SuperstepCtx) {
        if ctx.is_first_superstep() {
            ctx.report_not_finished();
            return;
        }

        let level = self.level_at(ctx.superstep());
        if level < 1 || level > self.max_level as i64 {
            return;
        }
        let level = level as u32;

        match unit.partition.kind {
            PartitionKind::Cpu => self.kernel_cpu(unit, level),
            PartitionKind::Accelerator => self.kernel_accelerator(unit, level),
        }

        if level > 1 {
            ctx.report_not_finished();
        }
    }

    fn gather(&self, unit: &BackwardUnit<'a>, ctx: &SuperstepCtx) {
        let PartitionUnit { partition, state } = *unit;
        let level = self.level_at(ctx.superstep());
        if level < 0 {
            return;
        }

        for boundary in &partition.boundaries {
            for &local in &boundary.rmt_nbrs {
                if state.distance[local as usize].load(std::sync::atomic::Ordering::Acquire) as i64 == level {
                    let value = state.delta[local as usize].load(std::sync::atomic::Ordering::Acquire);
                    self.fabric.publish_delta(partition.id, local, value);
                }
            }
        }
    }

    fn aggr(&self, units: &[BackwardUnit<'a>], _ctx: &SuperstepCtx) {
        let Some(aggregator) = self.aggregator else {
            return;
        };
        let mut out = aggregator.out.lock().expect("aggregator mutex was never poisoned");
        for unit in units {
            let PartitionUnit { partition, state } = *unit;
            for local in 0..partition.local_count() {
                let global = partition.node_map[local as usize];
                let score = state.betweenness[local as usize].load(std::sync::atomic::Ordering::Acquire);
                out[global as usize] = score * aggregator.scale;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::betweenness::engine::Engine;
    use crate::betweenness::forward::ForwardRound;
    use crate::betweenness::grooves::MessageFabric;
    use crate::betweenness::partition::{partition_by_range, PartitionAlgorithm, PartitionKind as PK};
    use crate::betweenness::state::PartitionState;
    use graph_builder::prelude::*;
    use std::sync::atomic::Ordering;

    fn run_both_sweeps(
        partitions: &[super::super::partition::Partition],
        states: &[PartitionState],
        fabric: &MessageFabric,
        source_partition: u32,
        source_local: u32,
    ) -> u32 {
        let units: Vec<PartitionUnit> = partitions
            .iter()
            .zip(states.iter())
            .map(|(partition, state)| PartitionUnit { partition, state })
            .collect();

        let engine = Engine::new(partitions.len());
        let forward = ForwardRound::new(fabric, source_partition, source_local, 32);
        let supersteps = engine.execute(&units, &forward);
        let max_level = (supersteps - 1) as u32;

        let backward = BackwardRound::new(fabric, max_level, None, 32);
        engine.execute(&units, &backward);

        max_level
    }

    #[test]
    fn five_node_path_matches_the_analytic_oracle() {
        // 1-2-3-4-5 (0-indexed 0..4): bc(0)=bc(4)=0, bc(1)=bc(3)=3, bc(2)=4.
        let graph: UndirectedCsrGraph<usize> = GraphBuilder::new()
            .edges(vec![(0, 1), (1, 2), (2, 3), (3, 4)])
            .build();
        let partitioned = partition_by_range(&graph, 1, |_| PK::Cpu, |_| PartitionAlgorithm::Random);
        let fabric = MessageFabric::build(&partitioned.partitions);
        let states: Vec<PartitionState> = partitioned.partitions.iter().map(PartitionState::new).collect();

        for source in 0..5u32 {
            run_both_sweeps(&partitioned.partitions, &states, &fabric, 0, source);
        }

        let betweenness: Vec<f32> = states[0]
            .betweenness
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect();
        let expected = [0.0, 3.0, 4.0, 3.0, 0.0];
        for (actual, expected) in betweenness.iter().zip(expected.iter()) {
            assert!((actual - expected).abs() < 1e-4, "{betweenness:?} != {expected:?}");
        }
    }

    #[test]
    fn triangle_has_zero_betweenness_everywhere() {
        let graph: UndirectedCsrGraph<usize> = GraphBuilder::new()
            .edges(vec![(0, 1), (1, 2), (0, 2)])
            .build();
        let partitioned = partition_by_range(&graph, 1, |_| PK::Cpu, |_| PartitionAlgorithm::Random);
        let fabric = MessageFabric::build(&partitioned.partitions);
        let states: Vec<PartitionState> = partitioned.partitions.iter().map(PartitionState::new).collect();

        for source in 0..3u32 {
            run_both_sweeps(&partitioned.partitions, &states, &fabric, 0, source);
        }

        for b in &states[0].betweenness {
            assert!(b.load(Ordering::Relaxed).abs() < 1e-4);
        }
    }

    #[test]
    fn star_center_carries_all_the_betweenness() {
        // K1,4: center 0, leaves 1..4. Directed-pairs convention: bc(0) = 6.
        let graph: UndirectedCsrGraph<usize> = GraphBuilder::new()
            .edges(vec![(0, 1), (0, 2), (0, 3), (0, 4)])
            .build();
        let partitioned = partition_by_range(&graph, 1, |_| PK::Cpu, |_| PartitionAlgorithm::Random);
        let fabric = MessageFabric::build(&partitioned.partitions);
        let states: Vec<PartitionState> = partitioned.partitions.iter().map(PartitionState::new).collect();

        for source in 0..5u32 {
            run_both_sweeps(&partitioned.partitions, &states, &fabric, 0, source);
        }

        let betweenness: Vec<f32> = states[0]
            .betweenness
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect();
        assert!((betweenness[0] - 6.0).abs() < 1e-4);
        for leaf in 1..5 {
            assert!(betweenness[leaf].abs() < 1e-4);
        }
    }

    #[test]
    fn delta_of_source_stays_zero() {
        let graph: UndirectedCsrGraph<usize> = GraphBuilder::new()
            .edges(vec![(0, 1), (1, 2), (2, 3)])
            .build();
        let partitioned = partition_by_range(&graph, 1, |_| PK::Cpu, |_| PartitionAlgorithm::Random);
        let fabric = MessageFabric::build(&partitioned.partitions);
        let states: Vec<PartitionState> = partitioned.partitions.iter().map(PartitionState::new).collect();

        run_both_sweeps(&partitioned.partitions, &states, &fabric, 0, 0);

        assert_eq!(states[0].delta[0].load(Ordering::Relaxed), 0.0);
    }

    #[test]
    fn accelerator_partition_matches_the_cpu_oracle() {
        // Same five-node path as `five_node_path_matches_the_analytic_oracle`,
        // run entirely through accelerator kernels.
        let graph: UndirectedCsrGraph<usize> = GraphBuilder::new()
            .edges(vec![(0, 1), (1, 2), (2, 3), (3, 4)])
            .build();
        let partitioned = partition_by_range(&graph, 1, |_| PK::Accelerator, |_| PartitionAlgorithm::Low);
        let fabric = MessageFabric::build(&partitioned.partitions);
        let states: Vec<PartitionState> = partitioned.partitions.iter().map(PartitionState::new).collect();

        for source in 0..5u32 {
            run_both_sweeps(&partitioned.partitions, &states, &fabric, 0, source);
        }

        let betweenness: Vec<f32> = states[0]
            .betweenness
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect();
        let expected = [0.0, 3.0, 4.0, 3.0, 0.0];
        for (actual, expected) in betweenness.iter().zip(expected.iter()) {
            assert!((actual - expected).abs() < 1e-4, "{betweenness:?} != {expected:?}");
        }
    }
}
