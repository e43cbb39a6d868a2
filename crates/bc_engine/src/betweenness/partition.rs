//! Partitioned graph representation.
//!
//! This module defines the shape the hybrid BC engine expects its input
//! in: a [`PartitionedGraph`] made of one [`Partition`] per processing
//! unit, each holding a read-only CSR subgraph whose neighbor lists use
//! composite [`GlobalId`]s, plus a [`Boundary`] per remote partition it
//! references.
//!
//! Producing this shape — i.e. deciding *which* vertex goes on *which*
//! partition, and by what algorithm (`RANDOM`/`HIGH`/`LOW`) — is the job
//! of an external partitioner and is out of scope for this crate. The
//! [`partition_by_range`] function at the bottom of this file is a
//! minimal reference partitioner (a contiguous, degree-balanced range
//! split, in the style of `graph_builder`'s `DegreePartitionOp`) that
//! exists only so the engine is constructible and testable end-to-end; a
//! production deployment would swap it for a more sophisticated
//! partitioner.

use std::collections::HashMap;
use std::ops::Range;

use graph_builder::prelude::*;

use super::id::GlobalId;

/// Which kind of worker executes a partition's hooks.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PartitionKind {
    /// Multi-threaded, shared-memory CPU worker pool.
    Cpu,
    /// Data-parallel accelerator worker: frontier builder + virtual-warp
    /// neighbor processing kernels.
    Accelerator,
}

/// Label describing how a partition's vertex set was chosen. Selects the
/// virtual warp width/batch size used by accelerator kernels; it has no
/// effect on CPU partitions.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum PartitionAlgorithm {
    Random,
    High,
    Low,
}

/// Read-only compressed-sparse-row subgraph for a single partition.
/// Neighbor ids are composite-encoded [`GlobalId`]s.
#[derive(Debug)]
pub struct PartitionCsr {
    offsets: Vec<u32>,
    edges: Vec<GlobalId>,
}

impl PartitionCsr {
    pub fn new(offsets: Vec<u32>, edges: Vec<GlobalId>) -> Self {
        debug_assert!(!offsets.is_empty(), "offsets must carry at least one entry");
        Self { offsets, edges }
    }

    #[inline]
    pub fn node_count(&self) -> u32 {
        (self.offsets.len() - 1) as u32
    }

    #[inline]
    pub fn edge_count(&self) -> u32 {
        self.edges.len() as u32
    }

    #[inline]
    pub fn neighbors(&self, local: u32) -> &[GlobalId] {
        let from = self.offsets[local as usize] as usize;
        let to = self.offsets[local as usize + 1] as usize;
        &self.edges[from..to]
    }

    #[inline]
    pub fn degree(&self, local: u32) -> u32 {
        self.offsets[local as usize + 1] - self.offsets[local as usize]
    }
}

/// The boundary set between a partition `p` and one remote partition `q`:
/// the distinct local vids on `q`'s side that `p` has edges into. This is
/// the fabric's only piece of global knowledge — both `p` and `q` consult
/// the same slot <-> local-vid mapping.
#[derive(Debug)]
pub struct Boundary {
    pub remote_partition: u32,
    /// slot -> local vid on `remote_partition`.
    pub rmt_nbrs: Vec<u32>,
    /// local vid on `remote_partition` -> slot, the inverse of `rmt_nbrs`.
    slot_of: HashMap<u32, u32>,
}

impl Boundary {
    fn new(remote_partition: u32, rmt_nbrs: Vec<u32>) -> Self {
        let slot_of = rmt_nbrs
            .iter()
            .enumerate()
            .map(|(slot, &vid)| (vid, slot as u32))
            .collect();
        Self {
            remote_partition,
            rmt_nbrs,
            slot_of,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rmt_nbrs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rmt_nbrs.is_empty()
    }

    #[inline]
    pub fn slot_of(&self, remote_local_vid: u32) -> u32 {
        self.slot_of[&remote_local_vid]
    }
}

/// One processing unit of the hybrid engine: a CSR subgraph, its kind and
/// partition-algorithm tag, the map back to original engine-wide ids, and
/// the boundary sets to every remote partition it touches.
pub struct Partition {
    pub id: u32,
    pub kind: PartitionKind,
    pub algorithm: PartitionAlgorithm,
    pub csr: PartitionCsr,
    /// `node_map[local_vid]` is the original, engine-wide vertex id.
    pub node_map: Vec<u64>,
    pub boundaries: Vec<Boundary>,
}

impl Partition {
    #[inline]
    pub fn local_count(&self) -> u32 {
        self.csr.node_count()
    }

    pub fn boundary(&self, remote_partition: u32) -> Option<&Boundary> {
        self.boundaries
            .iter()
            .find(|b| b.remote_partition == remote_partition)
    }
}

/// A graph split across partitions, ready to be handed to the BC engine.
pub struct PartitionedGraph {
    pub partitions: Vec<Partition>,
    pub total_node_count: u64,
    /// `node_location[original_vid] = (partition id, local vid)`, the
    /// inverse of every partition's `node_map`. Lets a source sampler walk
    /// original vertex ids without scanning every partition's map.
    pub node_location: Vec<(u32, u32)>,
}

impl PartitionedGraph {
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}

/// A minimal reference partitioner: splits an undirected graph's vertex
/// set into `concurrency` contiguous, degree-balanced ranges (in the style
/// of `graph_builder`'s `DegreePartitionOp::degree_partition`), assigns a
/// [`PartitionKind`] to each range via `kind_of`, and tags each with a
/// [`PartitionAlgorithm`] via `algorithm_of`.
///
/// This is intentionally simple. Real deployments plug in their own
/// partitioner (hash-based, METIS-style, locality-aware, ...); this crate
/// only needs *some* valid partitioning to exercise the engine.
pub fn partition_by_range<NI, G>(
    graph: &G,
    concurrency: usize,
    kind_of: impl Fn(usize) -> PartitionKind,
    algorithm_of: impl Fn(usize) -> PartitionAlgorithm,
) -> PartitionedGraph
where
    NI: Idx,
    G: Graph<NI> + UndirectedDegrees<NI> + UndirectedNeighbors<NI> + Sync,
{
    let node_count = graph.node_count().index();

    if node_count == 0 || concurrency == 0 {
        return PartitionedGraph {
            partitions: Vec::new(),
            total_node_count: node_count as u64,
            node_location: Vec::new(),
        };
    }

    let ranges = degree_balanced_ranges(graph, node_count, concurrency);

    // original vertex id -> (partition id, local vid)
    let mut location = vec![(0u32, 0u32); node_count];
    for (pid, range) in ranges.iter().enumerate() {
        for (local, global) in range.clone().enumerate() {
            location[global] = (pid as u32, local as u32);
        }
    }

    let mut partitions = Vec::with_capacity(ranges.len());

    for (pid, range) in ranges.iter().enumerate() {
        let local_count = range.len();
        let mut offsets = Vec::with_capacity(local_count + 1);
        let mut edges = Vec::new();
        let mut node_map = Vec::with_capacity(local_count);

        // remote partition -> (local vid on remote -> slot), built in
        // discovery order so `rmt_nbrs` lists each boundary vertex once.
        let mut boundary_slots: HashMap<u32, Vec<u32>> = HashMap::new();
        let mut boundary_seen: HashMap<u32, HashMap<u32, u32>> = HashMap::new();

        offsets.push(0u32);
        for global in range.clone() {
            node_map.push(global as u64);

            for &nbr in graph.neighbors(NI::new(global)) {
                let (nbr_pid, nbr_local) = location[nbr.index()];
                edges.push(GlobalId::new(nbr_pid, nbr_local as u64));

                if nbr_pid != pid as u32 {
                    let seen = boundary_seen.entry(nbr_pid).or_default();
                    if !seen.contains_key(&nbr_local) {
                        let slot = seen.len() as u32;
                        seen.insert(nbr_local, slot);
                        boundary_slots.entry(nbr_pid).or_default().push(nbr_local);
                    }
                }
            }

            offsets.push(edges.len() as u32);
        }

        let mut remote_ids: Vec<u32> = boundary_slots.keys().copied().collect();
        remote_ids.sort_unstable();
        let boundaries = remote_ids
            .into_iter()
            .map(|remote_pid| Boundary::new(remote_pid, boundary_slots.remove(&remote_pid).unwrap()))
            .collect();

        partitions.push(Partition {
            id: pid as u32,
            kind: kind_of(pid),
            algorithm: algorithm_of(pid),
            csr: PartitionCsr::new(offsets, edges),
            node_map,
            boundaries,
        });
    }

    PartitionedGraph {
        partitions,
        total_node_count: node_count as u64,
        node_location: location,
    }
}

/// Greedy degree-balanced contiguous range split, the same construction
/// `graph_builder::graph_ops::greedy_node_map_partition` uses internally
/// for `DegreePartitionOp`.
fn degree_balanced_ranges<NI, G>(graph: &G, node_count: usize, concurrency: usize) -> Vec<Range<usize>>
where
    NI: Idx,
    G: Graph<NI> + UndirectedDegrees<NI>,
{
    let total_degree: usize = (0..node_count)
        .map(|n| graph.degree(NI::new(n)).index())
        .sum();
    let batch_size = ((total_degree.max(1)) as f64 / concurrency as f64).ceil() as usize;

    let mut ranges = Vec::with_capacity(concurrency);
    let mut partition_size = 0usize;
    let mut partition_start = 0usize;

    for node in 0..node_count {
        partition_size += graph.degree(NI::new(node)).index();

        let is_last_node = node == node_count - 1;
        if (ranges.len() < concurrency - 1 && partition_size >= batch_size) || is_last_node {
            ranges.push(partition_start..node + 1);
            partition_size = 0;
            partition_start = node + 1;
        }
    }

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_cpu(_: usize) -> PartitionKind {
        PartitionKind::Cpu
    }

    fn all_random(_: usize) -> PartitionAlgorithm {
        PartitionAlgorithm::Random
    }

    #[test]
    fn partitions_a_path_without_losing_edges() {
        let graph: UndirectedCsrGraph<usize> = GraphBuilder::new()
            .edges(vec![(0, 1), (1, 2), (2, 3), (3, 4)])
            .build();

        let partitioned = partition_by_range(&graph, 2, all_cpu, all_random);

        assert_eq!(partitioned.partition_count(), 2);
        let total_local_edges: u32 = partitioned
            .partitions
            .iter()
            .map(|p| p.csr.edge_count())
            .sum();
        // undirected: each of the 4 edges appears twice across endpoints.
        assert_eq!(total_local_edges, 8);
    }

    #[test]
    fn boundary_maps_are_mutually_consistent() {
        let graph: UndirectedCsrGraph<usize> = GraphBuilder::new()
            .edges(vec![(0, 1), (1, 2), (2, 3)])
            .build();

        let partitioned = partition_by_range(&graph, 4, all_cpu, all_random);

        for partition in &partitioned.partitions {
            for boundary in &partition.boundaries {
                for (slot, &remote_local) in boundary.rmt_nbrs.iter().enumerate() {
                    assert_eq!(boundary.slot_of(remote_local), slot as u32);
                }
            }
        }
    }

    #[test]
    fn node_location_inverts_every_partitions_node_map() {
        let graph: UndirectedCsrGraph<usize> = GraphBuilder::new()
            .edges(vec![(0, 1), (1, 2), (2, 3), (3, 4)])
            .build();

        let partitioned = partition_by_range(&graph, 2, all_cpu, all_random);

        for partition in &partitioned.partitions {
            for (local, &global) in partition.node_map.iter().enumerate() {
                assert_eq!(partitioned.node_location[global as usize], (partition.id, local as u32));
            }
        }
    }

    #[test]
    fn single_partition_has_no_boundaries() {
        let graph: UndirectedCsrGraph<usize> = GraphBuilder::new()
            .edges(vec![(0, 1), (1, 2)])
            .build();

        let partitioned = partition_by_range(&graph, 1, all_cpu, all_random);

        assert_eq!(partitioned.partition_count(), 1);
        assert!(partitioned.partitions[0].boundaries.is_empty());
    }
}
