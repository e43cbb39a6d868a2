//! Per-partition algorithm state for one betweenness centrality source.
//!
//! Every partition carries its own [`PartitionState`]: atomic arrays sized
//! to its local vertex count (`distance`, `numSPs`, `delta`, the
//! running `betweenness` accumulator) plus the accelerator frontier
//! buffer. State is allocated once per partition and reset in place
//! between sources rather than freed and reallocated.

use std::sync::atomic::{AtomicU32, Ordering};

use atomic_float::AtomicF32;

use super::config::INF_COST;
use super::grooves::PushChannel;
use super::partition::Partition;

/// A mirror of one remote partition's `distance`/`numSPs`/`delta` for the
/// boundary vertices this partition references there. Populated by the
/// distance and numSPs synchronization sweeps (one-time, since neither
/// value changes after the forward sweep) and refreshed every backward
/// superstep for `delta`.
pub struct RemoteMirror {
    pub remote_partition: u32,
    pub distance: Vec<AtomicU32>,
    pub num_sps: Vec<AtomicU32>,
    pub delta: Vec<AtomicF32>,
}

impl RemoteMirror {
    fn new(remote_partition: u32, len: usize) -> Self {
        Self {
            remote_partition,
            distance: (0..len).map(|_| AtomicU32::new(INF_COST)).collect(),
            num_sps: (0..len).map(|_| AtomicU32::new(0)).collect(),
            delta: (0..len).map(|_| AtomicF32::new(0.0)).collect(),
        }
    }

    fn reset(&self) {
        for d in &self.distance {
            d.store(INF_COST, Ordering::Relaxed);
        }
        for s in &self.num_sps {
            s.store(0, Ordering::Relaxed);
        }
        for d in &self.delta {
            d.store(0.0, Ordering::Relaxed);
        }
    }
}

/// Atomic per-vertex arrays for one partition, valid for the duration of a
/// single BFS source.
pub struct PartitionState {
    pub distance: Vec<AtomicU32>,
    pub num_sps: Vec<AtomicU32>,
    pub delta: Vec<AtomicF32>,
    /// Accumulated across the whole run (all sources); not reset between
    /// sources.
    pub betweenness: Vec<AtomicF32>,
    /// Accelerator-only compacted frontier of local vids at the current
    /// level, rebuilt by the forward kernel's frontier builder at the
    /// start of every superstep and then consumed by that same
    /// superstep's neighbor-processing kernel instead of a full
    /// `0..local_count` rescan. Always present so CPU and accelerator
    /// partitions share one state type; CPU kernels simply never touch
    /// it.
    pub frontier: Vec<AtomicU32>,
    /// Number of valid entries in `frontier`. Reset at the start of each
    /// superstep's frontier build, not just once per source.
    pub frontier_len: AtomicU32,
    /// One entry per remote partition this partition holds a boundary to,
    /// in the same order as [`Partition::boundaries`].
    pub remote_mirrors: Vec<RemoteMirror>,
}

impl PartitionState {
    pub fn new(partition: &Partition) -> Self {
        let n = partition.local_count() as usize;
        Self {
            distance: (0..n).map(|_| AtomicU32::new(INF_COST)).collect(),
            num_sps: (0..n).map(|_| AtomicU32::new(0)).collect(),
            delta: (0..n).map(|_| AtomicF32::new(0.0)).collect(),
            betweenness: (0..n).map(|_| AtomicF32::new(0.0)).collect(),
            frontier: (0..n).map(|_| AtomicU32::new(0)).collect(),
            frontier_len: AtomicU32::new(0),
            remote_mirrors: partition
                .boundaries
                .iter()
                .map(|b| RemoteMirror::new(b.remote_partition, b.len()))
                .collect(),
        }
    }

    /// Resets per-source state ahead of a new BFS source. `betweenness` is
    /// left untouched since it accumulates across sources.
    pub fn reset_for_source(&self, source_local: Option<u32>) {
        for d in &self.distance {
            d.store(INF_COST, Ordering::Relaxed);
        }
        for s in &self.num_sps {
            s.store(0, Ordering::Relaxed);
        }
        for d in &self.delta {
            d.store(0.0, Ordering::Relaxed);
        }
        self.frontier_len.store(0, Ordering::Relaxed);
        for mirror in &self.remote_mirrors {
            mirror.reset();
        }

        if let Some(local) = source_local {
            self.distance[local as usize].store(0, Ordering::Relaxed);
            self.num_sps[local as usize].store(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn local_count(&self) -> u32 {
        self.distance.len() as u32
    }

    pub fn remote_mirror(&self, remote_partition: u32) -> Option<&RemoteMirror> {
        self.remote_mirrors
            .iter()
            .find(|m| m.remote_partition == remote_partition)
    }
}

/// How a partition writes a contribution bound for vertex `q` in a remote
/// partition's state: a contribution to the owning partition's own vertex
/// writes straight into [`PartitionState::num_sps`], while a contribution
/// to a remote vertex writes into that remote's inbound [`PushChannel`]
/// slot.
pub enum NumSpsWriteView<'a> {
    Local { slot: &'a AtomicU32 },
    Remote { channel: &'a PushChannel, slot: u32 },
}

impl<'a> NumSpsWriteView<'a> {
    #[inline]
    pub fn add(&self, amount: u32) {
        match self {
            NumSpsWriteView::Local { slot } => {
                slot.fetch_add(amount, Ordering::AcqRel);
            }
            NumSpsWriteView::Remote { channel, slot } => {
                channel.push(*slot, amount);
            }
        }
    }
}

/// One partition paired with its per-source algorithm state: the unit
/// [`super::engine::Engine::execute`] iterates over for every round
/// (forward, the two synchronization sweeps, backward).
#[derive(Clone, Copy)]
pub struct PartitionUnit<'a> {
    pub partition: &'a Partition,
    pub state: &'a PartitionState,
}
