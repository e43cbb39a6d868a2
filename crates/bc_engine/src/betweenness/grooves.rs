//! The "grooves" message fabric: the fixed-size channels partitions use to
//! exchange boundary-vertex values across supersteps.
//!
//! Two directions are modeled. Both are produced by every partition's
//! kernel and consumed by every partition's scatter/gather in the same
//! superstep: the engine runs every kernel to completion before any
//! scatter/gather starts, so a consumer always sees the complete set of
//! messages produced this superstep, never a partial one.
//!
//! - **Push**: the source partition's kernel increments a counter in the
//!   channel; the scatter hook later in the same superstep drains it into
//!   the remote's local state and resets it to zero. This carries
//!   `numSPs` contributions during the forward sweep.
//! - **Pull**: the source partition's kernel overwrites a value in the
//!   channel; the gather hook later in the same superstep copies it into
//!   the remote's local state. This carries `delta`/`distance`/`numSPs`
//!   mirrors during the backward sweep and the synchronization rounds.
//!
//! A channel is a single shared buffer rather than a duplicated
//! outbox-then-inbox pair: since the whole run lives in one address space
//! there is nothing to serialize across, and a shared buffer written by one
//! side and read by the other under the engine's superstep barrier carries
//! the same guarantees an explicit outbox/inbox copy would.

use std::collections::HashMap;
use std::sync::atomic::Ordering;

use atomic::Atomic;
use atomic_float::AtomicF32;

fn slot_lookup(rmt_nbrs: &[u32]) -> HashMap<u32, u32> {
    rmt_nbrs
        .iter()
        .enumerate()
        .map(|(slot, &vid)| (vid, slot as u32))
        .collect()
}

/// The push-direction buffer for one ordered `(from, to)` partition pair:
/// one slot per boundary vertex on `to`'s side, accumulating contributions
/// produced by `from`. Slots are indexed by the boundary vertex's local
/// vid on `to`'s partition.
pub struct PushChannel {
    pub from: u32,
    pub to: u32,
    /// slot -> local vid on `to`.
    rmt_nbrs: Vec<u32>,
    /// local vid on `to` -> slot.
    slot_of: HashMap<u32, u32>,
    values: Box<[Atomic<u32>]>,
}

impl PushChannel {
    fn new(from: u32, to: u32, rmt_nbrs: &[u32]) -> Self {
        Self {
            from,
            to,
            rmt_nbrs: rmt_nbrs.to_vec(),
            slot_of: slot_lookup(rmt_nbrs),
            values: (0..rmt_nbrs.len()).map(|_| Atomic::new(0u32)).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn slot_of(&self, to_local_vid: u32) -> u32 {
        self.slot_of[&to_local_vid]
    }

    /// local vid on `to` that slot `slot` carries a value for.
    #[inline]
    pub fn local_vid(&self, slot: u32) -> u32 {
        self.rmt_nbrs[slot as usize]
    }

    /// Called by the producer's kernel: adds `amount` to the slot for
    /// `remote_local_vid`.
    #[inline]
    pub fn push(&self, slot: u32, amount: u32) {
        self.values[slot as usize].fetch_add(amount, Ordering::AcqRel);
    }

    /// Called by the consumer's scatter hook: drains and zeroes slot
    /// `slot`, returning what had accumulated since the last drain.
    #[inline]
    pub fn drain(&self, slot: u32) -> u32 {
        self.values[slot as usize].swap(0, Ordering::AcqRel)
    }
}

/// The pull-direction buffer for one ordered `(from, to)` partition pair:
/// one slot per boundary vertex on `from`'s side, fully overwritten each
/// superstep by `from` and read wholesale by `to`. Slots are indexed by
/// the boundary vertex's local vid on `from`'s partition.
pub struct PullChannel {
    pub from: u32,
    pub to: u32,
    /// slot -> local vid on `from`.
    rmt_nbrs: Vec<u32>,
    /// local vid on `from` -> slot.
    slot_of: HashMap<u32, u32>,
    values: Box<[AtomicF32]>,
}

impl PullChannel {
    fn new(from: u32, to: u32, rmt_nbrs: &[u32]) -> Self {
        Self {
            from,
            to,
            rmt_nbrs: rmt_nbrs.to_vec(),
            slot_of: slot_lookup(rmt_nbrs),
            values: (0..rmt_nbrs.len()).map(|_| AtomicF32::new(0.0)).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn slot_of(&self, from_local_vid: u32) -> u32 {
        self.slot_of[&from_local_vid]
    }

    #[inline]
    pub fn slot_of_opt(&self, from_local_vid: u32) -> Option<u32> {
        self.slot_of.get(&from_local_vid).copied()
    }

    /// local vid on `from` that slot `slot` carries a value for.
    #[inline]
    pub fn local_vid(&self, slot: u32) -> u32 {
        self.rmt_nbrs[slot as usize]
    }

    /// Called by the producer's kernel: overwrites slot `slot` with `value`.
    #[inline]
    pub fn write(&self, slot: u32, value: f32) {
        self.values[slot as usize].store(value, Ordering::Release);
    }

    /// Called by the consumer's gather hook: reads slot `slot` as it
    /// currently stands.
    #[inline]
    pub fn read(&self, slot: u32) -> f32 {
        self.values[slot as usize].load(Ordering::Acquire)
    }
}

/// A `u32`-valued twin of [`PullChannel`], used by the synchronization
/// sweeps to mirror `distance` and `numSPs` (both integral) across a
/// partition boundary ahead of the backward sweep.
pub struct PullChannelU32 {
    pub from: u32,
    pub to: u32,
    rmt_nbrs: Vec<u32>,
    slot_of: HashMap<u32, u32>,
    values: Box<[Atomic<u32>]>,
}

impl PullChannelU32 {
    fn new(from: u32, to: u32, rmt_nbrs: &[u32]) -> Self {
        Self {
            from,
            to,
            rmt_nbrs: rmt_nbrs.to_vec(),
            slot_of: slot_lookup(rmt_nbrs),
            values: (0..rmt_nbrs.len()).map(|_| Atomic::new(0u32)).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn slot_of_opt(&self, from_local_vid: u32) -> Option<u32> {
        self.slot_of.get(&from_local_vid).copied()
    }

    #[inline]
    pub fn local_vid(&self, slot: u32) -> u32 {
        self.rmt_nbrs[slot as usize]
    }

    #[inline]
    pub fn write(&self, slot: u32, value: u32) {
        self.values[slot as usize].store(value, Ordering::Release);
    }

    #[inline]
    pub fn read(&self, slot: u32) -> u32 {
        self.values[slot as usize].load(Ordering::Acquire)
    }
}

/// All channels for a run, indexed by ordered `(from, to)` partition pair.
/// Built once from a [`super::partition::PartitionedGraph`]'s boundary
/// sets and shared by every partition for the run's duration.
pub struct MessageFabric {
    push: Vec<PushChannel>,
    pull: Vec<PullChannel>,
    /// Reused by both synchronization sweeps (`distance`, then `numSPs`);
    /// each sweep is self-contained and overwrites what the previous one
    /// left behind.
    sync: Vec<PullChannelU32>,
}

impl MessageFabric {
    /// For every partition `p` and every [`super::partition::Boundary`] it holds to some
    /// remote `q` (the distinct local vids on `q` that `p` has edges
    /// into), builds:
    ///
    /// - a push channel `p -> q`, carrying forward-sweep contributions
    ///   `p` computes for `q`'s vertices;
    /// - a pull channel `q -> p`, carrying `q`'s own `delta` mirrored back
    ///   to `p` for cross-partition predecessor lookups during the
    ///   backward sweep;
    /// - a `u32` sync channel `q -> p`, reused to mirror `q`'s `distance`
    ///   and then `numSPs` back to `p` ahead of the backward sweep.
    ///
    /// All three channels share the boundary's vertex set and therefore
    /// its slot layout.
    pub fn build(partitions: &[super::partition::Partition]) -> Self {
        let mut push = Vec::new();
        let mut pull = Vec::new();
        let mut sync = Vec::new();

        for partition in partitions {
            for boundary in &partition.boundaries {
                let q = boundary.remote_partition;
                push.push(PushChannel::new(partition.id, q, &boundary.rmt_nbrs));
                pull.push(PullChannel::new(q, partition.id, &boundary.rmt_nbrs));
                sync.push(PullChannelU32::new(q, partition.id, &boundary.rmt_nbrs));
            }
        }

        Self { push, pull, sync }
    }

    pub fn push_channel(&self, from: u32, to: u32) -> Option<&PushChannel> {
        self.push.iter().find(|c| c.from == from && c.to == to)
    }

    pub fn pull_channel(&self, from: u32, to: u32) -> Option<&PullChannel> {
        self.pull.iter().find(|c| c.from == from && c.to == to)
    }

    pub fn sync_channel(&self, from: u32, to: u32) -> Option<&PullChannelU32> {
        self.sync.iter().find(|c| c.from == from && c.to == to)
    }

    /// Every push channel whose `to` is `partition`, i.e. every remote
    /// partition pushing contributions into `partition`'s vertices.
    pub fn incoming_push(&self, partition: u32) -> impl Iterator<Item = &PushChannel> {
        self.push.iter().filter(move |c| c.to == partition)
    }

    /// Every pull channel whose `to` is `partition`.
    pub fn incoming_pull(&self, partition: u32) -> impl Iterator<Item = &PullChannel> {
        self.pull.iter().filter(move |c| c.to == partition)
    }

    /// Every pull channel whose `from` is `partition`, i.e. every channel
    /// `partition` must publish its own vertex values into.
    pub fn outgoing_pull(&self, partition: u32) -> impl Iterator<Item = &PullChannel> {
        self.pull.iter().filter(move |c| c.from == partition)
    }

    /// Writes `value` (the just-computed delta for `partition`'s own
    /// vertex `local_vid`) into every outgoing pull channel that carries
    /// it, i.e. every channel opened by a remote partition referencing
    /// this vertex as a boundary vertex.
    pub fn publish_delta(&self, partition: u32, local_vid: u32, value: f32) {
        for channel in self.outgoing_pull(partition) {
            if let Some(slot) = channel.slot_of_opt(local_vid) {
                channel.write(slot, value);
            }
        }
    }

    pub fn incoming_sync(&self, partition: u32) -> impl Iterator<Item = &PullChannelU32> {
        self.sync.iter().filter(move |c| c.to == partition)
    }

    pub fn outgoing_sync(&self, partition: u32) -> impl Iterator<Item = &PullChannelU32> {
        self.sync.iter().filter(move |c| c.from == partition)
    }

    /// Writes `value` (one of `partition`'s own `distance`/`numSPs`
    /// values for vertex `local_vid`) into every sync channel that
    /// carries it.
    pub fn publish_sync(&self, partition: u32, local_vid: u32, value: u32) {
        for channel in self.outgoing_sync(partition) {
            if let Some(slot) = channel.slot_of_opt(local_vid) {
                channel.write(slot, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::betweenness::partition::{partition_by_range, PartitionAlgorithm, PartitionKind};
    use graph_builder::prelude::*;

    #[test]
    fn push_channel_drains_to_zero() {
        let graph: UndirectedCsrGraph<usize> = GraphBuilder::new()
            .edges(vec![(0, 1), (1, 2), (2, 3)])
            .build();
        let partitioned = partition_by_range(&graph, 2, |_| PartitionKind::Cpu, |_| PartitionAlgorithm::Random);
        let fabric = MessageFabric::build(&partitioned.partitions);

        let channel = fabric
            .push
            .first()
            .expect("a boundary must exist between the two halves of a path split in two");
        channel.push(0, 3);
        channel.push(0, 4);
        assert_eq!(channel.drain(0), 7);
        assert_eq!(channel.drain(0), 0);
    }

    #[test]
    fn pull_channel_overwrites_not_accumulates() {
        let graph: UndirectedCsrGraph<usize> = GraphBuilder::new()
            .edges(vec![(0, 1), (1, 2), (2, 3)])
            .build();
        let partitioned = partition_by_range(&graph, 2, |_| PartitionKind::Cpu, |_| PartitionAlgorithm::Random);
        let fabric = MessageFabric::build(&partitioned.partitions);

        let channel = fabric.pull.first().expect("expected a boundary");
        channel.write(0, 1.5);
        channel.write(0, 2.5);
        assert_eq!(channel.read(0), 2.5);
    }
}
