//! Boundary synchronization: mirrors `distance` and `numSPs` across every
//! partition boundary once the forward sweep has converged, so the
//! backward sweep can evaluate a remote successor's level/path-count
//! without crossing into the remote partition's own state.
//!
//! Each run is a two-superstep [`Direction::Pull`] round: superstep 1
//! publishes every local vertex's value into the sync channels that
//! reference it (via [`MessageFabric::publish_sync`]) and forces a second
//! superstep; the gather hook, which runs immediately after every
//! partition's kernel in the same superstep, copies what lands in each
//! incoming channel into the owning partition's [`RemoteMirror`]s. Running
//! the copy in `gather` rather than waiting for a dedicated `finalize`
//! step is safe here because the engine completes every partition's
//! kernel before any partition's gather runs, so superstep 1's gather
//! already observes the complete publish set.

use std::sync::atomic::Ordering;

use super::engine::{Direction, RoundHooks, SuperstepCtx};
use super::grooves::MessageFabric;
use super::state::{PartitionState, PartitionUnit, RemoteMirror};

/// Which per-vertex field this round mirrors. `distance` and `numSPs` are
/// synchronized back to back, as two separate rounds reusing the same
/// sync channels, since both are fixed by the time the forward sweep
/// quiesces and neither changes again before the backward sweep starts.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SyncField {
    Distance,
    NumSps,
}

/// The unit of work for a synchronization round: the same partition/state
/// pairing every other round uses.
pub type SyncUnit<'a> = PartitionUnit<'a>;

/// Drives one boundary synchronization round for a single field.
pub struct SyncRound<'a> {
    fabric: &'a MessageFabric,
    field: SyncField,
}

impl<'a> SyncRound<'a> {
    pub fn new(fabric: &'a MessageFabric, field: SyncField) -> Self {
        Self { fabric, field }
    }

    fn read_own(&self, state: &PartitionState, local: usize) -> u32 {
        match self.field {
            SyncField::Distance => state.distance[local].load(Ordering::Acquire),
            SyncField::NumSps => state.num_sps[local].load(Ordering::Acquire),
        }
    }

    fn write_mirror(&self, mirror: &RemoteMirror, slot: usize, value: u32) {
        match self.field {
            SyncField::Distance => mirror.distance[slot].store(value, Ordering::Release),
            SyncField::NumSps => mirror.num_sps[slot].store(value, Ordering::Release),
        }
    }
}

impl<'a> RoundHooks<SyncUnit<'a>> for SyncRound<'a> {
    fn direction(&self) -> Direction {
        Direction::Pull
    }

    fn kernel(&self, unit: &SyncUnit<'a>, ctx: &SuperstepCtx) {
        if !ctx.is_first_superstep() {
            return;
        }

        let PartitionUnit { partition, state } = *unit;
        for local in 0..partition.local_count() {
            let value = self.read_own(state, local as usize);
            self.fabric.publish_sync(partition.id, local, value);
        }
        ctx.report_not_finished();
    }

    fn gather(&self, unit: &SyncUnit<'a>, _ctx: &SuperstepCtx) {
        let PartitionUnit { partition, state } = *unit;
        for channel in self.fabric.incoming_sync(partition.id) {
            let mirror = state
                .remote_mirror(channel.from)
                .expect("partition holds an incoming sync channel with no backing mirror");
            for slot in 0..channel.len() as u32 {
                let value = channel.read(slot);
                self.write_mirror(mirror, slot as usize, value);
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
    use graph_builder::prelude::*;

    #[test]
    fn distance_and_num_sps_mirror_across_the_boundary() {
        // 0 - 1 | 2 - 3, split into two partitions, source 0.
        let graph: UndirectedCsrGraph<usize> = GraphBuilder::new()
            .edges(vec![(0, 1), (1, 2), (2, 3)])
            .build();
        let partitioned = partition_by_range(&graph, 2, |_| PK::Cpu, |_| PartitionAlgorithm::Random);
        let fabric = MessageFabric::build(&partitioned.partitions);
        let states: Vec<PartitionState> = partitioned.partitions.iter().map(PartitionState::new).collect();
        let units: Vec<SyncUnit> = partitioned
            .partitions
            .iter()
            .zip(states.iter())
            .map(|(partition, state)| PartitionUnit { partition, state })
            .collect();

        let engine = Engine::new(partitioned.partition_count());
        engine.execute(&units, &ForwardRound::new(&fabric, 0, 0, 32));

        let distance_round = SyncRound::new(&fabric, SyncField::Distance);
        let supersteps = engine.execute(&units, &distance_round);
        assert_eq!(supersteps, 2);

        let num_sps_round = SyncRound::new(&fabric, SyncField::NumSps);
        engine.execute(&units, &num_sps_round);

        // partition 1 holds vertices {2, 3}; its mirror of partition 0's
        // boundary vertex 1 should now read distance=1, numSPs=1.
        let mirror = states[1]
            .remote_mirror(0)
            .expect("partition 1 has a boundary to partition 0");
        let boundary = partitioned.partitions[1]
            .boundary(0)
            .expect("partition 1 has a boundary to partition 0");
        let slot = boundary.slot_of(1);
        assert_eq!(mirror.distance[slot as usize].load(Ordering::Relaxed), 1);
        assert_eq!(mirror.num_sps[slot as usize].load(Ordering::Relaxed), 1);
    }

    #[test]
    fn running_a_sync_round_twice_in_a_row_is_a_no_op() {
        // Same split as above. Each publish republishes the same
        // authoritative local values every time it runs, so a second,
        // redundant sync sweep must leave the mirrors exactly as the first
        // one left them.
        let graph: UndirectedCsrGraph<usize> = GraphBuilder::new()
            .edges(vec![(0, 1), (1, 2), (2, 3)])
            .build();
        let partitioned = partition_by_range(&graph, 2, |_| PK::Cpu, |_| PartitionAlgorithm::Random);
        let fabric = MessageFabric::build(&partitioned.partitions);
        let states: Vec<PartitionState> = partitioned.partitions.iter().map(PartitionState::new).collect();
        let units: Vec<SyncUnit> = partitioned
            .partitions
            .iter()
            .zip(states.iter())
            .map(|(partition, state)| PartitionUnit { partition, state })
            .collect();

        let engine = Engine::new(partitioned.partition_count());
        engine.execute(&units, &ForwardRound::new(&fabric, 0, 0, 32));
        engine.execute(&units, &SyncRound::new(&fabric, SyncField::Distance));
        engine.execute(&units, &SyncRound::new(&fabric, SyncField::NumSps));

        let mirror = states[1]
            .remote_mirror(0)
            .expect("partition 1 has a boundary to partition 0");
        let boundary = partitioned.partitions[1]
            .boundary(0)
            .expect("partition 1 has a boundary to partition 0");
        let slot = boundary.slot_of(1) as usize;
        let distance_after_first = mirror.distance[slot].load(Ordering::Relaxed);
        let num_sps_after_first = mirror.num_sps[slot].load(Ordering::Relaxed);

        engine.execute(&units, &SyncRound::new(&fabric, SyncField::Distance));
        engine.execute(&units, &SyncRound::new(&fabric, SyncField::NumSps));

        assert_eq!(mirror.distance[slot].load(Ordering::Relaxed), distance_after_first);
        assert_eq!(mirror.num_sps[slot].load(Ordering::Relaxed), num_sps_after_first);
    }
}
