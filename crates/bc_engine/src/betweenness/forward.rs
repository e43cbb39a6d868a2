//! The forward sweep: single-source shortest-path counting.
//!
//! Starting from one source vertex, every superstep expands the frontier
//! one BFS level further, filling in `distance` and `numSPs` for newly
//! reached vertices. CPU partitions scan their local vertex range in
//! rayon-chunked batches (the same atomic-counter chunk-claiming loop
//! used elsewhere for rayon-parallel vertex scans).
//!
//! Accelerator partitions instead run two phases each superstep: a
//! frontier builder compacts every local vid at the current level into
//! [`super::state::PartitionState::frontier`] (a thread-local queue per
//! rayon worker, flushed with one atomic reservation per chunk rather
//! than one per vertex), then the neighbor-processing kernel dispatches
//! work over that compacted frontier instead of the full `0..local_count`
//! range, and relaxes each frontier vertex's edge list with a virtual
//! warp of lanes cooperatively striding across it rather than one lane
//! walking it serially.
//!
//! Cross-partition relaxation never blocks on the remote partition: a
//! contribution to a remote vertex is pushed into the outbound channel
//! slot for it and drained by the remote's scatter hook later in the same
//! superstep (see [`super::grooves`]).

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use rayon::prelude::*;

use super::config::{warp_width, INF_COST, MAX_THREADS_PER_BLOCK};
use super::engine::{Direction, RoundHooks, SuperstepCtx};
use super::grooves::MessageFabric;
use super::id::GlobalId;
use super::partition::{Partition, PartitionKind};
use super::state::{NumSpsWriteView, PartitionState, PartitionUnit};

/// Size of a CPU chunk claimed per iteration of the atomic work-stealing
/// loop.
const CPU_CHUNK_SIZE: u32 = 256;

/// The forward sweep's unit of work: a partition paired with its
/// per-source state.
pub type ForwardUnit<'a> = PartitionUnit<'a>;

/// Drives one full forward sweep from a single source vertex.
pub struct ForwardRound<'a> {
    fabric: &'a MessageFabric,
    source_partition: u32,
    source_local: u32,
    /// Frontier entries an accelerator lane claims per work-stealing step;
    /// see [`super::config::BetweennessConfig::warp_batch_size`].
    warp_batch_size: usize,
}

impl<'a> ForwardRound<'a> {
    pub fn new(fabric: &'a MessageFabric, source_partition: u32, source_local: u32, warp_batch_size: usize) -> Self {
        Self {
            fabric,
            source_partition,
            source_local,
            warp_batch_size,
        }
    }

    fn write_view(&self, from_partition: u32, to: GlobalId, state: &'a PartitionState) -> NumSpsWriteView<'a> {
        if to.partition() == from_partition {
            NumSpsWriteView::Local {
                slot: &state.num_sps[to.local() as usize],
            }
        } else {
            let channel = self
                .fabric
                .push_channel(from_partition, to.partition())
                .expect("partition referenced a remote vertex with no backing push channel");
            NumSpsWriteView::Remote {
                channel,
                slot: channel.slot_of(to.local() as u32),
            }
        }
    }

    /// Relaxes every out-edge of `local`. `lanes` is the width of the
    /// virtual warp cooperatively walking the edge list: each lane `i`
    /// visits neighbor indices `i, i + lanes, i + 2*lanes, ...`. A CPU
    /// partition calls this with `lanes == 1`, which degenerates to a
    /// plain sequential walk.
    fn relax_vertex(
        &self,
        partition: &Partition,
        state: &'a PartitionState,
        local: u32,
        current_level: u32,
        lanes: usize,
        not_finished: &AtomicBool,
    ) {
        let my_sps = state.num_sps[local as usize].load(Ordering::Acquire);
        if my_sps == 0 {
            return;
        }
        let new_level = current_level + 1;
        let neighbors = partition.csr.neighbors(local);
        let degree = neighbors.len();
        let lanes = lanes.max(1).min(degree.max(1));

        for lane in 0..lanes {
            let mut idx = lane;
            while idx < degree {
                let nbr = neighbors[idx];
                if nbr.partition() == partition.id {
                    let w = nbr.local() as usize;
                    let prev = state.distance[w].fetch_min(new_level, Ordering::AcqRel);
                    if prev == INF_COST || prev == new_level {
                        state.num_sps[w].fetch_add(my_sps, Ordering::AcqRel);
                    }
                    if prev == INF_COST {
                        not_finished.store(true, Ordering::Relaxed);
                    }
                } else {
                    self.write_view(partition.id, nbr, state).add(my_sps);
                    not_finished.store(true, Ordering::Relaxed);
                }
                idx += lanes;
            }
        }
    }

    fn kernel_cpu(&self, unit: &ForwardUnit<'a>, current_level: u32, ctx: &SuperstepCtx) {
        let ForwardUnit { partition, state } = *unit;
        let local_count = state.local_count();
        let next_idx = AtomicU32::new(0);
        let not_finished = AtomicBool::new(false);

        rayon::broadcast(|_| loop {
            let start = next_idx.fetch_add(CPU_CHUNK_SIZE, Ordering::AcqRel);
            if start >= local_count {
                break;
            }
            let end = (start + CPU_CHUNK_SIZE).min(local_count);
            for local in start..end {
                if state.distance[local as usize].load(Ordering::Acquire) == current_level {
                    self.relax_vertex(partition, state, local, current_level, 1, &not_finished);
                }
            }
        });

        if not_finished.load(Ordering::Relaxed) {
            ctx.report_not_finished();
        }
    }

    /// Scans every local vertex once and compacts those at `current_level`
    /// into `state.frontier`. Each rayon worker accumulates its chunk's
    /// hits in a thread-local queue and flushes it with a single atomic
    /// reservation against `frontier_len`, rather than one atomic op per
    /// discovered vertex.
    fn build_frontier(&self, state: &PartitionState, current_level: u32) {
        let local_count = state.local_count();
        state.frontier_len.store(0, Ordering::Relaxed);
        let next_idx = AtomicU32::new(0);

        rayon::broadcast(|_| {
            let mut found = Vec::new();
            loop {
                let start = next_idx.fetch_add(CPU_CHUNK_SIZE, Ordering::AcqRel);
                if start >= local_count {
                    break;
                }
                let end = (start + CPU_CHUNK_SIZE).min(local_count);
                found.clear();
                for local in start..end {
                    if state.distance[local as usize].load(Ordering::Acquire) == current_level {
                        found.push(local);
                    }
                }
                if !found.is_empty() {
                    let base = state.frontier_len.fetch_add(found.len() as u32, Ordering::AcqRel);
                    for (i, &local) in found.iter().enumerate() {
                        state.frontier[base as usize + i].store(local, Ordering::Release);
                    }
                }
            }
        });
    }

    fn kernel_accelerator(&self, unit: &ForwardUnit<'a>, current_level: u32, ctx: &SuperstepCtx) {
        let ForwardUnit { partition, state } = *unit;
        self.build_frontier(state, current_level);

        let frontier_count = state.frontier_len.load(Ordering::Acquire);
        let not_finished = AtomicBool::new(false);
        let lane_count = rayon::current_num_threads().min(MAX_THREADS_PER_BLOCK);
        let claim_size = self.warp_batch_size.max(1) as u32;
        let width = warp_width(partition.algorithm);
        let next_idx = AtomicU32::new(0);

        (0..lane_count).into_par_iter().for_each(|_| loop {
            let start = next_idx.fetch_add(claim_size, Ordering::AcqRel);
            if start >= frontier_count {
                break;
            }
            let end = (start + claim_size).min(frontier_count);
            for i in start..end {
                let local = state.frontier[i as usize].load(Ordering::Acquire);
                self.relax_vertex(partition, state, local, current_level, width, &not_finished);
            }
        });

        if not_finished.load(Ordering::Relaxed) {
            ctx.report_not_finished();
        }
    }
}

impl<'a> RoundHooks<ForwardUnit<'a>> for ForwardRound<'a> {
    fn direction(&self) -> Direction {
        Direction::Push
    }

    fn init(&self, unit: &ForwardUnit<'a>, _ctx: &SuperstepCtx) {
        let is_source_partition = unit.partition.id == self.source_partition;
        unit.state
            .reset_for_source(is_source_partition.then_some(self.source_local));
    }

    fn kernel(&self, unit: &ForwardUnit<'a>, ctx: &SuperstepCtx) {
        let current_level = (ctx.superstep() - 1) as u32;
        match unit.partition.kind {
            PartitionKind::Cpu => self.kernel_cpu(unit, current_level, ctx),
            PartitionKind::Accelerator => self.kernel_accelerator(unit, current_level, ctx),
        }
    }

    fn scatter(&self, unit: &ForwardUnit<'a>, ctx: &SuperstepCtx) {
        let new_level = ctx.superstep() as u32;
        for channel in self.fabric.incoming_push(unit.partition.id) {
            for slot in 0..channel.len() as u32 {
                let amount = channel.drain(slot);
                if amount == 0 {
                    continue;
                }

                let local = channel.local_vid(slot) as usize;
                let prev = unit.state.distance[local].fetch_min(new_level, Ordering::AcqRel);
                if prev == INF_COST || prev == new_level {
                    unit.state.num_sps[local].fetch_add(amount, Ordering::AcqRel);
                }
                if prev == INF_COST {
                    ctx.report_not_finished();
                }
            }
        }
    }
}
