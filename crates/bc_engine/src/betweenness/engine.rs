//! The bulk-synchronous-parallel execution engine.
//!
//! A round runs a fixed hook order every superstep: `init` (superstep 1
//! only), `kernel` (always), then `scatter` if the round pushes or
//! `gather` if it pulls. Every partition starts each superstep marked
//! finished; a hook clears its own partition's flag by calling
//! [`SuperstepCtx::report_not_finished`] when it still has work queued.
//! Once every partition reports finished in the same superstep, the
//! engine runs `finalize` and `aggr` for that superstep and the round
//! ends. This mirrors the fixed hook order and the finished-flag
//! discipline partition-parallel BSP frameworks use to detect
//! quiescence without a central coordinator deciding it unilaterally.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

/// Whether a round's boundary contributions are produced (`Push`, drained
/// by the remote's scatter hook next superstep) or consumed (`Pull`,
/// copied in whole by the remote's gather hook next superstep).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Direction {
    Push,
    Pull,
}

/// Per-partition, per-superstep context handed to every hook. Bundles the
/// superstep number (1-based) and the shared finished-flag array so a
/// kernel can report it still has work without needing a mutable
/// reference to engine state.
pub struct SuperstepCtx<'a> {
    partition: u32,
    superstep: usize,
    finished: &'a [AtomicBool],
}

impl<'a> SuperstepCtx<'a> {
    #[inline]
    pub fn partition(&self) -> u32 {
        self.partition
    }

    /// 1-based superstep counter, reset to 1 at the start of every round.
    #[inline]
    pub fn superstep(&self) -> usize {
        self.superstep
    }

    #[inline]
    pub fn is_first_superstep(&self) -> bool {
        self.superstep == 1
    }

    /// Clears this partition's finished flag, keeping the round alive for
    /// at least one more superstep.
    #[inline]
    pub fn report_not_finished(&self) {
        self.finished[self.partition as usize].store(false, Ordering::Relaxed);
    }
}

/// The hooks a single BSP round implements. `kernel` is mandatory; the
/// rest default to no-ops so a round only needs to define the hooks its
/// algorithm phase actually uses.
pub trait RoundHooks<P>: Sync {
    fn direction(&self) -> Direction;

    fn init(&self, _partition: &P, _ctx: &SuperstepCtx) {}

    fn kernel(&self, partition: &P, ctx: &SuperstepCtx);

    fn scatter(&self, _partition: &P, _ctx: &SuperstepCtx) {}

    fn gather(&self, _partition: &P, _ctx: &SuperstepCtx) {}

    fn finalize(&self, _partition: &P, _ctx: &SuperstepCtx) {}

    /// Runs once, after every partition's `finalize` for the round's final
    /// superstep, with read access to every partition.
    fn aggr(&self, _partitions: &[P], _ctx: &SuperstepCtx) {}
}

/// Owns the per-partition finished flags and drives rounds to
/// completion. One engine is reused across every round of a BC source
/// (forward sweep, sync sweeps, backward sweep) since the flag array only
/// depends on the partition count.
pub struct Engine {
    finished: Vec<AtomicBool>,
}

impl Engine {
    pub fn new(partition_count: usize) -> Self {
        Self {
            finished: (0..partition_count).map(|_| AtomicBool::new(true)).collect(),
        }
    }

    pub fn partition_count(&self) -> usize {
        self.finished.len()
    }

    /// Runs a round to quiescence: repeats supersteps until every
    /// partition reports finished in the same superstep, then runs
    /// `finalize`/`aggr` for that last superstep.
    ///
    /// Returns the number of supersteps executed.
    pub fn execute<P, H>(&self, partitions: &[P], hooks: &H) -> usize
    where
        P: Sync,
        H: RoundHooks<P>,
    {
        assert_eq!(
            partitions.len(),
            self.finished.len(),
            "engine was built for a different partition count"
        );

        let mut superstep = 1usize;

        loop {
            for flag in &self.finished {
                flag.store(true, Ordering::Relaxed);
            }

            // Every partition's kernel runs to completion before any
            // partition's scatter/gather begins, so a scatter/gather hook
            // always observes the full set of messages every kernel
            // produced this same superstep, never a partial subset.
            partitions.par_iter().enumerate().for_each(|(idx, partition)| {
                let ctx = SuperstepCtx {
                    partition: idx as u32,
                    superstep,
                    finished: &self.finished,
                };

                if ctx.is_first_superstep() {
                    hooks.init(partition, &ctx);
                }

                hooks.kernel(partition, &ctx);
            });

            partitions.par_iter().enumerate().for_each(|(idx, partition)| {
                let ctx = SuperstepCtx {
                    partition: idx as u32,
                    superstep,
                    finished: &self.finished,
                };

                match hooks.direction() {
                    Direction::Push => hooks.scatter(partition, &ctx),
                    Direction::Pull => hooks.gather(partition, &ctx),
                }
            });

            let all_finished = self.finished.iter().all(|f| f.load(Ordering::Relaxed));

            if all_finished {
                partitions.par_iter().enumerate().for_each(|(idx, partition)| {
                    let ctx = SuperstepCtx {
                        partition: idx as u32,
                        superstep,
                        finished: &self.finished,
                    };
                    hooks.finalize(partition, &ctx);
                });

                let final_ctx = SuperstepCtx {
                    partition: 0,
                    superstep,
                    finished: &self.finished,
                };
                hooks.aggr(partitions, &final_ctx);

                return superstep;
            }

            superstep += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Countdown {
        remaining: Vec<AtomicUsize>,
    }

    struct CountdownHooks;

    impl RoundHooks<Countdown> for CountdownHooks {
        fn direction(&self) -> Direction {
            Direction::Push
        }

        fn kernel(&self, partition: &Countdown, ctx: &SuperstepCtx) {
            let remaining = &partition.remaining[ctx.partition() as usize];
            let value = remaining.load(Ordering::Relaxed);
            if value > 0 {
                remaining.store(value - 1, Ordering::Relaxed);
                ctx.report_not_finished();
            }
        }
    }

    #[test]
    fn round_runs_until_every_partition_is_quiescent() {
        let partitions = vec![
            Countdown {
                remaining: vec![AtomicUsize::new(3)],
            },
            Countdown {
                remaining: vec![AtomicUsize::new(1)],
            },
        ];
        let engine = Engine::new(2);

        let supersteps = engine.execute(&partitions, &CountdownHooks);

        // the slower partition needs 3 kernel calls to reach zero, then one
        // more superstep where both partitions report finished.
        assert_eq!(supersteps, 4);
        for p in &partitions {
            assert_eq!(p.remaining[0].load(Ordering::Relaxed), 0);
        }
    }

    #[test]
    fn all_idle_partitions_finish_in_one_superstep() {
        let partitions = vec![
            Countdown {
                remaining: vec![AtomicUsize::new(0)],
            },
            Countdown {
                remaining: vec![AtomicUsize::new(0)],
            },
        ];
        let engine = Engine::new(2);

        let supersteps = engine.execute(&partitions, &CountdownHooks);

        assert_eq!(supersteps, 1);
    }
}
