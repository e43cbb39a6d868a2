#![allow(dead_code)]

//! A hybrid CPU/accelerator engine for computing betweenness centrality
//! over partitioned graphs.
//!
//! The engine runs Brandes' algorithm as a bulk-synchronous-parallel
//! computation: every partition of the input graph carries its own
//! forward (shortest-path counting) and backward (dependency
//! accumulation) sweep, synchronized across supersteps through a small
//! message-passing fabric ([`betweenness::grooves`]) rather than shared
//! mutable state. See [`betweenness::betweenness_hybrid`] for the entry
//! point.

pub mod betweenness;
pub mod prelude;
