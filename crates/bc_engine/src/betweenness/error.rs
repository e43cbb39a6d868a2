//! Error type for the hybrid betweenness centrality engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("partition count {actual} exceeds the maximum of {max}")]
    TooManyPartitions { actual: usize, max: usize },
    #[error("invalid partitioning: {0}")]
    InvalidPartitioning(String),
    #[error("accelerator partition {partition} reported a failure")]
    Accelerator { partition: u32 },
    #[error("epsilon must be positive for approximate betweenness, got {epsilon}")]
    InvalidEpsilon { epsilon: f32 },
}
