pub use crate::betweenness::betweenness_hybrid;
pub use crate::betweenness::partition_by_range;
pub use crate::betweenness::BetweennessConfig;
pub use crate::betweenness::Error;
pub use crate::betweenness::PartitionAlgorithm;
pub use crate::betweenness::PartitionKind;
pub use crate::betweenness::PartitionedGraph;
pub use crate::betweenness::SourceSampler;
pub use crate::betweenness::UniformSampler;
