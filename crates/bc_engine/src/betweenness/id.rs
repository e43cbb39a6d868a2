//! Composite global vertex identifiers.
//!
//! A global id packs a partition id into its high bits and a local vertex
//! id (within that partition) into its low bits, so that any reader can
//! recover `(partition_id, local_vid)` with O(1) bit operations. Every
//! neighbor list in a [`super::partition::PartitionCsr`] stores ids in this
//! encoded form.

/// Upper bound on the number of partitions a single run can track. Chosen
/// so that partition ids fit in 10 bits, leaving 54 bits for the local
/// vertex id, which comfortably covers graphs much larger than fit in
/// memory on one machine.
pub const MAX_PARTITION_COUNT: usize = 1024;

const PARTITION_BITS: u32 = 10;
const LOCAL_BITS: u32 = u64::BITS - PARTITION_BITS;
const LOCAL_MASK: u64 = (1 << LOCAL_BITS) - 1;

/// A global vertex id, composite-encoded as `(partition_id, local_vid)`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct GlobalId(u64);

impl GlobalId {
    /// Encodes a `(partition, local)` pair. Panics if `partition` exceeds
    /// [`MAX_PARTITION_COUNT`] or `local` does not fit in the remaining
    /// bits.
    pub fn new(partition: u32, local: u64) -> Self {
        assert!(
            (partition as usize) < MAX_PARTITION_COUNT,
            "partition id {partition} exceeds MAX_PARTITION_COUNT ({MAX_PARTITION_COUNT})"
        );
        assert!(
            local <= LOCAL_MASK,
            "local vertex id {local} does not fit in {LOCAL_BITS} bits"
        );
        GlobalId(((partition as u64) << LOCAL_BITS) | local)
    }

    #[inline]
    pub fn partition(self) -> u32 {
        (self.0 >> LOCAL_BITS) as u32
    }

    #[inline]
    pub fn local(self) -> u64 {
        self.0 & LOCAL_MASK
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl From<GlobalId> for u64 {
    fn from(id: GlobalId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_partition_and_local() {
        let id = GlobalId::new(7, 12345);
        assert_eq!(id.partition(), 7);
        assert_eq!(id.local(), 12345);
    }

    #[test]
    fn zero_partition_zero_local() {
        let id = GlobalId::new(0, 0);
        assert_eq!(id.partition(), 0);
        assert_eq!(id.local(), 0);
    }

    #[test]
    #[should_panic]
    fn rejects_partition_beyond_max() {
        GlobalId::new(MAX_PARTITION_COUNT as u32, 0);
    }
}
