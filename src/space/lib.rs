//! Index-space algebra, groups and partitioners.
//!
//! `Space`, `Group` and `Partitioning` are plain value types here: the
//! arena/id bookkeeping that ties them to a running instance (so
//! `free_space`-style invalidation and `clone`/`shrink` lineage survive
//! across an `Instance`'s lifetime) lives one layer up, in the crate that
//! defines `Instance` -- this crate has no dependency on it.

pub mod group;
pub mod index;
pub mod partitioner;
pub mod partitioning;
pub mod space;

pub use group::Group;
pub use index::{index_equal, slice_intersect, slice_is_empty, Dims, Index, Slice};
pub use partitioner::{
	AllPartitioner, BisectionPartitioner, BlockPartitioner, CopyPartitioner, CornerHaloPartitioner,
	GridPartitioner, HaloPartitioner, MasterPartitioner, Partitioner, ReassignPartitioner,
};
pub use partitioning::{AccessMode, Partitioning, PartitioningBuilder, ReductionOp, TaskSlice};
pub use space::Space;
