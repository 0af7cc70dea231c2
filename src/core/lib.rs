//! LAIK: a library for distributed, index-space-based data containers used
//! by SPMD parallel programs. This crate ties together the partitioning
//! and transition engine (`laik_space`, `laik_data`), its action-sequence
//! optimizer (`laik_aseq`) and backend/KV layer (`laik_rpc`) behind the
//! per-process `Instance` context, plus the fault-tolerant
//! checkpoint/recovery layer.

pub mod checkpoint;
pub mod error;
pub mod instance;

pub use checkpoint::{checkpoint_create, checkpoint_remove_failed_slices, checkpoint_restore, Checkpoint, RedundantPartitioner};
pub use error::{Error, Result};
pub use instance::{Instance, SpaceId};

pub use laik_aseq::{Action, ActionKind, ActionSeq, BackendActionKind, BufId, BufSlot, OptimizerConfig, Stats, TransitionContext};
pub use laik_data::{
	init_slice, reduce_slice, Data, DataFlow, ElementType, Layout, LocalCopy, Mapping, RecvEntry, ReduceEntry, SendEntry,
	Transition,
};
pub use laik_rpc::{Backend, KvStore, NodeStatus, SingleBackend, Stamp};
pub use laik_space::{
	index_equal, slice_intersect, slice_is_empty, AccessMode, AllPartitioner, BisectionPartitioner, BlockPartitioner,
	CopyPartitioner, CornerHaloPartitioner, Dims, GridPartitioner, Group, HaloPartitioner, Index,
	MasterPartitioner, Partitioner, Partitioning, PartitioningBuilder, ReassignPartitioner, ReductionOp, Slice, Space,
	TaskSlice,
};
