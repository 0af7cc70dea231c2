//! Partitionings: the sealed result of running a [`Partitioner`].

use crate::group::Group;
use crate::index::{Dims, Slice};
use crate::partitioner::Partitioner;
use crate::space::Space;

/// A single `(task, slice)` entry of a `Partitioning`, plus the bookkeeping
/// the mapping layer needs: `tag` groups slices that should share one
/// mapping (`0` means "each slice is its own mapping"), `map_no` indexes
/// which mapping within that group this slice lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSlice {
	pub task: usize,
	pub slice: Slice,
	pub tag: u32,
	pub map_no: u32,
}

/// Accumulator passed to [`Partitioner::run`]; call [`Self::append`] for
/// every task-slice, then [`Self::seal`] to freeze it into a
/// [`Partitioning`].
pub struct PartitioningBuilder {
	dims: Dims,
	group_size: usize,
	tslices: Vec<TaskSlice>,
}

impl PartitioningBuilder {
	pub fn new(dims: Dims, group_size: usize) -> Self {
		PartitioningBuilder {
			dims,
			group_size,
			tslices: Vec::new(),
		}
	}

	pub fn append(&mut self, task: usize, slice: Slice, tag: u32, map_no: u32) {
		debug_assert!(task < self.group_size, "partitioner assigned slice to out-of-range task {task}");
		self.tslices.push(TaskSlice { task, slice, tag, map_no });
	}

	pub fn seal(self) -> Partitioning {
		Partitioning {
			dims: self.dims,
			group_size: self.group_size,
			tslices: self.tslices,
		}
	}
}

/// The sealed output of a partitioner run: sortable, indexable by task,
/// intersectable, queryable -- but never mutated again.
#[derive(Debug, Clone)]
pub struct Partitioning {
	dims: Dims,
	group_size: usize,
	tslices: Vec<TaskSlice>,
}

impl Partitioning {
	/// Run `partitioner` over `space`/`group`, optionally deriving from
	/// `base`, and seal the result.
	pub fn build(
		partitioner: &dyn Partitioner,
		space: &Space,
		group: &Group,
		base: Option<&Partitioning>,
	) -> Self {
		let mut builder = PartitioningBuilder::new(space.dims(), group.size());
		partitioner.run(&mut builder, space, group, base);
		let sealed = builder.seal();
		tracing::debug!(
			partitioner = partitioner.name(),
			group_size = group.size(),
			tslices = sealed.tslices.len(),
			"partitioning built"
		);
		sealed
	}

	pub fn dims(&self) -> Dims {
		self.dims
	}

	pub fn group_size(&self) -> usize {
		self.group_size
	}

	pub fn tslices(&self) -> &[TaskSlice] {
		&self.tslices
	}

	pub fn tslices_mut(&mut self) -> &mut [TaskSlice] {
		&mut self.tslices
	}

	/// `laik_my_slice_Nd` -- the `idx`-th slice belonging to `myid`.
	pub fn my_slice(&self, myid: i64, idx: usize) -> Option<Slice> {
		self.tslices
			.iter()
			.filter(|ts| ts.task as i64 == myid)
			.nth(idx)
			.map(|ts| ts.slice)
	}

	pub fn slices_of(&self, task: usize) -> impl Iterator<Item = &TaskSlice> {
		self.tslices.iter().filter(move |ts| ts.task == task)
	}

	/// Tasks holding at least one slice overlapping `slice`.
	pub fn readers_of(&self, slice: Slice) -> Vec<usize> {
		let mut out: Vec<usize> = self
			.tslices
			.iter()
			.filter(|ts| crate::index::slice_intersect(self.dims, ts.slice, slice).is_some())
			.map(|ts| ts.task)
			.collect();
		out.sort_unstable();
		out.dedup();
		out
	}

	pub fn sort_by_task(&mut self) {
		self.tslices.sort_by_key(|ts| ts.task);
	}
}

/// A named `Partitioning` plus an access-mode tag, kept purely for
/// documentation/debugging (mirrors the original's
/// `laik_is_reduction`/`laik_is_read`/`laik_is_write` queries).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
	ReadOnly,
	WriteOnly,
	ReadWrite,
}

impl AccessMode {
	pub fn is_read(self) -> bool {
		matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
	}

	pub fn is_write(self) -> bool {
		matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
	}
}

impl std::fmt::Display for AccessMode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			AccessMode::ReadOnly => "read-only",
			AccessMode::WriteOnly => "write-only",
			AccessMode::ReadWrite => "read-write",
		};
		write!(f, "{s}")
	}
}

/// Reduction operator, shared by `Partitioning` tagging (here) and by
/// `laik_data`'s `Transition`/`Data::switch` (which does the actual
/// folding) -- defined once in this crate since `laik_data` depends on
/// `laik_space` and not the other way around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionOp {
	Sum,
	Prod,
	Min,
	Max,
	And,
	Or,
}

impl std::fmt::Display for ReductionOp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			ReductionOp::Sum => "sum",
			ReductionOp::Prod => "prod",
			ReductionOp::Min => "min",
			ReductionOp::Max => "max",
			ReductionOp::And => "and",
			ReductionOp::Or => "or",
		};
		write!(f, "{s}")
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::partitioner::AllPartitioner;
	use crate::space::Space;

	#[test]
	fn my_slice_filters_by_task() {
		let space = Space::new_1d(10);
		let group = Group::world(0, 3, 1);
		let p = Partitioning::build(&AllPartitioner, &space, &group, None);
		assert_eq!(p.my_slice(1, 0), Some(space.slice()));
		assert_eq!(p.my_slice(1, 1), None);
	}

	#[test]
	fn readers_of_full_overlap_is_every_task() {
		let space = Space::new_1d(10);
		let group = Group::world(0, 3, 0);
		let p = Partitioning::build(&AllPartitioner, &space, &group, None);
		assert_eq!(p.readers_of(space.slice()), vec![0, 1, 2]);
	}
}
