//! Transition computation: the only source of the engine's ordering,
//! fixed so it is fully deterministic across processes.

use itertools::Itertools;
use laik_space::{slice_intersect, Dims, Partitioning, Slice};

use crate::element::ReductionOp;

/// Whether a `switch` discards the previous contents (`None`) or carries
/// them forward into the new partitioning (`Preserve`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFlow {
	None,
	Preserve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalCopy {
	pub slice: Slice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendEntry {
	pub peer: usize,
	pub slice: Slice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecvEntry {
	pub peer: usize,
	pub slice: Slice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceEntry {
	/// Ascending peer-rank order -- also the order the reduce is folded in.
	pub input_group: Vec<usize>,
	pub output_group: Vec<usize>,
	pub slice: Slice,
	pub op: ReductionOp,
}

/// `(group, dims, local[], send[], recv[], red[])`, already narrowed to
/// the entries one particular process (`myid`) must execute.
#[derive(Debug, Clone)]
pub struct Transition {
	pub dims: Dims,
	pub local: Vec<LocalCopy>,
	pub send: Vec<SendEntry>,
	pub recv: Vec<RecvEntry>,
	pub red: Vec<ReduceEntry>,
}

impl Transition {
	/// Computes the transition `myid` must execute to move from `from` to
	/// `to`. Iterates `to.tslice` order then `from.tslice` order, and
	/// always in ascending peer-rank order -- the only source of ordering
	/// non-determinism, so it is fixed here once and for all.
	pub fn compute(
		from: &Partitioning,
		to: &Partitioning,
		dims: Dims,
		myid: i64,
		flow: DataFlow,
		red_op: Option<ReductionOp>,
	) -> Self {
		let mut local = Vec::new();
		let mut send = Vec::new();
		let mut recv = Vec::new();
		let mut red = Vec::new();

		if flow == DataFlow::Preserve {
			for to_ts in to.tslices() {
				for from_ts in from.tslices() {
					let Some(isect) = slice_intersect(dims, to_ts.slice, from_ts.slice) else {
						continue;
					};
					if to_ts.task == from_ts.task {
						if to_ts.task as i64 == myid {
							local.push(LocalCopy { slice: isect });
						}
					} else {
						if from_ts.task as i64 == myid {
							send.push(SendEntry { peer: to_ts.task, slice: isect });
						}
						if to_ts.task as i64 == myid {
							recv.push(RecvEntry { peer: from_ts.task, slice: isect });
						}
					}
				}
			}
		}

		if let Some(op) = red_op {
			for to_ts in to.tslices() {
				let mut writers: Vec<usize> = from
					.tslices()
					.iter()
					.filter(|f| slice_intersect(dims, f.slice, to_ts.slice).is_some())
					.map(|f| f.task)
					.collect();
				writers.sort_unstable();
				writers.dedup();

				let mut readers: Vec<usize> = to
					.tslices()
					.iter()
					.filter(|t| t.slice == to_ts.slice)
					.map(|t| t.task)
					.collect();
				readers.sort_unstable();
				readers.dedup();

				red.push(ReduceEntry {
					input_group: writers,
					output_group: readers,
					slice: to_ts.slice,
					op,
				});
			}
			red.dedup_by(|a, b| a.slice == b.slice && a.output_group == b.output_group);
		}

		send.sort_by_key(|e| e.peer);
		recv.sort_by_key(|e| e.peer);

		let mut t = Transition { dims, local, send, recv, red };
		t.coalesce();
		tracing::debug!(
			local = t.local.len(),
			send = t.send.len(),
			recv = t.recv.len(),
			red = t.red.len(),
			"transition computed"
		);
		t
	}

	/// Deduplicate and coalesce adjacent recv/send entries sharing a peer
	/// when their slices are contiguous along dimension 0.
	fn coalesce(&mut self) {
		self.send = coalesce_entries(std::mem::take(&mut self.send), |e| (e.peer, e.slice), |e, s| SendEntry { peer: e.peer, slice: s });
		self.recv = coalesce_entries(std::mem::take(&mut self.recv), |e| (e.peer, e.slice), |e, s| RecvEntry { peer: e.peer, slice: s });
	}
}

/// Merges adjacent entries sharing a peer whose slices are contiguous
/// along dimension 0, via `itertools`' `coalesce` adaptor: the standard
/// fold-adjacent-or-keep-both idiom, rather than a hand-rolled loop.
fn coalesce_entries<E, K>(entries: Vec<E>, key: K, join: impl Fn(&E, Slice) -> E) -> Vec<E>
where
	K: Fn(&E) -> (usize, Slice),
{
	entries
		.into_iter()
		.coalesce(|a, b| {
			let (pa, sa) = key(&a);
			let (pb, sb) = key(&b);
			if pa == pb && sa.to.x == sb.from.x && sa.to.y == sb.to.y && sa.to.z == sb.to.z {
				Ok(join(&a, Slice::new(sa.from, sb.to)))
			} else {
				Err((a, b))
			}
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use laik_space::{AllPartitioner, BlockPartitioner, Group, MasterPartitioner, Space};

	#[test]
	fn preserve_switch_from_block_to_all_produces_sends_and_local() {
		let space = Space::new_1d(100);
		let group = Group::world(0, 4, 0);
		let from = Partitioning::build(&BlockPartitioner::new(0, 1), &space, &group, None);
		let to = Partitioning::build(&AllPartitioner, &space, &group, None);

		let t = Transition::compute(&from, &to, space.dims(), 0, DataFlow::Preserve, None);
		// task 0 owns one quarter; it must send its slice to every other
		// task and keep a local copy for itself.
		assert_eq!(t.local.len(), 1);
		assert_eq!(t.send.len(), 3);
		assert!(t.recv.len() >= 1);
	}

	#[test]
	fn reduction_target_collects_all_writers() {
		let space = Space::new_1d(10);
		let group = Group::world(0, 4, 0);
		let from = Partitioning::build(&AllPartitioner, &space, &group, None);
		let to = Partitioning::build(&MasterPartitioner, &space, &group, None);

		let t = Transition::compute(
			&from,
			&to,
			space.dims(),
			0,
			DataFlow::None,
			Some(ReductionOp::Sum),
		);
		assert_eq!(t.red.len(), 1);
		assert_eq!(t.red[0].input_group, vec![0, 1, 2, 3]);
		assert_eq!(t.red[0].output_group, vec![0]);
	}

	#[test]
	fn no_op_when_flow_is_none_and_no_reduction() {
		let space = Space::new_1d(10);
		let group = Group::world(0, 2, 0);
		let from = Partitioning::build(&AllPartitioner, &space, &group, None);
		let to = Partitioning::build(&AllPartitioner, &space, &group, None);
		let t = Transition::compute(&from, &to, space.dims(), 0, DataFlow::None, None);
		assert!(t.local.is_empty());
		assert!(t.send.is_empty());
		assert!(t.recv.is_empty());
		assert!(t.red.is_empty());
	}
}
