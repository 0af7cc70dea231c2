//! Built-in partitioners: pure producers of task-slices.
//!
//! Each partitioner implements [`Partitioner`], appending `(task, slice,
//! tag, mapNo)` entries to the [`PartitioningBuilder`] it's handed. None of
//! them touch global state; `bisection`/`grid`/`block` read only `space`
//! and `group`, while `halo`/`cornerhalo`/`copy`/`reassign` additionally
//! read a `base` partitioning to derive from.

use std::sync::Arc;

use crate::group::Group;
use crate::index::{Dims, Index, Slice};
use crate::partitioning::{Partitioning, PartitioningBuilder};
use crate::space::Space;

/// A pure producer of task-slices. `run` may be called more than once over
/// the lifetime of a partitioner (e.g. when a `Space` resize invalidates a
/// derived `Partitioning` and it's lazily rebuilt).
pub trait Partitioner {
	fn name(&self) -> &str;

	fn run(
		&self,
		out: &mut PartitioningBuilder,
		space: &Space,
		group: &Group,
		base: Option<&Partitioning>,
	);
}

/// One entry per task, covering the full space.
pub struct AllPartitioner;

impl Partitioner for AllPartitioner {
	fn name(&self) -> &str {
		"all"
	}

	fn run(&self, out: &mut PartitioningBuilder, space: &Space, group: &Group, _base: Option<&Partitioning>) {
		for task in 0..group.size() {
			out.append(task, space.slice(), 0, 0);
		}
	}
}

/// One entry for task 0, covering the full space.
pub struct MasterPartitioner;

impl Partitioner for MasterPartitioner {
	fn name(&self) -> &str {
		"master"
	}

	fn run(&self, out: &mut PartitioningBuilder, space: &Space, _group: &Group, _base: Option<&Partitioning>) {
		out.append(0, space.slice(), 0, 0);
	}
}

/// Splits `dim` into contiguous weighted ranges across `group.size() *
/// cycles` slices. Mirrors `runBlockPartitioner`'s floating-point walk
/// exactly, including its last-task/last-cycle short-circuit: the
/// remaining drift is always folded into the final slice rather than
/// spilling into a phantom extra task.
pub struct BlockPartitioner {
	pub pdim: usize,
	pub cycles: usize,
	pub idx_weight: Option<Box<dyn Fn(Index) -> f64>>,
	pub task_weight: Option<Box<dyn Fn(usize) -> f64>>,
}

impl BlockPartitioner {
	pub fn new(pdim: usize, cycles: usize) -> Self {
		BlockPartitioner {
			pdim,
			cycles,
			idx_weight: None,
			task_weight: None,
		}
	}

	pub fn with_idx_weight(mut self, f: impl Fn(Index) -> f64 + 'static) -> Self {
		self.idx_weight = Some(Box::new(f));
		self
	}

	pub fn with_task_weight(mut self, f: impl Fn(usize) -> f64 + 'static) -> Self {
		self.task_weight = Some(Box::new(f));
		self
	}
}

impl Partitioner for BlockPartitioner {
	fn name(&self) -> &str {
		"block"
	}

	fn run(&self, out: &mut PartitioningBuilder, space: &Space, group: &Group, _base: Option<&Partitioning>) {
		let count = group.size();
		let pdim = self.pdim;
		let sp = space.slice();
		let size = sp.to.get(pdim) - sp.from.get(pdim);

		let total_w: f64 = if let Some(f) = &self.idx_weight {
			let mut acc = 0.0;
			let mut idx = Index::zero();
			for i in 0..size {
				idx.set(pdim, i + sp.from.get(pdim));
				acc += f(idx);
			}
			acc
		} else {
			size as f64
		};

		let total_tw: f64 = if let Some(f) = &self.task_weight {
			(0..count).map(|t| f(t)).sum()
		} else {
			count as f64
		};

		let cycles = self.cycles.max(1);
		let per_part = total_w / count as f64 / cycles as f64;

		let mut w = -0.5;
		let mut task = 0usize;
		let mut cycle = 0usize;

		let task_w = |task: usize, f: &Option<Box<dyn Fn(usize) -> f64>>| -> f64 {
			match f {
				Some(f) => f(task) * count as f64 / total_tw,
				None => 1.0,
			}
		};
		let mut cur_task_w = task_w(task, &self.task_weight);

		let mut slice_from = sp.from.get(pdim);
		for i in 0..size {
			w += match &self.idx_weight {
				Some(f) => {
					let mut idx = Index::zero();
					idx.set(pdim, i + sp.from.get(pdim));
					f(idx)
				}
				None => 1.0,
			};

			while w >= per_part * cur_task_w {
				w -= per_part * cur_task_w;
				if task + 1 == count && cycle + 1 == cycles {
					break;
				}
				let slice_to = i + sp.from.get(pdim);
				if slice_from < slice_to {
					let mut s = sp;
					s.from.set(pdim, slice_from);
					s.to.set(pdim, slice_to);
					out.append(task, s, 0, 0);
				}
				task += 1;
				if task == count {
					task = 0;
					cycle += 1;
				}
				cur_task_w = task_w(task, &self.task_weight);
				slice_from = i + sp.from.get(pdim);
			}
			if task + 1 == count && cycle + 1 == cycles {
				break;
			}
		}
		debug_assert!(task + 1 == count && cycle + 1 == cycles);
		let mut s = sp;
		s.from.set(pdim, slice_from);
		s.to.set(pdim, sp.to.get(pdim));
		out.append(task, s, 0, 0);
	}
}

/// Recursive median split along the widest dimension; one slice per task.
pub struct BisectionPartitioner;

impl Partitioner for BisectionPartitioner {
	fn name(&self) -> &str {
		"bisection"
	}

	fn run(&self, out: &mut PartitioningBuilder, space: &Space, group: &Group, _base: Option<&Partitioning>) {
		fn recurse(out: &mut PartitioningBuilder, dims: Dims, s: Slice, from_task: usize, to_task: usize) {
			const TAG: u32 = 1;
			debug_assert!(to_task > from_task);
			if to_task - from_task == 1 {
				out.append(from_task, s, TAG, 0);
				return;
			}

			let mut split_dim = 0usize;
			let mut width = s.extent(0);
			for d in 1..dims.count() {
				let w = s.extent(d);
				if w > width {
					width = w;
					split_dim = d;
				}
			}
			debug_assert!(width > 0);
			if width == 1 {
				out.append(from_task, s, TAG, 0);
				return;
			}

			let mid_task = (from_task + to_task) / 2;
			let w = width * (mid_task - from_task) as u64 / (to_task - from_task) as u64;

			let mut s1 = s;
			let mut s2 = s;
			let split_at = s.from.get(split_dim) + w;
			s1.to.set(split_dim, split_at);
			s2.from.set(split_dim, split_at);
			recurse(out, dims, s1, from_task, mid_task);
			recurse(out, dims, s2, mid_task, to_task);
		}

		recurse(out, space.dims(), space.slice(), 0, group.size());
	}
}

/// Regular 3D partition; requires `group.size() >= xblocks*yblocks*zblocks`.
/// Stops emitting slices once every group member has one, even if the
/// requested block count is larger -- the grid is then simply truncated,
/// matching the original's early return rather than over-asserting.
pub struct GridPartitioner {
	pub xblocks: usize,
	pub yblocks: usize,
	pub zblocks: usize,
}

impl Partitioner for GridPartitioner {
	fn name(&self) -> &str {
		"grid"
	}

	fn run(&self, out: &mut PartitioningBuilder, space: &Space, group: &Group, _base: Option<&Partitioning>) {
		const TAG: u32 = 1;
		debug_assert_eq!(space.dims(), Dims::Three);
		debug_assert!(group.size() >= self.xblocks * self.yblocks * self.zblocks);

		let sp = space.slice();
		let x_step = (sp.to.x - sp.from.x) as f64 / self.xblocks as f64;
		let y_step = (sp.to.y - sp.from.y) as f64 / self.yblocks as f64;
		let z_step = (sp.to.z - sp.from.z) as f64 / self.zblocks as f64;

		let mut task = 0usize;
		'outer: for z in 0..self.zblocks {
			let zf = sp.from.z + (z as f64 * z_step) as u64;
			let mut zt = sp.from.z + ((z + 1) as f64 * z_step) as u64;
			if zf == zt {
				continue;
			}
			zt = zt.min(sp.to.z);

			for y in 0..self.yblocks {
				let yf = sp.from.y + (y as f64 * y_step) as u64;
				let mut yt = sp.from.y + ((y + 1) as f64 * y_step) as u64;
				if yf == yt {
					continue;
				}
				yt = yt.min(sp.to.y);

				for x in 0..self.xblocks {
					let xf = sp.from.x + (x as f64 * x_step) as u64;
					let mut xt = sp.from.x + ((x + 1) as f64 * x_step) as u64;
					if xf == xt {
						continue;
					}
					xt = xt.min(sp.to.x);

					let slc = Slice::new(Index::new(xf, yf, zf), Index::new(xt, yt, zt));
					out.append(task, slc, TAG, 0);
					task += 1;
					if task == group.size() {
						break 'outer;
					}
				}
			}
		}
	}
}

/// From `base`: each base slice plus up to `2*dims` extension slices
/// clipped to the space, tagged with the base slice's tag. `tag` on the
/// base must be `> 0` (tag 0 would mean "own mapping per slice", which
/// conflicts with grouping the halo extensions with their origin slice).
pub struct HaloPartitioner {
	pub depth: u64,
}

impl Partitioner for HaloPartitioner {
	fn name(&self) -> &str {
		"halo"
	}

	fn run(&self, out: &mut PartitioningBuilder, space: &Space, group: &Group, base: Option<&Partitioning>) {
		let base = base.expect("halo partitioner requires a base partitioning");
		debug_assert_eq!(base.group_size(), group.size());
		let dims = space.dims();
		let sp = space.slice();
		let depth = self.depth;

		for ts in base.tslices() {
			let tag = ts.tag;
			debug_assert!(tag > 0, "halo partitioner requires base slices tagged > 0");
			out.append(ts.task, ts.slice, tag, 0);

			for d in 0..dims.count() {
				let mut s = ts.slice;
				if s.from.get(d) > sp.from.get(d) + depth {
					s.to.set(d, s.from.get(d));
					s.from.set(d, s.from.get(d) - depth);
					out.append(ts.task, s, tag, 0);
				}
				let mut s = ts.slice;
				if s.to.get(d) < sp.to.get(d) - depth {
					s.from.set(d, s.to.get(d));
					s.to.set(d, s.to.get(d) + depth);
					out.append(ts.task, s, tag, 0);
				}
			}
		}
	}
}

/// From `base`: one extended slice per base slice, including corners.
pub struct CornerHaloPartitioner {
	pub depth: u64,
}

impl Partitioner for CornerHaloPartitioner {
	fn name(&self) -> &str {
		"cornerhalo"
	}

	fn run(&self, out: &mut PartitioningBuilder, space: &Space, group: &Group, base: Option<&Partitioning>) {
		let base = base.expect("cornerhalo partitioner requires a base partitioning");
		debug_assert_eq!(base.group_size(), group.size());
		let dims = space.dims();
		let sp = space.slice();
		let d = self.depth;

		for ts in base.tslices() {
			let mut slc = sp;
			let from = ts.slice.from;
			let to = ts.slice.to;

			for dim in 0..dims.count() {
				if from.get(dim) > sp.from.get(dim) + d {
					slc.from.set(dim, from.get(dim) - d);
				}
				if to.get(dim) < sp.to.get(dim) - d {
					slc.to.set(dim, to.get(dim) + d);
				}
			}
			out.append(ts.task, slc, ts.tag, 0);
		}
	}
}

/// From `base`: each base slice becomes a full-extent slice in other
/// dimensions, with `from/to[toDim] <- base.from/to[fromDim]`. Assumes a
/// 1D `base` partitioning.
pub struct CopyPartitioner {
	pub from_dim: usize,
	pub to_dim: usize,
}

impl Partitioner for CopyPartitioner {
	fn name(&self) -> &str {
		"copy"
	}

	fn run(&self, out: &mut PartitioningBuilder, space: &Space, group: &Group, base: Option<&Partitioning>) {
		let base = base.expect("copy partitioner requires a base partitioning");
		debug_assert_eq!(base.group_size(), group.size());

		for ts in base.tslices() {
			let mut slc = space.slice();
			slc.from.set(self.to_dim, ts.slice.from.get(self.from_dim));
			slc.to.set(self.to_dim, ts.slice.to.get(self.from_dim));
			out.append(ts.task, slc, ts.tag, 0);
		}
	}
}

/// From `base`: keeps slices of tasks still present in `new_group`,
/// redistributes slices of removed tasks over `new_group` by weighted
/// block assignment. `new_group`'s parent must be `base`'s group. Only 1D.
pub struct ReassignPartitioner {
	pub new_group: Arc<Group>,
	pub idx_weight: Option<Box<dyn Fn(Index) -> f64>>,
}

impl ReassignPartitioner {
	pub fn new(new_group: Arc<Group>) -> Self {
		ReassignPartitioner {
			new_group,
			idx_weight: None,
		}
	}

	pub fn with_idx_weight(mut self, f: impl Fn(Index) -> f64 + 'static) -> Self {
		self.idx_weight = Some(Box::new(f));
		self
	}
}

impl Partitioner for ReassignPartitioner {
	fn name(&self) -> &str {
		"reassign"
	}

	fn run(&self, out: &mut PartitioningBuilder, space: &Space, _group: &Group, base: Option<&Partitioning>) {
		let base = base.expect("reassign partitioner requires a base partitioning");
		debug_assert_eq!(space.dims(), Dims::One);
		let newg = &self.new_group;

		let weight_of = |from: u64, to: u64| -> f64 {
			match &self.idx_weight {
				Some(f) => (from..to).map(|i| f(Index::new(i, 0, 0))).sum(),
				None => (to - from) as f64,
			}
		};

		let mut total_weight = 0.0;
		for ts in base.tslices() {
			if is_present(newg, ts.task) {
				continue;
			}
			total_weight += weight_of(ts.slice.from.x, ts.slice.to.x);
		}

		let weight_per_task = total_weight / newg.size() as f64;
		let mut weight = 0.0;
		let mut cur_task = 0usize;

		for ts in base.tslices() {
			let orig_task = ts.task;
			if is_present(newg, orig_task) {
				out.append(orig_task, ts.slice, 0, 0);
				continue;
			}

			let from = ts.slice.from.x;
			let to = ts.slice.to.x;
			let mut slice_from = from;

			for i in from..to {
				weight += match &self.idx_weight {
					Some(f) => f(Index::new(i, 0, 0)),
					None => 1.0,
				};
				if weight >= weight_per_task && cur_task < newg.size() {
					weight -= weight_per_task;
					let slc = Slice::new(Index::new(slice_from, 0, 0), Index::new(i + 1, 0, 0));
					out.append(newg.to_parent_rank(cur_task), slc, 0, 0);
					slice_from = i + 1;
					cur_task += 1;
					if cur_task == newg.size() {
						cur_task -= 1;
					}
				}
			}
			if slice_from < to {
				let slc = Slice::new(Index::new(slice_from, 0, 0), Index::new(to, 0, 0));
				out.append(newg.to_parent_rank(cur_task), slc, 0, 0);
			}
		}
	}
}

fn is_present(newg: &Group, parent_task: usize) -> bool {
	newg.from_parent_rank(parent_task) >= 0
}
