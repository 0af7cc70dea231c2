//! Fault tolerance: checkpoint creation against a redundant backup
//! partitioning, failed-slice removal, and restore.

use laik_data::{Data, ElementType};
use laik_rpc::NodeStatus;
use laik_space::{Dims, Group, Partitioner, Partitioning, PartitioningBuilder, Slice, Space};

/// Wraps a partitioner so every slice it produces is additionally assigned
/// to `redundancy - 1` further tasks, each `rotation` ranks further around
/// the group (mod group size) than the last. `redundancy = 1` reproduces
/// the inner partitioner exactly.
pub struct RedundantPartitioner<'a> {
	inner: &'a dyn Partitioner,
	redundancy: usize,
	rotation: usize,
}

impl<'a> RedundantPartitioner<'a> {
	pub fn new(inner: &'a dyn Partitioner, redundancy: usize, rotation: usize) -> Self {
		assert!(redundancy >= 1, "checkpoint redundancy must be at least 1");
		RedundantPartitioner { inner, redundancy, rotation }
	}
}

impl Partitioner for RedundantPartitioner<'_> {
	fn name(&self) -> &str {
		"redundant"
	}

	fn run(&self, out: &mut PartitioningBuilder, space: &Space, group: &Group, base: Option<&Partitioning>) {
		let primary = Partitioning::build(self.inner, space, group, base);
		let size = group.size();
		for ts in primary.tslices() {
			out.append(ts.task, ts.slice, ts.tag, ts.map_no);
			for r in 1..self.redundancy {
				let replica = (ts.task + self.rotation * r) % size;
				out.append(replica, ts.slice, ts.tag, ts.map_no);
			}
		}
	}
}

/// A shadow `Data` holding a redundant copy of a source `Data`'s contents,
/// laid out under a backup partitioning, for recovery after node failure.
pub struct Checkpoint<T: ElementType> {
	pub partitioning: Partitioning,
	pub data: Data<T>,
}

/// `checkpoint_create`: builds the redundant backup partitioning, installs
/// it on a fresh shadow `Data`, and copies this rank's current content into
/// every backup slice it now owns.
pub fn checkpoint_create<T: ElementType>(
	myid: i64,
	space: &Space,
	group: &Group,
	source: &Data<T>,
	backup_partitioner: &dyn Partitioner,
	redundancy: usize,
	rotation: usize,
	fill: T,
) -> Checkpoint<T> {
	let backup = RedundantPartitioner::new(backup_partitioner, redundancy, rotation);
	let partitioning = Partitioning::build(&backup, space, group, None);

	let mut data: Data<T> = Data::new(space.dims(), format!("{}/checkpoint", source.name()));
	data.install(partitioning.clone(), myid, fill);

	for map in data.mappings_mut() {
		if let Some(src) = source.mapping_covering(map.slice) {
			let mut cursor = map.slice.from;
			let mut buf = vec![fill; map.slice.size(space.dims()) as usize];
			src.layout.pack(&src.base, map.slice, &mut cursor, &mut buf);
			let mut cursor2 = map.slice.from;
			map.layout.unpack(&mut map.base, map.slice, &mut cursor2, &buf);
		}
	}

	Checkpoint { partitioning, data }
}

/// `checkpoint_remove_failed_slices`: drops every task-slice owned by a
/// faulted task. Returns `false` if the union of surviving slices no
/// longer covers the space -- data has been irrecoverably lost.
///
/// Coverage is checked by deduplicating surviving slices by exact geometry
/// and summing their sizes: `checkpoint_create`'s redundancy only ever
/// replicates a whole original slice onto further tasks, never a fragment
/// of one, so distinct surviving geometries are exactly the still-covered
/// pieces of the non-redundant base partitioning.
pub fn checkpoint_remove_failed_slices<T: ElementType>(
	checkpoint: &mut Checkpoint<T>,
	space: &Space,
	statuses: &[NodeStatus],
) -> bool {
	let dims = space.dims();
	let group_size = checkpoint.partitioning.group_size();

	let mut builder = PartitioningBuilder::new(dims, group_size);
	let mut surviving_slices: Vec<Slice> = Vec::new();
	for ts in checkpoint.partitioning.tslices() {
		let alive = statuses.get(ts.task).map(|s| s.is_ok()).unwrap_or(false);
		if alive {
			builder.append(ts.task, ts.slice, ts.tag, ts.map_no);
			surviving_slices.push(ts.slice);
		}
	}
	checkpoint.partitioning = builder.seal();

	slices_cover(dims, space.slice(), &surviving_slices)
}

fn slices_cover(dims: Dims, full: Slice, slices: &[Slice]) -> bool {
	let mut unique: Vec<Slice> = Vec::new();
	for &s in slices {
		if !unique.iter().any(|u| *u == s) {
			unique.push(s);
		}
	}
	let covered: u64 = unique.iter().map(|s| s.size(dims)).sum();
	covered == full.size(dims)
}

/// `checkpoint_restore`: installs the checkpoint's surviving coverage as
/// `data`'s new active partitioning and copies every slice's content back
/// in from the checkpoint shadow `Data`.
///
/// Unlike a normal switch, the checkpoint's partitioning and `data`'s prior
/// one may be defined over entirely different (pre-/post-shrink) groups,
/// so there is no single `Transition` between them; this reinstalls
/// directly from the checkpoint rather than going through
/// `Instance::switch`.
pub fn checkpoint_restore<T: ElementType>(myid: i64, checkpoint: &Checkpoint<T>, space: &Space, data: &mut Data<T>, fill: T) {
	data.install(checkpoint.partitioning.clone(), myid, fill);

	for map in data.mappings_mut() {
		if let Some(src) = checkpoint.data.mapping_covering(map.slice) {
			let mut cursor = map.slice.from;
			let mut buf = vec![fill; map.slice.size(space.dims()) as usize];
			src.layout.pack(&src.base, map.slice, &mut cursor, &mut buf);
			let mut cursor2 = map.slice.from;
			map.layout.unpack(&mut map.base, map.slice, &mut cursor2, &buf);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use laik_space::{BlockPartitioner, Index};

	#[test]
	fn redundant_partitioner_doubles_every_slice() {
		let space = Space::new_1d(100);
		let group = Group::world(0, 4, 0);
		let base = BlockPartitioner::new(0, 1);
		let redundant = RedundantPartitioner::new(&base, 2, 1);
		let p = Partitioning::build(&redundant, &space, &group, None);
		assert_eq!(p.tslices().len(), 8);
		// task 0 holds its own quarter plus a rotated-in replica of task 3's
		// (the wraparound neighbor at `(task + rotation) % size`).
		let own = Slice::new(Index::new(0, 0, 0), Index::new(25, 0, 0));
		let wrapped = Slice::new(Index::new(75, 0, 0), Index::new(100, 0, 0));
		let task0_slices: Vec<Slice> = p.slices_of(0).map(|ts| ts.slice).collect();
		assert_eq!(task0_slices.len(), 2);
		assert!(task0_slices.contains(&own));
		assert!(task0_slices.contains(&wrapped));
		// task 1 holds its own quarter plus the replica of task 0's.
		assert!(p.slices_of(1).any(|ts| ts.slice == own));
	}

	#[test]
	fn remove_failed_slices_survives_single_fault_with_redundancy_two() {
		let space = Space::new_1d(32);
		let group = Group::world(0, 4, 0);
		let base = BlockPartitioner::new(0, 1);
		let source_partitioning = Partitioning::build(&base, &space, &group, None);

		let mut source: Data<f64> = Data::new(space.dims(), "u");
		source.install(source_partitioning, 0, 0.0);

		let mut checkpoint = checkpoint_create(0, &space, &group, &source, &base, 2, 1, 0.0);

		let statuses = vec![NodeStatus::Ok, NodeStatus::Fault, NodeStatus::Ok, NodeStatus::Ok];
		let recoverable = checkpoint_remove_failed_slices(&mut checkpoint, &space, &statuses);
		assert!(recoverable);
	}

	#[test]
	fn remove_failed_slices_reports_loss_when_redundancy_exhausted() {
		let space = Space::new_1d(32);
		let group = Group::world(0, 4, 0);
		let base = BlockPartitioner::new(0, 1);
		let source_partitioning = Partitioning::build(&base, &space, &group, None);

		let mut source: Data<f64> = Data::new(space.dims(), "u");
		source.install(source_partitioning, 0, 0.0);

		// redundancy 1: task 1's slice has no surviving replica if task 1 faults.
		let mut checkpoint = checkpoint_create(0, &space, &group, &source, &base, 1, 1, 0.0);
		let statuses = vec![NodeStatus::Ok, NodeStatus::Fault, NodeStatus::Ok, NodeStatus::Ok];
		let recoverable = checkpoint_remove_failed_slices(&mut checkpoint, &space, &statuses);
		assert!(!recoverable);
	}

	#[test]
	fn create_and_restore_round_trips_values_on_single_rank() {
		let space = Space::new_1d(16);
		let group = Group::world(0, 1, 0);
		let all = laik_space::AllPartitioner;
		let partitioning = Partitioning::build(&all, &space, &group, None);

		let mut source: Data<i32> = Data::new(space.dims(), "u");
		source.install(partitioning, 0, 0);
		for (i, v) in source.mappings_mut()[0].base.iter_mut().enumerate() {
			*v = i as i32;
		}

		let checkpoint = checkpoint_create(0, &space, &group, &source, &all, 1, 0, 0);

		let mut restored: Data<i32> = Data::new(space.dims(), "u");
		checkpoint_restore(0, &checkpoint, &space, &mut restored, -1);

		assert_eq!(restored.mappings()[0].base, source.mappings()[0].base);
	}
}
