//! The per-process instance: the explicit context struct that replaces the
//! original's process-global mutable statics (selected backend, current
//! world group, KV store root, registered spaces, logging/config state).

use std::sync::Arc;

use laik_aseq::{ActionSeq, Stats};
use laik_data::{Data, DataFlow, ElementType};
use laik_rpc::{Backend, KvStore, NodeStatus};
use laik_space::{Group, Partitioning, ReductionOp, Slice, Space};
use laik_util::config::EnvConfig;

use crate::error::Result;

/// Stable id into an `Instance`'s space slab. Spaces are instance-owned so
/// `Space` itself can stay a plain value type with no back-reference (see
/// `laik_space::space`'s module doc).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpaceId(usize);

/// `Laik_Instance`: owns the live world group, the selected transport, the
/// KV metadata tree, and the space slab. Applications get exactly one of
/// these per process.
pub struct Instance {
	config: EnvConfig,
	backend: Box<dyn Backend>,
	world: Arc<Group>,
	kv: KvStore,
	spaces: Vec<Option<Space>>,
	error_handler: Option<Box<dyn FnMut(&str)>>,
	next_gid: u64,
}

impl Instance {
	/// Reads `EnvConfig` from the environment, installs the process-wide
	/// `tracing` subscriber (idempotent, see `laik_util::logging::init`),
	/// builds the initial world group and hands the backend its first
	/// `updateGroup` call.
	pub fn new(mut backend: Box<dyn Backend>, size: usize, myid: i64) -> Result<Self> {
		let config = EnvConfig::from_env()?;
		laik_util::logging::init(config.log_spec.as_ref());

		let world = Arc::new(Group::world(0, size, myid));
		backend.update_group(&world);

		Ok(Instance {
			config,
			backend,
			world,
			kv: KvStore::new(myid.max(0) as usize),
			spaces: Vec::new(),
			error_handler: None,
			next_gid: 1,
		})
	}

	pub fn config(&self) -> &EnvConfig {
		&self.config
	}

	pub fn backend_name(&self) -> &str {
		self.backend.name()
	}

	/// `laik_world` -- the *current* root group: post-shrink, if
	/// `failure_eliminate_nodes` has run, rather than a group snapshot
	/// taken before any failure.
	pub fn world(&self) -> &Arc<Group> {
		&self.world
	}

	pub fn myid(&self) -> i64 {
		self.world.myid()
	}

	pub fn kv(&self) -> &KvStore {
		&self.kv
	}

	pub fn kv_mut(&mut self) -> &mut KvStore {
		&mut self.kv
	}

	/// Synchronizes the KV store's unsynchronized local entries across the
	/// whole group through the backend.
	pub fn sync_kv(&mut self) {
		self.backend.sync(&mut self.kv);
	}

	pub fn add_space(&mut self, space: Space) -> SpaceId {
		self.spaces.push(Some(space));
		SpaceId(self.spaces.len() - 1)
	}

	pub fn space(&self, id: SpaceId) -> Option<&Space> {
		self.spaces.get(id.0).and_then(|s| s.as_ref())
	}

	pub fn space_mut(&mut self, id: SpaceId) -> Option<&mut Space> {
		self.spaces.get_mut(id.0).and_then(|s| s.as_mut())
	}

	/// `laik_free_space` -- O(n) removal, matching the original's linear
	/// instance-owned list.
	pub fn remove_space(&mut self, id: SpaceId) -> Option<Space> {
		self.spaces.get_mut(id.0).and_then(|s| s.take())
	}

	/// Installs a handler invoked once per failed transport operation. See
	/// `report_transport_error`.
	pub fn set_error_handler(&mut self, handler: impl FnMut(&str) + 'static) {
		self.error_handler = Some(Box::new(handler));
	}

	pub fn clear_error_handler(&mut self) {
		self.error_handler = None;
	}

	/// Reports a transport error surfaced by the backend. If a handler is
	/// installed it runs and control returns to the caller for the
	/// fault-tolerance path; otherwise the error is logged with a `PANIC`
	/// banner and the process exits with code 1, matching the original's
	/// uncaught-transport-error behavior.
	pub fn report_transport_error(&mut self, message: &str) {
		if let Some(handler) = self.error_handler.as_mut() {
			handler(message);
			return;
		}
		tracing::error!(%message, "PANIC: unhandled transport error");
		std::process::exit(1);
	}

	/// Switches `data` from its active partitioning to `to`, running the
	/// optimizer pipeline via the backend and then applying the resulting
	/// plan's local data motion directly.
	///
	/// This crate's `Backend` vtable only drives the optimizer and stats
	/// accounting (see `laik_rpc::backend`); no concrete backend here
	/// bridges bytes across processes. Consequently this method performs
	/// only same-process data motion and panics if the computed transition
	/// needs a send or a recv -- true of every group the shipped
	/// `SingleBackend` can run (size 1), false for a real multi-rank
	/// transport, which is intentionally out of scope (see DESIGN.md).
	pub fn switch<T: ElementType>(
		&mut self,
		data: &mut Data<T>,
		to: Partitioning,
		flow: DataFlow,
		red_op: Option<ReductionOp>,
		fill: T,
	) -> Stats {
		let myid = self.world.myid();
		let group_size = self.world.size();
		let transition = data.transition_to(&to, myid, flow, red_op);

		assert!(
			transition.send.is_empty() && transition.recv.is_empty(),
			"Instance::switch only performs same-process data motion in this tree; \
			 got a transition needing {} send(s) and {} recv(s)",
			transition.send.len(),
			transition.recv.len(),
		);

		let mut aseq = ActionSeq::from_transition(transition.clone(), group_size);
		self.backend.prepare(&mut aseq);

		// Stage pre-switch values for every local copy and (necessarily
		// single-writer, since send/recv are empty) reduction target
		// before `install` drops the old mapping list. A one-writer
		// reduction against the operator's identity reproduces the
		// original value exactly, so it is staged the same way as a plain
		// local copy.
		let mut staged: Vec<(Slice, Vec<T>)> = Vec::new();
		for lc in &transition.local {
			if let Some(map) = data.mapping_covering(lc.slice) {
				let mut cursor = lc.slice.from;
				let mut buf = vec![fill; lc.slice.size(transition.dims) as usize];
				map.layout.pack(&map.base, lc.slice, &mut cursor, &mut buf);
				staged.push((lc.slice, buf));
			}
		}
		for red in &transition.red {
			if red.input_group.contains(&(myid as usize)) {
				if let Some(map) = data.mapping_covering(red.slice) {
					let mut cursor = red.slice.from;
					let mut buf = vec![fill; red.slice.size(transition.dims) as usize];
					map.layout.pack(&map.base, red.slice, &mut cursor, &mut buf);
					staged.push((red.slice, buf));
				}
			}
		}

		data.install(to, myid, fill);

		for (slice, values) in staged {
			if let Some(map) = data.mapping_covering_mut(slice) {
				let mut cursor = slice.from;
				map.layout.unpack(&mut map.base, slice, &mut cursor, &values);
			}
		}

		self.backend.exec(&aseq);
		self.backend.cleanup(&mut aseq);
		aseq.stats
	}

	/// `failure_check_nodes`: delegates to the backend's collective
	/// `statusCheck`, returning the agreed per-rank status vector and the
	/// fault count.
	pub fn failure_check_nodes(&mut self) -> (Vec<NodeStatus>, usize) {
		let mut statuses = vec![NodeStatus::Ok; self.world.size()];
		let count = self.backend.status_check(&self.world, &mut statuses);
		(statuses, count)
	}

	/// `failure_eliminate_nodes`: installs a new world group that is the
	/// shrinking of the current world omitting every faulted rank, and
	/// makes it the instance's current world. The backend builds the new
	/// sub-communicator from the still-live old one first.
	pub fn failure_eliminate_nodes(&mut self, statuses: &[NodeStatus]) -> Arc<Group> {
		let remove: Vec<usize> = statuses
			.iter()
			.enumerate()
			.filter(|(_, s)| !s.is_ok())
			.map(|(i, _)| i)
			.collect();

		let gid = self.next_gid;
		self.next_gid += 1;
		let new_group = Arc::new(self.world.shrink(gid, &remove));
		self.backend.eliminate_nodes(&self.world, &new_group, statuses);
		self.backend.update_group(&new_group);
		self.world = new_group.clone();
		new_group
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use laik_rpc::SingleBackend;

	fn instance() -> Instance {
		Instance::new(Box::new(SingleBackend::new()), 1, 0).unwrap()
	}

	#[test]
	fn new_instance_starts_at_world_rank_zero() {
		let inst = instance();
		assert_eq!(inst.myid(), 0);
		assert_eq!(inst.world().size(), 1);
		assert_eq!(inst.backend_name(), "Single");
	}

	#[test]
	fn space_slab_reuses_no_ids_after_removal() {
		let mut inst = instance();
		let a = inst.add_space(Space::new_1d(10));
		let b = inst.add_space(Space::new_1d(20));
		inst.remove_space(a);
		assert!(inst.space(a).is_none());
		assert_eq!(inst.space(b).unwrap().size(), 20);
	}

	#[test]
	fn switch_preserves_values_through_repartition() {
		use laik_space::{AllPartitioner, BlockPartitioner};

		let mut inst = instance();
		let space = Space::new_1d(8);
		let group = Group::world(0, 1, 0);

		let all = Partitioning::build(&AllPartitioner, &space, &group, None);
		let mut data: Data<i32> = Data::new(space.dims(), "x");
		inst.switch(&mut data, all, DataFlow::None, None, 0);
		for (i, v) in data.mappings_mut()[0].base.iter_mut().enumerate() {
			*v = i as i32;
		}

		let block = Partitioning::build(&BlockPartitioner::new(0, 1), &space, &group, None);
		inst.switch(&mut data, block, DataFlow::Preserve, None, -1);

		assert_eq!(data.mappings().len(), 1);
		assert_eq!(data.mappings()[0].base, vec![0, 1, 2, 3, 4, 5, 6, 7]);
	}

	#[test]
	fn failure_eliminate_nodes_requires_no_faults_on_single_rank() {
		let mut inst = instance();
		let (statuses, count) = inst.failure_check_nodes();
		assert_eq!(count, 0);
		let new_world = inst.failure_eliminate_nodes(&statuses);
		assert_eq!(new_world.size(), 1);
		assert_eq!(inst.world().size(), 1);
	}
}
