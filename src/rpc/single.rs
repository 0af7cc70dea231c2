//! The in-process, single-rank backend: no transport, because a group of
//! size 1 can never produce a send, a recv, or a multi-member reduce.

use laik_aseq::{Action, ActionSeq};
use laik_space::Group;
use tracing::debug;

use crate::backend::{Backend, NodeStatus};
use crate::kv::KvStore;

/// Grounded on `backend-single.c`'s role in the original: the fallback
/// backend for a lone process, used by tests and as the degenerate case
/// of every real transport. It never builds a communicator and never
/// looks at an action's peer field, because there is never a peer.
pub struct SingleBackend;

impl SingleBackend {
	pub fn new() -> Self {
		SingleBackend
	}
}

impl Default for SingleBackend {
	fn default() -> Self {
		Self::new()
	}
}

impl Backend for SingleBackend {
	fn name(&self) -> &str {
		"Single"
	}

	fn finalize(&mut self) {
		debug!("single backend finalized");
	}

	fn prepare(&mut self, aseq: &mut ActionSeq) {
		aseq.prepare(&laik_aseq::OptimizerConfig::default());
	}

	fn exec(&mut self, aseq: &ActionSeq) {
		for action in &aseq.actions {
			assert!(
				action.kind.peer().is_none(),
				"single backend was given a multi-process action: {:?}",
				action.kind,
			);
			debug!(kind = ?action.kind, "exec (no-op, single rank)");
		}
	}

	fn update_group(&mut self, group: &Group) {
		assert_eq!(group.size(), 1, "single backend requires a group of size 1");
	}

	fn log_action(&self, action: &Action) -> Option<String> {
		Some(format!("{:?}", action.kind))
	}

	fn sync(&mut self, kv: &mut KvStore) {
		// Nothing to exchange with: flatten local writes straight back in
		// so they're marked synchronized, matching a real backend's
		// all-gather-of-one-entry round trip.
		let records = kv.unsynced();
		kv.apply_synced(records);
	}

	fn eliminate_nodes(&mut self, _old: &Group, new: &Group, statuses: &[NodeStatus]) {
		assert!(
			statuses.iter().all(NodeStatus::is_ok),
			"single backend has no spare ranks to eliminate a failed node"
		);
		assert_eq!(new.size(), 1);
	}

	fn status_check(&mut self, group: &Group, statuses: &mut [NodeStatus]) -> usize {
		assert_eq!(group.size(), 1);
		statuses[0] = NodeStatus::Ok;
		0
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use laik_data::Transition;

	#[test]
	fn update_group_accepts_singleton() {
		let mut backend = SingleBackend::new();
		let g = Group::world(0, 1, 0);
		backend.update_group(&g);
	}

	#[test]
	#[should_panic]
	fn update_group_rejects_larger_group() {
		let mut backend = SingleBackend::new();
		let g = Group::world(0, 2, 0);
		backend.update_group(&g);
	}

	#[test]
	fn exec_accepts_empty_action_seq() {
		let mut backend = SingleBackend::new();
		let t = Transition {
			dims: laik_space::Dims::One,
			local: Vec::new(),
			send: Vec::new(),
			recv: Vec::new(),
			red: Vec::new(),
		};
		let aseq = ActionSeq::from_transition(t, 1);
		backend.exec(&aseq);
	}

	#[test]
	fn sync_round_trips_local_writes() {
		let mut backend = SingleBackend::new();
		let mut kv = KvStore::new(0);
		kv.set_value("a", b"v".to_vec());
		backend.sync(&mut kv);
		assert_eq!(kv.get("a"), Some(&b"v"[..]));
		assert!(kv.unsynced().is_empty());
	}
}
