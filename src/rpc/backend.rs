//! The backend vtable: the only interface the engine invokes through,
//! never the reverse.

use laik_aseq::{Action, ActionSeq};
use laik_space::Group;

use crate::kv::KvStore;

/// Per-rank fault status, as agreed by `statusCheck`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
	Ok,
	Fault,
}

impl NodeStatus {
	pub fn is_ok(self) -> bool {
		matches!(self, NodeStatus::Ok)
	}
}

/// A transport a `Backend` drives on the engine's behalf. All entries may
/// be absent (left at their default no-op) except `finalize`, `prepare`,
/// `exec` and `update_group` -- those four are load-bearing for every
/// backend.
pub trait Backend {
	fn name(&self) -> &str;

	fn finalize(&mut self);

	/// Runs the optimizer pipeline over `aseq`, installing any
	/// backend-private extension actions (e.g. the async transform) this
	/// backend wants.
	fn prepare(&mut self, aseq: &mut ActionSeq);

	/// Frees backend-private resources attached to `aseq` (e.g. an async
	/// transform's request-handle table).
	fn cleanup(&mut self, aseq: &mut ActionSeq) {
		let _ = aseq;
	}

	/// Executes every action of `aseq`, in order.
	fn exec(&mut self, aseq: &ActionSeq);

	/// Notifies the backend a new process group is active, so it can
	/// build its own sub-communicator.
	fn update_group(&mut self, group: &Group);

	/// Stringifies a backend-private extension action kind, for tracing.
	fn log_action(&self, _action: &Action) -> Option<String> {
		None
	}

	/// Synchronizes a KV store's unsynchronized local entries across the
	/// whole group: flatten, all-gather sizes, broadcast payloads, apply
	/// with last-writer-wins per path.
	fn sync(&mut self, kv: &mut KvStore);

	/// Builds the new sub-communicator for `new` from the still-live
	/// ranks of `old`, given the agreed `statuses`.
	fn eliminate_nodes(&mut self, old: &Group, new: &Group, statuses: &[NodeStatus]);

	/// Collectively agrees on a per-rank status vector; returns the fault
	/// count. Implementations MUST ensure no two surviving ranks disagree.
	fn status_check(&mut self, group: &Group, statuses: &mut [NodeStatus]) -> usize;
}
