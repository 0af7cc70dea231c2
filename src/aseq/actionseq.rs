//! `ActionSeq`: the container the optimizer pipeline transforms in place.

use laik_data::Transition;
use laik_space::Dims;

use crate::action::{Action, ActionKind, BufId, BufSlot};
use crate::stats::Stats;

/// Per-switch metadata an `Action`'s `tc` field indexes into: the space's
/// dimensionality and the group size the transition was computed over (a
/// backend needs both to interpret a bare `Slice`/peer-rank correctly).
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext {
	pub dims: Dims,
	pub group_size: usize,
}

/// `(context[], actions[], buf[], stats, backendOwner?)`. Buffers are
/// anonymous arena slots referenced by a small integer id; actions are
/// held as a tagged-variant IR rather than a packed byte stream (see
/// `action.rs`).
pub struct ActionSeq {
	pub contexts: Vec<TransitionContext>,
	pub actions: Vec<Action>,
	pub bufs: Vec<BufSlot>,
	pub stats: Stats,
	pub backend_owner: Option<String>,
	/// Consumed (and emptied) by `splitTransitionExecs`; holds one
	/// `Transition` per `ExecTransition` placeholder still present in
	/// `actions`.
	pending: Vec<Transition>,
}

impl ActionSeq {
	/// Lowers a single `Transition` into a fresh `ActionSeq` holding just
	/// the `ExecTransition` placeholder for it -- the straightforward,
	/// unexpanded sequence `prepare`'s first pass will expand.
	pub fn from_transition(transition: Transition, group_size: usize) -> Self {
		let dims = transition.dims;
		let tc = 0;
		ActionSeq {
			contexts: vec![TransitionContext { dims, group_size }],
			actions: vec![Action::new(ActionKind::ExecTransition { transition_idx: 0 }, 0, tc)],
			bufs: Vec::new(),
			stats: Stats::default(),
			backend_owner: None,
			pending: vec![transition],
		}
	}

	/// Lowers several transitions (e.g. chained switches folded into one
	/// seq) at once, one transition context per entry, each starting in
	/// its own round.
	pub fn from_transitions(transitions: Vec<(Transition, usize)>) -> Self {
		let mut contexts = Vec::with_capacity(transitions.len());
		let mut actions = Vec::with_capacity(transitions.len());
		let mut pending = Vec::with_capacity(transitions.len());
		for (tc, (transition, group_size)) in transitions.into_iter().enumerate() {
			contexts.push(TransitionContext { dims: transition.dims, group_size });
			actions.push(Action::new(ActionKind::ExecTransition { transition_idx: tc }, tc as u32, tc));
			pending.push(transition);
		}
		ActionSeq {
			contexts,
			actions,
			bufs: Vec::new(),
			stats: Stats::default(),
			backend_owner: None,
			pending,
		}
	}

	pub fn take_pending(&mut self, idx: usize) -> Transition {
		std::mem::replace(&mut self.pending[idx], Transition {
			dims: self.contexts[idx].dims,
			local: Vec::new(),
			send: Vec::new(),
			recv: Vec::new(),
			red: Vec::new(),
		})
	}

	pub fn alloc_buf(&mut self, size: usize) -> BufId {
		let id = self.bufs.len() as BufId;
		self.bufs.push(BufSlot { size, offset: None });
		id
	}

	pub fn dims_of(&self, tc: usize) -> Dims {
		self.contexts[tc].dims
	}

	/// Number of actions of a given predicate -- handy for before/after
	/// pass logging without cloning the whole sequence.
	pub fn len(&self) -> usize {
		self.actions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.actions.is_empty()
	}

	/// Runs the full 14-step `prepare` pipeline (see `optimize.rs`).
	pub fn prepare(&mut self, cfg: &crate::optimize::OptimizerConfig) {
		crate::optimize::run_pipeline(self, cfg);
	}
}
