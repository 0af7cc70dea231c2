//! The 14-step `prepare` pipeline, applied in this exact order. Each pass
//! logs a before/after trace (via `tracing`) if it changed the sequence,
//! and is idempotent on an already-reduced sequence.

use itertools::Itertools;
use laik_space::Dims;
use tracing::debug;

use crate::action::{slice_elements, Action, ActionKind, BackendActionKind};
use crate::actionseq::ActionSeq;

/// Knobs gating the optional passes; everything else in the pipeline
/// always runs.
#[derive(Debug, Clone, Copy)]
pub struct OptimizerConfig {
	/// This process's rank, needed by `sort_2phases`'s deadlock-free rule.
	pub myid: usize,
	/// Gates `replaceWithAllReduce` (step 3).
	pub all_reduce: bool,
	/// Gates the optional async transform (step 12).
	pub async_transform: bool,
	/// Reduce actions larger than this many elements are split by
	/// `splitReduce` (step 6). `None` disables splitting.
	pub reduce_split_granularity: Option<usize>,
}

impl Default for OptimizerConfig {
	fn default() -> Self {
		OptimizerConfig {
			myid: 0,
			all_reduce: true,
			async_transform: false,
			reduce_split_granularity: None,
		}
	}
}

/// Runs all 14 steps of `prepare`, in order.
pub fn run_pipeline(seq: &mut ActionSeq, cfg: &OptimizerConfig) {
	run_pass("splitTransitionExecs", seq, split_transition_execs);
	run_pass("flattenPacking", seq, flatten_packing);
	if cfg.all_reduce {
		run_pass("replaceWithAllReduce", seq, |s| replace_with_all_reduce(s));
	}
	run_pass("combineActions(1)", seq, combine_actions);
	alloc_buffer(seq);
	if let Some(gran) = cfg.reduce_split_granularity {
		run_pass("splitReduce", seq, |s| split_reduce(s, gran));
	}
	alloc_buffer(seq);
	sort_rounds(seq);
	run_pass("combineActions(2)", seq, combine_actions);
	alloc_buffer(seq);
	sort_2phases(seq, cfg.myid);
	if cfg.async_transform {
		run_pass("asyncTransform", seq, |s| {
			async_transform(s);
			true
		});
	}
	sort_rounds(seq);
	finalize_stats(seq, cfg.async_transform);
}

fn run_pass(name: &str, seq: &mut ActionSeq, pass: impl Fn(&mut ActionSeq) -> bool) {
	let before = seq.len();
	let changed = pass(seq);
	if changed {
		debug!(pass = name, before, after = seq.len(), "action sequence changed");
	}
}

/// Step 1: expand every `ExecTransition` placeholder into the concrete
/// actions its `Transition` describes. Local copies route through a
/// scratch buffer (`CopyToBuf`/`CopyFromBuf`) since source and
/// destination mappings may use different layouts; sends/recvs lower to
/// `PackAndSend`/`RecvAndUnpack`, reductions to `GroupReduce`.
fn split_transition_execs(seq: &mut ActionSeq) -> bool {
	let mut changed = false;
	let old = std::mem::take(&mut seq.actions);
	let mut out = Vec::with_capacity(old.len());

	for a in old {
		let ActionKind::ExecTransition { transition_idx } = a.kind else {
			out.push(a);
			continue;
		};
		changed = true;
		let dims = seq.dims_of(transition_idx);
		let transition = seq.take_pending(transition_idx);
		let (round, tc) = (a.round, a.tc);

		for lc in &transition.local {
			let count = slice_elements(lc.slice, dims);
			let buf = seq.alloc_buf(count);
			out.push(Action::new(ActionKind::CopyToBuf { buf, slice: lc.slice }, round, tc));
			out.push(Action::new(ActionKind::CopyFromBuf { buf, slice: lc.slice }, round, tc));
		}
		for s in &transition.send {
			out.push(Action::new(ActionKind::PackAndSend { slice: s.slice, peer: s.peer }, round, tc));
		}
		for r in &transition.recv {
			out.push(Action::new(ActionKind::RecvAndUnpack { slice: r.slice, peer: r.peer }, round, tc));
		}
		for red in &transition.red {
			out.push(Action::new(
				ActionKind::GroupReduce {
					input_group: red.input_group.clone(),
					output_group: red.output_group.clone(),
					slice: red.slice,
					op: red.op,
				},
				round,
				tc,
			));
		}
	}

	seq.actions = out;
	changed
}

/// Step 2: a `PackAndSend`/`RecvAndUnpack` over a 1D space is already
/// contiguous in its mapping's backing store, so no packing loop is
/// needed -- it becomes a direct `MapSend`/`MapRecv` referencing the
/// mapping (here always `map_no = 0`: this lowering doesn't yet track
/// multi-mapping tags, so every slice is assumed to own its mapping).
fn flatten_packing(seq: &mut ActionSeq) -> bool {
	let mut changed = false;
	let dims_by_tc: Vec<Dims> = seq.contexts.iter().map(|c| c.dims).collect();
	for a in &mut seq.actions {
		match &a.kind {
			ActionKind::PackAndSend { slice: _, peer } if dims_by_tc[a.tc] == Dims::One => {
				let peer = *peer;
				a.kind = ActionKind::MapSend { map_no: 0, peer };
				changed = true;
			}
			ActionKind::RecvAndUnpack { slice: _, peer } if dims_by_tc[a.tc] == Dims::One => {
				let peer = *peer;
				a.kind = ActionKind::MapRecv { map_no: 0, peer };
				changed = true;
			}
			_ => {}
		}
	}
	changed
}

/// Step 3: a `GroupReduce` whose input and output groups both equal the
/// full group becomes `Reduce(root=None)`, i.e. a collective all-reduce.
fn replace_with_all_reduce(seq: &mut ActionSeq) -> bool {
	let mut changed = false;
	let group_sizes: Vec<usize> = seq.contexts.iter().map(|c| c.group_size).collect();
	for a in &mut seq.actions {
		if let ActionKind::GroupReduce { input_group, output_group, slice, op } = &a.kind {
			let size = group_sizes[a.tc];
			let is_full = |g: &[usize]| g.len() == size && g.iter().enumerate().all(|(i, &r)| i == r);
			if is_full(input_group) && is_full(output_group) {
				a.kind = ActionKind::Reduce {
					input_group: input_group.clone(),
					output_group: output_group.clone(),
					slice: *slice,
					op: *op,
					root: None,
				};
				changed = true;
			}
		}
	}
	changed
}

/// Steps 4/9: merge adjacent same-peer, same-direction, same-round
/// sends/recvs referring to contiguous slices (extent touching along
/// dimension 0) into one larger action, via `itertools`' `coalesce`
/// adaptor -- the standard fold-adjacent-or-keep-both idiom.
fn combine_actions(seq: &mut ActionSeq) -> bool {
	let before = seq.actions.len();
	seq.actions = std::mem::take(&mut seq.actions)
		.into_iter()
		.coalesce(|a, b| {
			if a.round == b.round && a.tc == b.tc {
				if let Some(merged) = try_merge(&a.kind, &b.kind) {
					return Ok(Action::new(merged, a.round, a.tc));
				}
			}
			Err((a, b))
		})
		.collect();
	seq.actions.len() != before
}

fn try_merge(a: &ActionKind, b: &ActionKind) -> Option<ActionKind> {
	use ActionKind::*;
	match (a, b) {
		(PackAndSend { slice: s1, peer: p1 }, PackAndSend { slice: s2, peer: p2 }) if p1 == p2 && contiguous(*s1, *s2) => {
			Some(PackAndSend { slice: join(*s1, *s2), peer: *p1 })
		}
		(RecvAndUnpack { slice: s1, peer: p1 }, RecvAndUnpack { slice: s2, peer: p2 }) if p1 == p2 && contiguous(*s1, *s2) => {
			Some(RecvAndUnpack { slice: join(*s1, *s2), peer: *p1 })
		}
		(MapSend { map_no: m1, peer: p1 }, MapSend { map_no: m2, peer: p2 }) if m1 == m2 && p1 == p2 => {
			Some(MapSend { map_no: *m1, peer: *p1 })
		}
		(MapRecv { map_no: m1, peer: p1 }, MapRecv { map_no: m2, peer: p2 }) if m1 == m2 && p1 == p2 => {
			Some(MapRecv { map_no: *m1, peer: *p1 })
		}
		_ => None,
	}
}

fn contiguous(a: laik_space::Slice, b: laik_space::Slice) -> bool {
	a.to.x == b.from.x && a.to.y == b.to.y && a.to.z == b.to.z && a.from.y == b.from.y && a.from.z == b.from.z
}

fn join(a: laik_space::Slice, b: laik_space::Slice) -> laik_space::Slice {
	laik_space::Slice::new(a.from, b.to)
}

/// Steps 5/7/10: materialize every buffer slot that doesn't yet have an
/// offset into the seq's single backing arena.
fn alloc_buffer(seq: &mut ActionSeq) {
	let mut next = seq.bufs.iter().filter_map(|b| b.offset.map(|o| o + b.size)).max().unwrap_or(0);
	for b in &mut seq.bufs {
		if b.offset.is_none() {
			b.offset = Some(next);
			next += b.size;
		}
	}
}

/// Step 6: splits a `Reduce`/`GroupReduce` action whose slice spans more
/// than `granularity` elements along dimension 0 into several smaller
/// ones, bounding peak buffer pressure.
fn split_reduce(seq: &mut ActionSeq, granularity: usize) -> bool {
	let mut changed = false;
	let mut out = Vec::with_capacity(seq.actions.len());
	for a in seq.actions.drain(..) {
		match &a.kind {
			ActionKind::Reduce { input_group, output_group, slice, op, root } if slice.extent(0) as usize > granularity => {
				changed = true;
				for part in split_slice(*slice, granularity) {
					out.push(Action::new(
						ActionKind::Reduce {
							input_group: input_group.clone(),
							output_group: output_group.clone(),
							slice: part,
							op: *op,
							root: *root,
						},
						a.round,
						a.tc,
					));
				}
			}
			ActionKind::GroupReduce { input_group, output_group, slice, op } if slice.extent(0) as usize > granularity => {
				changed = true;
				for part in split_slice(*slice, granularity) {
					out.push(Action::new(
						ActionKind::GroupReduce {
							input_group: input_group.clone(),
							output_group: output_group.clone(),
							slice: part,
							op: *op,
						},
						a.round,
						a.tc,
					));
				}
			}
			_ => out.push(a),
		}
	}
	seq.actions = out;
	changed
}

fn split_slice(s: laik_space::Slice, granularity: usize) -> Vec<laik_space::Slice> {
	let mut parts = Vec::new();
	let mut from = s.from.x;
	while from < s.to.x {
		let to = (from + granularity as u64).min(s.to.x);
		let mut part = s;
		part.from.x = from;
		part.to.x = to;
		parts.push(part);
		from = to;
	}
	parts
}

/// Step 8/13: stable sort by `round`.
fn sort_rounds(seq: &mut ActionSeq) {
	seq.actions.sort_by_key(|a| a.round);
}

/// Step 11: within each round, order sends/recvs so no pair of processes
/// deadlocks. Standard rule: lexicographic `(min(peer,self), max(peer,
/// self), direction)`, direction chosen so the lower rank sends first.
fn sort_2phases(seq: &mut ActionSeq, myid: usize) {
	seq.actions.sort_by_key(|a| {
		let round = a.round;
		let (lo, hi, dir) = match a.kind.peer() {
			Some(peer) => {
				let lo = myid.min(peer);
				let hi = myid.max(peer);
				// lower rank's send and higher rank's recv share slot 0;
				// the symmetric pairing shares slot 1.
				let lower_sends_first = myid < peer;
				let dir = if (lower_sends_first && a.kind.is_send()) || (!lower_sends_first && a.kind.is_recv()) {
					0
				} else {
					1
				};
				(lo, hi, dir)
			}
			None => (myid, myid, 0),
		};
		(round, lo, hi, dir)
	});
}

/// Step 12: each `BufSend`/`BufRecv`/`MapSend`/`MapRecv`/`PackAndSend`/
/// `RecvAndUnpack` becomes `{Isend|Irecv, Wait}`. All `Irecv`s are
/// pre-posted into a new round 0; all `Wait`s for sends are pushed to a
/// final round. A single `ReqAlloc` action allocates the request table.
fn async_transform(seq: &mut ActionSeq) {
	let max_round = seq.actions.iter().map(|a| a.round).max().unwrap_or(0);
	let final_round = max_round + 1;

	let mut req_slot = 0usize;
	let mut out = Vec::with_capacity(seq.actions.len() * 2 + 1);
	let mut waits = Vec::new();

	for a in seq.actions.drain(..) {
		let peer = a.kind.peer();
		let is_send = a.kind.is_send();
		let is_recv = a.kind.is_recv();
		if !is_send && !is_recv {
			out.push(a);
			continue;
		}
		let peer = peer.expect("send/recv action must carry a peer");
		let slot = req_slot;
		req_slot += 1;

		if is_recv {
			out.push(Action::new(
				ActionKind::Extension(BackendActionKind::IRecv { buf: 0, offset: 0, count: 0, peer, req_slot: slot }),
				0,
				a.tc,
			));
			waits.push(Action::new(ActionKind::Extension(BackendActionKind::Wait { req_slot: slot }), final_round, a.tc));
		} else {
			out.push(Action::new(
				ActionKind::Extension(BackendActionKind::ISend { buf: 0, offset: 0, count: 0, peer, req_slot: slot }),
				a.round,
				a.tc,
			));
			waits.push(Action::new(ActionKind::Extension(BackendActionKind::Wait { req_slot: slot }), final_round, a.tc));
		}
	}

	if req_slot > 0 {
		out.insert(0, Action::new(ActionKind::Extension(BackendActionKind::ReqAlloc { count: req_slot }), 0, 0));
	}
	out.extend(waits);
	seq.actions = out;
}

/// Step 14: frees nothing further (pending transitions are already
/// consumed by step 1) and computes final per-seq statistics.
fn finalize_stats(seq: &mut ActionSeq, is_async: bool) {
	let mut stats = crate::stats::Stats { is_async, ..Default::default() };
	for a in &seq.actions {
		let dims = seq.contexts[a.tc].dims;
		if a.kind.is_send() {
			stats.send_count += 1;
			stats.send_elements += a.kind.message_count(dims);
		}
		if a.kind.is_recv() {
			stats.recv_count += 1;
			stats.recv_elements += a.kind.message_count(dims);
		}
		if matches!(a.kind, ActionKind::Reduce { .. } | ActionKind::GroupReduce { .. }) {
			stats.reduce_count += 1;
		}
	}
	seq.stats = stats;
}

#[cfg(test)]
mod tests {
	use super::*;
	use laik_data::{DataFlow, Transition};
	use laik_space::{AllPartitioner, BlockPartitioner, Group, Partitioning, Space};

	fn build_seq(myid: usize) -> ActionSeq {
		let space = Space::new_1d(100);
		let group = Group::world(0, 4, myid as i64);
		let from = Partitioning::build(&BlockPartitioner::new(0, 1), &space, &group, None);
		let to = Partitioning::build(&AllPartitioner, &space, &group, None);
		let t = Transition::compute(&from, &to, space.dims(), myid as i64, DataFlow::Preserve, None);
		ActionSeq::from_transition(t, group.size())
	}

	#[test]
	fn pipeline_expands_and_is_idempotent_on_rerun() {
		let mut seq = build_seq(0);
		let cfg = OptimizerConfig { myid: 0, ..Default::default() };
		seq.prepare(&cfg);
		let after_first = seq.actions.len();
		assert!(after_first > 0);
		assert!(!matches!(seq.actions[0].kind, ActionKind::ExecTransition { .. }));

		// re-running the same passes on an already-reduced sequence must
		// not grow it further (no ExecTransition placeholders remain, no
		// further merges possible).
		run_pass("combineActions(re-run)", &mut seq, combine_actions);
		assert_eq!(seq.actions.len(), after_first);
	}

	#[test]
	fn split_transition_execs_consumes_all_placeholders() {
		let mut seq = build_seq(1);
		split_transition_execs(&mut seq);
		assert!(seq.actions.iter().all(|a| !matches!(a.kind, ActionKind::ExecTransition { .. })));
	}

	#[test]
	fn async_transform_preposts_recvs_in_round_zero() {
		let mut seq = build_seq(1);
		let cfg = OptimizerConfig { myid: 1, async_transform: true, ..Default::default() };
		seq.prepare(&cfg);
		assert!(seq.stats.is_async);
		let any_irecv_not_round0 = seq.actions.iter().any(|a| {
			matches!(a.kind, ActionKind::Extension(BackendActionKind::IRecv { .. })) && a.round != 0
		});
		assert!(!any_irecv_not_round0);
	}

	#[test]
	fn split_reduce_bounds_slice_width() {
		let space = Space::new_1d(10);
		let group = Group::world(0, 2, 0);
		let from = Partitioning::build(&AllPartitioner, &space, &group, None);
		let to = Partitioning::build(&laik_space::MasterPartitioner, &space, &group, None);
		let t = Transition::compute(
			&from,
			&to,
			space.dims(),
			0,
			DataFlow::None,
			Some(laik_space::ReductionOp::Sum),
		);
		let mut seq = ActionSeq::from_transition(t, group.size());
		split_transition_execs(&mut seq);
		split_reduce(&mut seq, 3);
		for a in &seq.actions {
			if let ActionKind::GroupReduce { slice, .. } = &a.kind {
				assert!(slice.extent(0) <= 3);
			}
		}
	}

	/// Testable property 7: after `sort_2phases`, every matching send/recv
	/// pair between two processes lands in the same round on both sides --
	/// so neither side can ever be waiting on a round the other hasn't
	/// reached yet.
	#[test]
	fn sort_2phases_pairs_matching_send_recv_in_the_same_round() {
		let space = Space::new_1d(100);
		let group_size = 4;

		let round_of_peer = |myid: usize, peer: usize, is_send: bool| -> Vec<u32> {
			let group = Group::world(0, group_size, myid as i64);
			let from = Partitioning::build(&BlockPartitioner::new(0, 1), &space, &group, None);
			let to = Partitioning::build(&AllPartitioner, &space, &group, None);
			let t = Transition::compute(&from, &to, space.dims(), myid as i64, DataFlow::Preserve, None);
			let mut seq = ActionSeq::from_transition(t, group_size);
			let cfg = OptimizerConfig { myid, ..Default::default() };
			seq.prepare(&cfg);
			seq.actions
				.iter()
				.filter(|a| a.kind.peer() == Some(peer) && (if is_send { a.kind.is_send() } else { a.kind.is_recv() }))
				.map(|a| a.round)
				.collect()
		};

		for p in 0..group_size {
			for q in (p + 1)..group_size {
				let sends_p_to_q = round_of_peer(p, q, true);
				let recvs_q_from_p = round_of_peer(q, p, false);
				assert_eq!(
					sends_p_to_q, recvs_q_from_p,
					"rounds of P{p}->Q{q} send must match Q{q}<-P{p} recv exactly"
				);

				let sends_q_to_p = round_of_peer(q, p, true);
				let recvs_p_from_q = round_of_peer(p, q, false);
				assert_eq!(sends_q_to_p, recvs_p_from_q);
			}
		}
	}
}
