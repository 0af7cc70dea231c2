//! The action IR: a tagged variant (sum type) held in a contiguous
//! `Vec<Action>`, rather than a packed byte stream -- `round` stays an
//! explicit sort field the optimizer passes reorder directly.

use laik_space::{ReductionOp, Slice};

/// Identifies one of an `ActionSeq`'s anonymous byte arenas.
pub type BufId = u32;

/// A materialized buffer slot. Before `allocBuffer` runs, only `size` is
/// known; after, `offset` gives its position within the seq's single
/// backing arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufSlot {
	pub size: usize,
	pub offset: Option<usize>,
}

/// Backend-private action kinds layered on top of the core catalogue by
/// the async transform (or by a backend that needs its own bookkeeping
/// action, e.g. allocating a request-handle table). A backend registers
/// its extension at construction time; the core engine never interprets
/// `Extension` itself, only `log_action` (or the backend's own `exec`)
/// does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendActionKind {
	/// Allocates the request-handle array an async transform's
	/// `Isend`/`Irecv`/`Wait` triad references.
	ReqAlloc { count: usize },
	ISend { buf: BufId, offset: usize, count: usize, peer: usize, req_slot: usize },
	IRecv { buf: BufId, offset: usize, count: usize, peer: usize, req_slot: usize },
	Wait { req_slot: usize },
}

/// The core action-kind catalogue, plus a backend `Extension` escape
/// hatch for codes a backend defines itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
	Nop,

	/// Not a real action: a placeholder the initial lowering emits for a
	/// whole `Transition`, expanded away by `splitTransitionExecs`. Never
	/// survives past the first optimizer pass.
	ExecTransition { transition_idx: usize },

	BufReserve { buf: BufId, count: usize },
	BufSend { buf: BufId, offset: usize, count: usize, peer: usize },
	BufRecv { buf: BufId, offset: usize, count: usize, peer: usize },
	RBufSend { buf: BufId, offset: usize, count: usize, peer: usize },
	RBufRecv { buf: BufId, offset: usize, count: usize, peer: usize },
	MapSend { map_no: usize, peer: usize },
	MapRecv { map_no: usize, peer: usize },
	CopyToBuf { buf: BufId, slice: Slice },
	CopyFromBuf { buf: BufId, slice: Slice },
	PackToBuf { slice: Slice, buf: BufId, offset: usize },
	UnpackFromBuf { slice: Slice, buf: BufId, offset: usize },
	MapPackToBuf { map_no: usize, slice: Slice, buf: BufId, offset: usize },
	MapUnpackFromBuf { map_no: usize, slice: Slice, buf: BufId, offset: usize },
	MapPackAndSend { map_no: usize, slice: Slice, peer: usize },
	PackAndSend { slice: Slice, peer: usize },
	MapRecvAndUnpack { map_no: usize, slice: Slice, peer: usize },
	RecvAndUnpack { slice: Slice, peer: usize },
	Reduce { input_group: Vec<usize>, output_group: Vec<usize>, slice: Slice, op: ReductionOp, root: Option<usize> },
	GroupReduce { input_group: Vec<usize>, output_group: Vec<usize>, slice: Slice, op: ReductionOp },
	RBufLocalReduce { buf: BufId, offset: usize, count: usize, op: ReductionOp },
	RBufCopy { src_buf: BufId, src_offset: usize, dst_buf: BufId, dst_offset: usize, count: usize },
	BufCopy { src: BufId, dst: BufId, count: usize },
	BufInit { buf: BufId, count: usize, op: ReductionOp },

	/// A backend-private extension action, carrying codes `>= Backend`.
	Extension(BackendActionKind),
}

impl ActionKind {
	/// Peer this action communicates with, if it's a point-to-point
	/// send/recv -- used by `combineActions`/`sort_2phases`.
	pub fn peer(&self) -> Option<usize> {
		use ActionKind::*;
		match self {
			BufSend { peer, .. }
			| BufRecv { peer, .. }
			| RBufSend { peer, .. }
			| RBufRecv { peer, .. }
			| MapSend { peer, .. }
			| MapRecv { peer, .. }
			| MapPackAndSend { peer, .. }
			| PackAndSend { peer, .. }
			| MapRecvAndUnpack { peer, .. }
			| RecvAndUnpack { peer, .. } => Some(*peer),
			Extension(BackendActionKind::ISend { peer, .. }) | Extension(BackendActionKind::IRecv { peer, .. }) => {
				Some(*peer)
			}
			_ => None,
		}
	}

	/// `true` for anything that moves bytes away from this process
	/// (sends); used to pick send/recv ordering in `sort_2phases`.
	pub fn is_send(&self) -> bool {
		use ActionKind::*;
		matches!(
			self,
			BufSend { .. } | RBufSend { .. } | MapSend { .. } | MapPackAndSend { .. } | PackAndSend { .. }
		) || matches!(self, Extension(BackendActionKind::ISend { .. }))
	}

	pub fn is_recv(&self) -> bool {
		use ActionKind::*;
		matches!(
			self,
			BufRecv { .. } | RBufRecv { .. } | MapRecv { .. } | MapRecvAndUnpack { .. } | RecvAndUnpack { .. }
		) || matches!(self, Extension(BackendActionKind::IRecv { .. }))
	}

	/// Number of elements this action moves, for stats. For slice-based
	/// sends/recvs the caller must supply the space's `Dims` (the size of
	/// an unused trailing dimension is always 1, never 0, so it never
	/// zeroes out the product).
	pub fn message_count(&self, dims: laik_space::Dims) -> usize {
		use ActionKind::*;
		match self {
			BufSend { count, .. } | BufRecv { count, .. } | RBufSend { count, .. } | RBufRecv { count, .. } => *count,
			PackAndSend { slice, .. } | RecvAndUnpack { slice, .. } => slice_elements(*slice, dims),
			_ => 0,
		}
	}
}

/// Element count of `slice` over its first `dims.count()` dimensions
/// (unused trailing dimensions contribute a factor of 1, never 0).
pub(crate) fn slice_elements(slice: Slice, dims: laik_space::Dims) -> usize {
	(0..dims.count()).map(|d| slice.extent(d).max(1)).product::<u64>() as usize
}

/// One entry of an `ActionSeq`: a kind, a `round` (sort key for
/// deadlock-free scheduling) and the index of the transition context it
/// belongs to.
#[derive(Debug, Clone)]
pub struct Action {
	pub kind: ActionKind,
	pub round: u32,
	pub tc: usize,
}

impl Action {
	pub fn new(kind: ActionKind, round: u32, tc: usize) -> Self {
		Action { kind, round, tc }
	}
}
