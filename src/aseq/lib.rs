//! Action-sequence IR and the 14-step optimizer pipeline that lowers a
//! `Transition` into something a `Backend` can execute.

pub mod action;
pub mod actionseq;
pub mod optimize;
pub mod stats;

pub use action::{Action, ActionKind, BackendActionKind, BufId, BufSlot};
pub use actionseq::{ActionSeq, TransitionContext};
pub use optimize::OptimizerConfig;
pub use stats::Stats;
