//! Data containers, layouts and transition computation.

pub mod data;
pub mod element;
pub mod mapping;
pub mod transition;

pub use data::Data;
pub use element::{init_slice, reduce_slice, ElementType, ReductionOp};
pub use mapping::{Layout, Mapping};
pub use transition::{DataFlow, LocalCopy, ReduceEntry, RecvEntry, SendEntry, Transition};
