//! The backend vtable, the path-addressed KV store, and the in-process
//! single-rank backend.

pub mod backend;
pub mod kv;
pub mod single;

pub use backend::{Backend, NodeStatus};
pub use kv::{KvStore, Stamp};
pub use single::SingleBackend;
