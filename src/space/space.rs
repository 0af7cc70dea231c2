//! Spaces: the coordinate system that Partitionings and Data are defined
//! over.
//!
//! The original engine gives every `Space` a back-reference to its owning
//! instance so `free_space` can unlink itself from the instance's space
//! list and walk derived partitionings to free them. Here the instance
//! owns a slab of spaces keyed by a stable id (see `laik_core::Instance`)
//! instead, so `Space` stays a plain value type and `laik_space` has no
//! dependency on the crate that defines `Instance`. Invalidation of
//! derived `Partitioning`s is therefore lazy rather than list-walked: each
//! `Space` carries a `generation` counter that a `Partitioning` snapshots
//! at construction time, and whose staleness the owner checks before
//! reuse.

use crate::index::{Dims, Index, Slice};

/// An index space: `dims` coordinates plus the `Slice` they range over
/// (always starting at the zero index).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Space {
	dims: Dims,
	slice: Slice,
	name: String,
	/// Bumped on every `resize`; a `Partitioning` built against an older
	/// generation is stale and must be rebuilt before use.
	generation: u64,
}

impl Space {
	pub fn new_1d(size: u64) -> Self {
		Self::new(Dims::One, Index::new(size, 0, 0))
	}

	pub fn new_2d(x: u64, y: u64) -> Self {
		Self::new(Dims::Two, Index::new(x, y, 0))
	}

	pub fn new_3d(x: u64, y: u64, z: u64) -> Self {
		Self::new(Dims::Three, Index::new(x, y, z))
	}

	fn new(dims: Dims, to: Index) -> Self {
		Space {
			dims,
			slice: Slice::new(Index::zero(), to),
			name: String::new(),
			generation: 0,
		}
	}

	pub fn dims(&self) -> Dims {
		self.dims
	}

	pub fn slice(&self) -> Slice {
		self.slice
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn set_name(&mut self, name: impl Into<String>) {
		self.name = name.into();
	}

	/// In-place resize along every dimension; bumps `generation` so any
	/// `Partitioning` built from the old size is recognized as stale.
	pub fn resize(&mut self, to: Index) {
		self.slice = Slice::new(Index::zero(), to);
		self.generation += 1;
	}

	pub fn size(&self) -> u64 {
		self.slice.size(self.dims)
	}
}
