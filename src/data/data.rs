//! Data containers bound to a `Space`, switched between partitionings.
//!
//! The heavy lifting of actually moving bytes between processes belongs to
//! the action-sequence/backend layers above this crate; `Data` itself only
//! owns the local state a switch reads and replaces: the active
//! partitioning and the mapping list for this process's own slices.

use laik_space::{Dims, Partitioning, Slice};

use crate::element::ElementType;
use crate::mapping::Mapping;
use crate::transition::{DataFlow, Transition};
use crate::ReductionOp;

/// `(space, element-type, active-partitioning?, mapping-list?, ...)`.
pub struct Data<T: ElementType> {
	name: String,
	dims: Dims,
	active: Option<Partitioning>,
	mappings: Vec<Mapping<T>>,
}

impl<T: ElementType> Data<T> {
	pub fn new(dims: Dims, name: impl Into<String>) -> Self {
		Data {
			name: name.into(),
			dims,
			active: None,
			mappings: Vec::new(),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn active_partitioning(&self) -> Option<&Partitioning> {
		self.active.as_ref()
	}

	pub fn mappings(&self) -> &[Mapping<T>] {
		&self.mappings
	}

	pub fn mappings_mut(&mut self) -> &mut [Mapping<T>] {
		&mut self.mappings
	}

	/// Computes (but does not execute) the transition from the currently
	/// active partitioning to `to`. A `Data` with no active partitioning
	/// yet behaves as if switching from an empty one: flow is forced to
	/// `None` since there is nothing to preserve.
	pub fn transition_to(&self, to: &Partitioning, myid: i64, flow: DataFlow, red_op: Option<ReductionOp>) -> Transition {
		match &self.active {
			Some(from) => Transition::compute(from, to, self.dims, myid, flow, red_op),
			// nothing active yet: there is nothing to preserve or reduce
			// from, so the transition is vacuous regardless of what the
			// caller asked for.
			None => Transition {
				dims: self.dims,
				local: Vec::new(),
				send: Vec::new(),
				recv: Vec::new(),
				red: Vec::new(),
			},
		}
	}

	/// Installs `to` as the new active partitioning and allocates fresh,
	/// zero-filled mapping buffers sized to `myid`'s own slices. Called by
	/// the orchestration layer once a switch's action sequence has run to
	/// completion (or immediately, for a pure reduction/discard switch
	/// with no local content to carry forward).
	pub fn install(&mut self, to: Partitioning, myid: i64, fill: T) {
		let mut mappings = Vec::new();
		for ts in to.tslices().iter().filter(|ts| ts.task as i64 == myid) {
			mappings.push(Mapping::new(self.dims, ts.slice, fill));
		}
		self.mappings = mappings;
		self.active = Some(to);
	}

	/// Locates the mapping (if any) covering `slice` entirely, for
	/// single-mapping local copies.
	pub fn mapping_covering(&self, slice: Slice) -> Option<&Mapping<T>> {
		self.mappings.iter().find(|m| {
			(0..self.dims.count()).all(|d| m.slice.from.get(d) <= slice.from.get(d) && m.slice.to.get(d) >= slice.to.get(d))
		})
	}

	pub fn mapping_covering_mut(&mut self, slice: Slice) -> Option<&mut Mapping<T>> {
		let dims = self.dims;
		self.mappings.iter_mut().find(|m| {
			(0..dims.count()).all(|d| m.slice.from.get(d) <= slice.from.get(d) && m.slice.to.get(d) >= slice.to.get(d))
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use laik_space::{AllPartitioner, Group, Space};

	#[test]
	fn install_allocates_mappings_for_own_slices_only() {
		let space = Space::new_1d(40);
		let group = Group::world(0, 4, 1);
		let p = Partitioning::build(&AllPartitioner, &space, &group, None);

		let mut d: Data<i32> = Data::new(space.dims(), "x");
		d.install(p, 1, 0);
		assert_eq!(d.mappings().len(), 1);
		assert_eq!(d.mappings()[0].base.len(), 40);
	}

	#[test]
	fn mapping_covering_finds_containing_slice() {
		let space = Space::new_1d(40);
		let group = Group::world(0, 4, 1);
		let p = Partitioning::build(&AllPartitioner, &space, &group, None);
		let mut d: Data<i32> = Data::new(space.dims(), "x");
		d.install(p, 1, 0);

		let sub = Slice::new(laik_space::Index::new(5, 0, 0), laik_space::Index::new(10, 0, 0));
		assert!(d.mapping_covering(sub).is_some());
	}
}
