//! Process groups and their shrink/clone lineage.
//!
//! Groups form a tree rooted at the initial world group. Every non-root
//! group remembers how its ranks map to its parent's ranks (`to_parent`)
//! and the inverse (`from_parent`), so `location` can walk back to the
//! world rank of any process without the backend's help.

use std::sync::Arc;

/// A process group: either the root (world) group or a child derived from
/// one by `clone` or `shrink`.
#[derive(Debug, Clone)]
pub struct Group {
	gid: u64,
	size: usize,
	/// This process's rank within the group, or `-1` if it isn't a member
	/// (e.g. it was removed by a shrink).
	myid: i64,
	parent: Option<Arc<Group>>,
	/// `to_parent[child_rank] = parent_rank`, length `size`.
	to_parent: Vec<i64>,
	/// `from_parent[parent_rank] = child_rank`, or `-1` if that parent rank
	/// has no counterpart in this group. Length `parent.size` (empty for
	/// the root).
	from_parent: Vec<i64>,
}

impl Group {
	/// Construct the root (world) group: every rank maps to itself, there
	/// is no parent.
	pub fn world(gid: u64, size: usize, myid: i64) -> Self {
		let to_parent = (0..size as i64).collect();
		Group {
			gid,
			size,
			myid,
			parent: None,
			to_parent,
			from_parent: Vec::new(),
		}
	}

	pub fn gid(&self) -> u64 {
		self.gid
	}

	pub fn size(&self) -> usize {
		self.size
	}

	pub fn myid(&self) -> i64 {
		self.myid
	}

	pub fn parent(&self) -> Option<&Arc<Group>> {
		self.parent.as_ref()
	}

	pub fn is_member(&self, id: i64) -> bool {
		id >= 0 && (id as usize) < self.size
	}

	/// Parent rank that this group's `child_rank` maps to.
	pub fn to_parent_rank(&self, child_rank: usize) -> usize {
		self.to_parent[child_rank] as usize
	}

	/// This group's rank for a given parent rank, or `-1` if that parent
	/// rank has no counterpart here.
	pub fn from_parent_rank(&self, parent_rank: usize) -> i64 {
		self.from_parent[parent_rank]
	}

	/// `laik_clone_group` — an identity-mapped child of `self`.
	pub fn clone_group(self: &Arc<Self>, new_gid: u64) -> Group {
		let size = self.size;
		Group {
			gid: new_gid,
			size,
			myid: self.myid,
			parent: Some(self.clone()),
			to_parent: (0..size as i64).collect(),
			from_parent: (0..size as i64).collect(),
		}
	}

	/// `laik_new_shrinked_group` — a child with the ranks in `remove_list`
	/// (parent ranks) dropped. Remaining parent ranks are renumbered
	/// densely, preserving relative order, into the child's rank space.
	/// `myid` is translated along with everything else, becoming `-1` if
	/// this process itself was removed.
	pub fn shrink(self: &Arc<Self>, new_gid: u64, remove_list: &[usize]) -> Group {
		tracing::debug!(parent_gid = self.gid, new_gid, removed = remove_list.len(), "shrinking group");
		let parent_size = self.size;
		let removed = |pid: usize| remove_list.contains(&pid);

		let mut from_parent = vec![-1i64; parent_size];
		let mut to_parent = Vec::with_capacity(parent_size);
		let mut next_child_rank: i64 = 0;
		for pid in 0..parent_size {
			if removed(pid) {
				continue;
			}
			from_parent[pid] = next_child_rank;
			to_parent.push(pid as i64);
			next_child_rank += 1;
		}

		let myid = if self.myid < 0 {
			-1
		} else {
			from_parent[self.myid as usize]
		};

		Group {
			gid: new_gid,
			size: to_parent.len(),
			myid,
			parent: Some(self.clone()),
			to_parent,
			from_parent,
		}
	}

	/// `laik_group_location` — translate rank `id` (in this group) up
	/// through every ancestor, returning its rank in the root (world)
	/// group.
	pub fn location(&self, id: i64) -> i64 {
		if id < 0 {
			return -1;
		}
		match &self.parent {
			None => id,
			Some(parent) => {
				let parent_id = self.to_parent[id as usize];
				parent.location(parent_id)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn world(size: usize, myid: i64) -> Arc<Group> {
		Arc::new(Group::world(0, size, myid))
	}

	#[test]
	fn clone_is_identity() {
		let w = world(4, 2);
		let c = w.clone_group(1);
		assert_eq!(c.size(), 4);
		assert_eq!(c.myid(), 2);
		assert_eq!(c.location(2), 2);
	}

	#[test]
	fn shrink_renumbers_densely() {
		let w = world(5, 3);
		// remove parent ranks 1 and 3
		let s = w.shrink(1, &[1, 3]);
		assert_eq!(s.size(), 3);
		// parent ranks 0,2,4 -> child ranks 0,1,2
		assert_eq!(s.from_parent, vec![0, -1, 1, -1, 2]);
		assert_eq!(s.to_parent, vec![0, 2, 4]);
		// myid was parent rank 3, which was removed
		assert_eq!(s.myid(), -1);
	}

	#[test]
	fn shrink_translates_surviving_myid() {
		let w = world(5, 4);
		let s = w.shrink(1, &[1, 3]);
		// parent rank 4 -> child rank 2
		assert_eq!(s.myid(), 2);
	}

	#[test]
	fn location_walks_multiple_levels() {
		let w = world(6, 5);
		let s1 = Arc::new(w.shrink(1, &[0, 1]));
		// s1 ranks: parent 2,3,4,5 -> child 0,1,2,3
		let s2 = Arc::new(s1.shrink(2, &[0]));
		// s2 ranks: s1 ranks 1,2,3 -> child 0,1,2, i.e. parent ranks 3,4,5
		assert_eq!(s2.size(), 3);
		assert_eq!(s2.location(0), 3);
		assert_eq!(s2.location(2), 5);
	}

	#[test]
	fn fromparent_inverse_invariant() {
		let w = world(5, 0);
		let s = w.shrink(1, &[2]);
		for (pid, &cid) in s.from_parent.iter().enumerate() {
			if cid >= 0 {
				assert_eq!(s.to_parent[cid as usize], pid as i64);
			}
		}
	}
}
