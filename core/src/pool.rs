//! Shared-region registry.
//!
//! Pool records (vertices, items, effects) are children of the structure
//! declaring the pool section. Owners only hold a `(first index, count)`
//! window into it; the registry keeps the canonical order of those windows so
//! a mutation knows whose first index follows whose.

use std::collections::BTreeMap;

use crate::{
	field::{
		NodeId,
		Structure
	},
	kind::SubstructureKind
};

/// One owner's window into a pool
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Slot {
	pub owner: NodeId,
	/// Slot kind, as declared by the owner's [`PoolRef`](crate::field::PoolRef)
	pub kind: SubstructureKind,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Registry {
	pools: BTreeMap<SubstructureKind, Vec<Slot>>,
}

impl Registry {
	/// Collects every owner slot below `root`.
	///
	/// Slots are ordered by their stored first index, ties broken by putting
	/// empty slots first and otherwise keeping traversal order.
	pub(crate) fn build(root: &Structure) -> Registry {
		fn walk(s: &Structure, found: &mut BTreeMap<SubstructureKind, Vec<(Slot, i64, bool)>>) {
			for pr in s.pool_refs() {
				if let Some(pool) = pr.kind.pool() {
					let first = s.number(pr.first_field).unwrap_or(0);
					let count = s.number(pr.count_field).unwrap_or(0);
					found.entry(pool).or_default().push((Slot {
						owner: s.id(),
						kind: pr.kind,
					}, first, count > 0));
				}
			}
			for child in s.children().iter().filter_map(|f| f.as_structure()) {
				walk(child, found);
			}
		}

		let mut found = BTreeMap::new();
		walk(root, &mut found);

		let pools = found.into_iter()
			.map(|(pool, mut slots)| {
				slots.sort_by_key(|(_, first, nonempty)| (*first, *nonempty));
				(pool, slots.into_iter().map(|(slot, _, _)| slot).collect())
			})
			.collect();

		Registry {
			pools: pools,
		}
	}

	pub fn pools(&self) -> impl Iterator<Item = SubstructureKind> + '_ {
		self.pools.keys().copied()
	}

	/// Owner slots of `pool` in canonical order
	pub fn slots(&self, pool: SubstructureKind) -> &[Slot] {
		self.pools.get(&pool).map(Vec::as_slice).unwrap_or(&[])
	}

	pub fn position(&self, pool: SubstructureKind, slot: Slot) -> Option<usize> {
		self.slots(pool).iter().position(|s| *s == slot)
	}

	pub(crate) fn insert_at(&mut self, pool: SubstructureKind, index: usize, slot: Slot) {
		let slots = self.pools.entry(pool).or_default();
		let index = index.min(slots.len());
		slots.insert(index, slot);
	}

	/// Drops every slot `owner` holds, in any pool
	pub(crate) fn unregister(&mut self, owner: NodeId) {
		for slots in self.pools.values_mut() {
			slots.retain(|s| s.owner != owner);
		}
	}
}
