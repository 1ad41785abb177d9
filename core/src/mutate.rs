//! Inserting and removing records.
//!
//! Every mutation is validated first, so an [`InvalidMutation`] leaves the tree
//! untouched. Applying it then shifts every offset in the whole tree, keeps
//! counts and pool windows in step, and finally re-derives sizes and re-checks
//! the layout. A failure past validation poisons the resource.

use log::{
	debug,
	error
};

use std::collections::HashMap;

use crate::{
	error::{
		InvalidMutation,
		InvariantViolation,
		MutationError
	},
	field::{
		Count,
		Field,
		NodeId,
		Section,
		Structure
	},
	kind::SubstructureKind,
	layout::blank_record,
	pool::Slot,
	resource::{
		Resource,
		SectionState
	},
	value::Value
};

/// Where a new record goes
#[derive(Debug)]
struct Placement {
	/// Structure the record becomes a child of: the parent, or the pool holder
	holder: NodeId,
	section: usize,
	kind: SubstructureKind,
	/// Position among the holder's records of `kind`
	index: u32,
	offset: u32,
	/// The section has no run yet and starts where the record is placed
	relocate: bool,
	/// Owner window the record is added to, for pooled kinds
	owner: Option<Slot>,
}

impl Resource {
	/// Inserts a blank record of `kind` under `parent` at position `at`
	/// (appending when `None`), returning the new record's id.
	///
	/// For a pooled kind, `parent` is the owner and `at` is relative to its
	/// window; the record itself is stored in the pool.
	pub fn insert(&mut self, parent: NodeId, kind: SubstructureKind, at: Option<u32>)
		-> Result<NodeId, MutationError>
	{
		if self.poisoned {
			return Err(InvalidMutation::Poisoned.into());
		}

		let placement = self.place_insert(parent, kind, at)?;
		let outcome = self.apply_insert(placement);
		self.settle(outcome)
	}

	/// Removes `instance`, a record owned by `parent` either directly or
	/// through one of `parent`'s pool windows, together with everything it owns.
	pub fn remove(&mut self, parent: NodeId, instance: NodeId) -> Result<(), MutationError> {
		if self.poisoned {
			return Err(InvalidMutation::Poisoned.into());
		}

		let slot = self.check_remove(parent, instance)?;
		let outcome = self.remove_record(parent, instance, slot);
		self.settle(outcome)
	}

	/// Stores `value` in the plain numeric field `name` of structure `id`
	pub fn set_number(&mut self, id: NodeId, name: &str, value: i64) -> Result<(), MutationError> {
		if self.poisoned {
			return Err(InvalidMutation::Poisoned.into());
		}

		let s = self.structure_mut(id).ok_or(InvalidMutation::UnknownNode(id))?;
		if s.is_structural(name) {
			return Err(InvalidMutation::StructuralField(name.to_string()).into());
		}

		let field = s.get_mut(name).ok_or_else(|| InvalidMutation::NoField(name.to_string()))?;
		let fits = match &field.value {
			Value::Number(ty, _) | Value::Bitmask(ty, _, _) => ty.fits(value),
			Value::StrRef(_) => (0..=u32::MAX as i64).contains(&value),
			_ => return Err(InvalidMutation::NotANumber(name.to_string()).into()),
		};
		if !fits {
			return Err(InvalidMutation::ValueOutOfRange {
				field: name.to_string(),
				value: value,
			}.into());
		}

		match &mut field.value {
			Value::Number(_, v) => *v = value,
			Value::Bitmask(_, v, _) | Value::StrRef(v) => *v = value as u32,
			_ => {},
		}

		Ok(())
	}

	/// Re-derives every structure size from its children
	pub fn rederive_sizes(&mut self) {
		let base = self.base();
		self.root.rederive_sizes(base);
	}

	fn place_insert(&self, parent: NodeId, kind: SubstructureKind, at: Option<u32>)
		-> Result<Placement, InvalidMutation>
	{
		let s = self.structure(parent).ok_or(InvalidMutation::UnknownNode(parent))?;

		if let Some(pr) = s.pool_ref(kind) {
			let pool = kind.pool().ok_or(InvalidMutation::NoSection {
				parent: parent,
				kind: kind,
			})?;
			let first = s.number(pr.first_field)
				.ok_or_else(|| InvalidMutation::NoField(pr.first_field.to_string()))? as u32;
			let count = s.number(pr.count_field)
				.ok_or_else(|| InvalidMutation::NoField(pr.count_field.to_string()))? as u32;

			let at = at.unwrap_or(count);
			if at > count {
				return Err(InvalidMutation::IndexOutOfRange {
					index: at,
					count: count,
				});
			}

			let (holder, section) = self.pool_site(pool).ok_or(InvalidMutation::NoSection {
				parent: parent,
				kind: pool,
			})?;
			let slot = Slot {
				owner: parent,
				kind: kind,
			};
			let index = first.checked_add(at).ok_or(InvalidMutation::IndexOutOfRange {
				index: at,
				count: count,
			})?;
			return self.place(holder, section, pool, index, Some(slot));
		}

		let (index, section) = s.section(kind).ok_or(InvalidMutation::NoSection {
			parent: parent,
			kind: kind,
		})?;
		if kind.is_pool_base() {
			return Err(InvalidMutation::PooledKind(kind));
		}
		if kind.size().is_none() || matches!(section.count, Count::Fixed(_)) {
			return Err(InvalidMutation::NotInsertable(kind));
		}

		let count = s.records(kind).count() as u32;
		let at = at.unwrap_or(count);
		if at > count {
			return Err(InvalidMutation::IndexOutOfRange {
				index: at,
				count: count,
			});
		}

		self.place(parent, index, kind, at, None)
	}

	fn place(&self, holder: NodeId, section: usize, kind: SubstructureKind, index: u32, owner: Option<Slot>)
		-> Result<Placement, InvalidMutation>
	{
		let h = self.structure(holder).ok_or(InvalidMutation::UnknownNode(holder))?;
		let declared = h.sections().get(section).ok_or(InvalidMutation::NoSection {
			parent: holder,
			kind: kind,
		})?;
		let size = kind.size().ok_or(InvalidMutation::NotInsertable(kind))?;

		let records: Vec<&Field> = h.record_fields(kind).collect();
		if index as usize > records.len() {
			return Err(InvalidMutation::IndexOutOfRange {
				index: index,
				count: records.len() as u32,
			});
		}

		// an empty section may keep a stale start past the end or inside another run
		let end = self.end();
		let stored = h.number(declared.offset_field).unwrap_or(0);
		let start = self.base().checked_add(stored as u32).filter(|_| stored != 0);
		let relocate = match start {
			Some(start) => records.is_empty() && (start > end || self.inside_run(start)),
			None => true,
		};

		let offset = match (relocate, records.get(index as usize), start) {
			(false, Some(r), _) => r.offset,
			(false, None, Some(start)) => start + records.len() as u32 * size,
			_ => end,
		};

		Ok(Placement {
			holder: holder,
			section: section,
			kind: kind,
			index: index,
			offset: offset,
			relocate: relocate,
			owner: owner,
		})
	}

	/// True if `offset` lies strictly inside some non-empty run
	fn inside_run(&self, offset: u32) -> bool {
		self.section_states().iter()
			.filter(|s| !s.is_empty())
			.any(|s| matches!((s.start, s.end()), (Some(a), Some(b)) if a < offset && offset < b))
	}

	fn check_remove(&self, parent: NodeId, instance: NodeId) -> Result<Option<SubstructureKind>, InvalidMutation> {
		let p = self.structure(parent).ok_or(InvalidMutation::UnknownNode(parent))?;
		let kind = self.structure(instance)
			.ok_or(InvalidMutation::UnknownNode(instance))?
			.kind()
			.ok_or(InvalidMutation::NotOwned {
				parent: parent,
				instance: instance,
			})?;

		// a pool holder may own a window into its own pool, as an ITM header does
		let slots: Vec<SubstructureKind> = p.pool_refs().iter()
			.filter(|pr| pr.kind.pool() == Some(kind))
			.map(|pr| pr.kind)
			.collect();
		for slot in slots.iter() {
			if self.pool_view(parent, *slot).map_or(false, |v| v.contains(&instance)) {
				return Ok(Some(*slot));
			}
		}

		if p.records(kind).any(|r| r.id() == instance) {
			if kind.is_pool_base() {
				return Err(InvalidMutation::PooledKind(kind));
			}
			return match p.section(kind) {
				Some((_, section)) if !matches!(section.count, Count::Fixed(_)) => Ok(None),
				Some(_) => Err(InvalidMutation::NotInsertable(kind)),
				None => Err(InvalidMutation::NoSection {
					parent: parent,
					kind: kind,
				}),
			};
		}

		if slots.is_empty() && p.section(kind).is_none() {
			return Err(InvalidMutation::NoSection {
				parent: parent,
				kind: kind,
			});
		}

		Err(InvalidMutation::NotOwned {
			parent: parent,
			instance: instance,
		})
	}

	fn apply_insert(&mut self, placement: Placement) -> Result<NodeId, InvariantViolation> {
		let kind = placement.kind;
		let size = kind.size().ok_or(InvariantViolation::Template(kind))?;
		placement.offset.checked_add(size).ok_or(InvariantViolation::OffsetRange {
			offset: placement.offset,
			delta: size as i64,
		})?;

		let id = NodeId(self.next_id);
		self.next_id += 1;
		let record = blank_record(self, kind, placement.offset, id)
			.map_err(|_| InvariantViolation::Template(kind))?;

		self.make_room(placement.offset, size, (placement.holder, placement.section))?;

		let base = self.base();
		let holder = self.structure_mut(placement.holder).ok_or(InvariantViolation::LostNode(placement.holder))?;
		let section = *holder.sections().get(placement.section)
			.ok_or(InvariantViolation::LostNode(placement.holder))?;
		if placement.relocate {
			holder.put_number(section.offset_field, (placement.offset - base) as i64)?;
			if let Some(name) = section.count_field() {
				holder.put_number(name, 0)?;
			}
		}

		let position = record_position(holder, kind, placement.index);
		holder.children.insert(position, Field::new(String::new(), placement.offset, Value::Structure(record)));
		match section.count {
			Count::Field(name) => holder.bump(name, 1)?,
			Count::ByteLength(name) => holder.bump(name, size as i64)?,
			Count::Fixed(_) | Count::Pooled => {},
		}
		holder.renumber(kind);

		if let Some(slot) = placement.owner {
			self.resize_slot(slot, 1)?;
		}
		self.adopt(id)?;

		debug!("inserted {} {} at {:#x}", kind, placement.index, placement.offset);
		Ok(id)
	}

	/// Registers the pool windows of a freshly inserted owner, empty and
	/// placed after the windows of the owner preceding it in traversal order
	fn adopt(&mut self, id: NodeId) -> Result<(), InvariantViolation> {
		let refs = self.structure(id).ok_or(InvariantViolation::LostNode(id))?.pool_refs().to_vec();
		if refs.is_empty() {
			return Ok(());
		}

		let order: HashMap<NodeId, usize> = self.structures().iter()
			.enumerate()
			.map(|(i, s)| (s.id(), i))
			.collect();
		let mine = *order.get(&id).ok_or(InvariantViolation::LostNode(id))?;

		for pr in refs {
			let pool = match pr.kind.pool() {
				Some(pool) => pool,
				None => continue,
			};

			let slots = self.registry.slots(pool);
			let at = slots.iter()
				.rposition(|s| s.owner == id || order.get(&s.owner).map_or(false, |o| *o < mine))
				.map_or(0, |i| i + 1);
			let first = slots[..at].iter()
				.map(|s| self.window(*s).map_or(0, |(_, count)| count))
				.sum::<i64>();

			self.registry.insert_at(pool, at, Slot {
				owner: id,
				kind: pr.kind,
			});

			let s = self.structure_mut(id).ok_or(InvariantViolation::LostNode(id))?;
			s.put_number(pr.first_field, first)?;
			s.put_number(pr.count_field, 0)?;
		}

		Ok(())
	}

	/// `(first index, count)` of a registered window
	fn window(&self, slot: Slot) -> Option<(i64, i64)> {
		let s = self.structure(slot.owner)?;
		let pr = s.pool_ref(slot.kind)?;
		Some((s.number(pr.first_field)?, s.number(pr.count_field)?))
	}

	/// Grows or shrinks a window by `delta`, moving every later window along
	fn resize_slot(&mut self, slot: Slot, delta: i64) -> Result<(), InvariantViolation> {
		let pool = slot.kind.pool().ok_or(InvariantViolation::LostNode(slot.owner))?;
		let position = self.registry.position(pool, slot).ok_or(InvariantViolation::LostNode(slot.owner))?;
		let later = self.registry.slots(pool)[position + 1..].to_vec();

		self.bump_window(slot, delta, |pr| pr.count_field)?;
		for s in later {
			self.bump_window(s, delta, |pr| pr.first_field)?;
		}

		Ok(())
	}

	fn bump_window<F>(&mut self, slot: Slot, delta: i64, field: F) -> Result<(), InvariantViolation>
	where
		F: Fn(&crate::field::PoolRef) -> &'static str,
	{
		let s = self.structure_mut(slot.owner).ok_or(InvariantViolation::LostNode(slot.owner))?;
		let name = s.pool_ref(slot.kind)
			.map(field)
			.ok_or_else(|| InvariantViolation::MissingField(slot.kind.name().to_string()))?;
		s.bump(name, delta)
	}

	/// Shifts everything at or after `at` up by `size` bytes.
	///
	/// Section runs starting exactly at `at` move too, unless they are empty,
	/// declared before the section receiving the bytes, and that section starts
	/// at `at` as well.
	fn make_room(&mut self, at: u32, size: u32, site: (NodeId, usize)) -> Result<(), InvariantViolation> {
		let states = self.section_states();
		let receiving = states.iter()
			.find(|s| (s.holder, s.index) == site)
			.copied()
			.ok_or(InvariantViolation::LostNode(site.0))?;
		let site_start = receiving.start.unwrap_or(at);

		let moved: Vec<SectionState> = states.into_iter()
			.filter(|s| (s.holder, s.index) != site)
			.filter(|s| match s.start {
				Some(start) if start > at => true,
				Some(start) if start == at => !s.is_empty() || s.order > receiving.order || site_start < at,
				_ => false,
			})
			.collect();

		shift_fields(&mut self.root, at, size as i64)?;
		self.shift_sections(&moved, size as i64)
	}

	/// Closes the hole left by `size` bytes removed at `at`
	fn close_gap(&mut self, at: u32, size: u32) -> Result<(), InvariantViolation> {
		let end = at + size;
		if let Some(f) = self.flatten().into_iter().find(|f| f.offset >= at && f.offset < end) {
			return Err(InvariantViolation::Dangling(f.offset));
		}

		let mut moved = vec![];
		let mut clamped = vec![];
		for s in self.section_states() {
			match s.start {
				Some(start) if start >= end => moved.push(s),
				Some(start) if start > at => {
					if !s.is_empty() {
						return Err(InvariantViolation::Dangling(start));
					}
					clamped.push(s);
				},
				_ => {},
			}
		}

		shift_fields(&mut self.root, end, -(size as i64))?;
		self.shift_sections(&moved, -(size as i64))?;

		let value = (at - self.base()) as i64;
		for s in clamped {
			let holder = self.structure_mut(s.holder).ok_or(InvariantViolation::LostNode(s.holder))?;
			holder.put_number(s.section.offset_field, value)?;
		}

		Ok(())
	}

	fn shift_sections(&mut self, states: &[SectionState], delta: i64) -> Result<(), InvariantViolation> {
		for s in states {
			let holder = self.structure_mut(s.holder).ok_or(InvariantViolation::LostNode(s.holder))?;
			holder.bump(s.section.offset_field, delta)?;
		}

		Ok(())
	}

	fn remove_record(&mut self, parent: NodeId, instance: NodeId, slot: Option<SubstructureKind>)
		-> Result<(), InvariantViolation>
	{
		self.release(instance)?;

		let kind = self.structure(instance)
			.and_then(Structure::kind)
			.ok_or(InvariantViolation::LostNode(instance))?;
		let size = kind.size().ok_or(InvariantViolation::LostNode(instance))?;
		let holder = match slot {
			Some(slot_kind) => slot_kind.pool()
				.and_then(|pool| self.pool_site(pool))
				.map(|(holder, _)| holder)
				.ok_or(InvariantViolation::LostNode(instance))?,
			None => parent,
		};

		let h = self.structure_mut(holder).ok_or(InvariantViolation::LostNode(holder))?;
		let position = h.children.iter()
			.position(|c| c.as_structure().map(Structure::id) == Some(instance))
			.ok_or(InvariantViolation::LostNode(instance))?;
		let at = h.children.remove(position).offset;

		let section = h.section(kind).map(|(_, s)| *s).ok_or(InvariantViolation::LostNode(holder))?;
		match section.count {
			Count::Field(name) => h.bump(name, -1)?,
			Count::ByteLength(name) => h.bump(name, -(size as i64))?,
			Count::Fixed(_) | Count::Pooled => {},
		}
		h.renumber(kind);

		if let Some(slot_kind) = slot {
			self.resize_slot(Slot {
				owner: parent,
				kind: slot_kind,
			}, -1)?;
		}
		self.close_gap(at, size)?;

		debug!("removed {} {} at {:#x}", kind, instance, at);
		Ok(())
	}

	/// Removes everything `instance` owns: pool records in its windows, nested
	/// records, and blob payloads
	fn release(&mut self, instance: NodeId) -> Result<(), InvariantViolation> {
		let s = self.structure(instance).ok_or(InvariantViolation::LostNode(instance))?;
		let refs = s.pool_refs().to_vec();
		let nested: Vec<NodeId> = s.children().iter()
			.filter_map(Field::as_structure)
			.map(Structure::id)
			.collect();
		let blobs: Vec<Section> = s.sections().iter()
			.filter(|section| section.kind.size().is_none())
			.copied()
			.collect();

		for pr in refs {
			let elements = self.pool_view(instance, pr.kind).unwrap_or_default();
			for element in elements.into_iter().rev() {
				self.remove_record(instance, element, Some(pr.kind))?;
			}
		}

		for child in nested.into_iter().rev() {
			self.remove_record(instance, child, None)?;
		}

		for section in blobs {
			self.excise(instance, section)?;
		}

		self.registry.unregister(instance);
		Ok(())
	}

	fn excise(&mut self, owner: NodeId, section: Section) -> Result<(), InvariantViolation> {
		let s = self.structure_mut(owner).ok_or(InvariantViolation::LostNode(owner))?;
		let position = s.children.iter()
			.position(|c| c.name == section.kind.name() && c.as_structure().is_none());

		let field = match position {
			Some(position) => s.children.remove(position),
			None => return Ok(()),
		};
		if let Some(name) = section.count_field() {
			s.put_number(name, 0)?;
		}

		self.close_gap(field.offset, field.size())
	}

	fn settle<T>(&mut self, outcome: Result<T, InvariantViolation>) -> Result<T, MutationError> {
		let checked = outcome.and_then(|v| {
			self.rederive_sizes();
			if self.strict {
				self.verify()?;
			} else {
				self.check_overlaps()?;
			}
			Ok(v)
		});

		checked.map_err(|violation| {
			error!("{} {}: {}, discarding edits", self.layout().name(), self.prologue().version_str(), violation);
			self.poisoned = true;
			violation.into()
		})
	}
}

/// Child position for the `index`-th record of `kind`
fn record_position(s: &Structure, kind: SubstructureKind, index: u32) -> usize {
	let mut last = None;
	let mut n = 0;
	for (i, child) in s.children().iter().enumerate() {
		if child.as_structure().and_then(Structure::kind) == Some(kind) {
			if n == index {
				return i;
			}
			n += 1;
			last = Some(i);
		}
	}

	last.map_or(s.children().len(), |i| i + 1)
}

fn shift_fields(s: &mut Structure, from: u32, delta: i64) -> Result<(), InvariantViolation> {
	for child in s.children.iter_mut() {
		if child.offset >= from {
			let moved = child.offset as i64 + delta;
			if moved < 0 || moved > u32::MAX as i64 {
				return Err(InvariantViolation::OffsetRange {
					offset: child.offset,
					delta: delta,
				});
			}
			child.offset = moved as u32;
		}
		if let Some(inner) = child.as_structure_mut() {
			shift_fields(inner, from, delta)?;
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use crate::testing::{
		fixture,
		resolve_test,
		Fixture
	};

	fn offsets(r: &Resource) -> Vec<(String, u32)> {
		r.flatten().iter().map(|f| (f.name.clone(), f.offset)).collect()
	}

	fn container(r: &Resource, i: usize) -> NodeId {
		r.root().records(SubstructureKind::Container).nth(i).map(Structure::id).unwrap()
	}

	fn window(r: &Resource, i: usize) -> (i64, i64) {
		let c = r.structure(container(r, i)).unwrap();
		(c.number("First item index").unwrap(), c.number("# items").unwrap())
	}

	fn reresolved(r: &Resource) -> Resource {
		resolve_test(&r.to_bytes()).unwrap()
	}

	#[test]
	fn test_insert_cascade() {
		let mut r = resolve_test(&fixture(&Fixture::new(3, &[(0, 2), (2, 1)]))).unwrap();
		let root = r.root_id();
		let before = r.flatten().iter().map(|f| f.offset).collect::<Vec<_>>();
		let entrances = r.root().number("Entrances offset").unwrap() as u32;
		let at = entrances + 3 * 0x68;

		r.insert(root, SubstructureKind::Entrance, None).unwrap();
		assert_eq!(r.root().number("# entrances"), Some(4));

		let after: Vec<u32> = r.flatten().iter()
			.filter(|f| !(f.offset >= at && f.offset < at + 0x68))
			.map(|f| f.offset)
			.collect();
		let expected: Vec<u32> = before.iter().map(|o| if *o >= at { o + 0x68 } else { *o }).collect();
		assert_eq!(after, expected);

		assert_eq!(r.root().number("Containers offset").unwrap() as u32, at + 0x68);
		r.verify().unwrap();
		assert_eq!(reresolved(&r).to_bytes(), r.to_bytes());
	}

	#[test]
	fn test_remove_cascade() {
		let mut f = Fixture::new(3, &[(0, 2), (2, 1)]);
		f.bitmap = 6;
		let mut r = resolve_test(&fixture(&f)).unwrap();
		let root = r.root_id();
		let before = r.flatten().iter().map(|f| f.offset).collect::<Vec<_>>();
		let at = r.root().number("Entrances offset").unwrap() as u32 + 0x68;
		let sections = ["Containers offset", "Items offset", "Bitmap offset"].map(|n| r.root().number(n).unwrap());

		let middle = r.instances(root, SubstructureKind::Entrance).unwrap()[1];
		r.remove(root, middle).unwrap();
		assert_eq!(r.root().number("# entrances"), Some(2));
		assert_eq!(r.root().number("Entrances offset"), Some(0x24));

		let expected: Vec<u32> = before.iter()
			.filter(|o| !(at..at + 0x68).contains(*o))
			.map(|o| if *o >= at + 0x68 { o - 0x68 } else { *o })
			.collect();
		assert_eq!(r.flatten().iter().map(|f| f.offset).collect::<Vec<_>>(), expected);
		assert_eq!(["Containers offset", "Items offset", "Bitmap offset"].map(|n| r.root().number(n).unwrap()),
			sections.map(|o| o - 0x68));

		r.verify().unwrap();
		assert_eq!(reresolved(&r).to_bytes(), r.to_bytes());
	}

	#[test]
	fn test_insert_front() {
		let mut r = resolve_test(&fixture(&Fixture::new(2, &[]))).unwrap();
		let root = r.root_id();
		let old = r.instances(root, SubstructureKind::Entrance).unwrap();
		let start = r.root().number("Entrances offset").unwrap() as u32;

		let id = r.insert(root, SubstructureKind::Entrance, Some(0)).unwrap();
		let now = r.instances(root, SubstructureKind::Entrance).unwrap();
		assert_eq!(now, vec![id, old[0], old[1]]);
		assert_eq!(r.node(id).unwrap().offset, start);
		assert_eq!(r.node(id).unwrap().name, "Entrance 0");
		assert_eq!(r.node(old[1]).unwrap().name, "Entrance 2");
		assert_eq!(r.root().number("Entrances offset").unwrap() as u32, start);
	}

	#[test]
	fn test_remove_pooled_item() {
		// first window starts at 5, second at 0: canonical order is reversed
		let mut r = resolve_test(&fixture(&Fixture::new(0, &[(5, 2), (0, 5)]))).unwrap();
		let second = container(&r, 1);
		let item = r.instances(second, SubstructureKind::Item).unwrap()[2];
		let items_before = r.flatten().iter().filter(|f| f.name == "Charges").count();

		r.remove(second, item).unwrap();
		assert_eq!(window(&r, 1), (0, 4));
		assert_eq!(window(&r, 0), (4, 2));
		assert_eq!(r.root().number("# items"), Some(6));
		assert_eq!(r.flatten().iter().filter(|f| f.name == "Charges").count(), items_before - 1);
		r.verify().unwrap();

		let again = reresolved(&r);
		assert_eq!(again.to_bytes(), r.to_bytes());
	}

	#[test]
	fn test_insert_pooled_item() {
		let mut r = resolve_test(&fixture(&Fixture::new(1, &[(0, 2), (2, 0), (2, 3)]))).unwrap();
		let first = container(&r, 0);
		let items = r.root().number("Items offset").unwrap() as u32;

		let id = r.insert(first, SubstructureKind::Item, None).unwrap();
		assert_eq!(r.node(id).unwrap().offset, items + 2 * 0x14);
		assert_eq!(window(&r, 0), (0, 3));
		assert_eq!(window(&r, 1), (3, 0));
		assert_eq!(window(&r, 2), (3, 3));
		assert_eq!(r.root().number("# items"), Some(6));
		assert_eq!(r.pool_view(first, SubstructureKind::Item).unwrap()[2], id);
		r.verify().unwrap();
	}

	#[test]
	fn test_remove_owner_releases_window() {
		let mut r = resolve_test(&fixture(&Fixture::new(1, &[(0, 2), (2, 3)]))).unwrap();
		let root = r.root_id();
		let first = container(&r, 0);
		let size = r.size();

		r.remove(root, first).unwrap();
		assert_eq!(r.root().number("# containers"), Some(1));
		assert_eq!(r.root().number("# items"), Some(3));
		assert_eq!(window(&r, 0), (0, 3));
		assert_eq!(r.size(), size - 0xc0 - 2 * 0x14);
		assert!(r.registry().slots(SubstructureKind::Item).iter().all(|s| s.owner != first));
		r.verify().unwrap();
		assert_eq!(reresolved(&r).to_bytes(), r.to_bytes());
	}

	#[test]
	fn test_new_owner_window() {
		let mut r = resolve_test(&fixture(&Fixture::new(0, &[(0, 2), (2, 3)]))).unwrap();
		let root = r.root_id();

		let id = r.insert(root, SubstructureKind::Container, Some(1)).unwrap();
		assert_eq!(window(&r, 1), (2, 0));
		let order: Vec<NodeId> = r.registry().slots(SubstructureKind::Item).iter().map(|s| s.owner).collect();
		assert_eq!(order[1], id);

		r.insert(id, SubstructureKind::Item, None).unwrap();
		assert_eq!(window(&r, 1), (2, 1));
		assert_eq!(window(&r, 2), (3, 3));
		r.verify().unwrap();
	}

	#[test]
	fn test_insert_into_absent_section() {
		let mut f = Fixture::new(0, &[(0, 1)]);
		f.entrances_absent = true;
		f.stale_entrances = 7;
		let mut r = resolve_test(&fixture(&f)).unwrap();
		let root = r.root_id();
		assert!(r.instances(root, SubstructureKind::Entrance).unwrap().is_empty());
		let end = r.end();

		let id = r.insert(root, SubstructureKind::Entrance, None).unwrap();
		assert_eq!(r.node(id).unwrap().offset, end);
		assert_eq!(r.root().number("Entrances offset"), Some(end as i64));
		assert_eq!(r.root().number("# entrances"), Some(1));
		assert_eq!(reresolved(&r).to_bytes(), r.to_bytes());
	}

	#[test]
	fn test_insert_into_stale_section() {
		let mut bytes = fixture(&Fixture::new(0, &[(0, 1)]));
		bytes[8..12].copy_from_slice(&0x9999u32.to_le_bytes());
		let mut r = resolve_test(&bytes).unwrap();
		let root = r.root_id();
		assert_eq!(r.to_bytes(), bytes);
		let end = r.end();

		let id = r.insert(root, SubstructureKind::Entrance, None).unwrap();
		assert_eq!(r.node(id).unwrap().offset, end);
		assert_eq!(r.root().number("Entrances offset"), Some(end as i64));
		assert_eq!(r.root().number("# entrances"), Some(1));
		r.verify().unwrap();
		assert_eq!(reresolved(&r).to_bytes(), r.to_bytes());
	}

	#[test]
	fn test_window_index_overflow() {
		let mut r = resolve_test(&fixture(&Fixture::new(0, &[(u32::MAX, 1)]))).unwrap();
		let chest = container(&r, 0);
		let bytes = r.to_bytes();

		assert_eq!(r.insert(chest, SubstructureKind::Item, None),
			Err(MutationError::InvalidMutation(InvalidMutation::IndexOutOfRange { index: 1, count: 1 })));
		assert_eq!(r.to_bytes(), bytes);
		assert!(!r.is_poisoned());
	}

	#[test]
	fn test_remove_blob_owner_section() {
		let mut f = Fixture::new(1, &[]);
		f.bitmap = 6;
		let mut r = resolve_test(&fixture(&f)).unwrap();
		let root = r.root_id();
		let entrance = r.instances(root, SubstructureKind::Entrance).unwrap()[0];
		let bitmap = r.root().get("Explored bitmap").unwrap().offset;

		r.remove(root, entrance).unwrap();
		assert_eq!(r.root().get("Explored bitmap").unwrap().offset, bitmap - 0x68);
		assert_eq!(r.root().number("Bitmap offset").unwrap() as u32, bitmap - 0x68);
	}

	#[test]
	fn test_invalid_mutations_leave_tree() {
		let mut r = resolve_test(&fixture(&Fixture::new(1, &[(0, 1), (1, 1)]))).unwrap();
		let root = r.root_id();
		let bytes = r.to_bytes();
		let first = container(&r, 0);
		let second = container(&r, 1);
		let item = r.instances(second, SubstructureKind::Item).unwrap()[0];

		let cases = vec![
			(r.insert(root, SubstructureKind::Item, None).map(|_| ()),
				InvalidMutation::PooledKind(SubstructureKind::Item)),
			(r.insert(root, SubstructureKind::Door, None).map(|_| ()),
				InvalidMutation::NoSection { parent: root, kind: SubstructureKind::Door }),
			(r.insert(root, SubstructureKind::ExploredBitmap, None).map(|_| ()),
				InvalidMutation::NotInsertable(SubstructureKind::ExploredBitmap)),
			(r.insert(root, SubstructureKind::Entrance, Some(5)).map(|_| ()),
				InvalidMutation::IndexOutOfRange { index: 5, count: 1 }),
			(r.remove(first, item), InvalidMutation::NotOwned { parent: first, instance: item }),
			(r.remove(root, item), InvalidMutation::PooledKind(SubstructureKind::Item)),
			(r.insert(NodeId(999), SubstructureKind::Item, None).map(|_| ()),
				InvalidMutation::UnknownNode(NodeId(999))),
			(r.set_number(root, "# entrances", 3), InvalidMutation::StructuralField("# entrances".to_string())),
			(r.set_number(first, "Name", 3), InvalidMutation::NotANumber("Name".to_string())),
		];

		for (result, expected) in cases {
			assert_eq!(result, Err(MutationError::InvalidMutation(expected)));
		}
		assert_eq!(r.to_bytes(), bytes);
		assert!(!r.is_poisoned());
	}

	#[test]
	fn test_set_number() {
		let mut r = resolve_test(&fixture(&Fixture::new(0, &[(0, 1)]))).unwrap();
		let item = r.root().records(SubstructureKind::Item).next().map(Structure::id).unwrap();

		r.set_number(item, "Charges", 40).unwrap();
		assert_eq!(r.structure(item).unwrap().number("Charges"), Some(40));
		assert!(matches!(r.set_number(item, "Charges", 70000),
			Err(MutationError::InvalidMutation(InvalidMutation::ValueOutOfRange { .. }))));
	}

	#[test]
	fn test_overlap_poisons() {
		let mut f = Fixture::new(1, &[(0, 2)]);
		f.bitmap = 4;
		f.bitmap_inside_items = true;
		let mut r = resolve_test(&fixture(&f)).unwrap();
		let root = r.root_id();

		match r.insert(root, SubstructureKind::Entrance, None) {
			Err(MutationError::InternalInvariantViolation(InvariantViolation::Overlap { .. })) => {},
			other => panic!("unexpected {:?}", other),
		}
		assert!(r.is_poisoned());
		assert_eq!(r.insert(root, SubstructureKind::Entrance, None),
			Err(MutationError::InvalidMutation(InvalidMutation::Poisoned)));
	}

	#[test]
	fn test_rederive_idempotent() {
		let mut r = resolve_test(&fixture(&Fixture::new(2, &[(0, 3)]))).unwrap();
		let root = r.root_id();
		r.insert(root, SubstructureKind::Container, None).unwrap();

		let sizes = |r: &Resource| r.structures().iter().map(|s| s.size()).collect::<Vec<_>>();
		r.rederive_sizes();
		let once = sizes(&r);
		r.rederive_sizes();
		assert_eq!(sizes(&r), once);
	}

	#[test]
	fn test_offsets_below_insertion_untouched() {
		let mut r = resolve_test(&fixture(&Fixture::new(2, &[(0, 1)]))).unwrap();
		let items = r.root().number("Items offset").unwrap() as u32;
		let before: Vec<(String, u32)> = offsets(&r).into_iter().filter(|(_, o)| *o < items).collect();

		let first = container(&r, 0);
		r.insert(first, SubstructureKind::Item, Some(0)).unwrap();
		let after: Vec<(String, u32)> = offsets(&r).into_iter().filter(|(_, o)| *o < items).collect();
		assert_eq!(before, after);
		assert_eq!(r.root().number("Entrances offset"), Some(0x24));
	}

	#[derive(Clone, Debug)]
	enum Op {
		InsertEntrance(u32),
		RemoveEntrance(usize),
		InsertContainer(u32),
		RemoveContainer(usize),
		InsertItem(usize, u32),
		RemoveItem(usize, usize),
	}

	fn op() -> impl Strategy<Value = Op> {
		prop_oneof![
			(0..4u32).prop_map(Op::InsertEntrance),
			(0..4usize).prop_map(Op::RemoveEntrance),
			(0..4u32).prop_map(Op::InsertContainer),
			(0..4usize).prop_map(Op::RemoveContainer),
			(0..4usize, 0..4u32).prop_map(|(c, at)| Op::InsertItem(c, at)),
			(0..4usize, 0..4usize).prop_map(|(c, i)| Op::RemoveItem(c, i)),
		]
	}

	fn pick(ids: &[NodeId], i: usize) -> Option<NodeId> {
		if ids.is_empty() {
			None
		} else {
			Some(ids[i % ids.len()])
		}
	}

	fn apply(r: &mut Resource, op: &Op) -> Result<(), MutationError> {
		let root = r.root_id();
		let entrances = r.instances(root, SubstructureKind::Entrance)?;
		let containers = r.instances(root, SubstructureKind::Container)?;

		match *op {
			Op::InsertEntrance(at) => {
				r.insert(root, SubstructureKind::Entrance, Some(at.min(entrances.len() as u32)))?;
			},
			Op::RemoveEntrance(i) => if let Some(id) = pick(&entrances, i) {
				r.remove(root, id)?;
			},
			Op::InsertContainer(at) => {
				r.insert(root, SubstructureKind::Container, Some(at.min(containers.len() as u32)))?;
			},
			Op::RemoveContainer(i) => if let Some(id) = pick(&containers, i) {
				r.remove(root, id)?;
			},
			Op::InsertItem(c, at) => if let Some(owner) = pick(&containers, c) {
				let count = r.instances(owner, SubstructureKind::Item)?.len() as u32;
				r.insert(owner, SubstructureKind::Item, Some(at.min(count)))?;
			},
			Op::RemoveItem(c, i) => if let Some(owner) = pick(&containers, c) {
				let items = r.instances(owner, SubstructureKind::Item)?;
				if let Some(item) = pick(&items, i) {
					r.remove(owner, item)?;
				}
			},
		}

		Ok(())
	}

	proptest! {
		#[test]
		fn prop_edits_keep_layout(entrances in 0..3u32, windows in prop::collection::vec(0..3u32, 0..4),
			ops in prop::collection::vec(op(), 1..20))
		{
			let mut first = 0;
			let containers: Vec<(u32, u32)> = windows.iter()
				.map(|n| {
					let window = (first, *n);
					first += n;
					window
				})
				.collect();
			let mut r = resolve_test(&fixture(&Fixture::new(entrances, &containers))).unwrap();

			for op in &ops {
				prop_assert_eq!(apply(&mut r, op), Ok(()));
				prop_assert_eq!(r.verify(), Ok(()));

				let bytes = r.to_bytes();
				let again = resolve_test(&bytes).unwrap();
				prop_assert_eq!(again.to_bytes(), bytes);
				prop_assert_eq!(again.flatten().len(), r.flatten().len());
				prop_assert_eq!(again.verify(), Ok(()));
			}
		}
	}
}
