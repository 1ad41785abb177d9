use log::debug;

use crate::{
	error::{
		InvalidMutation,
		InvariantViolation
	},
	field::{
		Count,
		Field,
		NodeId,
		Section,
		Structure
	},
	kind::{
		Shape,
		SubstructureKind
	},
	layout::{
		Context,
		Diagnostic,
		Layout,
		Prologue
	},
	pool::Registry
};

/// A resolved resource: the field tree plus the bookkeeping mutations need.
///
/// Structures are addressed by [`NodeId`]; the tree is only ever walked top
/// down, so no node holds a reference to its parent.
#[derive(Clone, Debug)]
pub struct Resource {
	layout: &'static dyn Layout,
	context: Context,
	prologue: Prologue,
	base: u32,
	pub(crate) root: Structure,
	pub(crate) registry: Registry,
	diagnostics: Vec<Diagnostic>,
	pub(crate) next_id: u32,
	pub(crate) strict: bool,
	pub(crate) poisoned: bool,
}

/// Live state of one section, as seen from its holder
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SectionState {
	pub holder: NodeId,
	/// Position among the holder's sections
	pub index: usize,
	/// Position in declaration order across the whole tree
	pub order: usize,
	pub section: Section,
	/// Absolute start, `None` when the stored offset is 0
	pub start: Option<u32>,
	pub records: u32,
	pub byte_len: u32,
}

impl SectionState {
	pub fn kind(&self) -> SubstructureKind {
		self.section.kind
	}

	pub fn end(&self) -> Option<u32> {
		self.start.map(|s| s + self.byte_len)
	}

	pub fn is_empty(&self) -> bool {
		self.byte_len == 0
	}
}

impl Resource {
	pub(crate) fn assemble(layout: &'static dyn Layout, context: Context, prologue: Prologue, base: u32,
		root: Structure, diagnostics: Vec<Diagnostic>, next_id: u32) -> Resource
	{
		let registry = Registry::build(&root);

		let mut resource = Resource {
			layout: layout,
			context: context,
			prologue: prologue,
			base: base,
			root: root,
			registry: registry,
			diagnostics: diagnostics,
			next_id: next_id,
			strict: false,
			poisoned: false,
		};

		match resource.verify() {
			Ok(()) => resource.strict = true,
			Err(e) => debug!("{} is not self-consistent ({}), only overlaps are checked after edits",
				layout.name(), e),
		}

		resource
	}

	pub fn layout(&self) -> &'static dyn Layout {
		self.layout
	}

	pub fn context(&self) -> &Context {
		&self.context
	}

	pub fn prologue(&self) -> &Prologue {
		&self.prologue
	}

	/// Offset the resource starts at within the buffer it was resolved from
	pub fn base(&self) -> u32 {
		self.base
	}

	pub fn root(&self) -> &Structure {
		&self.root
	}

	pub fn root_id(&self) -> NodeId {
		self.root.id()
	}

	/// Total size of the resource in bytes
	pub fn size(&self) -> u32 {
		self.root.size()
	}

	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	pub fn diagnostics(&self) -> &[Diagnostic] {
		&self.diagnostics
	}

	/// True once an internal invariant violation has made this tree unusable
	pub fn is_poisoned(&self) -> bool {
		self.poisoned
	}

	/// Child index path from the root to the structure `id`
	pub fn path_to(&self, id: NodeId) -> Option<Vec<usize>> {
		fn find(s: &Structure, id: NodeId, path: &mut Vec<usize>) -> bool {
			if s.id() == id {
				return true;
			}
			for (i, child) in s.children().iter().enumerate() {
				if let Some(c) = child.as_structure() {
					path.push(i);
					if find(c, id, path) {
						return true;
					}
					path.pop();
				}
			}
			false
		}

		let mut path = vec![];
		if find(&self.root, id, &mut path) {
			Some(path)
		} else {
			None
		}
	}

	/// The field holding structure `id`, `None` for the root
	pub fn node(&self, id: NodeId) -> Option<&Field> {
		let path = self.path_to(id)?;
		let (last, init) = path.split_last()?;
		let mut s = &self.root;
		for i in init {
			s = s.children().get(*i)?.as_structure()?;
		}
		s.children().get(*last)
	}

	pub fn structure(&self, id: NodeId) -> Option<&Structure> {
		let mut s = &self.root;
		for i in self.path_to(id)? {
			s = s.children().get(i)?.as_structure()?;
		}
		Some(s)
	}

	pub(crate) fn structure_mut(&mut self, id: NodeId) -> Option<&mut Structure> {
		let path = self.path_to(id)?;
		let mut s = &mut self.root;
		for i in path {
			s = s.children.get_mut(i)?.as_structure_mut()?;
		}
		Some(s)
	}

	/// Every structure in pre-order, root first
	pub fn structures(&self) -> Vec<&Structure> {
		fn walk<'a>(s: &'a Structure, out: &mut Vec<&'a Structure>) {
			out.push(s);
			for child in s.children().iter().filter_map(Field::as_structure) {
				walk(child, out);
			}
		}

		let mut out = vec![];
		walk(&self.root, &mut out);
		out
	}

	/// All leaf fields in declared order
	pub fn flatten(&self) -> Vec<&Field> {
		let mut out = vec![];
		self.root.flatten(&mut out);
		out
	}

	/// All leaf fields sorted by offset, declared order breaking ties
	pub fn flatten_sorted(&self) -> Vec<&Field> {
		let mut out = self.flatten();
		out.sort_by_key(|f| f.offset);
		out
	}

	/// End offset of the last byte any field covers
	pub fn end(&self) -> u32 {
		self.flatten().iter()
			.map(|f| f.end())
			.max()
			.unwrap_or(self.base as u64) as u32
	}

	/// The leaf covering byte `offset`
	pub fn field_at(&self, offset: u32) -> Option<&Field> {
		self.flatten().into_iter()
			.find(|f| f.offset <= offset && (offset as u64) < f.end())
	}

	/// Live state of every section in the tree, in declaration order
	pub fn section_states(&self) -> Vec<SectionState> {
		let mut out = vec![];
		for holder in self.structures() {
			for (index, section) in holder.sections().iter().enumerate() {
				let start = match holder.number(section.offset_field) {
					Some(v) if v != 0 => Some(self.base + v as u32),
					_ => None,
				};

				let (records, byte_len) = match section.kind.info().shape {
					Shape::Blob => match holder.get(section.kind.name()) {
						Some(f) => (1, f.size()),
						None => (0, 0),
					},
					Shape::Fixed(size) => {
						let n = holder.records(section.kind).count() as u32;
						(n, n * size)
					},
				};

				out.push(SectionState {
					holder: holder.id(),
					index: index,
					order: out.len(),
					section: *section,
					start: start,
					records: records,
					byte_len: byte_len,
				});
			}
		}
		out
	}

	/// The section owning byte `offset`.
	///
	/// A run strictly containing the offset wins. Otherwise the offset sits on
	/// the boundary of one or more runs, and belongs to the one declared last.
	pub fn section_at(&self, offset: u32) -> Option<SectionState> {
		let states = self.section_states();
		let present = || states.iter().filter(|s| s.start.is_some());

		let inside = |s: &&SectionState| match (s.start, s.end()) {
			(Some(a), Some(b)) => a < offset && offset < b,
			_ => false,
		};
		if let Some(s) = present().find(inside) {
			return Some(*s);
		}

		present()
			.filter(|s| s.start == Some(offset) || s.end() == Some(offset))
			.max_by_key(|s| s.order)
			.copied()
	}

	/// Structure and section index of the section declaring `pool`
	pub fn pool_site(&self, pool: SubstructureKind) -> Option<(NodeId, usize)> {
		self.structures().into_iter()
			.find_map(|s| s.section(pool).map(|(i, _)| (s.id(), i)))
	}

	/// Pool records inside `owner`'s window for `slot_kind`
	pub fn pool_view(&self, owner: NodeId, slot_kind: SubstructureKind) -> Option<Vec<NodeId>> {
		let s = self.structure(owner)?;
		let pr = s.pool_ref(slot_kind)?;
		let pool = slot_kind.pool()?;
		let first = s.number(pr.first_field)?.max(0) as usize;
		let count = s.number(pr.count_field)?.max(0) as usize;

		let (holder, _) = self.pool_site(pool)?;
		let records = self.structure(holder)?.records(pool);
		Some(records.skip(first).take(count).map(Structure::id).collect())
	}

	/// Instances of `kind` owned by `parent`: its own records, or its pool window
	pub fn instances(&self, parent: NodeId, kind: SubstructureKind) -> Result<Vec<NodeId>, InvalidMutation> {
		let s = self.structure(parent).ok_or(InvalidMutation::UnknownNode(parent))?;

		if s.pool_ref(kind).is_some() {
			return self.pool_view(parent, kind).ok_or(InvalidMutation::NoSection {
				parent: parent,
				kind: kind,
			});
		}

		match s.section(kind) {
			Some(_) => Ok(s.records(kind).map(Structure::id).collect()),
			None => Err(InvalidMutation::NoSection {
				parent: parent,
				kind: kind,
			}),
		}
	}

	/// Checks that no two non-empty section runs overlap
	pub fn check_overlaps(&self) -> Result<(), InvariantViolation> {
		let mut runs: Vec<SectionState> = self.section_states().into_iter()
			.filter(|s| s.start.is_some() && !s.is_empty())
			.collect();
		runs.sort_by_key(|s| s.start);

		for pair in runs.windows(2) {
			if let (Some(end), Some(next)) = (pair[0].end(), pair[1].start) {
				if end > next {
					return Err(InvariantViolation::Overlap {
						first: pair[0].kind(),
						second: pair[1].kind(),
						offset: next,
					});
				}
			}
		}

		Ok(())
	}

	/// Checks every layout invariant: stored counts match live records, runs do
	/// not overlap, and every pool is partitioned by its owners.
	pub fn verify(&self) -> Result<(), InvariantViolation> {
		for state in self.section_states() {
			if state.start.is_none() {
				continue;
			}
			let holder = self.structure(state.holder).ok_or(InvariantViolation::LostNode(state.holder))?;

			let (name, live) = match state.section.count {
				Count::Field(name) => (name, state.records),
				Count::ByteLength(name) => (name, state.byte_len),
				Count::Fixed(_) | Count::Pooled => continue,
			};
			let stored = holder.number(name).ok_or_else(|| InvariantViolation::MissingField(name.to_string()))?;
			if stored != live as i64 {
				return Err(InvariantViolation::CountMismatch {
					kind: state.kind(),
					stored: stored as u32,
					live: live,
				});
			}
		}

		self.check_overlaps()?;

		for pool in self.registry.pools() {
			let mut running = 0;
			for slot in self.registry.slots(pool) {
				let owner = self.structure(slot.owner).ok_or(InvariantViolation::LostNode(slot.owner))?;
				let (first, count) = owner.pool_ref(slot.kind)
					.and_then(|pr| Some((owner.number(pr.first_field)?, owner.number(pr.count_field)?)))
					.ok_or_else(|| InvariantViolation::MissingField(slot.kind.name().to_string()))?;

				if first != running {
					return Err(InvariantViolation::Partition {
						kind: slot.kind,
						owner: slot.owner,
						expected: running as u32,
						found: first as u32,
					});
				}
				running += count;
			}

			let live = match self.pool_site(pool) {
				Some((holder, _)) => self.structure(holder).map(|s| s.records(pool).count()).unwrap_or(0),
				None => 0,
			};
			if live as i64 != running {
				return Err(InvariantViolation::PoolTotal {
					kind: pool,
					live: live as u32,
					claimed: running as u32,
				});
			}
		}

		Ok(())
	}
}
