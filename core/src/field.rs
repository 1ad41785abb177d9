use std::fmt;

use crate::{
	error::InvariantViolation,
	kind::SubstructureKind,
	value::{
		FieldKind,
		Value
	}
};

/// Stable identity of a [`Structure`] within one resource
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(pub(crate) u32);

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// How a section states the number of records it holds
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Count {
	/// A count field holding the number of records
	Field(&'static str),
	/// A field holding the byte length of the run
	ByteLength(&'static str),
	/// Always this many records when the section is present
	Fixed(u32),
	/// A shared pool whose total is the sum of its owners' local counts
	Pooled,
}

/// Declares a run of `kind` records starting at the offset held in `offset_field`
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Section {
	pub kind: SubstructureKind,
	pub offset_field: &'static str,
	pub count: Count,
}

impl Section {
	pub const fn counted(kind: SubstructureKind, offset_field: &'static str, count_field: &'static str) -> Section {
		Section {
			kind: kind,
			offset_field: offset_field,
			count: Count::Field(count_field),
		}
	}

	pub const fn sized(kind: SubstructureKind, offset_field: &'static str, length_field: &'static str) -> Section {
		Section {
			kind: kind,
			offset_field: offset_field,
			count: Count::ByteLength(length_field),
		}
	}

	pub const fn single(kind: SubstructureKind, offset_field: &'static str) -> Section {
		Section {
			kind: kind,
			offset_field: offset_field,
			count: Count::Fixed(1),
		}
	}

	pub const fn pooled(kind: SubstructureKind, offset_field: &'static str) -> Section {
		Section {
			kind: kind,
			offset_field: offset_field,
			count: Count::Pooled,
		}
	}

	/// Name of the field that stores the count or length, if any
	pub fn count_field(&self) -> Option<&'static str> {
		match self.count {
			Count::Field(name) | Count::ByteLength(name) => Some(name),
			Count::Fixed(_) | Count::Pooled => None,
		}
	}
}

/// An owner's `(first index, local count)` window into a shared pool
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PoolRef {
	/// Slot kind; its pool is `kind.pool()`
	pub kind: SubstructureKind,
	pub first_field: &'static str,
	pub count_field: &'static str,
}

impl PoolRef {
	pub const fn new(kind: SubstructureKind, first_field: &'static str, count_field: &'static str) -> PoolRef {
		PoolRef {
			kind: kind,
			first_field: first_field,
			count_field: count_field,
		}
	}
}

/// A named, offset-tracked value. Offsets are absolute within the buffer the
/// resource was resolved from.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
	pub name: String,
	pub offset: u32,
	pub value: Value,
}

impl Field {
	pub fn new<S: Into<String>>(name: S, offset: u32, value: Value) -> Field {
		Field {
			name: name.into(),
			offset: offset,
			value: value,
		}
	}

	pub fn size(&self) -> u32 {
		self.value.size()
	}

	pub fn end(&self) -> u64 {
		self.offset as u64 + self.size() as u64
	}

	pub fn kind(&self) -> FieldKind {
		self.value.kind()
	}

	pub fn as_structure(&self) -> Option<&Structure> {
		match &self.value {
			Value::Structure(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_structure_mut(&mut self) -> Option<&mut Structure> {
		match &mut self.value {
			Value::Structure(s) => Some(s),
			_ => None,
		}
	}

	/// Recomputes the size of this field's structure, and of every structure
	/// below it, from the spans of their children. Returns the end offset.
	pub fn rederive_sizes(&mut self) -> u64 {
		let offset = self.offset;
		if let Value::Structure(s) = &mut self.value {
			s.rederive_sizes(offset);
		}

		self.end()
	}

	/// Appends every leaf below this field, in declared order
	pub fn flatten<'a>(&'a self, out: &mut Vec<&'a Field>) {
		match &self.value {
			Value::Structure(s) => s.flatten(out),
			_ => out.push(self),
		}
	}
}

/// An ordered collection of fields that is itself a field value.
///
/// Children are kept in declared order: the order the layout produced them
/// in, with inserted records placed next to their siblings.
#[derive(Clone, Debug, PartialEq)]
pub struct Structure {
	id: NodeId,
	kind: Option<SubstructureKind>,
	pub(crate) children: Vec<Field>,
	sections: Vec<Section>,
	pool_refs: Vec<PoolRef>,
	pub(crate) size: u32,
}

impl Structure {
	pub(crate) fn new(id: NodeId, kind: Option<SubstructureKind>, children: Vec<Field>, sections: Vec<Section>,
		pool_refs: Vec<PoolRef>) -> Structure
	{
		Structure {
			id: id,
			kind: kind,
			children: children,
			sections: sections,
			pool_refs: pool_refs,
			size: 0,
		}
	}

	pub fn id(&self) -> NodeId {
		self.id
	}

	/// Record kind, or `None` for a resource root
	pub fn kind(&self) -> Option<SubstructureKind> {
		self.kind
	}

	pub fn children(&self) -> &[Field] {
		&self.children
	}

	pub fn sections(&self) -> &[Section] {
		&self.sections
	}

	pub fn pool_refs(&self) -> &[PoolRef] {
		&self.pool_refs
	}

	pub fn size(&self) -> u32 {
		self.size
	}

	/// Recomputes the sizes of this structure, laid out at `offset`, and of every
	/// structure below it. Returns the end offset.
	pub fn rederive_sizes(&mut self, offset: u32) -> u64 {
		let end = self.children.iter_mut()
			.map(|c| c.rederive_sizes())
			.max()
			.unwrap_or(offset as u64);
		self.size = end.saturating_sub(offset as u64) as u32;

		end
	}

	/// Appends every leaf below this structure, in declared order
	pub fn flatten<'a>(&'a self, out: &mut Vec<&'a Field>) {
		for child in self.children.iter() {
			child.flatten(out);
		}
	}

	pub fn get(&self, name: &str) -> Option<&Field> {
		self.children.iter().find(|f| f.name == name)
	}

	pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Field> {
		self.children.iter_mut().find(|f| f.name == name)
	}

	pub fn number(&self, name: &str) -> Option<i64> {
		self.get(name).and_then(|f| f.value.number())
	}

	pub fn section(&self, kind: SubstructureKind) -> Option<(usize, &Section)> {
		self.sections.iter().enumerate().find(|(_, s)| s.kind == kind)
	}

	pub fn pool_ref(&self, kind: SubstructureKind) -> Option<&PoolRef> {
		self.pool_refs.iter().find(|p| p.kind == kind)
	}

	/// Fields holding the records of `kind`, in declared order
	pub fn record_fields(&self, kind: SubstructureKind) -> impl Iterator<Item = &Field> + '_ {
		self.children.iter()
			.filter(move |f| f.as_structure().map_or(false, |s| s.kind == Some(kind)))
	}

	/// Child structures of the given record kind, in declared order
	pub fn records(&self, kind: SubstructureKind) -> impl Iterator<Item = &Structure> + '_ {
		self.record_fields(kind).filter_map(Field::as_structure)
	}

	/// True if the field is bookkeeping owned by a section or pool slot
	pub fn is_structural(&self, name: &str) -> bool {
		self.sections.iter().any(|s| s.offset_field == name || s.count_field() == Some(name)) ||
			self.pool_refs.iter().any(|p| p.first_field == name || p.count_field == name)
	}

	/// Stores a new value in a numeric field, refusing values the field cannot hold
	pub(crate) fn put_number(&mut self, name: &str, value: i64) -> Result<(), InvariantViolation> {
		let field = self.get_mut(name)
			.ok_or_else(|| InvariantViolation::MissingField(name.to_string()))?;

		match &mut field.value {
			Value::Number(ty, v) if ty.fits(value) => *v = value,
			Value::Bitmask(ty, v, _) if ty.fits(value) => *v = value as u32,
			_ => return Err(InvariantViolation::CountRange {
				field: name.to_string(),
				value: value,
			}),
		}

		Ok(())
	}

	/// Adds `delta` to a numeric field
	pub(crate) fn bump(&mut self, name: &str, delta: i64) -> Result<(), InvariantViolation> {
		let current = self.number(name)
			.ok_or_else(|| InvariantViolation::MissingField(name.to_string()))?;
		self.put_number(name, current + delta)
	}

	/// Gives the records of `kind` the names `"<Kind> 0"`, `"<Kind> 1"`, ...
	pub(crate) fn renumber(&mut self, kind: SubstructureKind) {
		let mut n = 0;
		for child in self.children.iter_mut() {
			if child.as_structure().and_then(Structure::kind) == Some(kind) {
				child.name = format!("{} {}", kind.name(), n);
				n += 1;
			}
		}
	}
}
