//! Turning a byte buffer into a [`Resource`] tree.
//!
//! A format supplies a [`Layout`]: one procedure for the header and one per
//! record kind, each reading fields in declared order through a
//! [`FieldReader`] and returning the sections and pool slots the fields it just
//! read describe. [`resolve`] drives it: prologue, header, then every present
//! section recursively, then the shared pools once the owners are known.

use log::{
	debug,
	warn
};

use std::{
	borrow::Cow,
	collections::HashMap,
	fmt,
	io::Cursor
};

use crate::{
	error::FormatError,
	field::{
		Count,
		Field,
		NodeId,
		PoolRef,
		Section,
		Structure
	},
	io_ext::ReadBinExt,
	kind::{
		Engine,
		Shape,
		SubstructureKind
	},
	resource::Resource,
	value::{
		NumberType,
		ResRef,
		Value
	}
};

/// Everything a resolver may branch on besides the bytes themselves
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Context {
	pub engine: Engine,
}

impl Context {
	pub fn new(engine: Engine) -> Context {
		Context {
			engine: engine,
		}
	}
}

/// Signature and version tag every resource starts with
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Prologue {
	pub signature: [u8; 4],
	pub version: [u8; 4],
}

impl Prologue {
	pub fn signature_str(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.signature)
	}

	pub fn version_str(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.version)
	}

	pub fn unsupported(&self) -> FormatError {
		FormatError::UnsupportedVersion {
			signature: self.signature_str().into_owned(),
			version: self.version_str().into_owned(),
		}
	}
}

/// A field that decoded to something unusable, kept as raw bytes
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Diagnostic {
	pub offset: u32,
	pub field: String,
	pub message: String,
}

impl fmt::Display for Diagnostic {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:#x} {}: {}", self.offset, self.field, self.message)
	}
}

/// Sections and pool slots declared by the fields of one structure
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Declared {
	pub sections: Vec<Section>,
	pub pool_refs: Vec<PoolRef>,
}

impl Declared {
	pub fn none() -> Declared {
		Declared::default()
	}

	pub fn section(mut self, section: Section) -> Declared {
		self.sections.push(section);
		self
	}

	pub fn pool_ref(mut self, pool_ref: PoolRef) -> Declared {
		self.pool_refs.push(pool_ref);
		self
	}
}

/// Format-specific layout rules
pub trait Layout: fmt::Debug + Send + Sync {
	/// Short format name, used as the root field name
	fn name(&self) -> &'static str;

	fn signature(&self) -> [u8; 4];

	/// Reads the header fields that follow the prologue
	fn header(&self, r: &mut FieldReader<'_>, prologue: &Prologue, context: &Context)
		-> Result<Declared, FormatError>;

	/// Reads one record of `kind`
	fn record(&self, kind: SubstructureKind, r: &mut FieldReader<'_>, prologue: &Prologue, context: &Context)
		-> Result<Declared, FormatError>;

	/// Bytes a freshly inserted record is laid out from
	fn blank(&self, _kind: SubstructureKind, size: u32) -> Vec<u8> {
		vec![0; size as usize]
	}
}

/// Reads typed fields in sequence, recording each one's name and offset
pub struct FieldReader<'a> {
	cur: Cursor<&'a [u8]>,
	origin: u32,
	fields: Vec<Field>,
	diagnostics: Vec<Diagnostic>,
}

impl<'a> FieldReader<'a> {
	/// Reader over `data`, whose first byte sits at offset `origin`, starting at `position`
	pub fn new(data: &'a [u8], origin: u32, position: u32) -> FieldReader<'a> {
		let mut cur = Cursor::new(data);
		cur.set_position(position.saturating_sub(origin) as u64);

		FieldReader {
			cur: cur,
			origin: origin,
			fields: vec![],
			diagnostics: vec![],
		}
	}

	/// Offset the next field will be read from
	pub fn offset(&self) -> u32 {
		self.origin + self.cur.position() as u32
	}

	fn ensure(&self, len: u32) -> Result<u32, FormatError> {
		let available = (self.cur.get_ref().len() as u64).saturating_sub(self.cur.position());
		if len as u64 > available {
			return Err(FormatError::Truncated {
				offset: self.offset(),
				needed: len,
				available: available as u32,
			});
		}

		Ok(self.offset())
	}

	fn push(&mut self, name: &str, offset: u32, value: Value) {
		self.fields.push(Field::new(name, offset, value));
	}

	pub fn number(&mut self, name: &str, ty: NumberType) -> Result<i64, FormatError> {
		let offset = self.ensure(ty.width())?;
		let value = ty.read(&mut self.cur)?;
		self.push(name, offset, Value::Number(ty, value));

		Ok(value)
	}

	pub fn bitmask(&mut self, name: &str, ty: NumberType, names: &'static [&'static str])
		-> Result<u32, FormatError>
	{
		let offset = self.ensure(ty.width())?;
		let value = ty.read(&mut self.cur)? as u32;
		self.push(name, offset, Value::Bitmask(ty, value, names));

		Ok(value)
	}

	/// Reads a 4 byte tag such as a signature or version
	pub fn tag(&mut self, name: &str) -> Result<[u8; 4], FormatError> {
		let offset = self.ensure(4)?;
		let tag = self.cur.read_array::<4>()?;
		self.push(name, offset, Value::Text(tag.to_vec()));

		Ok(tag)
	}

	pub fn text(&mut self, name: &str, len: u32) -> Result<(), FormatError> {
		let offset = self.ensure(len)?;
		let bytes = self.cur.read_fixed(len as usize)?;
		self.push(name, offset, Value::Text(bytes));

		Ok(())
	}

	/// Reads a resource reference; malformed names degrade to an unknown field
	pub fn resref(&mut self, name: &str, ext: &'static str) -> Result<(), FormatError> {
		let offset = self.ensure(8)?;
		let raw = self.cur.read_array::<8>()?;

		let value = match ResRef::parse(raw, ext) {
			Ok(r) => Value::ResRef(r),
			Err(message) => {
				warn!("{:#x} {}: {}", offset, name, message);
				self.diagnostics.push(Diagnostic {
					offset: offset,
					field: name.to_string(),
					message: message.clone(),
				});

				Value::Unknown {
					bytes: raw.to_vec(),
					diagnostic: message,
				}
			},
		};
		self.push(name, offset, value);

		Ok(())
	}

	pub fn strref(&mut self, name: &str) -> Result<u32, FormatError> {
		let offset = self.ensure(4)?;
		let value = NumberType::U32.read(&mut self.cur)? as u32;
		self.push(name, offset, Value::StrRef(value));

		Ok(value)
	}

	pub fn raw(&mut self, name: &str, len: u32) -> Result<(), FormatError> {
		let offset = self.ensure(len)?;
		let bytes = self.cur.read_fixed(len as usize)?;
		self.push(name, offset, Value::Raw(bytes));

		Ok(())
	}

	/// Reserved bytes, kept so they survive a round trip
	pub fn unused(&mut self, len: u32) -> Result<(), FormatError> {
		self.raw("Unused", len)
	}

	pub fn finish(self) -> (Vec<Field>, Vec<Diagnostic>) {
		(self.fields, self.diagnostics)
	}
}

/// Name of the root field holding bytes past the last field of a standalone
/// resource
pub const TRAILING_BYTES: &str = "Unused bytes";

/// Resolves the resource starting at `start` within `buffer`.
///
/// Section offsets stored in the resource are relative to `start`; field
/// offsets in the tree are absolute within `buffer`. A resource starting at 0
/// owns the whole buffer, so whatever follows its last field is kept as
/// [`TRAILING_BYTES`].
pub fn resolve(layout: &'static dyn Layout, buffer: &[u8], start: u32, context: &Context)
	-> Result<Resource, FormatError>
{
	let mut r = FieldReader::new(buffer, 0, start);
	let signature = r.tag("Signature")?;
	if signature != layout.signature() {
		return Err(FormatError::Signature {
			expected: String::from_utf8_lossy(&layout.signature()).into_owned(),
			found: String::from_utf8_lossy(&signature).into_owned(),
		});
	}

	let version = r.tag("Version")?;
	let prologue = Prologue {
		signature: signature,
		version: version,
	};

	let declared = layout.header(&mut r, &prologue, context)?;
	let (fields, diagnostics) = r.finish();

	let mut resolution = Resolution {
		layout: layout,
		buffer: buffer,
		base: start,
		prologue: prologue,
		context: context.clone(),
		next_id: 1,
		diagnostics: diagnostics,
	};

	let mut root = Structure::new(NodeId(0), None, fields, declared.sections, declared.pool_refs);
	resolution.sections(&mut root)?;
	let totals = pool_totals(&root);
	resolution.pooled(&mut root, &totals)?;

	let mut end = root.rederive_sizes(start);
	if start == 0 && end < buffer.len() as u64 {
		let tail = &buffer[end as usize..];
		debug!("{} bytes after the last field at {:#x}", tail.len(), end);
		root.children.push(Field::new(TRAILING_BYTES, end as u32, Value::Raw(tail.to_vec())));
		end = root.rederive_sizes(start);
	}

	debug!("resolved {} {} at {:#x}: {} bytes, {} diagnostics", layout.name(), prologue.version_str(), start,
		end - start as u64, resolution.diagnostics.len());

	Ok(Resource::assemble(layout, context.clone(), prologue, start, root, resolution.diagnostics,
		resolution.next_id))
}

/// Sums every owner's local count per pool
fn pool_totals(root: &Structure) -> HashMap<SubstructureKind, u32> {
	fn walk(s: &Structure, totals: &mut HashMap<SubstructureKind, u32>) {
		for pr in s.pool_refs() {
			if let Some(pool) = pr.kind.pool() {
				*totals.entry(pool).or_insert(0) += s.number(pr.count_field).unwrap_or(0) as u32;
			}
		}
		for child in s.children().iter().filter_map(Field::as_structure) {
			walk(child, totals);
		}
	}

	let mut totals = HashMap::new();
	walk(root, &mut totals);
	totals
}

struct Resolution<'a> {
	layout: &'static dyn Layout,
	buffer: &'a [u8],
	base: u32,
	prologue: Prologue,
	context: Context,
	next_id: u32,
	diagnostics: Vec<Diagnostic>,
}

impl<'a> Resolution<'a> {
	fn alloc(&mut self) -> NodeId {
		let id = NodeId(self.next_id);
		self.next_id += 1;
		id
	}

	/// Absolute start of a section, `None` when its offset is 0
	fn start_of(&self, holder: &Structure, section: &Section) -> Result<Option<u32>, FormatError> {
		let value = holder.number(section.offset_field)
			.ok_or(FormatError::UndeclaredField(section.offset_field))?;
		if value == 0 {
			return Ok(None);
		}

		self.base.checked_add(value as u32)
			.map(Some)
			.ok_or(FormatError::SectionOutOfBounds {
				kind: section.kind,
				offset: value as u32,
				length: 0,
			})
	}

	fn bounds(&self, kind: SubstructureKind, start: u32, length: u64) -> Result<(), FormatError> {
		if start as u64 + length > self.buffer.len() as u64 {
			return Err(FormatError::SectionOutOfBounds {
				kind: kind,
				offset: start,
				length: length,
			});
		}

		Ok(())
	}

	fn sections(&mut self, holder: &mut Structure) -> Result<(), FormatError> {
		for section in holder.sections().to_vec() {
			let stored = match section.count {
				Count::Field(name) | Count::ByteLength(name) => holder.number(name)
					.ok_or(FormatError::UndeclaredField(name))?,
				Count::Fixed(n) => n as i64,
				Count::Pooled => continue,
			};

			let start = match self.start_of(holder, &section)? {
				Some(start) => start,
				None => {
					if stored != 0 && section.count_field().is_some() {
						debug!("{} section is absent, ignoring stored count {}", section.kind, stored);
					}
					continue;
				},
			};

			match section.kind.info().shape {
				Shape::Blob => {
					let len = stored as u32;
					if len == 0 {
						continue;
					}
					self.bounds(section.kind, start, len as u64)?;

					let mut r = FieldReader::new(self.buffer, 0, start);
					r.raw(section.kind.name(), len)?;
					holder.children.extend(r.finish().0);
				},
				Shape::Fixed(size) => {
					let count = match section.count {
						Count::ByteLength(_) => {
							if stored as u32 % size != 0 {
								return Err(FormatError::MisalignedSection {
									kind: section.kind,
									length: stored as u32,
									size: size,
								});
							}
							stored as u32 / size
						},
						_ => stored as u32,
					};
					if count == 0 {
						debug!("{} section at {:#x} is empty, not checking its bounds", section.kind, start);
						continue;
					}
					self.bounds(section.kind, start, count as u64 * size as u64)?;

					for i in 0..count {
						let record = self.record(section.kind, start + i * size, i)?;
						holder.children.push(record);
					}
				},
			}
		}

		Ok(())
	}

	/// Resolves pools sized by their owners, once every owner is in the tree
	fn pooled(&mut self, holder: &mut Structure, totals: &HashMap<SubstructureKind, u32>)
		-> Result<(), FormatError>
	{
		for section in holder.sections().to_vec() {
			if section.count != Count::Pooled {
				continue;
			}

			let (start, size) = match (self.start_of(holder, &section)?, section.kind.size()) {
				(Some(start), Some(size)) => (start, size),
				_ => continue,
			};
			let count = totals.get(&section.kind).copied().unwrap_or(0);
			if count == 0 {
				continue;
			}
			self.bounds(section.kind, start, count as u64 * size as u64)?;

			for i in 0..count {
				let record = self.record(section.kind, start + i * size, i)?;
				holder.children.push(record);
			}
		}

		for child in holder.children.iter_mut().filter_map(Field::as_structure_mut) {
			self.pooled(child, totals)?;
		}

		Ok(())
	}

	fn record(&mut self, kind: SubstructureKind, at: u32, index: u32) -> Result<Field, FormatError> {
		let mut r = FieldReader::new(self.buffer, 0, at);
		let declared = self.layout.record(kind, &mut r, &self.prologue, &self.context)?;

		let actual = r.offset() - at;
		if Some(actual) != kind.size() {
			return Err(FormatError::RecordSize {
				kind: kind,
				expected: kind.size().unwrap_or(0),
				actual: actual,
			});
		}

		let (fields, diagnostics) = r.finish();
		self.diagnostics.extend(diagnostics);

		let mut structure = Structure::new(self.alloc(), Some(kind), fields, declared.sections, declared.pool_refs);
		self.sections(&mut structure)?;

		Ok(Field::new(format!("{} {}", kind.name(), index), at, Value::Structure(structure)))
	}
}

/// Lays out a blank record of `kind` at `at`, for insertion
pub(crate) fn blank_record(resource: &Resource, kind: SubstructureKind, at: u32, id: NodeId)
	-> Result<Structure, FormatError>
{
	let size = kind.size().unwrap_or(0);
	let bytes = resource.layout().blank(kind, size);
	let mut r = FieldReader::new(&bytes, at, at);
	let declared = resource.layout().record(kind, &mut r, resource.prologue(), resource.context())?;

	Ok(Structure::new(id, Some(kind), r.finish().0, declared.sections, declared.pool_refs))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_reader_offsets() {
		let data = b"\x01\x00\x02\x00\x00\x00AR0602\0\0";
		let mut r = FieldReader::new(data, 0x100, 0x100);
		assert_eq!(r.number("A", NumberType::U16).unwrap(), 1);
		assert_eq!(r.number("B", NumberType::U32).unwrap(), 2);
		r.resref("Area", "ARE").unwrap();
		assert_eq!(r.offset(), 0x10e);

		let (fields, diagnostics) = r.finish();
		assert!(diagnostics.is_empty());
		assert_eq!(fields.iter().map(|f| f.offset).collect::<Vec<_>>(), vec![0x100, 0x102, 0x106]);
	}

	#[test]
	fn test_reader_truncated() {
		let mut r = FieldReader::new(b"\x01\x00", 0, 0);
		match r.number("A", NumberType::U32) {
			Err(FormatError::Truncated { offset: 0, needed: 4, available: 2 }) => {},
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn test_malformed_resref_degrades() {
		let mut r = FieldReader::new(b"\x01\x02\x03\0\0\0\0\0\x07\x00", 0, 0);
		r.resref("Script", "BCS").unwrap();
		r.number("After", NumberType::U16).unwrap();

		let (fields, diagnostics) = r.finish();
		assert_eq!(diagnostics.len(), 1);
		assert_eq!(diagnostics[0].field, "Script");
		assert!(matches!(fields[0].value, Value::Unknown { .. }));
		assert_eq!(fields[1].value, Value::Number(NumberType::U16, 7));
	}
}
