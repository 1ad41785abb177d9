//! A small resource format for exercising the engine: entrances, containers
//! owning windows into a shared item pool, and a trailing blob.

use byteorder::{
	LE,
	WriteBytesExt
};

use crate::{
	error::FormatError,
	field::{
		PoolRef,
		Section
	},
	kind::SubstructureKind,
	layout::{
		resolve,
		Context,
		Declared,
		FieldReader,
		Layout,
		Prologue
	},
	resource::Resource,
	value::NumberType
};

pub(crate) const HEADER: u32 = 0x24;

#[derive(Debug)]
pub(crate) struct TestLayout;

pub(crate) static TEST: TestLayout = TestLayout;

impl Layout for TestLayout {
	fn name(&self) -> &'static str {
		"TEST"
	}

	fn signature(&self) -> [u8; 4] {
		*b"TEST"
	}

	fn header(&self, r: &mut FieldReader<'_>, prologue: &Prologue, _context: &Context)
		-> Result<Declared, FormatError>
	{
		if &prologue.version != b"V1.0" {
			return Err(prologue.unsupported());
		}

		r.number("Entrances offset", NumberType::U32)?;
		r.number("# entrances", NumberType::U16)?;
		r.number("Containers offset", NumberType::U32)?;
		r.number("# containers", NumberType::U16)?;
		r.number("Items offset", NumberType::U32)?;
		r.number("# items", NumberType::U16)?;
		r.number("Bitmap offset", NumberType::U32)?;
		r.number("Bitmap size", NumberType::U32)?;
		r.unused(2)?;

		Ok(Declared::none()
			.section(Section::counted(SubstructureKind::Entrance, "Entrances offset", "# entrances"))
			.section(Section::counted(SubstructureKind::Container, "Containers offset", "# containers"))
			.section(Section::counted(SubstructureKind::Item, "Items offset", "# items"))
			.section(Section::sized(SubstructureKind::ExploredBitmap, "Bitmap offset", "Bitmap size")))
	}

	fn record(&self, kind: SubstructureKind, r: &mut FieldReader<'_>, _prologue: &Prologue, _context: &Context)
		-> Result<Declared, FormatError>
	{
		match kind {
			SubstructureKind::Entrance => {
				r.text("Name", 32)?;
				r.number("X", NumberType::U16)?;
				r.number("Y", NumberType::U16)?;
				r.unused(68)?;
				Ok(Declared::none())
			},
			SubstructureKind::Container => {
				r.text("Name", 32)?;
				r.number("First item index", NumberType::U32)?;
				r.number("# items", NumberType::U32)?;
				r.unused(152)?;
				Ok(Declared::none()
					.pool_ref(PoolRef::new(SubstructureKind::Item, "First item index", "# items")))
			},
			SubstructureKind::Item => {
				r.resref("Item", "ITM")?;
				r.number("Charges", NumberType::U16)?;
				r.unused(10)?;
				Ok(Declared::none())
			},
			_ => Err(FormatError::ForeignKind {
				format: "TEST",
				kind: kind,
			}),
		}
	}
}

pub(crate) fn resolve_test(bytes: &[u8]) -> Result<Resource, FormatError> {
	resolve(&TEST, bytes, 0, &Context::default())
}

#[derive(Clone, Debug)]
pub(crate) struct Fixture {
	pub entrances: u32,
	/// `(first item index, # items)` per container
	pub containers: Vec<(u32, u32)>,
	pub entrances_absent: bool,
	pub stale_entrances: u16,
	pub bitmap: u32,
	/// Point the bitmap into the item pool instead of after it
	pub bitmap_inside_items: bool,
}

impl Fixture {
	pub fn new(entrances: u32, containers: &[(u32, u32)]) -> Fixture {
		Fixture {
			entrances: entrances,
			containers: containers.to_vec(),
			entrances_absent: false,
			stale_entrances: 0,
			bitmap: 0,
			bitmap_inside_items: false,
		}
	}
}

/// Lays out a TEST resource: header, entrances, containers, items, bitmap
pub(crate) fn fixture(f: &Fixture) -> Vec<u8> {
	let items: u32 = f.containers.iter().map(|(_, n)| n).sum();
	let entrances = if f.entrances_absent { 0 } else { f.entrances };

	let entrances_at = HEADER;
	let containers_at = entrances_at + entrances * 0x68;
	let items_at = containers_at + f.containers.len() as u32 * 0xc0;
	let end = items_at + items * 0x14;
	let bitmap_at = match (f.bitmap, f.bitmap_inside_items) {
		(0, _) => 0,
		(_, true) => items_at + 4,
		(_, false) => end,
	};

	let mut out = vec![];
	out.extend_from_slice(b"TESTV1.0");
	out.write_u32::<LE>(if f.entrances_absent { 0 } else { entrances_at }).unwrap();
	out.write_u16::<LE>(if f.entrances_absent { f.stale_entrances } else { entrances as u16 }).unwrap();
	out.write_u32::<LE>(containers_at).unwrap();
	out.write_u16::<LE>(f.containers.len() as u16).unwrap();
	out.write_u32::<LE>(items_at).unwrap();
	out.write_u16::<LE>(items as u16).unwrap();
	out.write_u32::<LE>(bitmap_at).unwrap();
	out.write_u32::<LE>(f.bitmap).unwrap();
	out.extend_from_slice(&[0; 2]);
	assert_eq!(out.len() as u32, HEADER);

	for i in 0..entrances {
		let mut name = format!("Exit{}", i).into_bytes();
		name.resize(32, 0);
		out.extend_from_slice(&name);
		out.write_u16::<LE>(100 + i as u16).unwrap();
		out.write_u16::<LE>(200 + i as u16).unwrap();
		out.extend_from_slice(&[0; 68]);
	}

	for (i, (first, count)) in f.containers.iter().enumerate() {
		let mut name = format!("Chest{}", i).into_bytes();
		name.resize(32, 0);
		out.extend_from_slice(&name);
		out.write_u32::<LE>(*first).unwrap();
		out.write_u32::<LE>(*count).unwrap();
		out.extend_from_slice(&[0; 152]);
	}

	for i in 0..items {
		let mut name = format!("MISC{:02}", i).into_bytes();
		name.resize(8, 0);
		out.extend_from_slice(&name);
		out.write_u16::<LE>(i as u16).unwrap();
		out.extend_from_slice(&[0; 10]);
	}

	if bitmap_at == end {
		out.extend((0..f.bitmap).map(|i| i as u8 | 0x80));
	}

	out
}
