//! Human-readable views of a resolved resource.

use std::io::{
	self,
	Write
};

use iek_core::{
	Resource,
	Structure
};

/// Writes the field tree, one field per line: offset, size, name and value
pub fn tree<W: Write>(resource: &Resource, out: &mut W) -> io::Result<()> {
	fn walk<W: Write>(s: &Structure, depth: usize, out: &mut W) -> io::Result<()> {
		for field in s.children() {
			let indent = "  ".repeat(depth);
			match field.as_structure() {
				Some(child) => {
					writeln!(out, "{:#08x} {:>6}  {}{}", field.offset, field.size(), indent, field.name)?;
					walk(child, depth + 1, out)?;
				},
				None => writeln!(out, "{:#08x} {:>6}  {}{} = {}", field.offset, field.size(), indent, field.name,
					field.value)?,
			}
		}
		Ok(())
	}

	writeln!(out, "{} {} ({}), {} bytes", resource.layout().name(), resource.prologue().version_str(),
		resource.context().engine, resource.size())?;
	walk(resource.root(), 1, out)?;

	for d in resource.diagnostics() {
		writeln!(out, "diagnostic {}", d)?;
	}
	Ok(())
}

/// Describes what covers byte `offset`: the leaf field and the section run
pub fn at<W: Write>(resource: &Resource, offset: u32, out: &mut W) -> io::Result<()> {
	match resource.field_at(offset) {
		Some(field) => writeln!(out, "{:#x}: field {:?} at {:#x} = {}", offset, field.name, field.offset,
			field.value)?,
		None => writeln!(out, "{:#x}: no field", offset)?,
	}

	match resource.section_at(offset) {
		Some(state) => writeln!(out, "{:#x}: {} section at {:#x}, {} records", offset, state.kind(),
			state.start.unwrap_or(0), state.records)?,
		None => writeln!(out, "{:#x}: header", offset)?,
	}
	Ok(())
}
