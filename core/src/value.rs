use byteorder::{
	ByteOrder,
	LE,
	ReadBytesExt
};

use std::{
	fmt,
	io
};

use crate::field::Structure;

/// Width and signedness of a little endian number field
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NumberType {
	U8,
	U16,
	U32,
	I8,
	I16,
	I32,
}

impl NumberType {
	pub const fn width(self) -> u32 {
		match self {
			NumberType::U8 | NumberType::I8 => 1,
			NumberType::U16 | NumberType::I16 => 2,
			NumberType::U32 | NumberType::I32 => 4,
		}
	}

	pub const fn min(self) -> i64 {
		match self {
			NumberType::U8 | NumberType::U16 | NumberType::U32 => 0,
			NumberType::I8 => i8::MIN as i64,
			NumberType::I16 => i16::MIN as i64,
			NumberType::I32 => i32::MIN as i64,
		}
	}

	pub const fn max(self) -> i64 {
		match self {
			NumberType::U8 => u8::MAX as i64,
			NumberType::U16 => u16::MAX as i64,
			NumberType::U32 => u32::MAX as i64,
			NumberType::I8 => i8::MAX as i64,
			NumberType::I16 => i16::MAX as i64,
			NumberType::I32 => i32::MAX as i64,
		}
	}

	pub fn fits(self, value: i64) -> bool {
		value >= self.min() && value <= self.max()
	}

	pub(crate) fn read<R>(self, buf: &mut R) -> io::Result<i64>
	where
		R: ReadBytesExt,
	{
		Ok(match self {
			NumberType::U8 => buf.read_u8()? as i64,
			NumberType::U16 => buf.read_u16::<LE>()? as i64,
			NumberType::U32 => buf.read_u32::<LE>()? as i64,
			NumberType::I8 => buf.read_i8()? as i64,
			NumberType::I16 => buf.read_i16::<LE>()? as i64,
			NumberType::I32 => buf.read_i32::<LE>()? as i64,
		})
	}

	/// Encodes `value` into the first `width()` bytes of `out`, truncating to the width
	pub(crate) fn encode(self, value: i64, out: &mut [u8]) {
		match self {
			NumberType::U8 | NumberType::I8 => out[0] = value as u8,
			NumberType::U16 | NumberType::I16 => LE::write_u16(out, value as u16),
			NumberType::U32 | NumberType::I32 => LE::write_u32(out, value as u32),
		}
	}
}

/// An 8 byte resource reference with the type of resource it points to.
///
/// The raw bytes are kept so that padding after the terminating NUL survives a
/// round trip.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResRef {
	raw: [u8; 8],
	pub ext: &'static str,
}

impl ResRef {
	pub fn parse(raw: [u8; 8], ext: &'static str) -> Result<ResRef, String> {
		let name = &raw[..raw.iter().position(|b| *b == 0).unwrap_or(8)];
		match name.iter().position(|b| !(0x20..0x7f).contains(b)) {
			Some(i) => Err(format!("byte {:#04x} at position {} is not a resource name character", name[i], i)),
			None => Ok(ResRef {
				raw: raw,
				ext: ext,
			}),
		}
	}

	pub fn name(&self) -> &str {
		let len = self.raw.iter().position(|b| *b == 0).unwrap_or(8);
		// validated as printable ASCII in parse
		std::str::from_utf8(&self.raw[..len]).unwrap_or_default()
	}

	pub fn raw(&self) -> &[u8; 8] {
		&self.raw
	}
}

impl fmt::Display for ResRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.name().is_empty() {
			f.write_str("(none)")
		} else if self.ext.is_empty() {
			f.write_str(self.name())
		} else {
			write!(f, "{}.{}", self.name(), self.ext)
		}
	}
}

/// The six kinds of field a resource is made of
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
	Number,
	Bitmask,
	FixedString,
	TypedReference,
	RawBytes,
	NestedStructure,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
	Number(NumberType, i64),
	/// Flag word with one name per bit, lowest bit first
	Bitmask(NumberType, u32, &'static [&'static str]),
	/// Fixed-length string, padding included
	Text(Vec<u8>),
	ResRef(ResRef),
	/// Index into the game's string table
	StrRef(u32),
	Raw(Vec<u8>),
	/// Bytes a typed decoder rejected
	Unknown {
		bytes: Vec<u8>,
		diagnostic: String,
	},
	Structure(Structure),
}

impl Value {
	pub fn kind(&self) -> FieldKind {
		match self {
			Value::Number(..) => FieldKind::Number,
			Value::Bitmask(..) => FieldKind::Bitmask,
			Value::Text(_) => FieldKind::FixedString,
			Value::ResRef(_) | Value::StrRef(_) => FieldKind::TypedReference,
			Value::Raw(_) | Value::Unknown { .. } => FieldKind::RawBytes,
			Value::Structure(_) => FieldKind::NestedStructure,
		}
	}

	/// Encoded size in bytes
	pub fn size(&self) -> u32 {
		match self {
			Value::Number(ty, _) | Value::Bitmask(ty, _, _) => ty.width(),
			Value::Text(bytes) | Value::Raw(bytes) | Value::Unknown { bytes, .. } => bytes.len() as u32,
			Value::ResRef(_) => 8,
			Value::StrRef(_) => 4,
			Value::Structure(s) => s.size(),
		}
	}

	pub fn number(&self) -> Option<i64> {
		match self {
			Value::Number(_, v) => Some(*v),
			Value::Bitmask(_, v, _) => Some(*v as i64),
			Value::StrRef(v) => Some(*v as i64),
			_ => None,
		}
	}

	/// Writes a leaf value into `out`, which must be at least `size()` bytes.
	/// Structures are written child by child and are ignored here.
	pub(crate) fn encode(&self, out: &mut [u8]) {
		match self {
			Value::Number(ty, v) => ty.encode(*v, out),
			Value::Bitmask(ty, v, _) => ty.encode(*v as i64, out),
			Value::Text(bytes) | Value::Raw(bytes) | Value::Unknown { bytes, .. } =>
				out[..bytes.len()].copy_from_slice(bytes),
			Value::ResRef(r) => out[..8].copy_from_slice(r.raw()),
			Value::StrRef(v) => LE::write_u32(out, *v),
			Value::Structure(_) => {},
		}
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Number(_, v) => write!(f, "{}", v),
			Value::Bitmask(ty, v, names) => {
				write!(f, "{:#0width$x}", v, width = ty.width() as usize * 2 + 2)?;
				let set: Vec<&str> = names.iter()
					.enumerate()
					.filter(|(bit, _)| v & (1 << bit) != 0)
					.map(|(_, n)| *n)
					.collect();
				if !set.is_empty() {
					write!(f, " ({})", set.join(" | "))?;
				}
				Ok(())
			},
			Value::Text(bytes) => {
				let len = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
				write!(f, "{:?}", String::from_utf8_lossy(&bytes[..len]))
			},
			Value::ResRef(r) => write!(f, "{}", r),
			Value::StrRef(v) => write!(f, "#{}", *v as i32),
			Value::Raw(bytes) => write!(f, "<{} bytes>", bytes.len()),
			Value::Unknown { bytes, diagnostic } => write!(f, "<{} bytes: {}>", bytes.len(), diagnostic),
			Value::Structure(s) => write!(f, "{{{} fields}}", s.children().len()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_number_fits() {
		assert!(NumberType::U16.fits(65535));
		assert!(!NumberType::U16.fits(65536));
		assert!(!NumberType::U32.fits(-1));
		assert!(NumberType::I16.fits(-32768));
	}

	#[test]
	fn test_number_encode() {
		let mut out = [0; 4];
		NumberType::U16.encode(0x1234, &mut out);
		assert_eq!(out, [0x34, 0x12, 0, 0]);
		NumberType::I32.encode(-2, &mut out);
		assert_eq!(out, [0xfe, 0xff, 0xff, 0xff]);
	}

	#[test]
	fn test_resref() {
		let r = ResRef::parse(*b"AR0602\0\x7f", "ARE").unwrap();
		assert_eq!(r.name(), "AR0602");
		assert_eq!(r.to_string(), "AR0602.ARE");
		// padding after the NUL is kept verbatim
		assert_eq!(r.raw()[7], 0x7f);
		assert!(ResRef::parse(*b"AR\x01\x02\0\0\0\0", "ARE").is_err());
	}

	#[test]
	fn test_bitmask_display() {
		let v = Value::Bitmask(NumberType::U16, 5, &["Outdoor", "Day/Night", "Weather"]);
		assert_eq!(v.to_string(), "0x0005 (Outdoor | Weather)");
	}
}
