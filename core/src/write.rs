use std::io::{
	self,
	Write
};

use crate::resource::Resource;

impl Resource {
	/// Encodes the tree back into bytes.
	///
	/// Leaves are written in declared order, each at its own offset relative to
	/// the resource start. Bytes no field covers are left zero.
	pub fn to_bytes(&self) -> Vec<u8> {
		let len = self.end().saturating_sub(self.base()) as usize;
		let mut out = vec![0; len];

		for field in self.flatten() {
			let at = (field.offset - self.base()) as usize;
			if let Some(slot) = out.get_mut(at..at + field.size() as usize) {
				field.value.encode(slot);
			}
		}

		out
	}

	pub fn write<W: Write>(&self, sink: &mut W) -> io::Result<()> {
		sink.write_all(&self.to_bytes())
	}
}

#[cfg(test)]
mod tests {
	use crate::{
		layout::{
			resolve,
			Context,
			TRAILING_BYTES
		},
		testing::{
			fixture,
			resolve_test,
			Fixture,
			HEADER,
			TEST
		}
	};

	#[test]
	fn test_round_trip() {
		let mut f = Fixture::new(3, &[(2, 1), (0, 2), (3, 0)]);
		f.bitmap = 11;
		let bytes = fixture(&f);

		let r = resolve_test(&bytes).unwrap();
		assert_eq!(r.to_bytes(), bytes);

		let mut sink = vec![];
		r.write(&mut sink).unwrap();
		assert_eq!(sink, bytes);
	}

	#[test]
	fn test_round_trip_empty() {
		let bytes = fixture(&Fixture::new(0, &[]));
		assert_eq!(resolve_test(&bytes).unwrap().to_bytes(), bytes);
	}

	#[test]
	fn test_round_trip_at_offset() {
		let bytes = fixture(&Fixture::new(1, &[(0, 2)]));
		let mut padded = vec![0xee; 16];
		padded.extend_from_slice(&bytes);
		padded.extend_from_slice(&[0xee; 4]);

		// section offsets stay relative to the resource start
		let r = resolve(&TEST, &padded, 16, &Context::default()).unwrap();
		assert_eq!(r.base(), 16);
		assert_eq!(r.root().get("Signature").unwrap().offset, 16);
		assert_eq!(r.root().get("Entrance 0").unwrap().offset, 16 + HEADER);
		assert_eq!(r.to_bytes(), bytes);
		assert!(r.root().get(TRAILING_BYTES).is_none());
	}

	#[test]
	fn test_round_trip_trailing_bytes() {
		let mut bytes = fixture(&Fixture::new(1, &[(0, 1)]));
		let end = bytes.len() as u32;
		bytes.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd]);

		let r = resolve_test(&bytes).unwrap();
		let tail = r.root().get(TRAILING_BYTES).unwrap();
		assert_eq!(tail.offset, end);
		assert_eq!(tail.size(), 4);
		assert_eq!(r.size(), end + 4);
		assert_eq!(r.to_bytes(), bytes);
		r.verify().unwrap();
	}
}
