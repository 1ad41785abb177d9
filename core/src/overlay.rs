use std::collections::BTreeMap;

/// Uncommitted byte edits layered over a serialized resource, as made in a
/// hex view. Offsets are relative to the resource start.
///
/// The overlay never touches the tree; it only changes what [`apply`] returns,
/// and it is thrown away whenever the tree changes.
///
/// [`apply`]: ByteOverlay::apply
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ByteOverlay {
	bytes: BTreeMap<u32, u8>,
}

impl ByteOverlay {
	pub fn new() -> ByteOverlay {
		ByteOverlay::default()
	}

	pub fn set(&mut self, offset: u32, byte: u8) {
		self.bytes.insert(offset, byte);
	}

	/// Drops the edit at `offset`, returning the byte it held
	pub fn revert(&mut self, offset: u32) -> Option<u8> {
		self.bytes.remove(&offset)
	}

	pub fn get(&self, offset: u32) -> Option<u8> {
		self.bytes.get(&offset).copied()
	}

	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}

	pub fn len(&self) -> usize {
		self.bytes.len()
	}

	pub fn clear(&mut self) {
		self.bytes.clear();
	}

	pub fn iter(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
		self.bytes.iter().map(|(o, b)| (*o, *b))
	}

	/// Writes the edits into `data`; edits past its end are skipped
	pub fn apply(&self, data: &mut [u8]) {
		for (offset, byte) in self.iter() {
			if let Some(slot) = data.get_mut(offset as usize) {
				*slot = byte;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_apply() {
		let mut overlay = ByteOverlay::new();
		overlay.set(1, 0xaa);
		overlay.set(9, 0xbb);
		overlay.set(1, 0xcc);
		assert_eq!(overlay.len(), 2);

		let mut data = vec![0; 4];
		overlay.apply(&mut data);
		assert_eq!(data, vec![0, 0xcc, 0, 0]);

		assert_eq!(overlay.revert(1), Some(0xcc));
		assert_eq!(overlay.get(1), None);
	}
}
