use std::io::{
	Read,
	Result
};

pub trait ReadBinExt: Read {
	/// Reads exactly `len` bytes
	#[inline]
	fn read_fixed(&mut self, len: usize) -> Result<Vec<u8>> {
		let mut buf = vec![0; len];
		self.read_exact(&mut buf)?;

		Ok(buf)
	}

	/// Reads a fixed size array, such as a 4 byte tag or an 8 byte resource name
	#[inline]
	fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
		let mut buf = [0; N];
		self.read_exact(&mut buf)?;

		Ok(buf)
	}
}

impl<R> ReadBinExt for R
where
	R: Read + ?Sized,
{
}
