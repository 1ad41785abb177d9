//! Where resource bytes and engine identity come from.

use std::{
	collections::HashMap,
	fs,
	io,
	path::{
		Path,
		PathBuf
	}
};

use crate::{
	kind::Engine,
	layout::Context
};

/// Byte-buffer-backed resource loader
pub trait ResourceSource {
	fn bytes(&self, name: &str) -> io::Result<Vec<u8>>;
}

/// Tells resolvers which game the resources belong to
pub trait EngineProvider {
	fn current_engine(&self) -> Engine;

	fn context(&self) -> Context {
		Context::new(self.current_engine())
	}
}

impl EngineProvider for Engine {
	fn current_engine(&self) -> Engine {
		*self
	}
}

impl EngineProvider for Context {
	fn current_engine(&self) -> Engine {
		self.engine
	}
}

impl ResourceSource for HashMap<String, Vec<u8>> {
	fn bytes(&self, name: &str) -> io::Result<Vec<u8>> {
		self.get(name)
			.cloned()
			.ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no resource {:?}", name)))
	}
}

/// Resources stored as loose files in one directory
#[derive(Clone, Debug)]
pub struct DirectorySource {
	root: PathBuf,
}

impl DirectorySource {
	pub fn new<P: Into<PathBuf>>(root: P) -> DirectorySource {
		DirectorySource {
			root: root.into(),
		}
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// File names in the directory, sorted
	pub fn names(&self) -> io::Result<Vec<String>> {
		let mut names = vec![];
		for entry in fs::read_dir(&self.root)? {
			let entry = entry?;
			if entry.file_type()?.is_file() {
				if let Some(name) = entry.file_name().to_str() {
					names.push(name.to_string());
				}
			}
		}
		names.sort();

		Ok(names)
	}
}

impl ResourceSource for DirectorySource {
	fn bytes(&self, name: &str) -> io::Result<Vec<u8>> {
		let path = Path::new(name);
		if path.components().count() != 1 || path.is_absolute() || name == ".." {
			return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("{:?} is not a resource name", name)));
		}

		fs::read(self.root.join(path))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_memory_source() {
		let mut source = HashMap::new();
		source.insert("AR0602.ARE".to_string(), b"AREA".to_vec());
		assert_eq!(source.bytes("AR0602.ARE").unwrap(), b"AREA");
		assert_eq!(source.bytes("missing").unwrap_err().kind(), io::ErrorKind::NotFound);
	}

	#[test]
	fn test_directory_rejects_paths() {
		let source = DirectorySource::new("/nonexistent");
		assert_eq!(source.bytes("../etc/passwd").unwrap_err().kind(), io::ErrorKind::InvalidInput);
		assert_eq!(Engine::Pst.context().engine, Engine::Pst);
	}
}
