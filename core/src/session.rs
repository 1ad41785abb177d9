use log::{
	debug,
	error,
	warn
};

use std::io::{
	self,
	Write
};

use crate::{
	error::{
		FormatError,
		MutationError
	},
	field::NodeId,
	kind::SubstructureKind,
	layout::{
		resolve,
		Context,
		Layout
	},
	overlay::ByteOverlay,
	resource::Resource,
	source::{
		EngineProvider,
		ResourceSource
	}
};

/// One open resource being edited.
///
/// Mutations go through the session so it can track whether there are unsaved
/// changes, keep the last image known to satisfy every invariant, and rebuild
/// the tree from that image when an edit goes wrong.
#[derive(Debug)]
pub struct EditSession {
	name: String,
	resource: Resource,
	checkpoint: Vec<u8>,
	dirty: bool,
	overlay: ByteOverlay,
}

impl EditSession {
	pub fn open<S: Into<String>>(name: S, layout: &'static dyn Layout, bytes: Vec<u8>, context: &Context)
		-> Result<EditSession, FormatError>
	{
		let resource = resolve(layout, &bytes, 0, context)?;

		Ok(EditSession {
			name: name.into(),
			resource: resource,
			checkpoint: bytes,
			dirty: false,
			overlay: ByteOverlay::new(),
		})
	}

	/// Loads `name` from `source` and resolves it for the engine `engines` reports
	pub fn load<S, E>(source: &S, engines: &E, name: &str, layout: &'static dyn Layout)
		-> Result<EditSession, FormatError>
	where
		S: ResourceSource + ?Sized,
		E: EngineProvider + ?Sized,
	{
		let bytes = source.bytes(name)?;
		EditSession::open(name, layout, bytes, &engines.context())
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn resource(&self) -> &Resource {
		&self.resource
	}

	/// True from the first successful edit until the next save
	pub fn is_dirty(&self) -> bool {
		self.dirty
	}

	pub fn insert(&mut self, parent: NodeId, kind: SubstructureKind, at: Option<u32>)
		-> Result<NodeId, MutationError>
	{
		let outcome = self.resource.insert(parent, kind, at);
		self.after_mutation(outcome)
	}

	pub fn remove(&mut self, parent: NodeId, instance: NodeId) -> Result<(), MutationError> {
		let outcome = self.resource.remove(parent, instance);
		self.after_mutation(outcome)
	}

	pub fn set_number(&mut self, id: NodeId, name: &str, value: i64) -> Result<(), MutationError> {
		let outcome = self.resource.set_number(id, name, value);
		self.after_mutation(outcome)
	}

	fn after_mutation<T>(&mut self, outcome: Result<T, MutationError>) -> Result<T, MutationError> {
		match &outcome {
			Ok(_) => {
				self.dirty = true;
				self.overlay.clear();
				self.checkpoint = self.resource.to_bytes();
			},
			Err(MutationError::InternalInvariantViolation(_)) => {
				if let Err(e) = self.recover() {
					error!("{}: could not re-resolve the last good image: {}", self.name, e);
				}
			},
			Err(MutationError::InvalidMutation(_)) => {},
		}

		outcome
	}

	/// Discards the tree and resolves it again from the last good image
	pub fn recover(&mut self) -> Result<(), FormatError> {
		warn!("{}: rebuilding from the last good image", self.name);
		let context = self.resource.context().clone();
		self.resource = resolve(self.resource.layout(), &self.checkpoint, 0, &context)?;
		self.overlay.clear();

		Ok(())
	}

	/// Writes the serialized resource to `sink` and marks the session clean
	pub fn save<W: Write>(&mut self, sink: &mut W) -> io::Result<()> {
		let bytes = self.resource.to_bytes();
		sink.write_all(&bytes)?;
		sink.flush()?;

		debug!("{}: saved {} bytes", self.name, bytes.len());
		self.checkpoint = bytes;
		self.dirty = false;
		self.overlay.clear();

		Ok(())
	}

	pub fn overlay(&self) -> &ByteOverlay {
		&self.overlay
	}

	pub fn overlay_mut(&mut self) -> &mut ByteOverlay {
		&mut self.overlay
	}

	/// The serialized resource with the overlay's byte edits applied
	pub fn view(&self) -> Vec<u8> {
		let mut bytes = self.resource.to_bytes();
		self.overlay.apply(&mut bytes);
		bytes
	}
}
