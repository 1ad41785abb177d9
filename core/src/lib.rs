//! Structured binary resource model.
//!
//! A [`Layout`] describes one resource format. [`resolve`] turns a buffer into
//! a [`Resource`]: a tree of named, offset-tracked [`Field`]s whose repeated
//! records are declared by offset/count pairs in their parents. Records can be
//! inserted and removed with every offset, count, and shared pool window kept
//! consistent, and the tree serializes back to the exact bytes it came from.

pub mod error;
pub mod field;
pub mod io_ext;
pub mod kind;
pub mod layout;
mod mutate;
pub mod overlay;
pub mod pool;
pub mod resource;
#[cfg(feature = "selector")]
pub mod selector;
pub mod session;
pub mod source;
pub mod value;
mod write;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{
	FormatError,
	InvalidMutation,
	InvariantViolation,
	MutationError
};
pub use field::{
	Count,
	Field,
	NodeId,
	PoolRef,
	Section,
	Structure
};
pub use kind::{
	Engine,
	Shape,
	SubstructureKind
};
pub use layout::{
	resolve,
	Context,
	Declared,
	Diagnostic,
	FieldReader,
	Layout,
	Prologue,
	TRAILING_BYTES
};
pub use overlay::ByteOverlay;
pub use resource::{
	Resource,
	SectionState
};
pub use session::EditSession;
pub use source::{
	DirectorySource,
	EngineProvider,
	ResourceSource
};
pub use value::{
	FieldKind,
	NumberType,
	ResRef,
	Value
};
