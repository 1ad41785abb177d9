//! ARE area maps.
//!
//! Version 1.0 covers BG1, BG2, the Enhanced Editions, PST and IWD; the block
//! at the end of its header differs per engine. Version 9.1 is IWD2, with an
//! extra 16 byte block before the first section offset.

mod are;
mod flags;

pub use are::{
	AreaLayout,
	AREA,
	HEADER_V10,
	HEADER_V91,
	SIGNATURE
};
pub use flags::*;

use iek_core::{
	resolve,
	Context,
	EditSession,
	Engine,
	FormatError,
	Resource
};

pub fn resolve_area(bytes: &[u8], engine: Engine) -> Result<Resource, FormatError> {
	resolve(&AREA, bytes, 0, &Context::new(engine))
}

pub fn open_area<S: Into<String>>(name: S, bytes: Vec<u8>, engine: Engine) -> Result<EditSession, FormatError> {
	EditSession::open(name, &AREA, bytes, &Context::new(engine))
}
