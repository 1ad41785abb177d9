//! Selector-addressed edits for the command line.

use anyhow::{
	anyhow,
	Context as _,
	Result
};

use log::info;

use iek_core::{
	selector::Selector,
	EditSession,
	NodeId,
	SubstructureKind
};

use crate::{
	config::Config,
	formats::layout_for
};

pub fn open(name: &str, bytes: Vec<u8>, config: &Config) -> Result<EditSession> {
	let layout = layout_for(&bytes).ok_or_else(|| anyhow!("{}: not a known resource format", name))?;
	EditSession::open(name, layout, bytes, &config.context())
		.with_context(|| format!("could not resolve {}", name))
}

/// Inserts a blank `kind` record under the structure `parent` selects, at
/// position `at` among its records of that kind
pub fn insert(session: &mut EditSession, parent: &str, kind: &str, at: Option<u32>) -> Result<NodeId> {
	let kind = SubstructureKind::from_name(kind).ok_or_else(|| anyhow!("unknown record kind {:?}", kind))?;
	let selector: Selector = parent.parse()?;
	let parent = selector.resolve(session.resource())?;

	let id = session.insert(parent, kind, at)
		.with_context(|| format!("could not insert {} under {:?}", kind, selector.to_string()))?;
	info!("{}: inserted {} at {:#x}", session.name(), kind,
		session.resource().node(id).map_or(0, |f| f.offset));

	Ok(id)
}

/// Removes the record `target` selects, along with everything it owns
pub fn remove(session: &mut EditSession, target: &str) -> Result<()> {
	let selector: Selector = target.parse()?;
	let parent = selector.parent().ok_or_else(|| anyhow!("the resource root cannot be removed"))?;
	let instance = selector.resolve(session.resource())?;
	let parent = parent.resolve(session.resource())?;

	session.remove(parent, instance)
		.with_context(|| format!("could not remove {}", selector))?;
	info!("{}: removed {}", session.name(), selector);

	Ok(())
}
