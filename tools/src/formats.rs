//! Known formats, looked up by signature.

use iek_core::Layout;
use iek_formats_area::AREA;
use iek_formats_item::ITEM;

pub fn layouts() -> [&'static dyn Layout; 2] {
	[&AREA, &ITEM]
}

/// The layout whose signature `bytes` starts with
pub fn layout_for(bytes: &[u8]) -> Option<&'static dyn Layout> {
	let signature = bytes.get(..4)?;
	layouts().into_iter().find(|l| l.signature() == signature)
}

/// File extension conventionally used for a layout's resources
pub fn extension(layout: &dyn Layout) -> &'static str {
	match layout.name() {
		"ARE" => "are",
		"ITM" => "itm",
		_ => "",
	}
}
