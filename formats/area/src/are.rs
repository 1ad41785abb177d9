use log::debug;

use iek_core::{
	Context,
	Declared,
	Engine,
	FieldReader,
	FormatError,
	Layout,
	NumberType,
	PoolRef,
	Prologue,
	Section,
	SubstructureKind
};

use crate::flags::{
	ACTOR_FLAGS,
	AREA_FLAGS,
	CONTAINER_FLAGS,
	DOOR_FLAGS,
	ITEM_FLAGS,
	LOCATION_FLAGS,
	REGION_FLAGS,
	SCHEDULE
};

pub const SIGNATURE: [u8; 4] = *b"AREA";

/// Header size of V1.0 areas
pub const HEADER_V10: u32 = 0x11c;
/// Header size of V9.1 (IWD2) areas
pub const HEADER_V91: u32 = 0x12c;

#[derive(Debug)]
pub struct AreaLayout;

pub static AREA: AreaLayout = AreaLayout;

/// The game-specific block at the end of the header
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Tail {
	Bg2,
	Pst,
	Plain,
}

use NumberType::{
	I16,
	I32,
	U8,
	U16,
	U32
};

fn rect(r: &mut FieldReader<'_>, prefix: &str) -> Result<(), FormatError> {
	for side in ["left", "top", "right", "bottom"] {
		r.number(&format!("{} bounding box {}", prefix, side), U16)?;
	}
	Ok(())
}

fn point(r: &mut FieldReader<'_>, prefix: &str) -> Result<(), FormatError> {
	r.number(&format!("{} X", prefix), U16)?;
	r.number(&format!("{} Y", prefix), U16)?;
	Ok(())
}

fn trap(r: &mut FieldReader<'_>) -> Result<(), FormatError> {
	r.number("Trap detection difficulty", U16)?;
	r.number("Trap removal difficulty", U16)?;
	r.number("Is trapped", U16)?;
	r.number("Trap detected", U16)?;
	point(r, "Trap launch")
}

impl AreaLayout {
	fn actor(&self, r: &mut FieldReader<'_>) -> Result<Declared, FormatError> {
		r.text("Name", 32)?;
		point(r, "Current")?;
		point(r, "Destination")?;
		r.bitmask("Flags", U32, ACTOR_FLAGS)?;
		r.number("Has been spawned", U16)?;
		r.number("First letter of CRE resref", U8)?;
		r.unused(1)?;
		r.number("Animation", U32)?;
		r.number("Orientation", U16)?;
		r.unused(2)?;
		r.number("Removal timer", I32)?;
		r.number("Movement restriction distance", U16)?;
		r.number("Movement restriction distance (object)", U16)?;
		r.bitmask("Appearance schedule", U32, SCHEDULE)?;
		r.number("Times talked to", U32)?;
		r.resref("Dialog", "DLG")?;
		for script in ["Override", "General", "Class", "Race", "Default", "Specific"] {
			r.resref(&format!("{} script", script), "BCS")?;
		}
		r.resref("Creature", "CRE")?;
		r.number("CRE offset", U32)?;
		r.number("CRE size", U32)?;
		r.unused(128)?;

		Ok(Declared::none()
			.section(Section::sized(SubstructureKind::EmbeddedCreature, "CRE offset", "CRE size")))
	}

	fn region(&self, r: &mut FieldReader<'_>) -> Result<Declared, FormatError> {
		r.text("Name", 32)?;
		r.number("Type", U16)?;
		rect(r, "Region")?;
		r.number("# vertices", U16)?;
		r.number("First vertex index", U32)?;
		r.number("Trigger value", U32)?;
		r.number("Cursor index", U32)?;
		r.resref("Destination area", "ARE")?;
		r.text("Entrance name", 32)?;
		r.bitmask("Flags", U32, REGION_FLAGS)?;
		r.strref("Information text")?;
		trap(r)?;
		r.resref("Key item", "ITM")?;
		r.resref("Region script", "BCS")?;
		point(r, "Alternative use point")?;
		r.unused(36)?;
		r.resref("Sound", "WAV")?;
		point(r, "Talk location")?;
		r.strref("Speaker name")?;
		r.resref("Dialog", "DLG")?;

		Ok(Declared::none()
			.pool_ref(PoolRef::new(SubstructureKind::Vertex, "First vertex index", "# vertices")))
	}

	fn spawn_point(&self, r: &mut FieldReader<'_>) -> Result<Declared, FormatError> {
		r.text("Name", 32)?;
		point(r, "Spawn point")?;
		for i in 1..=10 {
			r.resref(&format!("Creature {}", i), "CRE")?;
		}
		r.number("# creatures", U16)?;
		r.number("Base creature number to spawn", U16)?;
		r.number("Frequency", U16)?;
		r.number("Spawn method", U16)?;
		r.number("Actor removal timer", U32)?;
		r.number("Movement restriction distance", U16)?;
		r.number("Movement restriction distance (object)", U16)?;
		r.number("Maximum creatures to spawn", U16)?;
		r.number("Enabled", U16)?;
		r.bitmask("Appearance schedule", U32, SCHEDULE)?;
		r.number("Probability (day)", U16)?;
		r.number("Probability (night)", U16)?;
		r.unused(56)?;

		Ok(Declared::none())
	}

	fn entrance(&self, r: &mut FieldReader<'_>) -> Result<Declared, FormatError> {
		r.text("Name", 32)?;
		point(r, "Entrance")?;
		r.number("Orientation", U16)?;
		r.unused(66)?;

		Ok(Declared::none())
	}

	fn container(&self, r: &mut FieldReader<'_>) -> Result<Declared, FormatError> {
		r.text("Name", 32)?;
		point(r, "Location")?;
		r.number("Type", U16)?;
		r.number("Lock difficulty", U16)?;
		r.bitmask("Flags", U32, CONTAINER_FLAGS)?;
		trap(r)?;
		rect(r, "Container")?;
		r.number("First item index", U32)?;
		r.number("# items", U32)?;
		r.resref("Trap script", "BCS")?;
		r.number("First vertex index", U32)?;
		r.number("# vertices", U16)?;
		r.number("Trigger range", U16)?;
		r.text("Owner", 32)?;
		r.resref("Key item", "ITM")?;
		r.number("Break difficulty", U32)?;
		r.strref("Lockpick string")?;
		r.unused(56)?;

		Ok(Declared::none()
			.pool_ref(PoolRef::new(SubstructureKind::Item, "First item index", "# items"))
			.pool_ref(PoolRef::new(SubstructureKind::Vertex, "First vertex index", "# vertices")))
	}

	fn item(&self, r: &mut FieldReader<'_>) -> Result<Declared, FormatError> {
		r.resref("Item", "ITM")?;
		r.number("Expiration time", U16)?;
		for i in 1..=3 {
			r.number(&format!("Quantity/charges {}", i), U16)?;
		}
		r.bitmask("Flags", U32, ITEM_FLAGS)?;

		Ok(Declared::none())
	}

	fn ambient(&self, r: &mut FieldReader<'_>) -> Result<Declared, FormatError> {
		r.text("Name", 32)?;
		point(r, "Origin")?;
		r.number("Radius", U16)?;
		r.number("Height", U16)?;
		r.number("Pitch variance", U32)?;
		r.number("Volume variance", U16)?;
		r.number("Volume", U16)?;
		for i in 1..=10 {
			r.resref(&format!("Sound {}", i), "WAV")?;
		}
		r.number("# sounds", U16)?;
		r.unused(2)?;
		r.number("Base time", U32)?;
		r.number("Base time deviation", U32)?;
		r.bitmask("Appearance schedule", U32, SCHEDULE)?;
		r.number("Flags", U32)?;
		r.unused(64)?;

		Ok(Declared::none())
	}

	fn variable(&self, r: &mut FieldReader<'_>) -> Result<Declared, FormatError> {
		r.text("Name", 32)?;
		r.number("Type", U16)?;
		r.number("Resource type", U16)?;
		r.number("Dword value", U32)?;
		r.number("Int value", I32)?;
		r.raw("Double value", 8)?;
		r.text("Script name", 32)?;

		Ok(Declared::none())
	}

	fn door(&self, r: &mut FieldReader<'_>) -> Result<Declared, FormatError> {
		r.text("Name", 32)?;
		r.text("Door ID", 8)?;
		r.bitmask("Flags", U32, DOOR_FLAGS)?;
		r.number("First open vertex index", U32)?;
		r.number("# open vertices", U16)?;
		r.number("# closed vertices", U16)?;
		r.number("First closed vertex index", U32)?;
		rect(r, "Open")?;
		rect(r, "Closed")?;
		r.number("First open impeded cell index", U32)?;
		r.number("# open impeded cells", U16)?;
		r.number("# closed impeded cells", U16)?;
		r.number("First closed impeded cell index", U32)?;
		r.number("Hit points", U16)?;
		r.number("Armor class", U16)?;
		r.resref("Open sound", "WAV")?;
		r.resref("Close sound", "WAV")?;
		r.number("Cursor index", U32)?;
		trap(r)?;
		r.resref("Key item", "ITM")?;
		r.resref("Door script", "BCS")?;
		r.number("Detection difficulty", U32)?;
		r.number("Lock difficulty", U32)?;
		point(r, "Toggle point 1")?;
		point(r, "Toggle point 2")?;
		r.strref("Lockpick string")?;
		r.text("Travel trigger name", 24)?;
		r.strref("Dialog speaker name")?;
		r.resref("Dialog", "DLG")?;
		r.unused(8)?;

		Ok(Declared::none()
			.pool_ref(PoolRef::new(SubstructureKind::OpenVertex, "First open vertex index", "# open vertices"))
			.pool_ref(PoolRef::new(SubstructureKind::ClosedVertex, "First closed vertex index",
				"# closed vertices"))
			.pool_ref(PoolRef::new(SubstructureKind::OpenImpededCell, "First open impeded cell index",
				"# open impeded cells"))
			.pool_ref(PoolRef::new(SubstructureKind::ClosedImpededCell, "First closed impeded cell index",
				"# closed impeded cells")))
	}

	fn animation(&self, r: &mut FieldReader<'_>) -> Result<Declared, FormatError> {
		r.text("Name", 32)?;
		point(r, "Location")?;
		r.bitmask("Appearance schedule", U32, SCHEDULE)?;
		r.resref("Animation", "BAM")?;
		r.number("BAM sequence", U16)?;
		r.number("BAM frame", U16)?;
		r.number("Flags", U32)?;
		r.number("Height", I16)?;
		r.number("Transparency", U16)?;
		r.number("Starting frame", U16)?;
		r.number("Chance of looping", U8)?;
		r.number("Skip cycles", U8)?;
		r.resref("Palette", "BMP")?;
		r.unused(4)?;

		Ok(Declared::none())
	}

	fn tiled_object(&self, r: &mut FieldReader<'_>) -> Result<Declared, FormatError> {
		r.text("Name", 32)?;
		r.text("Tile ID", 8)?;
		r.number("Flags", U32)?;
		r.number("Open search squares offset", U32)?;
		r.number("# open search squares", U16)?;
		r.number("# closed search squares", U16)?;
		r.number("Closed search squares offset", U32)?;
		r.unused(52)?;

		Ok(Declared::none()
			.section(Section::counted(SubstructureKind::OpenSearchSquare, "Open search squares offset",
				"# open search squares"))
			.section(Section::counted(SubstructureKind::ClosedSearchSquare, "Closed search squares offset",
				"# closed search squares")))
	}

	fn song_entries(&self, r: &mut FieldReader<'_>) -> Result<Declared, FormatError> {
		for song in ["Day", "Night", "Victory", "Battle", "Defeat"] {
			r.number(&format!("{} song", song), U32)?;
		}
		for i in 1..=5 {
			r.number(&format!("Alternate music {}", i), U32)?;
		}
		for time in ["day", "night"] {
			r.resref(&format!("Main ambient ({}) 1", time), "WAV")?;
			r.resref(&format!("Main ambient ({}) 2", time), "WAV")?;
			r.number(&format!("Main ambient volume ({})", time), U32)?;
		}
		r.number("Reverb", U32)?;
		r.unused(60)?;

		Ok(Declared::none())
	}

	fn rest_interruption(&self, r: &mut FieldReader<'_>) -> Result<Declared, FormatError> {
		r.text("Name", 32)?;
		for i in 1..=10 {
			r.strref(&format!("Interruption text {}", i))?;
		}
		for i in 1..=10 {
			r.resref(&format!("Creature {}", i), "CRE")?;
		}
		r.number("# creatures", U16)?;
		r.number("Difficulty", U16)?;
		r.number("Removal time", U32)?;
		r.number("Movement restriction distance", U16)?;
		r.number("Movement restriction distance (object)", U16)?;
		r.number("Maximum creatures to spawn", U16)?;
		r.number("Enabled", U16)?;
		r.number("Probability (day)", U16)?;
		r.number("Probability (night)", U16)?;
		r.unused(56)?;

		Ok(Declared::none())
	}

	fn automap_note(&self, r: &mut FieldReader<'_>) -> Result<Declared, FormatError> {
		point(r, "Coordinate")?;
		r.strref("Text")?;
		r.number("Text location", U16)?;
		r.number("Colour", U16)?;
		r.number("Note ID", U32)?;
		r.unused(36)?;

		Ok(Declared::none())
	}

	fn automap_note_pst(&self, r: &mut FieldReader<'_>) -> Result<Declared, FormatError> {
		r.number("Coordinate X", U32)?;
		r.number("Coordinate Y", U32)?;
		r.text("Text", 500)?;
		r.number("Read only", U32)?;
		r.unused(20)?;

		Ok(Declared::none())
	}

	fn projectile_trap(&self, r: &mut FieldReader<'_>) -> Result<Declared, FormatError> {
		r.resref("Projectile", "PRO")?;
		r.number("Effect block offset", U32)?;
		r.number("Effect block size", U16)?;
		r.number("Missile ID", U16)?;
		r.number("Ticks until recast", U16)?;
		r.number("Triggers remaining", U16)?;
		point(r, "Location")?;
		r.number("Location Z", U16)?;
		r.number("Enemy-ally targeting", U8)?;
		r.number("Party member index", U8)?;

		Ok(Declared::none()
			.section(Section::sized(SubstructureKind::TrapEffect, "Effect block offset", "Effect block size")))
	}

	fn trap_effect(&self, r: &mut FieldReader<'_>) -> Result<Declared, FormatError> {
		r.text("Signature", 4)?;
		r.text("Version", 4)?;
		r.number("Opcode", U32)?;
		r.number("Target", U32)?;
		r.number("Power", U32)?;
		r.number("Parameter 1", U32)?;
		r.number("Parameter 2", U32)?;
		r.number("Timing mode", U16)?;
		r.unused(2)?;
		r.number("Duration", U32)?;
		r.number("Probability 1", U16)?;
		r.number("Probability 2", U16)?;
		r.resref("Resource", "")?;
		r.number("Dice thrown", U32)?;
		r.number("Dice sides", U32)?;
		r.number("Saving throw type", U32)?;
		r.number("Saving throw bonus", I32)?;
		r.raw("Effect body", 0xc8)?;

		Ok(Declared::none())
	}
}

impl Layout for AreaLayout {
	fn name(&self) -> &'static str {
		"ARE"
	}

	fn signature(&self) -> [u8; 4] {
		SIGNATURE
	}

	fn header(&self, r: &mut FieldReader<'_>, prologue: &Prologue, context: &Context)
		-> Result<Declared, FormatError>
	{
		let v91 = match &prologue.version {
			b"V1.0" => false,
			b"V9.1" => true,
			_ => return Err(prologue.unsupported()),
		};

		r.resref("Area WED", "WED")?;
		r.number("Last saved", U32)?;
		r.bitmask("Area flags", U32, AREA_FLAGS)?;
		for edge in ["North", "East", "South", "West"] {
			r.resref(&format!("{} area", edge), "ARE")?;
			r.number(&format!("{} flags", edge), U32)?;
		}
		r.bitmask("Location", U16, LOCATION_FLAGS)?;
		r.number("Rain probability", U16)?;
		r.number("Snow probability", U16)?;
		r.number("Fog probability", U16)?;
		r.number("Lightning probability", U16)?;
		r.number("Wind speed", U16)?;

		if v91 {
			r.number("Area difficulty 2", U8)?;
			r.number("Area difficulty 3", U8)?;
			r.unused(14)?;
		}

		r.number("Actors offset", U32)?;
		r.number("# actors", U16)?;
		r.number("# regions", U16)?;
		r.number("Regions offset", U32)?;
		r.number("Spawn points offset", U32)?;
		r.number("# spawn points", U32)?;
		r.number("Entrances offset", U32)?;
		r.number("# entrances", U32)?;
		r.number("Containers offset", U32)?;
		r.number("# containers", U16)?;
		r.number("# items", U16)?;
		r.number("Items offset", U32)?;
		r.number("Vertices offset", U32)?;
		r.number("# vertices", U16)?;
		r.number("# ambients", U16)?;
		r.number("Ambients offset", U32)?;
		r.number("Variables offset", U32)?;
		r.number("# variables", U32)?;
		r.number("Tiled object flags offset", U16)?;
		r.number("# tiled object flags", U16)?;
		r.resref("Area script", "BCS")?;
		r.number("Explored bitmap size", U32)?;
		r.number("Explored bitmap offset", U32)?;
		r.number("# doors", U32)?;
		r.number("Doors offset", U32)?;
		r.number("# animations", U32)?;
		r.number("Animations offset", U32)?;
		r.number("# tiled objects", U32)?;
		r.number("Tiled objects offset", U32)?;
		r.number("Song entries offset", U32)?;
		r.number("Rest interruptions offset", U32)?;

		let tail = match (v91, context.engine) {
			(false, Engine::Bg2) | (false, Engine::Bgee) => Tail::Bg2,
			(false, Engine::Pst) => Tail::Pst,
			_ => Tail::Plain,
		};
		debug!("ARE {} header tail for {}: {:?}", prologue.version_str(), context.engine, tail);

		let mut declared = Declared::none()
			.section(Section::counted(SubstructureKind::Actor, "Actors offset", "# actors"))
			.section(Section::counted(SubstructureKind::Region, "Regions offset", "# regions"))
			.section(Section::counted(SubstructureKind::SpawnPoint, "Spawn points offset", "# spawn points"))
			.section(Section::counted(SubstructureKind::Entrance, "Entrances offset", "# entrances"))
			.section(Section::counted(SubstructureKind::Container, "Containers offset", "# containers"))
			.section(Section::counted(SubstructureKind::Item, "Items offset", "# items"))
			.section(Section::counted(SubstructureKind::Vertex, "Vertices offset", "# vertices"))
			.section(Section::counted(SubstructureKind::Ambient, "Ambients offset", "# ambients"))
			.section(Section::counted(SubstructureKind::Variable, "Variables offset", "# variables"))
			.section(Section::sized(SubstructureKind::ExploredBitmap, "Explored bitmap offset",
				"Explored bitmap size"))
			.section(Section::counted(SubstructureKind::Door, "Doors offset", "# doors"))
			.section(Section::counted(SubstructureKind::Animation, "Animations offset", "# animations"))
			.section(Section::counted(SubstructureKind::TiledObject, "Tiled objects offset", "# tiled objects"))
			.section(Section::single(SubstructureKind::SongEntries, "Song entries offset"))
			.section(Section::single(SubstructureKind::RestInterruption, "Rest interruptions offset"));

		match tail {
			Tail::Bg2 => {
				r.number("Automap notes offset", U32)?;
				r.number("# automap notes", U32)?;
				r.number("Projectile traps offset", U32)?;
				r.number("# projectile traps", U32)?;
				r.resref("Rest movie (day)", "MVE")?;
				r.resref("Rest movie (night)", "MVE")?;
				r.unused(56)?;

				declared = declared
					.section(Section::counted(SubstructureKind::AutomapNote, "Automap notes offset",
						"# automap notes"))
					.section(Section::counted(SubstructureKind::ProjectileTrap, "Projectile traps offset",
						"# projectile traps"));
			},
			Tail::Pst => {
				r.raw("Unknown", 4)?;
				r.number("Automap notes offset", U32)?;
				r.number("# automap notes", U32)?;
				r.unused(76)?;

				declared = declared
					.section(Section::counted(SubstructureKind::AutomapNotePst, "Automap notes offset",
						"# automap notes"));
			},
			Tail::Plain => r.unused(88)?,
		}

		Ok(declared)
	}

	fn record(&self, kind: SubstructureKind, r: &mut FieldReader<'_>, _prologue: &Prologue, _context: &Context)
		-> Result<Declared, FormatError>
	{
		use SubstructureKind::*;

		match kind {
			Actor => self.actor(r),
			Region => self.region(r),
			SpawnPoint => self.spawn_point(r),
			Entrance => self.entrance(r),
			Container => self.container(r),
			Item => self.item(r),
			Vertex => {
				r.number("X", U16)?;
				r.number("Y", U16)?;
				Ok(Declared::none())
			},
			Ambient => self.ambient(r),
			Variable => self.variable(r),
			Door => self.door(r),
			Animation => self.animation(r),
			TiledObject => self.tiled_object(r),
			OpenSearchSquare | ClosedSearchSquare => {
				r.number("X", U8)?;
				r.number("Y", U8)?;
				Ok(Declared::none())
			},
			SongEntries => self.song_entries(r),
			RestInterruption => self.rest_interruption(r),
			AutomapNote => self.automap_note(r),
			AutomapNotePst => self.automap_note_pst(r),
			ProjectileTrap => self.projectile_trap(r),
			TrapEffect => self.trap_effect(r),
			_ => Err(FormatError::ForeignKind {
				format: "ARE",
				kind: kind,
			}),
		}
	}

	fn blank(&self, kind: SubstructureKind, size: u32) -> Vec<u8> {
		let mut bytes = vec![0; size as usize];
		if kind == SubstructureKind::TrapEffect {
			bytes[..8].copy_from_slice(b"EFF V2.0");
		}
		bytes
	}
}
