use bitflags::bitflags;

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
	Structure,
	SubstructureKind
};

pub const SIGNATURE: [u8; 4] = *b"ITM ";

pub const HEADER_V1: u32 = 0x72;
/// PST items carry dialog and talking item data
pub const HEADER_V11: u32 = 0x154;
pub const HEADER_V20: u32 = 0x82;

bitflags! {
	pub struct ItemFlags: u32 {
		const CRITICAL = 1 << 0;
		const TWO_HANDED = 1 << 1;
		const MOVABLE = 1 << 2;
		const DISPLAYABLE = 1 << 3;
		const CURSED = 1 << 4;
		const MAGICAL = 1 << 6;
		const LEFT_HANDED = 1 << 7;
		const SILVER = 1 << 8;
		const COLD_IRON = 1 << 9;
		const OFF_HANDED = 1 << 10;
		const CONVERSABLE = 1 << 11;
	}
}

pub const ITEM_FLAGS: &[&str] = &["Critical item", "Two-handed", "Movable", "Displayable", "Cursed",
	"Cannot scribe to spellbook", "Magical", "Left-handed", "Silver", "Cold iron", "Off-handed", "Conversable"];

pub const ABILITY_FLAGS: &[&str] = &["Add strength bonus", "Breakable", "Damage strength bonus",
	"THAC0 strength bonus"];

pub trait ItemFlagsExt {
	fn item_flags(&self) -> Option<ItemFlags>;
}

impl ItemFlagsExt for Structure {
	fn item_flags(&self) -> Option<ItemFlags> {
		self.number("Flags")
			.filter(|_| self.kind().is_none())
			.map(|v| ItemFlags::from_bits_truncate(v as u32))
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Version {
	V1,
	V11,
	V20,
}

#[derive(Debug)]
pub struct ItemLayout;

pub static ITEM: ItemLayout = ItemLayout;

use NumberType::{
	I32,
	U8,
	U16,
	U32
};

impl ItemLayout {
	fn version(&self, prologue: &Prologue, context: &Context) -> Result<Version, FormatError> {
		match &prologue.version {
			b"V1  " => Ok(Version::V1),
			b"V1.1" if context.engine == Engine::Pst => Ok(Version::V11),
			b"V1.1" => Err(FormatError::AmbiguousLayout {
				signature: prologue.signature_str().into_owned(),
				version: prologue.version_str().into_owned(),
				engine: context.engine,
			}),
			b"V2.0" => Ok(Version::V20),
			_ => Err(prologue.unsupported()),
		}
	}

	fn ability(&self, r: &mut FieldReader<'_>) -> Result<Declared, FormatError> {
		r.number("Attack type", U8)?;
		r.number("Identify required", U8)?;
		r.number("Location", U8)?;
		r.number("Alternative dice sides", U8)?;
		r.resref("Use icon", "BAM")?;
		r.number("Target type", U8)?;
		r.number("Target count", U8)?;
		r.number("Range", U16)?;
		r.number("Launcher required", U8)?;
		r.number("Alternative dice thrown", U8)?;
		r.number("Speed factor", U8)?;
		r.number("Alternative damage bonus", U8)?;
		r.number("THAC0 bonus", U16)?;
		r.number("Dice sides", U8)?;
		r.number("Primary type", U8)?;
		r.number("Dice thrown", U8)?;
		r.number("Secondary type", U8)?;
		r.number("Damage bonus", U16)?;
		r.number("Damage type", U16)?;
		r.number("# effects", U16)?;
		r.number("First effect index", U16)?;
		r.number("Charges", U16)?;
		r.number("Charge depletion", U16)?;
		r.bitmask("Flags", U32, ABILITY_FLAGS)?;
		r.number("Projectile animation", U16)?;
		for i in 1..=3 {
			r.number(&format!("Melee animation {}", i), U16)?;
		}
		r.number("Is arrow", U16)?;
		r.number("Is bolt", U16)?;
		r.number("Is bullet", U16)?;

		Ok(Declared::none()
			.pool_ref(PoolRef::new(SubstructureKind::Effect, "First effect index", "# effects")))
	}

	fn effect(&self, r: &mut FieldReader<'_>) -> Result<Declared, FormatError> {
		r.number("Opcode", U16)?;
		r.number("Target", U8)?;
		r.number("Power", U8)?;
		r.number("Parameter 1", U32)?;
		r.number("Parameter 2", U32)?;
		r.number("Timing mode", U8)?;
		r.number("Dispel/resistance", U8)?;
		r.number("Duration", U32)?;
		r.number("Probability 1", U8)?;
		r.number("Probability 2", U8)?;
		r.resref("Resource", "")?;
		r.number("Dice thrown", U32)?;
		r.number("Dice sides", U32)?;
		r.number("Saving throw type", U32)?;
		r.number("Saving throw bonus", I32)?;
		r.number("Special", U32)?;

		Ok(Declared::none())
	}
}

impl Layout for ItemLayout {
	fn name(&self) -> &'static str {
		"ITM"
	}

	fn signature(&self) -> [u8; 4] {
		SIGNATURE
	}

	fn header(&self, r: &mut FieldReader<'_>, prologue: &Prologue, context: &Context)
		-> Result<Declared, FormatError>
	{
		let version = self.version(prologue, context)?;
		debug!("ITM {} read as {:?}", prologue.version_str(), version);

		r.strref("Unidentified name")?;
		r.strref("Identified name")?;
		r.resref("Replacement item", "ITM")?;
		r.bitmask("Flags", U32, ITEM_FLAGS)?;
		r.number("Item type", U16)?;
		r.number("Usability", U32)?;
		r.text("Item animation", 2)?;
		r.number("Minimum level", U16)?;
		r.number("Minimum strength", U16)?;
		r.number("Minimum strength bonus", U8)?;
		r.number("Kit usability 1", U8)?;
		r.number("Minimum intelligence", U8)?;
		r.number("Kit usability 2", U8)?;
		r.number("Minimum dexterity", U8)?;
		r.number("Kit usability 3", U8)?;
		r.number("Minimum wisdom", U8)?;
		r.number("Kit usability 4", U8)?;
		r.number("Minimum constitution", U8)?;
		r.number("Weapon proficiency", U8)?;
		r.number("Minimum charisma", U16)?;
		r.number("Price", U32)?;
		r.number("Stack amount", U16)?;
		r.resref("Inventory icon", "BAM")?;
		r.number("Lore to identify", U16)?;
		r.resref("Ground icon", "BAM")?;
		r.number("Weight", U32)?;
		r.strref("Unidentified description")?;
		r.strref("Identified description")?;
		r.resref("Description icon", "BAM")?;
		r.number("Enchantment", U32)?;
		r.number("Abilities offset", U32)?;
		r.number("# abilities", U16)?;
		r.number("Effects offset", U32)?;
		r.number("First global effect index", U16)?;
		r.number("# global effects", U16)?;

		match version {
			Version::V1 => {},
			Version::V11 => {
				r.resref("Dialog", "DLG")?;
				r.strref("Talking item name")?;
				r.number("Weapon color", U16)?;
				r.unused(212)?;
			},
			Version::V20 => r.unused(16)?,
		}

		Ok(Declared::none()
			.section(Section::counted(SubstructureKind::Ability, "Abilities offset", "# abilities"))
			.section(Section::pooled(SubstructureKind::Effect, "Effects offset"))
			.pool_ref(PoolRef::new(SubstructureKind::GlobalEffect, "First global effect index",
				"# global effects")))
	}

	fn record(&self, kind: SubstructureKind, r: &mut FieldReader<'_>, _prologue: &Prologue, _context: &Context)
		-> Result<Declared, FormatError>
	{
		match kind {
			SubstructureKind::Ability => self.ability(r),
			SubstructureKind::Effect => self.effect(r),
			_ => Err(FormatError::ForeignKind {
				format: "ITM",
				kind: kind,
			}),
		}
	}
}
