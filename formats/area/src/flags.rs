use bitflags::bitflags;

use iek_core::{
	Structure,
	SubstructureKind
};

bitflags! {
	/// Header "Area flags"
	pub struct AreaFlags: u32 {
		const SAVE_DISABLED = 1 << 0;
		const TUTORIAL = 1 << 1;
		const DEAD_MAGIC = 1 << 2;
		const DREAM = 1 << 3;
		const PLAYER1_DEATH_DOES_NOT_END_GAME = 1 << 4;
		const RESTING_NOT_ALLOWED = 1 << 5;
		const TRAVEL_NOT_ALLOWED = 1 << 6;
	}
}

bitflags! {
	/// Header "Location"
	pub struct Location: u16 {
		const OUTDOOR = 1 << 0;
		const DAY_NIGHT = 1 << 1;
		const WEATHER = 1 << 2;
		const CITY = 1 << 3;
		const FOREST = 1 << 4;
		const DUNGEON = 1 << 5;
		const EXTENDED_NIGHT = 1 << 6;
		const CAN_REST_INDOORS = 1 << 7;
	}
}

bitflags! {
	pub struct ContainerFlags: u32 {
		const LOCKED = 1 << 0;
		const DISABLE_IF_NO_OWNER = 1 << 1;
		const MAGICAL_LOCK = 1 << 2;
		const TRAP_RESETS = 1 << 3;
		const REMOVE_ONLY = 1 << 4;
		const DISABLED = 1 << 5;
	}
}

bitflags! {
	pub struct DoorFlags: u32 {
		const OPEN = 1 << 0;
		const LOCKED = 1 << 1;
		const RESET_TRAP = 1 << 2;
		const TRAP_DETECTABLE = 1 << 3;
		const BROKEN = 1 << 4;
		const CANT_CLOSE = 1 << 5;
		const LINKED = 1 << 6;
		const SECRET = 1 << 7;
		const FOUND = 1 << 8;
		const TRANSPARENT = 1 << 9;
		const KEY_REMOVED = 1 << 10;
		const SLIDE = 1 << 11;
	}
}

pub const AREA_FLAGS: &[&str] = &["Save not allowed", "Tutorial area", "Dead magic zone", "Dream",
	"Player1 death does not end the game", "Resting not allowed", "Travel not allowed"];

pub const LOCATION_FLAGS: &[&str] = &["Outdoor", "Day/night", "Weather", "City", "Forest", "Dungeon",
	"Extended night", "Can rest indoors"];

pub const ACTOR_FLAGS: &[&str] = &["CRE not attached", "Has seen party", "Invulnerable", "Override script name"];

pub const REGION_FLAGS: &[&str] = &["Invisible trap", "Reset trap", "Party required", "Detectable",
	"Enemies activate", "Tutorial trigger", "NPCs activate", "Silent trigger", "Deactivated",
	"Party only", "Alternative point", "Door closed"];

pub const CONTAINER_FLAGS: &[&str] = &["Locked", "Disable if no owner", "Magical lock", "Trap resets",
	"Remove only", "Disabled"];

pub const ITEM_FLAGS: &[&str] = &["Identified", "Unstealable", "Stolen", "Undroppable"];

pub const DOOR_FLAGS: &[&str] = &["Open", "Locked", "Reset trap", "Trap detectable", "Broken", "Can't close",
	"Linked", "Secret", "Found", "Transparent", "Key removed", "Slide"];

/// Names for the 24 hourly bits of an appearance schedule
pub const SCHEDULE: &[&str] = &["00:30", "01:30", "02:30", "03:30", "04:30", "05:30", "06:30", "07:30",
	"08:30", "09:30", "10:30", "11:30", "12:30", "13:30", "14:30", "15:30", "16:30", "17:30", "18:30",
	"19:30", "20:30", "21:30", "22:30", "23:30"];

fn bits(s: &Structure, name: &str) -> Option<u32> {
	s.number(name).map(|v| v as u32)
}

/// Typed views over the bitmask fields of an area tree
pub trait AreaFlagsExt {
	fn area_flags(&self) -> Option<AreaFlags>;
	fn location(&self) -> Option<Location>;
	fn container_flags(&self) -> Option<ContainerFlags>;
	fn door_flags(&self) -> Option<DoorFlags>;
}

impl AreaFlagsExt for Structure {
	fn area_flags(&self) -> Option<AreaFlags> {
		bits(self, "Area flags").map(AreaFlags::from_bits_truncate)
	}

	fn location(&self) -> Option<Location> {
		bits(self, "Location").map(|v| Location::from_bits_truncate(v as u16))
	}

	fn container_flags(&self) -> Option<ContainerFlags> {
		bits(self, "Flags").map(ContainerFlags::from_bits_truncate)
			.filter(|_| self.kind() == Some(SubstructureKind::Container))
	}

	fn door_flags(&self) -> Option<DoorFlags> {
		bits(self, "Flags").map(DoorFlags::from_bits_truncate)
			.filter(|_| self.kind() == Some(SubstructureKind::Door))
	}
}
