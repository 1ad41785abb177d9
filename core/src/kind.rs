use std::{
	fmt,
	str::FromStr
};

/// Game engine a resource was written for.
///
/// The same version string can encode different header layouts depending on
/// the engine, so resolvers receive it alongside the buffer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Engine {
	Bg1,
	Bg2,
	Bgee,
	Pst,
	Iwd,
	Iwd2,
}

impl Engine {
	pub const ALL: [Engine; 6] = [Engine::Bg1, Engine::Bg2, Engine::Bgee, Engine::Pst, Engine::Iwd,
		Engine::Iwd2];

	pub const fn name(self) -> &'static str {
		match self {
			Engine::Bg1 => "bg1",
			Engine::Bg2 => "bg2",
			Engine::Bgee => "bgee",
			Engine::Pst => "pst",
			Engine::Iwd => "iwd",
			Engine::Iwd2 => "iwd2",
		}
	}
}

impl Default for Engine {
	fn default() -> Self {
		Engine::Bg2
	}
}

impl fmt::Display for Engine {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for Engine {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Engine::ALL.iter()
			.copied()
			.find(|e| e.name().eq_ignore_ascii_case(s))
			.ok_or_else(|| format!("unknown engine {:?}", s))
	}
}

/// How the records of a kind are laid out
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Shape {
	/// Repeated records of a fixed byte size
	Fixed(u32),
	/// One opaque run of bytes whose length is stored in the header
	Blob,
}

/// Per-kind behavior looked up from [`SubstructureKind::info`]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KindInfo {
	pub name: &'static str,
	pub shape: Shape,
	/// Base kind of the shared pool records of this kind live in
	pub pool: Option<SubstructureKind>,
	pub signature: Option<[u8; 4]>,
}

impl KindInfo {
	const fn fixed(name: &'static str, size: u32) -> KindInfo {
		KindInfo {
			name: name,
			shape: Shape::Fixed(size),
			pool: None,
			signature: None,
		}
	}

	const fn blob(name: &'static str) -> KindInfo {
		KindInfo {
			name: name,
			shape: Shape::Blob,
			pool: None,
			signature: None,
		}
	}

	const fn pooled(self, pool: SubstructureKind) -> KindInfo {
		KindInfo {
			pool: Some(pool),
			..self
		}
	}

	const fn signed(self, signature: [u8; 4]) -> KindInfo {
		KindInfo {
			signature: Some(signature),
			..self
		}
	}
}

/// Every repeated substructure the supported formats know about.
///
/// Several kinds may share one pool (the door outline kinds all index into the
/// area's vertex list); in that case `info().pool` names the pool's base kind.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum SubstructureKind {
	Actor,
	EmbeddedCreature,
	Region,
	SpawnPoint,
	Entrance,
	Container,
	Item,
	Vertex,
	Ambient,
	Variable,
	ExploredBitmap,
	Door,
	OpenVertex,
	ClosedVertex,
	OpenImpededCell,
	ClosedImpededCell,
	Animation,
	TiledObject,
	OpenSearchSquare,
	ClosedSearchSquare,
	SongEntries,
	RestInterruption,
	AutomapNote,
	AutomapNotePst,
	ProjectileTrap,
	TrapEffect,
	Ability,
	Effect,
	GlobalEffect,
}

impl SubstructureKind {
	pub const ALL: [SubstructureKind; 29] = [
		SubstructureKind::Actor,
		SubstructureKind::EmbeddedCreature,
		SubstructureKind::Region,
		SubstructureKind::SpawnPoint,
		SubstructureKind::Entrance,
		SubstructureKind::Container,
		SubstructureKind::Item,
		SubstructureKind::Vertex,
		SubstructureKind::Ambient,
		SubstructureKind::Variable,
		SubstructureKind::ExploredBitmap,
		SubstructureKind::Door,
		SubstructureKind::OpenVertex,
		SubstructureKind::ClosedVertex,
		SubstructureKind::OpenImpededCell,
		SubstructureKind::ClosedImpededCell,
		SubstructureKind::Animation,
		SubstructureKind::TiledObject,
		SubstructureKind::OpenSearchSquare,
		SubstructureKind::ClosedSearchSquare,
		SubstructureKind::SongEntries,
		SubstructureKind::RestInterruption,
		SubstructureKind::AutomapNote,
		SubstructureKind::AutomapNotePst,
		SubstructureKind::ProjectileTrap,
		SubstructureKind::TrapEffect,
		SubstructureKind::Ability,
		SubstructureKind::Effect,
		SubstructureKind::GlobalEffect,
	];

	pub const fn info(self) -> KindInfo {
		use SubstructureKind::*;

		match self {
			Actor => KindInfo::fixed("Actor", 0x110),
			EmbeddedCreature => KindInfo::blob("Embedded creature"),
			Region => KindInfo::fixed("Region", 0xc4),
			SpawnPoint => KindInfo::fixed("Spawn point", 0xc8),
			Entrance => KindInfo::fixed("Entrance", 0x68),
			Container => KindInfo::fixed("Container", 0xc0),
			Item => KindInfo::fixed("Item", 0x14).pooled(Item),
			Vertex => KindInfo::fixed("Vertex", 4).pooled(Vertex),
			Ambient => KindInfo::fixed("Ambient", 0xd4),
			Variable => KindInfo::fixed("Variable", 0x54),
			ExploredBitmap => KindInfo::blob("Explored bitmap"),
			Door => KindInfo::fixed("Door", 0xc8),
			OpenVertex => KindInfo::fixed("Open vertex", 4).pooled(Vertex),
			ClosedVertex => KindInfo::fixed("Closed vertex", 4).pooled(Vertex),
			OpenImpededCell => KindInfo::fixed("Open impeded cell", 4).pooled(Vertex),
			ClosedImpededCell => KindInfo::fixed("Closed impeded cell", 4).pooled(Vertex),
			Animation => KindInfo::fixed("Animation", 0x4c),
			TiledObject => KindInfo::fixed("Tiled object", 0x6c),
			OpenSearchSquare => KindInfo::fixed("Open search square", 2),
			ClosedSearchSquare => KindInfo::fixed("Closed search square", 2),
			SongEntries => KindInfo::fixed("Song entries", 0x90),
			RestInterruption => KindInfo::fixed("Rest interruption", 0xe4),
			AutomapNote => KindInfo::fixed("Automap note", 0x34),
			AutomapNotePst => KindInfo::fixed("PST automap note", 0x214),
			ProjectileTrap => KindInfo::fixed("Projectile trap", 0x1c),
			TrapEffect => KindInfo::fixed("Trap effect", 0x108).signed(*b"EFF "),
			Ability => KindInfo::fixed("Ability", 0x38),
			Effect => KindInfo::fixed("Effect", 0x30).pooled(Effect),
			GlobalEffect => KindInfo::fixed("Global effect", 0x30).pooled(Effect),
		}
	}

	pub const fn name(self) -> &'static str {
		self.info().name
	}

	/// Fixed record size, or `None` for blob kinds
	pub const fn size(self) -> Option<u32> {
		match self.info().shape {
			Shape::Fixed(size) => Some(size),
			Shape::Blob => None,
		}
	}

	pub const fn pool(self) -> Option<SubstructureKind> {
		self.info().pool
	}

	/// True for the base kind of a shared pool (the kind its records are stored as)
	pub fn is_pool_base(self) -> bool {
		self.pool() == Some(self)
	}

	pub fn from_name(name: &str) -> Option<SubstructureKind> {
		let name = name.trim();
		SubstructureKind::ALL.iter()
			.copied()
			.find(|k| k.name().eq_ignore_ascii_case(name))
	}
}

impl fmt::Display for SubstructureKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}
