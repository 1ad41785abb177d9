//! ITM items.
//!
//! Abilities and the item itself own windows into one shared effect list. The
//! header's window holds the global (equipping) effects.

mod itm;

pub use itm::{
	ItemFlags,
	ItemFlagsExt,
	ItemLayout,
	ABILITY_FLAGS,
	HEADER_V1,
	HEADER_V11,
	HEADER_V20,
	ITEM,
	ITEM_FLAGS,
	SIGNATURE
};

use iek_core::{
	resolve,
	Context,
	EditSession,
	Engine,
	FormatError,
	Resource
};

pub fn resolve_item(bytes: &[u8], engine: Engine) -> Result<Resource, FormatError> {
	resolve(&ITEM, bytes, 0, &Context::new(engine))
}

pub fn open_item<S: Into<String>>(name: S, bytes: Vec<u8>, engine: Engine) -> Result<EditSession, FormatError> {
	EditSession::open(name, &ITEM, bytes, &Context::new(engine))
}

#[cfg(test)]
mod tests {
	use super::*;
	use byteorder::{
		ByteOrder,
		LE
	};
	use iek_core::{
		selector::Selector,
		NodeId,
		Structure,
		SubstructureKind
	};

	const ABILITY: u32 = 0x38;
	const EFFECT: u32 = 0x30;

	#[derive(Clone, Debug)]
	struct Item {
		version: [u8; 4],
		/// Effects per ability
		abilities: Vec<u32>,
		globals: u32,
		/// Store the global effects after the ability effects
		globals_last: bool,
	}

	impl Item {
		fn new(abilities: &[u32], globals: u32) -> Item {
			Item {
				version: *b"V1  ",
				abilities: abilities.to_vec(),
				globals: globals,
				globals_last: false,
			}
		}
	}

	fn build(it: &Item) -> Vec<u8> {
		let header = match &it.version {
			b"V1.1" => HEADER_V11,
			b"V2.0" => HEADER_V20,
			_ => HEADER_V1,
		};

		let mut out = vec![0; header as usize];
		out[..4].copy_from_slice(&SIGNATURE);
		out[4..8].copy_from_slice(&it.version);
		LE::write_u32(&mut out[0x08..], 1234);
		LE::write_u32(&mut out[0x18..], (ItemFlags::MOVABLE | ItemFlags::MAGICAL).bits());
		LE::write_u32(&mut out[0x34..], 500);
		out[0x3a..0x41].copy_from_slice(b"ISW1H01");

		let ability_effects: u32 = it.abilities.iter().sum();
		let (global_first, mut next) = if it.globals_last {
			(ability_effects, 0)
		} else {
			(0, it.globals)
		};

		let abilities_at = out.len();
		for n in it.abilities.iter() {
			let at = out.len();
			out.resize(at + ABILITY as usize, 0);
			LE::write_u16(&mut out[at + 0x1e..], *n as u16);
			LE::write_u16(&mut out[at + 0x20..], next as u16);
			LE::write_u16(&mut out[at + 0x22..], 3);
			next += n;
		}

		let effects_at = out.len();
		for i in 0..ability_effects + it.globals {
			let at = out.len();
			out.resize(at + EFFECT as usize, 0);
			LE::write_u16(&mut out[at..], 12 + i as u16);
			LE::write_u32(&mut out[at + 0x0e..], 60);
		}

		LE::write_u32(&mut out[0x64..], abilities_at as u32);
		LE::write_u16(&mut out[0x68..], it.abilities.len() as u16);
		LE::write_u32(&mut out[0x6a..], effects_at as u32);
		LE::write_u16(&mut out[0x6e..], global_first as u16);
		LE::write_u16(&mut out[0x70..], it.globals as u16);

		out
	}

	fn abilities(r: &Resource) -> Vec<NodeId> {
		r.root().records(SubstructureKind::Ability).map(Structure::id).collect()
	}

	fn window(r: &Resource, id: NodeId) -> (i64, i64) {
		let s = r.structure(id).unwrap();
		match s.kind() {
			Some(_) => (s.number("First effect index").unwrap(), s.number("# effects").unwrap()),
			None => (s.number("First global effect index").unwrap(), s.number("# global effects").unwrap()),
		}
	}

	fn reresolved(r: &Resource) -> Resource {
		resolve_item(&r.to_bytes(), r.context().engine).unwrap()
	}

	#[test]
	fn test_round_trip() {
		for globals_last in [false, true] {
			let it = Item {
				globals_last: globals_last,
				..Item::new(&[2, 0, 1], 2)
			};
			let bytes = build(&it);
			let r = resolve_item(&bytes, Engine::Bg2).unwrap();

			assert_eq!(r.to_bytes(), bytes);
			assert_eq!(r.root().records(SubstructureKind::Effect).count(), 5);
			assert_eq!(r.root().get("Effect 4").map(|f| f.size()), Some(EFFECT));
			r.verify().unwrap();
		}
	}

	#[test]
	fn test_versions() {
		let pst = build(&Item {
			version: *b"V1.1",
			..Item::new(&[1], 0)
		});
		let r = resolve_item(&pst, Engine::Pst).unwrap();
		assert!(r.root().get("Dialog").is_some());
		assert_eq!(r.root().records(SubstructureKind::Ability).next().map(Structure::size), Some(ABILITY));
		assert_eq!(r.to_bytes(), pst);

		match resolve_item(&pst, Engine::Bg2) {
			Err(FormatError::AmbiguousLayout { engine: Engine::Bg2, .. }) => {},
			other => panic!("unexpected {:?}", other.map(|r| r.size())),
		}

		let iwd2 = build(&Item {
			version: *b"V2.0",
			..Item::new(&[1], 1)
		});
		let r = resolve_item(&iwd2, Engine::Iwd2).unwrap();
		assert_eq!(r.root().get("Abilities offset").map(|f| f.offset), Some(0x64));
		assert_eq!(r.root().record_fields(SubstructureKind::Ability).next().map(|f| f.offset), Some(HEADER_V20));

		let mut bad = iwd2.clone();
		bad[4..8].copy_from_slice(b"V3.0");
		assert!(matches!(resolve_item(&bad, Engine::Iwd2), Err(FormatError::UnsupportedVersion { .. })));
	}

	#[test]
	fn test_insert_ability_effect() {
		let it = Item {
			globals_last: true,
			..Item::new(&[2, 1], 2)
		};
		let mut r = resolve_item(&build(&it), Engine::Bg2).unwrap();
		let root = r.root_id();
		let ids = abilities(&r);
		let effects = r.root().number("Effects offset").unwrap() as u32;

		let id = r.insert(ids[0], SubstructureKind::Effect, None).unwrap();
		assert_eq!(r.node(id).unwrap().offset, effects + 2 * EFFECT);
		assert_eq!(window(&r, ids[0]), (0, 3));
		assert_eq!(window(&r, ids[1]), (3, 1));
		assert_eq!(window(&r, root), (4, 2));
		assert_eq!(r.root().records(SubstructureKind::Effect).count(), 6);

		r.verify().unwrap();
		assert_eq!(reresolved(&r).to_bytes(), r.to_bytes());
	}

	#[test]
	fn test_remove_global_effect() {
		let mut r = resolve_item(&build(&Item::new(&[1, 1], 2)), Engine::Bg2).unwrap();
		let root = r.root_id();
		let ids = abilities(&r);
		let global = r.instances(root, SubstructureKind::GlobalEffect).unwrap()[0];

		r.remove(root, global).unwrap();
		assert_eq!(window(&r, root), (0, 1));
		assert_eq!(window(&r, ids[0]), (1, 1));
		assert_eq!(window(&r, ids[1]), (2, 1));
		r.verify().unwrap();
		assert_eq!(reresolved(&r).to_bytes(), r.to_bytes());
	}

	#[test]
	fn test_remove_ability_releases_effects() {
		let it = Item {
			globals_last: true,
			..Item::new(&[2, 3], 1)
		};
		let bytes = build(&it);
		let mut r = resolve_item(&bytes, Engine::Bg2).unwrap();
		let root = r.root_id();
		let ids = abilities(&r);
		let effects = r.root().number("Effects offset").unwrap();

		r.remove(root, ids[0]).unwrap();
		assert_eq!(r.root().number("# abilities"), Some(1));
		assert_eq!(r.root().number("Effects offset"), Some(effects - ABILITY as i64));
		assert_eq!(r.root().records(SubstructureKind::Effect).count(), 4);
		assert_eq!(window(&r, ids[1]), (0, 3));
		assert_eq!(window(&r, root), (3, 1));
		assert_eq!(r.to_bytes().len(), bytes.len() - (ABILITY + 2 * EFFECT) as usize);
		r.verify().unwrap();
	}

	#[test]
	fn test_new_ability_gets_empty_window() {
		let it = Item {
			globals_last: true,
			..Item::new(&[1], 1)
		};
		let mut r = resolve_item(&build(&it), Engine::Bg2).unwrap();
		let root = r.root_id();

		let ability = r.insert(root, SubstructureKind::Ability, None).unwrap();
		assert_eq!(window(&r, ability), (2, 0));
		assert_eq!(r.node(ability).unwrap().name, "Ability 1");
		r.verify().unwrap();

		let effects = r.root().number("Effects offset").unwrap() as u32;
		let id = r.insert(ability, SubstructureKind::Effect, None).unwrap();
		assert_eq!(r.node(id).unwrap().offset, effects + 2 * EFFECT);
		assert_eq!(window(&r, ability), (2, 1));
		assert_eq!(r.instances(ability, SubstructureKind::Effect).unwrap(), vec![id]);
		r.verify().unwrap();
	}

	#[test]
	fn test_flags_and_selectors() {
		let r = resolve_item(&build(&Item::new(&[1, 2], 1)), Engine::Bg2).unwrap();
		assert_eq!(r.root().item_flags(), Some(ItemFlags::MOVABLE | ItemFlags::MAGICAL));
		let ids = abilities(&r);
		assert_eq!(r.structure(ids[0]).unwrap().item_flags(), None);

		let s: Selector = "Ability[1]/Effect[1]".parse().unwrap();
		assert_eq!(s.resolve(&r), Ok(r.instances(ids[1], SubstructureKind::Effect).unwrap()[1]));
	}

	#[test]
	fn test_session_edits() {
		let bytes = build(&Item::new(&[1], 1));
		let mut session = open_item("SW1H01.ITM", bytes, Engine::Bg2).unwrap();
		let root = session.resource().root_id();

		session.set_number(root, "Price", 750).unwrap();
		assert!(session.is_dirty());

		let mut saved = vec![];
		session.save(&mut saved).unwrap();
		assert_eq!(LE::read_u32(&saved[0x34..]), 750);
		assert!(!session.is_dirty());
	}
}
