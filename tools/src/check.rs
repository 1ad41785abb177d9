//! Read-only consistency checks over a resolved resource.
//!
//! Leaves are walked in offset order: bytes no field covers, and bytes kept
//! after the last one, are reported as gaps, fields starting inside the
//! previous one as overlaps. Records carrying their own signature are checked
//! against it, and the layout invariants are re-verified. Nothing here fails;
//! every problem becomes a [`Finding`].

use serde::Serialize;

use std::fmt;

use iek_core::{
	Resource,
	Value,
	TRAILING_BYTES
};

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	Warning,
	Error,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Finding {
	pub severity: Severity,
	pub offset: u32,
	pub message: String,
}

impl fmt::Display for Finding {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let level = match self.severity {
			Severity::Warning => "warning",
			Severity::Error => "error",
		};
		write!(f, "{} {:#x}: {}", level, self.offset, self.message)
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CheckOptions {
	pub report_gaps: bool,
}

impl Default for CheckOptions {
	fn default() -> Self {
		CheckOptions {
			report_gaps: true,
		}
	}
}

/// Everything found in one resource
#[derive(Clone, Debug, Serialize)]
pub struct Report {
	pub name: String,
	pub format: &'static str,
	pub findings: Vec<Finding>,
}

impl Report {
	pub fn errors(&self) -> usize {
		self.findings.iter().filter(|f| f.severity == Severity::Error).count()
	}

	pub fn warnings(&self) -> usize {
		self.findings.len() - self.errors()
	}
}

pub fn check(resource: &Resource, options: &CheckOptions) -> Vec<Finding> {
	let mut findings = vec![];
	layout(resource, options, &mut findings);
	signatures(resource, &mut findings);

	for d in resource.diagnostics() {
		findings.push(Finding {
			severity: Severity::Warning,
			offset: d.offset,
			message: format!("{}: {}", d.field, d.message),
		});
	}

	if let Err(violation) = resource.verify() {
		findings.push(Finding {
			severity: Severity::Error,
			offset: resource.base(),
			message: violation.to_string(),
		});
	}

	findings.sort_by_key(|f| (f.offset, f.severity));
	findings
}

fn layout(resource: &Resource, options: &CheckOptions, findings: &mut Vec<Finding>) {
	let mut covered = resource.base() as u64;
	let mut previous = "start of resource";

	for field in resource.flatten_sorted() {
		let offset = field.offset as u64;
		if offset > covered && options.report_gaps {
			findings.push(Finding {
				severity: Severity::Warning,
				offset: covered as u32,
				message: format!("{} unused bytes before {:?}", offset - covered, field.name),
			});
		} else if offset < covered {
			findings.push(Finding {
				severity: Severity::Error,
				offset: field.offset,
				message: format!("{:?} overlaps {:?}, which ends at {:#x}", field.name, previous, covered),
			});
		}

		if field.end() >= covered {
			covered = field.end();
			previous = &field.name;
		}
	}

	if let Some(tail) = resource.root().get(TRAILING_BYTES).filter(|_| options.report_gaps) {
		findings.push(Finding {
			severity: Severity::Warning,
			offset: tail.offset,
			message: format!("{} unused bytes after the last field", tail.size()),
		});
	}
}

fn signatures(resource: &Resource, findings: &mut Vec<Finding>) {
	for s in resource.structures() {
		let kind = match s.kind() {
			Some(kind) => kind,
			None => continue,
		};
		let expected = match kind.info().signature {
			Some(signature) => signature,
			None => continue,
		};

		let found = s.get("Signature");
		let matches = match found.map(|f| &f.value) {
			Some(Value::Text(bytes)) => bytes.as_slice() == expected,
			_ => false,
		};
		if !matches {
			let offset = found.map_or(0, |f| f.offset);
			findings.push(Finding {
				severity: Severity::Error,
				offset: offset,
				message: format!("{} does not start with {:?}", kind, String::from_utf8_lossy(&expected)),
			});
		}
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use iek_core::Engine;
	use iek_formats_area::resolve_area;
	use iek_formats_item::resolve_item;

	/// An item with one ability and one effect; `effects_gap` bytes separate
	/// the two runs, and a negative gap overlaps them
	pub(crate) fn item(effects_gap: i32) -> Vec<u8> {
		let abilities = 0x72;
		let effects = (abilities + 0x38 + effects_gap) as usize;

		let mut out = vec![0; effects + 0x30];
		out[..8].copy_from_slice(b"ITM V1  ");
		out[0x64..0x68].copy_from_slice(&(abilities as u32).to_le_bytes());
		out[0x68..0x6a].copy_from_slice(&1u16.to_le_bytes());
		out[0x6a..0x6e].copy_from_slice(&(effects as u32).to_le_bytes());
		let at = abilities as usize;
		out[at + 0x1e..at + 0x20].copy_from_slice(&1u16.to_le_bytes());
		out
	}

	/// An area holding one projectile trap with one trap effect signed `signature`
	fn trapped_area(signature: &[u8; 4]) -> Vec<u8> {
		let mut out = vec![0; 0x11c + 0x1c + 0x108];
		out[..8].copy_from_slice(b"AREAV1.0");
		out[0xcc..0xd0].copy_from_slice(&0x11cu32.to_le_bytes());
		out[0xd0..0xd4].copy_from_slice(&1u32.to_le_bytes());
		out[0x11c + 0x08..0x11c + 0x0c].copy_from_slice(&0x138u32.to_le_bytes());
		out[0x11c + 0x0c..0x11c + 0x0e].copy_from_slice(&0x108u16.to_le_bytes());
		out[0x138..0x13c].copy_from_slice(signature);
		out[0x13c..0x140].copy_from_slice(b"V2.0");
		out
	}

	#[test]
	fn test_clean() {
		let r = resolve_item(&item(0), Engine::Bg2).unwrap();
		assert_eq!(check(&r, &CheckOptions::default()), vec![]);

		let r = resolve_area(&trapped_area(b"EFF "), Engine::Bg2).unwrap();
		assert_eq!(check(&r, &CheckOptions::default()), vec![]);
	}

	#[test]
	fn test_gap() {
		let r = resolve_item(&item(4), Engine::Bg2).unwrap();
		let findings = check(&r, &CheckOptions::default());
		assert_eq!(findings.len(), 1);
		assert_eq!(findings[0].severity, Severity::Warning);
		assert_eq!(findings[0].offset, 0x72 + 0x38);
		assert!(findings[0].message.starts_with("4 unused bytes"));

		let quiet = CheckOptions {
			report_gaps: false,
		};
		assert!(check(&r, &quiet).is_empty());
	}

	#[test]
	fn test_trailing_bytes() {
		let mut bytes = item(0);
		bytes.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd]);
		let r = resolve_item(&bytes, Engine::Bg2).unwrap();

		assert_eq!(check(&r, &CheckOptions::default()), vec![Finding {
			severity: Severity::Warning,
			offset: 218,
			message: "4 unused bytes after the last field".to_string(),
		}]);
	}

	#[test]
	fn test_overlap() {
		let r = resolve_item(&item(-8), Engine::Bg2).unwrap();
		let findings = check(&r, &CheckOptions::default());
		assert!(findings.iter().all(|f| f.severity == Severity::Error));
		assert!(findings.iter().any(|f| f.offset == 0x72 + 0x30 && f.message.contains("overlaps")));
		// the run overlap is also an invariant violation
		assert!(findings.iter().any(|f| f.message.contains("section overlaps")));
	}

	#[test]
	fn test_bad_record_signature() {
		let r = resolve_area(&trapped_area(b"EFX "), Engine::Bg2).unwrap();
		let findings = check(&r, &CheckOptions::default());
		assert_eq!(findings, vec![Finding {
			severity: Severity::Error,
			offset: 0x138,
			message: "Trap effect does not start with \"EFF \"".to_string(),
		}]);
	}
}
