use std::io;

use thiserror::Error;

use crate::{
	field::NodeId,
	kind::{
		Engine,
		SubstructureKind
	}
};

/// The resource cannot be read. Recoverable per resource: a batch reports it and
/// moves on.
#[derive(Debug, Error)]
pub enum FormatError {
	#[error("I/O error: {source}")]
	Io {
		#[from]
		source: io::Error,
	},
	#[error("bad signature: expected {expected:?}, found {found:?}")]
	Signature {
		expected: String,
		found: String,
	},
	#[error("unsupported {signature} version {version:?}")]
	UnsupportedVersion {
		signature: String,
		version: String,
	},
	#[error("{signature} {version} has no layout for engine {engine}")]
	AmbiguousLayout {
		signature: String,
		version: String,
		engine: Engine,
	},
	#[error("truncated at offset {offset:#x}: need {needed} bytes, {available} available")]
	Truncated {
		offset: u32,
		needed: u32,
		available: u32,
	},
	#[error("{kind} section at {offset:#x} ({length} bytes) runs past the end of the resource")]
	SectionOutOfBounds {
		kind: SubstructureKind,
		offset: u32,
		length: u64,
	},
	#[error("{kind} section length {length} is not a multiple of the record size {size}")]
	MisalignedSection {
		kind: SubstructureKind,
		length: u32,
		size: u32,
	},
	#[error("{kind} layout produced {actual} bytes, expected {expected}")]
	RecordSize {
		kind: SubstructureKind,
		expected: u32,
		actual: u32,
	},
	#[error("{format} resources have no {kind} records")]
	ForeignKind {
		format: &'static str,
		kind: SubstructureKind,
	},
	#[error("section refers to undeclared field {0:?}")]
	UndeclaredField(&'static str),
}

/// A mutation request that breaks the calling contract. The tree is untouched.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum InvalidMutation {
	#[error("no structure {0} in this resource")]
	UnknownNode(NodeId),
	#[error("{parent} has no {kind} section")]
	NoSection {
		parent: NodeId,
		kind: SubstructureKind,
	},
	#[error("{0} records are pooled and must be added or removed through their owner")]
	PooledKind(SubstructureKind),
	#[error("{instance} is not owned by {parent}")]
	NotOwned {
		parent: NodeId,
		instance: NodeId,
	},
	#[error("{0} sections cannot be inserted into or removed from")]
	NotInsertable(SubstructureKind),
	#[error("index {index} is past the end of a run of {count}")]
	IndexOutOfRange {
		index: u32,
		count: u32,
	},
	#[error("{0:?} is maintained by the section bookkeeping")]
	StructuralField(String),
	#[error("no field named {0:?}")]
	NoField(String),
	#[error("{0:?} is not a numeric field")]
	NotANumber(String),
	#[error("{value} does not fit in {field:?}")]
	ValueOutOfRange {
		field: String,
		value: i64,
	},
	#[error("resource was discarded after an invariant violation")]
	Poisoned,
}

/// The tree no longer satisfies its layout invariants. The in-memory resource
/// must be discarded and re-resolved from its last good bytes.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum InvariantViolation {
	#[error("offset {offset:#x} moved by {delta} leaves the 32-bit range")]
	OffsetRange {
		offset: u32,
		delta: i64,
	},
	#[error("{field:?} cannot hold {value}")]
	CountRange {
		field: String,
		value: i64,
	},
	#[error("field {0:?} is missing")]
	MissingField(String),
	#[error("{first} section overlaps {second} section at {offset:#x}")]
	Overlap {
		first: SubstructureKind,
		second: SubstructureKind,
		offset: u32,
	},
	#[error("{kind} count says {stored}, {live} records present")]
	CountMismatch {
		kind: SubstructureKind,
		stored: u32,
		live: u32,
	},
	#[error("{kind} slot of {owner} starts at {found}, expected {expected}")]
	Partition {
		kind: SubstructureKind,
		owner: NodeId,
		expected: u32,
		found: u32,
	},
	#[error("{kind} pool holds {live} records, owners account for {claimed}")]
	PoolTotal {
		kind: SubstructureKind,
		live: u32,
		claimed: u32,
	},
	#[error("{0:#x} lies inside a removed range")]
	Dangling(u32),
	#[error("could not lay out a blank {0} record")]
	Template(SubstructureKind),
	#[error("structure {0} went missing during a mutation")]
	LostNode(NodeId),
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum MutationError {
	#[error(transparent)]
	InvalidMutation(#[from] InvalidMutation),
	#[error("internal invariant violation: {0}")]
	InternalInvariantViolation(#[from] InvariantViolation),
}
