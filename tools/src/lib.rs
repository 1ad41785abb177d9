//! Tooling on top of the resource model: consistency checks, parallel batch
//! scans over a directory, dumps and selector-driven edits.

pub mod batch;
pub mod check;
pub mod config;
pub mod dump;
pub mod edit;
pub mod formats;
