use serde::{
	Deserialize,
	Serialize
};

use std::{
	fs,
	io,
	path::Path
};

use thiserror::Error;

use iek_core::{
	Context,
	Engine
};

use crate::formats::{
	extension,
	layouts
};

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("I/O error: {source}")]
	Io {
		#[from]
		source: io::Error,
	},
	#[error("malformed configuration: {0}")]
	Json(#[from] serde_json::Error),
}

/// Settings for batch runs. Every key is optional in the file.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
	pub engine: Engine,
	/// Worker threads; 0 lets rayon pick
	pub threads: usize,
	pub report_gaps: bool,
	/// Findings printed per resource, 0 for all
	pub max_findings: usize,
	/// Extensions a directory scan picks up, compared case-insensitively
	pub extensions: Vec<String>,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			engine: Engine::default(),
			threads: 0,
			report_gaps: true,
			max_findings: 50,
			extensions: layouts().iter().map(|l| extension(*l).to_string()).collect(),
		}
	}
}

impl Config {
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
		let text = fs::read_to_string(path)?;
		Ok(serde_json::from_str(&text)?)
	}

	pub fn context(&self) -> Context {
		Context::new(self.engine)
	}

	/// True if a directory scan should pick up `name`
	pub fn wants(&self, name: &str) -> bool {
		match Path::new(name).extension().and_then(|e| e.to_str()) {
			Some(ext) => self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)),
			None => false,
		}
	}
}
