//! Checking and searching many resources at once.
//!
//! Resources are independent, so each one is loaded, resolved and inspected on
//! its own rayon worker. A failure is recorded against its resource and the
//! batch carries on. The cancel flag is polled before each resource starts;
//! resources not yet started when it is raised come back as skipped.

use log::{
	debug,
	info,
	warn
};

use rayon::prelude::*;

use serde::Serialize;

use std::{
	io,
	sync::{
		atomic::{
			AtomicBool,
			Ordering
		},
		Arc
	}
};

use thiserror::Error;

use iek_core::{
	resolve,
	FormatError,
	Resource,
	ResourceSource,
	Structure
};

use crate::{
	check::{
		check,
		CheckOptions,
		Report
	},
	config::Config,
	formats::layout_for
};

#[derive(Debug, Error)]
pub enum LoadError {
	#[error("I/O error: {source}")]
	Io {
		#[from]
		source: io::Error,
	},
	#[error("no known format has signature {0:?}")]
	UnknownFormat(String),
	#[error(transparent)]
	Format(#[from] FormatError),
}

/// Reads `name` from `source` and resolves it with whichever layout its
/// signature selects
pub fn load<S: ResourceSource + ?Sized>(source: &S, name: &str, config: &Config) -> Result<Resource, LoadError> {
	let bytes = source.bytes(name)?;
	let layout = layout_for(&bytes).ok_or_else(|| {
		let signature = &bytes[..bytes.len().min(4)];
		LoadError::UnknownFormat(String::from_utf8_lossy(signature).into_owned())
	})?;

	Ok(resolve(layout, &bytes, 0, &config.context())?)
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
	Checked(Report),
	Failed {
		name: String,
		error: String,
	},
	Skipped {
		name: String,
	},
}

impl Outcome {
	pub fn name(&self) -> &str {
		match self {
			Outcome::Checked(report) => &report.name,
			Outcome::Failed { name, .. } | Outcome::Skipped { name } => name,
		}
	}
}

/// Leaf fields whose name contains `field` (ignoring case), optionally only
/// those holding `value`
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Query {
	pub field: String,
	pub value: Option<i64>,
}

impl Query {
	fn matches(&self, name: &str, value: Option<i64>) -> bool {
		name.to_ascii_lowercase().contains(&self.field.to_ascii_lowercase())
			&& self.value.map_or(true, |v| value == Some(v))
	}
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Hit {
	pub name: String,
	/// Field path from the resource root, e.g. `ARE/Door 1/Open vertex 0/X`
	pub path: String,
	pub offset: u32,
	pub value: String,
}

fn search_resource(name: &str, resource: &Resource, query: &Query) -> Vec<Hit> {
	fn walk(name: &str, s: &Structure, path: &str, query: &Query, out: &mut Vec<Hit>) {
		for field in s.children() {
			match field.as_structure() {
				Some(child) => walk(name, child, &format!("{}/{}", path, field.name), query, out),
				None => if query.matches(&field.name, field.value.number()) {
					out.push(Hit {
						name: name.to_string(),
						path: format!("{}/{}", path, field.name),
						offset: field.offset,
						value: field.value.to_string(),
					});
				},
			}
		}
	}

	let mut out = vec![];
	walk(name, resource.root(), resource.layout().name(), query, &mut out);
	out
}

pub struct Batch {
	config: Config,
	pool: rayon::ThreadPool,
	cancel: Arc<AtomicBool>,
}

impl Batch {
	pub fn new(config: Config) -> Result<Batch, rayon::ThreadPoolBuildError> {
		let pool = rayon::ThreadPoolBuilder::new()
			.num_threads(config.threads)
			.thread_name(|i| format!("iek-worker-{}", i))
			.build()?;
		debug!("batch pool with {} threads", pool.current_num_threads());

		Ok(Batch {
			config: config,
			pool: pool,
			cancel: Arc::new(AtomicBool::new(false)),
		})
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Flag that stops the batch when set; safe to raise from a signal handler
	pub fn cancel_flag(&self) -> Arc<AtomicBool> {
		Arc::clone(&self.cancel)
	}

	fn cancelled(&self) -> bool {
		self.cancel.load(Ordering::Relaxed)
	}

	/// Checks every named resource, in input order
	pub fn check_all<S: ResourceSource + Sync>(&self, source: &S, names: &[String]) -> Vec<Outcome> {
		let options = CheckOptions {
			report_gaps: self.config.report_gaps,
		};

		let outcomes: Vec<Outcome> = self.pool.install(|| names.par_iter()
			.map(|name| {
				if self.cancelled() {
					return Outcome::Skipped {
						name: name.clone(),
					};
				}

				match load(source, name, &self.config) {
					Ok(resource) => Outcome::Checked(Report {
						name: name.clone(),
						format: resource.layout().name(),
						findings: check(&resource, &options),
					}),
					Err(e) => {
						warn!("{}: {}", name, e);
						Outcome::Failed {
							name: name.clone(),
							error: e.to_string(),
						}
					},
				}
			})
			.collect());

		let failed = outcomes.iter().filter(|o| matches!(o, Outcome::Failed { .. })).count();
		let skipped = outcomes.iter().filter(|o| matches!(o, Outcome::Skipped { .. })).count();
		info!("checked {} resources: {} failed, {} skipped", outcomes.len(), failed, skipped);

		outcomes
	}

	/// Finds matching fields across every named resource. Resources that fail
	/// to load are logged and contribute no hits.
	pub fn search<S: ResourceSource + Sync>(&self, source: &S, names: &[String], query: &Query) -> Vec<Hit> {
		self.pool.install(|| names.par_iter()
			.filter(|_| !self.cancelled())
			.flat_map_iter(|name| match load(source, name, &self.config) {
				Ok(resource) => search_resource(name, &resource, query),
				Err(e) => {
					warn!("{}: {}", name, e);
					vec![]
				},
			})
			.collect())
	}
}
