use anyhow::{
	anyhow,
	Context as _,
	Result
};

use clap::{
	Parser,
	Subcommand
};

use log::{
	info,
	warn
};

use std::{
	fs,
	io::{
		self,
		Write
	},
	path::{
		Path,
		PathBuf
	},
	process::ExitCode,
	sync::atomic::Ordering
};

use iek_core::{
	DirectorySource,
	EditSession,
	Engine
};

use iek_tools::{
	batch::{
		Batch,
		Outcome,
		Query
	},
	config::Config,
	dump,
	edit
};

#[derive(Parser)]
#[command(name = "iek", version)]
#[command(about = "Inspect, check and edit Infinity Engine ARE and ITM resources")]
struct Cli {
	/// JSON settings file; command line options override it
	#[arg(long, global = true, value_name = "FILE")]
	config: Option<PathBuf>,

	/// Game the resources belong to (bg1, bg2, bgee, pst, iwd, iwd2)
	#[arg(long, global = true)]
	engine: Option<Engine>,

	/// Worker threads for batch commands
	#[arg(short = 'j', long, global = true)]
	threads: Option<usize>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Report gaps, overlaps, bad counts and pool windows
	Check {
		/// Resource files, or directories to scan
		#[arg(required = true)]
		paths: Vec<PathBuf>,

		/// Print one JSON document instead of text
		#[arg(long)]
		json: bool,
	},
	/// Print the field tree of one resource
	Dump {
		file: PathBuf,

		/// Only describe what covers this offset (decimal or 0x hex)
		#[arg(long, value_parser = parse_offset)]
		at: Option<u32>,
	},
	/// Find fields by name across resources
	Search {
		#[arg(required = true)]
		paths: Vec<PathBuf>,

		/// Case-insensitive part of the field name
		#[arg(long)]
		field: String,

		/// Only fields holding this number
		#[arg(long)]
		value: Option<i64>,
	},
	/// Insert a blank record
	Insert {
		file: PathBuf,

		/// Selector of the owning structure, e.g. "Container[0]"; empty for the root
		#[arg(long, default_value = "")]
		parent: String,

		/// Record kind, e.g. "Item" or "Open vertex"
		#[arg(long)]
		kind: String,

		/// Position among the parent's records of that kind; appends by default
		#[arg(long)]
		index: Option<u32>,

		/// Where to write the result; defaults to rewriting the input
		#[arg(short, long)]
		output: Option<PathBuf>,
	},
	/// Remove a record and everything it owns
	Remove {
		file: PathBuf,

		/// Selector of the record, e.g. "Door[1]"
		#[arg(long)]
		selector: String,

		#[arg(short, long)]
		output: Option<PathBuf>,
	},
}

fn parse_offset(s: &str) -> Result<u32, String> {
	let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
		Some(hex) => u32::from_str_radix(hex, 16),
		None => s.parse(),
	};
	parsed.map_err(|e| format!("{:?} is not an offset: {}", s, e))
}

fn config(cli: &Cli) -> Result<Config> {
	let mut config = match &cli.config {
		Some(path) => Config::load(path).with_context(|| format!("could not load {}", path.display()))?,
		None => Config::default(),
	};
	if let Some(engine) = cli.engine {
		config.engine = engine;
	}
	if let Some(threads) = cli.threads {
		config.threads = threads;
	}

	Ok(config)
}

/// Groups the resources named by `paths` by the directory they live in
fn sources(paths: &[PathBuf], config: &Config) -> Result<Vec<(DirectorySource, Vec<String>)>> {
	let mut out = vec![];
	for path in paths {
		if path.is_dir() {
			let source = DirectorySource::new(path);
			let names: Vec<String> = source.names()
				.with_context(|| format!("could not list {}", path.display()))?
				.into_iter()
				.filter(|n| config.wants(n))
				.collect();
			info!("{}: {} resources", path.display(), names.len());
			out.push((source, names));
		} else {
			let name = path.file_name()
				.and_then(|n| n.to_str())
				.ok_or_else(|| anyhow!("{} is not a file name", path.display()))?;
			let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
			out.push((DirectorySource::new(dir), vec![name.to_string()]));
		}
	}

	Ok(out)
}

fn batch(config: Config) -> Result<Batch> {
	let batch = Batch::new(config).context("could not start worker threads")?;
	let cancel = batch.cancel_flag();
	ctrlc::set_handler(move || {
		warn!("interrupted, finishing resources already started");
		cancel.store(true, Ordering::Relaxed);
	}).context("could not install the interrupt handler")?;

	Ok(batch)
}

fn check(paths: &[PathBuf], json: bool, config: Config) -> Result<ExitCode> {
	let max = config.max_findings;
	let groups = sources(paths, &config)?;
	let batch = batch(config)?;

	let mut outcomes = vec![];
	for (source, names) in groups.iter() {
		outcomes.extend(batch.check_all(source, names));
	}

	let failing = outcomes.iter().any(|o| match o {
		Outcome::Checked(report) => report.errors() > 0,
		Outcome::Failed { .. } => true,
		Outcome::Skipped { .. } => false,
	});

	let stdout = io::stdout();
	let mut out = stdout.lock();
	if json {
		serde_json::to_writer_pretty(&mut out, &outcomes)?;
		writeln!(out)?;
	} else {
		for outcome in outcomes.iter() {
			match outcome {
				Outcome::Checked(report) => {
					writeln!(out, "{} ({}): {} errors, {} warnings", report.name, report.format, report.errors(),
						report.warnings())?;
					let shown = if max == 0 { report.findings.len() } else { max };
					for finding in report.findings.iter().take(shown) {
						writeln!(out, "  {}", finding)?;
					}
					if report.findings.len() > shown {
						writeln!(out, "  ... {} more", report.findings.len() - shown)?;
					}
				},
				Outcome::Failed { name, error } => writeln!(out, "{}: failed: {}", name, error)?,
				Outcome::Skipped { name } => writeln!(out, "{}: skipped", name)?,
			}
		}
	}

	Ok(if failing { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn search(paths: &[PathBuf], query: Query, config: Config) -> Result<()> {
	let groups = sources(paths, &config)?;
	let batch = batch(config)?;

	let stdout = io::stdout();
	let mut out = stdout.lock();
	for (source, names) in groups.iter() {
		for hit in batch.search(source, names, &query) {
			writeln!(out, "{} {:#x} {} = {}", hit.name, hit.offset, hit.path, hit.value)?;
		}
	}

	Ok(())
}

fn read(file: &Path) -> Result<(String, Vec<u8>)> {
	let bytes = fs::read(file).with_context(|| format!("could not read {}", file.display()))?;
	let name = file.file_name()
		.map(|n| n.to_string_lossy().into_owned())
		.unwrap_or_else(|| file.display().to_string());

	Ok((name, bytes))
}

fn dump(file: &Path, at: Option<u32>, config: &Config) -> Result<()> {
	let (name, bytes) = read(file)?;
	let session = edit::open(&name, bytes, config)?;

	let stdout = io::stdout();
	let mut out = stdout.lock();
	match at {
		Some(offset) => dump::at(session.resource(), offset, &mut out)?,
		None => dump::tree(session.resource(), &mut out)?,
	}

	Ok(())
}

fn save(session: &mut EditSession, path: &Path) -> Result<()> {
	let mut file = fs::File::create(path).with_context(|| format!("could not create {}", path.display()))?;
	session.save(&mut file).with_context(|| format!("could not write {}", path.display()))?;
	info!("wrote {}", path.display());

	Ok(())
}

fn main() -> Result<ExitCode> {
	env_logger::init();

	let cli = Cli::parse();
	let config = config(&cli)?;

	match cli.command {
		Command::Check { paths, json } => return check(&paths, json, config),
		Command::Dump { file, at } => dump(&file, at, &config)?,
		Command::Search { paths, field, value } => {
			let query = Query {
				field: field,
				value: value,
			};
			search(&paths, query, config)?;
		},
		Command::Insert { file, parent, kind, index, output } => {
			let (name, bytes) = read(&file)?;
			let mut session = edit::open(&name, bytes, &config)?;
			edit::insert(&mut session, &parent, &kind, index)?;
			save(&mut session, output.as_deref().unwrap_or(file.as_path()))?;
		},
		Command::Remove { file, selector, output } => {
			let (name, bytes) = read(&file)?;
			let mut session = edit::open(&name, bytes, &config)?;
			edit::remove(&mut session, &selector)?;
			save(&mut session, output.as_deref().unwrap_or(file.as_path()))?;
		},
	}

	Ok(ExitCode::SUCCESS)
}
