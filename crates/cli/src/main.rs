//! `trellis` command-line tool.
//!
//! Loads directory trees as workspace graphs to inspect their checksums and
//! to measure how much an incremental sync between two versions transfers.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use trellis_broker::TrellisConfig;
use trellis_graph::SolutionNode;
use trellis_worker::TaskClass;

mod commands;
mod loader;
#[cfg(test)]
mod tests;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(about = "Checksum and diff content-addressed workspace snapshots")]
struct Args {
	/// Configuration file (TOML)
	#[arg(short, long, value_name = "PATH", global = true)]
	config: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long, global = true)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Print the checksum tree of a directory.
	Checksum {
		#[arg(value_name = "DIR")]
		dir: PathBuf,
	},
	/// Show which nodes a remote holding OLD must fetch to resolve NEW.
	Diff {
		#[arg(value_name = "OLD")]
		old: PathBuf,
		#[arg(value_name = "NEW")]
		new: PathBuf,
	},
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	let config = match &args.config {
		Some(path) => TrellisConfig::load(path)?,
		None => TrellisConfig::default(),
	};

	match args.command {
		Command::Checksum { dir } => {
			let solution = load(dir).await?;
			print!("{}", commands::render_tree(&solution));
		}
		Command::Diff { old, new } => {
			let (old, new) = tokio::try_join!(load(old), load(new))?;
			info!(old = %old.checksum().short(), new = %new.checksum().short(), "diff.start");
			let report = commands::diff(&old, &new, config.cache).await?;
			print!("{}", report.render());
		}
	}

	Ok(())
}

async fn load(dir: PathBuf) -> anyhow::Result<SolutionNode> {
	trellis_worker::spawn_blocking(TaskClass::IoBlocking, move || loader::load_solution(&dir))
		.await
		.context("loader task panicked")?
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_env("TRELLIS_LOG").unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("trellis=debug,info")
		} else {
			EnvFilter::new("trellis=info,warn")
		}
	});

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
