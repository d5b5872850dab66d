use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use quire_core::{
	config::CoreConfig, storage::FileStore, Core, CoreContext, Phase, Snapshot, StartOptions,
	Visibility,
};
use quire_event::is_hex_id;
use quire_unlock::DecryptCapability;
use tokio::time::sleep;
use tracing::{error, info};

mod fixtures;

const STORE_DIR_NAME: &str = "store";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
	Human,
	Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DatasetArg {
	Bookmarks,
	Highlights,
	Progress,
	Articles,
}

impl DatasetArg {
	const fn name(self) -> &'static str {
		match self {
			Self::Bookmarks => "bookmarks",
			Self::Highlights => "highlights",
			Self::Progress => "reading_progress",
			Self::Articles => "articles",
		}
	}
}

#[derive(Parser, Debug)]
#[command(name = "quire", about = "Quire reconciliation core, replayed from fixtures")]
struct Cli {
	/// Path to the quire data directory
	#[arg(long, env = "QUIRE_DATA_DIR", default_value = ".quire")]
	data_dir: PathBuf,

	/// Output format
	#[arg(long, value_enum, default_value = "json")]
	format: OutputFormat,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Run one data set against per relay JSONL fixtures, printing every snapshot
	Replay(ReplayArgs),
	/// Drop the stored watermark of a subject
	Forget {
		#[arg(long)]
		subject: String,
		#[arg(long, value_enum, default_value = "bookmarks")]
		dataset: DatasetArg,
	},
	/// Print the effective configuration
	Config,
}

#[derive(Args, Debug)]
struct ReplayArgs {
	/// Directory holding one `<relay>.jsonl` file per relay
	#[arg(long)]
	fixtures: PathBuf,

	/// Hex public key whose data set is loaded
	#[arg(long)]
	subject: String,

	#[arg(long, value_enum, default_value = "bookmarks")]
	dataset: DatasetArg,

	/// Ignore the stored watermark and load everything
	#[arg(long, default_value_t = false)]
	force: bool,

	/// How long to keep running after loading so hydration and decryption can settle.
	/// Defaults to the remote timeout plus the hydration window.
	#[arg(long)]
	settle_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let config = CoreConfig::load_or_create(&cli.data_dir)
		.with_context(|| format!("failed to load config from '{}'", cli.data_dir.display()))?;

	quire_utils::logging::init(Some(config.logs_dir().as_path()), &config.log_level)?;

	match cli.command {
		Commands::Replay(args) => replay(config, args, cli.format).await,
		Commands::Forget { subject, dataset } => {
			let core = build_core(&config, Arc::new(quire_query::MemorySource::new()))?;
			controller(&core, dataset)?.forget_subject(&subject)?;
			info!(%subject, dataset = dataset.name(), "Forgot subject;");
			Ok(())
		}
		Commands::Config => {
			println!("{}", serde_json::to_string_pretty(&config)?);
			Ok(())
		}
	}
}

fn build_core(config: &CoreConfig, source: Arc<dyn quire_query::Source>) -> Result<Core> {
	let store = FileStore::new(config.data_dir.join(STORE_DIR_NAME))?;
	let ctx = CoreContext::new(config, source, Arc::new(store), DecryptCapability::Unavailable);

	Ok(Core::new(ctx))
}

fn controller(core: &Core, dataset: DatasetArg) -> Result<&Arc<quire_core::Controller>> {
	core.controller(dataset.name())
		.with_context(|| format!("unknown data set '{}'", dataset.name()))
}

async fn replay(mut config: CoreConfig, args: ReplayArgs, format: OutputFormat) -> Result<()> {
	if !is_hex_id(&args.subject) {
		bail!("subject must be a 64 character hex key: '{}'", args.subject);
	}

	let fixtures = fixtures::load(&args.fixtures)?;
	info!(
		relays = fixtures.relays.len(),
		records = fixtures.records,
		"Loaded fixtures;"
	);

	// Fixture relays replace the configured ones for this run only
	config.relays = fixtures.relays;
	let settle = Duration::from_millis(
		args.settle_ms
			.unwrap_or(config.remote_timeout_ms + config.hydration_batch_window_ms),
	);

	let core = build_core(&config, Arc::new(fixtures.source))?;
	let controller = controller(&core, args.dataset)?;

	let subscription = controller.subscribe(move |snapshot| print_snapshot(format, snapshot));

	controller
		.start(StartOptions::new(&args.subject).force(args.force))
		.await?;

	sleep(settle).await;
	subscription.unsubscribe();

	Ok(())
}

fn print_snapshot(format: OutputFormat, snapshot: &Snapshot) {
	match format {
		OutputFormat::Json => match serde_json::to_string(snapshot) {
			Ok(line) => println!("{line}"),
			Err(e) => error!(?e, revision = snapshot.revision, "Failed to encode snapshot;"),
		},
		OutputFormat::Human => {
			let phase = match snapshot.phase {
				Phase::Idle => "idle",
				Phase::Loading => "loading",
				Phase::Complete => "complete",
			};
			println!(
				"revision {} (generation {}, {phase}): {} items",
				snapshot.revision,
				snapshot.generation,
				snapshot.items.len()
			);

			for item in &snapshot.items {
				let visibility = match item.visibility {
					Visibility::Public => "public",
					Visibility::Confidential => "confidential",
				};
				let resolution = if item.is_complete() {
					"resolved"
				} else {
					"unresolved"
				};
				let at = i64::try_from(item.created_at.as_secs())
					.ok()
					.and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
					.map_or_else(|| item.created_at.to_string(), |at| at.to_rfc3339());
				println!(
					"  {} kind {} at {at} [{visibility}, {resolution}]",
					item.id, item.kind
				);
			}
		}
	}
}
