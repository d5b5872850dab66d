//! Per relay JSONL fixtures served through a [`MemorySource`].
//!
//! Every `<stem>.jsonl` file in the fixture directory is one relay. The stem names the relay
//! with a trailing `_<port>` standing in for the port separator, so `localhost_7777.jsonl` is
//! `ws://localhost:7777` and `relay.example.com.jsonl` is `wss://relay.example.com`.
//!
//! Each non-empty line holds either a record, or `{"delay_ms": 40, "record": {..}}` to delay
//! its delivery after a subscription opens. Lines starting with `#` are comments.

use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use quire_event::Record;
use quire_query::{MemorySource, RelayUrl};
use serde::Deserialize;
use tracing::{debug, warn};

const FIXTURE_EXTENSION: &str = "jsonl";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FixtureLine {
	Delayed { delay_ms: u64, record: Record },
	Plain(Record),
}

#[derive(Debug)]
pub struct Fixtures {
	pub source: MemorySource,
	pub relays: Vec<RelayUrl>,
	pub records: usize,
}

pub fn relay_for_stem(stem: &str) -> Result<RelayUrl> {
	let authority = match stem.rsplit_once('_') {
		Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
			format!("{host}:{port}")
		}
		_ => stem.to_string(),
	};
	let relay = format!("wss://{authority}")
		.parse::<RelayUrl>()
		.with_context(|| format!("fixture file name is not a relay: '{stem}'"))?;

	if relay.is_local() {
		return Ok(format!("ws://{authority}").parse()?);
	}

	Ok(relay)
}

pub fn load(dir: &Path) -> Result<Fixtures> {
	let entries =
		fs::read_dir(dir).with_context(|| format!("failed to read fixtures dir '{}'", dir.display()))?;

	let mut paths = entries
		.map(|entry| entry.map(|entry| entry.path()))
		.collect::<Result<Vec<_>, _>>()
		.with_context(|| format!("failed to list fixtures dir '{}'", dir.display()))?;
	paths.retain(|path| {
		path.extension()
			.is_some_and(|extension| extension == FIXTURE_EXTENSION)
	});
	paths.sort();

	if paths.is_empty() {
		bail!("no *.{FIXTURE_EXTENSION} fixtures in '{}'", dir.display());
	}

	let source = MemorySource::new();
	let mut relays = Vec::with_capacity(paths.len());
	let mut records = 0;

	for path in paths {
		let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
			warn!(path = %path.display(), "Skipping fixture with a non UTF-8 name;");
			continue;
		};
		let relay = relay_for_stem(stem)?;

		let contents = fs::read_to_string(&path)
			.with_context(|| format!("failed to read fixture '{}'", path.display()))?;

		for (number, line) in contents.lines().enumerate() {
			let line = line.trim();
			if line.is_empty() || line.starts_with('#') {
				continue;
			}

			match serde_json::from_str::<FixtureLine>(line) {
				Ok(FixtureLine::Plain(record)) => source.insert(&relay, record),
				Ok(FixtureLine::Delayed { delay_ms, record }) => {
					source.insert_delayed(&relay, record, Duration::from_millis(delay_ms));
				}
				Err(e) => {
					warn!(
						path = %path.display(),
						line = number + 1,
						?e,
						"Skipping malformed fixture line;"
					);
					continue;
				}
			}

			records += 1;
		}

		debug!(%relay, path = %path.display(), "Loaded fixture;");
		relays.push(relay);
	}

	Ok(Fixtures {
		source,
		relays,
		records,
	})
}
