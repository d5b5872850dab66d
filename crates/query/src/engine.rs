use std::{collections::HashSet, fmt, time::Duration};

use futures::StreamExt;
use futures_concurrency::future::Join;
use quire_event::{Filter, Record};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, instrument, trace, warn};

use super::{partition, Error, RelayUrl, Source, SourceMessage};

const DEFAULT_LOCAL_TIMEOUT: Duration = Duration::from_millis(1200);
const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_millis(6000);

/// Invoked synchronously for every record the moment it arrives.
pub type OnRecord<'a> = &'a (dyn Fn(&Record) + Send + Sync);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
	pub local_timeout: Duration,
	pub remote_timeout: Duration,
}

impl Default for QueryOptions {
	fn default() -> Self {
		Self {
			local_timeout: DEFAULT_LOCAL_TIMEOUT,
			remote_timeout: DEFAULT_REMOTE_TIMEOUT,
		}
	}
}

#[derive(Debug, Clone, Copy)]
enum Subset {
	Local,
	Remote,
}

impl fmt::Display for Subset {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Local => "local",
			Self::Remote => "remote",
		})
	}
}

/// Races the local and remote relay subsets for `filter` and returns the union of
/// everything they delivered, deduplicated by record id.
///
/// Each subset completes on its own end of stream, subscription error, disconnect or
/// timeout; none of those fail the query. A single failing relay does not end its subset.
/// The only error is having no relays to ask.
#[instrument(skip_all, fields(relays = relays.len(), kinds = ?filter.kinds, since = ?filter.since))]
pub async fn query(
	source: &dyn Source,
	relays: &[RelayUrl],
	filter: &Filter,
	options: QueryOptions,
	on_record: Option<OnRecord<'_>>,
) -> Result<Vec<Record>, Error> {
	if relays.is_empty() {
		return Err(Error::NoRelays);
	}

	let (local, remote) = partition(relays);

	let (local_records, remote_records) = (
		drain_subset(
			Subset::Local,
			source,
			&local,
			filter,
			options.local_timeout,
			on_record,
		),
		drain_subset(
			Subset::Remote,
			source,
			&remote,
			filter,
			options.remote_timeout,
			on_record,
		),
	)
		.join()
		.await;

	let mut seen = HashSet::with_capacity(local_records.len() + remote_records.len());

	let records = local_records
		.into_iter()
		.chain(remote_records)
		.filter(|record| seen.insert(record.id.clone()))
		.collect::<Vec<_>>();

	debug!(records = records.len(), "Query finished;");

	Ok(records)
}

async fn drain_subset(
	subset: Subset,
	source: &dyn Source,
	relays: &[RelayUrl],
	filter: &Filter,
	timeout: Duration,
	on_record: Option<OnRecord<'_>>,
) -> Vec<Record> {
	if relays.is_empty() {
		return vec![];
	}

	let deadline = Instant::now() + timeout;

	let mut stream = match timeout_at(deadline, source.subscribe(relays, filter)).await {
		Ok(Ok(stream)) => stream,
		Ok(Err(e)) => {
			warn!(%subset, %e, "Failed to subscribe, treating subset as complete;");
			return vec![];
		}
		Err(_) => {
			debug!(%subset, "Timed out opening subscription;");
			return vec![];
		}
	};

	let mut records = Vec::new();

	loop {
		match timeout_at(deadline, stream.next()).await {
			Ok(Some(Ok(SourceMessage::Record(record)))) => {
				if !filter.matches(&record) {
					trace!(%subset, id = %record.id, "Dropped record outside of filter;");
					continue;
				}

				if let Some(on_record) = on_record {
					on_record(&record);
				}

				records.push(record);
			}
			Ok(Some(Ok(SourceMessage::RelayClosed { relay, error }))) => {
				warn!(%subset, %relay, %error, "Relay failed, waiting for the rest of the subset;");
			}
			Ok(Some(Ok(SourceMessage::EndOfStream))) => {
				trace!(%subset, "End of stream;");
				break;
			}
			Ok(Some(Err(e))) => {
				warn!(%subset, %e, "Subscription errored, treating subset as complete;");
				break;
			}
			Ok(None) => {
				debug!(%subset, "Subscription closed without end of stream;");
				break;
			}
			Err(_) => {
				debug!(%subset, ?timeout, "Subset timed out;");
				break;
			}
		}
	}

	records
}
