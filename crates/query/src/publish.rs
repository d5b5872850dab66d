use std::time::Duration;

use quire_event::Record;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use super::{Ack, Error, RelayUrl, Source, SourceError};

/// Best-effort publish of `record` to every relay, bounded by `deadline`.
///
/// Relays that did not answer in time are reported with [`SourceError::Timeout`].
#[instrument(skip_all, fields(id = %record.id, relays = relays.len()))]
pub async fn publish(
	source: &dyn Source,
	relays: &[RelayUrl],
	record: &Record,
	deadline: Duration,
) -> Result<Vec<Ack>, Error> {
	if relays.is_empty() {
		return Err(Error::NoRelays);
	}

	let acks = timeout(deadline, source.publish(relays, record))
		.await
		.unwrap_or_else(|_| {
			relays
				.iter()
				.map(|relay| Ack {
					relay: relay.clone(),
					result: Err(SourceError::Timeout(relay.to_string())),
				})
				.collect()
		});

	for Ack { relay, result } in &acks {
		match result {
			Ok(()) => debug!(%relay, "Relay accepted record;"),
			Err(e) => warn!(%relay, %e, "Relay did not accept record;"),
		}
	}

	Ok(acks)
}
