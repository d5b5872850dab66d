use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use quire_event::{Filter, Record};

use super::RelayUrl;

/// What a subscription yields: records, then an explicit end of stored events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMessage {
	Record(Record),
	/// One relay of the subscription failed. The others keep streaming.
	RelayClosed { relay: RelayUrl, error: SourceError },
	EndOfStream,
}

pub type RecordStream = Pin<Box<dyn Stream<Item = Result<SourceMessage, SourceError>> + Send>>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
	#[error("timed out waiting for relay <relay='{0}'>")]
	Timeout(String),
	#[error("transport error: {0}")]
	Transport(String),
}

/// Per relay outcome of a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
	pub relay: RelayUrl,
	pub result: Result<(), SourceError>,
}

/// Transport capability: subscribe to and publish on a set of relays.
///
/// A stream that ends without [`SourceMessage::EndOfStream`] is a disconnect, and an `Err`
/// item fails the whole subscription. Failures of single relays are reported with
/// [`SourceMessage::RelayClosed`] instead.
#[async_trait]
pub trait Source: Send + Sync + 'static {
	async fn subscribe(
		&self,
		relays: &[RelayUrl],
		filter: &Filter,
	) -> Result<RecordStream, SourceError>;

	async fn publish(&self, relays: &[RelayUrl], record: &Record) -> Vec<Ack>;
}
