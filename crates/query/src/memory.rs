//! A [`Source`] backed by per relay record lists, with optional delivery delays and
//! scripted completions. Used for fixture replay and by tests.

use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicBool, AtomicUsize, Ordering},
		Arc,
	},
	time::Duration,
};

use async_channel as chan;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use quire_event::{Filter, Record};
use tokio::{
	spawn,
	time::{sleep_until, Instant},
};
use tracing::trace;

use super::{Ack, RecordStream, RelayUrl, Source, SourceError, SourceMessage};

/// How a relay ends a subscription once its records are delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Completion {
	#[default]
	EndOfStream,
	/// Drops the connection without an end of stream.
	Disconnect,
	/// Closes this relay with a transport error while the others keep streaming.
	Error(String),
	/// Never finishes.
	Hang,
}

#[derive(Debug, Clone, Default)]
struct RelayState {
	records: Vec<(Duration, Record)>,
	completion: Completion,
}

#[derive(Debug, Default)]
pub struct MemorySource {
	relays: RwLock<HashMap<RelayUrl, RelayState>>,
	subscriptions: Mutex<Vec<(Vec<RelayUrl>, Filter)>>,
	refuse_subscriptions: AtomicBool,
}

impl MemorySource {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, relay: &RelayUrl, record: Record) {
		self.insert_delayed(relay, record, Duration::ZERO);
	}

	/// Stores `record` on `relay`, delivered `delay` after each subscription opens.
	pub fn insert_delayed(&self, relay: &RelayUrl, record: Record, delay: Duration) {
		let mut relays = self.relays.write();
		let records = &mut relays.entry(relay.clone()).or_default().records;
		records.push((delay, record));
		records.sort_by_key(|(delay, _)| *delay);
	}

	pub fn set_completion(&self, relay: &RelayUrl, completion: Completion) {
		self.relays
			.write()
			.entry(relay.clone())
			.or_default()
			.completion = completion;
	}

	/// Makes every following `subscribe` call fail.
	pub fn refuse_subscriptions(&self, refuse: bool) {
		self.refuse_subscriptions.store(refuse, Ordering::Release);
	}

	/// Every `(relays, filter)` pair subscribed so far.
	pub fn subscriptions(&self) -> Vec<(Vec<RelayUrl>, Filter)> {
		self.subscriptions.lock().clone()
	}

	pub fn records(&self, relay: &RelayUrl) -> Vec<Record> {
		self.relays
			.read()
			.get(relay)
			.map(|state| state.records.iter().map(|(_, r)| r.clone()).collect())
			.unwrap_or_default()
	}
}

#[async_trait]
impl Source for MemorySource {
	async fn subscribe(
		&self,
		relays: &[RelayUrl],
		filter: &Filter,
	) -> Result<RecordStream, SourceError> {
		self.subscriptions
			.lock()
			.push((relays.to_vec(), filter.clone()));

		if self.refuse_subscriptions.load(Ordering::Acquire) {
			return Err(SourceError::Transport("subscriptions refused".to_string()));
		}

		let (tx, rx) = chan::unbounded();
		let pending_end = Arc::new(AtomicUsize::new(relays.len()));
		let opened_at = Instant::now();

		for relay in relays {
			let state = self.relays.read().get(relay).cloned().unwrap_or_default();
			let filter = filter.clone();
			let tx = tx.clone();
			let pending_end = Arc::clone(&pending_end);
			let relay = relay.clone();

			spawn(async move {
				for (delay, record) in state.records {
					if !filter.matches(&record) {
						continue;
					}

					sleep_until(opened_at + delay).await;

					trace!(%relay, id = %record.id, "Delivering record;");

					if tx.send(Ok(SourceMessage::Record(record))).await.is_err() {
						return;
					}
				}

				let finished = match state.completion {
					Completion::EndOfStream => true,
					Completion::Error(reason) => {
						let closed = SourceMessage::RelayClosed {
							relay,
							error: SourceError::Transport(reason),
						};
						if tx.send(Ok(closed)).await.is_err() {
							return;
						}
						true
					}
					Completion::Disconnect => false,
					Completion::Hang => return std::future::pending().await,
				};

				// Failed relays count as finished; a disconnected one withholds the end of stream
				if finished && pending_end.fetch_sub(1, Ordering::AcqRel) == 1 {
					tx.send(Ok(SourceMessage::EndOfStream)).await.ok();
				}
			});
		}

		Ok(Box::pin(rx))
	}

	async fn publish(&self, relays: &[RelayUrl], record: &Record) -> Vec<Ack> {
		relays
			.iter()
			.map(|relay| {
				self.insert(relay, record.clone());

				Ack {
					relay: relay.clone(),
					result: Ok(()),
				}
			})
			.collect()
	}
}
