#![allow(dead_code)]

use std::{
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	},
	time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use quire_core::{config::CoreConfig, storage::MemoryStore, Controller, CoreContext, Snapshot, Subscription};
use quire_event::{Kind, Record, Tag, Timestamp};
use quire_query::{MemorySource, RelayUrl};
use quire_unlock::{Decrypt, DecryptCapability, DecryptError};
use tokio::time::sleep;

pub const AUTHOR: &str = "b1576eb99a4774158a32fc5e190afa3ded4da19f51fbe0c7f4b1f5b5d2aa4e4a";
pub const OTHER_AUTHOR: &str = "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d";

pub fn local_relay() -> RelayUrl {
	"ws://localhost:10547".parse().expect("valid relay url")
}

pub fn remote_relay() -> RelayUrl {
	"wss://relay.example.com".parse().expect("valid relay url")
}

pub fn hex_id(n: u64) -> String {
	format!("{n:064x}")
}

pub fn record(n: u64, kind: Kind, created_at: u64, tags: Vec<Tag>) -> Record {
	Record {
		id: hex_id(n),
		kind,
		created_at: Timestamp(created_at),
		tags,
		content: String::new(),
		author: AUTHOR.to_string(),
	}
}

pub fn e(n: u64) -> Tag {
	Tag::new(["e", &hex_id(n)])
}

pub fn entry_id(n: u64) -> String {
	format!("e:{}", hex_id(n))
}

pub struct Harness {
	pub source: Arc<MemorySource>,
	pub store: Arc<MemoryStore>,
	pub ctx: Arc<CoreContext>,
	pub local: RelayUrl,
	pub remote: RelayUrl,
}

impl Harness {
	pub fn new() -> Self {
		Self::with_capability(DecryptCapability::Unavailable)
	}

	pub fn with_capability(capability: DecryptCapability) -> Self {
		Self::build(vec![local_relay(), remote_relay()], capability)
	}

	pub fn without_relays() -> Self {
		Self::build(vec![], DecryptCapability::Unavailable)
	}

	fn build(relays: Vec<RelayUrl>, capability: DecryptCapability) -> Self {
		let source = Arc::new(MemorySource::new());
		let store = Arc::new(MemoryStore::new());

		let mut config = CoreConfig::default_with_dir("unused");
		config.relays = relays;

		let ctx = CoreContext::new(&config, source.clone(), store.clone(), capability);

		Self {
			source,
			store,
			ctx,
			local: local_relay(),
			remote: remote_relay(),
		}
	}
}

/// Keeps a copy of every snapshot a controller emits.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Snapshot>>>);

impl Recorder {
	pub fn attach(controller: &Controller) -> (Self, Subscription) {
		let recorder = Self::default();
		let sink = recorder.clone();
		let subscription = controller.subscribe(move |snapshot| sink.0.lock().push(snapshot.clone()));

		(recorder, subscription)
	}

	pub fn snapshots(&self) -> Vec<Snapshot> {
		self.0.lock().clone()
	}

	pub fn last(&self) -> Snapshot {
		self.0.lock().last().cloned().expect("at least the initial snapshot")
	}

	pub fn clear(&self) {
		self.0.lock().clear();
	}
}

/// Reverses the ciphertext, or refuses everything, optionally after a delay.
pub struct Reverse {
	works: bool,
	delay: Duration,
	pub calls: AtomicUsize,
}

impl Reverse {
	fn build(works: bool, delay: Duration) -> Arc<Self> {
		Arc::new(Self {
			works,
			delay,
			calls: AtomicUsize::new(0),
		})
	}

	pub fn working() -> Arc<Self> {
		Self::build(true, Duration::ZERO)
	}

	pub fn broken() -> Arc<Self> {
		Self::build(false, Duration::ZERO)
	}

	pub fn slow(delay: Duration) -> Arc<Self> {
		Self::build(true, delay)
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::Relaxed)
	}
}

#[async_trait]
impl Decrypt for Reverse {
	async fn decrypt(&self, _counterparty: &str, ciphertext: &str) -> Result<String, DecryptError> {
		self.calls.fetch_add(1, Ordering::Relaxed);
		if !self.delay.is_zero() {
			sleep(self.delay).await;
		}

		if self.works {
			Ok(ciphertext.chars().rev().collect())
		} else {
			Err(DecryptError::Failed("bad mac".to_string()))
		}
	}
}

/// What [`Reverse`] decrypts back into `rows`.
pub fn hidden(rows: &[Tag]) -> String {
	serde_json::to_string(&rows.iter().map(|tag| &tag.0).collect::<Vec<_>>())
		.expect("rows serialize")
		.chars()
		.rev()
		.collect()
}
