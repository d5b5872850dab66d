use std::{sync::Arc, time::Duration};

use futures_concurrency::future::Join;
use quire_event::Record;
use quire_query::Ack;
use quire_unlock::DecryptCapability;
use tracing::{debug, info, instrument};

pub mod config;
pub mod context;
pub mod controller;
pub mod dataset;
pub mod hydration;
pub mod item;
pub mod reconcile;
pub mod storage;
pub mod watermark;

mod error;

pub use context::CoreContext;
pub use controller::{Controller, Phase, Snapshot, StartOptions, Subscription};
pub use error::Error;
pub use item::{ItemDetail, ReconciledItem, Visibility};

use dataset::{Articles, Bookmarks, Highlights, ReadingProgress};

/// One controller per data set, all sharing the same collaborators.
#[derive(Debug)]
pub struct Core {
	ctx: Arc<CoreContext>,
	pub bookmarks: Arc<Controller>,
	pub highlights: Arc<Controller>,
	pub reading_progress: Arc<Controller>,
	pub articles: Arc<Controller>,
}

impl Core {
	pub fn new(ctx: Arc<CoreContext>) -> Self {
		Self {
			bookmarks: Controller::new(Arc::clone(&ctx), Bookmarks),
			highlights: Controller::new(Arc::clone(&ctx), Highlights),
			reading_progress: Controller::new(Arc::clone(&ctx), ReadingProgress),
			articles: Controller::new(Arc::clone(&ctx), Articles),
			ctx,
		}
	}

	#[must_use]
	pub fn controllers(&self) -> [&Arc<Controller>; 4] {
		[
			&self.bookmarks,
			&self.highlights,
			&self.reading_progress,
			&self.articles,
		]
	}

	#[must_use]
	pub fn controller(&self, name: &str) -> Option<&Arc<Controller>> {
		self.controllers()
			.into_iter()
			.find(|controller| controller.name() == name)
	}

	/// Starts every data set for `subject` concurrently, returning the first error.
	#[instrument(skip(self))]
	pub async fn start_all(&self, subject: &str, force: bool) -> Result<(), Error> {
		self.controllers()
			.map(|controller| controller.start(StartOptions::new(subject).force(force)))
			.join()
			.await
			.into_iter()
			.collect()
	}

	/// Resets every data set and evicts the decrypt outcomes of the records they dropped.
	pub fn reset_all(&self) {
		for controller in self.controllers() {
			controller.reset();
		}

		self.ctx.unlock.clear();
	}

	/// Installs a capability on the shared unlock pipeline and retries every locked record.
	pub fn set_decrypt_capability(&self, capability: DecryptCapability) {
		self.ctx.unlock.set_capability(capability);

		for controller in self.controllers() {
			controller.retry_locked();
		}
	}

	/// Publishes `record` to the configured relays and reconciles it locally right away,
	/// without waiting for a relay to echo it back.
	#[instrument(skip_all, fields(id = %record.id, kind = %record.kind))]
	pub async fn publish(&self, record: &Record, deadline: Duration) -> Result<Vec<Ack>, Error> {
		let acks = quire_query::publish(&*self.ctx.source, &self.ctx.relays, record, deadline).await?;

		let accepted = acks.iter().filter(|ack| ack.result.is_ok()).count();
		info!(accepted, relays = acks.len(), "Published record;");

		for controller in self.controllers() {
			if controller.ingest(record) {
				debug!(dataset = controller.name(), "Ingested published record;");
			}
		}

		Ok(acks)
	}
}
