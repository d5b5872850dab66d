use std::{fmt, sync::Arc, time::Duration};

use quire_query::{QueryOptions, RelayUrl, Source};
use quire_unlock::{DecryptCapability, UnlockPipeline};

use super::{config::CoreConfig, hydration::Hydrator, storage::KeyValueStore, watermark::WatermarkStore};

/// Collaborators shared by every controller of one application instance.
///
/// Everything is injected; nothing here is global, so independent instances never observe
/// each other.
pub struct CoreContext {
	pub source: Arc<dyn Source>,
	pub relays: Vec<RelayUrl>,
	pub query_options: QueryOptions,
	pub hydration_window: Duration,
	pub unlock: Arc<UnlockPipeline>,
	pub watermarks: WatermarkStore,
}

impl CoreContext {
	pub fn new(
		config: &CoreConfig,
		source: Arc<dyn Source>,
		store: Arc<dyn KeyValueStore>,
		capability: DecryptCapability,
	) -> Arc<Self> {
		Arc::new(Self {
			source,
			relays: config.relays.clone(),
			query_options: config.query_options(),
			hydration_window: config.hydration_window(),
			unlock: Arc::new(UnlockPipeline::new(capability)),
			watermarks: WatermarkStore::new(store),
		})
	}

	#[must_use]
	pub fn hydrator(&self) -> Hydrator {
		Hydrator::new(
			Arc::clone(&self.source),
			self.relays.clone(),
			self.query_options,
		)
	}
}

impl fmt::Debug for CoreContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CoreContext")
			.field("relays", &self.relays)
			.field("query_options", &self.query_options)
			.field("hydration_window", &self.hydration_window)
			.field("unlock", &self.unlock)
			.finish_non_exhaustive()
	}
}
