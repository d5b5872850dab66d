use std::{collections::HashMap, sync::Arc};

use parking_lot::{Mutex, RwLock};
use quire_event::{Record, Tag};
use tracing::{debug, instrument, trace, warn};

use super::{detect, Algorithm, DecryptCapability};

/// Plaintext recovered from a confidential record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unlocked {
	pub plaintext: String,
	/// Tag rows encoded in the plaintext; empty when it is not a JSON array of rows.
	pub hidden_tags: Vec<Tag>,
	pub algorithm: Algorithm,
}

impl Unlocked {
	fn parse(plaintext: String, algorithm: Algorithm) -> Self {
		let hidden_tags = serde_json::from_str::<Vec<Vec<String>>>(&plaintext)
			.map(|rows| {
				rows.into_iter()
					.filter(|row| !row.is_empty())
					.map(Tag)
					.collect()
			})
			.unwrap_or_else(|e| {
				debug!(%e, "Plaintext is not a list of tag rows;");
				vec![]
			});

		Self {
			plaintext,
			hidden_tags,
			algorithm,
		}
	}
}

#[derive(Debug, Clone)]
pub enum UnlockState {
	/// A decrypt call is in flight.
	Pending,
	/// No capability was available when the record was seen.
	Locked,
	/// Both algorithms failed; the record degrades to its public data.
	Failed,
	Unlocked(Arc<Unlocked>),
}

/// Decrypts confidential records once and caches the outcome per record id.
#[derive(Debug, Default)]
pub struct UnlockPipeline {
	capability: RwLock<DecryptCapability>,
	table: Mutex<HashMap<String, UnlockState>>,
}

impl UnlockPipeline {
	#[must_use]
	pub fn new(capability: DecryptCapability) -> Self {
		Self {
			capability: RwLock::new(capability),
			table: Mutex::default(),
		}
	}

	pub fn set_capability(&self, capability: DecryptCapability) {
		*self.capability.write() = capability;
	}

	#[must_use]
	pub fn state(&self, id: &str) -> Option<UnlockState> {
		self.table.lock().get(id).cloned()
	}

	#[must_use]
	pub fn unlocked(&self, id: &str) -> Option<Arc<Unlocked>> {
		match self.table.lock().get(id) {
			Some(UnlockState::Unlocked(unlocked)) => Some(Arc::clone(unlocked)),
			_ => None,
		}
	}

	#[must_use]
	pub fn is_locked(&self, id: &str) -> bool {
		matches!(self.table.lock().get(id), Some(UnlockState::Locked))
	}

	/// Decrypts `record` if it is confidential.
	///
	/// Returns the cached result for records that were already unlocked and `None` for
	/// public records, failures, and records already being decrypted. Never errors: a
	/// record that cannot be decrypted keeps only its public data.
	#[instrument(skip_all, fields(id = %record.id))]
	pub async fn maybe_decrypt(&self, record: &Record) -> Option<Arc<Unlocked>> {
		let marker = detect(record)?;

		let capability = {
			let mut table = self.table.lock();

			match table.get(&record.id) {
				Some(UnlockState::Unlocked(unlocked)) => return Some(Arc::clone(unlocked)),
				Some(UnlockState::Pending | UnlockState::Failed) => return None,
				Some(UnlockState::Locked) | None => {}
			}

			let capability = self.capability.read().clone();
			if !capability.is_available() {
				trace!(?marker, "No decrypt capability, keeping record locked;");
				table.insert(record.id.clone(), UnlockState::Locked);
				return None;
			}

			table.insert(record.id.clone(), UnlockState::Pending);
			capability
		};

		trace!(?marker, "Decrypting confidential record;");

		let (state, unlocked) = match capability.decrypt(&record.author, &record.content).await
		{
			Ok((plaintext, algorithm)) => {
				let unlocked = Arc::new(Unlocked::parse(plaintext, algorithm));
				debug!(
					?algorithm,
					hidden_tags = unlocked.hidden_tags.len(),
					"Unlocked confidential record;"
				);
				(UnlockState::Unlocked(Arc::clone(&unlocked)), Some(unlocked))
			}
			Err(e) => {
				warn!(?marker, %e, "Failed to decrypt confidential record, keeping public data only;");
				(UnlockState::Failed, None)
			}
		};

		self.table.lock().insert(record.id.clone(), state);

		unlocked
	}

	/// Drops every cached outcome, so records seen again are decrypted from scratch.
	pub fn clear(&self) {
		self.table.lock().clear();
	}
}
