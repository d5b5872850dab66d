//! Per-dataset sync watermarks
//!
//! Each dataset keeps one JSON blob mapping subject keys to the newest `created_at` already
//! reconciled for that subject, so multiple identities never collide. Watermarks only move
//! forward; a stale one merely causes refetching.

use std::{collections::BTreeMap, fmt, sync::Arc};

use quire_event::Timestamp;
use quire_utils::error::degrade;
use tracing::debug;

use super::storage::{KeyValueStore, StorageError};

const KEY_PREFIX: &str = "quire.watermark.";

type Blob = BTreeMap<String, u64>;

#[derive(Clone)]
pub struct WatermarkStore {
	store: Arc<dyn KeyValueStore>,
}

impl fmt::Debug for WatermarkStore {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WatermarkStore").finish_non_exhaustive()
	}
}

impl WatermarkStore {
	pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
		Self { store }
	}

	/// Watermark for `subject` in `dataset`.
	///
	/// An unreadable blob is logged and treated as absent, which only costs a full refetch.
	pub fn get(&self, dataset: &str, subject: &str) -> Option<Timestamp> {
		degrade(self.load(dataset), "reading watermark", Blob::new)
			.get(subject)
			.copied()
			.map(Timestamp)
	}

	/// Moves the watermark to `timestamp` if it is newer than the stored one.
	///
	/// Returns whether anything was written.
	pub fn advance(
		&self,
		dataset: &str,
		subject: &str,
		timestamp: Timestamp,
	) -> Result<bool, StorageError> {
		// A corrupted blob is overwritten rather than blocking progress forever
		let mut blob = degrade(self.load(dataset), "overwriting watermark blob", Blob::new);

		match blob.get(subject) {
			Some(&current) if current >= timestamp.as_secs() => {
				debug!(dataset, subject, current, %timestamp, "Watermark already ahead;");
				Ok(false)
			}
			_ => {
				blob.insert(subject.to_string(), timestamp.as_secs());
				self.save(dataset, &blob)?;
				debug!(dataset, subject, %timestamp, "Advanced watermark;");
				Ok(true)
			}
		}
	}

	pub fn remove(&self, dataset: &str, subject: &str) -> Result<(), StorageError> {
		let mut blob = self.load(dataset)?;

		if blob.remove(subject).is_some() {
			if blob.is_empty() {
				self.store.remove(&key(dataset))?;
			} else {
				self.save(dataset, &blob)?;
			}
		}

		Ok(())
	}

	fn load(&self, dataset: &str) -> Result<Blob, StorageError> {
		let key = key(dataset);

		self.store.get(&key)?.map_or_else(
			|| Ok(Blob::new()),
			|raw| serde_json::from_str(&raw).map_err(|source| StorageError::Corrupted { key, source }),
		)
	}

	fn save(&self, dataset: &str, blob: &Blob) -> Result<(), StorageError> {
		let key = key(dataset);
		let raw =
			serde_json::to_string(blob).map_err(|source| StorageError::Encode { key: key.clone(), source })?;

		self.store.set(&key, raw)
	}
}

fn key(dataset: &str) -> String {
	format!("{KEY_PREFIX}{dataset}")
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::storage::MemoryStore;

	use pretty_assertions::assert_eq;

	const ALICE: &str = "alice";
	const BOB: &str = "bob";

	fn watermarks() -> (Arc<MemoryStore>, WatermarkStore) {
		let store = Arc::new(MemoryStore::new());
		(Arc::clone(&store), WatermarkStore::new(store))
	}

	#[test]
	fn only_moves_forward() {
		let (_, watermarks) = watermarks();

		assert_eq!(watermarks.get("bookmarks", ALICE), None);
		assert!(watermarks.advance("bookmarks", ALICE, Timestamp(200)).unwrap());
		assert!(!watermarks.advance("bookmarks", ALICE, Timestamp(100)).unwrap());
		assert!(!watermarks.advance("bookmarks", ALICE, Timestamp(200)).unwrap());

		assert_eq!(watermarks.get("bookmarks", ALICE), Some(Timestamp(200)));
	}

	#[test]
	fn subjects_and_datasets_are_independent() {
		let (store, watermarks) = watermarks();

		watermarks.advance("bookmarks", ALICE, Timestamp(10)).unwrap();
		watermarks.advance("bookmarks", BOB, Timestamp(20)).unwrap();
		watermarks.advance("highlights", ALICE, Timestamp(30)).unwrap();

		assert_eq!(watermarks.get("bookmarks", ALICE), Some(Timestamp(10)));
		assert_eq!(watermarks.get("bookmarks", BOB), Some(Timestamp(20)));
		assert_eq!(watermarks.get("highlights", ALICE), Some(Timestamp(30)));
		assert_eq!(
			store.get("quire.watermark.bookmarks").unwrap().as_deref(),
			Some(r#"{"alice":10,"bob":20}"#)
		);
	}

	#[test]
	fn remove_only_touches_one_subject() {
		let (store, watermarks) = watermarks();

		watermarks.advance("bookmarks", ALICE, Timestamp(10)).unwrap();
		watermarks.advance("bookmarks", BOB, Timestamp(20)).unwrap();

		watermarks.remove("bookmarks", ALICE).unwrap();
		assert_eq!(watermarks.get("bookmarks", ALICE), None);
		assert_eq!(watermarks.get("bookmarks", BOB), Some(Timestamp(20)));

		watermarks.remove("bookmarks", BOB).unwrap();
		assert_eq!(store.get("quire.watermark.bookmarks").unwrap(), None);
	}

	#[test]
	fn corrupted_blob_reads_as_absent_and_is_overwritten() {
		let (store, watermarks) = watermarks();
		store
			.set("quire.watermark.bookmarks", "{broken".to_string())
			.unwrap();

		assert_eq!(watermarks.get("bookmarks", ALICE), None);
		assert!(watermarks.advance("bookmarks", ALICE, Timestamp(5)).unwrap());
		assert_eq!(watermarks.get("bookmarks", ALICE), Some(Timestamp(5)));
	}
}
