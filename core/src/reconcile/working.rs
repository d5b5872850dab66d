use std::{cmp::Ordering, collections::HashMap};

use quire_event::{LogicalKey, Record};
use tracing::trace;

/// Newest known version of every logical thing a controller has seen.
#[derive(Debug, Default, Clone)]
pub struct WorkingSet {
	entries: HashMap<LogicalKey, Record>,
}

impl WorkingSet {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores `record` if it supersedes the entry under its logical key.
	///
	/// Returns whether the set changed, which is the only case where snapshots need to be
	/// derived again.
	pub fn reconcile_one(&mut self, record: &Record) -> bool {
		let key = record.logical_key();

		match self.entries.get(&key) {
			Some(current) if !record.supersedes(current) => {
				trace!(%key, id = %record.id, kept = %current.id, "Record is not newer;");
				false
			}
			_ => {
				trace!(%key, id = %record.id, "Reconciled record;");
				self.entries.insert(key, record.clone());
				true
			}
		}
	}

	/// Bulk form of [`WorkingSet::reconcile_one`], returning the records that changed the set.
	pub fn reconcile_all<'r>(
		&mut self,
		records: impl IntoIterator<Item = &'r Record>,
	) -> Vec<&'r Record> {
		records
			.into_iter()
			.filter(|record| self.reconcile_one(record))
			.collect()
	}

	#[must_use]
	pub fn get(&self, key: &LogicalKey) -> Option<&Record> {
		self.entries.get(key)
	}

	/// Whether `record` is still the current version of its logical key.
	#[must_use]
	pub fn is_current(&self, record: &Record) -> bool {
		self.entries
			.get(&record.logical_key())
			.is_some_and(|current| current.id == record.id)
	}

	pub fn records(&self) -> impl Iterator<Item = &Record> + '_ {
		self.entries.values()
	}

	/// Records ordered newest first, ties broken by id so derivation is deterministic.
	#[must_use]
	pub fn newest_first(&self) -> Vec<&Record> {
		let mut records = self.entries.values().collect::<Vec<_>>();
		records.sort_by(|a, b| match b.created_at.cmp(&a.created_at) {
			Ordering::Equal => a.id.cmp(&b.id),
			ordering => ordering,
		});
		records
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}
}
