//! Resolution of references embedded in reconciled records.

use std::{
	collections::{BTreeSet, HashMap, HashSet},
	fmt,
	sync::Arc,
};

use futures_concurrency::future::Join;
use quire_event::{Filter, KindClass, Record, Reference};
use quire_query::{query, OnRecord, QueryOptions, RelayUrl, Source};
use tracing::{debug, instrument, warn};

/// Fetches referenced records in as few queries as possible.
///
/// Bare ids share one query, addressable coordinates another, and replaceable coordinates a
/// third, all running concurrently.
#[derive(Clone)]
pub struct Hydrator {
	source: Arc<dyn Source>,
	relays: Vec<RelayUrl>,
	options: QueryOptions,
}

impl fmt::Debug for Hydrator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Hydrator")
			.field("relays", &self.relays)
			.field("options", &self.options)
			.finish_non_exhaustive()
	}
}

impl Hydrator {
	pub fn new(source: Arc<dyn Source>, relays: Vec<RelayUrl>, options: QueryOptions) -> Self {
		Self {
			source,
			relays,
			options,
		}
	}

	/// Streams every record answering one of `references` through `on_resolved` as it
	/// arrives, and returns all of them once every batch completed.
	///
	/// References nobody answers are simply absent from the result.
	#[instrument(skip_all, fields(references = references.len()))]
	pub async fn hydrate(
		&self,
		references: &[Reference],
		on_resolved: OnRecord<'_>,
	) -> Result<Vec<Record>, quire_query::Error> {
		if references.is_empty() {
			return Ok(vec![]);
		}
		if self.relays.is_empty() {
			return Err(quire_query::Error::NoRelays);
		}

		let forward = |record: &Record| {
			if references.iter().any(|reference| reference.matches(record)) {
				on_resolved(record);
			}
		};
		let forward: OnRecord<'_> = &forward;

		let filters = batch_filters(references);
		let results = filters
			.iter()
			.map(|filter| {
				query(
					&*self.source,
					&self.relays,
					filter,
					self.options,
					Some(forward),
				)
			})
			.collect::<Vec<_>>()
			.join()
			.await;

		let mut seen = HashSet::new();
		let mut resolved = vec![];

		for result in results {
			match result {
				Ok(records) => resolved.extend(records.into_iter().filter(|record| {
					references.iter().any(|reference| reference.matches(record))
						&& seen.insert(record.id.clone())
				})),
				Err(e) => warn!(%e, "Failed to run hydration batch;"),
			}
		}

		debug!(resolved = resolved.len(), "Hydration pass finished;");

		Ok(resolved)
	}
}

fn batch_filters(references: &[Reference]) -> Vec<Filter> {
	let mut ids = BTreeSet::new();
	let mut addressable = (BTreeSet::new(), BTreeSet::new(), BTreeSet::new());
	let mut replaceable = (BTreeSet::new(), BTreeSet::new());

	for reference in references {
		match reference {
			Reference::Id(id) => {
				ids.insert(id.as_str());
			}
			Reference::Coordinate(coordinate) => match coordinate.kind.class() {
				KindClass::Addressable => {
					addressable.0.insert(coordinate.kind);
					addressable.1.insert(coordinate.author.as_str());
					addressable.2.insert(coordinate.identifier.as_str());
				}
				// Coordinates of regular kinds cannot exist, but a replaceable lookup is harmless
				KindClass::Replaceable | KindClass::Regular => {
					replaceable.0.insert(coordinate.kind);
					replaceable.1.insert(coordinate.author.as_str());
				}
			},
		}
	}

	let mut filters = vec![];

	if !ids.is_empty() {
		filters.push(Filter::new().ids(ids));
	}
	if !addressable.0.is_empty() {
		let (kinds, authors, identifiers) = addressable;
		filters.push(
			Filter::new()
				.kinds(kinds)
				.authors(authors)
				.tag("d", identifiers),
		);
	}
	if !replaceable.0.is_empty() {
		let (kinds, authors) = replaceable;
		filters.push(Filter::new().kinds(kinds).authors(authors));
	}

	filters
}

/// Hydrated records, keyed by the reference they answer.
///
/// Coordinates keep their newest version, since several versions may be delivered.
#[derive(Debug, Default, Clone)]
pub struct Resolved {
	records: HashMap<Reference, Record>,
}

impl Resolved {
	#[must_use]
	pub fn get(&self, reference: &Reference) -> Option<&Record> {
		self.records.get(reference)
	}

	#[must_use]
	pub fn contains(&self, reference: &Reference) -> bool {
		self.records.contains_key(reference)
	}

	/// Stores `record` under each reference in `wanted` that it answers.
	///
	/// Returns whether anything changed.
	pub fn accept(&mut self, record: &Record, wanted: &HashSet<Reference>) -> bool {
		let candidates = [
			Some(Reference::Id(record.id.clone())),
			record.coordinate().map(Reference::Coordinate),
		];

		let mut changed = false;

		for reference in candidates.into_iter().flatten() {
			if !wanted.contains(&reference) {
				continue;
			}

			match self.records.get(&reference) {
				Some(current) if !record.supersedes(current) => {}
				_ => {
					self.records.insert(reference, record.clone());
					changed = true;
				}
			}
		}

		changed
	}

	/// Whether any reference resolved to the record with `id`.
	#[must_use]
	pub fn contains_record(&self, id: &str) -> bool {
		self.records.values().any(|record| record.id == id)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.records.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub fn clear(&mut self) {
		self.records.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use quire_event::{Coordinate, Kind, Tag, Timestamp};

	use pretty_assertions::assert_eq;

	const AUTHOR: &str = "7e7e9c42a91bfef19fa929e5fda1b72e0ebc1a4c1141673e2794234d86addf4e";

	fn hex_id(n: u8) -> String {
		format!("{n:02x}").repeat(32)
	}

	fn coordinate(kind: u16, identifier: &str) -> Coordinate {
		Coordinate {
			kind: Kind(kind),
			author: AUTHOR.to_string(),
			identifier: identifier.to_string(),
		}
	}

	fn article(id: u8, created_at: u64, identifier: &str) -> Record {
		Record {
			id: hex_id(id),
			kind: Kind::LONG_FORM_ARTICLE,
			created_at: Timestamp(created_at),
			tags: vec![Tag::new(["d", identifier])],
			content: String::new(),
			author: AUTHOR.to_string(),
		}
	}

	#[test]
	fn one_filter_per_reference_shape() {
		let filters = batch_filters(&[
			Reference::Id(hex_id(2)),
			Reference::Coordinate(coordinate(30023, "b")),
			Reference::Id(hex_id(1)),
			Reference::Coordinate(coordinate(30023, "a")),
			Reference::Coordinate(coordinate(0, "")),
			Reference::Id(hex_id(1)),
		]);

		assert_eq!(
			filters,
			vec![
				Filter::new().ids([hex_id(1), hex_id(2)]),
				Filter::new()
					.kinds([Kind::LONG_FORM_ARTICLE])
					.authors([AUTHOR])
					.tag("d", ["a", "b"]),
				Filter::new().kinds([Kind::METADATA]).authors([AUTHOR]),
			]
		);
	}

	#[test]
	fn coordinates_keep_their_newest_version() {
		let wanted = HashSet::from([Reference::Coordinate(coordinate(30023, "a"))]);
		let mut resolved = Resolved::default();

		assert!(resolved.accept(&article(2, 200, "a"), &wanted));
		assert!(!resolved.accept(&article(1, 100, "a"), &wanted));
		assert!(!resolved.accept(&article(3, 300, "unrelated"), &wanted));

		assert_eq!(
			resolved
				.get(&Reference::Coordinate(coordinate(30023, "a")))
				.map(|record| record.id.clone()),
			Some(hex_id(2))
		);
		assert_eq!(resolved.len(), 1);
	}

	#[test]
	fn records_answer_both_id_and_coordinate_references() {
		let record = article(1, 100, "a");
		let wanted = HashSet::from([
			Reference::Id(hex_id(1)),
			Reference::Coordinate(coordinate(30023, "a")),
		]);
		let mut resolved = Resolved::default();

		assert!(resolved.accept(&record, &wanted));
		assert!(resolved.contains(&Reference::Id(hex_id(1))));
		assert!(resolved.contains(&Reference::Coordinate(coordinate(30023, "a"))));
	}
}
