use std::collections::BTreeMap;

use serde::{ser::SerializeMap, Serialize, Serializer};

use super::{Kind, Record, Timestamp};

/// Subscription filter handed to the transport.
///
/// Serializes to the relay wire shape, with tag filters written as `#<name>` keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
	pub kinds: Vec<Kind>,
	pub authors: Option<Vec<String>>,
	pub ids: Option<Vec<String>>,
	pub tag_filters: BTreeMap<String, Vec<String>>,
	pub since: Option<Timestamp>,
}

impl Filter {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn kinds(mut self, kinds: impl IntoIterator<Item = Kind>) -> Self {
		self.kinds.extend(kinds);
		self
	}

	#[must_use]
	pub fn authors<S: Into<String>>(mut self, authors: impl IntoIterator<Item = S>) -> Self {
		self.authors
			.get_or_insert_with(Vec::new)
			.extend(authors.into_iter().map(Into::into));
		self
	}

	#[must_use]
	pub fn ids<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
		self.ids
			.get_or_insert_with(Vec::new)
			.extend(ids.into_iter().map(Into::into));
		self
	}

	#[must_use]
	pub fn tag<S: Into<String>>(
		mut self,
		name: impl Into<String>,
		values: impl IntoIterator<Item = S>,
	) -> Self {
		self.tag_filters
			.entry(name.into())
			.or_default()
			.extend(values.into_iter().map(Into::into));
		self
	}

	#[must_use]
	pub const fn since(mut self, since: Timestamp) -> Self {
		self.since = Some(since);
		self
	}

	/// Local evaluation of the filter, as a relay would apply it.
	#[must_use]
	pub fn matches(&self, record: &Record) -> bool {
		(self.kinds.is_empty() || self.kinds.contains(&record.kind))
			&& self
				.authors
				.as_ref()
				.map_or(true, |authors| authors.contains(&record.author))
			&& self
				.ids
				.as_ref()
				.map_or(true, |ids| ids.contains(&record.id))
			&& self
				.since
				.map_or(true, |since| record.created_at >= since)
			&& self.tag_filters.iter().all(|(name, values)| {
				record
					.tags_named(name)
					.filter_map(|tag| tag.value())
					.any(|value| values.iter().any(|wanted| wanted == value))
			})
	}
}

impl Serialize for Filter {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(None)?;

		if !self.kinds.is_empty() {
			map.serialize_entry("kinds", &self.kinds)?;
		}
		if let Some(authors) = &self.authors {
			map.serialize_entry("authors", authors)?;
		}
		if let Some(ids) = &self.ids {
			map.serialize_entry("ids", ids)?;
		}
		for (name, values) in &self.tag_filters {
			map.serialize_entry(&format!("#{name}"), values)?;
		}
		if let Some(since) = &self.since {
			map.serialize_entry("since", since)?;
		}

		map.end()
	}
}
