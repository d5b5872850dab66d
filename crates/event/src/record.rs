use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Coordinate, Kind, KindClass, LogicalKey};

/// Unix timestamp in seconds.
#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
	#[must_use]
	pub const fn as_secs(self) -> u64 {
		self.0
	}
}

impl fmt::Display for Timestamp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<u64> for Timestamp {
	fn from(value: u64) -> Self {
		Self(value)
	}
}

/// One tag row: a name followed by its values, e.g. `["e", "<id>", "<relay>"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(pub Vec<String>);

impl Tag {
	pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
		Self(fields.into_iter().map(Into::into).collect())
	}

	#[must_use]
	pub fn name(&self) -> Option<&str> {
		self.0.first().map(String::as_str)
	}

	/// First value after the name.
	#[must_use]
	pub fn value(&self) -> Option<&str> {
		self.0.get(1).map(String::as_str)
	}

	#[must_use]
	pub fn field(&self, index: usize) -> Option<&str> {
		self.0.get(index).map(String::as_str)
	}

	#[must_use]
	pub fn is(&self, name: &str) -> bool {
		self.name() == Some(name)
	}
}

/// An immutable signed unit of data as delivered by a relay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
	pub id: String,
	pub kind: Kind,
	#[serde(rename = "created_at")]
	pub created_at: Timestamp,
	#[serde(default)]
	pub tags: Vec<Tag>,
	#[serde(default)]
	pub content: String,
	#[serde(rename = "pubkey")]
	pub author: String,
}

impl Record {
	/// Value of the first tag named `name`.
	#[must_use]
	pub fn tag_value(&self, name: &str) -> Option<&str> {
		self.tags
			.iter()
			.find(|tag| tag.is(name))
			.and_then(Tag::value)
	}

	pub fn tags_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Tag> + 'a {
		self.tags.iter().filter(move |tag| tag.is(name))
	}

	/// The `d` tag value, empty when absent.
	#[must_use]
	pub fn identifier(&self) -> &str {
		self.tag_value("d").unwrap_or_default()
	}

	#[must_use]
	pub fn logical_key(&self) -> LogicalKey {
		match self.kind.class() {
			KindClass::Replaceable => LogicalKey::Replaceable {
				kind: self.kind,
				author: self.author.clone(),
			},
			KindClass::Addressable => LogicalKey::Addressable {
				kind: self.kind,
				author: self.author.clone(),
				identifier: self.identifier().to_string(),
			},
			KindClass::Regular => LogicalKey::Event(self.id.clone()),
		}
	}

	/// Coordinate pointing at this record, for replaceable and addressable kinds.
	#[must_use]
	pub fn coordinate(&self) -> Option<Coordinate> {
		match self.kind.class() {
			KindClass::Replaceable | KindClass::Addressable => Some(Coordinate {
				kind: self.kind,
				author: self.author.clone(),
				identifier: self.identifier().to_string(),
			}),
			KindClass::Regular => None,
		}
	}

	/// Whether `self` should win over `other` when both share a logical key.
	///
	/// Newer `created_at` wins, ties go to the lexicographically smaller id so that merges
	/// are independent of arrival order.
	#[must_use]
	pub fn supersedes(&self, other: &Self) -> bool {
		match self.created_at.cmp(&other.created_at) {
			std::cmp::Ordering::Greater => true,
			std::cmp::Ordering::Less => false,
			std::cmp::Ordering::Equal => self.id < other.id,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use pretty_assertions::assert_eq;

	fn record(kind: u16, id: &str, created_at: u64, tags: Vec<Tag>) -> Record {
		Record {
			id: id.to_string(),
			kind: Kind(kind),
			created_at: Timestamp(created_at),
			tags,
			content: String::new(),
			author: "a".repeat(64),
		}
	}

	#[test]
	fn parses_wire_json() {
		let record: Record = serde_json::from_str(
			r#"{
				"id": "abc",
				"kind": 10003,
				"created_at": 1700000000,
				"tags": [["e", "def"], ["d"]],
				"content": "",
				"pubkey": "f00",
				"sig": "ignored"
			}"#,
		)
		.unwrap();

		assert_eq!(record.kind, Kind::BOOKMARK_LIST);
		assert_eq!(record.created_at, Timestamp(1_700_000_000));
		assert_eq!(record.author, "f00");
		assert_eq!(record.tag_value("e"), Some("def"));
		assert_eq!(record.identifier(), "");
	}

	#[test]
	fn logical_keys_by_class() {
		let list = record(10003, "1", 1, vec![]);
		assert_eq!(
			list.logical_key().to_string(),
			format!("10003:{}", "a".repeat(64))
		);

		let set = record(30003, "2", 1, vec![Tag::new(["d", "reading"])]);
		assert_eq!(
			set.logical_key().to_string(),
			format!("30003:{}:reading", "a".repeat(64))
		);

		let set_without_d = record(30003, "3", 1, vec![]);
		assert_eq!(
			set_without_d.logical_key().to_string(),
			format!("30003:{}:", "a".repeat(64))
		);

		let highlight = record(9802, "4", 1, vec![]);
		assert_eq!(highlight.logical_key().to_string(), "4");
	}

	#[test]
	fn supersedes_prefers_newer_then_smaller_id() {
		let old = record(10003, "b", 100, vec![]);
		let new = record(10003, "c", 200, vec![]);
		assert!(new.supersedes(&old));
		assert!(!old.supersedes(&new));

		let tie_small = record(10003, "a", 100, vec![]);
		assert!(tie_small.supersedes(&old));
		assert!(!old.supersedes(&tie_small));
		assert!(!old.supersedes(&old));
	}
}
