use quire_event::{Kind, Record, Reference, Tag, Timestamp};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
	Public,
	/// Only known after the owning record was unlocked.
	Confidential,
}

/// UI-ready view derived from one or more records.
///
/// Items whose references never resolve stay usable: they keep the data of the record that
/// mentioned them and report [`ReconciledItem::is_complete`] as `false`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledItem {
	pub id: String,
	pub visibility: Visibility,
	pub kind: Kind,
	pub author: String,
	pub content: String,
	pub tags: Vec<Tag>,
	/// Ordering key; for list entries this is when the owning list was last written.
	pub created_at: Timestamp,
	pub references: Vec<Reference>,
	pub resolved: Vec<Record>,
	pub detail: ItemDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemDetail {
	Bookmark {
		/// Logical key of the list the entry came from.
		list: String,
		list_title: Option<String>,
		url: Option<String>,
	},
	Highlight {
		context: Option<String>,
		comment: Option<String>,
		url: Option<String>,
	},
	ReadingProgress {
		target: String,
		progress: f64,
		location: Option<u64>,
	},
	Article {
		title: Option<String>,
		summary: Option<String>,
		image: Option<String>,
		published_at: Option<Timestamp>,
	},
}

impl ReconciledItem {
	/// Whether every reference has been hydrated.
	#[must_use]
	pub fn is_complete(&self) -> bool {
		self.references
			.iter()
			.all(|reference| self.resolved.iter().any(|record| reference.matches(record)))
	}

	#[must_use]
	pub fn unresolved(&self) -> impl Iterator<Item = &Reference> + '_ {
		self.references
			.iter()
			.filter(|reference| !self.resolved.iter().any(|record| reference.matches(record)))
	}
}
