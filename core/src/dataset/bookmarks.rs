use std::collections::HashSet;

use quire_event::{Filter, Kind, Record, Reference, Tag};
use tracing::debug;

use super::{authored_by, Dataset, View};
use crate::{
	item::{ItemDetail, ReconciledItem, Visibility},
	reconcile::merge_sub_lists,
};

const KINDS: [Kind; 4] = [
	Kind::BOOKMARK_LIST,
	Kind::BOOKMARK_SET,
	Kind::LEGACY_CATEGORIZED_LIST,
	Kind::WEB_BOOKMARK,
];

/// Bookmark lists, bookmark sets, legacy categorized lists and web bookmarks.
///
/// Every list contributes its public rows followed by its unlocked hidden rows. An entry
/// bookmarked in several lists shows up once, attributed to the newest list holding it.
#[derive(Debug, Default, Clone, Copy)]
pub struct Bookmarks;

#[derive(Debug, Clone)]
struct Entry {
	id: String,
	visibility: Visibility,
	tag: Tag,
	reference: Option<Reference>,
	url: Option<String>,
}

impl Dataset for Bookmarks {
	fn name(&self) -> &'static str {
		"bookmarks"
	}

	fn filter(&self, subject: &str) -> Filter {
		authored_by(subject, KINDS)
	}

	fn derive(&self, view: &View<'_>) -> Vec<ReconciledItem> {
		let mut seen = HashSet::new();
		let mut items = vec![];

		for record in view.records() {
			if record.kind == Kind::WEB_BOOKMARK {
				if let Some(item) = web_bookmark(record) {
					if seen.insert(item.id.clone()) {
						items.push(item);
					}
				}
				continue;
			}

			let public = entries(&record.tags, Visibility::Public);
			let confidential = view
				.unlocked(record)
				.map(|unlocked| entries(&unlocked.hidden_tags, Visibility::Confidential))
				.unwrap_or_default();

			for entry in merge_sub_lists(public, confidential, |entry| entry.id.as_str()) {
				if seen.insert(entry.id.clone()) {
					items.push(list_entry(view, record, entry));
				}
			}
		}

		items
	}
}

fn entries(tags: &[Tag], visibility: Visibility) -> Vec<Entry> {
	tags.iter()
		.filter_map(|tag| match tag.name()? {
			name @ ("e" | "a") => match Reference::from_tag(tag) {
				Ok(reference) => Some(Entry {
					id: format!("{name}:{reference}"),
					visibility,
					tag: tag.clone(),
					reference: Some(reference),
					url: None,
				}),
				Err(e) => {
					debug!(%e, "Skipping malformed bookmark entry;");
					None
				}
			},
			"r" => tag.value().filter(|url| !url.is_empty()).map(|url| Entry {
				id: format!("r:{url}"),
				visibility,
				tag: tag.clone(),
				reference: None,
				url: Some(url.to_string()),
			}),
			_ => None,
		})
		.collect()
}

fn list_entry(view: &View<'_>, list: &Record, entry: Entry) -> ReconciledItem {
	let target = entry
		.reference
		.as_ref()
		.and_then(|reference| view.resolve(reference));

	let (kind, author, content, tags) = match target {
		Some(target) => (
			target.kind,
			target.author.clone(),
			target.content.clone(),
			target.tags.clone(),
		),
		None => (list.kind, list.author.clone(), String::new(), vec![entry.tag]),
	};

	ReconciledItem {
		id: entry.id,
		visibility: entry.visibility,
		kind,
		author,
		content,
		tags,
		created_at: list.created_at,
		resolved: target.cloned().into_iter().collect(),
		references: entry.reference.into_iter().collect(),
		detail: ItemDetail::Bookmark {
			list: list.logical_key().to_string(),
			list_title: list
				.tag_value("title")
				.or_else(|| list.tag_value("name"))
				.map(ToString::to_string),
			url: entry.url,
		},
	}
}

/// Web bookmarks carry their URL, minus the scheme, in the `d` tag.
fn web_bookmark(record: &Record) -> Option<ReconciledItem> {
	let identifier = record.identifier();
	if identifier.is_empty() {
		debug!(id = %record.id, "Skipping web bookmark without a url;");
		return None;
	}

	let url = if identifier.contains("://") {
		identifier.to_string()
	} else {
		format!("https://{identifier}")
	};

	Some(ReconciledItem {
		id: format!("r:{url}"),
		visibility: Visibility::Public,
		kind: record.kind,
		author: record.author.clone(),
		content: record.content.clone(),
		tags: record.tags.clone(),
		created_at: record.created_at,
		references: vec![],
		resolved: vec![],
		detail: ItemDetail::Bookmark {
			list: record.logical_key().to_string(),
			list_title: record.tag_value("title").map(ToString::to_string),
			url: Some(url),
		},
	})
}
