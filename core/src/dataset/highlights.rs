use quire_event::{Filter, Kind};

use super::{authored_by, references_in, resolve_all, Dataset, View};
use crate::item::{ItemDetail, ReconciledItem, Visibility};

/// Highlights authored by the subject. Append-only, so every record is its own item.
#[derive(Debug, Default, Clone, Copy)]
pub struct Highlights;

impl Dataset for Highlights {
	fn name(&self) -> &'static str {
		"highlights"
	}

	fn filter(&self, subject: &str) -> Filter {
		authored_by(subject, [Kind::HIGHLIGHT])
	}

	fn derive(&self, view: &View<'_>) -> Vec<ReconciledItem> {
		view.records()
			.into_iter()
			.map(|record| {
				let references = references_in(&record.tags);

				ReconciledItem {
					id: record.id.clone(),
					visibility: Visibility::Public,
					kind: record.kind,
					author: record.author.clone(),
					content: record.content.clone(),
					tags: record.tags.clone(),
					created_at: record.created_at,
					resolved: resolve_all(view, &references),
					references,
					detail: ItemDetail::Highlight {
						context: record.tag_value("context").map(ToString::to_string),
						comment: record.tag_value("comment").map(ToString::to_string),
						url: record.tag_value("r").map(ToString::to_string),
					},
				}
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::{hydration::Resolved, reconcile::WorkingSet};

	use quire_event::{Coordinate, Record, Reference, Tag, Timestamp};
	use quire_unlock::UnlockPipeline;

	use pretty_assertions::assert_eq;

	const AUTHOR: &str = "7e7e9c42a91bfef19fa929e5fda1b72e0ebc1a4c1141673e2794234d86addf4e";

	#[test]
	fn highlight_points_at_its_source() {
		let article = Coordinate {
			kind: Kind::LONG_FORM_ARTICLE,
			author: AUTHOR.to_string(),
			identifier: "essay".to_string(),
		};
		let highlight = Record {
			id: "11".repeat(32),
			kind: Kind::HIGHLIGHT,
			created_at: Timestamp(100),
			tags: vec![
				Tag::new(["a", &article.to_string()]),
				Tag::new(["a", &article.to_string()]),
				Tag::new(["context", "the whole paragraph"]),
				Tag::new(["comment", "so true"]),
			],
			content: "the quote".to_string(),
			author: AUTHOR.to_string(),
		};

		let mut working = WorkingSet::new();
		working.reconcile_one(&highlight);
		let resolved = Resolved::default();
		let unlock = UnlockPipeline::default();

		let items = Highlights.derive(&View::new(&working, &resolved, &unlock));

		assert_eq!(items.len(), 1);
		assert_eq!(items[0].content, "the quote");
		assert_eq!(items[0].references, vec![Reference::Coordinate(article)]);
		assert!(!items[0].is_complete());
		assert_eq!(
			items[0].detail,
			ItemDetail::Highlight {
				context: Some("the whole paragraph".to_string()),
				comment: Some("so true".to_string()),
				url: None,
			}
		);
	}
}
