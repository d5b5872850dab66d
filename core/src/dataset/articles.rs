use quire_event::{Filter, Kind, Timestamp};

use super::{authored_by, Dataset, View};
use crate::item::{ItemDetail, ReconciledItem, Visibility};

/// Long-form articles written by the subject, keyed by their coordinate.
#[derive(Debug, Default, Clone, Copy)]
pub struct Articles;

impl Dataset for Articles {
	fn name(&self) -> &'static str {
		"articles"
	}

	fn filter(&self, subject: &str) -> Filter {
		authored_by(subject, [Kind::LONG_FORM_ARTICLE])
	}

	fn derive(&self, view: &View<'_>) -> Vec<ReconciledItem> {
		view.records()
			.into_iter()
			.filter_map(|record| {
				let coordinate = record.coordinate()?;

				Some(ReconciledItem {
					id: coordinate.to_string(),
					visibility: Visibility::Public,
					kind: record.kind,
					author: record.author.clone(),
					content: record.content.clone(),
					tags: record.tags.clone(),
					created_at: record.created_at,
					references: vec![],
					resolved: vec![],
					detail: ItemDetail::Article {
						title: record.tag_value("title").map(ToString::to_string),
						summary: record.tag_value("summary").map(ToString::to_string),
						image: record.tag_value("image").map(ToString::to_string),
						published_at: record
							.tag_value("published_at")
							.and_then(|raw| raw.parse().ok())
							.map(Timestamp),
					},
				})
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::{hydration::Resolved, reconcile::WorkingSet};

	use quire_event::{Record, Tag};
	use quire_unlock::UnlockPipeline;

	use pretty_assertions::assert_eq;

	const AUTHOR: &str = "7e7e9c42a91bfef19fa929e5fda1b72e0ebc1a4c1141673e2794234d86addf4e";

	#[test]
	fn newest_revision_of_an_article_is_shown() {
		let revision = |id: u8, created_at: u64, title: &str| Record {
			id: format!("{id:02x}").repeat(32),
			kind: Kind::LONG_FORM_ARTICLE,
			created_at: Timestamp(created_at),
			tags: vec![
				Tag::new(["d", "essay"]),
				Tag::new(["title", title]),
				Tag::new(["published_at", "1700000000"]),
			],
			content: "# Essay".to_string(),
			author: AUTHOR.to_string(),
		};

		let mut working = WorkingSet::new();
		working.reconcile_all(&[revision(2, 200, "Final"), revision(1, 100, "Draft")]);

		let resolved = Resolved::default();
		let unlock = UnlockPipeline::default();
		let items = Articles.derive(&View::new(&working, &resolved, &unlock));

		assert_eq!(items.len(), 1);
		assert_eq!(items[0].id, format!("30023:{AUTHOR}:essay"));
		assert_eq!(
			items[0].detail,
			ItemDetail::Article {
				title: Some("Final".to_string()),
				summary: None,
				image: None,
				published_at: Some(Timestamp(1_700_000_000)),
			}
		);
	}
}
