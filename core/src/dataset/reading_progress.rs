use quire_event::{Filter, Kind, Record, Reference};
use serde::Deserialize;
use tracing::debug;

use super::{authored_by, resolve_all, Dataset, View};
use crate::item::{ItemDetail, ReconciledItem, Visibility};

/// Reading position per target, one addressable record per article or URL.
///
/// The `d` tag names the target and the content is `{"progress": 0..1, "loc"?: n}`.
/// Records with no target or with unreadable content are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadingProgress;

#[derive(Debug, Deserialize)]
struct Payload {
	progress: f64,
	#[serde(default)]
	loc: Option<u64>,
}

impl Dataset for ReadingProgress {
	fn name(&self) -> &'static str {
		"reading_progress"
	}

	fn filter(&self, subject: &str) -> Filter {
		authored_by(subject, [Kind::READING_PROGRESS])
	}

	fn derive(&self, view: &View<'_>) -> Vec<ReconciledItem> {
		view.records()
			.into_iter()
			.filter_map(|record| progress_item(view, record))
			.collect()
	}
}

fn progress_item(view: &View<'_>, record: &Record) -> Option<ReconciledItem> {
	let target = record.identifier();
	if target.is_empty() {
		debug!(id = %record.id, "Skipping reading progress without a target;");
		return None;
	}

	let payload = match serde_json::from_str::<Payload>(&record.content) {
		Ok(payload) if (0.0..=1.0).contains(&payload.progress) => payload,
		Ok(payload) => {
			debug!(id = %record.id, progress = payload.progress, "Skipping out of range progress;");
			return None;
		}
		Err(e) => {
			debug!(%e, id = %record.id, "Skipping unreadable reading progress;");
			return None;
		}
	};

	// URL targets are not hydrated
	let references = Reference::parse(target).into_iter().collect::<Vec<_>>();

	Some(ReconciledItem {
		id: target.to_string(),
		visibility: Visibility::Public,
		kind: record.kind,
		author: record.author.clone(),
		content: record.content.clone(),
		tags: record.tags.clone(),
		created_at: record.created_at,
		resolved: resolve_all(view, &references),
		references,
		detail: ItemDetail::ReadingProgress {
			target: target.to_string(),
			progress: payload.progress,
			location: payload.loc,
		},
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::{hydration::Resolved, reconcile::WorkingSet};

	use quire_event::{Tag, Timestamp};
	use quire_unlock::UnlockPipeline;

	use pretty_assertions::assert_eq;

	const AUTHOR: &str = "7e7e9c42a91bfef19fa929e5fda1b72e0ebc1a4c1141673e2794234d86addf4e";

	fn progress(id: u8, created_at: u64, target: Option<&str>, content: &str) -> Record {
		Record {
			id: format!("{id:02x}").repeat(32),
			kind: Kind::READING_PROGRESS,
			created_at: Timestamp(created_at),
			tags: target.map(|d| Tag::new(["d", d])).into_iter().collect(),
			content: content.to_string(),
			author: AUTHOR.to_string(),
		}
	}

	#[test]
	fn malformed_records_are_skipped_without_aborting() {
		let article = format!("30023:{AUTHOR}:essay");

		let mut working = WorkingSet::new();
		working.reconcile_all(&[
			progress(1, 100, Some(&article), r#"{"progress":0.5,"loc":1200,"ts":99}"#),
			progress(2, 200, Some("https://example.com/a"), "not json"),
			progress(3, 300, Some("https://example.com/b"), r#"{"progress":3}"#),
			progress(4, 400, None, r#"{"progress":0.1}"#),
			progress(5, 50, Some("https://example.com/c"), r#"{"progress":1}"#),
		]);

		let resolved = Resolved::default();
		let unlock = UnlockPipeline::default();
		let items = ReadingProgress.derive(&View::new(&working, &resolved, &unlock));

		assert_eq!(
			items
				.iter()
				.map(|item| item.id.as_str())
				.collect::<Vec<_>>(),
			vec![article.as_str(), "https://example.com/c"]
		);
		assert_eq!(
			items[0].detail,
			ItemDetail::ReadingProgress {
				target: article.clone(),
				progress: 0.5,
				location: Some(1200),
			}
		);
		assert_eq!(items[0].references.len(), 1);
		assert!(items[1].references.is_empty());
	}
}
