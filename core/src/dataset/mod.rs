//! The logical data sets a [`Controller`](crate::Controller) can reconcile.

use std::sync::Arc;

use quire_event::{Filter, Record, Reference, Tag};
use quire_unlock::{UnlockPipeline, Unlocked};
use tracing::debug;

use super::{hydration::Resolved, item::ReconciledItem, reconcile::WorkingSet};

mod articles;
mod bookmarks;
mod highlights;
mod reading_progress;

pub use articles::Articles;
pub use bookmarks::Bookmarks;
pub use highlights::Highlights;
pub use reading_progress::ReadingProgress;

/// What a controller fetches for a subject, and how the reconciled records turn into items.
pub trait Dataset: Send + Sync + 'static {
	/// Stable name, also used as the watermark key.
	fn name(&self) -> &'static str;

	/// Unbounded filter for everything this data set holds for `subject`.
	fn filter(&self, subject: &str) -> Filter;

	/// Derives the full item list. Must be a pure function of `view`.
	fn derive(&self, view: &View<'_>) -> Vec<ReconciledItem>;
}

/// Read-only state a [`Dataset`] derives items from.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
	working: &'a WorkingSet,
	resolved: &'a Resolved,
	unlock: &'a UnlockPipeline,
}

impl<'a> View<'a> {
	pub fn new(working: &'a WorkingSet, resolved: &'a Resolved, unlock: &'a UnlockPipeline) -> Self {
		Self {
			working,
			resolved,
			unlock,
		}
	}

	/// Reconciled records, newest first.
	#[must_use]
	pub fn records(&self) -> Vec<&'a Record> {
		self.working.newest_first()
	}

	/// Decrypted payload of `record`, if it was unlocked.
	#[must_use]
	pub fn unlocked(&self, record: &Record) -> Option<Arc<Unlocked>> {
		self.unlock.unlocked(&record.id)
	}

	#[must_use]
	pub fn resolve(&self, reference: &Reference) -> Option<&'a Record> {
		self.resolved.get(reference)
	}
}

/// Reads the `e` and `a` rows of `tags` as references, skipping malformed ones.
fn references_in<'t>(tags: impl IntoIterator<Item = &'t Tag>) -> Vec<Reference> {
	let mut references = Vec::<Reference>::new();

	for tag in tags {
		if !(tag.is("e") || tag.is("a")) {
			continue;
		}

		match Reference::from_tag(tag) {
			Ok(reference) if !references.contains(&reference) => references.push(reference),
			Ok(_) => {}
			Err(e) => debug!(%e, "Skipping malformed reference;"),
		}
	}

	references
}

fn resolve_all(view: &View<'_>, references: &[Reference]) -> Vec<Record> {
	references
		.iter()
		.filter_map(|reference| view.resolve(reference))
		.cloned()
		.collect()
}

/// Subject filter shared by every data set authored by the subject.
fn authored_by(subject: &str, kinds: impl IntoIterator<Item = quire_event::Kind>) -> Filter {
	Filter::new().kinds(kinds).authors([subject])
}
