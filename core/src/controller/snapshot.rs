use serde::Serialize;

use crate::item::ReconciledItem;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
	#[default]
	Idle,
	Loading,
	Complete,
}

/// Everything a controller currently knows, derived in full on every change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
	/// Increases with every derivation; subscribers never see it go backwards.
	pub revision: u64,
	pub generation: u64,
	pub subject: Option<String>,
	pub phase: Phase,
	pub items: Vec<ReconciledItem>,
}

impl Snapshot {
	#[must_use]
	pub fn item(&self, id: &str) -> Option<&ReconciledItem> {
		self.items.iter().find(|item| item.id == id)
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}
}
