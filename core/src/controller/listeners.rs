use std::{
	collections::BTreeMap,
	fmt,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc, Weak,
	},
};

use parking_lot::Mutex;

use super::Snapshot;

pub type Listener = Arc<dyn Fn(&Snapshot) + Send + Sync>;

#[derive(Default)]
pub(super) struct Listeners {
	next_id: AtomicU64,
	entries: Mutex<BTreeMap<u64, Listener>>,
}

impl Listeners {
	pub(super) fn insert(&self, listener: Listener) -> u64 {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		self.entries.lock().insert(id, listener);
		id
	}

	fn remove(&self, id: u64) {
		self.entries.lock().remove(&id);
	}

	/// Calls every listener in subscription order. The registry is not locked while they
	/// run, so listeners may subscribe or unsubscribe.
	pub(super) fn emit(&self, snapshot: &Snapshot) {
		let listeners = self.entries.lock().values().cloned().collect::<Vec<_>>();

		for listener in listeners {
			listener(snapshot);
		}
	}

	pub(super) fn len(&self) -> usize {
		self.entries.lock().len()
	}
}

/// Keeps a listener registered until dropped.
#[must_use = "dropping a subscription unsubscribes its listener"]
pub struct Subscription {
	id: u64,
	listeners: Weak<Listeners>,
}

impl Subscription {
	pub(super) fn new(id: u64, listeners: &Arc<Listeners>) -> Self {
		Self {
			id,
			listeners: Arc::downgrade(listeners),
		}
	}

	pub fn unsubscribe(self) {
		drop(self);
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(listeners) = self.listeners.upgrade() {
			listeners.remove(self.id);
		}
	}
}

impl fmt::Debug for Subscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription").field("id", &self.id).finish()
	}
}
