//! Reconciliation of one logical data set.
//!
//! Every `start` or `reset` bumps the generation. Work scheduled under an older generation
//! (query callbacks, hydration batches) still runs to completion, but whatever it produces
//! is dropped once it notices the generation moved on.

use std::{
	cell::RefCell,
	collections::HashSet,
	fmt, mem,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc, Weak,
	},
};

use parking_lot::{Mutex, ReentrantMutex};
use quire_event::{Record, Reference};
use quire_query::{query, OnRecord};
use quire_unlock::{detect, DecryptCapability};
use quire_utils::error::report_error;
use tokio::{runtime::Handle, time::sleep};
use tracing::{debug, info, instrument, trace, warn};

use super::{
	context::CoreContext,
	dataset::{Dataset, View},
	hydration::Resolved,
	item::ReconciledItem,
	reconcile::WorkingSet,
	Error,
};

mod listeners;
mod snapshot;

pub use listeners::{Listener, Subscription};
pub use snapshot::{Phase, Snapshot};

use listeners::Listeners;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOptions {
	pub subject: String,
	/// Ignore the watermark and fetch everything again.
	pub force: bool,
}

impl StartOptions {
	pub fn new(subject: impl Into<String>) -> Self {
		Self {
			subject: subject.into(),
			force: false,
		}
	}

	#[must_use]
	pub const fn force(mut self, force: bool) -> Self {
		self.force = force;
		self
	}
}

#[derive(Debug, Default)]
struct State {
	subject: Option<String>,
	phase: Phase,
	loaded_for: Option<String>,
	working: WorkingSet,
	resolved: Resolved,
	/// References ever handed to hydration in this generation.
	requested: HashSet<Reference>,
	/// Requested references waiting for the next hydration batch.
	pending: Vec<Reference>,
	hydration_scheduled: bool,
	revision: u64,
	snapshot: Arc<Snapshot>,
}

impl State {
	fn clear(&mut self) {
		self.working.clear();
		self.resolved.clear();
		self.requested.clear();
		self.pending.clear();
		self.hydration_scheduled = false;
		self.loaded_for = None;
		self.phase = Phase::Idle;
	}

	/// Forgets hydration requests of the previous generation, as their batches will discard
	/// what they fetch. Unresolved references are requested again on the next derivation.
	fn restart_hydration(&mut self) {
		self.requested
			.retain(|reference| self.resolved.contains(reference));
		self.pending.clear();
		self.hydration_scheduled = false;
	}
}

pub struct Controller {
	dataset: Box<dyn Dataset>,
	ctx: Arc<CoreContext>,
	generation: AtomicU64,
	state: Mutex<State>,
	listeners: Arc<Listeners>,
	/// Last snapshot handed to listeners. Emission happens under this lock so listeners see
	/// revisions in order; it is reentrant so listeners may call back into the controller.
	emitted: ReentrantMutex<RefCell<Arc<Snapshot>>>,
	this: Weak<Self>,
}

impl fmt::Debug for Controller {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Controller")
			.field("dataset", &self.dataset.name())
			.field("generation", &self.generation())
			.field("listeners", &self.listeners.len())
			.finish_non_exhaustive()
	}
}

impl Controller {
	pub fn new(ctx: Arc<CoreContext>, dataset: impl Dataset) -> Arc<Self> {
		Arc::new_cyclic(|this| Self {
			dataset: Box::new(dataset),
			ctx,
			generation: AtomicU64::new(0),
			state: Mutex::new(State::default()),
			listeners: Arc::default(),
			emitted: ReentrantMutex::new(RefCell::new(Arc::default())),
			this: this.clone(),
		})
	}

	#[must_use]
	pub fn name(&self) -> &'static str {
		self.dataset.name()
	}

	#[must_use]
	pub fn generation(&self) -> u64 {
		self.generation.load(Ordering::Acquire)
	}

	/// The latest derived snapshot.
	#[must_use]
	pub fn snapshot(&self) -> Arc<Snapshot> {
		Arc::clone(&self.state.lock().snapshot)
	}

	/// Whether the record with `id` is part of the working set or of the hydrated records.
	#[must_use]
	pub fn contains_record(&self, id: &str) -> bool {
		let state = self.state.lock();
		state.working.records().any(|record| record.id == id) || state.resolved.contains_record(id)
	}

	/// Registers `listener` for every future snapshot and immediately calls it with the
	/// current one. Earlier snapshots are not replayed.
	pub fn subscribe(&self, listener: impl Fn(&Snapshot) + Send + Sync + 'static) -> Subscription {
		let listener: Listener = Arc::new(listener);

		let emitted = self.emitted.lock();
		let id = self.listeners.insert(Arc::clone(&listener));
		let current = Arc::clone(&emitted.borrow());
		listener(&current);
		drop(emitted);

		Subscription::new(id, &self.listeners)
	}

	/// Loads the data set for `options.subject`.
	///
	/// A repeated non-forced start for an already loaded subject only re-emits the last
	/// snapshot. Otherwise records stream into subscribers as relays deliver them, starting
	/// from the persisted watermark unless `force` is set. Transport failures degrade to
	/// "nothing new"; only being unable to query at all is an error.
	#[instrument(
		skip_all,
		fields(dataset = self.name(), subject = %options.subject, force = options.force),
		err
	)]
	pub async fn start(&self, options: StartOptions) -> Result<(), Error> {
		let StartOptions { subject, force } = options;
		let name = self.name();

		let (generation, snapshot) = {
			let mut state = self.state.lock();

			if !force && state.loaded_for.as_deref() == Some(subject.as_str()) {
				drop(state);
				debug!("Already loaded, re-emitting last snapshot;");
				self.reemit();
				return Ok(());
			}

			let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

			if state.subject.as_deref() == Some(subject.as_str()) {
				state.restart_hydration();
			} else {
				state.clear();
				state.subject = Some(subject.clone());
			}
			state.loaded_for = None;
			state.phase = Phase::Loading;

			(generation, self.commit(&mut state, generation))
		};
		self.broadcast(&snapshot);

		let mut filter = self.dataset.filter(&subject);
		if !force {
			if let Some(since) = self.ctx.watermarks.get(name, &subject) {
				debug!(%since, "Resuming from watermark;");
				filter = filter.since(since);
			}
		}

		let on_record = |record: &Record| self.handle_record(generation, record);
		let on_record: OnRecord<'_> = &on_record;

		let records = match query(
			&*self.ctx.source,
			&self.ctx.relays,
			&filter,
			self.ctx.query_options,
			Some(on_record),
		)
		.await
		{
			Ok(records) => records,
			Err(e) => {
				self.settle(generation);
				return Err(e.into());
			}
		};

		let (snapshot, working) = {
			let mut state = self.state.lock();

			if self.generation() != generation {
				debug!(generation, "Generation moved on while loading, discarding pass;");
				return Ok(());
			}

			for record in state.working.reconcile_all(&records) {
				self.unlock_in_background(record);
			}

			state.phase = Phase::Complete;
			state.loaded_for = Some(subject.clone());

			(self.commit(&mut state, generation), state.working.len())
		};
		self.broadcast(&snapshot);

		if let Some(newest) = records.iter().map(|record| record.created_at).max() {
			report_error(&self.ctx.watermarks.advance(name, &subject, newest).map(drop));
		}

		info!(
			records = records.len(),
			working,
			items = snapshot.items.len(),
			"Reconciliation pass complete;"
		);

		Ok(())
	}

	/// Drops everything reconciled so far, forgets the subject and invalidates all
	/// in-flight work. Records ingested afterwards are ignored until the next start.
	///
	/// The watermark is kept, see [`Controller::forget_subject`].
	pub fn reset(&self) {
		let snapshot = {
			let mut state = self.state.lock();
			let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
			state.clear();
			state.subject = None;

			self.commit(&mut state, generation)
		};

		debug!(dataset = self.name(), generation = snapshot.generation, "Reset;");

		self.broadcast(&snapshot);
	}

	/// Reconciles a record that did not arrive through a query, like one just published.
	///
	/// Records outside of this data set, or arriving before any subject was started, are
	/// ignored. Returns whether the working set changed.
	pub fn ingest(&self, record: &Record) -> bool {
		let snapshot = {
			let mut state = self.state.lock();

			let belongs = state
				.subject
				.as_deref()
				.is_some_and(|subject| self.dataset.filter(subject).matches(record));
			if !belongs {
				trace!(dataset = self.name(), id = %record.id, "Ignoring record outside of this data set;");
				return false;
			}

			let generation = self.generation();
			match self.apply(&mut state, generation, record) {
				Some(snapshot) => snapshot,
				None => return false,
			}
		};

		self.broadcast(&snapshot);

		true
	}

	/// Installs a decrypt capability and unlocks every record that was seen without one.
	pub fn set_decrypt_capability(&self, capability: DecryptCapability) {
		self.ctx.unlock.set_capability(capability);
		self.retry_locked();
	}

	/// Schedules decryption of every record that is still locked, for when a capability was
	/// installed through another controller sharing the same pipeline.
	pub fn retry_locked(&self) {
		let locked = self
			.state
			.lock()
			.working
			.records()
			.filter(|record| self.ctx.unlock.is_locked(&record.id))
			.cloned()
			.collect::<Vec<_>>();

		debug!(dataset = self.name(), locked = locked.len(), "Retrying locked records;");

		for record in &locked {
			self.unlock_in_background(record);
		}
	}

	/// Removes the watermark of `subject`, and resets if it is the current subject, so the
	/// next start fetches everything again.
	pub fn forget_subject(&self, subject: &str) -> Result<(), Error> {
		self.ctx.watermarks.remove(self.name(), subject)?;

		let is_current = self.state.lock().subject.as_deref() == Some(subject);
		if is_current {
			self.reset();
		}

		Ok(())
	}

	fn handle_record(&self, generation: u64, record: &Record) {
		let snapshot = {
			let mut state = self.state.lock();

			if self.generation() != generation {
				trace!(id = %record.id, generation, "Dropping record of a stale generation;");
				return;
			}

			match self.apply(&mut state, generation, record) {
				Some(snapshot) => snapshot,
				None => return,
			}
		};

		self.broadcast(&snapshot);
	}

	/// Reconciles one record, deriving a new snapshot only if the working set changed.
	fn apply(&self, state: &mut State, generation: u64, record: &Record) -> Option<Arc<Snapshot>> {
		if !state.working.reconcile_one(record) {
			return None;
		}

		self.unlock_in_background(record);

		Some(self.commit(state, generation))
	}

	/// Leaves the loading phase after a failed pass, keeping what was reconciled before.
	fn settle(&self, generation: u64) {
		let snapshot = {
			let mut state = self.state.lock();
			if self.generation() != generation {
				return;
			}

			state.phase = Phase::Idle;
			self.commit(&mut state, generation)
		};

		self.broadcast(&snapshot);
	}

	/// Derives the snapshot for the current state and queues hydration for references seen
	/// for the first time.
	fn commit(&self, state: &mut State, generation: u64) -> Arc<Snapshot> {
		let items = self.dataset.derive(&View::new(
			&state.working,
			&state.resolved,
			&self.ctx.unlock,
		));

		for reference in items.iter().flat_map(ReconciledItem::unresolved) {
			if state.requested.insert(reference.clone()) {
				state.pending.push(reference.clone());
			}
		}

		if !state.pending.is_empty() && !state.hydration_scheduled {
			state.hydration_scheduled = self.schedule_hydration(generation);
		}

		state.revision += 1;

		let snapshot = Arc::new(Snapshot {
			revision: state.revision,
			generation,
			subject: state.subject.clone(),
			phase: state.phase,
			items,
		});
		state.snapshot = Arc::clone(&snapshot);

		snapshot
	}

	/// Hands `snapshot` to listeners unless a newer one already went out.
	fn broadcast(&self, snapshot: &Arc<Snapshot>) {
		let emitted = self.emitted.lock();

		if snapshot.revision <= emitted.borrow().revision {
			trace!(revision = snapshot.revision, "Skipping superseded snapshot;");
			return;
		}

		*emitted.borrow_mut() = Arc::clone(snapshot);
		self.listeners.emit(snapshot);
	}

	fn reemit(&self) {
		let emitted = self.emitted.lock();
		let last = Arc::clone(&emitted.borrow());
		self.listeners.emit(&last);
	}

	/// Decrypts a confidential record off the reconciliation path. Once unlocked, the
	/// snapshot is derived again as long as the record is still current.
	fn unlock_in_background(&self, record: &Record) {
		let Some(marker) = detect(record) else {
			return;
		};

		if self.ctx.unlock.unlocked(&record.id).is_some() {
			return;
		}

		let Ok(runtime) = Handle::try_current() else {
			warn!(id = %record.id, "No runtime to unlock confidential record on;");
			return;
		};

		trace!(?marker, id = %record.id, "Unlocking confidential record in background;");

		let this = self.this.clone();
		let unlock = Arc::clone(&self.ctx.unlock);
		let record = record.clone();

		runtime.spawn(async move {
			if unlock.maybe_decrypt(&record).await.is_some() {
				if let Some(this) = this.upgrade() {
					this.on_unlocked(&record);
				}
			}
		});
	}

	fn on_unlocked(&self, record: &Record) {
		let snapshot = {
			let mut state = self.state.lock();

			if !state.working.is_current(record) {
				trace!(id = %record.id, "Unlocked record is no longer current;");
				return;
			}

			let generation = self.generation();
			self.commit(&mut state, generation)
		};

		self.broadcast(&snapshot);
	}

	/// Runs one hydration batch after the batching window. Returns whether it was scheduled.
	fn schedule_hydration(&self, generation: u64) -> bool {
		let Ok(runtime) = Handle::try_current() else {
			warn!(dataset = self.name(), "No runtime to hydrate references on;");
			return false;
		};

		let this = self.this.clone();
		let window = self.ctx.hydration_window;

		runtime.spawn(async move {
			sleep(window).await;

			if let Some(this) = this.upgrade() {
				this.hydrate(generation).await;
			}
		});

		true
	}

	#[instrument(skip(self), fields(dataset = self.name()))]
	async fn hydrate(&self, generation: u64) {
		let references = {
			let mut state = self.state.lock();

			if self.generation() != generation {
				trace!("Skipping hydration batch of a stale generation;");
				return;
			}

			state.hydration_scheduled = false;
			mem::take(&mut state.pending)
		};

		if references.is_empty() {
			return;
		}

		let on_resolved = |record: &Record| self.handle_resolved(generation, record);
		let on_resolved: OnRecord<'_> = &on_resolved;

		match self.ctx.hydrator().hydrate(&references, on_resolved).await {
			// Records whose callback raced a generation check are picked up here
			Ok(records) => {
				for record in &records {
					self.handle_resolved(generation, record);
				}
			}
			Err(e) => warn!(%e, "Failed to hydrate references;"),
		}
	}

	fn handle_resolved(&self, generation: u64, record: &Record) {
		let snapshot = {
			let mut state = self.state.lock();

			if self.generation() != generation {
				trace!(id = %record.id, generation, "Dropping hydrated record of a stale generation;");
				return;
			}

			let State {
				resolved,
				requested,
				..
			} = &mut *state;
			if !resolved.accept(record, requested) {
				return;
			}

			self.commit(&mut state, generation)
		};

		self.broadcast(&snapshot);
	}
}
