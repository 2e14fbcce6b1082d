use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use trellis_assets::{AssetCache, PinHandle};
use trellis_graph::{DocumentNode, SolutionNode};
use trellis_primitives::{Checksum, DocumentId};
use trellis_sync::{AssetSynchronizer, SyncError};
use trellis_worker::SessionScope;

use crate::DispatchError;

/// An immutable, fully materialized solution identified by its root checksum.
#[derive(Debug, Clone)]
pub struct Snapshot {
	root: Checksum,
	solution: Arc<SolutionNode>,
}

impl Snapshot {
	pub fn root(&self) -> Checksum {
		self.root
	}

	pub fn solution(&self) -> &Arc<SolutionNode> {
		&self.solution
	}

	pub fn document(&self, id: &DocumentId) -> Option<&Arc<DocumentNode>> {
		self.solution.document(id)
	}
}

type InFlightMap = Mutex<FxHashMap<Checksum, Arc<OnceCell<Snapshot>>>>;

struct ResolverInner {
	sync: AssetSynchronizer,
	in_flight: InFlightMap,
	session: SessionScope,
}

/// Turns "operate on checksum X" into a pinned, materialized [`Snapshot`] and
/// runs the operation against it.
///
/// Concurrent dispatches against the same root share one materialization.
#[derive(Clone)]
pub struct SnapshotResolver {
	inner: Arc<ResolverInner>,
}

impl std::fmt::Debug for SnapshotResolver {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SnapshotResolver")
			.field("generation", &self.inner.session.generation())
			.field("in_flight", &self.inner.in_flight.lock().len())
			.finish()
	}
}

/// Removes the in-flight slot for a root once its last user is gone.
struct InFlightSlot<'a> {
	map: &'a InFlightMap,
	root: Checksum,
	cell: Arc<OnceCell<Snapshot>>,
}

impl<'a> InFlightSlot<'a> {
	fn acquire(map: &'a InFlightMap, root: Checksum) -> Self {
		let cell = map.lock().entry(root).or_default().clone();
		Self { map, root, cell }
	}
}

impl Drop for InFlightSlot<'_> {
	fn drop(&mut self) {
		let mut map = self.map.lock();
		// Clones are only taken under the lock, so the count cannot grow here.
		if let Some(existing) = map.get(&self.root)
			&& Arc::ptr_eq(existing, &self.cell)
			&& Arc::strong_count(&self.cell) == 2
		{
			map.remove(&self.root);
		}
	}
}

impl SnapshotResolver {
	/// Creates a resolver bound to one session. Closing `session` fails every
	/// pending and future dispatch with [`DispatchError::Disconnected`].
	pub fn new(sync: AssetSynchronizer, session: SessionScope) -> Self {
		Self {
			inner: Arc::new(ResolverInner {
				sync,
				in_flight: Mutex::new(FxHashMap::default()),
				session,
			}),
		}
	}

	pub fn cache(&self) -> &AssetCache {
		self.inner.sync.cache()
	}

	pub fn synchronizer(&self) -> &AssetSynchronizer {
		&self.inner.sync
	}

	/// The session scope dispatches and event loops of this resolver run under.
	pub fn scope(&self) -> &SessionScope {
		&self.inner.session
	}

	pub fn is_disconnected(&self) -> bool {
		self.inner.session.is_closed()
	}

	/// Pins `root`, materializes it, and runs `operation` against the snapshot.
	///
	/// The pin covers every cached node the dispatch read and the top of every
	/// subtree it reused from an earlier snapshot. It is released on every exit
	/// path, before the result is returned.
	pub async fn run_against_snapshot<T, E, F, Fut>(&self, root: Checksum, operation: F, cancel: &CancellationToken) -> Result<T, DispatchError<E>>
	where
		F: FnOnce(Snapshot, CancellationToken) -> Fut,
		Fut: Future<Output = Result<T, E>>,
	{
		if self.is_disconnected() {
			return Err(DispatchError::Disconnected);
		}
		let mut pin = self.cache().lease();
		let result = self
			.guarded(cancel, async {
				let snapshot = self.resolve(root, &mut pin, cancel).await?;
				operation(snapshot, cancel.clone()).await.map_err(DispatchError::Operation)
			})
			.await;
		drop(pin);
		log_outcome(root, &result);
		result
	}

	/// Like [`run_against_snapshot`](Self::run_against_snapshot) for a pair of
	/// roots resolved under one pin handle.
	pub async fn run_against_snapshots<T, E, F, Fut>(
		&self,
		old: Checksum,
		new: Checksum,
		operation: F,
		cancel: &CancellationToken,
	) -> Result<T, DispatchError<E>>
	where
		F: FnOnce(Snapshot, Snapshot, CancellationToken) -> Fut,
		Fut: Future<Output = Result<T, E>>,
	{
		if self.is_disconnected() {
			return Err(DispatchError::Disconnected);
		}
		let mut pin = self.cache().lease();
		let result = self
			.guarded(cancel, async {
				let old = self.resolve(old, &mut pin, cancel).await?;
				let new = self.resolve(new, &mut pin, cancel).await?;
				operation(old, new, cancel.clone()).await.map_err(DispatchError::Operation)
			})
			.await;
		drop(pin);
		log_outcome(new, &result);
		result
	}

	/// Races `work` against session teardown and caller cancellation.
	async fn guarded<T, E>(&self, cancel: &CancellationToken, work: impl Future<Output = Result<T, DispatchError<E>>>) -> Result<T, DispatchError<E>> {
		tokio::select! {
			biased;
			_ = self.inner.session.closed() => Err(DispatchError::Disconnected),
			_ = cancel.cancelled() => Err(DispatchError::Cancelled),
			result = work => result,
		}
	}

	async fn resolve<E>(&self, root: Checksum, pin: &mut PinHandle, cancel: &CancellationToken) -> Result<Snapshot, DispatchError<E>> {
		let slot = InFlightSlot::acquire(&self.inner.in_flight, root);
		// A joiner holds the root before waiting: the dispatch filling the cell
		// releases its own pins as soon as its operation returns.
		self.cache().pin_one(pin, &root);
		let sync = &self.inner.sync;
		let materializing = &mut *pin;
		let snapshot = slot
			.cell
			.get_or_try_init(|| async move {
				let materialized = sync.materialize(root, materializing, cancel).await?;
				Ok::<_, SyncError>(Snapshot {
					root,
					solution: materialized.solution,
				})
			})
			.await?
			.clone();
		drop(slot);
		// Covers a root that only arrived while this dispatch was waiting.
		self.cache().pin_one(pin, &root);
		Ok(snapshot)
	}
}

fn log_outcome<T, E>(root: Checksum, result: &Result<T, DispatchError<E>>) {
	match result {
		Ok(_) => tracing::trace!(root = %root.short(), "dispatch.ok"),
		Err(DispatchError::Cancelled) => tracing::debug!(root = %root.short(), "dispatch.cancelled"),
		Err(DispatchError::Operation(_)) => tracing::debug!(root = %root.short(), "dispatch.operation_failed"),
		Err(err) => tracing::warn!(root = %root.short(), error = %DisplayKind(err), "dispatch.failed"),
	}
}

/// Displays a dispatch error without requiring `E: Display`.
struct DisplayKind<'a, E>(&'a DispatchError<E>);

impl<E> std::fmt::Display for DisplayKind<'_, E> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.0 {
			DispatchError::SnapshotUnavailable(checksum) => write!(f, "snapshot {checksum} unavailable"),
			DispatchError::ConsistencyFault(err) | DispatchError::Materialize(err) => write!(f, "{err}"),
			DispatchError::Cancelled => f.write_str("cancelled"),
			DispatchError::Disconnected => f.write_str("disconnected"),
			DispatchError::Operation(_) => f.write_str("operation failed"),
		}
	}
}
