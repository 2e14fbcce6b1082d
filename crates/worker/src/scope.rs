use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::TaskClass;

/// Issues session generations, starting at 1.
#[derive(Debug, Default, Clone)]
pub struct SessionClock {
	issued: Arc<AtomicU64>,
}

impl SessionClock {
	pub fn new() -> Self {
		Self::default()
	}

	/// Opens the scope of a new session under the next generation.
	pub fn open(&self) -> SessionScope {
		let generation = self.issued.fetch_add(1, Ordering::AcqRel) + 1;
		SessionScope {
			generation,
			closed: CancellationToken::new(),
			tasks: Arc::default(),
		}
	}
}

/// Lifetime of one remote session.
///
/// Closing a scope fails every dispatch waiting on it. A [`nested`] scope
/// closes with its parent and may also be closed alone; it shares the
/// parent's generation and task count.
///
/// [`nested`]: Self::nested
#[derive(Debug, Clone)]
pub struct SessionScope {
	generation: u64,
	closed: CancellationToken,
	tasks: Arc<AtomicUsize>,
}

impl SessionScope {
	pub const fn generation(&self) -> u64 {
		self.generation
	}

	pub fn is_closed(&self) -> bool {
		self.closed.is_cancelled()
	}

	/// Closes this scope and every scope nested in it. Idempotent.
	pub fn close(&self) {
		self.closed.cancel();
	}

	pub async fn closed(&self) {
		self.closed.cancelled().await;
	}

	pub fn nested(&self) -> Self {
		Self {
			generation: self.generation,
			closed: self.closed.child_token(),
			tasks: Arc::clone(&self.tasks),
		}
	}

	/// Tasks spawned through this scope's family that have not finished.
	pub fn live_tasks(&self) -> usize {
		self.tasks.load(Ordering::Acquire)
	}

	/// Spawns `fut` inside a `session.task` span tagged with the task class and
	/// this scope's generation. The task counts toward [`live_tasks`] until it
	/// completes or is dropped.
	///
	/// [`live_tasks`]: Self::live_tasks
	pub fn spawn<F>(&self, class: TaskClass, fut: F) -> JoinHandle<F::Output>
	where
		F: Future + Send + 'static,
		F::Output: Send + 'static,
	{
		let live = LiveTask::enter(&self.tasks);
		let span = tracing::debug_span!("session.task", class = class.as_str(), generation = self.generation);
		crate::spawn(
			class,
			async move {
				let _live = live;
				fut.await
			}
			.instrument(span),
		)
	}
}

struct LiveTask(Arc<AtomicUsize>);

impl LiveTask {
	fn enter(tasks: &Arc<AtomicUsize>) -> Self {
		tasks.fetch_add(1, Ordering::AcqRel);
		Self(Arc::clone(tasks))
	}
}

impl Drop for LiveTask {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::AcqRel);
	}
}
