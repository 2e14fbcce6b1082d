use std::future::Future;
use std::sync::LazyLock;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::TaskClass;

/// Hosts tasks started where no runtime is current, such as a session opened
/// from a plain thread.
static DETACHED: LazyLock<Runtime> = LazyLock::new(|| {
	Builder::new_multi_thread()
		.enable_all()
		.worker_threads(2)
		.thread_name("trellis-detached")
		.build()
		.expect("detached runtime must start")
});

fn handle() -> Handle {
	Handle::try_current().unwrap_or_else(|_| DETACHED.handle().clone())
}

/// Spawns `fut` on the current runtime, or on the detached one outside a
/// runtime. The task stays inside the caller's span.
pub fn spawn<F>(class: TaskClass, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(class = class.as_str(), "worker.spawn");
	handle().spawn(fut.in_current_span())
}

/// Runs `f` on the blocking pool inside the caller's span.
pub fn spawn_blocking<F, R>(class: TaskClass, f: F) -> JoinHandle<R>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	tracing::trace!(class = class.as_str(), "worker.spawn_blocking");
	let span = tracing::Span::current();
	handle().spawn_blocking(move || span.in_scope(f))
}
