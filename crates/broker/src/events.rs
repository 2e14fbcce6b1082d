//! Ordered delivery of workspace notifications to in-process listeners.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use trellis_graph::DocumentNode;
use trellis_primitives::{ChangeEvent, ChangeKind, Checksum, DocumentId, DocumentNotification, ProjectId};
use trellis_worker::TaskClass;

use crate::{BrokerError, EventsConfig, ListenerError, ListenerId, Snapshot, SnapshotResolver};

/// A document open/close resolved against its snapshot.
#[derive(Debug, Clone)]
pub struct DocumentEvent {
	pub snapshot: Snapshot,
	pub document: Arc<DocumentNode>,
	pub project_id: ProjectId,
}

/// A workspace mutation with both roots resolved.
#[derive(Debug, Clone)]
pub struct WorkspaceChange {
	pub old: Snapshot,
	pub new: Snapshot,
	pub kind: ChangeKind,
	pub project_id: Option<ProjectId>,
	pub document_id: Option<DocumentId>,
}

/// Consumer of resolved workspace notifications inside the remote process.
///
/// Calls for one stream are strictly sequential: a listener sees event N
/// complete (on every listener) before event N+1 is resolved.
#[async_trait]
pub trait WorkspaceListener: Send + Sync {
	async fn document_opened(&self, _event: &DocumentEvent, _cancel: &CancellationToken) -> Result<(), ListenerError> {
		Ok(())
	}

	async fn document_closed(&self, _event: &DocumentEvent, _cancel: &CancellationToken) -> Result<(), ListenerError> {
		Ok(())
	}

	async fn workspace_changed(&self, change: &WorkspaceChange, cancel: &CancellationToken) -> Result<(), ListenerError>;
}

type Listeners = Vec<(ListenerId, Arc<dyn WorkspaceListener>)>;
type Ack = oneshot::Sender<Result<(), BrokerError>>;

#[derive(Debug, Clone, Copy)]
enum DocumentAction {
	Opened,
	Closed,
}

impl DocumentAction {
	const fn as_str(self) -> &'static str {
		match self {
			Self::Opened => "opened",
			Self::Closed => "closed",
		}
	}
}

enum Cmd<E> {
	Event {
		event: E,
		cancel: CancellationToken,
		reply: Ack,
	},
	Subscribe {
		id: ListenerId,
		listener: Arc<dyn WorkspaceListener>,
	},
	Unsubscribe {
		id: ListenerId,
	},
	Shutdown {
		reply: oneshot::Sender<()>,
	},
}

type DocumentCmd = Cmd<(DocumentAction, DocumentNotification)>;
type ChangeCmd = Cmd<ChangeEvent>;

/// Sending half of one FIFO queue plus its depth gauge.
struct Queue<E> {
	name: &'static str,
	tx: mpsc::UnboundedSender<Cmd<E>>,
	depth: Arc<AtomicUsize>,
	warn_depth: usize,
}

impl<E> Queue<E> {
	fn send(&self, cmd: Cmd<E>) -> Result<(), BrokerError> {
		let depth = self.depth.fetch_add(1, Ordering::AcqRel) + 1;
		if depth > self.warn_depth {
			tracing::warn!(queue = self.name, depth, "events.queue_backlog");
		}
		self.tx.send(cmd).map_err(|_| {
			self.depth.fetch_sub(1, Ordering::AcqRel);
			BrokerError::ChannelClosed
		})
	}
}

/// Handle to the two event queues of one session.
///
/// Document open/close notifications and workspace changes travel through
/// separate queues, each drained by a single consumer loop, so each stream is
/// delivered in call order. The streams are not ordered relative to each other.
#[derive(Clone)]
pub struct EventChannel {
	inner: Arc<ChannelInner>,
}

struct ChannelInner {
	documents: Queue<(DocumentAction, DocumentNotification)>,
	changes: Queue<ChangeEvent>,
	closed: AtomicBool,
	next_listener: AtomicU64,
}

impl std::fmt::Debug for EventChannel {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EventChannel")
			.field("document_depth", &self.inner.documents.depth.load(Ordering::Relaxed))
			.field("change_depth", &self.inner.changes.depth.load(Ordering::Relaxed))
			.field("closed", &self.inner.closed.load(Ordering::Relaxed))
			.finish()
	}
}

impl EventChannel {
	/// Spawns both consumer loops against `resolver`.
	pub fn start(resolver: SnapshotResolver, config: &EventsConfig) -> Self {
		let (documents_tx, documents_rx) = mpsc::unbounded_channel();
		let (changes_tx, changes_rx) = mpsc::unbounded_channel();
		let documents_depth = Arc::new(AtomicUsize::new(0));
		let changes_depth = Arc::new(AtomicUsize::new(0));

		let scope = resolver.scope().clone();
		scope.spawn(TaskClass::Service, run_documents(documents_rx, resolver.clone(), documents_depth.clone()));
		scope.spawn(TaskClass::Service, run_changes(changes_rx, resolver, changes_depth.clone()));

		Self {
			inner: Arc::new(ChannelInner {
				documents: Queue {
					name: "documents",
					tx: documents_tx,
					depth: documents_depth,
					warn_depth: config.queue_warn_depth,
				},
				changes: Queue {
					name: "changes",
					tx: changes_tx,
					depth: changes_depth,
					warn_depth: config.queue_warn_depth,
				},
				closed: AtomicBool::new(false),
				next_listener: AtomicU64::new(1),
			}),
		}
	}

	/// Registers a listener for every event enqueued after this call.
	pub fn subscribe(&self, listener: Arc<dyn WorkspaceListener>) -> Result<ListenerId, BrokerError> {
		self.ensure_open()?;
		let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
		self.inner.documents.send(Cmd::Subscribe {
			id,
			listener: listener.clone(),
		})?;
		self.inner.changes.send(Cmd::Subscribe { id, listener })?;
		tracing::debug!(%id, "events.subscribe");
		Ok(id)
	}

	/// Removes a listener; events enqueued before this call still reach it.
	pub fn unsubscribe(&self, id: ListenerId) -> Result<(), BrokerError> {
		self.ensure_open()?;
		self.inner.documents.send(Cmd::Unsubscribe { id })?;
		self.inner.changes.send(Cmd::Unsubscribe { id })?;
		tracing::debug!(%id, "events.unsubscribe");
		Ok(())
	}

	/// Enqueues a document-opened notification.
	///
	/// The event is queued before this returns; the returned future only
	/// waits for delivery to finish.
	pub fn document_opened(
		&self,
		checksum: Checksum,
		document_id: DocumentId,
		cancel: &CancellationToken,
	) -> impl Future<Output = Result<(), BrokerError>> + Send + use<> {
		self.enqueue_document(DocumentAction::Opened, checksum, document_id, cancel)
	}

	/// Enqueues a document-closed notification. See [`document_opened`](Self::document_opened).
	pub fn document_closed(
		&self,
		checksum: Checksum,
		document_id: DocumentId,
		cancel: &CancellationToken,
	) -> impl Future<Output = Result<(), BrokerError>> + Send + use<> {
		self.enqueue_document(DocumentAction::Closed, checksum, document_id, cancel)
	}

	/// Enqueues a workspace change. See [`document_opened`](Self::document_opened).
	pub fn workspace_changed(&self, change: ChangeEvent, cancel: &CancellationToken) -> impl Future<Output = Result<(), BrokerError>> + Send + use<> {
		let (reply, rx) = oneshot::channel();
		let queued = self.ensure_open().and_then(|()| {
			self.inner.changes.send(Cmd::Event {
				event: change,
				cancel: cancel.clone(),
				reply,
			})
		});
		ack(queued, rx)
	}

	/// Stops accepting events and waits for both loops to drain what was
	/// already queued.
	pub async fn shutdown(&self) {
		let Some((documents, changes)) = self.close() else {
			return;
		};
		let _ = documents.await;
		let _ = changes.await;
		tracing::debug!("events.shutdown");
	}

	/// Stops accepting events without waiting. Returns the loops' exit
	/// signals on the first call.
	pub(crate) fn close(&self) -> Option<(oneshot::Receiver<()>, oneshot::Receiver<()>)> {
		if self.inner.closed.swap(true, Ordering::AcqRel) {
			return None;
		}
		let (documents_reply, documents) = oneshot::channel();
		let (changes_reply, changes) = oneshot::channel();
		let _ = self.inner.documents.send(Cmd::Shutdown { reply: documents_reply });
		let _ = self.inner.changes.send(Cmd::Shutdown { reply: changes_reply });
		Some((documents, changes))
	}

	fn ensure_open(&self) -> Result<(), BrokerError> {
		if self.inner.closed.load(Ordering::Acquire) {
			return Err(BrokerError::ChannelClosed);
		}
		Ok(())
	}

	fn enqueue_document(
		&self,
		action: DocumentAction,
		checksum: Checksum,
		document_id: DocumentId,
		cancel: &CancellationToken,
	) -> impl Future<Output = Result<(), BrokerError>> + Send + use<> {
		let (reply, rx) = oneshot::channel();
		let queued = self.ensure_open().and_then(|()| {
			self.inner.documents.send(Cmd::Event {
				event: (action, DocumentNotification { checksum, document_id }),
				cancel: cancel.clone(),
				reply,
			})
		});
		ack(queued, rx)
	}
}

async fn ack(queued: Result<(), BrokerError>, rx: oneshot::Receiver<Result<(), BrokerError>>) -> Result<(), BrokerError> {
	queued?;
	rx.await.unwrap_or(Err(BrokerError::ChannelClosed))
}

async fn run_documents(mut rx: mpsc::UnboundedReceiver<DocumentCmd>, resolver: SnapshotResolver, depth: Arc<AtomicUsize>) {
	let mut listeners = Listeners::new();
	while let Some(cmd) = rx.recv().await {
		depth.fetch_sub(1, Ordering::AcqRel);
		match cmd {
			Cmd::Event {
				event: (action, notification),
				cancel,
				reply,
			} => {
				let result = deliver_document(&resolver, &listeners, action, notification, &cancel).await;
				let _ = reply.send(result);
			}
			Cmd::Subscribe { id, listener } => listeners.push((id, listener)),
			Cmd::Unsubscribe { id } => listeners.retain(|(existing, _)| *existing != id),
			Cmd::Shutdown { reply } => {
				let _ = reply.send(());
				break;
			}
		}
	}
	tracing::debug!(queue = "documents", "events.loop_exit");
}

async fn run_changes(mut rx: mpsc::UnboundedReceiver<ChangeCmd>, resolver: SnapshotResolver, depth: Arc<AtomicUsize>) {
	let mut listeners = Listeners::new();
	while let Some(cmd) = rx.recv().await {
		depth.fetch_sub(1, Ordering::AcqRel);
		match cmd {
			Cmd::Event { event, cancel, reply } => {
				let result = deliver_change(&resolver, &listeners, event, &cancel).await;
				let _ = reply.send(result);
			}
			Cmd::Subscribe { id, listener } => listeners.push((id, listener)),
			Cmd::Unsubscribe { id } => listeners.retain(|(existing, _)| *existing != id),
			Cmd::Shutdown { reply } => {
				let _ = reply.send(());
				break;
			}
		}
	}
	tracing::debug!(queue = "changes", "events.loop_exit");
}

async fn deliver_document(
	resolver: &SnapshotResolver,
	listeners: &Listeners,
	action: DocumentAction,
	notification: DocumentNotification,
	cancel: &CancellationToken,
) -> Result<(), BrokerError> {
	let DocumentNotification { checksum, document_id } = notification;
	let operation = move |snapshot: Snapshot, cancel: CancellationToken| async move {
		let Some(project) = snapshot.solution().project_of(&document_id).cloned() else {
			return Err(BrokerError::DocumentNotFound { checksum, document_id });
		};
		let Some(document) = project.document(&document_id).cloned() else {
			return Err(BrokerError::DocumentNotFound { checksum, document_id });
		};
		let event = DocumentEvent {
			snapshot,
			document,
			project_id: project.id().clone(),
		};
		let notification = match action {
			DocumentAction::Opened => Notification::Opened(&event),
			DocumentAction::Closed => Notification::Closed(&event),
		};
		notify_all(listeners, notification, &cancel).await
	};
	Ok(resolver.run_against_snapshot(checksum, operation, cancel).await?)
}

async fn deliver_change(resolver: &SnapshotResolver, listeners: &Listeners, event: ChangeEvent, cancel: &CancellationToken) -> Result<(), BrokerError> {
	let ChangeEvent {
		old,
		new,
		kind,
		project_id,
		document_id,
	} = event;
	let operation = move |old: Snapshot, new: Snapshot, cancel: CancellationToken| async move {
		let change = WorkspaceChange {
			old,
			new,
			kind,
			project_id,
			document_id,
		};
		notify_all(listeners, Notification::Changed(&change), &cancel).await
	};
	Ok(resolver.run_against_snapshots(old, new, operation, cancel).await?)
}

#[derive(Clone, Copy)]
enum Notification<'a> {
	Opened(&'a DocumentEvent),
	Closed(&'a DocumentEvent),
	Changed(&'a WorkspaceChange),
}

impl Notification<'_> {
	fn name(&self) -> &'static str {
		match self {
			Self::Opened(_) => DocumentAction::Opened.as_str(),
			Self::Closed(_) => DocumentAction::Closed.as_str(),
			Self::Changed(change) => change.kind.as_str(),
		}
	}
}

/// Calls every listener in registration order. A failing listener does not
/// stop delivery to the rest; the first failure is reported.
async fn notify_all(listeners: &Listeners, notification: Notification<'_>, cancel: &CancellationToken) -> Result<(), BrokerError> {
	let mut first_error = None;
	for (id, listener) in listeners {
		let result = match notification {
			Notification::Opened(event) => listener.document_opened(event, cancel).await,
			Notification::Closed(event) => listener.document_closed(event, cancel).await,
			Notification::Changed(change) => listener.workspace_changed(change, cancel).await,
		};
		if let Err(source) = result {
			tracing::warn!(listener = %id, event = notification.name(), error = %source, "events.listener_failed");
			if first_error.is_none() {
				first_error = Some(BrokerError::Listener { listener: *id, source });
			}
		}
	}
	first_error.map_or(Ok(()), Err)
}
