use std::fmt;

use trellis_primitives::{Checksum, DocumentId};
use trellis_sync::SyncError;

/// Outcome of a brokered dispatch that did not produce a value.
///
/// Every variant except [`Operation`](Self::Operation) is raised before or
/// around the operation; `Operation` carries the operation's own error.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError<E> {
	/// The root (or a node under it) is unknown to the host. The caller should
	/// resynchronize from the current root.
	#[error("snapshot {0} unavailable; resync required")]
	SnapshotUnavailable(Checksum),
	#[error("{0}")]
	ConsistencyFault(#[source] SyncError),
	/// Materialization failed for a reason other than the above.
	#[error("failed to materialize snapshot: {0}")]
	Materialize(#[source] SyncError),
	#[error("dispatch cancelled")]
	Cancelled,
	#[error("session disconnected")]
	Disconnected,
	#[error("operation failed: {0}")]
	Operation(#[source] E),
}

impl<E> DispatchError<E> {
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}
}

impl<E> From<SyncError> for DispatchError<E> {
	fn from(err: SyncError) -> Self {
		match err {
			SyncError::UnknownChecksum(checksum) => Self::SnapshotUnavailable(checksum),
			SyncError::Cancelled => Self::Cancelled,
			SyncError::Disconnected => Self::Disconnected,
			err if err.is_consistency_fault() => Self::ConsistencyFault(err),
			err => Self::Materialize(err),
		}
	}
}

/// Error returned by a [`WorkspaceListener`](crate::WorkspaceListener).
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ListenerError(String);

impl ListenerError {
	pub fn new(message: impl fmt::Display) -> Self {
		Self(message.to_string())
	}
}

/// Identifies one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl fmt::Display for ListenerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "listener#{}", self.0)
	}
}

/// Errors surfaced by the event channel and sessions.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
	#[error("snapshot {0} unavailable; resync required")]
	SnapshotUnavailable(Checksum),
	#[error("{0}")]
	ConsistencyFault(#[source] SyncError),
	#[error("failed to materialize snapshot: {0}")]
	Materialize(#[source] SyncError),
	#[error("cancelled")]
	Cancelled,
	#[error("session disconnected")]
	Disconnected,
	#[error("document {document_id:?} is not part of snapshot {checksum}")]
	DocumentNotFound { checksum: Checksum, document_id: DocumentId },
	#[error("{listener} failed: {source}")]
	Listener {
		listener: ListenerId,
		#[source]
		source: ListenerError,
	},
	#[error("event channel closed")]
	ChannelClosed,
}

impl From<DispatchError<BrokerError>> for BrokerError {
	fn from(err: DispatchError<BrokerError>) -> Self {
		match err {
			DispatchError::SnapshotUnavailable(checksum) => Self::SnapshotUnavailable(checksum),
			DispatchError::ConsistencyFault(err) => Self::ConsistencyFault(err),
			DispatchError::Materialize(err) => Self::Materialize(err),
			DispatchError::Cancelled => Self::Cancelled,
			DispatchError::Disconnected => Self::Disconnected,
			DispatchError::Operation(err) => err,
		}
	}
}
