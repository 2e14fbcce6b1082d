//! Request/response types exchanged between the host and a remote process.
//!
//! Byte encoding is left to the transport; these types only fix the shape of
//! each message and the error codes that cross the boundary.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use trellis_host::HostAssetStore;
use trellis_primitives::{ChangeEvent, Checksum, DocumentNotification};
use trellis_sync::{AssetSource, SyncError};

use crate::{BrokerError, EventChannel};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestPayload {
	/// Remote → host: payloads for these checksums, in this order.
	GetMissingAssets { checksums: Vec<Checksum> },
	/// Host → remote.
	DocumentOpened(DocumentNotification),
	/// Host → remote.
	DocumentClosed(DocumentNotification),
	/// Host → remote.
	WorkspaceChanged(ChangeEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponsePayload {
	Assets { payloads: Vec<Bytes> },
	Ack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
	/// The receiver does not have this checksum; the sender must resync.
	UnknownChecksum(Checksum),
	ConsistencyFault,
	Cancelled,
	Disconnected,
	DocumentNotFound,
	ListenerFailed,
	ChannelClosed,
	/// The endpoint does not serve this request kind.
	Unsupported,
	Internal,
}

impl ErrorCode {
	/// Reconstructs the closest [`SyncError`] on the requesting side.
	pub fn into_sync_error(self) -> SyncError {
		match self {
			Self::UnknownChecksum(checksum) => SyncError::UnknownChecksum(checksum),
			Self::Cancelled => SyncError::Cancelled,
			Self::Disconnected | Self::ChannelClosed => SyncError::Disconnected,
			other => SyncError::Source(format!("{other:?}")),
		}
	}
}

impl From<&SyncError> for ErrorCode {
	fn from(err: &SyncError) -> Self {
		match err {
			SyncError::UnknownChecksum(checksum) => Self::UnknownChecksum(*checksum),
			SyncError::Cancelled => Self::Cancelled,
			SyncError::Disconnected => Self::Disconnected,
			err if err.is_consistency_fault() => Self::ConsistencyFault,
			_ => Self::Internal,
		}
	}
}

impl From<&BrokerError> for ErrorCode {
	fn from(err: &BrokerError) -> Self {
		match err {
			BrokerError::SnapshotUnavailable(checksum) => Self::UnknownChecksum(*checksum),
			BrokerError::ConsistencyFault(_) => Self::ConsistencyFault,
			BrokerError::Materialize(_) => Self::Internal,
			BrokerError::Cancelled => Self::Cancelled,
			BrokerError::Disconnected => Self::Disconnected,
			BrokerError::DocumentNotFound { .. } => Self::DocumentNotFound,
			BrokerError::Listener { .. } => Self::ListenerFailed,
			BrokerError::ChannelClosed => Self::ChannelClosed,
		}
	}
}

type AckFuture = Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send>>;

/// Remote-side router: turns host notifications into event channel calls.
#[derive(Debug, Clone)]
pub struct RemoteEndpoint {
	events: EventChannel,
}

impl RemoteEndpoint {
	pub fn new(events: EventChannel) -> Self {
		Self { events }
	}

	/// Routes one request. Notifications are enqueued before this returns, so
	/// requests handled in sequence are delivered in that sequence.
	pub fn handle(&self, request: RequestPayload, cancel: &CancellationToken) -> impl Future<Output = Result<ResponsePayload, ErrorCode>> + Send + use<> {
		let ack: Result<AckFuture, ErrorCode> = match request {
			RequestPayload::DocumentOpened(n) => Ok(Box::pin(self.events.document_opened(n.checksum, n.document_id, cancel))),
			RequestPayload::DocumentClosed(n) => Ok(Box::pin(self.events.document_closed(n.checksum, n.document_id, cancel))),
			RequestPayload::WorkspaceChanged(change) => Ok(Box::pin(self.events.workspace_changed(change, cancel))),
			RequestPayload::GetMissingAssets { .. } => Err(ErrorCode::Unsupported),
		};
		async move {
			ack?.await.map_err(|err| ErrorCode::from(&err))?;
			Ok(ResponsePayload::Ack)
		}
	}
}

/// Host-side router: serves payload requests from the authoritative store.
#[derive(Debug, Clone)]
pub struct HostEndpoint {
	store: HostAssetStore,
}

impl HostEndpoint {
	pub fn new(store: HostAssetStore) -> Self {
		Self { store }
	}

	pub async fn handle(&self, request: RequestPayload, cancel: &CancellationToken) -> Result<ResponsePayload, ErrorCode> {
		match request {
			RequestPayload::GetMissingAssets { checksums } => {
				let payloads = self.store.get_missing_assets(&checksums, cancel).await.map_err(|err| ErrorCode::from(&err))?;
				Ok(ResponsePayload::Assets { payloads })
			}
			_ => Err(ErrorCode::Unsupported),
		}
	}
}

/// Lets a remote synchronizer talk to the host through the request types.
#[async_trait]
impl AssetSource for HostEndpoint {
	async fn get_missing_assets(&self, checksums: &[Checksum], cancel: &CancellationToken) -> Result<Vec<Bytes>, SyncError> {
		let request = RequestPayload::GetMissingAssets {
			checksums: checksums.to_vec(),
		};
		match self.handle(request, cancel).await {
			Ok(ResponsePayload::Assets { payloads }) => Ok(payloads),
			Ok(ResponsePayload::Ack) => Err(SyncError::Protocol {
				requested: checksums.len(),
				received: 0,
			}),
			Err(code) => Err(code.into_sync_error()),
		}
	}
}
