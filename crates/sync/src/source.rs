use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use trellis_primitives::Checksum;

use crate::SyncError;

/// Host-side answer to "give me these payloads".
///
/// Implementations return exactly one payload per requested checksum, in
/// request order, or fail the whole call.
#[async_trait]
pub trait AssetSource: Send + Sync {
	async fn get_missing_assets(&self, checksums: &[Checksum], cancel: &CancellationToken) -> Result<Vec<Bytes>, SyncError>;
}

#[async_trait]
impl<T: AssetSource + ?Sized> AssetSource for Arc<T> {
	async fn get_missing_assets(&self, checksums: &[Checksum], cancel: &CancellationToken) -> Result<Vec<Bytes>, SyncError> {
		(**self).get_missing_assets(checksums, cancel).await
	}
}

/// An [`AssetSource`] whose upstream connection is attached after construction.
///
/// Requests issued before [`attach`](Self::attach) wait on a readiness signal
/// and proceed as soon as the upstream appears.
pub struct LateBoundSource {
	upstream: watch::Sender<Option<Arc<dyn AssetSource>>>,
}

impl Default for LateBoundSource {
	fn default() -> Self {
		Self::new()
	}
}

impl LateBoundSource {
	pub fn new() -> Self {
		let (upstream, _) = watch::channel(None);
		Self { upstream }
	}

	/// Attaches the upstream. Returns false (and keeps the first) if one is already attached.
	pub fn attach(&self, source: Arc<dyn AssetSource>) -> bool {
		let mut source = Some(source);
		let attached = self.upstream.send_if_modified(|slot| {
			if slot.is_some() {
				return false;
			}
			*slot = source.take();
			true
		});
		if attached {
			tracing::debug!("sync.source_attached");
		}
		attached
	}

	pub fn is_attached(&self) -> bool {
		self.upstream.borrow().is_some()
	}
}

#[async_trait]
impl AssetSource for LateBoundSource {
	async fn get_missing_assets(&self, checksums: &[Checksum], cancel: &CancellationToken) -> Result<Vec<Bytes>, SyncError> {
		let mut ready = self.upstream.subscribe();
		let upstream = tokio::select! {
			_ = cancel.cancelled() => return Err(SyncError::Cancelled),
			upstream = attached(&mut ready) => upstream?,
		};
		upstream.get_missing_assets(checksums, cancel).await
	}
}

async fn attached(ready: &mut watch::Receiver<Option<Arc<dyn AssetSource>>>) -> Result<Arc<dyn AssetSource>, SyncError> {
	let slot = ready.wait_for(Option::is_some).await.map_err(|_| SyncError::Disconnected)?.clone();
	slot.ok_or(SyncError::Disconnected)
}
