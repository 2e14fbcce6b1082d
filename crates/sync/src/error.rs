use trellis_assets::AssetError;
use trellis_graph::{AssembleError, PayloadError};
use trellis_primitives::Checksum;

/// Failures while pulling payloads from the host or assembling a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	/// The host no longer has (or never had) this checksum. Callers resync from
	/// a fresh root; the synchronizer does not retry.
	#[error("unknown checksum {0}")]
	UnknownChecksum(Checksum),
	/// A cached entry disagreed with an arriving payload.
	#[error(transparent)]
	Consistency(#[from] AssetError),
	/// An arriving payload does not hash to the checksum it was requested under.
	#[error("consistency fault: payload requested as {requested} hashes to {actual}")]
	Mismatch { requested: Checksum, actual: Checksum },
	#[error("payload for {checksum} is malformed: {source}")]
	Decode {
		checksum: Checksum,
		#[source]
		source: PayloadError,
	},
	#[error(transparent)]
	Assemble(#[from] AssembleError),
	/// The source answered with the wrong number of payloads.
	#[error("protocol violation: requested {requested} payloads, received {received}")]
	Protocol { requested: usize, received: usize },
	/// The source failed for a reason it reported only as text.
	#[error("asset source failed: {0}")]
	Source(String),
	#[error("synchronization cancelled")]
	Cancelled,
	#[error("asset source disconnected")]
	Disconnected,
}

impl SyncError {
	/// True for both flavours of checksum/payload disagreement.
	pub fn is_consistency_fault(&self) -> bool {
		matches!(self, Self::Consistency(_) | Self::Mismatch { .. })
	}
}
