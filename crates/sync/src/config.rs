use serde::Deserialize;

/// Synchronizer tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
	/// Most recently materialized solutions kept alive after their last user
	/// drops them, so the next request against a recent root starts warm.
	pub retained_snapshots: usize,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self { retained_snapshots: 4 }
	}
}
