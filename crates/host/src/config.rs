use serde::Deserialize;

/// Host-side retention settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
	/// Number of most recent solution versions whose payloads stay servable.
	/// Clamped to at least one.
	pub retained_versions: usize,
}

impl Default for HostConfig {
	fn default() -> Self {
		Self { retained_versions: 8 }
	}
}
