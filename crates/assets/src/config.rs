use serde::Deserialize;

/// Default byte budget for cached payloads (256 MiB).
pub const DEFAULT_MAX_BYTES: usize = 256 * 1024 * 1024;

/// Asset cache sizing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
	/// Total payload bytes retained before unpinned entries are evicted.
	pub max_bytes: usize,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			max_bytes: DEFAULT_MAX_BYTES,
		}
	}
}
