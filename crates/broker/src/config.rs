use std::path::{Path, PathBuf};

use serde::Deserialize;
use trellis_assets::CacheConfig;
use trellis_host::HostConfig;
use trellis_sync::SyncConfig;

/// Event queue tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsConfig {
	/// Pending events per queue above which each enqueue logs a warning.
	pub queue_warn_depth: usize,
}

impl Default for EventsConfig {
	fn default() -> Self {
		Self { queue_warn_depth: 1024 }
	}
}

/// Top-level configuration file.
///
/// ```toml
/// [cache]
/// max_bytes = 268435456
///
/// [events]
/// queue_warn_depth = 1024
///
/// [host]
/// retained_versions = 8
///
/// [sync]
/// retained_snapshots = 4
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrellisConfig {
	pub cache: CacheConfig,
	pub events: EventsConfig,
	pub host: HostConfig,
	pub sync: SyncConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("invalid configuration: {0}")]
	Parse(#[from] toml::de::Error),
}

impl TrellisConfig {
	pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(text)?)
	}

	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		let config = Self::from_toml_str(&text)?;
		tracing::debug!(path = %path.display(), ?config, "config.loaded");
		Ok(config)
	}
}
