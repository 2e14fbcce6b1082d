use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::{EventChannel, SnapshotResolver};

/// Analysis capability a brokered service provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
	BraceMatching,
	KeywordHighlighting,
	TestDiscovery,
	FixAllSpans,
}

impl Capability {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::BraceMatching => "brace_matching",
			Self::KeywordHighlighting => "keyword_highlighting",
			Self::TestDiscovery => "test_discovery",
			Self::FixAllSpans => "fix_all_spans",
		}
	}
}

impl fmt::Display for Capability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Registry key: a capability plus a category tag (typically a language).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey {
	pub capability: Capability,
	pub tag: String,
}

impl ServiceKey {
	pub fn new(capability: Capability, tag: impl Into<String>) -> Self {
		Self { capability, tag: tag.into() }
	}
}

impl fmt::Display for ServiceKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.capability, self.tag)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
	#[error("service {0} registered twice")]
	Duplicate(ServiceKey),
	#[error("no service registered for {0}")]
	NotRegistered(ServiceKey),
	#[error("service {key} is not a {expected}")]
	TypeMismatch { key: ServiceKey, expected: &'static str },
	#[error("session is disconnected")]
	Disconnected,
}

/// What a service constructor may use: the owning session's resolver and events.
#[derive(Debug)]
pub struct ServiceContext<'a> {
	pub generation: u64,
	pub resolver: &'a SnapshotResolver,
	pub events: &'a EventChannel,
}

pub(crate) type ServiceInstance = Arc<dyn Any + Send + Sync>;
type Constructor = Box<dyn Fn(&ServiceContext<'_>) -> ServiceInstance + Send + Sync>;

/// Collects service constructors at startup.
#[derive(Default)]
pub struct ServiceRegistryBuilder {
	constructors: BTreeMap<ServiceKey, Constructor>,
	duplicate: Option<ServiceKey>,
}

impl ServiceRegistryBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a constructor. A key registered twice fails [`build`](Self::build).
	#[must_use]
	pub fn register<T, F>(mut self, capability: Capability, tag: impl Into<String>, constructor: F) -> Self
	where
		T: Send + Sync + 'static,
		F: Fn(&ServiceContext<'_>) -> T + Send + Sync + 'static,
	{
		let key = ServiceKey::new(capability, tag);
		if self.constructors.contains_key(&key) {
			if self.duplicate.is_none() {
				self.duplicate = Some(key);
			}
			return self;
		}
		self.constructors.insert(key, Box::new(move |cx| Arc::new(constructor(cx)) as ServiceInstance));
		self
	}

	pub fn build(self) -> Result<ServiceRegistry, RegistryError> {
		if let Some(key) = self.duplicate {
			return Err(RegistryError::Duplicate(key));
		}
		Ok(ServiceRegistry {
			constructors: self.constructors,
		})
	}
}

/// Immutable `(capability, tag) → constructor` table shared by all sessions.
pub struct ServiceRegistry {
	constructors: BTreeMap<ServiceKey, Constructor>,
}

impl fmt::Debug for ServiceRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.constructors.keys()).finish()
	}
}

impl ServiceRegistry {
	pub fn builder() -> ServiceRegistryBuilder {
		ServiceRegistryBuilder::new()
	}

	pub fn contains(&self, key: &ServiceKey) -> bool {
		self.constructors.contains_key(key)
	}

	/// Registered keys in order.
	pub fn keys(&self) -> impl Iterator<Item = &ServiceKey> {
		self.constructors.keys()
	}

	pub(crate) fn construct(&self, key: &ServiceKey, cx: &ServiceContext<'_>) -> Result<ServiceInstance, RegistryError> {
		let constructor = self.constructors.get(key).ok_or_else(|| RegistryError::NotRegistered(key.clone()))?;
		Ok(constructor(cx))
	}
}
