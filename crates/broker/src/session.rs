use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use trellis_assets::AssetCache;
use trellis_sync::{AssetSource, AssetSynchronizer};
use trellis_worker::{SessionClock, SessionScope};

use crate::registry::ServiceInstance;
use crate::{Capability, EventChannel, RegistryError, ServiceContext, ServiceKey, ServiceRegistry, SnapshotResolver, TrellisConfig};

/// Per-connection state of one remote process.
///
/// Owns the connection's session scope, its resolver and event channel, and
/// the service instances constructed for it. Everything is torn down by
/// [`disconnect`](Self::disconnect) or on drop.
pub struct RemoteSession {
	scope: SessionScope,
	resolver: SnapshotResolver,
	events: EventChannel,
	registry: Arc<ServiceRegistry>,
	services: Mutex<FxHashMap<ServiceKey, ServiceInstance>>,
}

impl std::fmt::Debug for RemoteSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RemoteSession")
			.field("generation", &self.scope.generation())
			.field("connected", &self.is_connected())
			.field("services", &self.services.lock().len())
			.finish()
	}
}

impl RemoteSession {
	/// Opens a session over `source`, sharing the process-wide `cache`.
	pub fn connect(clock: &SessionClock, cache: AssetCache, source: Arc<dyn AssetSource>, registry: Arc<ServiceRegistry>, config: &TrellisConfig) -> Self {
		let scope = clock.open();
		let sync = AssetSynchronizer::with_config(cache, source, &config.sync);
		let resolver = SnapshotResolver::new(sync, scope.nested());
		let events = EventChannel::start(resolver.clone(), &config.events);
		tracing::info!(generation = scope.generation(), "session.connect");
		Self {
			scope,
			resolver,
			events,
			registry,
			services: Mutex::new(FxHashMap::default()),
		}
	}

	pub fn generation(&self) -> u64 {
		self.scope.generation()
	}

	pub fn is_connected(&self) -> bool {
		!self.scope.is_closed()
	}

	pub fn resolver(&self) -> &SnapshotResolver {
		&self.resolver
	}

	pub fn events(&self) -> &EventChannel {
		&self.events
	}

	/// Returns the session's instance of a registered service, constructing it
	/// on first use.
	pub fn service<T: Send + Sync + 'static>(&self, capability: Capability, tag: &str) -> Result<Arc<T>, RegistryError> {
		if !self.is_connected() {
			return Err(RegistryError::Disconnected);
		}
		let key = ServiceKey::new(capability, tag);
		let instance = {
			let mut services = self.services.lock();
			match services.get(&key) {
				Some(instance) => instance.clone(),
				None => {
					let cx = ServiceContext {
						generation: self.generation(),
						resolver: &self.resolver,
						events: &self.events,
					};
					let instance = self.registry.construct(&key, &cx)?;
					tracing::debug!(generation = self.generation(), service = %key, "session.service_constructed");
					services.insert(key.clone(), instance.clone());
					instance
				}
			}
		};
		instance.downcast::<T>().map_err(|_| RegistryError::TypeMismatch {
			key,
			expected: std::any::type_name::<T>(),
		})
	}

	/// Cancels every pending dispatch of this session, closes its event
	/// channel and drops its services. Idempotent.
	pub fn disconnect(&self) {
		if self.scope.is_closed() {
			return;
		}
		self.scope.close();
		let _ = self.events.close();
		let dropped = std::mem::take(&mut *self.services.lock()).len();
		tracing::info!(
			generation = self.generation(),
			services = dropped,
			draining_tasks = self.scope.live_tasks(),
			"session.disconnect"
		);
	}
}

impl Drop for RemoteSession {
	fn drop(&mut self) {
		self.disconnect();
	}
}
