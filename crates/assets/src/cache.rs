use std::sync::Arc;

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use trellis_primitives::Checksum;

use crate::CacheConfig;

/// One cached node: its payload bytes and its children's checksums in declared order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
	payload: Bytes,
	children: Arc<[Checksum]>,
}

impl Asset {
	pub fn new(payload: impl Into<Bytes>, children: impl Into<Arc<[Checksum]>>) -> Self {
		Self {
			payload: payload.into(),
			children: children.into(),
		}
	}

	pub fn payload(&self) -> &Bytes {
		&self.payload
	}

	pub fn children(&self) -> &[Checksum] {
		&self.children
	}

	pub fn len(&self) -> usize {
		self.payload.len()
	}

	pub fn is_empty(&self) -> bool {
		self.payload.is_empty()
	}
}

/// Result of a successful insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
	/// Checksum was new.
	Inserted,
	/// Checksum was cached with identical bytes; nothing changed.
	AlreadyPresent,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetError {
	/// One checksum, two payloads: a hash collision or a corrupted transfer.
	#[error("consistency fault: {checksum} maps to two different payloads ({existing_len} vs {incoming_len} bytes)")]
	ConsistencyFault {
		checksum: Checksum,
		existing_len: usize,
		incoming_len: usize,
	},
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
	pub entries: usize,
	pub bytes: usize,
	pub pinned_entries: usize,
	pub evictions: u64,
}

struct Entry {
	asset: Asset,
	pins: u32,
}

struct CacheState {
	entries: FxHashMap<Checksum, Entry>,
	/// Unpinned entries, most recently unpinned (or inserted) at the front.
	unpinned: LruCache<Checksum, ()>,
	bytes: usize,
	evictions: u64,
}

struct CacheInner {
	config: CacheConfig,
	state: Mutex<CacheState>,
}

/// Process-wide asset cache. Cloning shares the same table.
#[derive(Clone)]
pub struct AssetCache {
	inner: Arc<CacheInner>,
}

impl std::fmt::Debug for AssetCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AssetCache").field("stats", &self.stats()).finish()
	}
}

impl Default for AssetCache {
	fn default() -> Self {
		Self::new(CacheConfig::default())
	}
}

impl AssetCache {
	pub fn new(config: CacheConfig) -> Self {
		Self {
			inner: Arc::new(CacheInner {
				config,
				state: Mutex::new(CacheState {
					entries: FxHashMap::default(),
					unpinned: LruCache::unbounded(),
					bytes: 0,
					evictions: 0,
				}),
			}),
		}
	}

	/// Inserts an asset without pinning it.
	///
	/// Idempotent for equal payloads; a differing payload is reported and the
	/// cached entry is left untouched.
	pub fn insert(&self, checksum: Checksum, asset: Asset) -> Result<InsertOutcome, AssetError> {
		let mut state = self.inner.state.lock();
		let outcome = insert_locked(&mut state, checksum, asset)?;
		if outcome == InsertOutcome::Inserted {
			state.unpinned.put(checksum, ());
			self.evict_locked(&mut state);
		}
		Ok(outcome)
	}

	/// Inserts an asset and pins it under `handle` in one step, so it cannot be
	/// evicted between arrival and use.
	pub fn insert_pinned(&self, handle: &mut PinHandle, checksum: Checksum, asset: Asset) -> Result<InsertOutcome, AssetError> {
		debug_assert!(handle.belongs_to(self), "pin handle used with a foreign cache");
		let mut state = self.inner.state.lock();
		let outcome = insert_locked(&mut state, checksum, asset)?;
		if outcome == InsertOutcome::Inserted {
			state.unpinned.put(checksum, ());
		}
		pin_locked(&mut state, &mut handle.pinned, checksum);
		self.evict_locked(&mut state);
		Ok(outcome)
	}

	pub fn try_get(&self, checksum: &Checksum) -> Option<Asset> {
		let mut state = self.inner.state.lock();
		let asset = state.entries.get(checksum).map(|entry| entry.asset.clone())?;
		// Reads count as use for LRU purposes.
		state.unpinned.promote(checksum);
		Some(asset)
	}

	pub fn contains(&self, checksum: &Checksum) -> bool {
		self.inner.state.lock().entries.contains_key(checksum)
	}

	/// Pins `root` and everything reachable from it that is currently cached.
	pub fn pin(&self, root: Checksum) -> PinHandle {
		let mut handle = self.lease();
		handle.extend_reachable(root);
		handle
	}

	/// An empty handle that callers fill one entry at a time.
	pub fn lease(&self) -> PinHandle {
		PinHandle {
			cache: self.clone(),
			pinned: FxHashSet::default(),
		}
	}

	/// Pins a single entry under `handle` without reading it. Returns false if absent.
	pub fn pin_one(&self, handle: &mut PinHandle, checksum: &Checksum) -> bool {
		debug_assert!(handle.belongs_to(self), "pin handle used with a foreign cache");
		pin_locked(&mut self.inner.state.lock(), &mut handle.pinned, *checksum)
	}

	/// Reads an asset and pins it under `handle` atomically. Returns `None` if absent.
	pub fn pin_get(&self, handle: &mut PinHandle, checksum: &Checksum) -> Option<Asset> {
		debug_assert!(handle.belongs_to(self), "pin handle used with a foreign cache");
		let mut state = self.inner.state.lock();
		if !pin_locked(&mut state, &mut handle.pinned, *checksum) {
			return None;
		}
		state.entries.get(checksum).map(|entry| entry.asset.clone())
	}

	/// Current pin count for a checksum; zero if unpinned or absent.
	pub fn pin_count(&self, checksum: &Checksum) -> u32 {
		self.inner.state.lock().entries.get(checksum).map_or(0, |entry| entry.pins)
	}

	pub fn stats(&self) -> CacheStats {
		let state = self.inner.state.lock();
		CacheStats {
			entries: state.entries.len(),
			bytes: state.bytes,
			pinned_entries: state.entries.len() - state.unpinned.len(),
			evictions: state.evictions,
		}
	}

	fn release(&self, pinned: &FxHashSet<Checksum>) {
		let mut guard = self.inner.state.lock();
		let state = &mut *guard;
		for checksum in pinned {
			let Some(entry) = state.entries.get_mut(checksum) else {
				debug_assert!(false, "pinned entry {checksum:?} disappeared");
				continue;
			};
			entry.pins = entry.pins.saturating_sub(1);
			if entry.pins == 0 {
				state.unpinned.put(*checksum, ());
			}
		}
		self.evict_locked(state);
	}

	fn evict_locked(&self, state: &mut CacheState) {
		let budget = self.inner.config.max_bytes;
		while state.bytes > budget {
			let Some((checksum, ())) = state.unpinned.pop_lru() else {
				tracing::trace!(bytes = state.bytes, budget, "asset_cache.over_budget_all_pinned");
				break;
			};
			if let Some(entry) = state.entries.remove(&checksum) {
				debug_assert_eq!(entry.pins, 0);
				state.bytes -= entry.asset.len();
				state.evictions += 1;
				tracing::trace!(checksum = %checksum.short(), bytes = entry.asset.len(), "asset_cache.evict");
			}
		}
	}
}

fn insert_locked(state: &mut CacheState, checksum: Checksum, asset: Asset) -> Result<InsertOutcome, AssetError> {
	if let Some(existing) = state.entries.get(&checksum) {
		if existing.asset.payload == asset.payload {
			return Ok(InsertOutcome::AlreadyPresent);
		}
		tracing::error!(
			checksum = %checksum,
			existing_len = existing.asset.len(),
			incoming_len = asset.len(),
			"asset_cache.consistency_fault"
		);
		return Err(AssetError::ConsistencyFault {
			checksum,
			existing_len: existing.asset.len(),
			incoming_len: asset.len(),
		});
	}
	state.bytes += asset.len();
	state.entries.insert(checksum, Entry { asset, pins: 0 });
	Ok(InsertOutcome::Inserted)
}

/// Pins one present entry into `pinned` unless the handle already holds it.
/// Returns false if the entry is absent.
fn pin_locked(state: &mut CacheState, pinned: &mut FxHashSet<Checksum>, checksum: Checksum) -> bool {
	let Some(entry) = state.entries.get_mut(&checksum) else {
		return false;
	};
	if pinned.insert(checksum) {
		entry.pins += 1;
		if entry.pins == 1 {
			state.unpinned.pop(&checksum);
		}
	}
	true
}

/// Scoped lease on cached entries. Dropping it releases every pin it took.
pub struct PinHandle {
	cache: AssetCache,
	pinned: FxHashSet<Checksum>,
}

impl PinHandle {
	/// Pins everything reachable from `root` that is cached and not yet held by this handle.
	pub fn extend_reachable(&mut self, root: Checksum) {
		let mut state = self.cache.inner.state.lock();
		// Descend through already-held nodes too: their children may have
		// arrived after they were pinned.
		let mut visited = FxHashSet::default();
		let mut stack = vec![root];
		while let Some(checksum) = stack.pop() {
			if !visited.insert(checksum) || !pin_locked(&mut state, &mut self.pinned, checksum) {
				continue;
			}
			if let Some(entry) = state.entries.get(&checksum) {
				stack.extend(entry.asset.children().iter().copied());
			}
		}
	}

	pub fn contains(&self, checksum: &Checksum) -> bool {
		self.pinned.contains(checksum)
	}

	/// Number of distinct checksums held.
	pub fn len(&self) -> usize {
		self.pinned.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pinned.is_empty()
	}

	fn belongs_to(&self, cache: &AssetCache) -> bool {
		Arc::ptr_eq(&self.cache.inner, &cache.inner)
	}
}

impl std::fmt::Debug for PinHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PinHandle").field("pinned", &self.pinned.len()).finish()
	}
}

impl Drop for PinHandle {
	fn drop(&mut self) {
		if !self.pinned.is_empty() {
			self.cache.release(&self.pinned);
		}
	}
}
