use std::sync::Arc;

use bytes::Bytes;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio_util::sync::CancellationToken;
use trellis_assets::{Asset, AssetCache, PinHandle};
use trellis_graph::{DocumentNode, NodeLookup, NodePayload, ProjectNode, SolutionNode, assemble_with};
use trellis_primitives::Checksum;

use crate::memo::{Held, SubtreeMemo};
use crate::{AssetSource, SyncConfig, SyncError};

/// What one synchronization pulled over the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
	/// Checksums fetched from the source, in transfer order.
	pub transferred: Vec<Checksum>,
	/// Number of source round trips.
	pub batches: usize,
	pub bytes: usize,
}

/// A snapshot tree plus the transfer that produced it.
#[derive(Debug)]
pub struct Materialized {
	pub solution: Arc<SolutionNode>,
	pub report: SyncReport,
}

/// Remote-side half of the sync protocol: fills the shared [`AssetCache`] from
/// an [`AssetSource`], transferring only what is missing.
///
/// Materialized trees are remembered by checksum. A later request whose walk
/// reaches a subtree that is still materialized stops there and splices the
/// existing nodes into the new tree.
#[derive(Clone)]
pub struct AssetSynchronizer {
	cache: AssetCache,
	source: Arc<dyn AssetSource>,
	memo: Arc<SubtreeMemo>,
}

impl std::fmt::Debug for AssetSynchronizer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AssetSynchronizer")
			.field("cache", &self.cache)
			.field("materialized", &self.memo.live())
			.finish_non_exhaustive()
	}
}

impl AssetSynchronizer {
	pub fn new(cache: AssetCache, source: Arc<dyn AssetSource>) -> Self {
		Self::with_config(cache, source, &SyncConfig::default())
	}

	pub fn with_config(cache: AssetCache, source: Arc<dyn AssetSource>, config: &SyncConfig) -> Self {
		Self {
			cache,
			source,
			memo: Arc::new(SubtreeMemo::new(config.retained_snapshots)),
		}
	}

	pub fn cache(&self) -> &AssetCache {
		&self.cache
	}

	/// Filters `requested` down to checksums absent from the cache, keeping order.
	pub fn missing(&self, requested: &[Checksum]) -> Vec<Checksum> {
		requested.iter().copied().filter(|checksum| !self.cache.contains(checksum)).collect()
	}

	/// Number of materialized nodes still alive and available for reuse.
	pub fn materialized_nodes(&self) -> usize {
		self.memo.live()
	}

	/// Makes every node reachable from `root` available locally.
	///
	/// Walks the tree one level at a time. A node whose subtree is already
	/// materialized ends its branch: it is pinned if cached and nothing below
	/// it is read. Other cached nodes are read locally and pinned under `pin`;
	/// all missing nodes of a level go to the source in one ordered batch.
	/// Every arriving payload is hashed and must match the checksum it was
	/// requested under before it is decoded and inserted.
	pub async fn synchronize(&self, root: Checksum, pin: &mut PinHandle, cancel: &CancellationToken) -> Result<SyncReport, SyncError> {
		self.walk(root, pin, cancel).await.map(|(report, _)| report)
	}

	/// Synchronizes `root`, then assembles an immutable tree, reusing every
	/// subtree that is still materialized and decoding only the rest.
	pub async fn materialize(&self, root: Checksum, pin: &mut PinHandle, cancel: &CancellationToken) -> Result<Materialized, SyncError> {
		let (report, held) = self.walk(root, pin, cancel).await?;

		if let Some(Held::Solution(solution)) = held.get(&root) {
			let solution = Arc::clone(solution);
			self.memo.retain_solution(&solution);
			return Ok(Materialized { solution, report });
		}

		let reused = held.len();
		let mut lookup = CacheLookup {
			cache: &self.cache,
			pin,
			held,
			memo: &self.memo,
			decoded: 0,
		};
		let solution = Arc::new(assemble_with(root, &mut lookup)?);
		tracing::trace!(root = %root.short(), decoded = lookup.decoded, reused, "sync.assembled");
		self.memo.retain_solution(&solution);
		Ok(Materialized { solution, report })
	}

	async fn walk(&self, root: Checksum, pin: &mut PinHandle, cancel: &CancellationToken) -> Result<(SyncReport, FxHashMap<Checksum, Held>), SyncError> {
		let mut report = SyncReport::default();
		let mut held = FxHashMap::default();
		let mut seen = FxHashSet::default();
		seen.insert(root);
		let mut level = vec![root];

		while !level.is_empty() {
			if cancel.is_cancelled() {
				return Err(SyncError::Cancelled);
			}

			let mut next = Vec::new();
			let mut missing = Vec::new();
			for checksum in level {
				if let Some(node) = self.memo.get(&checksum) {
					self.cache.pin_one(pin, &checksum);
					held.insert(checksum, node);
					continue;
				}
				match self.cache.pin_get(pin, &checksum) {
					Some(asset) => next.extend(asset.children().iter().copied().filter(|child| seen.insert(*child))),
					None => missing.push(checksum),
				}
			}

			if !missing.is_empty() {
				let payloads = tokio::select! {
					biased;
					_ = cancel.cancelled() => return Err(SyncError::Cancelled),
					payloads = self.source.get_missing_assets(&missing, cancel) => payloads?,
				};
				if payloads.len() != missing.len() {
					return Err(SyncError::Protocol {
						requested: missing.len(),
						received: payloads.len(),
					});
				}
				report.batches += 1;

				for (checksum, bytes) in missing.into_iter().zip(payloads) {
					let asset = verified_asset(checksum, bytes)?;
					next.extend(asset.children().iter().copied().filter(|child| seen.insert(*child)));
					report.bytes += asset.len();
					self.cache.insert_pinned(pin, checksum, asset)?;
					report.transferred.push(checksum);
				}
			}

			level = next;
		}

		tracing::debug!(
			root = %root.short(),
			transferred = report.transferred.len(),
			batches = report.batches,
			bytes = report.bytes,
			reused = held.len(),
			"sync.synchronized"
		);
		Ok((report, held))
	}
}

/// Feeds an assembly from the walk's reusable subtrees and the pinned cache.
struct CacheLookup<'a> {
	cache: &'a AssetCache,
	pin: &'a mut PinHandle,
	held: FxHashMap<Checksum, Held>,
	memo: &'a SubtreeMemo,
	decoded: usize,
}

impl NodeLookup for CacheLookup<'_> {
	type Error = SyncError;

	fn payload(&mut self, checksum: Checksum) -> Result<NodePayload, SyncError> {
		let asset = self.cache.pin_get(self.pin, &checksum).ok_or(SyncError::UnknownChecksum(checksum))?;
		self.decoded += 1;
		decode(checksum, asset.payload())
	}

	fn reuse_project(&mut self, checksum: Checksum) -> Option<Arc<ProjectNode>> {
		match self.held.get(&checksum)? {
			Held::Project(project) => Some(Arc::clone(project)),
			_ => None,
		}
	}

	fn reuse_document(&mut self, checksum: Checksum) -> Option<Arc<DocumentNode>> {
		match self.held.get(&checksum)? {
			Held::Document(document) => Some(Arc::clone(document)),
			_ => None,
		}
	}

	fn assembled_project(&mut self, project: &Arc<ProjectNode>) {
		self.memo.record_project(project);
		self.held.insert(project.checksum(), Held::Project(Arc::clone(project)));
	}

	fn assembled_document(&mut self, document: &Arc<DocumentNode>) {
		self.memo.record_document(document);
		self.held.insert(document.checksum(), Held::Document(Arc::clone(document)));
	}
}

fn decode(checksum: Checksum, bytes: &[u8]) -> Result<NodePayload, SyncError> {
	NodePayload::decode(bytes).map_err(|source| SyncError::Decode { checksum, source })
}

/// Checks `bytes` against the checksum it was requested under and extracts its children.
fn verified_asset(requested: Checksum, bytes: Bytes) -> Result<Asset, SyncError> {
	let actual = Checksum::of(&bytes);
	if actual != requested {
		tracing::error!(requested = %requested, actual = %actual, "sync.consistency_fault");
		return Err(SyncError::Mismatch { requested, actual });
	}
	let children = decode(requested, &bytes)?.children().to_vec();
	Ok(Asset::new(bytes, children))
}
