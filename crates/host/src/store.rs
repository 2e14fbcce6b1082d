use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;
use trellis_graph::{DocumentNode, ProjectNode, SolutionNode};
use trellis_primitives::Checksum;
use trellis_sync::{AssetSource, SyncError};

struct Stored {
	payload: Bytes,
	children: Vec<Checksum>,
	/// Published roots plus parent entries referencing this node.
	refs: usize,
}

#[derive(Default)]
struct StoreState {
	nodes: FxHashMap<Checksum, Stored>,
}

impl StoreState {
	/// Takes one reference on `checksum`. Returns true if the node was already
	/// stored, in which case its subtree needs no further work.
	fn retain(&mut self, checksum: Checksum) -> bool {
		match self.nodes.get_mut(&checksum) {
			Some(stored) => {
				stored.refs += 1;
				true
			}
			None => false,
		}
	}

	fn store(&mut self, checksum: Checksum, payload: Vec<u8>, children: Vec<Checksum>) {
		self.nodes.insert(
			checksum,
			Stored {
				payload: Bytes::from(payload),
				children,
				refs: 1,
			},
		);
	}

	fn publish_document(&mut self, document: &DocumentNode) {
		if !self.retain(document.checksum()) {
			self.store(document.checksum(), document.encode(), Vec::new());
		}
	}

	fn publish_project(&mut self, project: &ProjectNode) {
		if self.retain(project.checksum()) {
			return;
		}
		for document in project.documents() {
			self.publish_document(document);
		}
		let children = project.documents().iter().map(|d| d.checksum()).collect();
		self.store(project.checksum(), project.encode(), children);
	}

	fn publish_solution(&mut self, solution: &SolutionNode) {
		if self.retain(solution.checksum()) {
			return;
		}
		for project in solution.projects() {
			self.publish_project(project);
		}
		let children = solution.projects().iter().map(|p| p.checksum()).collect();
		self.store(solution.checksum(), solution.encode(), children);
	}

	fn release(&mut self, root: Checksum) -> usize {
		let mut removed = 0;
		let mut stack = vec![root];
		while let Some(checksum) = stack.pop() {
			let Some(stored) = self.nodes.get_mut(&checksum) else {
				continue;
			};
			stored.refs -= 1;
			if stored.refs == 0
				&& let Some(stored) = self.nodes.remove(&checksum)
			{
				stack.extend(stored.children);
				removed += 1;
			}
		}
		removed
	}
}

/// Authoritative checksum → payload table on the editor side.
///
/// Nodes are reference counted across published roots and parent nodes, so a
/// subtree shared by many versions is stored once and dropped when the last
/// version referencing it is retired.
#[derive(Clone, Default)]
pub struct HostAssetStore {
	state: Arc<Mutex<StoreState>>,
}

impl std::fmt::Debug for HostAssetStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HostAssetStore").field("nodes", &self.len()).finish()
	}
}

impl HostAssetStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes every node of `solution` servable until a matching [`retire`](Self::retire).
	/// Publishing the same root twice requires retiring it twice.
	pub fn publish(&self, solution: &SolutionNode) -> Checksum {
		let before = self.len();
		self.state.lock().publish_solution(solution);
		tracing::debug!(root = %solution.checksum().short(), stored = self.len().saturating_sub(before), "host.publish");
		solution.checksum()
	}

	/// Drops one publication of `root`; nodes no longer referenced by any
	/// published root are removed. Returns the number of nodes removed.
	pub fn retire(&self, root: Checksum) -> usize {
		let removed = self.state.lock().release(root);
		tracing::debug!(root = %root.short(), removed, "host.retire");
		removed
	}

	pub fn get(&self, checksum: &Checksum) -> Option<Bytes> {
		self.state.lock().nodes.get(checksum).map(|stored| stored.payload.clone())
	}

	pub fn contains(&self, checksum: &Checksum) -> bool {
		self.state.lock().nodes.contains_key(checksum)
	}

	/// Number of distinct nodes stored.
	pub fn len(&self) -> usize {
		self.state.lock().nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[async_trait]
impl AssetSource for HostAssetStore {
	async fn get_missing_assets(&self, checksums: &[Checksum], cancel: &CancellationToken) -> Result<Vec<Bytes>, SyncError> {
		if cancel.is_cancelled() {
			return Err(SyncError::Cancelled);
		}
		let state = self.state.lock();
		let payloads = checksums
			.iter()
			.map(|checksum| match state.nodes.get(checksum) {
				Some(stored) => Ok(stored.payload.clone()),
				None => {
					tracing::debug!(checksum = %checksum.short(), "host.unknown_checksum");
					Err(SyncError::UnknownChecksum(*checksum))
				}
			})
			.collect::<Result<Vec<_>, _>>()?;
		tracing::trace!(count = payloads.len(), "host.serve");
		Ok(payloads)
	}
}
