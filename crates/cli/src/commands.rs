use std::fmt::Write as _;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;
use trellis_assets::{AssetCache, CacheConfig};
use trellis_broker::HostEndpoint;
use trellis_graph::{NodeKind, NodeRef, SolutionNode};
use trellis_host::HostAssetStore;
use trellis_primitives::Checksum;
use trellis_sync::{AssetSynchronizer, SyncReport};

fn label(node: NodeRef<'_>) -> String {
	match node {
		NodeRef::Solution(_) => "solution".to_string(),
		NodeRef::Project(project) => project.info().name.clone(),
		NodeRef::Document(document) => {
			let info = document.info();
			info.path.clone().unwrap_or_else(|| info.name.clone())
		}
	}
}

fn depth(kind: NodeKind) -> usize {
	match kind {
		NodeKind::Solution => 0,
		NodeKind::Project => 1,
		NodeKind::Document => 2,
	}
}

/// Indented checksum tree, one node per line in walk order.
pub fn render_tree(solution: &SolutionNode) -> String {
	let mut out = String::new();
	solution.walk(|node| {
		let kind = node.kind();
		let _ = writeln!(out, "{:indent$}{} {} {}", "", kind.as_str(), label(node), node.checksum(), indent = depth(kind) * 2);
	});
	out
}

/// Outcome of resolving OLD into a fresh cache and then NEW on top of it.
#[derive(Debug)]
pub struct DiffReport {
	/// Nodes fetched to resolve the older snapshot from nothing.
	pub baseline: SyncReport,
	/// Nodes fetched for the newer snapshot once the older one is cached.
	pub delta: SyncReport,
	/// `(kind, label)` for every checksum of the newer tree.
	labels: FxHashMap<Checksum, (NodeKind, String)>,
	pub new_node_count: usize,
}

impl DiffReport {
	pub fn render(&self) -> String {
		let mut out = String::new();
		let _ = writeln!(
			out,
			"baseline: {} nodes in {} batches ({} bytes)",
			self.baseline.transferred.len(),
			self.baseline.batches,
			self.baseline.bytes
		);
		let _ = writeln!(
			out,
			"delta: {} of {} nodes in {} batches ({} bytes)",
			self.delta.transferred.len(),
			self.new_node_count,
			self.delta.batches,
			self.delta.bytes
		);
		for checksum in &self.delta.transferred {
			match self.labels.get(checksum) {
				Some((kind, label)) => {
					let _ = writeln!(out, "  {} {label} {}", kind.as_str(), checksum.short());
				}
				None => {
					let _ = writeln!(out, "  ? {}", checksum.short());
				}
			}
		}
		out
	}
}

/// Publishes both trees to a host store and measures what a remote with a warm
/// OLD cache has to fetch to resolve NEW.
pub async fn diff(old: &SolutionNode, new: &SolutionNode, cache_config: CacheConfig) -> anyhow::Result<DiffReport> {
	let store = HostAssetStore::new();
	store.publish(old);
	store.publish(new);

	let cache = AssetCache::new(cache_config);
	let synchronizer = AssetSynchronizer::new(cache.clone(), Arc::new(HostEndpoint::new(store)));
	let cancel = CancellationToken::new();

	let mut old_pin = cache.pin(old.checksum());
	let baseline = synchronizer.synchronize(old.checksum(), &mut old_pin, &cancel).await?;
	let mut new_pin = cache.pin(new.checksum());
	let materialized = synchronizer.materialize(new.checksum(), &mut new_pin, &cancel).await?;
	anyhow::ensure!(
		materialized.solution.checksum() == new.checksum(),
		"materialized tree {} does not match {}",
		materialized.solution.checksum(),
		new.checksum()
	);
	tracing::debug!(pinned = cache.stats().pinned_entries, "diff.resolved");

	let mut labels = FxHashMap::default();
	new.walk(|node| {
		labels.insert(node.checksum(), (node.kind(), label(node)));
	});
	Ok(DiffReport {
		baseline,
		delta: materialized.report,
		labels,
		new_node_count: new.node_count(),
	})
}
