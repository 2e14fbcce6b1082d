use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use trellis_graph::{DocumentNode, ProjectNode, SolutionNode};
use trellis_primitives::Checksum;

/// Dead entries are swept after this many recordings.
const SWEEP_INTERVAL: usize = 512;

/// A fully materialized subtree.
#[derive(Debug, Clone)]
pub(crate) enum Held {
	Solution(Arc<SolutionNode>),
	Project(Arc<ProjectNode>),
	Document(Arc<DocumentNode>),
}

enum WeakNode {
	Solution(Weak<SolutionNode>),
	Project(Weak<ProjectNode>),
	Document(Weak<DocumentNode>),
}

impl WeakNode {
	fn upgrade(&self) -> Option<Held> {
		match self {
			Self::Solution(node) => node.upgrade().map(Held::Solution),
			Self::Project(node) => node.upgrade().map(Held::Project),
			Self::Document(node) => node.upgrade().map(Held::Document),
		}
	}

	fn is_live(&self) -> bool {
		match self {
			Self::Solution(node) => node.strong_count() > 0,
			Self::Project(node) => node.strong_count() > 0,
			Self::Document(node) => node.strong_count() > 0,
		}
	}
}

/// Materialized subtrees by checksum.
///
/// Nodes are held weakly: an entry answers for as long as some snapshot still
/// shares the node. The last `retained` solutions are also held strongly.
pub(crate) struct SubtreeMemo {
	state: Mutex<MemoState>,
}

struct MemoState {
	nodes: FxHashMap<Checksum, WeakNode>,
	recent: VecDeque<Arc<SolutionNode>>,
	retained: usize,
	since_sweep: usize,
}

impl SubtreeMemo {
	pub(crate) fn new(retained: usize) -> Self {
		Self {
			state: Mutex::new(MemoState {
				nodes: FxHashMap::default(),
				recent: VecDeque::new(),
				retained,
				since_sweep: 0,
			}),
		}
	}

	pub(crate) fn get(&self, checksum: &Checksum) -> Option<Held> {
		let mut state = self.state.lock();
		let held = state.nodes.get(checksum)?.upgrade();
		if held.is_none() {
			state.nodes.remove(checksum);
		}
		held
	}

	pub(crate) fn record_project(&self, project: &Arc<ProjectNode>) {
		self.state.lock().record(project.checksum(), WeakNode::Project(Arc::downgrade(project)));
	}

	pub(crate) fn record_document(&self, document: &Arc<DocumentNode>) {
		self.state.lock().record(document.checksum(), WeakNode::Document(Arc::downgrade(document)));
	}

	/// Records `solution` and keeps it alive among the most recent ones.
	pub(crate) fn retain_solution(&self, solution: &Arc<SolutionNode>) {
		let mut state = self.state.lock();
		state.record(solution.checksum(), WeakNode::Solution(Arc::downgrade(solution)));
		if state.retained == 0 {
			return;
		}
		state.recent.retain(|recent| !Arc::ptr_eq(recent, solution));
		if state.recent.len() == state.retained {
			state.recent.pop_front();
		}
		state.recent.push_back(Arc::clone(solution));
	}

	/// Number of entries whose node is still alive.
	pub(crate) fn live(&self) -> usize {
		self.state.lock().nodes.values().filter(|node| node.is_live()).count()
	}
}

impl MemoState {
	fn record(&mut self, checksum: Checksum, node: WeakNode) {
		self.nodes.insert(checksum, node);
		self.since_sweep += 1;
		if self.since_sweep >= SWEEP_INTERVAL {
			self.since_sweep = 0;
			let before = self.nodes.len();
			self.nodes.retain(|_, node| node.is_live());
			tracing::trace!(swept = before - self.nodes.len(), live = self.nodes.len(), "sync.memo_sweep");
		}
	}
}
