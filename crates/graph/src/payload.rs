//! Node payload encoding.
//!
//! A payload is the postcard encoding of one node's local content followed by
//! its ordered child checksums. The node checksum is the digest of exactly
//! these bytes, so a payload can always be verified against the checksum it
//! was requested under.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use trellis_primitives::Checksum;

use crate::node::{DocumentInfo, DocumentNode, NodeKind, ProjectInfo, ProjectNode, SolutionInfo, SolutionNode};

/// Borrowed encoding form. Variant order and field layout MUST match [`NodePayload`].
#[derive(Serialize)]
pub(crate) enum PayloadRef<'a> {
	Solution { info: &'a SolutionInfo, projects: &'a [Checksum] },
	Project { info: &'a ProjectInfo, documents: &'a [Checksum] },
	Document { info: &'a DocumentInfo, text: &'a str },
}

pub(crate) fn encode(payload: &PayloadRef<'_>) -> Vec<u8> {
	postcard::to_stdvec(payload).expect("node payloads contain only infallibly encodable fields")
}

/// Decoded payload of a single node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodePayload {
	Solution { info: SolutionInfo, projects: Vec<Checksum> },
	Project { info: ProjectInfo, documents: Vec<Checksum> },
	Document { info: DocumentInfo, text: String },
}

impl NodePayload {
	pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
		Ok(postcard::from_bytes(bytes)?)
	}

	pub fn encode(&self) -> Vec<u8> {
		postcard::to_stdvec(self).expect("node payloads contain only infallibly encodable fields")
	}

	pub fn kind(&self) -> NodeKind {
		match self {
			Self::Solution { .. } => NodeKind::Solution,
			Self::Project { .. } => NodeKind::Project,
			Self::Document { .. } => NodeKind::Document,
		}
	}

	/// Child checksums in declared order. Empty for documents.
	pub fn children(&self) -> &[Checksum] {
		match self {
			Self::Solution { projects, .. } => projects,
			Self::Project { documents, .. } => documents,
			Self::Document { .. } => &[],
		}
	}
}

/// Payload bytes could not be decoded.
#[derive(Debug, thiserror::Error)]
#[error("malformed node payload: {0}")]
pub struct PayloadError(#[from] postcard::Error);

/// Errors from rebuilding a tree out of decoded payloads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssembleError {
	#[error("payload for {0:?} is not available")]
	Missing(Checksum),
	#[error("{checksum:?} is a {found} node, expected {expected}")]
	UnexpectedKind {
		checksum: Checksum,
		expected: NodeKind,
		found: NodeKind,
	},
}

/// Where an assembly gets its nodes from.
///
/// Before decoding a child the assembler offers its checksum to
/// [`reuse_project`](Self::reuse_project) or
/// [`reuse_document`](Self::reuse_document). A returned node is spliced in as
/// is and its subtree is never visited. Every node the assembler builds itself
/// is reported back through the `assembled_*` hooks.
pub trait NodeLookup {
	type Error: From<AssembleError>;

	/// Decoded payload for `checksum`. The implementor vouches that it hashes to `checksum`.
	fn payload(&mut self, checksum: Checksum) -> Result<NodePayload, Self::Error>;

	fn reuse_project(&mut self, _checksum: Checksum) -> Option<Arc<ProjectNode>> {
		None
	}

	fn reuse_document(&mut self, _checksum: Checksum) -> Option<Arc<DocumentNode>> {
		None
	}

	fn assembled_project(&mut self, _project: &Arc<ProjectNode>) {}

	fn assembled_document(&mut self, _document: &Arc<DocumentNode>) {}
}

/// Rebuilds the solution rooted at `root`, pulling nodes through `lookup`.
pub fn assemble_with<L: NodeLookup>(root: Checksum, lookup: &mut L) -> Result<SolutionNode, L::Error> {
	let (info, projects) = match lookup.payload(root)? {
		NodePayload::Solution { info, projects } => (info, projects),
		other => return Err(unexpected(root, NodeKind::Solution, &other).into()),
	};

	let mut built_projects = Vec::with_capacity(projects.len());
	for project_sum in projects {
		if let Some(project) = lookup.reuse_project(project_sum) {
			built_projects.push(project);
			continue;
		}
		let (info, documents) = match lookup.payload(project_sum)? {
			NodePayload::Project { info, documents } => (info, documents),
			other => return Err(unexpected(project_sum, NodeKind::Project, &other).into()),
		};

		let mut built_documents = Vec::with_capacity(documents.len());
		for document_sum in documents {
			if let Some(document) = lookup.reuse_document(document_sum) {
				built_documents.push(document);
				continue;
			}
			let (info, text) = match lookup.payload(document_sum)? {
				NodePayload::Document { info, text } => (info, text),
				other => return Err(unexpected(document_sum, NodeKind::Document, &other).into()),
			};
			let document = Arc::new(DocumentNode::assembled(info, Arc::from(text), document_sum));
			lookup.assembled_document(&document);
			built_documents.push(document);
		}

		let project = Arc::new(ProjectNode::assembled(info, built_documents, project_sum));
		lookup.assembled_project(&project);
		built_projects.push(project);
	}

	Ok(SolutionNode::assembled(info, built_projects, root))
}

/// Rebuilds an immutable solution tree from verified payloads keyed by checksum.
///
/// The caller vouches that every payload in `payloads` hashes to its key.
/// Subtrees appearing more than once are materialized once and shared.
pub fn assemble_solution(root: Checksum, payloads: &HashMap<Checksum, NodePayload>) -> Result<SolutionNode, AssembleError> {
	assemble_with(
		root,
		&mut PayloadMap {
			payloads,
			projects: HashMap::new(),
			documents: HashMap::new(),
		},
	)
}

struct PayloadMap<'a> {
	payloads: &'a HashMap<Checksum, NodePayload>,
	projects: HashMap<Checksum, Arc<ProjectNode>>,
	documents: HashMap<Checksum, Arc<DocumentNode>>,
}

impl NodeLookup for PayloadMap<'_> {
	type Error = AssembleError;

	fn payload(&mut self, checksum: Checksum) -> Result<NodePayload, AssembleError> {
		self.payloads.get(&checksum).cloned().ok_or(AssembleError::Missing(checksum))
	}

	fn reuse_project(&mut self, checksum: Checksum) -> Option<Arc<ProjectNode>> {
		self.projects.get(&checksum).cloned()
	}

	fn reuse_document(&mut self, checksum: Checksum) -> Option<Arc<DocumentNode>> {
		self.documents.get(&checksum).cloned()
	}

	fn assembled_project(&mut self, project: &Arc<ProjectNode>) {
		self.projects.insert(project.checksum(), Arc::clone(project));
	}

	fn assembled_document(&mut self, document: &Arc<DocumentNode>) {
		self.documents.insert(document.checksum(), Arc::clone(document));
	}
}

fn unexpected(checksum: Checksum, expected: NodeKind, found: &NodePayload) -> AssembleError {
	AssembleError::UnexpectedKind {
		checksum,
		expected,
		found: found.kind(),
	}
}
