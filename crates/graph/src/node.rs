use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use trellis_primitives::{Checksum, DocumentId, ProjectId, SolutionId};

use crate::payload::{self, PayloadRef};

/// Role of a document within its project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
	/// Compiled source.
	Regular,
	/// Non-source input visible to analyzers.
	Additional,
	/// Analyzer configuration (e.g. `.editorconfig`).
	AnalyzerConfig,
}

/// Document-local attributes, excluding text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
	pub id: DocumentId,
	pub name: String,
	pub path: Option<String>,
	pub kind: DocumentKind,
}

impl DocumentInfo {
	pub fn new(id: DocumentId, name: impl Into<String>, kind: DocumentKind) -> Self {
		Self {
			id,
			name: name.into(),
			path: None,
			kind,
		}
	}

	#[must_use]
	pub fn with_path(mut self, path: impl Into<String>) -> Self {
		self.path = Some(path.into());
		self
	}
}

/// Project-local attributes, excluding documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
	pub id: ProjectId,
	pub name: String,
	pub language: String,
	/// Compilation and parse options. Ordered so encoding is deterministic.
	pub options: BTreeMap<String, String>,
	pub project_references: Vec<ProjectId>,
	pub metadata_references: Vec<String>,
}

impl ProjectInfo {
	pub fn new(id: ProjectId, name: impl Into<String>, language: impl Into<String>) -> Self {
		Self {
			id,
			name: name.into(),
			language: language.into(),
			options: BTreeMap::new(),
			project_references: Vec::new(),
			metadata_references: Vec::new(),
		}
	}
}

/// Solution-local attributes, excluding projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionInfo {
	pub id: SolutionId,
	pub path: Option<String>,
}

impl SolutionInfo {
	pub fn new(id: SolutionId) -> Self {
		Self { id, path: None }
	}
}

/// Tier of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
	Solution,
	Project,
	Document,
}

impl NodeKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Solution => "solution",
			Self::Project => "project",
			Self::Document => "document",
		}
	}
}

impl fmt::Display for NodeKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Leaf node: one document's info and text.
#[derive(Debug, Clone)]
pub struct DocumentNode {
	info: DocumentInfo,
	text: Arc<str>,
	checksum: Checksum,
}

impl DocumentNode {
	pub fn new(info: DocumentInfo, text: impl Into<Arc<str>>) -> Self {
		let text = text.into();
		let checksum = Checksum::of(&payload::encode(&PayloadRef::Document { info: &info, text: &text }));
		Self { info, text, checksum }
	}

	/// Rebuilds a node whose checksum was already verified against its payload.
	pub(crate) fn assembled(info: DocumentInfo, text: Arc<str>, checksum: Checksum) -> Self {
		Self { info, text, checksum }
	}

	pub fn info(&self) -> &DocumentInfo {
		&self.info
	}

	pub fn id(&self) -> &DocumentId {
		&self.info.id
	}

	pub fn kind(&self) -> DocumentKind {
		self.info.kind
	}

	pub fn text(&self) -> &str {
		&self.text
	}

	pub fn checksum(&self) -> Checksum {
		self.checksum
	}

	/// Returns a copy with new text; the id and other info are kept.
	#[must_use]
	pub fn with_text(&self, text: impl Into<Arc<str>>) -> Self {
		Self::new(self.info.clone(), text)
	}

	pub fn encode(&self) -> Vec<u8> {
		payload::encode(&PayloadRef::Document {
			info: &self.info,
			text: &self.text,
		})
	}
}

/// Interior node: project info and its documents in declared order.
#[derive(Debug, Clone)]
pub struct ProjectNode {
	info: ProjectInfo,
	documents: Vec<Arc<DocumentNode>>,
	checksum: Checksum,
}

impl ProjectNode {
	pub fn new<D>(info: ProjectInfo, documents: impl IntoIterator<Item = D>) -> Self
	where
		D: Into<Arc<DocumentNode>>,
	{
		let documents: Vec<Arc<DocumentNode>> = documents.into_iter().map(Into::into).collect();
		let checksum = Checksum::of(&encode_project(&info, &documents));
		Self { info, documents, checksum }
	}

	pub(crate) fn assembled(info: ProjectInfo, documents: Vec<Arc<DocumentNode>>, checksum: Checksum) -> Self {
		Self { info, documents, checksum }
	}

	pub fn info(&self) -> &ProjectInfo {
		&self.info
	}

	pub fn id(&self) -> &ProjectId {
		&self.info.id
	}

	pub fn documents(&self) -> &[Arc<DocumentNode>] {
		&self.documents
	}

	pub fn document(&self, id: &DocumentId) -> Option<&Arc<DocumentNode>> {
		self.documents.iter().find(|doc| doc.id() == id)
	}

	pub fn checksum(&self) -> Checksum {
		self.checksum
	}

	/// Returns a copy with replaced info; documents are shared.
	#[must_use]
	pub fn with_info(&self, info: ProjectInfo) -> Self {
		Self::new(info, self.documents.iter().cloned())
	}

	pub fn encode(&self) -> Vec<u8> {
		encode_project(&self.info, &self.documents)
	}
}

fn encode_project(info: &ProjectInfo, documents: &[Arc<DocumentNode>]) -> Vec<u8> {
	let children: Vec<Checksum> = documents.iter().map(|doc| doc.checksum()).collect();
	payload::encode(&PayloadRef::Project { info, documents: &children })
}

/// Root node: solution info and its projects in declared order.
#[derive(Debug, Clone)]
pub struct SolutionNode {
	info: SolutionInfo,
	projects: Vec<Arc<ProjectNode>>,
	checksum: Checksum,
}

impl SolutionNode {
	pub fn new<P>(info: SolutionInfo, projects: impl IntoIterator<Item = P>) -> Self
	where
		P: Into<Arc<ProjectNode>>,
	{
		let projects: Vec<Arc<ProjectNode>> = projects.into_iter().map(Into::into).collect();
		let checksum = Checksum::of(&encode_solution(&info, &projects));
		Self { info, projects, checksum }
	}

	pub(crate) fn assembled(info: SolutionInfo, projects: Vec<Arc<ProjectNode>>, checksum: Checksum) -> Self {
		Self { info, projects, checksum }
	}

	pub fn info(&self) -> &SolutionInfo {
		&self.info
	}

	pub fn id(&self) -> &SolutionId {
		&self.info.id
	}

	pub fn projects(&self) -> &[Arc<ProjectNode>] {
		&self.projects
	}

	pub fn project(&self, id: &ProjectId) -> Option<&Arc<ProjectNode>> {
		self.projects.iter().find(|project| project.id() == id)
	}

	/// Finds a document anywhere in the solution.
	pub fn document(&self, id: &DocumentId) -> Option<&Arc<DocumentNode>> {
		self.projects.iter().find_map(|project| project.document(id))
	}

	/// Finds the project owning a document.
	pub fn project_of(&self, id: &DocumentId) -> Option<&Arc<ProjectNode>> {
		self.projects.iter().find(|project| project.document(id).is_some())
	}

	pub fn checksum(&self) -> Checksum {
		self.checksum
	}

	pub fn encode(&self) -> Vec<u8> {
		encode_solution(&self.info, &self.projects)
	}

	/// Visits every node in pre-order: solution, then each project followed by its documents.
	pub fn walk<'a>(&'a self, mut visit: impl FnMut(NodeRef<'a>)) {
		visit(NodeRef::Solution(self));
		for project in &self.projects {
			visit(NodeRef::Project(project));
			for document in &project.documents {
				visit(NodeRef::Document(document));
			}
		}
	}

	/// Number of nodes reachable from this root, counting shared subtrees once per position.
	pub fn node_count(&self) -> usize {
		1 + self.projects.iter().map(|p| 1 + p.documents.len()).sum::<usize>()
	}
}

fn encode_solution(info: &SolutionInfo, projects: &[Arc<ProjectNode>]) -> Vec<u8> {
	let children: Vec<Checksum> = projects.iter().map(|project| project.checksum()).collect();
	payload::encode(&PayloadRef::Solution { info, projects: &children })
}

/// Borrowed view of any node, used when walking a tree.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
	Solution(&'a SolutionNode),
	Project(&'a ProjectNode),
	Document(&'a DocumentNode),
}

impl NodeRef<'_> {
	pub fn kind(&self) -> NodeKind {
		match self {
			Self::Solution(_) => NodeKind::Solution,
			Self::Project(_) => NodeKind::Project,
			Self::Document(_) => NodeKind::Document,
		}
	}

	pub fn checksum(&self) -> Checksum {
		match self {
			Self::Solution(node) => node.checksum(),
			Self::Project(node) => node.checksum(),
			Self::Document(node) => node.checksum(),
		}
	}

	/// Child checksums in declared order.
	pub fn children(&self) -> Vec<Checksum> {
		match self {
			Self::Solution(node) => node.projects.iter().map(|p| p.checksum()).collect(),
			Self::Project(node) => node.documents.iter().map(|d| d.checksum()).collect(),
			Self::Document(_) => Vec::new(),
		}
	}

	pub fn encode(&self) -> Vec<u8> {
		match self {
			Self::Solution(node) => node.encode(),
			Self::Project(node) => node.encode(),
			Self::Document(node) => node.encode(),
		}
	}
}
