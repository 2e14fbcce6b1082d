//! Path-copying edits. Each returns a new root; `self` is left untouched.

use std::sync::Arc;

use trellis_primitives::{DocumentId, ProjectId};

use crate::{DocumentNode, GraphError, ProjectInfo, ProjectNode, SolutionNode};

impl SolutionNode {
	pub fn with_project_added(&self, project: impl Into<Arc<ProjectNode>>) -> Result<Self, GraphError> {
		let project = project.into();
		if self.project(project.id()).is_some() {
			return Err(GraphError::DuplicateProject(project.id().clone()));
		}
		let mut projects = self.projects().to_vec();
		projects.push(project);
		Ok(Self::new(self.info().clone(), projects))
	}

	pub fn with_project_removed(&self, id: &ProjectId) -> Result<Self, GraphError> {
		let index = self.project_index(id)?;
		let mut projects = self.projects().to_vec();
		projects.remove(index);
		Ok(Self::new(self.info().clone(), projects))
	}

	/// Replaces a project's info (options, references, ...), keeping its documents.
	pub fn with_project_info(&self, info: ProjectInfo) -> Result<Self, GraphError> {
		let id = info.id.clone();
		self.replace_project(&id, |project| Ok(project.with_info(info)))
	}

	/// Swaps in a freshly loaded project under the same id.
	pub fn with_project_reloaded(&self, project: ProjectNode) -> Result<Self, GraphError> {
		let id = project.id().clone();
		self.replace_project(&id, |_| Ok(project))
	}

	pub fn with_document_added(&self, project_id: &ProjectId, document: impl Into<Arc<DocumentNode>>) -> Result<Self, GraphError> {
		let document = document.into();
		if self.document(document.id()).is_some() {
			return Err(GraphError::DuplicateDocument(document.id().clone()));
		}
		self.replace_project(project_id, |project| {
			let mut documents = project.documents().to_vec();
			documents.push(document);
			Ok(ProjectNode::new(project.info().clone(), documents))
		})
	}

	pub fn with_document_removed(&self, id: &DocumentId) -> Result<Self, GraphError> {
		let project_id = self.owning_project(id)?;
		self.replace_project(&project_id, |project| {
			let documents = project.documents().iter().filter(|doc| doc.id() != id).cloned();
			Ok(ProjectNode::new(project.info().clone(), documents))
		})
	}

	pub fn with_document_text(&self, id: &DocumentId, text: impl Into<Arc<str>>) -> Result<Self, GraphError> {
		let text = text.into();
		self.replace_document(id, |document| document.with_text(text))
	}

	/// Replaces a document wholesale (e.g. after reloading it from disk) under the same id.
	pub fn with_document_reloaded(&self, document: DocumentNode) -> Result<Self, GraphError> {
		let id = document.id().clone();
		self.replace_document(&id, |_| document)
	}

	fn replace_document(&self, id: &DocumentId, build: impl FnOnce(&DocumentNode) -> DocumentNode) -> Result<Self, GraphError> {
		let project_id = self.owning_project(id)?;
		self.replace_project(&project_id, |project| {
			let mut build = Some(build);
			let documents = project
				.documents()
				.iter()
				.map(|doc| match build.take_if(|_| doc.id() == id) {
					Some(build) => Arc::new(build(doc)),
					None => Arc::clone(doc),
				})
				.collect::<Vec<_>>();
			Ok(ProjectNode::new(project.info().clone(), documents))
		})
	}

	fn replace_project(&self, id: &ProjectId, build: impl FnOnce(&ProjectNode) -> Result<ProjectNode, GraphError>) -> Result<Self, GraphError> {
		let index = self.project_index(id)?;
		let mut projects = self.projects().to_vec();
		let rebuilt = build(&projects[index])?;
		projects[index] = Arc::new(rebuilt);
		Ok(Self::new(self.info().clone(), projects))
	}

	fn project_index(&self, id: &ProjectId) -> Result<usize, GraphError> {
		self.projects()
			.iter()
			.position(|project| project.id() == id)
			.ok_or_else(|| GraphError::ProjectNotFound(id.clone()))
	}

	fn owning_project(&self, id: &DocumentId) -> Result<ProjectId, GraphError> {
		self.project_of(id)
			.map(|project| project.id().clone())
			.ok_or_else(|| GraphError::DocumentNotFound(id.clone()))
	}
}
