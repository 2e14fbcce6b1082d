use trellis_primitives::{DocumentId, ProjectId};

/// Errors from editing a solution graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
	#[error("project not found: {0:?}")]
	ProjectNotFound(ProjectId),
	#[error("document not found: {0:?}")]
	DocumentNotFound(DocumentId),
	#[error("project already exists: {0:?}")]
	DuplicateProject(ProjectId),
	#[error("document already exists: {0:?}")]
	DuplicateDocument(DocumentId),
}
