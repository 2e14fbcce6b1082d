use std::collections::{BTreeMap, VecDeque};

use trellis_graph::{DocumentKind, DocumentNode, GraphError, ProjectNode, SolutionNode};
use trellis_primitives::{ChangeEvent, ChangeKind, Checksum, DocumentId, ProjectId};

use crate::{HostAssetStore, HostConfig};

/// The editor's mutable handle on its current solution.
///
/// Each mutation swaps in a new immutable root, publishes it to the
/// [`HostAssetStore`], retires versions that fall out of the retention window,
/// and returns the [`ChangeEvent`] to forward to remote processes.
#[derive(Debug)]
pub struct Workspace {
	current: SolutionNode,
	store: HostAssetStore,
	/// Published roots, oldest first.
	retained: VecDeque<Checksum>,
	retained_versions: usize,
}

impl Workspace {
	pub fn new(solution: SolutionNode, store: HostAssetStore, config: &HostConfig) -> Self {
		store.publish(&solution);
		Self {
			retained: VecDeque::from([solution.checksum()]),
			current: solution,
			store,
			retained_versions: config.retained_versions.max(1),
		}
	}

	pub fn current(&self) -> &SolutionNode {
		&self.current
	}

	pub fn checksum(&self) -> Checksum {
		self.current.checksum()
	}

	pub fn store(&self) -> &HostAssetStore {
		&self.store
	}

	/// Roots still servable, oldest first.
	pub fn retained(&self) -> impl Iterator<Item = Checksum> + '_ {
		self.retained.iter().copied()
	}

	pub fn add_project(&mut self, project: ProjectNode) -> Result<ChangeEvent, GraphError> {
		let id = project.id().clone();
		let next = self.current.with_project_added(project)?;
		Ok(self.commit(next, ChangeKind::ProjectAdded, Some(id), None))
	}

	pub fn remove_project(&mut self, id: &ProjectId) -> Result<ChangeEvent, GraphError> {
		let next = self.current.with_project_removed(id)?;
		Ok(self.commit(next, ChangeKind::ProjectRemoved, Some(id.clone()), None))
	}

	pub fn set_project_options(&mut self, id: &ProjectId, options: BTreeMap<String, String>) -> Result<ChangeEvent, GraphError> {
		let project = self.current.project(id).ok_or_else(|| GraphError::ProjectNotFound(id.clone()))?;
		let mut info = project.info().clone();
		info.options = options;
		let next = self.current.with_project_info(info)?;
		Ok(self.commit(next, ChangeKind::ProjectChanged, Some(id.clone()), None))
	}

	pub fn reload_project(&mut self, project: ProjectNode) -> Result<ChangeEvent, GraphError> {
		let id = project.id().clone();
		let next = self.current.with_project_reloaded(project)?;
		Ok(self.commit(next, ChangeKind::ProjectReloaded, Some(id), None))
	}

	pub fn add_document(&mut self, project_id: &ProjectId, document: DocumentNode) -> Result<ChangeEvent, GraphError> {
		let id = document.id().clone();
		let next = self.current.with_document_added(project_id, document)?;
		Ok(self.commit(next, ChangeKind::DocumentAdded, Some(project_id.clone()), Some(id)))
	}

	pub fn remove_document(&mut self, id: &DocumentId) -> Result<ChangeEvent, GraphError> {
		let project_id = self.owning_project(id)?;
		let next = self.current.with_document_removed(id)?;
		Ok(self.commit(next, ChangeKind::DocumentRemoved, Some(project_id), Some(id.clone())))
	}

	/// Replaces a document's text. The event kind follows the document's kind.
	pub fn set_document_text(&mut self, id: &DocumentId, text: &str) -> Result<ChangeEvent, GraphError> {
		let project_id = self.owning_project(id)?;
		let kind = match self.current.document(id).map(|d| d.kind()) {
			Some(DocumentKind::Additional) => ChangeKind::AdditionalDocumentChanged,
			Some(DocumentKind::AnalyzerConfig) => ChangeKind::AnalyzerConfigDocumentChanged,
			Some(DocumentKind::Regular) | None => ChangeKind::DocumentChanged,
		};
		let next = self.current.with_document_text(id, text)?;
		Ok(self.commit(next, kind, Some(project_id), Some(id.clone())))
	}

	pub fn reload_document(&mut self, document: DocumentNode) -> Result<ChangeEvent, GraphError> {
		let id = document.id().clone();
		let project_id = self.owning_project(&id)?;
		let next = self.current.with_document_reloaded(document)?;
		Ok(self.commit(next, ChangeKind::DocumentReloaded, Some(project_id), Some(id)))
	}

	/// Swaps in a freshly loaded solution wholesale.
	pub fn reload_solution(&mut self, solution: SolutionNode) -> ChangeEvent {
		self.commit(solution, ChangeKind::SolutionReloaded, None, None)
	}

	fn owning_project(&self, id: &DocumentId) -> Result<ProjectId, GraphError> {
		self.current
			.project_of(id)
			.map(|project| project.id().clone())
			.ok_or_else(|| GraphError::DocumentNotFound(id.clone()))
	}

	fn commit(&mut self, next: SolutionNode, kind: ChangeKind, project_id: Option<ProjectId>, document_id: Option<DocumentId>) -> ChangeEvent {
		let old = self.current.checksum();
		let new = self.store.publish(&next);
		self.retained.push_back(new);
		while self.retained.len() > self.retained_versions {
			if let Some(expired) = self.retained.pop_front() {
				self.store.retire(expired);
			}
		}
		self.current = next;

		tracing::debug!(kind = kind.as_str(), old = %old.short(), new = %new.short(), "workspace.change");
		ChangeEvent {
			old,
			new,
			kind,
			project_id,
			document_id,
		}
	}
}
