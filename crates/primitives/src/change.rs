use serde::{Deserialize, Serialize};

use crate::{Checksum, DocumentId, ProjectId};

/// Kind of workspace mutation carried by a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
	SolutionAdded,
	SolutionRemoved,
	SolutionChanged,
	SolutionReloaded,
	ProjectAdded,
	ProjectRemoved,
	ProjectChanged,
	ProjectReloaded,
	DocumentAdded,
	DocumentRemoved,
	DocumentChanged,
	DocumentReloaded,
	AdditionalDocumentChanged,
	AnalyzerConfigDocumentChanged,
}

impl ChangeKind {
	/// Every kind, in declaration order.
	pub const ALL: [Self; 14] = [
		Self::SolutionAdded,
		Self::SolutionRemoved,
		Self::SolutionChanged,
		Self::SolutionReloaded,
		Self::ProjectAdded,
		Self::ProjectRemoved,
		Self::ProjectChanged,
		Self::ProjectReloaded,
		Self::DocumentAdded,
		Self::DocumentRemoved,
		Self::DocumentChanged,
		Self::DocumentReloaded,
		Self::AdditionalDocumentChanged,
		Self::AnalyzerConfigDocumentChanged,
	];

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::SolutionAdded => "solution_added",
			Self::SolutionRemoved => "solution_removed",
			Self::SolutionChanged => "solution_changed",
			Self::SolutionReloaded => "solution_reloaded",
			Self::ProjectAdded => "project_added",
			Self::ProjectRemoved => "project_removed",
			Self::ProjectChanged => "project_changed",
			Self::ProjectReloaded => "project_reloaded",
			Self::DocumentAdded => "document_added",
			Self::DocumentRemoved => "document_removed",
			Self::DocumentChanged => "document_changed",
			Self::DocumentReloaded => "document_reloaded",
			Self::AdditionalDocumentChanged => "additional_document_changed",
			Self::AnalyzerConfigDocumentChanged => "analyzer_config_document_changed",
		}
	}

	/// Returns true for kinds scoped to a single project.
	pub const fn is_project_scoped(self) -> bool {
		!matches!(
			self,
			Self::SolutionAdded | Self::SolutionRemoved | Self::SolutionChanged | Self::SolutionReloaded
		)
	}

	/// Returns true for kinds scoped to a single document.
	pub const fn is_document_scoped(self) -> bool {
		matches!(
			self,
			Self::DocumentAdded
				| Self::DocumentRemoved
				| Self::DocumentChanged
				| Self::DocumentReloaded
				| Self::AdditionalDocumentChanged
				| Self::AnalyzerConfigDocumentChanged
		)
	}
}

/// One workspace mutation as emitted by the editor process.
///
/// `old` and `new` are solution root checksums before and after the mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
	pub old: Checksum,
	pub new: Checksum,
	pub kind: ChangeKind,
	pub project_id: Option<ProjectId>,
	pub document_id: Option<DocumentId>,
}

/// Document open/close notification against one solution root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentNotification {
	pub checksum: Checksum,
	pub document_id: DocumentId,
}
