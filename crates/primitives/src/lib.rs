//! Leaf types for the trellis workspace graph: checksums, identifiers and change kinds.

/// Workspace change classification and event records.
pub mod change;
/// Fixed-length content digests.
pub mod checksum;
/// Stable identifiers for solutions, projects and documents.
pub mod ids;

pub use change::{ChangeEvent, ChangeKind, DocumentNotification};
pub use checksum::{Checksum, ChecksumHasher, ChecksumParseError};
pub use ids::{DocumentId, ProjectId, SolutionId};
