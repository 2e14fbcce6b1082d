use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! stable_id {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		///
		/// Identity is the UUID alone. The debug label travels with the id for
		/// diagnostics but never participates in equality, ordering or hashing.
		#[derive(Clone, Serialize, Deserialize)]
		pub struct $name {
			id: Uuid,
			debug_name: Option<Arc<str>>,
		}

		impl $name {
			/// Creates a fresh random identifier.
			pub fn new(debug_name: impl Into<Arc<str>>) -> Self {
				Self::from_uuid(Uuid::new_v4(), Some(debug_name.into()))
			}

			/// Wraps an existing UUID.
			pub fn from_uuid(id: Uuid, debug_name: Option<Arc<str>>) -> Self {
				Self { id, debug_name }
			}

			pub const fn uuid(&self) -> Uuid {
				self.id
			}

			/// Non-authoritative label for logs.
			pub fn debug_name(&self) -> Option<&str> {
				self.debug_name.as_deref()
			}
		}

		impl PartialEq for $name {
			fn eq(&self, other: &Self) -> bool {
				self.id == other.id
			}
		}

		impl Eq for $name {}

		impl PartialOrd for $name {
			fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
				Some(self.cmp(other))
			}
		}

		impl Ord for $name {
			fn cmp(&self, other: &Self) -> Ordering {
				self.id.cmp(&other.id)
			}
		}

		impl Hash for $name {
			fn hash<H: Hasher>(&self, state: &mut H) {
				self.id.hash(state);
			}
		}

		impl fmt::Debug for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				match &self.debug_name {
					Some(name) => write!(f, "{}({}, {name:?})", stringify!($name), self.id),
					None => write!(f, "{}({})", stringify!($name), self.id),
				}
			}
		}
	};
}

stable_id! {
	/// Identifier of a solution, stable across graph versions.
	SolutionId
}

stable_id! {
	/// Identifier of a project, stable across graph versions.
	ProjectId
}

stable_id! {
	/// Identifier of a document, stable across graph versions.
	DocumentId
}
