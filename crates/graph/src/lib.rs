//! Immutable, content-addressed workspace graph.
//!
//! A [`SolutionNode`] owns an ordered list of [`ProjectNode`]s, each owning an
//! ordered list of [`DocumentNode`]s. Every node carries a [`Checksum`] of its
//! payload: the node-local content followed by its children's checksums in
//! declared order. Nodes are never mutated; edits path-copy from the changed
//! node up to the root and share every untouched subtree.
//!
//! # Invariants
//!
//! - Determinism: structurally equal trees checksum identically regardless of
//!   how they were built.
//! - Locality: an edit to one document changes the checksums of that document,
//!   its project and the solution, and nothing else.
//! - Round trip: decoding a node's payload and re-encoding it reproduces the
//!   same bytes, and therefore the same checksum.
//!
//! [`Checksum`]: trellis_primitives::Checksum

mod edit;
mod error;
mod node;
pub mod payload;

#[cfg(test)]
mod tests;

pub use error::GraphError;
pub use node::{
	DocumentInfo, DocumentKind, DocumentNode, NodeKind, NodeRef, ProjectInfo, ProjectNode, SolutionInfo, SolutionNode,
};
pub use payload::{AssembleError, NodeLookup, NodePayload, PayloadError, assemble_solution, assemble_with};
