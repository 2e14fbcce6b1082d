//! Incremental synchronization of checksummed graph payloads.
//!
//! The host holds every payload of every live graph version. A remote process
//! holds an [`AssetCache`](trellis_assets::AssetCache) with whatever it has
//! seen before. To operate on a root checksum the remote walks the tree from
//! the root: a node already cached is read locally, a missing node is fetched.
//! Because every checksum covers its children's checksums, an unchanged
//! subtree is recognized at its top and never transferred. A subtree that is
//! still materialized from an earlier request is not even traversed; the new
//! tree shares its nodes.
//!
//! The host side is reached through the [`AssetSource`] trait;
//! [`LateBoundSource`] lets a remote start issuing requests before its
//! connection is established.

mod config;
mod error;
mod memo;
mod source;
mod synchronizer;


pub use config::SyncConfig;
pub use error::SyncError;
pub use source::{AssetSource, LateBoundSource};
pub use synchronizer::{AssetSynchronizer, Materialized, SyncReport};
