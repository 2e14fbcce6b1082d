//! Checksum-addressed asset cache.
//!
//! The [`AssetCache`] maps a [`Checksum`] to an immutable serialized payload
//! plus the checksums of the node's children. It is shared by every request in
//! the process; the table sits behind a single lock, while payload buffers are
//! reference-counted and read without it once handed out.
//!
//! # Retention
//!
//! A [`PinHandle`] is a lease on a set of checksums. Pinning a root pins every
//! entry reachable from it that is present at that moment, and the handle can
//! be extended as more of the tree arrives. Dropping the handle unpins exactly
//! what it pinned.
//!
//! # Invariants
//!
//! - Write-once: an entry is never overwritten. Re-inserting equal bytes is a
//!   no-op; different bytes under one checksum is a [`AssetError::ConsistencyFault`].
//! - Pinned entries are never evicted. Eviction takes the least recently
//!   unpinned entry once the byte budget is exceeded.
//!
//! [`Checksum`]: trellis_primitives::Checksum

mod cache;
mod config;


pub use cache::{Asset, AssetCache, AssetError, CacheStats, InsertOutcome, PinHandle};
pub use config::CacheConfig;
