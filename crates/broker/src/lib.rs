//! Brokered dispatch for out-of-process analysis.
//!
//! # Purpose
//!
//! A remote analysis process is asked to operate on a solution identified only
//! by its root checksum. This crate turns that checksum into a pinned,
//! materialized, immutable [`Snapshot`], runs the requested work against it,
//! and keeps the remote's view moving forward as the editor's graph changes.
//!
//! # Mental model
//!
//! Each connection is a [`RemoteSession`]. It owns a [`SnapshotResolver`]
//! (shared cache, per-session cancellation) and an [`EventChannel`] whose two
//! consumer loops replay host notifications to registered
//! [`WorkspaceListener`]s. Analysis services are constructed per session from
//! an explicit [`ServiceRegistry`].
//!
//! # Key types
//!
//! | Type | Role |
//! | --- | --- |
//! | [`SnapshotResolver`] | Pin, materialize and dispatch against one root. |
//! | [`EventChannel`] | Two FIFO queues with single consumers. |
//! | [`RemoteSession`] | Lifetime owner of per-connection state. |
//! | [`ServiceRegistry`] | `(capability, tag) → constructor` table. |
//! | [`RemoteEndpoint`] / [`HostEndpoint`] | Request routers on each side. |
//!
//! # Invariants
//!
//! - Pin Balance: every dispatch takes exactly one pin handle and releases it
//!   on every exit path.
//!   - Enforced in: `SnapshotResolver::run_against_snapshot`, `PinHandle::drop`
//!   - Tested by: `tests::pins_are_released_on_every_exit_path`
//!   - Failure symptom: cache growth past its budget; entries never evicted.
//!
//! - Single Materialization: concurrent dispatches against one root share a
//!   single transfer.
//!   - Enforced in: `SnapshotResolver::resolve`
//!   - Tested by: `tests::concurrent_dispatches_share_one_transfer`
//!   - Failure symptom: duplicate `GetMissingAssets` batches for one root.
//!
//! - Shared Subtrees: a dispatch reuses every subtree still materialized by an
//!   earlier one instead of decoding it again, and repeated dispatches against
//!   a recent root receive the same solution.
//!   - Enforced in: `AssetSynchronizer::materialize`, `SnapshotResolver::resolve`
//!   - Tested by: `tests::repeated_dispatches_share_materialized_nodes`
//!   - Failure symptom: every dispatch rebuilds and re-walks the whole tree.
//!
//! - Call-Order Delivery: events are enqueued synchronously and delivered by
//!   one consumer per queue, so listeners observe them in call order.
//!   - Enforced in: `EventChannel::workspace_changed`, `run_changes`
//!   - Tested by: `tests::changes_are_delivered_in_call_order`
//!   - Failure symptom: a listener sees version N+1 before version N.
//!
//! - Late Subscribers: a listener only sees events enqueued after it was
//!   registered.
//!   - Enforced in: `EventChannel::subscribe` (registration travels through both queues)
//!   - Tested by: `tests::subscription_takes_effect_in_queue_order`
//!   - Failure symptom: listeners receive changes relative to a base they never saw.

mod config;
mod error;
mod events;
pub mod protocol;
mod registry;
mod resolver;
mod session;


pub use config::{ConfigError, EventsConfig, TrellisConfig};
pub use error::{BrokerError, DispatchError, ListenerError, ListenerId};
pub use events::{DocumentEvent, EventChannel, WorkspaceChange, WorkspaceListener};
pub use protocol::{ErrorCode, HostEndpoint, RemoteEndpoint, RequestPayload, ResponsePayload};
pub use registry::{Capability, RegistryError, ServiceContext, ServiceKey, ServiceRegistry, ServiceRegistryBuilder};
pub use resolver::{Snapshot, SnapshotResolver};
pub use session::RemoteSession;
