//! Editor-side state: the authoritative payload store and the mutable
//! workspace whose edits drive change notifications.

mod config;
mod store;
mod workspace;


pub use config::HostConfig;
pub use store::HostAssetStore;
pub use workspace::Workspace;
