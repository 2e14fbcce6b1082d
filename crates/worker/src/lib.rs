//! Session-scoped task spawning for trellis services.
//!
//! Every remote connection opens a [`SessionScope`] from a shared
//! [`SessionClock`]. The scope carries the connection's generation and its
//! close signal, and tasks spawned through it run inside a span tagged with
//! both, so log lines from concurrent sessions can be told apart.

mod class;
mod scope;
mod spawn;


pub use class::TaskClass;
pub use scope::{SessionClock, SessionScope};
pub use spawn::{spawn, spawn_blocking};
