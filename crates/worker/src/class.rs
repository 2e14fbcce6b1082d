/// What a spawned task does, recorded on its span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Long-lived per-session loops such as event delivery.
	Service,
	/// Filesystem walking and hashing on the blocking pool.
	IoBlocking,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Service => "service",
			Self::IoBlocking => "io_blocking",
		}
	}
}
