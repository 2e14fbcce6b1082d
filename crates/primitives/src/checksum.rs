use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::Xxh3;

/// Fixed-length content digest used as both identity and change key.
///
/// Computed with XXH3-128 over a node's serialized payload. Two payloads with
/// equal bytes always produce equal checksums; unequal checksums are taken to
/// mean unequal content.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Checksum([u8; Checksum::LEN]);

impl Checksum {
	/// Digest length in bytes.
	pub const LEN: usize = 16;

	/// The all-zero checksum. Never produced by hashing real content in practice.
	pub const NULL: Self = Self([0; Self::LEN]);

	/// Hashes a byte slice.
	pub fn of(bytes: &[u8]) -> Self {
		let mut hasher = ChecksumHasher::new();
		hasher.update(bytes);
		hasher.finish()
	}

	/// Wraps raw digest bytes.
	pub const fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
		Self(bytes)
	}

	/// Parses a checksum from a wire slice, which must be exactly [`Self::LEN`] bytes.
	pub fn from_slice(bytes: &[u8]) -> Result<Self, ChecksumParseError> {
		let raw: [u8; Self::LEN] = bytes.try_into().map_err(|_| ChecksumParseError::Length(bytes.len()))?;
		Ok(Self(raw))
	}

	/// Returns the raw digest bytes.
	pub const fn as_bytes(&self) -> &[u8; Self::LEN] {
		&self.0
	}

	/// Short hex prefix for log lines.
	pub fn short(&self) -> String {
		self.0[..4].iter().map(|b| format!("{b:02x}")).collect()
	}
}

impl fmt::Display for Checksum {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for byte in &self.0 {
			write!(f, "{byte:02x}")?;
		}
		Ok(())
	}
}

impl fmt::Debug for Checksum {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Checksum({})", self.short())
	}
}

impl FromStr for Checksum {
	type Err = ChecksumParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.len() != Self::LEN * 2 {
			return Err(ChecksumParseError::Length(s.len() / 2));
		}
		// `from_str_radix` alone would accept a leading sign in each pair.
		if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
			return Err(ChecksumParseError::InvalidHex);
		}
		let mut raw = [0u8; Self::LEN];
		for (byte, pair) in raw.iter_mut().zip(s.as_bytes().chunks_exact(2)) {
			*byte = (hex_value(pair[0]) << 4) | hex_value(pair[1]);
		}
		Ok(Self(raw))
	}
}

/// Value of one ASCII hex digit. Callers check `is_ascii_hexdigit` first.
const fn hex_value(digit: u8) -> u8 {
	match digit {
		b'0'..=b'9' => digit - b'0',
		b'a'..=b'f' => digit - b'a' + 10,
		_ => digit - b'A' + 10,
	}
}

/// Errors from decoding a checksum off the wire or from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChecksumParseError {
	#[error("checksum must be {len} bytes, got {0}", len = Checksum::LEN)]
	Length(usize),
	#[error("checksum is not valid hex")]
	InvalidHex,
}

/// Streaming checksum builder.
///
/// Feeding the same sequence of updates always yields the same [`Checksum`],
/// regardless of how the input was chunked.
pub struct ChecksumHasher {
	inner: Xxh3,
}

impl ChecksumHasher {
	pub fn new() -> Self {
		Self { inner: Xxh3::new() }
	}

	/// Appends raw bytes.
	pub fn update(&mut self, bytes: &[u8]) {
		self.inner.update(bytes);
	}

	/// Appends another checksum's digest bytes.
	pub fn update_checksum(&mut self, checksum: &Checksum) {
		self.inner.update(checksum.as_bytes());
	}

	pub fn finish(&self) -> Checksum {
		Checksum(self.inner.digest128().to_le_bytes())
	}
}

impl Default for ChecksumHasher {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn same_content_same_checksum() {
		assert_eq!(Checksum::of(b"class A {}"), Checksum::of(b"class A {}"));
	}

	#[test]
	fn different_content_different_checksum() {
		let inputs: [&[u8]; 5] = [b"", b"A", b"B", b"AB", b"BA"];
		for (i, lhs) in inputs.iter().enumerate() {
			for rhs in &inputs[i + 1..] {
				assert_ne!(Checksum::of(lhs), Checksum::of(rhs), "{lhs:?} vs {rhs:?}");
			}
		}
	}

	#[test]
	fn chunking_does_not_change_digest() {
		let mut hasher = ChecksumHasher::new();
		hasher.update(b"hello ");
		hasher.update(b"world");
		assert_eq!(hasher.finish(), Checksum::of(b"hello world"));
	}

	#[test]
	fn hex_display_parses_back() {
		let checksum = Checksum::of(b"solution");
		let text = checksum.to_string();
		assert_eq!(text.len(), Checksum::LEN * 2);
		assert_eq!(text.parse::<Checksum>(), Ok(checksum));
	}

	#[test]
	fn rejects_wrong_length_and_bad_hex() {
		assert_eq!(Checksum::from_slice(&[1, 2, 3]), Err(ChecksumParseError::Length(3)));
		assert_eq!("zz".repeat(Checksum::LEN).parse::<Checksum>(), Err(ChecksumParseError::InvalidHex));
		assert_eq!(ChecksumParseError::Length(3).to_string(), "checksum must be 16 bytes, got 3");
	}

	#[test]
	fn signed_pairs_are_not_hex() {
		assert_eq!("+a".repeat(Checksum::LEN).parse::<Checksum>(), Err(ChecksumParseError::InvalidHex));
		assert_eq!("-0".repeat(Checksum::LEN).parse::<Checksum>(), Err(ChecksumParseError::InvalidHex));
		let upper = Checksum::of(b"solution").to_string().to_ascii_uppercase();
		assert_eq!(upper.parse::<Checksum>(), Ok(Checksum::of(b"solution")));
	}

	#[test]
	fn wire_form_is_fixed_length() {
		let bytes = postcard::to_stdvec(&Checksum::of(b"x")).unwrap();
		assert_eq!(bytes.len(), Checksum::LEN);
	}
}
