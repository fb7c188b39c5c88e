// Copyright 2025 Irreducible Inc.
//! Content hashes used as equality oracles across engines.

use std::{fmt, str::FromStr};

use bytes::{Buf, BufMut};
use duet_utils::serialization::{DeserializeBytes, SerializationError, SerializeBytes};
use sha2::{Digest, Sha256};

/// SHA-256 output identifying a serialized artifact.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
	/// Hashes the canonical encoding of `value` under a domain separation tag.
	pub fn of(domain: &str, value: &impl SerializeBytes) -> Result<Self, SerializationError> {
		let mut hasher = HashWriter::new(domain)?;
		value.serialize(&mut hasher.buf)?;
		Ok(hasher.finish())
	}
}

/// Incrementally feeds serialized values into a SHA-256 state under a domain tag.
pub struct HashWriter {
	hasher: Sha256,
	buf: Vec<u8>,
}

impl HashWriter {
	/// Starts a new hash. The tag is written length-prefixed so distinct tags never collide.
	pub fn new(domain: &str) -> Result<Self, SerializationError> {
		let mut buf = Vec::new();
		domain.serialize(&mut buf)?;
		Ok(Self {
			hasher: Sha256::new(),
			buf,
		})
	}

	/// Appends the canonical encoding of `value`.
	pub fn write(&mut self, value: &impl SerializeBytes) -> Result<(), SerializationError> {
		value.serialize(&mut self.buf)?;
		if self.buf.len() >= 1 << 16 {
			self.hasher.update(&self.buf);
			self.buf.clear();
		}
		Ok(())
	}

	/// Finalizes the hash.
	pub fn finish(mut self) -> ContentHash {
		self.hasher.update(&self.buf);
		ContentHash(self.hasher.finalize().into())
	}
}

impl fmt::Display for ContentHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for byte in self.0 {
			write!(f, "{byte:02x}")?;
		}
		Ok(())
	}
}

impl fmt::Debug for ContentHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ContentHash({self})")
	}
}

impl FromStr for ContentHash {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.len() != 64 || !s.bytes().all(|c| c.is_ascii_hexdigit()) {
			return Err(format!("expected 64 hex digits, got {s:?}"));
		}
		let mut out = [0u8; 32];
		for (i, byte) in out.iter_mut().enumerate() {
			*byte = u8::from_str_radix(&s[2 * i..2 * i + 2], 16)
				.map_err(|_| format!("expected 64 hex digits, got {s:?}"))?;
		}
		Ok(ContentHash(out))
	}
}

impl serde::Serialize for ContentHash {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.to_string())
	}
}

impl<'de> serde::Deserialize<'de> for ContentHash {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = <String as serde::Deserialize>::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

impl SerializeBytes for ContentHash {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.0.serialize(write_buf)
	}
}

impl DeserializeBytes for ContentHash {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError> {
		Ok(ContentHash(<[u8; 32]>::deserialize(read_buf)?))
	}
}
