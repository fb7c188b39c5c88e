// Copyright 2025 Irreducible Inc.
//! Canonical byte encoding.
//!
//! Everything that feeds a content hash (constraint systems, verification keys, proofs) is
//! serialized through these traits. Integers are written big-endian so that the byte stream reads
//! the same way as the fixed-width big-endian field elements it surrounds. Lengths and `usize`
//! values are written as `u32`.

use bytes::{Buf, BufMut};
use thiserror::Error;

/// Writes `self` into a byte buffer.
pub trait SerializeBytes {
	/// Appends the canonical encoding of `self` to `write_buf`.
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError>;
}

/// Reads a value back from its canonical encoding.
pub trait DeserializeBytes {
	/// Consumes the canonical encoding of a value from `read_buf`.
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized;
}

#[allow(missing_docs)] // errors are self-documenting
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
	#[error("write buffer is full")]
	WriteBufferFull,
	#[error("not enough data in read buffer to deserialize")]
	NotEnoughBytes,
	#[error("unknown enum variant index {name}::{index}")]
	UnknownEnumVariant { name: &'static str, index: u8 },
	#[error("invalid construction of {name}")]
	InvalidConstruction { name: &'static str },
	#[error("usize {size} is too large to serialize (max is {max})", max = u32::MAX)]
	UsizeTooLarge { size: usize },
	#[error("invalid utf-8 string: {0}")]
	FromUtf8Error(#[from] std::string::FromUtf8Error),
}

/// Serializes `value` into a freshly allocated vector.
pub fn serialize_to_vec(value: &impl SerializeBytes) -> Result<Vec<u8>, SerializationError> {
	let mut buf = Vec::new();
	value.serialize(&mut buf)?;
	Ok(buf)
}

impl<T: SerializeBytes + ?Sized> SerializeBytes for &T {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		(**self).serialize(write_buf)
	}
}

macro_rules! impl_be_integer {
	($ty:ty, $put:ident, $get:ident) => {
		impl SerializeBytes for $ty {
			fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
				assert_enough_space_for(&write_buf, size_of::<Self>())?;
				write_buf.$put(*self);
				Ok(())
			}
		}

		impl DeserializeBytes for $ty {
			fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
				assert_enough_data_for(&read_buf, size_of::<Self>())?;
				Ok(read_buf.$get())
			}
		}
	};
}

impl_be_integer!(u8, put_u8, get_u8);
impl_be_integer!(u16, put_u16, get_u16);
impl_be_integer!(u32, put_u32, get_u32);
impl_be_integer!(u64, put_u64, get_u64);

impl SerializeBytes for usize {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		let value: u32 = (*self)
			.try_into()
			.map_err(|_| SerializationError::UsizeTooLarge { size: *self })?;
		value.serialize(write_buf)
	}
}

impl DeserializeBytes for usize {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError> {
		Ok(u32::deserialize(read_buf)? as usize)
	}
}

impl SerializeBytes for bool {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		(*self as u8).serialize(write_buf)
	}
}

impl DeserializeBytes for bool {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError> {
		match u8::deserialize(read_buf)? {
			0 => Ok(false),
			1 => Ok(true),
			index => Err(SerializationError::UnknownEnumVariant {
				name: "bool",
				index,
			}),
		}
	}
}

impl SerializeBytes for str {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		let bytes = self.as_bytes();
		bytes.len().serialize(&mut write_buf)?;
		assert_enough_space_for(&write_buf, bytes.len())?;
		write_buf.put_slice(bytes);
		Ok(())
	}
}

impl SerializeBytes for String {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.as_str().serialize(write_buf)
	}
}

impl DeserializeBytes for String {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		let len = usize::deserialize(&mut read_buf)?;
		assert_enough_data_for(&read_buf, len)?;
		Ok(String::from_utf8(read_buf.copy_to_bytes(len).to_vec())?)
	}
}

impl<const N: usize> SerializeBytes for [u8; N] {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		assert_enough_space_for(&write_buf, N)?;
		write_buf.put_slice(self);
		Ok(())
	}
}

impl<const N: usize> DeserializeBytes for [u8; N] {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		assert_enough_data_for(&read_buf, N)?;
		let mut out = [0u8; N];
		read_buf.copy_to_slice(&mut out);
		Ok(out)
	}
}

impl<T: SerializeBytes> SerializeBytes for [T] {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.len().serialize(&mut write_buf)?;
		self.iter().try_for_each(|item| item.serialize(&mut write_buf))
	}
}

impl<T: SerializeBytes> SerializeBytes for Vec<T> {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.as_slice().serialize(write_buf)
	}
}

impl<T: DeserializeBytes> DeserializeBytes for Vec<T> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		let len = usize::deserialize(&mut read_buf)?;
		(0..len).map(|_| T::deserialize(&mut read_buf)).collect()
	}
}

impl<T: SerializeBytes> SerializeBytes for Option<T> {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		match self {
			Some(value) => {
				true.serialize(&mut write_buf)?;
				value.serialize(write_buf)
			}
			None => false.serialize(write_buf),
		}
	}
}

impl<T: DeserializeBytes> DeserializeBytes for Option<T> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		Ok(match bool::deserialize(&mut read_buf)? {
			true => Some(T::deserialize(read_buf)?),
			false => None,
		})
	}
}

#[inline]
pub fn assert_enough_space_for(
	write_buf: &impl BufMut,
	size: usize,
) -> Result<(), SerializationError> {
	if write_buf.remaining_mut() < size {
		return Err(SerializationError::WriteBufferFull);
	}
	Ok(())
}

#[inline]
pub fn assert_enough_data_for(read_buf: &impl Buf, size: usize) -> Result<(), SerializationError> {
	if read_buf.remaining() < size {
		return Err(SerializationError::NotEnoughBytes);
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;
	use rand::{RngCore, SeedableRng, rngs::StdRng};

	use super::*;

	#[test]
	fn test_integers_are_big_endian() {
		let bytes = serialize_to_vec(&0x0102_0304u32).unwrap();
		assert_eq!(bytes, vec![1, 2, 3, 4]);
		let bytes = serialize_to_vec(&7usize).unwrap();
		assert_eq!(bytes, vec![0, 0, 0, 7]);
	}

	#[test]
	fn test_byte_array_round_trip() {
		let mut rng = StdRng::seed_from_u64(0);
		let mut data = [0u8; 32];
		rng.fill_bytes(&mut data);

		let bytes = serialize_to_vec(&data).unwrap();
		let decoded = <[u8; 32]>::deserialize(bytes.as_slice()).unwrap();
		assert_eq!(decoded, data);
	}

	#[test]
	fn test_truncated_input() {
		let bytes = serialize_to_vec(&vec![1u64, 2, 3]).unwrap();
		let result = Vec::<u64>::deserialize(&bytes[..bytes.len() - 1]);
		assert_eq!(result, Err(SerializationError::NotEnoughBytes));
	}

	#[test]
	fn test_invalid_bool() {
		let result = bool::deserialize([2u8].as_slice());
		assert!(matches!(
			result,
			Err(SerializationError::UnknownEnumVariant { name: "bool", index: 2 })
		));
	}

	#[test]
	fn test_usize_too_large() {
		if usize::BITS > 32 {
			let size = u32::MAX as usize + 1;
			assert_eq!(
				serialize_to_vec(&size),
				Err(SerializationError::UsizeTooLarge { size })
			);
		}
	}

	proptest! {
		#[test]
		fn prop_string_and_option_round_trip(s in ".{0,40}", n in proptest::option::of(any::<u64>())) {
			let mut buf = Vec::new();
			s.serialize(&mut buf).unwrap();
			n.serialize(&mut buf).unwrap();

			let mut read = buf.as_slice();
			prop_assert_eq!(String::deserialize(&mut read).unwrap(), s);
			prop_assert_eq!(Option::<u64>::deserialize(&mut read).unwrap(), n);
			prop_assert!(read.is_empty());
		}
	}
}
