// Copyright 2025 Irreducible Inc.
//! [`Fp`], the native field of the arithmetization.

use std::{
	cmp::Ordering,
	fmt,
	ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign},
	str::FromStr,
	sync::LazyLock,
};

use bytes::{Buf, BufMut};
use duet_utils::serialization::{DeserializeBytes, SerializationError, SerializeBytes};
use num_bigint::{BigInt, BigUint, Sign};

/// Number of bytes in the canonical encoding of a field element.
pub const FIELD_BYTES: usize = 32;

/// Bit length of the modulus.
pub const MODULUS_BITS: usize = 255;

/// Little-endian limbs of the Pallas base field modulus
/// `0x40000000000000000000000000000000224698fc094cf91b992d30ed00000001`.
pub const MODULUS: [u64; 4] = [
	0x992d30ed00000001,
	0x224698fc094cf91b,
	0x0000000000000000,
	0x4000000000000000,
];

static MODULUS_BIG: LazyLock<BigUint> = LazyLock::new(|| limbs_to_biguint(&MODULUS));

/// Element of the Pallas base field.
///
/// The limbs are little-endian and always hold the canonical representative, so structural
/// equality is field equality.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Fp([u64; 4]);

impl Fp {
	/// Zero.
	pub const ZERO: Fp = Fp([0; 4]);
	/// One.
	pub const ONE: Fp = Fp([1, 0, 0, 0]);

	/// Creates a field element from a `u64`. Every `u64` is canonical.
	pub const fn from_u64(value: u64) -> Fp {
		Fp([value, 0, 0, 0])
	}

	/// Creates a field element from a signed integer, mapping negatives to `p - |value|`.
	pub fn from_i64(value: i64) -> Fp {
		let magnitude = Fp::from_u64(value.unsigned_abs());
		if value < 0 { -magnitude } else { magnitude }
	}

	/// Reduces an arbitrary unsigned integer modulo `p`.
	pub fn from_biguint(value: &BigUint) -> Fp {
		if value < &*MODULUS_BIG {
			Fp(biguint_to_limbs(value))
		} else {
			Fp(biguint_to_limbs(&(value % &*MODULUS_BIG)))
		}
	}

	/// Reduces an arbitrary signed integer modulo `p`.
	pub fn from_bigint(value: &BigInt) -> Fp {
		let reduced = Fp::from_biguint(value.magnitude());
		match value.sign() {
			Sign::Minus => -reduced,
			_ => reduced,
		}
	}

	/// The modulus as a big integer.
	pub fn modulus() -> &'static BigUint {
		&MODULUS_BIG
	}

	/// The canonical representative as a big integer.
	pub fn to_biguint(&self) -> BigUint {
		limbs_to_biguint(&self.0)
	}

	/// Returns the value if it fits in a `u64`.
	pub fn to_u64(&self) -> Option<u64> {
		match self.0 {
			[lo, 0, 0, 0] => Some(lo),
			_ => None,
		}
	}

	/// The little-endian limbs of the canonical representative.
	pub fn limbs(&self) -> [u64; 4] {
		self.0
	}

	/// Number of significant bits of the canonical representative.
	pub fn bits(&self) -> usize {
		for (i, limb) in self.0.iter().enumerate().rev() {
			if *limb != 0 {
				return 64 * i + (64 - limb.leading_zeros() as usize);
			}
		}
		0
	}

	/// Whether this is the additive identity.
	pub fn is_zero(&self) -> bool {
		*self == Fp::ZERO
	}

	/// `self * self`.
	pub fn square(&self) -> Fp {
		*self * *self
	}

	/// `self^exponent`.
	pub fn pow(&self, exponent: &BigUint) -> Fp {
		Fp(biguint_to_limbs(&self.to_biguint().modpow(exponent, &MODULUS_BIG)))
	}

	/// Multiplicative inverse, or `None` for zero.
	pub fn inverse(&self) -> Option<Fp> {
		if self.is_zero() {
			return None;
		}
		let exponent = &*MODULUS_BIG - 2u32;
		Some(self.pow(&exponent))
	}

	/// Fixed-width big-endian encoding.
	pub fn to_bytes_be(&self) -> [u8; FIELD_BYTES] {
		let mut out = [0u8; FIELD_BYTES];
		for (chunk, limb) in out.chunks_exact_mut(8).zip(self.0.iter().rev()) {
			chunk.copy_from_slice(&limb.to_be_bytes());
		}
		out
	}

	/// Decodes a fixed-width big-endian encoding. Returns `None` if the value is not below `p`.
	pub fn from_bytes_be(bytes: &[u8; FIELD_BYTES]) -> Option<Fp> {
		let mut limbs = [0u64; 4];
		for (limb, chunk) in limbs.iter_mut().rev().zip(bytes.chunks_exact(8)) {
			let mut buf = [0u8; 8];
			buf.copy_from_slice(chunk);
			*limb = u64::from_be_bytes(buf);
		}
		less_than(&limbs, &MODULUS).then_some(Fp(limbs))
	}

	/// Writes the value as a signed decimal, choosing `-k` when `p - k` is shorter.
	///
	/// Only used for human-readable dumps, where coefficients like `-1` are common.
	pub fn to_signed_string(&self) -> String {
		let neg = -*self;
		if neg.bits() < self.bits() {
			format!("-{neg}")
		} else {
			self.to_string()
		}
	}
}

fn limbs_to_biguint(limbs: &[u64; 4]) -> BigUint {
	let bytes: Vec<u8> = limbs.iter().flat_map(|limb| limb.to_le_bytes()).collect();
	BigUint::from_bytes_le(&bytes)
}

fn biguint_to_limbs(value: &BigUint) -> [u64; 4] {
	debug_assert!(value < &*MODULUS_BIG);
	let mut limbs = [0u64; 4];
	for (limb, digit) in limbs.iter_mut().zip(value.iter_u64_digits()) {
		*limb = digit;
	}
	limbs
}

fn less_than(a: &[u64; 4], b: &[u64; 4]) -> bool {
	for i in (0..4).rev() {
		if a[i] != b[i] {
			return a[i] < b[i];
		}
	}
	false
}

fn add_limbs(a: &[u64; 4], b: &[u64; 4]) -> [u64; 4] {
	let mut out = [0u64; 4];
	let mut carry = 0u128;
	for i in 0..4 {
		let sum = a[i] as u128 + b[i] as u128 + carry;
		out[i] = sum as u64;
		carry = sum >> 64;
	}
	out
}

fn sub_limbs(a: &[u64; 4], b: &[u64; 4]) -> ([u64; 4], bool) {
	let mut out = [0u64; 4];
	let mut borrow = false;
	for i in 0..4 {
		let (d1, b1) = a[i].overflowing_sub(b[i]);
		let (d2, b2) = d1.overflowing_sub(borrow as u64);
		out[i] = d2;
		borrow = b1 || b2;
	}
	(out, borrow)
}

impl Ord for Fp {
	fn cmp(&self, other: &Self) -> Ordering {
		self.0.iter().rev().cmp(other.0.iter().rev())
	}
}

impl PartialOrd for Fp {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Add for Fp {
	type Output = Fp;

	fn add(self, rhs: Fp) -> Fp {
		// Both operands are below 2^255, so the sum cannot overflow 256 bits.
		let sum = add_limbs(&self.0, &rhs.0);
		if less_than(&sum, &MODULUS) {
			Fp(sum)
		} else {
			Fp(sub_limbs(&sum, &MODULUS).0)
		}
	}
}

impl Sub for Fp {
	type Output = Fp;

	fn sub(self, rhs: Fp) -> Fp {
		let (diff, borrow) = sub_limbs(&self.0, &rhs.0);
		if borrow {
			Fp(add_limbs(&diff, &MODULUS))
		} else {
			Fp(diff)
		}
	}
}

impl Neg for Fp {
	type Output = Fp;

	fn neg(self) -> Fp {
		Fp::ZERO - self
	}
}

impl Mul for Fp {
	type Output = Fp;

	fn mul(self, rhs: Fp) -> Fp {
		let product = self.to_biguint() * rhs.to_biguint();
		Fp(biguint_to_limbs(&(product % &*MODULUS_BIG)))
	}
}

impl AddAssign for Fp {
	fn add_assign(&mut self, rhs: Fp) {
		*self = *self + rhs;
	}
}

impl SubAssign for Fp {
	fn sub_assign(&mut self, rhs: Fp) {
		*self = *self - rhs;
	}
}

impl MulAssign for Fp {
	fn mul_assign(&mut self, rhs: Fp) {
		*self = *self * rhs;
	}
}

impl From<u64> for Fp {
	fn from(value: u64) -> Self {
		Fp::from_u64(value)
	}
}

impl From<u32> for Fp {
	fn from(value: u32) -> Self {
		Fp::from_u64(value as u64)
	}
}

impl From<bool> for Fp {
	fn from(value: bool) -> Self {
		Fp::from_u64(value as u64)
	}
}

impl From<&BigUint> for Fp {
	fn from(value: &BigUint) -> Self {
		Fp::from_biguint(value)
	}
}

impl fmt::Debug for Fp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Fp({:#x})", self)
	}
}

impl fmt::Display for Fp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.to_u64() {
			Some(small) => write!(f, "{small}"),
			None => write!(f, "{}", self.to_biguint()),
		}
	}
}

impl fmt::LowerHex for Fp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if f.alternate() {
			f.write_str("0x")?;
		}
		for byte in self.to_bytes_be() {
			write!(f, "{byte:02x}")?;
		}
		Ok(())
	}
}

/// Error returned when parsing a field element from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid field element literal {0:?}")]
pub struct ParseFpError(pub String);

impl FromStr for Fp {
	type Err = ParseFpError;

	/// Accepts decimal or `0x`-prefixed hexadecimal. Values must be canonical.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let err = || ParseFpError(s.to_string());
		let (digits, radix) = match s.strip_prefix("0x") {
			Some(hex) => (hex, 16),
			None => (s, 10),
		};
		if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
			return Err(err());
		}
		let value = BigUint::parse_bytes(digits.as_bytes(), radix).ok_or_else(err)?;
		if &value >= Fp::modulus() {
			return Err(err());
		}
		Ok(Fp(biguint_to_limbs(&value)))
	}
}

impl serde::Serialize for Fp {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&format!("{self:#x}"))
	}
}

impl<'de> serde::Deserialize<'de> for Fp {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = <String as serde::Deserialize>::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

impl SerializeBytes for Fp {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.to_bytes_be().serialize(write_buf)
	}
}

impl DeserializeBytes for Fp {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError> {
		let bytes = <[u8; FIELD_BYTES]>::deserialize(read_buf)?;
		Fp::from_bytes_be(&bytes).ok_or(SerializationError::InvalidConstruction { name: "Fp" })
	}
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	fn arb_fp() -> impl Strategy<Value = Fp> {
		any::<[u8; 32]>().prop_map(|bytes| Fp::from_biguint(&BigUint::from_bytes_be(&bytes)))
	}

	#[test]
	fn test_modulus_wraps_to_zero() {
		let p = Fp::modulus().clone();
		assert_eq!(Fp::from_biguint(&p), Fp::ZERO);
		assert_eq!(Fp::from_biguint(&(p.clone() + 5u32)), Fp::from_u64(5));
		assert_eq!(-Fp::ONE + Fp::ONE, Fp::ZERO);
		assert_eq!((-Fp::ONE).to_biguint(), p - 1u32);
	}

	#[test]
	fn test_non_canonical_bytes_rejected() {
		let mut bytes = [0u8; 32];
		let p_bytes = Fp::modulus().to_bytes_be();
		bytes.copy_from_slice(&p_bytes);
		assert_eq!(Fp::from_bytes_be(&bytes), None);
		assert!(matches!(
			Fp::deserialize(bytes.as_slice()),
			Err(SerializationError::InvalidConstruction { name: "Fp" })
		));
	}

	#[test]
	fn test_text_formats() {
		let x = Fp::from_u64(255);
		assert_eq!(x.to_string(), "255");
		assert_eq!(format!("{x:#x}"), format!("0x{}ff", "0".repeat(62)));
		assert_eq!("0xff".parse::<Fp>(), Ok(x));
		assert_eq!("255".parse::<Fp>(), Ok(x));
		assert!("-1".parse::<Fp>().is_err());
		for loose in ["+255", "2_55", "0x+ff", "0xf_f", "", "0x", " 255"] {
			assert!(loose.parse::<Fp>().is_err(), "{loose:?} parsed");
		}
		assert_eq!((-Fp::from_u64(3)).to_signed_string(), "-3");
		assert_eq!(Fp::from_i64(-3), -Fp::from_u64(3));
	}

	#[test]
	fn test_inverse() {
		assert_eq!(Fp::ZERO.inverse(), None);
		let x = Fp::from_u64(123456789);
		assert_eq!(x * x.inverse().unwrap(), Fp::ONE);
	}

	proptest! {
		#[test]
		fn prop_bytes_round_trip(x in arb_fp()) {
			let bytes = x.to_bytes_be();
			prop_assert_eq!(Fp::from_bytes_be(&bytes), Some(x));
			prop_assert_eq!(Fp::from_bytes_be(&bytes).unwrap().to_bytes_be(), bytes);
		}

		#[test]
		fn prop_matches_biguint_arithmetic(a in arb_fp(), b in arb_fp()) {
			let p = Fp::modulus();
			let (ab, bb) = (a.to_biguint(), b.to_biguint());
			prop_assert_eq!((a + b).to_biguint(), (&ab + &bb) % p);
			prop_assert_eq!((a - b).to_biguint(), (&ab + p - &bb) % p);
			prop_assert_eq!((a * b).to_biguint(), (&ab * &bb) % p);
			prop_assert_eq!(a.cmp(&b), ab.cmp(&bb));
		}
	}
}
