// Copyright 2025 Irreducible Inc.
//! Division with remainder by powers of two and the modular additions built on it.

use duet_core::Fp;
use duet_frontend::{CircuitBuilder, Error, Var};
use num_bigint::BigUint;

use crate::pow2;

/// Result of [`div_mod32`] and [`div_mod64`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivMod {
	/// `⌊x / 2^k⌋`.
	pub quotient: Var,
	/// `x mod 2^k`.
	pub remainder: Var,
}

/// Decomposes `x ∈ [0, 2^64)` as `x = quotient·2^32 + remainder` with both parts in `[0, 2^32)`.
///
/// Acts as a proof that `x` fits in 64 bits.
///
/// # Cost
///
/// Two range-check rows and one half gate.
pub fn div_mod32(b: &CircuitBuilder, x: &Var) -> Result<DivMod, Error> {
	div_mod(b, "div_mod32", x, 32)
}

/// Decomposes `x ∈ [0, 2^128)` as `x = quotient·2^64 + remainder` with both parts in `[0, 2^64)`.
pub fn div_mod64(b: &CircuitBuilder, x: &Var) -> Result<DivMod, Error> {
	div_mod(b, "div_mod64", x, 64)
}

/// `(x + y) mod 2^32` for `x, y ∈ [0, 2^32)`.
pub fn add_mod32(b: &CircuitBuilder, x: &Var, y: &Var) -> Result<Var, Error> {
	Ok(div_mod32(b, &(x + y))?.remainder)
}

/// `(x + y) mod 2^64` for `x, y ∈ [0, 2^64)`.
pub fn add_mod64(b: &CircuitBuilder, x: &Var, y: &Var) -> Result<Var, Error> {
	Ok(div_mod64(b, &(x + y))?.remainder)
}

/// `(x · y) mod 2^32` for `x, y ∈ [0, 2^32)`.
pub fn mul_mod32(b: &CircuitBuilder, x: &Var, y: &Var) -> Result<Var, Error> {
	Ok(div_mod32(b, &b.mul(x, y)?)?.remainder)
}

fn split(value: &BigUint, k: usize) -> [BigUint; 2] {
	let mask = (BigUint::from(1u8) << k) - 1u8;
	[value >> k, value & mask]
}

fn div_mod(b: &CircuitBuilder, name: &str, x: &Var, k: usize) -> Result<DivMod, Error> {
	if let Some(c) = x.to_constant() {
		if c.bits() > 2 * k {
			return Err(Error::OutOfRange {
				gadget: name.to_string(),
				bits: 2 * k,
				value: c.to_biguint(),
			});
		}
		let [q, r] = split(&c.to_biguint(), k);
		return Ok(DivMod {
			quotient: Var::Constant(Fp::from_biguint(&q)),
			remainder: Var::Constant(Fp::from_biguint(&r)),
		});
	}

	let [quotient, remainder] = b.witness_array(|values| {
		split(&values.get(x).to_biguint(), k).map(|part| Fp::from_biguint(&part))
	});
	b.range_check(format!("{name}.quotient"), &quotient, k)?;
	b.range_check(format!("{name}.remainder"), &remainder, k)?;
	b.assert_eq(name, x, &(quotient.scale(pow2(k)) + &remainder))?;
	Ok(DivMod {
		quotient,
		remainder,
	})
}
