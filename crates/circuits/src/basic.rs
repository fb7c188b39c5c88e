// Copyright 2025 Irreducible Inc.
//! Boolean helpers and bit decomposition.
//!
//! Booleans are plain [`Var`]s holding 0 or 1. Functions taking a condition assume it is boolean;
//! functions returning one constrain it to be.

use duet_core::{Fp, consts::MAX_RANGE_CHECK_BITS, field::MODULUS_BITS};
use duet_frontend::{CircuitBuilder, Error, Var};

use crate::pow2;

/// Returns 1 if `x = 0` and 0 otherwise.
///
/// # Cost
///
/// Two half gates.
pub fn is_zero(b: &CircuitBuilder, x: &Var) -> Result<Var, Error> {
	if let Some(c) = x.to_constant() {
		return Ok(Var::Constant(Fp::from(c.is_zero())));
	}
	// flag = 1 - x·inv together with x·flag = 0 forces flag = [x = 0].
	let inv = b.witness(|values| values.get(x).inverse().unwrap_or(Fp::ZERO));
	let flag = Var::one() - b.mul(x, &inv)?;
	b.assert_mul("is_zero", x, &flag, &Var::zero())?;
	Ok(flag)
}

/// Returns 1 if `x = y` and 0 otherwise.
pub fn equals(b: &CircuitBuilder, x: &Var, y: &Var) -> Result<Var, Error> {
	is_zero(b, &(x - y))
}

/// `if cond { if_true } else { if_false }` for a boolean `cond`.
///
/// # Cost
///
/// One half gate unless `cond` is constant.
pub fn select(b: &CircuitBuilder, cond: &Var, if_true: &Var, if_false: &Var) -> Result<Var, Error> {
	Ok(b.mul(cond, &(if_true - if_false))? + if_false)
}

/// Decomposes `x` into `n` bits, least significant first, and asserts the decomposition.
///
/// Fails if `x` does not fit in `n` bits.
///
/// # Preconditions
///
/// `n` must be less than the field's bit width.
pub fn to_bits(b: &CircuitBuilder, x: &Var, n: usize) -> Result<Vec<Var>, Error> {
	assert!(n < MODULUS_BITS, "cannot decompose into {n} bits");
	if let Some(c) = x.to_constant() {
		let value = c.to_biguint();
		if c.bits() > n {
			return Err(Error::OutOfRange {
				gadget: "to_bits".to_string(),
				bits: n,
				value,
			});
		}
		return Ok((0..n)
			.map(|i| Var::Constant(Fp::from(value.bit(i as u64))))
			.collect());
	}
	let bits: Vec<Var> = (0..n)
		.map(|i| b.witness(|values| Fp::from(values.get(x).to_biguint().bit(i as u64))))
		.collect();
	for bit in &bits {
		b.assert_boolean("to_bits.bit", bit)?;
	}
	b.assert_eq("to_bits", x, &from_bits(&bits))?;
	Ok(bits)
}

/// `Σ 2^i·bits[i]`. Linear, so no gates are emitted.
pub fn from_bits(bits: &[Var]) -> Var {
	bits.iter()
		.enumerate()
		.fold(Var::zero(), |acc, (i, bit)| acc + bit.scale(pow2(i)))
}

/// Asserts `x ≤ y` for `x, y < 2^bits`.
///
/// # Cost
///
/// One range-check row (plus a half gate to materialize `y - x`).
pub fn assert_less_than_or_equal(
	b: &CircuitBuilder,
	x: &Var,
	y: &Var,
	bits: usize,
) -> Result<(), Error> {
	assert!(bits <= MAX_RANGE_CHECK_BITS, "cannot compare {bits}-bit values");
	b.range_check("assert_less_than_or_equal", &(y - x), bits)
}

#[cfg(test)]
mod tests {
	use duet_frontend::{BackendKind, Context};
	use rstest::rstest;

	use super::*;

	fn context() -> Context {
		Context::with_backend(BackendKind::Default).unwrap()
	}

	#[rstest]
	#[case(0, 1)]
	#[case(1, 0)]
	#[case(12345, 0)]
	fn test_is_zero(#[case] value: u64, #[case] expected: u64) {
		let ctx = context();
		let checked = ctx
			.run_and_check(|b| {
				let x = b.witness(|_| Fp::from_u64(value));
				let flag = is_zero(b, &x)?;
				Ok(b.read(&flag))
			})
			.unwrap();
		assert_eq!(checked, Some(Fp::from_u64(expected)));

		let evaluated = ctx
			.evaluate(|b| Ok(is_zero(b, &Var::constant(value))?.to_constant()))
			.unwrap();
		assert_eq!(evaluated, Some(Fp::from_u64(expected)));
	}

	#[test]
	fn test_is_zero_cost() {
		let cs = context()
			.constraint_system(|b| {
				let x = b.witness(|_| Fp::ONE);
				is_zero(b, &x)
			})
			.unwrap();
		assert_eq!(cs.rows(), 1);
	}

	#[test]
	fn test_equals_and_select() {
		context()
			.run_and_check(|b| {
				let [x, y] = b.witness_array(|_| [Fp::from_u64(7), Fp::from_u64(7)]);
				let eq = equals(b, &x, &y)?;
				assert_eq!(b.read(&eq), Some(Fp::ONE));

				let picked = select(b, &eq, &Var::constant(10u64), &Var::constant(20u64))?;
				assert_eq!(b.read(&picked), Some(Fp::from_u64(10)));
				let picked = select(b, &(Var::one() - &eq), &x, &Var::constant(20u64))?;
				assert_eq!(b.read(&picked), Some(Fp::from_u64(20)));
				Ok(())
			})
			.unwrap();
	}

	#[test]
	fn test_bits_round_trip() {
		context()
			.run_and_check(|b| {
				let x = b.witness(|_| Fp::from_u64(0b1011));
				let bits = to_bits(b, &x, 6)?;
				let values: Vec<_> = bits.iter().map(|bit| b.read(bit).unwrap()).collect();
				assert_eq!(values, [1u64, 1, 0, 1, 0, 0].map(Fp::from_u64));
				assert_eq!(b.read(&from_bits(&bits)), Some(Fp::from_u64(11)));
				Ok(())
			})
			.unwrap();

		let err = context()
			.run_and_check(|b| {
				let x = b.witness(|_| Fp::from_u64(64));
				to_bits(b, &x, 6)
			})
			.unwrap_err();
		assert!(err.is_assertion_failure());

		let err = context()
			.evaluate(|b| to_bits(b, &Var::constant(64u64), 6))
			.unwrap_err();
		assert!(matches!(err, Error::OutOfRange { bits: 6, .. }));
	}

	#[rstest]
	#[case(3, 5, true)]
	#[case(5, 5, true)]
	#[case(6, 5, false)]
	fn test_assert_less_than_or_equal(#[case] x: u64, #[case] y: u64, #[case] holds: bool) {
		let result = context().run_and_check(|b| {
			let [x, y] = b.witness_array(|_| [Fp::from_u64(x), Fp::from_u64(y)]);
			assert_less_than_or_equal(b, &x, &y, 16)
		});
		assert_eq!(result.is_ok(), holds);
	}
}
