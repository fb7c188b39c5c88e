// Copyright 2025 Irreducible Inc.
//! Addition chains with deferred reduction.
//!
//! Each step computes `r = x ± y - o·f` with an overflow `o ∈ {0, ±1}` chosen so that `r` stays
//! non-negative and below `2^264`. The step is checked on two halves: the low 176 bits with a carry
//! `c ∈ {-1, 0, 1}` into the top limb, and the top limb itself. Only the final result of a chain is
//! range-checked.

use duet_core::Fp;
use duet_frontend::{CircuitBuilder, Error, Var};
use num_bigint::{BigInt, BigUint};

use super::{Field3, ForeignField, Reduction, compose, split, unreduced_input};
use crate::{
	pow2,
	range_check::{LIMB_BITS, multi_range_check},
};

/// Whether a term of [`ForeignField::sum`] is added or subtracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
	/// `+`
	Plus,
	/// `-`
	Minus,
}

impl Sign {
	fn to_i64(self) -> i64 {
		match self {
			Sign::Plus => 1,
			Sign::Minus => -1,
		}
	}
}

struct AddWitness {
	result: [BigUint; 3],
	overflow: i64,
	carry: i64,
}

impl AddWitness {
	fn values(&self) -> [Fp; 5] {
		let [r0, r1, r2] = self.result.each_ref().map(Fp::from_biguint);
		[r0, r1, r2, Fp::from_i64(self.overflow), Fp::from_i64(self.carry)]
	}
}

fn low_half(limbs: &[BigUint; 3]) -> BigInt {
	BigInt::from(&limbs[0] + (&limbs[1] << LIMB_BITS))
}

impl ForeignField {
	/// `x + y`.
	pub fn add(&self, b: &CircuitBuilder, x: &Field3, y: &Field3) -> Result<Field3, Error> {
		self.sum(b, &[x.clone(), y.clone()], &[Sign::Plus])
	}

	/// `x - y`.
	pub fn sub(&self, b: &CircuitBuilder, x: &Field3, y: &Field3) -> Result<Field3, Error> {
		self.sum(b, &[x.clone(), y.clone()], &[Sign::Minus])
	}

	/// `-x`, as `f - x`.
	pub fn neg(&self, b: &CircuitBuilder, x: &Field3) -> Result<Field3, Error> {
		self.sub(b, &self.constant(&BigUint::ZERO), x)
	}

	/// `xs[0] ± xs[1] ± …` with `signs[i]` applied to `xs[i + 1]`.
	///
	/// The result is congruent to the sum modulo `f` and fits in three limbs, but is not reduced.
	/// Fails with [`Error::UnreducedInput`] if an intermediate result cannot be represented, which
	/// can only happen for operands well above `f`.
	///
	/// # Cost
	///
	/// Per term, three half gates plus the two limb equations. Three range-check rows for the
	/// result.
	///
	/// # Panics
	///
	/// Panics unless there is exactly one sign per term after the first.
	pub fn sum(&self, b: &CircuitBuilder, xs: &[Field3], signs: &[Sign]) -> Result<Field3, Error> {
		assert!(
			!xs.is_empty() && signs.len() + 1 == xs.len(),
			"expected one sign per term after the first"
		);
		if signs.is_empty() {
			return Ok(xs[0].clone());
		}

		if let Some(values) = xs.iter().map(Field3::to_constant).collect::<Option<Vec<_>>>() {
			let modulus = BigInt::from(self.modulus.clone());
			let mut total = BigInt::from(values[0].clone());
			for (value, sign) in values[1..].iter().zip(signs) {
				total += BigInt::from(sign.to_i64()) * BigInt::from(value.clone());
			}
			let reduced = ((total % &modulus) + &modulus) % &modulus;
			let reduced = reduced
				.to_biguint()
				.expect("a euclidean remainder is non-negative");
			return Ok(self.constant(&reduced));
		}

		let b = b.subcircuit("foreign_field_sum");
		let mut acc = xs[0].clone();
		for (y, sign) in xs[1..].iter().zip(signs) {
			acc = self.single_add(&b, &acc, y, *sign)?;
		}
		multi_range_check(&b, &acc.limbs)?;
		Ok(acc)
	}

	fn single_add(
		&self,
		b: &CircuitBuilder,
		x: &Field3,
		y: &Field3,
		sign: Sign,
	) -> Result<Field3, Error> {
		let known = match (x.read_limbs(b), y.read_limbs(b)) {
			(Some(x), Some(y)) => Some(self.add_witness(&x, &y, sign).ok_or_else(|| {
				unreduced_input(b, "add", "the intermediate result does not fit in three limbs")
			})?),
			_ => None,
		};
		let [r0, r1, r2, overflow, carry] =
			b.witness_array(|_| known.as_ref().map_or([Fp::ZERO; 5], AddWitness::values));

		let s = Fp::from_i64(sign.to_i64());
		b.assert_mul("overflow", &overflow, &(&overflow - s), &Var::zero())?;
		let carry_squared = b.square(&carry)?;
		b.assert_mul("carry", &carry_squared, &carry, &carry)?;

		let f = self.limbs.each_ref().map(Fp::from_biguint);
		let f01 = f[0] + f[1] * pow2(LIMB_BITS);
		let result = Field3::new([r0, r1, r2], Reduction::Unreduced);
		b.assert_eq(
			"low",
			&(result.low() + carry.scale(pow2(2 * LIMB_BITS))),
			&(x.low() + y.low().scale(s) - overflow.scale(f01)),
		)?;
		b.assert_eq(
			"high",
			&result.limbs[2],
			&(&x.limbs[2] + y.limbs[2].scale(s) - overflow.scale(f[2]) + &carry),
		)?;
		Ok(result)
	}

	fn add_witness(&self, x: &[BigUint; 3], y: &[BigUint; 3], sign: Sign) -> Option<AddWitness> {
		let modulus = BigInt::from(self.modulus.clone());
		let s = BigInt::from(sign.to_i64());
		let mut value = BigInt::from(compose(x)) + &s * BigInt::from(compose(y));
		let overflow: i64 = match sign {
			Sign::Plus if value >= modulus => {
				value -= &modulus;
				1
			}
			Sign::Minus if value < BigInt::ZERO => {
				value += &modulus;
				-1
			}
			_ => 0,
		};
		let value = value.to_biguint()?;
		if value.bits() > 3 * LIMB_BITS as u64 {
			return None;
		}
		let result = split(&value);

		// The low halves differ by a multiple of 2^176, which is the carry.
		let carry = low_half(x) + &s * low_half(y)
			- BigInt::from(overflow) * low_half(&self.limbs)
			- low_half(&result);
		let carry = i64::try_from(carry >> (2 * LIMB_BITS)).ok()?;
		(-1..=1).contains(&carry).then_some(AddWitness {
			result,
			overflow,
			carry,
		})
	}
}
