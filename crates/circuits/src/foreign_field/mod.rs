// Copyright 2025 Irreducible Inc.
//! Arithmetic modulo a foreign prime `f` over three 88-bit limbs.
//!
//! An element `x` is stored as limbs `(x0, x1, x2)` with `x = x0 + 2^88·x1 + 2^176·x2`. Every limb
//! produced by a gadget here is range-checked to 88 bits, so representable values are below
//! `2^264`. Values are not kept reduced modulo `f`: additions defer the reduction and
//! multiplications return a remainder that is only checked to fit in the limbs.
//!
//! Multiplication needs its inputs to be *almost reduced*, meaning `x2 ≤ f2` for the top limb
//! `f2` of the modulus (see [`ForeignField::assert_almost_reduced`]). Inputs that have not been
//! through that check are rejected with [`Error::UnreducedInput`].

mod mul;
mod sum;
#[cfg(test)]
mod tests;

use duet_core::Fp;
use duet_frontend::{CircuitBuilder, Error, Values, Var};
use num_bigint::BigUint;

use crate::{
	basic, pow2,
	range_check::{LIMB_BITS, multi_range_check},
};

pub use sum::Sign;

/// Whether an element is known to satisfy the almost-reduced bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
	/// Limbs fit in 88 bits, nothing more is known.
	Unreduced,
	/// Additionally `x2 ≤ f2`.
	AlmostReduced,
}

/// A foreign field element in limb form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field3 {
	limbs: [Var; 3],
	reduction: Reduction,
}

impl Field3 {
	pub(crate) fn new(limbs: [Var; 3], reduction: Reduction) -> Self {
		Field3 { limbs, reduction }
	}

	/// The limbs, least significant first.
	pub fn limbs(&self) -> &[Var; 3] {
		&self.limbs
	}

	/// What is known about the size of the element.
	pub fn reduction(&self) -> Reduction {
		self.reduction
	}

	/// Whether every limb is a constant.
	pub fn is_constant(&self) -> bool {
		self.limbs.iter().all(Var::is_constant)
	}

	/// The integer the limbs represent, if every limb is a constant.
	pub fn to_constant(&self) -> Option<BigUint> {
		let limbs = [
			self.limbs[0].to_constant()?,
			self.limbs[1].to_constant()?,
			self.limbs[2].to_constant()?,
		];
		Some(compose(&limbs.map(|limb| limb.to_biguint())))
	}

	/// The integer the limbs represent, if the run knows the value of every limb.
	pub fn read(&self, b: &CircuitBuilder) -> Option<BigUint> {
		Some(compose(&self.read_limbs(b)?))
	}

	fn read_limbs(&self, b: &CircuitBuilder) -> Option<[BigUint; 3]> {
		Some([
			b.read(&self.limbs[0])?.to_biguint(),
			b.read(&self.limbs[1])?.to_biguint(),
			b.read(&self.limbs[2])?.to_biguint(),
		])
	}

	/// `x0 + 2^88·x1`.
	pub(crate) fn low(&self) -> Var {
		&self.limbs[0] + self.limbs[1].scale(pow2(LIMB_BITS))
	}

	/// The element reduced modulo the native field, `x0 + 2^88·x1 + 2^176·x2`.
	pub fn native(&self) -> Var {
		self.low() + self.limbs[2].scale(pow2(2 * LIMB_BITS))
	}
}

/// Splits an integer below `2^264` into three 88-bit limbs.
pub(crate) fn split(value: &BigUint) -> [BigUint; 3] {
	let mask = (BigUint::from(1u8) << LIMB_BITS) - 1u8;
	[
		value & &mask,
		(value >> LIMB_BITS) & &mask,
		value >> (2 * LIMB_BITS),
	]
}

pub(crate) fn compose(limbs: &[BigUint; 3]) -> BigUint {
	&limbs[0] + (&limbs[1] << LIMB_BITS) + (&limbs[2] << (2 * LIMB_BITS))
}

fn to_fp_limbs(value: &BigUint) -> [Fp; 3] {
	split(value).map(|limb| Fp::from_biguint(&limb))
}

/// Path of a gadget's error relative to the builder's namespace.
fn gadget_path(b: &CircuitBuilder, name: &str) -> String {
	let base = b.path();
	if base.is_empty() {
		name.to_string()
	} else {
		format!("{base}.{name}")
	}
}

fn unreduced_input(b: &CircuitBuilder, gadget: &str, reason: impl Into<String>) -> Error {
	Error::UnreducedInput {
		gadget: gadget_path(b, gadget),
		reason: reason.into(),
	}
}

/// A foreign prime field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignField {
	modulus: BigUint,
	limbs: [BigUint; 3],
}

impl ForeignField {
	/// Largest supported modulus bit width.
	pub const MAX_MODULUS_BITS: u64 = 259;

	/// Creates the field of integers modulo `modulus`.
	///
	/// # Preconditions
	///
	/// `modulus` must be prime, wider than two limbs and below `2^259`.
	pub fn new(modulus: BigUint) -> Self {
		let bits = modulus.bits();
		assert!(
			bits > 2 * LIMB_BITS as u64 && bits <= Self::MAX_MODULUS_BITS,
			"foreign modulus must have between 177 and 259 bits, got {bits}"
		);
		let limbs = split(&modulus);
		ForeignField { modulus, limbs }
	}

	/// The base field of secp256k1.
	pub fn secp256k1() -> Self {
		let modulus = (BigUint::from(1u8) << 256) - (BigUint::from(1u8) << 32) - 977u32;
		Self::new(modulus)
	}

	/// The modulus `f`.
	pub fn modulus(&self) -> &BigUint {
		&self.modulus
	}

	/// The modulus as a native field element.
	fn modulus_native(&self) -> Fp {
		Fp::from_biguint(&self.modulus)
	}

	/// A constant element, reduced modulo `f`.
	pub fn constant(&self, value: &BigUint) -> Field3 {
		let limbs = to_fp_limbs(&(value % &self.modulus)).map(Var::Constant);
		Field3::new(limbs, Reduction::AlmostReduced)
	}

	/// Introduces an element computed by `compute` and range-checks its limbs.
	///
	/// The computed value must be below `2^264`. It is not reduced and not bounded by `f`: call
	/// [`Self::assert_almost_reduced`] before multiplying it.
	///
	/// # Cost
	///
	/// Three range-check rows.
	pub fn witness(
		&self,
		b: &CircuitBuilder,
		compute: impl FnOnce(&Values<'_>) -> BigUint,
	) -> Result<Field3, Error> {
		let limbs = b.witness_array(|values| to_fp_limbs(&compute(values)));
		multi_range_check(b, &limbs)?;
		Ok(Field3::new(limbs, Reduction::Unreduced))
	}

	/// Offset added to the top limb by the almost-reduced check. `x2 + offset < 2^88` holds exactly
	/// when `x2 ≤ f2`, or `x2 < f2` if the lower limbs of `f` are zero.
	fn bound_offset(&self) -> BigUint {
		let top = BigUint::from(1u8) << LIMB_BITS;
		let lower_zero = self.limbs[0] == BigUint::ZERO && self.limbs[1] == BigUint::ZERO;
		if lower_zero {
			top - &self.limbs[2]
		} else {
			top - 1u8 - &self.limbs[2]
		}
	}

	/// Asserts that the top limb of `x` does not exceed the top limb of `f` and returns `x`
	/// marked as almost reduced.
	///
	/// An almost-reduced element is below `2^176·(f2 + 1)`, which leaves room to add two of them
	/// and to multiply them without overflowing three limbs.
	///
	/// # Cost
	///
	/// One range-check row and a half gate.
	pub fn assert_almost_reduced(&self, b: &CircuitBuilder, x: &Field3) -> Result<Field3, Error> {
		if x.reduction == Reduction::AlmostReduced {
			return Ok(x.clone());
		}
		let offset = Fp::from_biguint(&self.bound_offset());
		let bounded = &x.limbs[2] + offset;
		if let Some(value) = bounded.to_constant() {
			if value.bits() > LIMB_BITS {
				return Err(unreduced_input(
					b,
					"foreign_field.almost_reduced",
					format!("top limb exceeds {}", self.limbs[2]),
				));
			}
		} else {
			b.range_check("foreign_field.almost_reduced", &bounded, LIMB_BITS)?;
		}
		Ok(Field3::new(x.limbs.clone(), Reduction::AlmostReduced))
	}

	fn require_almost_reduced(
		&self,
		b: &CircuitBuilder,
		gadget: &str,
		inputs: &[&Field3],
	) -> Result<(), Error> {
		match inputs
			.iter()
			.position(|x| x.reduction != Reduction::AlmostReduced)
		{
			Some(index) => Err(unreduced_input(
				b,
				gadget,
				format!("operand {index} has not been checked to be almost reduced"),
			)),
			None => Ok(()),
		}
	}

	/// Returns 1 if `x ≡ c (mod f)` and 0 otherwise.
	///
	/// `x` must be almost reduced, so that it can only equal `c` or `c + f` as an integer.
	pub fn equals(&self, b: &CircuitBuilder, x: &Field3, c: &BigUint) -> Result<Var, Error> {
		self.require_almost_reduced(b, "foreign_field.equals", &[x])?;
		let c = c % &self.modulus;
		if let Some(value) = x.to_constant() {
			return Ok(Var::Constant(Fp::from(value % &self.modulus == c)));
		}
		let mut result = Var::zero();
		for candidate in [c.clone(), c + &self.modulus] {
			let limbs = to_fp_limbs(&candidate);
			let low = Var::Constant(limbs[0] + limbs[1] * pow2(LIMB_BITS));
			let low_equal = basic::equals(b, &x.low(), &low)?;
			let high_equal = basic::equals(b, &x.limbs[2], &Var::Constant(limbs[2]))?;
			// x cannot equal both candidates, so the flags add up to the disjunction.
			result = result + b.mul(&low_equal, &high_equal)?;
		}
		Ok(result)
	}

	/// Returns 1 if `x ≡ 0 (mod f)` and 0 otherwise.
	pub fn is_zero(&self, b: &CircuitBuilder, x: &Field3) -> Result<Var, Error> {
		self.equals(b, x, &BigUint::ZERO)
	}

	/// Asserts that `x` and `y` have identical limbs.
	pub fn assert_equal(&self, b: &CircuitBuilder, x: &Field3, y: &Field3) -> Result<(), Error> {
		let b = b.subcircuit("foreign_field_assert_equal");
		for (i, (x, y)) in x.limbs.iter().zip(&y.limbs).enumerate() {
			b.assert_eq(format!("limb{i}"), x, y)?;
		}
		Ok(())
	}
}
