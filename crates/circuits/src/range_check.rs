// Copyright 2025 Irreducible Inc.
//! Range-check gadgets.
//!
//! All of them lower to the backend's native range-check row. Constant inputs are checked
//! immediately and fail with [`Error::OutOfRange`].

use duet_core::Fp;
use duet_frontend::{CircuitBuilder, Error, Var};
use num_bigint::BigUint;

use crate::pow2;

/// Limb width of the multi-range checks, matching the foreign-field limbs.
pub const LIMB_BITS: usize = 88;

/// Asserts `x ∈ [0, 2^64)`.
pub fn range_check64(b: &CircuitBuilder, x: &Var) -> Result<(), Error> {
	b.range_check("range_check64", x, 64)
}

/// Asserts `x ∈ [0, 2^32)`.
pub fn range_check32(b: &CircuitBuilder, x: &Var) -> Result<(), Error> {
	b.range_check("range_check32", x, 32)
}

/// Asserts `x ∈ [0, 2^16)`.
pub fn range_check16(b: &CircuitBuilder, x: &Var) -> Result<(), Error> {
	b.range_check("range_check16", x, 16)
}

/// Asserts `x ∈ [0, 2^8)`.
pub fn range_check8(b: &CircuitBuilder, x: &Var) -> Result<(), Error> {
	b.range_check("range_check8", x, 8)
}

/// Asserts `x ∈ [0, 2^n)`.
pub fn range_check_n(b: &CircuitBuilder, x: &Var, n: usize) -> Result<(), Error> {
	b.range_check("range_check_n", x, n)
}

/// Asserts that each of `x`, `y`, `z` lies in `[0, 2^88)`.
///
/// # Cost
///
/// Three range-check rows.
pub fn multi_range_check(b: &CircuitBuilder, limbs: &[Var; 3]) -> Result<(), Error> {
	for limb in limbs {
		b.range_check("multi_range_check", limb, LIMB_BITS)?;
	}
	Ok(())
}

/// Splits `x01 = x0 + 2^88·x1` and asserts `x0, x1, x2 ∈ [0, 2^88)`.
///
/// Returns the full limbs `[x0, x1, x2]`.
///
/// # Cost
///
/// Three range-check rows and one half gate.
pub fn compact_multi_range_check(
	b: &CircuitBuilder,
	x01: &Var,
	x2: &Var,
) -> Result<[Var; 3], Error> {
	if let (Some(c01), Some(c2)) = (x01.to_constant(), x2.to_constant()) {
		for (value, bits) in [(c01, 2 * LIMB_BITS), (c2, LIMB_BITS)] {
			if value.bits() > bits {
				return Err(Error::OutOfRange {
					gadget: "compact_multi_range_check".to_string(),
					bits,
					value: value.to_biguint(),
				});
			}
		}
		let [x0, x1] = split_compact_limb(c01);
		return Ok([Var::Constant(x0), Var::Constant(x1), x2.clone()]);
	}
	let [x0, x1] = b.witness_array(|values| split_compact_limb(values.get(x01)));
	b.assert_eq("compact_multi_range_check", x01, &(&x0 + x1.scale(pow2(LIMB_BITS))))?;
	let limbs = [x0, x1, x2.clone()];
	multi_range_check(b, &limbs)?;
	Ok(limbs)
}

fn split_compact_limb(x01: Fp) -> [Fp; 2] {
	let x01 = x01.to_biguint();
	let mask = (BigUint::from(1u8) << LIMB_BITS) - 1u8;
	[Fp::from_biguint(&(&x01 & &mask)), Fp::from_biguint(&(x01 >> LIMB_BITS))]
}

#[cfg(test)]
mod tests {
	use duet_core::GateKind;
	use duet_frontend::{BackendKind, Context};
	use rstest::rstest;

	use super::*;

	fn context() -> Context {
		Context::with_backend(BackendKind::Default).unwrap()
	}

	#[rstest]
	#[case::fits(255, true)]
	#[case::too_wide(256, false)]
	fn test_range_check8(#[case] value: u64, #[case] fits: bool) {
		let ctx = context();
		let checked = ctx.run_and_check(|b| {
			let x = b.witness(|_| Fp::from_u64(value));
			range_check8(b, &x)
		});
		assert_eq!(checked.is_ok(), fits);

		let evaluated = ctx.evaluate(|b| range_check8(b, &Var::constant(value)));
		assert_eq!(evaluated.is_ok(), fits);
		if !fits {
			assert!(matches!(
				evaluated,
				Err(Error::OutOfRange { ref gadget, bits: 8, .. }) if gadget == "range_check8"
			));
		}
	}

	#[test]
	fn test_widths() {
		let ctx = context();
		ctx.run_and_check(|b| {
			let x = b.witness(|_| Fp::from_u64(u64::MAX));
			range_check64(b, &x)?;
			let y = b.witness(|_| Fp::from_u64(u32::MAX as u64));
			range_check32(b, &y)?;
			let z = b.witness(|_| Fp::from_u64(0xffff));
			range_check16(b, &z)?;
			range_check_n(b, &z, 17)
		})
		.unwrap();

		let err = ctx
			.run_and_check(|b| {
				let x = b.witness(|_| Fp::from_u64(1 << 32));
				range_check32(b, &x)
			})
			.unwrap_err();
		assert!(err.is_assertion_failure());
	}

	#[test]
	fn test_multi_range_check() {
		let ctx = context();
		let top = Fp::from_biguint(&((BigUint::from(1u8) << LIMB_BITS) - 1u8));
		let cs = ctx
			.constraint_system(|b| {
				let limbs = b.witness_array(|_| [top, Fp::ZERO, Fp::ONE]);
				multi_range_check(b, &limbs)
			})
			.unwrap();
		assert_eq!(cs.rows(), 3);
		assert!(cs.gates().iter().all(|gate| gate.kind == GateKind::RangeCheck));

		ctx.run_and_check(|b| {
			let limbs = b.witness_array(|_| [top, Fp::ZERO, Fp::ONE]);
			multi_range_check(b, &limbs)
		})
		.unwrap();
		let err = ctx
			.run_and_check(|b| {
				let limbs = b.witness_array(|_| [Fp::ZERO, top + Fp::ONE, Fp::ONE]);
				multi_range_check(b, &limbs)
			})
			.unwrap_err();
		assert!(err.is_assertion_failure());
	}

	#[test]
	fn test_compact_multi_range_check() {
		let ctx = context();
		let x0 = Fp::from_u64(123);
		let x1 = Fp::from_u64(456);
		let x01 = x0 + x1 * pow2(LIMB_BITS);

		let limbs = ctx
			.run_and_check(|b| {
				let [x01, x2] = b.witness_array(|_| [x01, Fp::from_u64(789)]);
				let limbs = compact_multi_range_check(b, &x01, &x2)?;
				Ok(limbs.map(|limb| b.read(&limb)))
			})
			.unwrap();
		assert_eq!(limbs, [Some(x0), Some(x1), Some(Fp::from_u64(789))]);

		let constant = ctx
			.evaluate(|b| compact_multi_range_check(b, &Var::Constant(x01), &Var::zero()))
			.unwrap();
		assert_eq!(constant[1], Var::Constant(x1));

		let cs = ctx
			.constraint_system(|b| {
				let [x01, x2] = b.witness_array(|_| [x01, Fp::ZERO]);
				compact_multi_range_check(b, &x01, &x2)
			})
			.unwrap();
		assert_eq!(cs.rows(), 4);

		// A value above 2^176 leaves a top limb that does not fit.
		let err = ctx
			.run_and_check(|b| {
				let x01 = b.witness(|_| pow2(2 * LIMB_BITS));
				compact_multi_range_check(b, &x01, &Var::zero())
			})
			.unwrap_err();
		assert!(err.is_assertion_failure());
	}
}
