// Copyright 2025 Irreducible Inc.
//! Gate shapes shared by the engines.
//!
//! Every function here takes terms that the calling engine has already normalized: like terms
//! merged, zero coefficients dropped and the remaining terms ordered by variable index. Given the
//! same normalized terms the emitted gates are identical, so parity between engines reduces to
//! parity of their normalization, wiring and commitments.

use duet_core::{
	Fp, VarIndex,
	consts::{GENERIC_REGISTERS, MAX_RANGE_CHECK_BITS, RANGE_CHECK_LIMB_BITS, range_check_limbs},
};
use num_bigint::BigUint;

use crate::{
	BackendError,
	sink::{GateSink, GenericGate, Reduced},
};

/// A `(coefficient, variable)` pair of a normalized combination.
pub type Term = (Fp, VarIndex);

fn combine(sink: &dyn GateSink, terms: &[Term], constant: Fp) -> Option<Fp> {
	terms
		.iter()
		.try_fold(constant, |acc, &(coeff, var)| Some(acc + coeff * sink.value(var)?))
}

/// Emits `t = s1·v1 + s2·v2 + constant` for a fresh `t`.
fn fold_pair(sink: &mut dyn GateSink, a: Term, b: Term, constant: Fp) -> VarIndex {
	let value = combine(sink, &[a, b], constant);
	let t = sink.fresh(value);
	sink.emit_generic(
		GenericGate::new()
			.left(a.0, a.1)
			.right(b.0, b.1)
			.out(-Fp::ONE, t)
			.constant(constant),
	);
	t
}

/// Constrains `Σ terms + constant = 0`.
///
/// Up to three terms fit into one gate. Longer combinations fold their two leading terms into a
/// fresh variable until three remain.
pub fn assert_zero(
	sink: &mut dyn GateSink,
	mut terms: Vec<Term>,
	constant: Fp,
) -> Result<(), BackendError> {
	if terms.is_empty() {
		return if constant.is_zero() {
			Ok(())
		} else {
			Err(BackendError::Unsatisfiable { constant })
		};
	}
	while terms.len() > GENERIC_REGISTERS {
		let t = fold_pair(sink, terms[0], terms[1], Fp::ZERO);
		terms.splice(0..2, [(Fp::ONE, t)]);
	}
	let gate = terms
		.iter()
		.enumerate()
		.fold(GenericGate::new().constant(constant), |gate, (slot, &(coeff, var))| {
			gate.register(slot, coeff, var)
		});
	sink.emit_generic(gate);
	Ok(())
}

/// Reduces a combination to at most one variable.
///
/// A single term needs no gate. Longer combinations are folded left to right and the constant
/// is absorbed by the last fold.
pub fn reduce(sink: &mut dyn GateSink, terms: &[Term], constant: Fp) -> Reduced {
	match terms {
		[] => Reduced::Constant(constant),
		[(scale, var)] => Reduced::Affine {
			scale: *scale,
			var: *var,
			offset: constant,
		},
		[first, rest @ ..] => {
			let mut acc = *first;
			for (i, &term) in rest.iter().enumerate() {
				let offset = if i + 1 == rest.len() {
					constant
				} else {
					Fp::ZERO
				};
				acc = (Fp::ONE, fold_pair(sink, acc, term, offset));
			}
			Reduced::Affine {
				scale: Fp::ONE,
				var: acc.1,
				offset: Fp::ZERO,
			}
		}
	}
}

/// Turns a reduced operand into a plain variable, emitting `t = s·v + c` if needed.
pub fn materialize(
	sink: &mut dyn GateSink,
	reduced: Reduced,
	operation: &'static str,
) -> Result<VarIndex, BackendError> {
	match reduced {
		Reduced::Constant(_) => Err(BackendError::ConstantOperand { operation }),
		Reduced::Affine { scale, var, offset } if scale == Fp::ONE && offset.is_zero() => Ok(var),
		Reduced::Affine { scale, var, offset } => {
			let value = sink.value(var).map(|v| scale * v + offset);
			let t = sink.fresh(value);
			sink.emit_generic(
				GenericGate::new()
					.left(scale, var)
					.out(-Fp::ONE, t)
					.constant(offset),
			);
			Ok(t)
		}
	}
}

fn affine(reduced: Reduced, operation: &'static str) -> Result<(Fp, VarIndex, Fp), BackendError> {
	match reduced {
		Reduced::Constant(_) => Err(BackendError::ConstantOperand { operation }),
		Reduced::Affine { scale, var, offset } => Ok((scale, var, offset)),
	}
}

/// Emits `z = x·y` for a fresh `z`, expanding both affine operands into one gate.
pub fn multiply(sink: &mut dyn GateSink, x: Reduced, y: Reduced) -> Result<VarIndex, BackendError> {
	let (sx, vx, cx) = affine(x, "multiply")?;
	let (sy, vy, cy) = affine(y, "multiply")?;
	let value = sink
		.value(vx)
		.zip(sink.value(vy))
		.map(|(x, y)| (sx * x + cx) * (sy * y + cy));
	let z = sink.fresh(value);
	sink.emit_generic(
		GenericGate::new()
			.left(sx * cy, vx)
			.right(sy * cx, vy)
			.out(-Fp::ONE, z)
			.mul(sx * sy)
			.constant(cx * cy),
	);
	Ok(z)
}

/// Constrains `x·y = z`.
pub fn assert_multiply(
	sink: &mut dyn GateSink,
	x: Reduced,
	y: Reduced,
	z: Reduced,
) -> Result<(), BackendError> {
	let (sx, vx, cx) = affine(x, "assert_multiply")?;
	let (sy, vy, cy) = affine(y, "assert_multiply")?;
	let gate = GenericGate::new()
		.left(sx * cy, vx)
		.right(sy * cx, vy)
		.mul(sx * sy);
	let gate = match z {
		Reduced::Constant(cz) => gate.constant(cx * cy - cz),
		Reduced::Affine { scale, var, offset } => gate.out(-scale, var).constant(cx * cy - offset),
	};
	sink.emit_generic(gate);
	Ok(())
}

/// Splits `value` into `n` little-endian limbs of 12 bits, leaving every remaining bit in the top
/// limb so that an out-of-range value produces an oversized top limb rather than a wrong sum.
pub fn decompose(value: Fp, bits: usize) -> Vec<Fp> {
	let n_limbs = range_check_limbs(bits);
	let value = value.to_biguint();
	let mask = BigUint::from((1u32 << RANGE_CHECK_LIMB_BITS) - 1);
	(0..n_limbs)
		.map(|i| {
			let shifted = &value >> (RANGE_CHECK_LIMB_BITS * i);
			if i + 1 == n_limbs {
				Fp::from_biguint(&shifted)
			} else {
				Fp::from_biguint(&(shifted & &mask))
			}
		})
		.collect()
}

/// Emits a range-check row for `var`.
pub fn range_check(
	sink: &mut dyn GateSink,
	var: VarIndex,
	bits: usize,
) -> Result<(), BackendError> {
	if bits == 0 || bits > MAX_RANGE_CHECK_BITS {
		return Err(BackendError::RangeCheckTooWide { bits });
	}
	let limbs: Vec<VarIndex> = match sink.value(var) {
		Some(value) => decompose(value, bits)
			.into_iter()
			.map(|limb| sink.fresh(Some(limb)))
			.collect(),
		None => (0..range_check_limbs(bits)).map(|_| sink.fresh(None)).collect(),
	};
	sink.emit_range_check(var, &limbs, bits);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_decompose() {
		let limbs = decompose(Fp::from_u64(0xabc_def_123), 36);
		assert_eq!(limbs, vec![Fp::from_u64(0x123), Fp::from_u64(0xdef), Fp::from_u64(0xabc)]);

		// Bits above the range stay in the top limb.
		let limbs = decompose(Fp::from_u64(0x1_0000), 16);
		assert_eq!(limbs, vec![Fp::ZERO, Fp::from_u64(0x10)]);
	}
}
