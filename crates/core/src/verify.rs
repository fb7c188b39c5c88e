// Copyright 2025 Irreducible Inc.
//! Routines for checking whether a [`ConstraintSystem`] is satisfied by a [`Witness`].

use crate::{
	consts::{
		GENERIC_COEFFS, GENERIC_REGISTERS, MAX_RANGE_CHECK_BITS, RANGE_CHECK_LIMB_BITS,
		range_check_limbs,
	},
	constraint_system::{ConstraintSystem, Gate, GateKind},
	field::Fp,
	witness::{Row, Witness},
};

/// Evaluates one generic half gate `cl·l + cr·r + co·o + cm·l·r + cc`.
#[inline]
pub fn eval_generic_half(coeffs: &[Fp], [l, r, o]: [Fp; GENERIC_REGISTERS]) -> Fp {
	coeffs[0] * l + coeffs[1] * r + coeffs[2] * o + coeffs[3] * l * r + coeffs[4]
}

/// Verifies one generic half gate, offset by `public` for public-input rows.
pub fn verify_generic_half(
	coeffs: &[Fp],
	registers: [Fp; GENERIC_REGISTERS],
	public: Fp,
) -> Result<(), String> {
	let result = eval_generic_half(coeffs, registers) - public;
	if result.is_zero() {
		return Ok(());
	}
	let [l, r, o] = registers;
	Err(format!(
		"generic gate failed: {}·{l} + {}·{r} + {}·{o} + {}·{l}·{r} + {} = {} (expected {})",
		coeffs[0].to_signed_string(),
		coeffs[1].to_signed_string(),
		coeffs[2].to_signed_string(),
		coeffs[3].to_signed_string(),
		coeffs[4].to_signed_string(),
		result + public,
		public,
	))
}

/// Verifies a range-check row: `values[0] = Σ limbᵢ·2^(12i)` with every limb within its width.
pub fn verify_range_check(bits: usize, values: &Row) -> Result<(), String> {
	if bits == 0 || bits > MAX_RANGE_CHECK_BITS {
		return Err(format!("range check width {bits} is unsupported"));
	}
	let n_limbs = range_check_limbs(bits);
	let top_bits = bits - RANGE_CHECK_LIMB_BITS * (n_limbs - 1);
	let shift = Fp::from_u64(1 << RANGE_CHECK_LIMB_BITS);

	let mut recomposed = Fp::ZERO;
	for i in (0..n_limbs).rev() {
		let limb = values[1 + i];
		let width = if i == n_limbs - 1 {
			top_bits
		} else {
			RANGE_CHECK_LIMB_BITS
		};
		if limb.bits() > width {
			return Err(format!(
				"range check failed: limb {i} of {} is {limb}, which exceeds {width} bits",
				values[0]
			));
		}
		recomposed = recomposed * shift + limb;
	}
	if let Some((col, value)) = values
		.iter()
		.enumerate()
		.skip(1 + n_limbs)
		.find(|(_, value)| !value.is_zero())
	{
		return Err(format!(
			"range check failed: unused column {col} holds {value}"
		));
	}
	if recomposed != values[0] {
		return Err(format!(
			"range check failed: limbs recompose to {recomposed}, value is {}",
			values[0]
		));
	}
	Ok(())
}

/// Verifies the equations of a single gate against its row of values.
///
/// `public` is the public input bound by this row, if it is a public-input row.
pub fn verify_gate(gate: &Gate, values: &Row, public: Option<Fp>) -> Result<(), String> {
	match gate.kind {
		GateKind::Generic => {
			for half in 0..2 {
				let coeffs = &gate.coeffs[half * GENERIC_COEFFS..(half + 1) * GENERIC_COEFFS];
				let base = half * GENERIC_REGISTERS;
				let registers = [values[base], values[base + 1], values[base + 2]];
				let offset = match (half, public) {
					(0, Some(public)) => public,
					_ => Fp::ZERO,
				};
				verify_generic_half(coeffs, registers, offset)?;
			}
			Ok(())
		}
		GateKind::RangeCheck => {
			let bits = gate.coeffs[0]
				.to_u64()
				.ok_or_else(|| format!("range check width {} is not a small integer", gate.coeffs[0]))?;
			verify_range_check(bits as usize, values)
		}
	}
}

/// Verifies every gate and every copy constraint of `cs` against `witness`.
pub fn verify_constraints(cs: &ConstraintSystem, witness: &Witness) -> Result<(), String> {
	cs.validate().map_err(|err| err.to_string())?;
	if witness.rows().len() != cs.rows() {
		return Err(format!(
			"witness has {} rows, constraint system has {}",
			witness.rows().len(),
			cs.rows()
		));
	}
	if witness.public_input().len() != cs.public_input_size() {
		return Err(format!(
			"public input has {} values, constraint system expects {}",
			witness.public_input().len(),
			cs.public_input_size()
		));
	}

	for (row, (gate, values)) in cs.gates().iter().zip(witness.rows()).enumerate() {
		let public = witness.public_input().get(row).copied();
		verify_gate(gate, values, public).map_err(|err| format!("row {row}: {err}"))?;

		for (col, wire) in gate.wires.iter().enumerate() {
			let here = values[col];
			let there = witness.rows()[wire.row][wire.col];
			if here != there {
				return Err(format!(
					"copy constraint ({row}, {col}) -> ({}, {}) failed: {here} != {there}",
					wire.row, wire.col
				));
			}
		}
	}
	Ok(())
}
