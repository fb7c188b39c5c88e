// Copyright 2025 Irreducible Inc.
//! The interface through which engines emit gates into the running program.

use duet_core::{
	Fp, VarIndex,
	consts::{GENERIC_COEFFS, GENERIC_REGISTERS},
};

/// Receiver of the gates and auxiliary variables an engine produces while lowering.
///
/// The frontend's run state implements this: it owns the trace and the recorder. In modes without
/// concrete values, [`GateSink::value`] returns `None` and fresh variables carry no value.
pub trait GateSink {
	/// Appends a variable to the trace.
	fn fresh(&mut self, value: Option<Fp>) -> VarIndex;

	/// The value of a variable, if known.
	fn value(&self, var: VarIndex) -> Option<Fp>;

	/// Records one generic half gate.
	fn emit_generic(&mut self, gate: GenericGate);

	/// Records a range-check row decomposing `value` into `limbs`, least significant first.
	fn emit_range_check(&mut self, value: VarIndex, limbs: &[VarIndex], bits: usize);
}

/// A half gate `cl·l + cr·r + co·o + cm·l·r + cc = 0` over up to three variables.
///
/// Registers without a variable hold zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenericGate {
	/// `[cl, cr, co, cm, cc]`.
	pub coeffs: [Fp; GENERIC_COEFFS],
	/// Variables in the left, right and output registers.
	pub vars: [Option<VarIndex>; GENERIC_REGISTERS],
}

impl GenericGate {
	/// The all-zero gate.
	pub fn new() -> Self {
		Self::default()
	}

	/// Places `var` with coefficient `coeff` into register `slot`.
	pub fn register(mut self, slot: usize, coeff: Fp, var: VarIndex) -> Self {
		self.coeffs[slot] = coeff;
		self.vars[slot] = Some(var);
		self
	}

	/// Sets the left register.
	pub fn left(self, coeff: Fp, var: VarIndex) -> Self {
		self.register(0, coeff, var)
	}

	/// Sets the right register.
	pub fn right(self, coeff: Fp, var: VarIndex) -> Self {
		self.register(1, coeff, var)
	}

	/// Sets the output register.
	pub fn out(self, coeff: Fp, var: VarIndex) -> Self {
		self.register(2, coeff, var)
	}

	/// Sets the coefficient of `l·r`.
	pub fn mul(mut self, coeff: Fp) -> Self {
		self.coeffs[3] = coeff;
		self
	}

	/// Sets the constant term.
	pub fn constant(mut self, constant: Fp) -> Self {
		self.coeffs[4] = constant;
		self
	}

	/// The register values, zero for empty registers. `None` if a present variable has no value.
	pub fn registers(
		&self,
		value_of: impl Fn(VarIndex) -> Option<Fp>,
	) -> Option<[Fp; GENERIC_REGISTERS]> {
		let mut out = [Fp::ZERO; GENERIC_REGISTERS];
		for (cell, var) in out.iter_mut().zip(self.vars) {
			if let Some(var) = var {
				*cell = value_of(var)?;
			}
		}
		Some(out)
	}
}

/// An operand reduced to at most one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduced {
	/// No variable remains.
	Constant(Fp),
	/// `scale·var + offset`.
	Affine {
		/// Coefficient of `var`.
		scale: Fp,
		/// The variable.
		var: VarIndex,
		/// Constant offset.
		offset: Fp,
	},
}
