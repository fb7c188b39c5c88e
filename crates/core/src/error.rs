// Copyright 2025 Irreducible Inc.
//! Hosts error definitions for the core crate.

use crate::{consts::MAX_RANGE_CHECK_BITS, field::Fp};

/// Constraint system related error.
#[allow(missing_docs)] // errors are self-documenting
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstraintSystemError {
	#[error("public input size {public_input_size} exceeds the row count {rows}")]
	PublicInputTooLarge { public_input_size: usize, rows: usize },
	#[error("row {row} is a public input row but is not a generic gate with coefficients [1, 0, ..]")]
	MalformedPublicInputRow { row: usize },
	#[error("{kind} gate in row {row} has {actual} coefficients, expected {expected}")]
	CoefficientCount {
		kind: &'static str,
		row: usize,
		expected: usize,
		actual: usize,
	},
	#[error("range check in row {row} spans {bits} bits (supported: 1..={MAX_RANGE_CHECK_BITS})")]
	RangeCheckWidth { row: usize, bits: Fp },
	#[error("wire ({row}, {col}) points to ({target_row}, {target_col}) which is outside the table")]
	WireOutOfRange {
		row: usize,
		col: usize,
		target_row: usize,
		target_col: usize,
	},
	#[error("the permutation is not a bijection: ({target_row}, {target_col}) is targeted twice")]
	PermutationNotBijective { target_row: usize, target_col: usize },
	#[error("constraint system digest mismatch: recorded {recorded}, computed {computed}")]
	DigestMismatch { recorded: String, computed: String },
	#[error("unknown gate type {0:?}")]
	UnknownGateType(String),
	#[error("malformed constraint system JSON: {0}")]
	Json(String),
}
