// Copyright 2025 Irreducible Inc.
//! Layout constants of the gate table.

/// Number of witness columns in every row.
pub const COLUMNS: usize = 15;

/// Number of leading columns that take part in the permutation argument.
pub const PERMUTS: usize = 7;

/// Number of wires in one generic half gate (left, right, output).
pub const GENERIC_REGISTERS: usize = 3;

/// Number of coefficients of one generic half gate: left, right, output, multiplication, constant.
pub const GENERIC_COEFFS: usize = 5;

/// A generic row packs two half gates.
pub const GENERIC_ROW_COEFFS: usize = 2 * GENERIC_COEFFS;

/// Width of a limb in a range-check row.
pub const RANGE_CHECK_LIMB_BITS: usize = 12;

/// Column 0 holds the checked value, the rest hold limbs.
pub const MAX_RANGE_CHECK_LIMBS: usize = COLUMNS - 1;

/// Widest range a single range-check row can enforce.
pub const MAX_RANGE_CHECK_BITS: usize = RANGE_CHECK_LIMB_BITS * MAX_RANGE_CHECK_LIMBS;

/// Number of limbs a range check of `bits` bits decomposes into.
pub const fn range_check_limbs(bits: usize) -> usize {
	bits.div_ceil(RANGE_CHECK_LIMB_BITS)
}
