// Copyright 2025 Irreducible Inc.

//! Gadgets built on [`duet_frontend::CircuitBuilder`].
//!
//! Every gadget follows the same pattern: fold constant inputs directly, otherwise witness the
//! result (and any auxiliary values), range-check what needs bounding and assert the defining
//! equation.

pub mod basic;
pub mod div_mod;
pub mod foreign_field;
pub mod poseidon;
pub mod range_check;

use duet_core::Fp;
use num_bigint::BigUint;

/// `2^k` as a field element.
pub(crate) fn pow2(k: usize) -> Fp {
	Fp::from_biguint(&(BigUint::from(1u8) << k))
}
