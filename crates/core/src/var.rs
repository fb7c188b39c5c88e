// Copyright 2025 Irreducible Inc.
//! The [`Var`] value model.
//!
//! A [`Var`] is a known constant, a reference into the trace of the running program, or an affine
//! combination of references. Linear operations are purely symbolic and never touch the trace;
//! the backend decides later how a combination is laid out in gates.
//!
//! Normalization rules:
//!
//! 1. Operations on two constants fold to a constant, exactly, modulo `p`.
//! 2. `scale(0, v)` is the constant zero and `scale(1, v)` is `v`.
//! 3. Adding the constant zero returns the other operand unchanged.
//! 4. Adding non-constants concatenates their term lists and adds their offsets. Terms are not
//!    merged, reordered or dropped here.
//! 5. A combination without terms is a constant, and `1·v + 0` is the reference `v`.

use std::ops::{Add, Mul, Neg, Sub};

use cranelift_entity::entity_impl;
use smallvec::SmallVec;

use crate::field::Fp;

/// Index of a variable in the trace of a single run.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarIndex(u32);
entity_impl!(VarIndex, "v");

/// Term storage of a [`LinearCombination`].
pub type Terms = SmallVec<[(Fp, VarIndex); 4]>;

/// `Σ coeff·var + constant` with at least one term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearCombination {
	terms: Terms,
	constant: Fp,
}

impl LinearCombination {
	/// The `(coefficient, variable)` terms in the order they were combined.
	pub fn terms(&self) -> &[(Fp, VarIndex)] {
		&self.terms
	}

	/// The constant offset.
	pub fn constant(&self) -> Fp {
		self.constant
	}
}

/// A value of the arithmetization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Var {
	/// A value known while the program is being described.
	Constant(Fp),
	/// A variable of the trace.
	Reference(VarIndex),
	/// An affine combination of trace variables.
	LinearCombination(LinearCombination),
}

impl Var {
	/// A constant.
	pub fn constant(value: impl Into<Fp>) -> Var {
		Var::Constant(value.into())
	}

	/// The constant zero.
	pub fn zero() -> Var {
		Var::Constant(Fp::ZERO)
	}

	/// The constant one.
	pub fn one() -> Var {
		Var::Constant(Fp::ONE)
	}

	/// Builds `Σ terms + constant`, collapsing degenerate shapes.
	pub fn from_terms(terms: impl IntoIterator<Item = (Fp, VarIndex)>, constant: Fp) -> Var {
		let terms: Terms = terms.into_iter().collect();
		match terms.as_slice() {
			[] => Var::Constant(constant),
			[(coeff, var)] if *coeff == Fp::ONE && constant.is_zero() => Var::Reference(*var),
			_ => Var::LinearCombination(LinearCombination { terms, constant }),
		}
	}

	/// Whether the value is known without a trace.
	pub fn is_constant(&self) -> bool {
		matches!(self, Var::Constant(_))
	}

	/// The value of a constant.
	pub fn to_constant(&self) -> Option<Fp> {
		match self {
			Var::Constant(value) => Some(*value),
			_ => None,
		}
	}

	/// The index of a plain reference.
	pub fn as_reference(&self) -> Option<VarIndex> {
		match self {
			Var::Reference(var) => Some(*var),
			_ => None,
		}
	}

	/// Splits the value into its constant offset and its (unnormalized) terms.
	pub fn to_constant_and_terms(&self) -> (Fp, Terms) {
		match self {
			Var::Constant(value) => (*value, Terms::new()),
			Var::Reference(var) => (Fp::ZERO, smallvec::smallvec![(Fp::ONE, *var)]),
			Var::LinearCombination(lc) => (lc.constant, lc.terms.clone()),
		}
	}

	/// `coeff · self`.
	pub fn scale(&self, coeff: Fp) -> Var {
		if coeff.is_zero() {
			return Var::zero();
		}
		if coeff == Fp::ONE {
			return self.clone();
		}
		match self {
			Var::Constant(value) => Var::Constant(coeff * *value),
			Var::Reference(var) => Var::from_terms([(coeff, *var)], Fp::ZERO),
			Var::LinearCombination(lc) => Var::from_terms(
				lc.terms.iter().map(|&(c, var)| (coeff * c, var)),
				coeff * lc.constant,
			),
		}
	}

	/// Evaluates the value given the values of the trace variables.
	///
	/// Returns `None` if any referenced variable has no value.
	pub fn evaluate(&self, value_of: impl Fn(VarIndex) -> Option<Fp>) -> Option<Fp> {
		match self {
			Var::Constant(value) => Some(*value),
			Var::Reference(var) => value_of(*var),
			Var::LinearCombination(lc) => lc
				.terms
				.iter()
				.try_fold(lc.constant, |acc, &(coeff, var)| Some(acc + coeff * value_of(var)?)),
		}
	}

	/// Iterates over the referenced trace variables, repetitions included.
	pub fn references(&self) -> impl Iterator<Item = VarIndex> + '_ {
		let (single, terms): (Option<VarIndex>, &[(Fp, VarIndex)]) = match self {
			Var::Constant(_) => (None, &[]),
			Var::Reference(var) => (Some(*var), &[]),
			Var::LinearCombination(lc) => (None, &lc.terms),
		};
		single.into_iter().chain(terms.iter().map(|(_, var)| *var))
	}
}

fn add_vars(lhs: &Var, rhs: &Var) -> Var {
	match (lhs, rhs) {
		(Var::Constant(a), Var::Constant(b)) => Var::Constant(*a + *b),
		(var, Var::Constant(c)) | (Var::Constant(c), var) if c.is_zero() => var.clone(),
		_ => {
			let (lhs_constant, mut terms) = lhs.to_constant_and_terms();
			let (rhs_constant, rhs_terms) = rhs.to_constant_and_terms();
			terms.extend(rhs_terms);
			Var::from_terms(terms, lhs_constant + rhs_constant)
		}
	}
}

impl From<Fp> for Var {
	fn from(value: Fp) -> Self {
		Var::Constant(value)
	}
}

impl From<u64> for Var {
	fn from(value: u64) -> Self {
		Var::Constant(Fp::from_u64(value))
	}
}

impl From<VarIndex> for Var {
	fn from(var: VarIndex) -> Self {
		Var::Reference(var)
	}
}

macro_rules! impl_var_ops {
	($lhs:ty, $rhs:ty) => {
		impl Add<$rhs> for $lhs {
			type Output = Var;

			fn add(self, rhs: $rhs) -> Var {
				add_vars(&self, &rhs)
			}
		}

		impl Sub<$rhs> for $lhs {
			type Output = Var;

			fn sub(self, rhs: $rhs) -> Var {
				add_vars(&self, &rhs.scale(-Fp::ONE))
			}
		}
	};
}

impl_var_ops!(Var, Var);
impl_var_ops!(Var, &Var);
impl_var_ops!(&Var, Var);
impl_var_ops!(&Var, &Var);

impl Add<Fp> for &Var {
	type Output = Var;

	fn add(self, rhs: Fp) -> Var {
		add_vars(self, &Var::Constant(rhs))
	}
}

impl Add<Fp> for Var {
	type Output = Var;

	fn add(self, rhs: Fp) -> Var {
		&self + rhs
	}
}

impl Sub<Fp> for &Var {
	type Output = Var;

	fn sub(self, rhs: Fp) -> Var {
		add_vars(self, &Var::Constant(-rhs))
	}
}

impl Sub<Fp> for Var {
	type Output = Var;

	fn sub(self, rhs: Fp) -> Var {
		&self - rhs
	}
}

impl Mul<Fp> for &Var {
	type Output = Var;

	fn mul(self, rhs: Fp) -> Var {
		self.scale(rhs)
	}
}

impl Mul<Fp> for Var {
	type Output = Var;

	fn mul(self, rhs: Fp) -> Var {
		self.scale(rhs)
	}
}

impl Neg for &Var {
	type Output = Var;

	fn neg(self) -> Var {
		self.scale(-Fp::ONE)
	}
}

impl Neg for Var {
	type Output = Var;

	fn neg(self) -> Var {
		self.scale(-Fp::ONE)
	}
}

#[cfg(test)]
mod tests {
	use cranelift_entity::EntityRef;
	use proptest::prelude::*;

	use super::*;

	fn v(i: usize) -> VarIndex {
		VarIndex::new(i)
	}

	#[test]
	fn test_empty_combination_collapses() {
		assert_eq!(Var::from_terms([], Fp::from_u64(3)), Var::constant(3u64));
		assert_eq!(Var::from_terms([(Fp::ONE, v(2))], Fp::ZERO), Var::Reference(v(2)));
		assert!(matches!(
			Var::from_terms([(Fp::from_u64(2), v(2))], Fp::ZERO),
			Var::LinearCombination(_)
		));
	}

	#[test]
	fn test_linear_ops_stay_symbolic() {
		let x = Var::Reference(v(0));
		let sum = &x + &x;
		let (constant, terms) = sum.to_constant_and_terms();
		assert_eq!(constant, Fp::ZERO);
		assert_eq!(terms.as_slice(), &[(Fp::ONE, v(0)), (Fp::ONE, v(0))]);

		// x - x is not folded: only the backend merges like terms.
		let diff = &x - &x;
		assert_eq!(diff.to_constant_and_terms().1.len(), 2);
		assert_eq!(diff.evaluate(|_| Some(Fp::from_u64(9))), Some(Fp::ZERO));
	}

	#[test]
	fn test_scale_rules() {
		let x = Var::Reference(v(1));
		assert_eq!(x.scale(Fp::ZERO), Var::zero());
		assert_eq!(x.scale(Fp::ONE), x);
		let lc = (&x + Fp::from_u64(4)).scale(Fp::from_u64(3));
		let Var::LinearCombination(lc) = lc else {
			panic!("expected a linear combination");
		};
		assert_eq!(lc.terms(), &[(Fp::from_u64(3), v(1))]);
		assert_eq!(lc.constant(), Fp::from_u64(12));
	}

	#[test]
	fn test_adding_zero_is_identity() {
		let x = Var::Reference(v(5));
		assert_eq!(&x + Var::zero(), x);
		assert_eq!(Var::zero() + &x, x);
	}

	#[test]
	fn test_references() {
		let y = Var::Reference(v(1)) - Var::Reference(v(3)) + Fp::ONE;
		assert_eq!(y.references().collect::<Vec<_>>(), vec![v(1), v(3)]);
		assert_eq!(Var::one().references().count(), 0);
	}

	proptest! {
		#[test]
		fn prop_constant_folding(a in any::<u64>(), b in any::<u64>(), c in any::<u64>()) {
			let (fa, fb, fc) = (Fp::from_u64(a), Fp::from_u64(b), Fp::from_u64(c));
			let expr = (Var::Constant(fa) + Var::Constant(fb)).scale(fc) - Var::Constant(fa);
			prop_assert_eq!(expr, Var::Constant((fa + fb) * fc - fa));
		}
	}
}
