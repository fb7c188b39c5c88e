// Copyright 2025 Irreducible Inc.
//! The default engine.
//!
//! Straightforward single-threaded implementation: combinations are normalized by sorting and
//! merging a vector, copy cycles are built from a hash map of occurrences and columns are
//! committed one after another.

use std::collections::HashMap;

use duet_core::{
	ConstraintSystem, Fp, Var, VarIndex, Wire, Witness,
	consts::{COLUMNS, PERMUTS},
};

use crate::{
	Backend, BackendError, BackendKind,
	keys::{KeyColumn, VerificationKey, commit_column, domain_size},
	lowering::{self, Term},
	proof::{self, Proof, witness_label},
	sink::{GateSink, Reduced},
};

/// The single-threaded reference engine.
#[derive(Debug, Default)]
pub struct ReferenceEngine;

impl ReferenceEngine {
	/// Creates the engine.
	pub fn new() -> Self {
		Self
	}

	fn normalize(x: &Var) -> (Vec<Term>, Fp) {
		let (constant, terms) = x.to_constant_and_terms();
		let mut terms = terms.into_vec();
		terms.sort_by_key(|&(_, var)| var);

		let mut merged: Vec<Term> = Vec::with_capacity(terms.len());
		for (coeff, var) in terms {
			match merged.last_mut() {
				Some((acc, last)) if *last == var => *acc += coeff,
				_ => merged.push((coeff, var)),
			}
		}
		merged.retain(|(coeff, _)| !coeff.is_zero());
		(merged, constant)
	}

	fn reduce(sink: &mut dyn GateSink, x: &Var) -> Reduced {
		let (terms, constant) = Self::normalize(x);
		lowering::reduce(sink, &terms, constant)
	}
}

impl Backend for ReferenceEngine {
	fn kind(&self) -> BackendKind {
		BackendKind::Default
	}

	fn reduce_to_var(&self, sink: &mut dyn GateSink, x: &Var) -> Result<Var, BackendError> {
		match Self::reduce(sink, x) {
			Reduced::Constant(constant) => Ok(Var::Constant(constant)),
			reduced => lowering::materialize(sink, reduced, "reduce_to_var").map(Var::Reference),
		}
	}

	fn assert_zero(&self, sink: &mut dyn GateSink, x: &Var) -> Result<(), BackendError> {
		let (terms, constant) = Self::normalize(x);
		lowering::assert_zero(sink, terms, constant)
	}

	fn multiply(&self, sink: &mut dyn GateSink, x: &Var, y: &Var) -> Result<VarIndex, BackendError> {
		let x = Self::reduce(sink, x);
		let y = Self::reduce(sink, y);
		lowering::multiply(sink, x, y)
	}

	fn assert_multiply(
		&self,
		sink: &mut dyn GateSink,
		x: &Var,
		y: &Var,
		z: &Var,
	) -> Result<(), BackendError> {
		let x = Self::reduce(sink, x);
		let y = Self::reduce(sink, y);
		let z = Self::reduce(sink, z);
		lowering::assert_multiply(sink, x, y, z)
	}

	fn range_check(&self, sink: &mut dyn GateSink, x: &Var, bits: usize) -> Result<(), BackendError> {
		let reduced = Self::reduce(sink, x);
		let var = lowering::materialize(sink, reduced, "range_check")?;
		lowering::range_check(sink, var, bits)
	}

	fn permutation_argument(&self, rows: &[[Option<VarIndex>; PERMUTS]]) -> Vec<[Wire; PERMUTS]> {
		let mut occurrences: HashMap<VarIndex, Vec<Wire>> = HashMap::new();
		for (row, cells) in rows.iter().enumerate() {
			for (col, var) in cells.iter().enumerate() {
				if let Some(var) = var {
					occurrences.entry(*var).or_default().push(Wire::new(row, col));
				}
			}
		}

		let mut wiring: Vec<[Wire; PERMUTS]> = (0..rows.len()).map(Wire::identity_row).collect();
		for cycle in occurrences.values() {
			for (i, wire) in cycle.iter().enumerate() {
				wiring[wire.row][wire.col] = cycle[(i + 1) % cycle.len()];
			}
		}
		wiring
	}

	fn compile(&self, cs: &ConstraintSystem) -> Result<VerificationKey, BackendError> {
		cs.validate()?;
		let domain = domain_size(cs.rows());
		let columns = KeyColumn::all();

		let mut table: Vec<Vec<Fp>> = vec![Vec::with_capacity(cs.rows()); columns.len()];
		for gate in cs.gates() {
			for (cells, column) in table.iter_mut().zip(&columns) {
				cells.push(column.value(gate));
			}
		}
		let commitments = columns
			.iter()
			.zip(&table)
			.map(|(column, cells)| commit_column(&column.label(), cells, domain))
			.collect::<Result<Vec<_>, _>>()?;

		let key = VerificationKey::assemble(cs, commitments)?;
		tracing::debug!(backend = %self.kind(), rows = cs.rows(), hash = %key.hash, "derived verification key");
		Ok(key)
	}

	fn prove(
		&self,
		cs: &ConstraintSystem,
		witness: &Witness,
		key: &VerificationKey,
	) -> Result<Proof, BackendError> {
		proof::check_statement(cs, witness, key)?;
		let commitments = (0..COLUMNS)
			.map(|col| commit_column(&witness_label(col), &witness.column(col), key.domain_size))
			.collect::<Result<Vec<_>, _>>()?;
		proof::assemble(key, witness, commitments)
	}

	fn verify(
		&self,
		proof: &Proof,
		key: &VerificationKey,
		public_input: &[Fp],
	) -> Result<bool, BackendError> {
		proof::check_proof(proof, key, public_input)
	}
}
