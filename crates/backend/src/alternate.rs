// Copyright 2025 Irreducible Inc.
//! The alternate engine.
//!
//! Accumulates combinations in an ordered map, builds copy cycles by sorting occurrences and
//! computes column commitments on a rayon pool it owns. The pool lives as long as the engine.

use std::collections::BTreeMap;

use duet_core::{
	ConstraintSystem, Fp, Var, VarIndex, Wire, Witness,
	consts::{COLUMNS, PERMUTS},
};
use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};

use crate::{
	Backend, BackendError, BackendKind,
	config::BackendConfig,
	keys::{KeyColumn, VerificationKey, commit_column, domain_size},
	lowering::{self, Term},
	proof::{self, Proof, witness_label},
	sink::{GateSink, Reduced},
};

/// The multi-threaded alternate engine.
#[derive(Debug)]
pub struct AlternateEngine {
	pool: ThreadPool,
}

impl AlternateEngine {
	/// Creates the engine and its worker pool.
	pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
		let pool = ThreadPoolBuilder::new()
			.num_threads(config.worker_threads.unwrap_or(0))
			.thread_name(|i| format!("duet-alternate-{i}"))
			.build()?;
		tracing::debug!(threads = pool.current_num_threads(), "alternate engine worker pool started");
		Ok(Self { pool })
	}

	/// Number of threads in the worker pool.
	pub fn worker_threads(&self) -> usize {
		self.pool.current_num_threads()
	}

	fn normalize(x: &Var) -> (Vec<Term>, Fp) {
		let (constant, terms) = x.to_constant_and_terms();
		let mut acc: BTreeMap<VarIndex, Fp> = BTreeMap::new();
		for (coeff, var) in terms {
			*acc.entry(var).or_default() += coeff;
		}
		let terms = acc
			.into_iter()
			.filter(|(_, coeff)| !coeff.is_zero())
			.map(|(var, coeff)| (coeff, var))
			.collect();
		(terms, constant)
	}

	fn reduce(sink: &mut dyn GateSink, x: &Var) -> Reduced {
		let (terms, constant) = Self::normalize(x);
		lowering::reduce(sink, &terms, constant)
	}
}

impl Backend for AlternateEngine {
	fn kind(&self) -> BackendKind {
		BackendKind::Alternate
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
		let mut occurrences: Vec<(VarIndex, Wire)> = rows
			.iter()
			.enumerate()
			.flat_map(|(row, cells)| {
				cells
					.iter()
					.enumerate()
					.filter_map(move |(col, var)| var.map(|var| (var, Wire::new(row, col))))
			})
			.collect();
		// Wires compare row-major, so each group ends up in emission order.
		occurrences.sort_unstable();

		let mut wiring: Vec<[Wire; PERMUTS]> = (0..rows.len()).map(Wire::identity_row).collect();
		for cycle in occurrences.chunk_by(|a, b| a.0 == b.0) {
			for (i, (_, wire)) in cycle.iter().enumerate() {
				let (_, next) = cycle[(i + 1) % cycle.len()];
				wiring[wire.row][wire.col] = next;
			}
		}
		wiring
	}

	fn compile(&self, cs: &ConstraintSystem) -> Result<VerificationKey, BackendError> {
		cs.validate()?;
		let domain = domain_size(cs.rows());
		let commitments = self.pool.install(|| {
			KeyColumn::all()
				.into_par_iter()
				.map(|column| {
					let cells: Vec<Fp> = cs.gates().iter().map(|gate| column.value(gate)).collect();
					commit_column(&column.label(), &cells, domain)
				})
				.collect::<Result<Vec<_>, _>>()
		})?;

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
		let commitments = self.pool.install(|| {
			(0..COLUMNS)
				.into_par_iter()
				.map(|col| commit_column(&witness_label(col), &witness.column(col), key.domain_size))
				.collect::<Result<Vec<_>, _>>()
		})?;
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
