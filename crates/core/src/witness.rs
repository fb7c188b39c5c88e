// Copyright 2025 Irreducible Inc.
//! The [`Witness`] table aligned with a constraint system.

use crate::{consts::COLUMNS, field::Fp};

/// Values of one row.
pub type Row = [Fp; COLUMNS];

/// Concrete values for every cell of a constraint system, plus the public input they expose.
///
/// The public input repeats column 0 of the first rows; keeping it separate makes the statement
/// explicit to the prover and verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witness {
	public_input: Vec<Fp>,
	rows: Vec<Row>,
}

impl Witness {
	/// Creates a witness table.
	pub fn new(public_input: Vec<Fp>, rows: Vec<Row>) -> Self {
		Self { public_input, rows }
	}

	/// The public input.
	pub fn public_input(&self) -> &[Fp] {
		&self.public_input
	}

	/// All rows.
	pub fn rows(&self) -> &[Row] {
		&self.rows
	}

	/// Mutable access to the rows.
	pub fn rows_mut(&mut self) -> &mut [Row] {
		&mut self.rows
	}

	/// Column `col` as a vector.
	pub fn column(&self, col: usize) -> Vec<Fp> {
		self.rows.iter().map(|row| row[col]).collect()
	}
}
