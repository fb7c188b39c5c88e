// Copyright 2025 Irreducible Inc.
//! Accumulates the gates a run emits and turns them into a [`ConstraintSystem`].
//!
//! Generic half gates are paired: the first half of a row is filled, the next generic half lands
//! in the second half of the same row. Range-check rows are appended as they come and do not
//! disturb a row waiting for its second half. Public-input rows are prepended when the table is
//! assembled, and the wiring is computed by the backend at that point.

use duet_backend::{Backend, GenericGate};
use duet_core::{
	ConstraintSystem, ConstraintSystemError, Fp, Gate, GateKind, VarIndex, Witness,
	consts::{COLUMNS, GENERIC_COEFFS, GENERIC_REGISTERS, GENERIC_ROW_COEFFS, PERMUTS},
	verify::{verify_generic_half, verify_range_check},
};

use crate::namespace::Namespace;

/// One gate as emitted by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
	/// A generic half gate.
	Generic(GenericGate),
	/// A range-check row.
	RangeCheck {
		/// The checked variable.
		value: VarIndex,
		/// Its limbs, least significant first.
		limbs: Vec<VarIndex>,
		/// Width of the check.
		bits: usize,
	},
}

impl Item {
	/// The kind of row the item lives in.
	pub fn kind(&self) -> GateKind {
		match self {
			Item::Generic(_) => GateKind::Generic,
			Item::RangeCheck { .. } => GateKind::RangeCheck,
		}
	}

	/// Checks the item against concrete values.
	///
	/// Items referring to variables without values are skipped.
	pub fn verify(&self, value_of: impl Fn(VarIndex) -> Option<Fp>) -> Result<(), String> {
		match self {
			Item::Generic(gate) => match gate.registers(value_of) {
				Some(registers) => verify_generic_half(&gate.coeffs, registers, Fp::ZERO),
				None => Ok(()),
			},
			Item::RangeCheck { value, limbs, bits } => {
				let mut row = [Fp::ZERO; COLUMNS];
				for (cell, var) in row.iter_mut().zip(std::iter::once(value).chain(limbs)) {
					match value_of(*var) {
						Some(value) => *cell = value,
						None => return Ok(()),
					}
				}
				verify_range_check(*bits, &row)
			}
		}
	}
}

/// An item together with where it came from and where it landed.
#[derive(Debug, Clone)]
pub struct Emission {
	/// Namespace of the operation that emitted it.
	pub origin: Namespace,
	/// Row in the table, not counting public-input rows.
	pub row: usize,
	/// The gate.
	pub item: Item,
}

struct RecordedRow {
	kind: GateKind,
	cells: [Option<VarIndex>; COLUMNS],
	coeffs: Vec<Fp>,
}

/// The gate table of one run.
#[derive(Default)]
pub struct Recorder {
	rows: Vec<RecordedRow>,
	half_filled: Option<usize>,
	emissions: Vec<Emission>,
}

impl Recorder {
	/// Records an item and returns the row it was placed in.
	pub fn emit(&mut self, item: Item, origin: Namespace) -> usize {
		let row = match &item {
			Item::Generic(gate) => self.place_generic(gate),
			Item::RangeCheck { value, limbs, bits } => {
				let mut cells = [None; COLUMNS];
				cells[0] = Some(*value);
				for (cell, limb) in cells[1..].iter_mut().zip(limbs) {
					*cell = Some(*limb);
				}
				self.rows.push(RecordedRow {
					kind: GateKind::RangeCheck,
					cells,
					coeffs: vec![Fp::from_u64(*bits as u64)],
				});
				self.rows.len() - 1
			}
		};
		self.emissions.push(Emission { origin, row, item });
		row
	}

	fn place_generic(&mut self, gate: &GenericGate) -> usize {
		if let Some(row) = self.half_filled.take() {
			let recorded = &mut self.rows[row];
			recorded.cells[GENERIC_REGISTERS..2 * GENERIC_REGISTERS].copy_from_slice(&gate.vars);
			recorded.coeffs[GENERIC_COEFFS..].copy_from_slice(&gate.coeffs);
			return row;
		}
		let mut cells = [None; COLUMNS];
		cells[..GENERIC_REGISTERS].copy_from_slice(&gate.vars);
		let mut coeffs = vec![Fp::ZERO; GENERIC_ROW_COEFFS];
		coeffs[..GENERIC_COEFFS].copy_from_slice(&gate.coeffs);
		self.rows.push(RecordedRow {
			kind: GateKind::Generic,
			cells,
			coeffs,
		});
		self.half_filled = Some(self.rows.len() - 1);
		self.rows.len() - 1
	}

	/// Number of rows, not counting public-input rows.
	pub fn rows(&self) -> usize {
		self.rows.len()
	}

	/// The row the next generic half gate would land in.
	pub fn next_generic_row(&self) -> usize {
		self.half_filled.unwrap_or(self.rows.len())
	}

	/// Every emitted item in order.
	pub fn emissions(&self) -> &[Emission] {
		&self.emissions
	}

	/// Assembles the constraint system: public-input rows first, then the recorded rows, wired by
	/// `backend`.
	pub fn constraint_system(
		&self,
		public_inputs: &[VarIndex],
		backend: &dyn Backend,
	) -> Result<ConstraintSystem, ConstraintSystemError> {
		let cells: Vec<[Option<VarIndex>; COLUMNS]> = self.all_cells(public_inputs).collect();
		let permuted: Vec<[Option<VarIndex>; PERMUTS]> = cells
			.iter()
			.map(|cells| std::array::from_fn(|col| cells[col]))
			.collect();
		let wiring = backend.permutation_argument(&permuted);

		let gates = self
			.all_rows(public_inputs)
			.zip(wiring)
			.map(|((kind, coeffs), wires)| Gate {
				kind,
				wires,
				coeffs,
			})
			.collect();
		let cs = ConstraintSystem::new(public_inputs.len(), gates);
		cs.validate()?;
		Ok(cs)
	}

	/// Fills the table with values. Cells whose variable has no value hold zero.
	pub fn witness(
		&self,
		public_inputs: &[VarIndex],
		value_of: impl Fn(VarIndex) -> Option<Fp>,
	) -> Witness {
		let value = |var: Option<VarIndex>| var.and_then(&value_of).unwrap_or(Fp::ZERO);
		let public_input = public_inputs.iter().map(|&var| value(Some(var))).collect();
		let rows = self
			.all_cells(public_inputs)
			.map(|cells| cells.map(value))
			.collect();
		Witness::new(public_input, rows)
	}

	fn all_cells<'a>(
		&'a self,
		public_inputs: &'a [VarIndex],
	) -> impl Iterator<Item = [Option<VarIndex>; COLUMNS]> + 'a {
		let public_rows = public_inputs.iter().map(|&var| {
			let mut cells = [None; COLUMNS];
			cells[0] = Some(var);
			cells
		});
		public_rows.chain(self.rows.iter().map(|row| row.cells))
	}

	fn all_rows<'a>(
		&'a self,
		public_inputs: &'a [VarIndex],
	) -> impl Iterator<Item = (GateKind, Vec<Fp>)> + 'a {
		let public_rows = public_inputs.iter().map(|_| {
			let mut coeffs = vec![Fp::ZERO; GENERIC_ROW_COEFFS];
			coeffs[0] = Fp::ONE;
			(GateKind::Generic, coeffs)
		});
		public_rows.chain(self.rows.iter().map(|row| (row.kind, row.coeffs.clone())))
	}
}

#[cfg(test)]
mod tests {
	use cranelift_entity::EntityRef;
	use duet_backend::ReferenceEngine;

	use super::*;
	use crate::namespace::NamespaceTree;

	fn v(i: usize) -> VarIndex {
		VarIndex::new(i)
	}

	#[test]
	fn test_half_gates_share_rows() {
		let root = NamespaceTree::new().root();
		let mut recorder = Recorder::default();
		let half = |a: usize| Item::Generic(GenericGate::new().left(Fp::ONE, v(a)));

		assert_eq!(recorder.emit(half(0), root), 0);
		let range = Item::RangeCheck {
			value: v(0),
			limbs: vec![v(1)],
			bits: 8,
		};
		assert_eq!(recorder.emit(range, root), 1);
		// The second half still lands in row 0.
		assert_eq!(recorder.emit(half(2), root), 0);
		assert_eq!(recorder.emit(half(3), root), 2);
		assert_eq!(recorder.rows(), 3);
		assert_eq!(recorder.next_generic_row(), 2);

		let cs = recorder.constraint_system(&[v(2)], &ReferenceEngine::new()).unwrap();
		assert_eq!(cs.rows(), 4);
		assert_eq!(cs.public_input_size(), 1);
		assert_eq!(cs.gates()[1].coeffs[0], Fp::ONE);
		assert_eq!(cs.gates()[1].coeffs[5], Fp::ONE);
		// The public input and the right half of row 1 hold the same variable.
		assert_eq!(cs.gates()[0].wires[0], duet_core::Wire::new(1, 3));
		assert_eq!(cs.gates()[1].wires[3], duet_core::Wire::new(0, 0));
	}
}
