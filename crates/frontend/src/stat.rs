// Copyright 2025 Irreducible Inc.

//! Constraint system statistics.

use std::{collections::HashSet, fmt};

use duet_backend::keys::{ZK_ROWS, domain_size};
use duet_core::{ConstraintSystem, GateKind, Wire};

/// Various stats of a constraint system that affect the prover performance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitStat {
	/// Number of rows, public-input rows included.
	pub n_rows: usize,
	/// Number of public-input rows.
	pub n_public_inputs: usize,
	/// Number of generic rows, public-input rows excluded.
	pub n_generic: usize,
	/// Number of range-check rows.
	pub n_range_check: usize,
	/// Number of cells taking part in a copy constraint.
	pub n_wired_cells: usize,
	/// Number of copy cycles longer than one cell.
	///
	/// Affects the size of the permutation argument.
	pub n_copy_cycles: usize,
	/// Size of the evaluation domain (power of 2).
	///
	/// Affects performance of committing.
	pub domain_size: usize,
}

impl CircuitStat {
	/// Collects statistics from the given constraint system.
	pub fn collect(cs: &ConstraintSystem) -> Self {
		let n_public_inputs = cs.public_input_size();
		let count = |kind| cs.gates().iter().filter(|gate| gate.kind == kind).count();
		let n_range_check = count(GateKind::RangeCheck);
		let n_generic = count(GateKind::Generic) - n_public_inputs;
		let (n_wired_cells, n_copy_cycles) = traverse_wiring(cs);
		Self {
			n_rows: cs.rows(),
			n_public_inputs,
			n_generic,
			n_range_check,
			n_wired_cells,
			n_copy_cycles,
			domain_size: domain_size(cs.rows()),
		}
	}
}

impl fmt::Display for CircuitStat {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		fn fmt_num(n: usize) -> String {
			let s = n.to_string();
			let mut result = String::new();
			for (i, c) in s.chars().rev().enumerate() {
				if i > 0 && i % 3 == 0 {
					result.push(',');
				}
				result.push(c);
			}
			result.chars().rev().collect()
		}

		fn progress_bar(used: usize, total: usize) -> String {
			let filled = used * 10 / total.max(1);
			let mut bar = String::from("[");
			for i in 0..10 {
				bar.push(if i < filled { '▓' } else { '░' });
			}
			bar.push(']');
			bar
		}

		writeln!(f, "Rows")?;
		writeln!(f, "├─ Public inputs: {}", fmt_num(self.n_public_inputs))?;
		writeln!(f, "├─ Generic: {}", fmt_num(self.n_generic))?;
		writeln!(f, "└─ Range check: {}", fmt_num(self.n_range_check))?;
		writeln!(f)?;

		writeln!(f, "Domain")?;
		let used = self.n_rows + ZK_ROWS;
		writeln!(
			f,
			"├─ {} used ({:.1}% of 2^{}, {} blinding rows)",
			fmt_num(used),
			used as f64 / self.domain_size as f64 * 100.0,
			self.domain_size.trailing_zeros(),
			ZK_ROWS,
		)?;
		writeln!(
			f,
			"└─ {} spare: {}",
			progress_bar(used, self.domain_size),
			fmt_num(self.domain_size - used)
		)?;
		writeln!(f)?;

		writeln!(f, "Permutation")?;
		writeln!(f, "├─ Wired cells: {}", fmt_num(self.n_wired_cells))?;
		writeln!(f, "└─ Copy cycles: {}", fmt_num(self.n_copy_cycles))?;
		Ok(())
	}
}

/// Returns the number of cells not wired to themselves and the number of cycles they form.
fn traverse_wiring(cs: &ConstraintSystem) -> (usize, usize) {
	let next = |wire: Wire| cs.gates()[wire.row].wires[wire.col];
	let mut visited = HashSet::new();
	let mut n_wired = 0;
	let mut n_cycles = 0;
	for (row, gate) in cs.gates().iter().enumerate() {
		for (col, &target) in gate.wires.iter().enumerate() {
			let start = Wire::new(row, col);
			if target == start || visited.contains(&start) {
				continue;
			}
			n_cycles += 1;
			let mut current = start;
			loop {
				visited.insert(current);
				n_wired += 1;
				current = next(current);
				if current == start {
					break;
				}
			}
		}
	}
	(n_wired, n_cycles)
}
