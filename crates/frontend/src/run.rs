// Copyright 2025 Irreducible Inc.
//! State owned by a single mode invocation: the witness trace and the recorder.

use cranelift_entity::PrimaryMap;
use duet_backend::{Backend, GateSink, GenericGate};
use duet_core::{ConstraintSystem, Fp, Var, VarIndex, Witness};

use crate::{
	context::Mode,
	error::Error,
	namespace::{Namespace, NamespaceTree},
	recorder::{Item, Recorder},
};

fn value_of(trace: &PrimaryMap<VarIndex, Option<Fp>>, var: VarIndex) -> Option<Fp> {
	trace.get(var).copied().flatten()
}

/// Read access to concrete values, handed to witness closures.
pub struct Values<'a> {
	trace: &'a PrimaryMap<VarIndex, Option<Fp>>,
}

impl Values<'_> {
	/// The value of `x`.
	///
	/// # Panics
	///
	/// Panics if `x` refers to a variable without a value. Witness closures only run in modes
	/// where every variable has one.
	pub fn get(&self, x: &Var) -> Fp {
		self.try_get(x)
			.expect("witness closures only run when every variable has a value")
	}

	/// The value of `x`, if known.
	pub fn try_get(&self, x: &Var) -> Option<Fp> {
		x.evaluate(|var| value_of(self.trace, var))
	}

	/// Values of a slice of variables.
	pub fn get_all(&self, xs: &[Var]) -> Vec<Fp> {
		xs.iter().map(|x| self.get(x)).collect()
	}
}

/// The mutable state of one run.
pub(crate) struct RunState {
	pub(crate) mode: Mode,
	trace: PrimaryMap<VarIndex, Option<Fp>>,
	public_inputs: Vec<VarIndex>,
	pub(crate) namespaces: NamespaceTree,
	/// Namespace credited with the gates emitted next.
	pub(crate) origin: Namespace,
	pub(crate) recorder: Recorder,
	checked: usize,
}

/// The outcome of a finished run.
pub(crate) struct Finished {
	pub(crate) constraint_system: ConstraintSystem,
	pub(crate) witness: Option<Witness>,
}

impl RunState {
	pub(crate) fn new(mode: Mode) -> Self {
		let namespaces = NamespaceTree::new();
		let origin = namespaces.root();
		Self {
			mode,
			trace: PrimaryMap::new(),
			public_inputs: Vec::new(),
			namespaces,
			origin,
			recorder: Recorder::default(),
			checked: 0,
		}
	}

	pub(crate) fn values(&self) -> Values<'_> {
		Values { trace: &self.trace }
	}

	pub(crate) fn evaluate(&self, x: &Var) -> Option<Fp> {
		self.values().try_get(x)
	}

	/// The first variable referenced by `x` that this run never allocated.
	pub(crate) fn foreign_reference(&self, x: &Var) -> Option<VarIndex> {
		x.references().find(|&var| self.trace.get(var).is_none())
	}

	pub(crate) fn alloc(&mut self, value: Option<Fp>) -> VarIndex {
		self.trace.push(value)
	}

	pub(crate) fn alloc_public(&mut self, value: Option<Fp>) -> VarIndex {
		let var = self.alloc(value);
		self.public_inputs.push(var);
		var
	}

	pub(crate) fn public_input_rows(&self) -> usize {
		self.public_inputs.len()
	}

	pub(crate) fn n_vars(&self) -> usize {
		self.trace.len()
	}

	/// Row of the whole table the next generic half gate would land in.
	pub(crate) fn next_row(&self) -> usize {
		self.public_inputs.len() + self.recorder.next_generic_row()
	}

	/// Verifies the items emitted since the last call against the trace.
	///
	/// On failure returns the table row of the offending item and a description.
	pub(crate) fn check_emitted(&mut self) -> Result<(), (usize, String)> {
		let emissions = &self.recorder.emissions()[self.checked..];
		self.checked += emissions.len();
		for emission in emissions {
			emission
				.item
				.verify(|var| value_of(&self.trace, var))
				.map_err(|message| (self.public_inputs.len() + emission.row, message))?;
		}
		Ok(())
	}

	pub(crate) fn constraint_system(&self, backend: &dyn Backend) -> Result<ConstraintSystem, Error> {
		Ok(self
			.recorder
			.constraint_system(&self.public_inputs, backend)?)
	}

	pub(crate) fn finish(self, backend: &dyn Backend) -> Result<Finished, Error> {
		let constraint_system = self.constraint_system(backend)?;
		let witness = (self.mode == Mode::WitnessAndCheck)
			.then(|| self.recorder.witness(&self.public_inputs, |var| value_of(&self.trace, var)));
		tracing::debug!(
			mode = %self.mode,
			rows = constraint_system.rows(),
			public_inputs = constraint_system.public_input_size(),
			digest = %constraint_system.digest(),
			"finished run"
		);
		Ok(Finished {
			constraint_system,
			witness,
		})
	}
}

impl GateSink for RunState {
	fn fresh(&mut self, value: Option<Fp>) -> VarIndex {
		self.alloc(value)
	}

	fn value(&self, var: VarIndex) -> Option<Fp> {
		value_of(&self.trace, var)
	}

	fn emit_generic(&mut self, gate: GenericGate) {
		self.recorder.emit(Item::Generic(gate), self.origin);
	}

	fn emit_range_check(&mut self, value: VarIndex, limbs: &[VarIndex], bits: usize) {
		let item = Item::RangeCheck {
			value,
			limbs: limbs.to_vec(),
			bits,
		};
		self.recorder.emit(item, self.origin);
	}
}
