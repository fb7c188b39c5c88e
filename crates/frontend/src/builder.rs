// Copyright 2025 Irreducible Inc.
use std::{
	cell::{Ref, RefCell, RefMut},
	panic::Location,
	rc::Rc,
	sync::Arc,
};

use duet_backend::{Backend, BackendError, BackendKind};
use duet_core::{ContentHash, Fp, Var};

use crate::{
	context::Mode,
	error::{AssertionFailure, Error},
	namespace::Namespace,
	run::{RunState, Values},
};

/// Handle through which a program describes its computation.
///
/// A builder is handed to the program by one of the [`Context`] entry points and behaves
/// according to the entry point's [`Mode`]:
///
/// * **Evaluate**: witness closures run and every value is a constant. Nothing is recorded.
/// * **WitnessAndCheck**: witness closures run, every variable gets a concrete value and every
///   assertion is checked against the values before it is recorded. Each emitted row is re-checked
///   as well, so a failing gadget is reported where it fails.
/// * **Analyze** and **Compile**: witness closures do not run and assertions are recorded
///   unconditionally.
///
/// Linear operations on [`Var`] (`+`, `-`, scaling) never touch the builder. Everything that
/// needs a gate goes through the builder, which hands it to the active backend.
///
/// The builder uses reference-counted sharing internally. [`Self::subcircuit`] returns a builder
/// referencing the same run with a nested namespace, which prefixes the names of assertions.
///
/// Witness closures receive read-only [`Values`] and must not call back into the builder.
///
/// [`Context`]: crate::Context
#[derive(Clone)]
pub struct CircuitBuilder {
	/// Current namespace at which this builder is positioned.
	current_path: Namespace,
	shared: Rc<RefCell<Option<RunState>>>,
	backend: Arc<dyn Backend>,
	mode: Mode,
}

impl CircuitBuilder {
	pub(crate) fn new(mode: Mode, backend: Arc<dyn Backend>) -> Self {
		let state = RunState::new(mode);
		CircuitBuilder {
			current_path: state.namespaces.root(),
			shared: Rc::new(RefCell::new(Some(state))),
			backend,
			mode,
		}
	}

	/// Takes the run state out of the builder.
	///
	/// # Preconditions
	///
	/// Must be called only once per run.
	pub(crate) fn into_state(self) -> RunState {
		let Some(state) = self.shared.borrow_mut().take() else {
			panic!("CircuitBuilder::into_state called twice");
		};
		state
	}

	fn state(&self) -> Ref<'_, RunState> {
		Ref::map(self.shared.borrow(), |state| {
			state.as_ref().expect("the run has already finished")
		})
	}

	fn state_mut(&self) -> RefMut<'_, RunState> {
		RefMut::map(self.shared.borrow_mut(), |state| {
			state.as_mut().expect("the run has already finished")
		})
	}

	/// The mode of the run.
	pub fn mode(&self) -> Mode {
		self.mode
	}

	/// The engine lowering this run.
	pub fn backend_kind(&self) -> BackendKind {
		self.backend.kind()
	}

	/// Returns a builder for the same run whose assertions are named under `name`.
	pub fn subcircuit(&self, name: impl Into<String>) -> CircuitBuilder {
		let nested_path = self
			.state_mut()
			.namespaces
			.extend(self.current_path, name);
		CircuitBuilder {
			current_path: nested_path,
			..self.clone()
		}
	}

	/// Dotted path of this builder's namespace.
	pub fn path(&self) -> String {
		self.state().namespaces.path(self.current_path)
	}

	fn path_of(&self, name: &str) -> String {
		self.state().namespaces.child_path(self.current_path, name)
	}

	/// Introduces a private value computed by `compute`.
	///
	/// In evaluate mode the result is a constant. In analyze and compile modes `compute` is not
	/// run and the variable has no value.
	pub fn witness(&self, compute: impl FnOnce(&Values<'_>) -> Fp) -> Var {
		let [var] = self.witness_array(|values| [compute(values)]);
		var
	}

	/// Introduces `N` private values computed together.
	pub fn witness_array<const N: usize>(
		&self,
		compute: impl FnOnce(&Values<'_>) -> [Fp; N],
	) -> [Var; N] {
		if !self.mode.has_values() {
			let mut state = self.state_mut();
			return std::array::from_fn(|_| Var::Reference(state.alloc(None)));
		}
		let values = compute(&self.state().values());
		if self.mode == Mode::Evaluate {
			return values.map(Var::Constant);
		}
		let mut state = self.state_mut();
		values.map(|value| Var::Reference(state.alloc(Some(value))))
	}

	/// Introduces a public input. Public inputs occupy the first rows of the constraint system
	/// in declaration order.
	pub fn public_input(&self, compute: impl FnOnce(&Values<'_>) -> Fp) -> Var {
		let value = self
			.mode
			.has_values()
			.then(|| compute(&self.state().values()));
		if self.mode == Mode::Evaluate {
			return Var::Constant(value.unwrap_or(Fp::ZERO));
		}
		Var::Reference(self.state_mut().alloc_public(value))
	}

	/// The value of `x` if it is known in this mode.
	pub fn read(&self, x: &Var) -> Option<Fp> {
		self.state().evaluate(x)
	}

	/// Number of rows recorded so far, not counting public-input rows.
	pub fn rows(&self) -> usize {
		self.state().recorder.rows()
	}

	/// Number of variables in the trace.
	pub fn n_vars(&self) -> usize {
		self.state().n_vars()
	}

	/// Digest of the constraint system recorded so far.
	pub fn digest(&self) -> Result<ContentHash, Error> {
		Ok(self.state().constraint_system(&*self.backend)?.digest())
	}

	/// Human-readable dump of the constraint system recorded so far.
	pub fn print(&self) -> Result<String, Error> {
		Ok(self.state().constraint_system(&*self.backend)?.print())
	}

	fn failure(
		&self,
		name: &str,
		location: &'static Location<'static>,
		row: usize,
		message: String,
	) -> Error {
		Error::AssertionFailed(Box::new(AssertionFailure {
			path: self.path_of(name),
			location,
			row,
			message,
		}))
	}

	/// Hands an operation to the backend, crediting emitted gates to this namespace. In
	/// witness-checking runs every emitted item is verified right away.
	fn lower<T>(
		&self,
		name: &str,
		location: &'static Location<'static>,
		op: impl FnOnce(&dyn Backend, &mut RunState) -> Result<T, BackendError>,
	) -> Result<T, Error> {
		let result = {
			let mut state = self.state_mut();
			state.origin = self.current_path;
			op(&*self.backend, &mut *state)
		};
		let result = result.map_err(|source| Error::Lowering {
			path: self.path_of(name),
			source,
		})?;
		if self.mode == Mode::WitnessAndCheck {
			let checked = self.state_mut().check_emitted();
			if let Err((row, message)) = checked {
				return Err(self.failure(name, location, row, message));
			}
		}
		Ok(result)
	}

	/// Rejects variables allocated by another run, such as one carried out of a nested block.
	fn check_owned(&self, name: &str, vars: &[&Var]) -> Result<(), Error> {
		let foreign = {
			let state = self.state();
			vars.iter().find_map(|x| state.foreign_reference(x))
		};
		match foreign {
			Some(var) => Err(Error::ForeignVariable {
				path: self.path_of(name),
				var,
			}),
			None => Ok(()),
		}
	}

	fn next_row(&self) -> usize {
		self.state().next_row()
	}

	/// Multiplication.
	///
	/// Constant operands scale the other operand. Otherwise the product is a fresh variable.
	///
	/// # Cost
	///
	/// One half gate unless an operand is constant.
	#[track_caller]
	pub fn mul(&self, x: &Var, y: &Var) -> Result<Var, Error> {
		self.check_owned("mul", &[x, y])?;
		if let Some(c) = x.to_constant() {
			return Ok(y.scale(c));
		}
		if let Some(c) = y.to_constant() {
			return Ok(x.scale(c));
		}
		let z = self.lower("mul", Location::caller(), |backend, sink| {
			backend.multiply(sink, x, y)
		})?;
		Ok(Var::Reference(z))
	}

	/// `x²`.
	#[track_caller]
	pub fn square(&self, x: &Var) -> Result<Var, Error> {
		self.mul(x, x)
	}

	/// Multiplicative inverse. Fails with [`Error::DivisionByZero`] for a zero constant or a
	/// known zero value.
	///
	/// # Cost
	///
	/// One half gate.
	#[track_caller]
	pub fn invert(&self, x: &Var) -> Result<Var, Error> {
		let location = Location::caller();
		self.check_owned("invert", &[x])?;
		if let Some(c) = x.to_constant() {
			return c.inverse().map(Var::Constant).ok_or_else(|| Error::DivisionByZero {
				path: self.path_of("invert"),
			});
		}
		if self.read(x) == Some(Fp::ZERO) {
			return Err(Error::DivisionByZero {
				path: self.path_of("invert"),
			});
		}
		let inv = self.witness(|values| values.get(x).inverse().unwrap_or(Fp::ZERO));
		self.assert_mul_at("invert", location, x, &inv, &Var::one())?;
		Ok(inv)
	}

	/// `x / y`, witnessing the quotient `z` and constraining `y·z = x`.
	///
	/// # Cost
	///
	/// One half gate unless `y` is constant.
	#[track_caller]
	pub fn div(&self, x: &Var, y: &Var) -> Result<Var, Error> {
		let location = Location::caller();
		self.check_owned("div", &[x, y])?;
		let division_by_zero = || Error::DivisionByZero {
			path: self.path_of("div"),
		};
		if let Some(c) = y.to_constant() {
			let inv = c.inverse().ok_or_else(division_by_zero)?;
			return Ok(x.scale(inv));
		}
		if self.read(y) == Some(Fp::ZERO) {
			return Err(division_by_zero());
		}
		let z = self.witness(|values| {
			values.get(x) * values.get(y).inverse().unwrap_or(Fp::ZERO)
		});
		self.assert_mul_at("div", location, y, &z, x)?;
		Ok(z)
	}

	/// Materializes a linear combination as a plain variable. Constants and variables are
	/// returned unchanged.
	#[track_caller]
	pub fn seal(&self, x: &Var) -> Result<Var, Error> {
		self.check_owned("seal", &[x])?;
		match x {
			Var::LinearCombination(_) => self.lower("seal", Location::caller(), |backend, sink| {
				backend.reduce_to_var(sink, x)
			}),
			_ => Ok(x.clone()),
		}
	}

	/// Equality assertion.
	///
	/// Two constants are compared immediately and fail with [`Error::ConstantMismatch`]. In
	/// witness-checking runs the values are compared before anything is recorded.
	///
	/// # Cost
	///
	/// One half gate for up to three distinct variables in `a - b`.
	#[track_caller]
	pub fn assert_eq(&self, name: impl Into<String>, a: &Var, b: &Var) -> Result<(), Error> {
		self.assert_eq_at(&name.into(), Location::caller(), a, b)
	}

	fn assert_eq_at(
		&self,
		name: &str,
		location: &'static Location<'static>,
		a: &Var,
		b: &Var,
	) -> Result<(), Error> {
		self.check_owned(name, &[a, b])?;
		if let (Some(left), Some(right)) = (a.to_constant(), b.to_constant()) {
			if left != right {
				return Err(Error::ConstantMismatch {
					path: self.path_of(name),
					left,
					right,
				});
			}
			return Ok(());
		}
		if self.mode == Mode::WitnessAndCheck {
			if let (Some(left), Some(right)) = (self.read(a), self.read(b)) {
				if left != right {
					let message = format!(
						"expected {} == {}",
						left.to_signed_string(),
						right.to_signed_string()
					);
					return Err(self.failure(name, location, self.next_row(), message));
				}
			}
		}
		self.lower(name, location, |backend, sink| backend.assert_zero(sink, &(a - b)))
	}

	/// Asserts `x = 0`.
	#[track_caller]
	pub fn assert_zero(&self, name: impl Into<String>, x: &Var) -> Result<(), Error> {
		self.assert_eq_at(&name.into(), Location::caller(), x, &Var::zero())
	}

	/// Asserts `x·y = z`.
	///
	/// # Cost
	///
	/// One half gate.
	#[track_caller]
	pub fn assert_mul(&self, name: impl Into<String>, x: &Var, y: &Var, z: &Var) -> Result<(), Error> {
		self.assert_mul_at(&name.into(), Location::caller(), x, y, z)
	}

	fn assert_mul_at(
		&self,
		name: &str,
		location: &'static Location<'static>,
		x: &Var,
		y: &Var,
		z: &Var,
	) -> Result<(), Error> {
		self.check_owned(name, &[x, y, z])?;
		if let Some(c) = x.to_constant() {
			return self.assert_eq_at(name, location, &y.scale(c), z);
		}
		if let Some(c) = y.to_constant() {
			return self.assert_eq_at(name, location, &x.scale(c), z);
		}
		if self.mode == Mode::WitnessAndCheck {
			if let (Some(a), Some(b), Some(c)) = (self.read(x), self.read(y), self.read(z)) {
				if a * b != c {
					let message = format!(
						"expected {} * {} == {}",
						a.to_signed_string(),
						b.to_signed_string(),
						c.to_signed_string()
					);
					return Err(self.failure(name, location, self.next_row(), message));
				}
			}
		}
		self.lower(name, location, |backend, sink| backend.assert_multiply(sink, x, y, z))
	}

	/// Asserts `x² = z`.
	#[track_caller]
	pub fn assert_square(&self, name: impl Into<String>, x: &Var, z: &Var) -> Result<(), Error> {
		self.assert_mul_at(&name.into(), Location::caller(), x, x, z)
	}

	/// Asserts `x ∈ {0, 1}` as `x·x = x`.
	#[track_caller]
	pub fn assert_boolean(&self, name: impl Into<String>, x: &Var) -> Result<(), Error> {
		self.assert_mul_at(&name.into(), Location::caller(), x, x, x)
	}

	/// Asserts `0 ≤ x < 2^bits` using the backend's native range-check row.
	///
	/// A constant is checked immediately and fails with [`Error::OutOfRange`].
	///
	/// # Cost
	///
	/// One range-check row (plus a half gate if `x` is not a plain variable).
	#[track_caller]
	pub fn range_check(&self, name: impl Into<String>, x: &Var, bits: usize) -> Result<(), Error> {
		let name = name.into();
		let location = Location::caller();
		self.check_owned(&name, &[x])?;
		if let Some(value) = x.to_constant() {
			if value.bits() > bits {
				return Err(Error::OutOfRange {
					gadget: self.path_of(&name),
					bits,
					value: value.to_biguint(),
				});
			}
			return Ok(());
		}
		if self.mode == Mode::WitnessAndCheck {
			if let Some(value) = self.read(x) {
				if value.bits() > bits {
					let message = format!("{value} does not fit in {bits} bits");
					let row = self.state().public_input_rows() + self.rows();
					return Err(self.failure(&name, location, row, message));
				}
			}
		}
		self.lower(&name, location, |backend, sink| backend.range_check(sink, x, bits))
	}
}
