// Copyright 2025 Irreducible Inc.
//! The explicit context that carries the active backend and the open mode blocks.

use std::{
	cell::RefCell,
	collections::HashMap,
	fmt,
	sync::Arc,
};

use duet_backend::{
	Backend, BackendConfig, BackendKind, Proof, VerificationKey, instantiate,
};
use duet_core::{ConstraintSystem, ContentHash, Fp, Witness};
use duet_utils::env::parse_env_var;

use crate::{
	builder::CircuitBuilder,
	dump::Composition,
	error::{Error, Operation},
	run::Finished,
	stat::CircuitStat,
};

/// Environment variable selecting the initial engine.
pub const BACKEND_ENV: &str = "DUET_BACKEND";

/// How a block of program code is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
	/// Every value is a constant. Nothing is recorded.
	Evaluate,
	/// Every variable gets a concrete value and every assertion is checked against it.
	WitnessAndCheck,
	/// The constraint system is recorded without running witness closures.
	Analyze,
	/// Like [`Mode::Analyze`], followed by key derivation.
	Compile,
}

impl Mode {
	/// Whether variables carry concrete values in this mode.
	pub fn has_values(self) -> bool {
		matches!(self, Mode::Evaluate | Mode::WitnessAndCheck)
	}
}

impl fmt::Display for Mode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Mode::Evaluate => "evaluate",
			Mode::WitnessAndCheck => "witness",
			Mode::Analyze => "analyze",
			Mode::Compile => "compile",
		})
	}
}

/// Options for creating a [`Context`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
	/// The initial engine.
	pub backend: BackendKind,
	/// Engine configuration.
	pub backend_config: BackendConfig,
}

impl Options {
	/// Reads `DUET_BACKEND` and `DUET_WORKER_THREADS`.
	pub fn from_env() -> Result<Self, Error> {
		let backend = parse_env_var::<BackendKind>(BACKEND_ENV)
			.map_err(|raw| {
				Error::Setup(duet_backend::BackendError::Config(format!(
					"{BACKEND_ENV}={raw:?} is not one of \"default\", \"alternate\""
				)))
			})?
			.unwrap_or_default();
		let backend_config = BackendConfig::from_env().map_err(Error::Setup)?;
		Ok(Self {
			backend,
			backend_config,
		})
	}
}

/// Whether compiled keys are looked up in and stored to the context's key cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
	/// Look up and store.
	#[default]
	ReadWrite,
	/// Look up only.
	ReadOnly,
	/// Neither.
	Disabled,
}

/// Options of [`Context::compile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
	/// Program name, used in logs and error reports.
	pub name: String,
	/// Key cache policy.
	pub cache: CachePolicy,
	/// Derive the key even if the cache holds one.
	pub force_recompile: bool,
	/// Derive a key at all. Without one, the program can be analyzed but not proved.
	pub proofs_enabled: bool,
}

impl CompileOptions {
	/// Default options for a program called `name`.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			cache: CachePolicy::default(),
			force_recompile: false,
			proofs_enabled: true,
		}
	}
}

/// Result of [`Context::compile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledProgram {
	/// Program name.
	pub name: String,
	/// The engine that compiled the program.
	pub backend: BackendKind,
	/// The recorded constraint system.
	pub constraint_system: ConstraintSystem,
	/// The verification key, unless proofs are disabled.
	pub verification_key: Option<VerificationKey>,
	/// Whether the key was taken from the cache.
	pub from_cache: bool,
}

/// Result of [`Context::generate_witness`].
#[derive(Debug, Clone)]
pub struct WitnessRun<T> {
	/// What the program returned.
	pub output: T,
	/// The recorded constraint system.
	pub constraint_system: ConstraintSystem,
	/// The satisfying assignment.
	pub witness: Witness,
}

/// Carries the active backend and the stack of open mode blocks.
///
/// A context is confined to one thread; isolated programs run concurrently in separate contexts.
pub struct Context {
	options: Options,
	backend: RefCell<Arc<dyn Backend>>,
	modes: RefCell<Vec<Mode>>,
	keys: RefCell<HashMap<(BackendKind, ContentHash), VerificationKey>>,
}

/// Pops the mode stack when a block ends, including on early return.
struct ModeGuard<'a> {
	modes: &'a RefCell<Vec<Mode>>,
}

impl Drop for ModeGuard<'_> {
	fn drop(&mut self) {
		self.modes.borrow_mut().pop();
	}
}

impl Context {
	/// Creates a context configured from the environment.
	pub fn new() -> Result<Self, Error> {
		Self::with_options(Options::from_env()?)
	}

	/// Creates a context.
	pub fn with_options(options: Options) -> Result<Self, Error> {
		let backend = instantiate(options.backend, &options.backend_config).map_err(Error::Setup)?;
		Ok(Self {
			options,
			backend: RefCell::new(backend),
			modes: RefCell::new(Vec::new()),
			keys: RefCell::new(HashMap::new()),
		})
	}

	/// Creates a context running the given engine with default configuration.
	pub fn with_backend(kind: BackendKind) -> Result<Self, Error> {
		Self::with_options(Options {
			backend: kind,
			..Options::default()
		})
	}

	/// The active engine.
	pub fn backend(&self) -> Arc<dyn Backend> {
		self.backend.borrow().clone()
	}

	/// Kind of the active engine.
	pub fn backend_kind(&self) -> BackendKind {
		self.backend.borrow().kind()
	}

	/// The innermost open mode block, if any.
	pub fn open_mode(&self) -> Option<Mode> {
		self.modes.borrow().last().copied()
	}

	/// Replaces the active engine. Fails with [`Error::BackendBusy`] inside a mode block.
	pub fn switch_backend(&self, kind: BackendKind) -> Result<(), Error> {
		if let Some(open) = self.open_mode() {
			return Err(Error::BackendBusy {
				requested: kind,
				open,
			});
		}
		if self.backend_kind() == kind {
			return Ok(());
		}
		let backend = instantiate(kind, &self.options.backend_config).map_err(Error::Setup)?;
		tracing::debug!(from = %self.backend_kind(), to = %kind, "switching backend");
		*self.backend.borrow_mut() = backend;
		Ok(())
	}

	fn enter(&self, mode: Mode) -> Result<ModeGuard<'_>, Error> {
		let mut modes = self.modes.borrow_mut();
		if let Some(&open) = modes.last() {
			if open != mode {
				return Err(Error::ModeConflict {
					open,
					requested: mode,
				});
			}
		}
		modes.push(mode);
		Ok(ModeGuard { modes: &self.modes })
	}

	fn run<T>(
		&self,
		mode: Mode,
		program: impl FnOnce(&CircuitBuilder) -> Result<T, Error>,
	) -> Result<(T, Finished), Error> {
		let _guard = self.enter(mode)?;
		let backend = self.backend();
		let builder = CircuitBuilder::new(mode, backend.clone());
		let output = program(&builder)?;
		let finished = builder.into_state().finish(&*backend)?;
		Ok((output, finished))
	}

	/// Runs `program` with constants only.
	pub fn evaluate<T>(
		&self,
		program: impl FnOnce(&CircuitBuilder) -> Result<T, Error>,
	) -> Result<T, Error> {
		let _guard = self.enter(Mode::Evaluate)?;
		let builder = CircuitBuilder::new(Mode::Evaluate, self.backend());
		program(&builder)
	}

	/// Runs `program` with concrete values, checking every assertion. The trace is discarded.
	pub fn run_and_check<T>(
		&self,
		program: impl FnOnce(&CircuitBuilder) -> Result<T, Error>,
	) -> Result<T, Error> {
		let _guard = self.enter(Mode::WitnessAndCheck)?;
		let builder = CircuitBuilder::new(Mode::WitnessAndCheck, self.backend());
		program(&builder)
	}

	/// Runs `program` with concrete values and keeps the witness table.
	pub fn generate_witness<T>(
		&self,
		program: impl FnOnce(&CircuitBuilder) -> Result<T, Error>,
	) -> Result<WitnessRun<T>, Error> {
		let (output, finished) = self.run(Mode::WitnessAndCheck, program)?;
		let Finished {
			constraint_system,
			witness,
		} = finished;
		Ok(WitnessRun {
			output,
			constraint_system,
			witness: witness.unwrap_or_else(|| Witness::new(Vec::new(), Vec::new())),
		})
	}

	/// Records the constraint system of `program` without values.
	pub fn constraint_system<T>(
		&self,
		program: impl FnOnce(&CircuitBuilder) -> Result<T, Error>,
	) -> Result<ConstraintSystem, Error> {
		let (_, finished) = self.run(Mode::Analyze, program)?;
		Ok(finished.constraint_system)
	}

	/// Records the constraint system of `program` and derives its verification key.
	pub fn compile<T>(
		&self,
		program: impl FnOnce(&CircuitBuilder) -> Result<T, Error>,
		options: &CompileOptions,
	) -> Result<CompiledProgram, Error> {
		let backend = self.backend();
		let _span = tracing::info_span!(
			"Compile",
			program = %options.name,
			backend = %backend.kind(),
		)
		.entered();

		let (_, finished) = self.run(Mode::Compile, program)?;
		let constraint_system = finished.constraint_system;
		if !options.proofs_enabled {
			return Ok(CompiledProgram {
				name: options.name.clone(),
				backend: backend.kind(),
				constraint_system,
				verification_key: None,
				from_cache: false,
			});
		}

		let cache_key = (backend.kind(), constraint_system.digest());
		let read = options.cache != CachePolicy::Disabled && !options.force_recompile;
		if read {
			if let Some(key) = self.keys.borrow().get(&cache_key) {
				tracing::debug!(hash = %key.hash, "verification key cache hit");
				return Ok(CompiledProgram {
					name: options.name.clone(),
					backend: backend.kind(),
					constraint_system,
					verification_key: Some(key.clone()),
					from_cache: true,
				});
			}
		}

		let key = backend
			.compile(&constraint_system)
			.map_err(|source| Error::Backend {
				program: options.name.clone(),
				operation: Operation::Compile,
				source,
			})?;
		if options.cache == CachePolicy::ReadWrite {
			self.keys.borrow_mut().insert(cache_key, key.clone());
		}
		Ok(CompiledProgram {
			name: options.name.clone(),
			backend: backend.kind(),
			constraint_system,
			verification_key: Some(key),
			from_cache: false,
		})
	}

	/// Runs `program` with concrete values and proves the resulting witness.
	pub fn prove<T>(
		&self,
		program: impl FnOnce(&CircuitBuilder) -> Result<T, Error>,
		compiled: &CompiledProgram,
	) -> Result<(T, Proof), Error> {
		let Some(key) = &compiled.verification_key else {
			return Err(Error::ProofsDisabled {
				program: compiled.name.clone(),
			});
		};
		let backend = self.backend();
		let _span = tracing::info_span!(
			"Prove",
			program = %compiled.name,
			backend = %backend.kind(),
		)
		.entered();

		let run = self.generate_witness(program)?;
		let proof = backend
			.prove(&run.constraint_system, &run.witness, key)
			.map_err(|source| Error::Backend {
				program: compiled.name.clone(),
				operation: Operation::Prove,
				source,
			})?;
		Ok((run.output, proof))
	}

	/// Checks a proof against a key and the public input.
	pub fn verify(
		&self,
		proof: &Proof,
		key: &VerificationKey,
		public_input: &[Fp],
	) -> Result<bool, Error> {
		self.backend()
			.verify(proof, key, public_input)
			.map_err(Error::Verify)
	}

	/// Breaks the gates of `program` down by subcircuit.
	pub fn composition<T>(
		&self,
		program: impl FnOnce(&CircuitBuilder) -> Result<T, Error>,
	) -> Result<Composition, Error> {
		let _guard = self.enter(Mode::Analyze)?;
		let builder = CircuitBuilder::new(Mode::Analyze, self.backend());
		program(&builder)?;
		let state = builder.into_state();
		Ok(Composition::collect(&state.namespaces, state.recorder.emissions()))
	}

	/// Statistics of the constraint system of `program`.
	pub fn stat<T>(
		&self,
		program: impl FnOnce(&CircuitBuilder) -> Result<T, Error>,
	) -> Result<CircuitStat, Error> {
		Ok(CircuitStat::collect(&self.constraint_system(program)?))
	}
}
