// Copyright 2025 Irreducible Inc.
//! Cross-engine parity checks.
//!
//! A program is run on both engines, each in a fresh [`Context`], and the outputs are compared:
//! the constraint system digest and row count, and when compiling, the verification key hash.

use duet_backend::{BackendConfig, BackendKind, VerificationKey};
use duet_core::{ConstraintSystem, ContentHash};

use crate::{
	builder::CircuitBuilder,
	context::{CompileOptions, CompiledProgram, Context, Options},
	error::{Error, ParityMismatch, ParityTarget},
};

fn contexts(config: &BackendConfig) -> Result<[Context; 2], Error> {
	let context = |backend| {
		Context::with_options(Options {
			backend,
			backend_config: config.clone(),
		})
	};
	Ok([context(BackendKind::ALL[0])?, context(BackendKind::ALL[1])?])
}

fn mismatch(
	program: &str,
	target: ParityTarget,
	hashes: [ContentHash; 2],
	systems: [&ConstraintSystem; 2],
) -> Error {
	let divergence = systems[0].diff(systems[1]).map(|diff| diff.to_string());
	let mismatch = ParityMismatch {
		program: program.to_string(),
		target,
		backends: BackendKind::ALL,
		hashes,
		rows: systems.map(ConstraintSystem::rows),
		divergence,
	};
	tracing::error!(%mismatch, "backend parity violated");
	Error::BackendParityMismatch(Box::new(mismatch))
}

fn compare_constraint_systems(program: &str, systems: [&ConstraintSystem; 2]) -> Result<(), Error> {
	let digests = systems.map(ConstraintSystem::digest);
	if digests[0] != digests[1] || systems[0].rows() != systems[1].rows() {
		return Err(mismatch(program, ParityTarget::ConstraintSystem, digests, systems));
	}
	Ok(())
}

fn compare_verification_keys(
	program: &str,
	keys: [&VerificationKey; 2],
	systems: [&ConstraintSystem; 2],
) -> Result<(), Error> {
	if keys[0].hash != keys[1].hash {
		return Err(mismatch(
			program,
			ParityTarget::VerificationKey,
			[keys[0].hash, keys[1].hash],
			systems,
		));
	}
	Ok(())
}

/// Records the constraint system of `program` on both engines and requires identical digests
/// and row counts. Returns the constraint system.
pub fn check_constraint_system_parity<T>(
	name: &str,
	program: impl Fn(&CircuitBuilder) -> Result<T, Error>,
	config: &BackendConfig,
) -> Result<ConstraintSystem, Error> {
	let [left, right] = contexts(config)?;
	let left = left.constraint_system(&program)?;
	let right = right.constraint_system(&program)?;
	compare_constraint_systems(name, [&left, &right])?;
	tracing::debug!(program = name, digest = %left.digest(), rows = left.rows(), "parity holds");
	Ok(left)
}

/// Compiles `program` on both engines and requires identical constraint systems and, unless
/// proofs are disabled, identical verification key hashes.
///
/// Returns both compilation results in the order of [`BackendKind::ALL`].
pub fn check_compile_parity<T>(
	program: impl Fn(&CircuitBuilder) -> Result<T, Error>,
	options: &CompileOptions,
	config: &BackendConfig,
) -> Result<[CompiledProgram; 2], Error> {
	let [left, right] = contexts(config)?;
	let left = left.compile(&program, options)?;
	let right = right.compile(&program, options)?;
	let systems = [&left.constraint_system, &right.constraint_system];
	compare_constraint_systems(&options.name, systems)?;
	if let (Some(left_key), Some(right_key)) = (&left.verification_key, &right.verification_key) {
		compare_verification_keys(&options.name, [left_key, right_key], systems)?;
	}
	Ok([left, right])
}
