// Copyright 2025 Irreducible Inc.

use std::{fmt, panic::Location};

use duet_backend::{BackendError, BackendKind};
use duet_core::{ConstraintSystemError, ContentHash, Fp, VarIndex};
use num_bigint::BigUint;

use crate::context::Mode;

/// Details of a failed assertion in a witness-checking run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure {
	/// Dotted path of the assertion, `subcircuit.….name`.
	pub path: String,
	/// Source location of the assertion call.
	pub location: &'static Location<'static>,
	/// The row the offending gate occupies (or would occupy) in the constraint system.
	pub row: usize,
	/// What was expected and which values were found.
	pub message: String,
}

impl fmt::Display for AssertionFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"assertion {} failed at {} (row {}): {}",
			self.path, self.location, self.row, self.message
		)
	}
}

/// What two engines disagreed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParityTarget {
	/// The constraint system digest or row count.
	ConstraintSystem,
	/// The verification key hash.
	VerificationKey,
}

/// Details of a divergence between two engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParityMismatch {
	/// Name of the program.
	pub program: String,
	/// What diverged.
	pub target: ParityTarget,
	/// The engines compared, in order.
	pub backends: [BackendKind; 2],
	/// Digests (or key hashes) produced by each engine.
	pub hashes: [ContentHash; 2],
	/// Row counts produced by each engine.
	pub rows: [usize; 2],
	/// The first divergence, if it could be located.
	pub divergence: Option<String>,
}

impl fmt::Display for ParityMismatch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let what = match self.target {
			ParityTarget::ConstraintSystem => "constraint system digest",
			ParityTarget::VerificationKey => "verification key hash",
		};
		write!(
			f,
			"{what} of {} differs between backends: {} = {} ({} rows), {} = {} ({} rows)",
			self.program,
			self.backends[0],
			self.hashes[0],
			self.rows[0],
			self.backends[1],
			self.hashes[1],
			self.rows[1],
		)?;
		if let Some(divergence) = &self.divergence {
			write!(f, "; first divergence: {divergence}")?;
		}
		Ok(())
	}
}

/// Backend operations that can fail on behalf of a whole program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
	/// Deriving the verification key.
	Compile,
	/// Producing a proof.
	Prove,
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Operation::Compile => "compile",
			Operation::Prove => "prove",
		})
	}
}

#[allow(missing_docs)] // errors are self-documenting
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("constant assertion {path} failed: {} != {}", .left.to_signed_string(), .right.to_signed_string())]
	ConstantMismatch { path: String, left: Fp, right: Fp },
	#[error("{0}")]
	AssertionFailed(Box<AssertionFailure>),
	#[error("{gadget}: value {value} does not fit in {bits} bits")]
	OutOfRange {
		gadget: String,
		bits: usize,
		value: BigUint,
	},
	#[error("{gadget}: input is not almost reduced: {reason}")]
	UnreducedInput { gadget: String, reason: String },
	#[error("{path}: division by zero")]
	DivisionByZero { path: String },
	#[error("{path}: variable {var} belongs to another run")]
	ForeignVariable { path: String, var: VarIndex },
	#[error("cannot switch to backend {requested} while a {open} block is open")]
	BackendBusy { requested: BackendKind, open: Mode },
	#[error("cannot enter {requested} mode while a {open} block is open")]
	ModeConflict { open: Mode, requested: Mode },
	#[error("backend parity violated: {0}")]
	BackendParityMismatch(Box<ParityMismatch>),
	#[error("proofs are disabled for program {program}")]
	ProofsDisabled { program: String },
	#[error("failed to lower {path}: {source}")]
	Lowering {
		path: String,
		#[source]
		source: BackendError,
	},
	#[error("backend failed to {operation} program {program}: {source}")]
	Backend {
		program: String,
		operation: Operation,
		#[source]
		source: BackendError,
	},
	#[error("backend setup failed: {0}")]
	Setup(#[source] BackendError),
	#[error("verification failed: {0}")]
	Verify(#[source] BackendError),
	#[error("constraint system error: {0}")]
	ConstraintSystem(#[from] ConstraintSystemError),
}

impl Error {
	/// Whether this is a witness-check failure.
	pub fn is_assertion_failure(&self) -> bool {
		matches!(self, Error::AssertionFailed(_))
	}
}
