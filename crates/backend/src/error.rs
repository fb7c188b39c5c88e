// Copyright 2025 Irreducible Inc.

use duet_core::{ConstraintSystemError, ContentHash, Fp, consts::MAX_RANGE_CHECK_BITS};
use duet_utils::SerializationError;

#[allow(missing_docs)] // errors are self-documenting
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
	#[error("constraint reduces to the nonzero constant {constant} and can never hold")]
	Unsatisfiable { constant: Fp },
	#[error("{operation} expects non-constant operands")]
	ConstantOperand { operation: &'static str },
	#[error("range check of {bits} bits is not supported (1..={MAX_RANGE_CHECK_BITS})")]
	RangeCheckTooWide { bits: usize },
	#[error("verification key belongs to constraint system {key}, not {actual}")]
	KeyMismatch { key: ContentHash, actual: ContentHash },
	#[error("witness does not satisfy the constraint system: {0}")]
	Unsatisfied(String),
	#[error("verification key hash {recorded} does not match its contents ({computed})")]
	CorruptKey {
		recorded: ContentHash,
		computed: ContentHash,
	},
	#[error("incorrect public input length: expected {expected}, got {actual}")]
	PublicInputLength { expected: usize, actual: usize },
	#[error("invalid backend configuration: {0}")]
	Config(String),
	#[error("constraint system error: {0}")]
	ConstraintSystem(#[from] ConstraintSystemError),
	#[error("failed to build the worker pool: {0}")]
	WorkerPool(#[from] rayon::ThreadPoolBuildError),
	#[error("serialization error: {0}")]
	Serialization(#[from] SerializationError),
	#[error("malformed JSON: {0}")]
	Json(#[from] serde_json::Error),
}
