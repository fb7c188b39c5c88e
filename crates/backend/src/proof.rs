// Copyright 2025 Irreducible Inc.
//! Proofs produced by the engines.
//!
//! The engines do not implement a cryptographic argument. A proof binds the verification key,
//! the public input and commitments to the witness columns into one transcript hash, which is
//! what the interchangeability contract between engines needs.

use duet_core::{
	ConstraintSystem, ContentHash, Fp, HashWriter, Witness, consts::COLUMNS,
	verify::verify_constraints,
};
use duet_utils::SerializationError;
use serde::{Deserialize, Serialize};

use crate::{BackendError, keys::VerificationKey};

/// A proof for one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
	/// The public input the proof was made for.
	pub public_input: Vec<Fp>,
	/// Commitments to the witness columns.
	pub witness_commitments: Vec<ContentHash>,
	/// Hash binding the key, the public input and the witness commitments.
	pub transcript: ContentHash,
}

/// Label of the `col`-th witness column commitment.
pub fn witness_label(col: usize) -> String {
	format!("witness.{col}")
}

/// Computes the transcript hash of a proof.
pub fn transcript(
	key: &VerificationKey,
	public_input: &[Fp],
	witness_commitments: &[ContentHash],
) -> Result<ContentHash, SerializationError> {
	let mut hasher = HashWriter::new("duet.transcript")?;
	hasher.write(&key.hash)?;
	hasher.write(&public_input)?;
	hasher.write(&witness_commitments)?;
	Ok(hasher.finish())
}

/// Checks that `witness` is a satisfying assignment of `cs` and that `key` belongs to `cs`.
pub(crate) fn check_statement(
	cs: &ConstraintSystem,
	witness: &Witness,
	key: &VerificationKey,
) -> Result<(), BackendError> {
	key.check_integrity()?;
	let actual = cs.digest();
	if key.constraint_system != actual {
		return Err(BackendError::KeyMismatch {
			key: key.constraint_system,
			actual,
		});
	}
	if witness.public_input().len() != key.public_input_size {
		return Err(BackendError::PublicInputLength {
			expected: key.public_input_size,
			actual: witness.public_input().len(),
		});
	}
	verify_constraints(cs, witness).map_err(BackendError::Unsatisfied)
}

/// Assembles a proof from witness column commitments.
pub(crate) fn assemble(
	key: &VerificationKey,
	witness: &Witness,
	witness_commitments: Vec<ContentHash>,
) -> Result<Proof, BackendError> {
	let public_input = witness.public_input().to_vec();
	let transcript = transcript(key, &public_input, &witness_commitments)?;
	Ok(Proof {
		public_input,
		witness_commitments,
		transcript,
	})
}

/// Checks a proof against a key and the expected public input.
///
/// A corrupt key is an error. A proof that does not match is `Ok(false)`.
pub(crate) fn check_proof(
	proof: &Proof,
	key: &VerificationKey,
	public_input: &[Fp],
) -> Result<bool, BackendError> {
	key.check_integrity()?;
	if public_input.len() != key.public_input_size
		|| proof.public_input != public_input
		|| proof.witness_commitments.len() != COLUMNS
	{
		return Ok(false);
	}
	let expected = transcript(key, public_input, &proof.witness_commitments)?;
	Ok(expected == proof.transcript)
}
