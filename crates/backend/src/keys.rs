// Copyright 2025 Irreducible Inc.
//! Verification keys and the column commitments they consist of.
//!
//! A key commits to every fixed column of the constraint system table: one selector column per
//! gate kind, the coefficient columns and the permutation (sigma) columns. Columns are padded with
//! zeros to the evaluation domain, which leaves room for [`ZK_ROWS`] blinding rows.

use duet_core::{
	ConstraintSystem, ContentHash, Fp, Gate, GateKind, HashWriter, Wire,
	consts::{GENERIC_ROW_COEFFS, PERMUTS},
};
use duet_utils::SerializationError;
use serde::{Deserialize, Serialize};

use crate::BackendError;

/// Rows reserved for blinding at the end of the domain.
pub const ZK_ROWS: usize = 3;

/// Size of the evaluation domain for a table of `rows` rows.
pub fn domain_size(rows: usize) -> usize {
	(rows + ZK_ROWS).next_power_of_two()
}

/// Encodes a permutation target as a field element: `col·2^32 + row`.
pub fn sigma_value(wire: Wire) -> Fp {
	Fp::from_u64(((wire.col as u64) << 32) | wire.row as u64)
}

/// A fixed column of the constraint system table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyColumn {
	/// `1` in rows holding a gate of this kind.
	Selector(GateKind),
	/// The `i`-th coefficient of every gate, zero where a gate has fewer.
	Coefficient(usize),
	/// The permutation target of column `i`.
	Sigma(usize),
}

impl KeyColumn {
	/// Every fixed column in commitment order.
	pub fn all() -> Vec<KeyColumn> {
		GateKind::ALL
			.into_iter()
			.map(KeyColumn::Selector)
			.chain((0..GENERIC_ROW_COEFFS).map(KeyColumn::Coefficient))
			.chain((0..PERMUTS).map(KeyColumn::Sigma))
			.collect()
	}

	/// The cell of this column in the row of `gate`.
	pub fn value(self, gate: &Gate) -> Fp {
		match self {
			KeyColumn::Selector(kind) => Fp::from(gate.kind == kind),
			KeyColumn::Coefficient(i) => gate.coeffs.get(i).copied().unwrap_or(Fp::ZERO),
			KeyColumn::Sigma(i) => sigma_value(gate.wires[i]),
		}
	}

	/// Domain separation label.
	pub fn label(self) -> String {
		match self {
			KeyColumn::Selector(kind) => format!("selector.{kind}"),
			KeyColumn::Coefficient(i) => format!("coefficient.{i}"),
			KeyColumn::Sigma(i) => format!("sigma.{i}"),
		}
	}
}

/// Commits to a column padded with zeros to `domain_size` cells.
pub fn commit_column(
	label: &str,
	values: &[Fp],
	domain_size: usize,
) -> Result<ContentHash, SerializationError> {
	let mut hasher = HashWriter::new("duet.column")?;
	hasher.write(&label)?;
	hasher.write(&domain_size)?;
	for value in values {
		hasher.write(value)?;
	}
	for _ in values.len()..domain_size {
		hasher.write(&Fp::ZERO)?;
	}
	Ok(hasher.finish())
}

/// Everything a verifier needs to check proofs for one constraint system.
///
/// `hash` commits to all other fields and is the equality oracle between engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationKey {
	/// Size of the evaluation domain.
	pub domain_size: usize,
	/// Number of public inputs.
	pub public_input_size: usize,
	/// Digest of the constraint system the key was derived from.
	pub constraint_system: ContentHash,
	/// Selector column commitments, one per gate kind.
	pub selector_commitments: Vec<ContentHash>,
	/// Coefficient column commitments.
	pub coefficient_commitments: Vec<ContentHash>,
	/// Permutation column commitments.
	pub sigma_commitments: Vec<ContentHash>,
	/// Content hash of the fields above.
	pub hash: ContentHash,
}

impl VerificationKey {
	/// Assembles a key from commitments listed in [`KeyColumn::all`] order.
	pub fn assemble(
		cs: &ConstraintSystem,
		commitments: Vec<ContentHash>,
	) -> Result<Self, BackendError> {
		let n_selectors = GateKind::ALL.len();
		let mut commitments = commitments.into_iter();
		let selector_commitments: Vec<_> = commitments.by_ref().take(n_selectors).collect();
		let coefficient_commitments: Vec<_> =
			commitments.by_ref().take(GENERIC_ROW_COEFFS).collect();
		let sigma_commitments: Vec<_> = commitments.collect();

		let mut key = VerificationKey {
			domain_size: domain_size(cs.rows()),
			public_input_size: cs.public_input_size(),
			constraint_system: cs.digest(),
			selector_commitments,
			coefficient_commitments,
			sigma_commitments,
			hash: ContentHash::default(),
		};
		key.hash = key.compute_hash()?;
		Ok(key)
	}

	/// Recomputes the content hash from the other fields.
	pub fn compute_hash(&self) -> Result<ContentHash, SerializationError> {
		let mut hasher = HashWriter::new("duet.verification_key")?;
		hasher.write(&self.domain_size)?;
		hasher.write(&self.public_input_size)?;
		hasher.write(&self.constraint_system)?;
		hasher.write(&self.selector_commitments)?;
		hasher.write(&self.coefficient_commitments)?;
		hasher.write(&self.sigma_commitments)?;
		Ok(hasher.finish())
	}

	/// Checks that `hash` matches the contents.
	pub fn check_integrity(&self) -> Result<(), BackendError> {
		let computed = self.compute_hash()?;
		if computed != self.hash {
			return Err(BackendError::CorruptKey {
				recorded: self.hash,
				computed,
			});
		}
		Ok(())
	}

	/// Serializes the key to JSON.
	pub fn to_json(&self) -> Result<String, BackendError> {
		Ok(serde_json::to_string_pretty(self)?)
	}

	/// Parses a key from JSON and checks its hash.
	pub fn from_json(json: &str) -> Result<Self, BackendError> {
		let key: VerificationKey = serde_json::from_str(json)?;
		key.check_integrity()?;
		Ok(key)
	}
}
