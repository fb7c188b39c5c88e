// Copyright 2025 Irreducible Inc.
//! Gates, wiring and the [`ConstraintSystem`] they form.

use std::fmt::{self, Write as _};

use bytes::{Buf, BufMut};
use duet_utils::serialization::{DeserializeBytes, SerializationError, SerializeBytes};
use itertools::Itertools;

use sha2::{Digest, Sha256};

use crate::{
	consts::{GENERIC_COEFFS, GENERIC_ROW_COEFFS, MAX_RANGE_CHECK_BITS, PERMUTS},
	error::ConstraintSystemError,
	field::Fp,
	hash::ContentHash,
};

/// Kinds of gates a row can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GateKind {
	/// Two half gates `cl·l + cr·r + co·o + cm·l·r + cc = 0`.
	Generic,
	/// Limb decomposition of column 0 into 12-bit limbs.
	RangeCheck,
}

impl GateKind {
	/// Every gate kind, in serialization order.
	pub const ALL: [GateKind; 2] = [GateKind::Generic, GateKind::RangeCheck];

	/// Name used in dumps and JSON.
	pub fn name(self) -> &'static str {
		match self {
			GateKind::Generic => "Generic",
			GateKind::RangeCheck => "RangeCheck",
		}
	}

	/// Inverse of [`GateKind::name`].
	pub fn from_name(name: &str) -> Option<GateKind> {
		GateKind::ALL.into_iter().find(|kind| kind.name() == name)
	}

	/// Number of coefficients every gate of this kind carries.
	pub fn coeff_count(self) -> usize {
		match self {
			GateKind::Generic => GENERIC_ROW_COEFFS,
			GateKind::RangeCheck => 1,
		}
	}

	fn tag(self) -> u8 {
		match self {
			GateKind::Generic => 0,
			GateKind::RangeCheck => 1,
		}
	}
}

impl fmt::Display for GateKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl SerializeBytes for GateKind {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.tag().serialize(write_buf)
	}
}

impl DeserializeBytes for GateKind {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError> {
		let index = u8::deserialize(read_buf)?;
		GateKind::ALL
			.into_iter()
			.find(|kind| kind.tag() == index)
			.ok_or(SerializationError::UnknownEnumVariant {
				name: "GateKind",
				index,
			})
	}
}

/// A cell of the witness table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Wire {
	/// Row index.
	pub row: usize,
	/// Column index.
	pub col: usize,
}

impl Wire {
	/// Creates a wire pointing at `(row, col)`.
	pub fn new(row: usize, col: usize) -> Self {
		Self { row, col }
	}

	/// The identity wiring of a row.
	pub fn identity_row(row: usize) -> [Wire; PERMUTS] {
		std::array::from_fn(|col| Wire::new(row, col))
	}
}

impl SerializeBytes for Wire {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.row.serialize(&mut write_buf)?;
		self.col.serialize(write_buf)
	}
}

impl DeserializeBytes for Wire {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		let row = usize::deserialize(&mut read_buf)?;
		let col = usize::deserialize(read_buf)?;
		Ok(Wire { row, col })
	}
}

/// One row of the constraint system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gate {
	/// Gate kind.
	pub kind: GateKind,
	/// For every permuted column, the next cell in the copy cycle of the value stored here.
	pub wires: [Wire; PERMUTS],
	/// Kind-specific coefficients.
	pub coeffs: Vec<Fp>,
}

impl SerializeBytes for Gate {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.kind.serialize(&mut write_buf)?;
		for wire in &self.wires {
			wire.serialize(&mut write_buf)?;
		}
		self.coeffs.serialize(write_buf)
	}
}

impl DeserializeBytes for Gate {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		let kind = GateKind::deserialize(&mut read_buf)?;
		let mut wires = Wire::identity_row(0);
		for wire in &mut wires {
			*wire = Wire::deserialize(&mut read_buf)?;
		}
		let coeffs = Vec::<Fp>::deserialize(read_buf)?;
		Ok(Gate {
			kind,
			wires,
			coeffs,
		})
	}
}

/// The full arithmetization of a program: the gate table and its wiring.
///
/// The first `public_input_size` rows bind the public inputs. Two constraint systems are
/// equivalent iff they are equal, which is tested through [`ConstraintSystem::digest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintSystem {
	public_input_size: usize,
	gates: Vec<Gate>,
}

impl ConstraintSystem {
	/// Serialization format version.
	pub const SERIALIZATION_VERSION: u32 = 1;

	/// Creates a constraint system. No validation is performed, see [`Self::validate`].
	pub fn new(public_input_size: usize, gates: Vec<Gate>) -> Self {
		Self {
			public_input_size,
			gates,
		}
	}

	/// The gates, one per row.
	pub fn gates(&self) -> &[Gate] {
		&self.gates
	}

	/// Number of public inputs.
	pub fn public_input_size(&self) -> usize {
		self.public_input_size
	}

	/// Number of rows.
	pub fn rows(&self) -> usize {
		self.gates.len()
	}

	/// Content hash of the gate sequence.
	///
	/// Covers the format version, the public input size and, per row, the gate kind, the seven
	/// wires and the coefficients as fixed-width big-endian bytes.
	pub fn digest(&self) -> ContentHash {
		let mut hasher = Sha256::new();
		hasher.update(b"duet.constraint_system");
		hasher.update(Self::SERIALIZATION_VERSION.to_be_bytes());
		hasher.update((self.public_input_size as u64).to_be_bytes());
		hasher.update((self.gates.len() as u64).to_be_bytes());
		for gate in &self.gates {
			hasher.update([gate.kind.tag()]);
			for wire in &gate.wires {
				hasher.update((wire.row as u64).to_be_bytes());
				hasher.update((wire.col as u64).to_be_bytes());
			}
			hasher.update((gate.coeffs.len() as u64).to_be_bytes());
			for coeff in &gate.coeffs {
				hasher.update(coeff.to_bytes_be());
			}
		}
		ContentHash(hasher.finalize().into())
	}

	/// Checks the structural well-formedness of the table and its permutation.
	pub fn validate(&self) -> Result<(), ConstraintSystemError> {
		let rows = self.rows();
		if self.public_input_size > rows {
			return Err(ConstraintSystemError::PublicInputTooLarge {
				public_input_size: self.public_input_size,
				rows,
			});
		}

		let mut targeted = vec![false; rows * PERMUTS];
		for (row, gate) in self.gates.iter().enumerate() {
			let expected = gate.kind.coeff_count();
			if gate.coeffs.len() != expected {
				return Err(ConstraintSystemError::CoefficientCount {
					kind: gate.kind.name(),
					row,
					expected,
					actual: gate.coeffs.len(),
				});
			}

			if gate.kind == GateKind::RangeCheck {
				let bits = gate.coeffs[0];
				let width_ok = bits
					.to_u64()
					.is_some_and(|bits| bits >= 1 && bits as usize <= MAX_RANGE_CHECK_BITS);
				if !width_ok {
					return Err(ConstraintSystemError::RangeCheckWidth { row, bits });
				}
			}

			if row < self.public_input_size && !is_public_input_gate(gate) {
				return Err(ConstraintSystemError::MalformedPublicInputRow { row });
			}

			for (col, wire) in gate.wires.iter().enumerate() {
				if wire.row >= rows || wire.col >= PERMUTS {
					return Err(ConstraintSystemError::WireOutOfRange {
						row,
						col,
						target_row: wire.row,
						target_col: wire.col,
					});
				}
				let slot = &mut targeted[wire.row * PERMUTS + wire.col];
				if *slot {
					return Err(ConstraintSystemError::PermutationNotBijective {
						target_row: wire.row,
						target_col: wire.col,
					});
				}
				*slot = true;
			}
		}
		Ok(())
	}

	/// Human-readable dump, one line per row.
	pub fn print(&self) -> String {
		let mut out = String::new();
		let _ = writeln!(
			out,
			"constraint system: {} rows, {} public inputs, digest {}",
			self.rows(),
			self.public_input_size,
			self.digest()
		);
		for (row, gate) in self.gates.iter().enumerate() {
			let _ = writeln!(out, "{}", describe_gate(row, gate));
		}
		out
	}

	/// Locates the first difference between two constraint systems.
	pub fn diff(&self, other: &ConstraintSystem) -> Option<CsDiff> {
		if self.public_input_size != other.public_input_size {
			return Some(CsDiff::PublicInputSize {
				left: self.public_input_size,
				right: other.public_input_size,
			});
		}
		for (row, (left, right)) in self.gates.iter().zip(&other.gates).enumerate() {
			if left != right {
				return Some(CsDiff::Gate {
					row,
					left: describe_gate(row, left),
					right: describe_gate(row, right),
				});
			}
		}
		if self.rows() != other.rows() {
			return Some(CsDiff::RowCount {
				left: self.rows(),
				right: other.rows(),
			});
		}
		None
	}

	/// The structured record used for JSON exchange.
	pub fn to_record(&self) -> ConstraintSystemRecord {
		ConstraintSystemRecord {
			gates: self
				.gates
				.iter()
				.map(|gate| GateRecord {
					kind: gate.kind.name().to_string(),
					wires: gate.wires.to_vec(),
					coeffs: gate.coeffs.clone(),
				})
				.collect(),
			rows: self.rows(),
			public_input_size: self.public_input_size,
			digest: self.digest(),
		}
	}

	/// Rebuilds a constraint system from its record, checking the recorded digest.
	pub fn from_record(record: ConstraintSystemRecord) -> Result<Self, ConstraintSystemError> {
		if record.rows != record.gates.len() {
			return Err(ConstraintSystemError::Json(format!(
				"rows is {} but {} gates are present",
				record.rows,
				record.gates.len()
			)));
		}
		let gates = record
			.gates
			.into_iter()
			.map(|gate| {
				let kind = GateKind::from_name(&gate.kind)
					.ok_or_else(|| ConstraintSystemError::UnknownGateType(gate.kind.clone()))?;
				let wires: [Wire; PERMUTS] = gate.wires.try_into().map_err(|wires: Vec<Wire>| {
					ConstraintSystemError::Json(format!(
						"expected {PERMUTS} wires per gate, got {}",
						wires.len()
					))
				})?;
				Ok(Gate {
					kind,
					wires,
					coeffs: gate.coeffs,
				})
			})
			.collect::<Result<Vec<_>, ConstraintSystemError>>()?;

		let cs = ConstraintSystem::new(record.public_input_size, gates);
		let computed = cs.digest();
		if computed != record.digest {
			return Err(ConstraintSystemError::DigestMismatch {
				recorded: record.digest.to_string(),
				computed: computed.to_string(),
			});
		}
		cs.validate()?;
		Ok(cs)
	}

	/// Pretty-printed JSON.
	pub fn to_json(&self) -> Result<String, ConstraintSystemError> {
		serde_json::to_string_pretty(&self.to_record())
			.map_err(|err| ConstraintSystemError::Json(err.to_string()))
	}

	/// Parses JSON produced by [`Self::to_json`].
	pub fn from_json(json: &str) -> Result<Self, ConstraintSystemError> {
		let record: ConstraintSystemRecord =
			serde_json::from_str(json).map_err(|err| ConstraintSystemError::Json(err.to_string()))?;
		Self::from_record(record)
	}
}

fn is_public_input_gate(gate: &Gate) -> bool {
	gate.kind == GateKind::Generic
		&& gate.coeffs.first() == Some(&Fp::ONE)
		&& gate.coeffs[1..].iter().all(Fp::is_zero)
}

fn describe_gate(row: usize, gate: &Gate) -> String {
	let wires = gate
		.wires
		.iter()
		.enumerate()
		.filter(|(col, wire)| **wire != Wire::new(row, *col))
		.map(|(col, wire)| format!("{col}->({},{})", wire.row, wire.col))
		.join(" ");
	let coeffs = match gate.kind {
		GateKind::Generic if gate.coeffs.len() == GENERIC_ROW_COEFFS => {
			let (first, second) = gate.coeffs.split_at(GENERIC_COEFFS);
			format!("{} | {}", join_coeffs(first), join_coeffs(second))
		}
		_ => join_coeffs(&gate.coeffs),
	};
	format!("{row:>6}  {:<10}  [{coeffs}]  wires: {wires}", gate.kind.name())
}

fn join_coeffs(coeffs: &[Fp]) -> String {
	coeffs.iter().map(Fp::to_signed_string).join(", ")
}

impl fmt::Display for ConstraintSystem {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.print())
	}
}

/// First difference between two constraint systems, see [`ConstraintSystem::diff`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsDiff {
	/// The public input sizes differ.
	PublicInputSize {
		/// Left size.
		left: usize,
		/// Right size.
		right: usize,
	},
	/// The gates in `row` differ.
	Gate {
		/// First differing row.
		row: usize,
		/// Dump of the left gate.
		left: String,
		/// Dump of the right gate.
		right: String,
	},
	/// One table is a strict prefix of the other.
	RowCount {
		/// Left row count.
		left: usize,
		/// Right row count.
		right: usize,
	},
}

impl fmt::Display for CsDiff {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CsDiff::PublicInputSize { left, right } => {
				write!(f, "public input size differs: {left} vs {right}")
			}
			CsDiff::Gate { row, left, right } => {
				write!(f, "first divergence at row {row}:\n  left:  {left}\n  right: {right}")
			}
			CsDiff::RowCount { left, right } => write!(f, "row count differs: {left} vs {right}"),
		}
	}
}

/// JSON shape of a [`ConstraintSystem`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintSystemRecord {
	/// Gates in row order.
	pub gates: Vec<GateRecord>,
	/// Row count.
	pub rows: usize,
	/// Number of public inputs.
	pub public_input_size: usize,
	/// Hex content hash.
	pub digest: ContentHash,
}

/// JSON shape of a [`Gate`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GateRecord {
	/// Gate kind name.
	#[serde(rename = "type")]
	pub kind: String,
	/// Wiring of the permuted columns.
	pub wires: Vec<Wire>,
	/// Coefficients as fixed-width big-endian hex.
	pub coeffs: Vec<Fp>,
}

impl SerializeBytes for ConstraintSystem {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		Self::SERIALIZATION_VERSION.serialize(&mut write_buf)?;
		self.public_input_size.serialize(&mut write_buf)?;
		self.gates.serialize(write_buf)
	}
}

impl DeserializeBytes for ConstraintSystem {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		let version = u32::deserialize(&mut read_buf)?;
		if version != Self::SERIALIZATION_VERSION {
			return Err(SerializationError::InvalidConstruction {
				name: "ConstraintSystem::version",
			});
		}
		let public_input_size = usize::deserialize(&mut read_buf)?;
		let gates = Vec::<Gate>::deserialize(read_buf)?;
		let cs = ConstraintSystem::new(public_input_size, gates);
		cs.validate()
			.map_err(|_| SerializationError::InvalidConstruction {
				name: "ConstraintSystem",
			})?;
		Ok(cs)
	}
}

#[cfg(test)]
mod tests {
	use duet_utils::serialization::serialize_to_vec;

	use super::*;

	fn generic(coeffs: [i64; 10], wires: [Wire; PERMUTS]) -> Gate {
		Gate {
			kind: GateKind::Generic,
			wires,
			coeffs: coeffs.into_iter().map(Fp::from_i64).collect(),
		}
	}

	/// Row 0 binds a public input, row 1 checks `pub + w = 5`.
	fn sample() -> ConstraintSystem {
		let mut wires0 = Wire::identity_row(0);
		let mut wires1 = Wire::identity_row(1);
		wires0[0] = Wire::new(1, 0);
		wires1[0] = Wire::new(0, 0);
		ConstraintSystem::new(
			1,
			vec![
				generic([1, 0, 0, 0, 0, 0, 0, 0, 0, 0], wires0),
				generic([1, 1, 0, 0, -5, 0, 0, 0, 0, 0], wires1),
			],
		)
	}

	#[test]
	fn test_valid_sample() {
		sample().validate().unwrap();
	}

	#[test]
	fn test_digest_depends_on_coefficients() {
		let cs = sample();
		let mut other = sample();
		other.gates[1].coeffs[4] = Fp::from_i64(-6);
		assert_ne!(cs.digest(), other.digest());
		assert_eq!(cs.digest(), sample().digest());
	}

	#[test]
	fn test_byte_round_trip() {
		let cs = sample();
		let bytes = serialize_to_vec(&cs).unwrap();
		let decoded = ConstraintSystem::deserialize(bytes.as_slice()).unwrap();
		assert_eq!(decoded, cs);
	}

	#[test]
	fn test_version_mismatch() {
		let mut bytes = serialize_to_vec(&sample()).unwrap();
		bytes[3] = 99;
		let result = ConstraintSystem::deserialize(bytes.as_slice());
		match result {
			Err(SerializationError::InvalidConstruction { name }) => {
				assert_eq!(name, "ConstraintSystem::version");
			}
			_ => panic!("expected version mismatch error"),
		}
	}

	#[test]
	fn test_decoding_rejects_dangling_wire() {
		let mut cs = sample();
		cs.gates[0].wires[0] = Wire::new(99, 0);
		let bytes = serialize_to_vec(&cs).unwrap();
		match ConstraintSystem::deserialize(bytes.as_slice()) {
			Err(SerializationError::InvalidConstruction { name }) => {
				assert_eq!(name, "ConstraintSystem");
			}
			other => panic!("expected a dangling wire to be rejected, got {other:?}"),
		}
	}

	#[test]
	fn test_json_round_trip() {
		let cs = sample();
		let json = cs.to_json().unwrap();
		assert!(json.contains("\"publicInputSize\": 1"));
		assert!(json.contains("\"type\": \"Generic\""));
		assert!(json.contains(&format!("{:#x}", -Fp::from_u64(5))));
		assert_eq!(ConstraintSystem::from_json(&json).unwrap(), cs);
	}

	#[test]
	fn test_json_tampering_is_detected() {
		let cs = sample();
		let mut record = cs.to_record();
		record.gates[1].coeffs[4] = Fp::from_i64(-7);
		let json = serde_json::to_string(&record).unwrap();
		assert!(matches!(
			ConstraintSystem::from_json(&json),
			Err(ConstraintSystemError::DigestMismatch { .. })
		));
	}

	#[test]
	fn test_broken_permutation() {
		let mut cs = sample();
		cs.gates[1].wires[0] = Wire::new(1, 0);
		assert_eq!(
			cs.validate(),
			Err(ConstraintSystemError::PermutationNotBijective {
				target_row: 1,
				target_col: 0
			})
		);
	}

	#[test]
	fn test_malformed_public_input_row() {
		let mut cs = sample();
		cs.gates[0].coeffs[4] = Fp::ONE;
		assert_eq!(
			cs.validate(),
			Err(ConstraintSystemError::MalformedPublicInputRow { row: 0 })
		);
	}

	#[test]
	fn test_diff_reports_first_divergence() {
		let cs = sample();
		assert_eq!(cs.diff(&sample()), None);

		let mut other = sample();
		other.gates[1].coeffs[1] = Fp::from_u64(2);
		let diff = cs.diff(&other).unwrap();
		assert!(matches!(diff, CsDiff::Gate { row: 1, .. }));
		let text = diff.to_string();
		assert!(text.contains("row 1"), "{text}");
		assert!(text.contains("1, 1, 0, 0, -5"), "{text}");
		assert!(text.contains("1, 2, 0, 0, -5"), "{text}");

		let mut shorter = sample();
		shorter.gates.pop();
		assert_eq!(
			cs.diff(&shorter),
			Some(CsDiff::RowCount { left: 2, right: 1 })
		);
	}

	#[test]
	fn test_print() {
		let text = sample().print();
		assert!(text.starts_with("constraint system: 2 rows, 1 public inputs"));
		assert!(text.contains("Generic"));
		assert!(text.contains("0->(1,0)"));
	}
}
