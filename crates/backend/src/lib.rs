// Copyright 2025 Irreducible Inc.
//! Backend capability interface and its two engines.
//!
//! The frontend lowers every non-linear operation, every assertion and every range check through
//! a [`Backend`]. Two engines implement it independently: [`ReferenceEngine`] (`"default"`) and
//! [`AlternateEngine`] (`"alternate"`). For the same program both must produce the same
//! constraint system and verification keys with the same hash, which the frontend's parity checks
//! test.
//!
//! Engines never mutate a constraint system they receive.

#![warn(missing_docs)]

pub mod alternate;
pub mod config;
mod error;
pub mod keys;
pub mod lowering;
pub mod proof;
pub mod reference;
pub mod sink;

use std::{fmt, str::FromStr, sync::Arc};

pub use alternate::AlternateEngine;
pub use config::BackendConfig;
use duet_core::{ConstraintSystem, Fp, Var, VarIndex, Wire, Witness, consts::PERMUTS};
pub use error::BackendError;
pub use keys::VerificationKey;
pub use proof::Proof;
pub use reference::ReferenceEngine;
use serde::{Deserialize, Serialize};
pub use sink::{GateSink, GenericGate, Reduced};

/// Names of the available engines.
#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
	/// The reference engine.
	#[default]
	Default,
	/// The alternate engine.
	Alternate,
}

impl BackendKind {
	/// Every engine.
	pub const ALL: [BackendKind; 2] = [BackendKind::Default, BackendKind::Alternate];

	/// The name used in configuration.
	pub fn name(self) -> &'static str {
		match self {
			BackendKind::Default => "default",
			BackendKind::Alternate => "alternate",
		}
	}

	/// The other engine.
	pub fn other(self) -> BackendKind {
		match self {
			BackendKind::Default => BackendKind::Alternate,
			BackendKind::Alternate => BackendKind::Default,
		}
	}
}

impl fmt::Display for BackendKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for BackendKind {
	type Err = BackendError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		BackendKind::ALL
			.into_iter()
			.find(|kind| kind.name() == s)
			.ok_or_else(|| BackendError::Config(format!("unknown backend {s:?}")))
	}
}

/// The capability set every engine provides.
///
/// Lowering operations receive the [`GateSink`] of the running program and append gates and
/// auxiliary variables to it. Operands are unnormalized [`Var`]s; each engine normalizes them
/// (merges like terms, drops zero coefficients, orders terms by variable) before emitting gates
/// in the shapes defined in [`lowering`].
pub trait Backend: Send + Sync + fmt::Debug {
	/// Which engine this is.
	fn kind(&self) -> BackendKind;

	/// Materializes `x` as a single variable, or as a constant if no variable remains once like
	/// terms are merged.
	fn reduce_to_var(&self, sink: &mut dyn GateSink, x: &Var) -> Result<Var, BackendError>;

	/// Constrains `x = 0`.
	fn assert_zero(&self, sink: &mut dyn GateSink, x: &Var) -> Result<(), BackendError>;

	/// Returns a fresh variable constrained to `x·y`. Both operands must be non-constant.
	fn multiply(&self, sink: &mut dyn GateSink, x: &Var, y: &Var) -> Result<VarIndex, BackendError>;

	/// Constrains `x·y = z`. `x` and `y` must be non-constant.
	fn assert_multiply(
		&self,
		sink: &mut dyn GateSink,
		x: &Var,
		y: &Var,
		z: &Var,
	) -> Result<(), BackendError>;

	/// Constrains `0 ≤ x < 2^bits` with a native range-check row.
	fn range_check(&self, sink: &mut dyn GateSink, x: &Var, bits: usize) -> Result<(), BackendError>;

	/// Computes the copy-constraint wiring of a table whose permuted cells hold the given
	/// variables: every occurrence of a variable points to its next occurrence in row-major
	/// order, the last one back to the first. Empty cells point to themselves.
	fn permutation_argument(&self, rows: &[[Option<VarIndex>; PERMUTS]]) -> Vec<[Wire; PERMUTS]>;

	/// Derives the verification key of a constraint system.
	fn compile(&self, cs: &ConstraintSystem) -> Result<VerificationKey, BackendError>;

	/// Proves that `witness` satisfies `cs`.
	fn prove(
		&self,
		cs: &ConstraintSystem,
		witness: &Witness,
		key: &VerificationKey,
	) -> Result<Proof, BackendError>;

	/// Checks a proof for `public_input`.
	fn verify(
		&self,
		proof: &Proof,
		key: &VerificationKey,
		public_input: &[Fp],
	) -> Result<bool, BackendError>;
}

/// Creates an engine.
pub fn instantiate(
	kind: BackendKind,
	config: &BackendConfig,
) -> Result<Arc<dyn Backend>, BackendError> {
	Ok(match kind {
		BackendKind::Default => Arc::new(ReferenceEngine::new()),
		BackendKind::Alternate => Arc::new(AlternateEngine::new(config)?),
	})
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case("default", BackendKind::Default)]
	#[case("alternate", BackendKind::Alternate)]
	fn test_backend_names(#[case] name: &str, #[case] kind: BackendKind) {
		assert_eq!(name.parse::<BackendKind>().unwrap(), kind);
		assert_eq!(kind.to_string(), name);
		assert_eq!(serde_json::to_string(&kind).unwrap(), format!("\"{name}\""));
	}

	#[test]
	fn test_unknown_backend() {
		assert!(matches!("native".parse::<BackendKind>(), Err(BackendError::Config(_))));
	}

	#[test]
	fn test_instantiate() {
		let config = BackendConfig::default().with_worker_threads(2);
		for kind in BackendKind::ALL {
			assert_eq!(instantiate(kind, &config).unwrap().kind(), kind);
		}
		assert_eq!(AlternateEngine::new(&config).unwrap().worker_threads(), 2);
	}
}
