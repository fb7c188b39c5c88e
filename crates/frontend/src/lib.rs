// Copyright 2025 Irreducible Inc.

//! Circuit construction frontend.
//!
//! A program is an ordinary Rust closure over a [`CircuitBuilder`]. The same closure is executed
//! in several [`Mode`]s through a [`Context`]: with constants only, with a concrete witness whose
//! every assertion is checked, or symbolically to record the constraint system and derive a
//! verification key.
//!
//! # Usage Flow
//!
//! Create a [`Context`], which carries the active backend engine. Inside the program, introduce
//! values with `witness()` and `public_input()`. Linear arithmetic works directly on [`Var`];
//! multiplication, inversion and assertions go through the builder, which lowers them through the
//! active backend.
//!
//! [`Context::compile`] records the constraint system and derives a verification key,
//! [`Context::prove`] reruns the program with values and proves the witness, and
//! [`Context::verify`] checks the proof.
//!
//! Use [`CircuitStat`] and [`Composition`] to inspect row counts and which subcircuits emitted
//! them, and the functions of [`parity`] to check that both engines agree on a program.

#![warn(missing_docs)]

mod builder;
mod context;
mod dump;
mod error;
mod namespace;
pub mod parity;
mod recorder;
mod run;
pub mod stat;

pub use builder::CircuitBuilder;
pub use context::{
	BACKEND_ENV, CachePolicy, CompileOptions, CompiledProgram, Context, Mode, Options, WitnessRun,
};
pub use dump::{Composition, GateBreakdown};
pub use duet_backend::{BackendConfig, BackendKind, Proof, VerificationKey};
pub use duet_core::{Fp, Var};
pub use error::{AssertionFailure, Error, Operation, ParityMismatch, ParityTarget};
pub use run::Values;
pub use stat::CircuitStat;
