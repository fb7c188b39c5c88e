// Copyright 2025 Irreducible Inc.
//! Core datatypes shared by the program frontend and the proving backends.
//!
//! Most importantly it hosts the field element [`Fp`], the symbolic value [`Var`] and the
//! definition of a [`ConstraintSystem`].

#![warn(missing_docs)]

pub mod constraint_system;
pub mod consts;
pub mod error;
pub mod field;
pub mod hash;
pub mod var;
pub mod verify;
pub mod witness;

pub use constraint_system::*;
pub use error::ConstraintSystemError;
pub use field::Fp;
pub use hash::{ContentHash, HashWriter};
pub use var::{LinearCombination, Var, VarIndex};
pub use witness::{Row, Witness};
