// Copyright 2025 Irreducible Inc.

//! Utility modules used across the duet workspace.

pub mod env;
pub mod serialization;

pub use bytes;
pub use serialization::{DeserializeBytes, SerializationError, SerializeBytes};
