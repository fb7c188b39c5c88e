// Copyright 2025 Irreducible Inc.
//! The Poseidon permutation over the native field and a sponge built on it.
//!
//! Width 3, rate 2, S-box `x^7`. Four full rounds are followed by 56 partial rounds, in which only
//! the first element goes through the S-box, and four more full rounds. Each round adds the round
//! constants, applies the S-box layer and multiplies by the MDS matrix.
//!
//! [`permute_native`] and [`hash_native`] compute the same functions outside a circuit.

mod constants;
#[cfg(test)]
mod tests;

use duet_core::Fp;
use duet_frontend::{CircuitBuilder, Error, Var};

use self::constants::{MDS, ROUND_CONSTANTS};

/// Number of state elements.
pub const WIDTH: usize = 3;
/// Number of state elements absorbed per permutation.
pub const RATE: usize = 2;
/// Number of full rounds, split evenly around the partial rounds.
pub const FULL_ROUNDS: usize = 8;
/// Number of partial rounds.
pub const PARTIAL_ROUNDS: usize = 56;

const ROUNDS: usize = FULL_ROUNDS + PARTIAL_ROUNDS;

/// Number of state elements going through the S-box in `round`.
fn sbox_width(round: usize) -> usize {
	let half = FULL_ROUNDS / 2;
	if round < half || round >= half + PARTIAL_ROUNDS {
		WIDTH
	} else {
		1
	}
}

/// `x^7`.
///
/// # Cost
///
/// Four half gates.
fn sbox(b: &CircuitBuilder, x: &Var) -> Result<Var, Error> {
	let x2 = b.square(x)?;
	let x4 = b.square(&x2)?;
	let x6 = b.mul(&x4, &x2)?;
	b.mul(&x6, x)
}

fn sbox_native(x: Fp) -> Fp {
	let x2 = x * x;
	let x4 = x2 * x2;
	x4 * x2 * x
}

/// Applies the permutation to `state`.
///
/// Constant inputs produce constant outputs without recording anything.
pub fn permute(b: &CircuitBuilder, state: &[Var; WIDTH]) -> Result<[Var; WIDTH], Error> {
	let b = b.subcircuit("poseidon");
	let mut state = state.clone();
	for (round, constants) in ROUND_CONSTANTS.iter().enumerate() {
		for (x, c) in state.iter_mut().zip(constants) {
			*x = &*x + *c;
		}
		for x in &mut state[..sbox_width(round)] {
			*x = sbox(&b, x)?;
		}
		let mixed: [Var; WIDTH] = std::array::from_fn(|i| {
			state
				.iter()
				.zip(&MDS[i])
				.fold(Var::zero(), |acc, (x, m)| acc + x.scale(*m))
		});
		// Sealing keeps the combinations from growing across rounds.
		for (x, y) in state.iter_mut().zip(&mixed) {
			*x = b.seal(y)?;
		}
	}
	Ok(state)
}

/// [`permute`] on concrete values.
pub fn permute_native(mut state: [Fp; WIDTH]) -> [Fp; WIDTH] {
	for (round, constants) in ROUND_CONSTANTS.iter().enumerate() {
		for (x, c) in state.iter_mut().zip(constants) {
			*x += *c;
		}
		for x in &mut state[..sbox_width(round)] {
			*x = sbox_native(*x);
		}
		state = std::array::from_fn(|i| {
			state
				.iter()
				.zip(&MDS[i])
				.fold(Fp::ZERO, |acc, (x, m)| acc + *x * *m)
		});
	}
	state
}

/// A duplex sponge over [`permute`].
///
/// Inputs are added into the rate part of the state. The state is permuted before absorbing into
/// a full rate and before every squeeze.
#[derive(Debug, Clone)]
pub struct Sponge {
	state: [Var; WIDTH],
	offset: usize,
}

impl Default for Sponge {
	fn default() -> Self {
		Self::new()
	}
}

impl Sponge {
	/// A sponge with the all-zero state.
	pub fn new() -> Self {
		Sponge {
			state: std::array::from_fn(|_| Var::zero()),
			offset: 0,
		}
	}

	/// Adds `x` into the state.
	pub fn absorb(&mut self, b: &CircuitBuilder, x: &Var) -> Result<(), Error> {
		if self.offset == RATE {
			self.state = permute(b, &self.state)?;
			self.offset = 0;
		}
		self.state[self.offset] = &self.state[self.offset] + x;
		self.offset += 1;
		Ok(())
	}

	/// Permutes the state and returns its first element.
	pub fn squeeze(&mut self, b: &CircuitBuilder) -> Result<Var, Error> {
		self.state = permute(b, &self.state)?;
		self.offset = 0;
		Ok(self.state[0].clone())
	}
}

/// Hashes `inputs` to one field element.
///
/// Inputs are added to the rate without length padding, so trailing zeros within the last block
/// do not change the digest: `hash([]) == hash([0]) == hash([0, 0])`. Callers hashing
/// variable-length data must bind the length themselves.
pub fn hash(b: &CircuitBuilder, inputs: &[Var]) -> Result<Var, Error> {
	let mut sponge = Sponge::new();
	for x in inputs {
		sponge.absorb(b, x)?;
	}
	sponge.squeeze(b)
}

/// [`hash`] on concrete values.
pub fn hash_native(inputs: &[Fp]) -> Fp {
	let mut state = [Fp::ZERO; WIDTH];
	let mut offset = 0;
	for input in inputs {
		if offset == RATE {
			state = permute_native(state);
			offset = 0;
		}
		state[offset] += *input;
		offset += 1;
	}
	permute_native(state)[0]
}
