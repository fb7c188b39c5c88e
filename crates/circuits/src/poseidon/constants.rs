// Copyright 2025 Irreducible Inc.
//! Round constants and the MDS matrix.

use std::sync::LazyLock;

use duet_core::Fp;
use num_bigint::BigUint;
use sha2::{Digest, Sha256};

use super::{ROUNDS, WIDTH};

const DOMAIN_TAG: &[u8] = b"duet.poseidon.pallas.w3.r2";

/// `ROUND_CONSTANTS[round][i]` is added to state element `i` at the start of `round`.
pub(super) static ROUND_CONSTANTS: LazyLock<Vec<[Fp; WIDTH]>> = LazyLock::new(|| {
	(0..ROUNDS)
		.map(|round| std::array::from_fn(|i| expand(round, i)))
		.collect()
});

/// The Cauchy matrix `M[i][j] = 1 / (i + j + 3)`.
pub(super) static MDS: LazyLock<[[Fp; WIDTH]; WIDTH]> = LazyLock::new(|| {
	std::array::from_fn(|i| {
		std::array::from_fn(|j| {
			Fp::from_u64((i + j + 3) as u64)
				.inverse()
				.expect("small non-zero integers are invertible")
		})
	})
});

/// Hashes the tag, the round and the element index into 512 bits and reduces them.
fn expand(round: usize, index: usize) -> Fp {
	let mut bytes = Vec::with_capacity(64);
	for block in 0u8..2 {
		let mut hasher = Sha256::new();
		hasher.update(DOMAIN_TAG);
		hasher.update((round as u32).to_be_bytes());
		hasher.update((index as u32).to_be_bytes());
		hasher.update([block]);
		bytes.extend_from_slice(&hasher.finalize());
	}
	Fp::from_biguint(&BigUint::from_bytes_be(&bytes))
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;

	use super::*;

	#[test]
	fn test_round_constants_are_distinct() {
		let all: HashSet<Fp> = ROUND_CONSTANTS.iter().flatten().copied().collect();
		assert_eq!(all.len(), ROUNDS * WIDTH);
	}

	#[test]
	fn test_mds_entries() {
		assert_eq!(MDS[0][0] * Fp::from_u64(3), Fp::ONE);
		assert_eq!(MDS[2][2] * Fp::from_u64(7), Fp::ONE);
		assert_eq!(MDS[1][2], MDS[2][1]);
	}
}
