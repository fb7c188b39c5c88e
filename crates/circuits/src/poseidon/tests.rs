// Copyright 2025 Irreducible Inc.
use duet_core::verify::verify_constraints;
use duet_frontend::{BackendKind, Context};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rstest::rstest;

use super::*;

fn random_fp(rng: &mut impl Rng) -> Fp {
	Fp::from_u64(rng.random())
}

#[test]
fn test_constant_permutation_folds() {
	let ctx = Context::with_backend(BackendKind::Default).unwrap();
	let input = [Fp::from_u64(1), Fp::from_u64(2), Fp::from_u64(3)];
	let output = ctx
		.evaluate(|b| permute(b, &input.map(Var::Constant)))
		.unwrap();
	assert_eq!(output, permute_native(input).map(Var::Constant));

	let cs = ctx
		.constraint_system(|b| permute(b, &input.map(Var::Constant)))
		.unwrap();
	assert_eq!(cs.rows(), 0);
}

#[test]
fn test_permutation_is_not_trivial() {
	let zero = permute_native([Fp::ZERO; WIDTH]);
	assert_ne!(zero, [Fp::ZERO; WIDTH]);
	assert_ne!(permute_native(zero), zero);
}

#[rstest]
#[case::default(BackendKind::Default)]
#[case::alternate(BackendKind::Alternate)]
fn test_permutation_in_circuit(#[case] kind: BackendKind) {
	let ctx = Context::with_backend(kind).unwrap();
	let mut rng = StdRng::seed_from_u64(7);
	let input: [Fp; WIDTH] = std::array::from_fn(|_| random_fp(&mut rng));

	let run = ctx
		.generate_witness(|b| {
			let state = b.witness_array(|_| input);
			let output = permute(b, &state)?;
			Ok(output.map(|x| b.read(&x)))
		})
		.unwrap();
	assert_eq!(run.output, permute_native(input).map(Some));
	verify_constraints(&run.constraint_system, &run.witness).unwrap();

	// Every S-box costs four half gates.
	let sbox_half_gates = (FULL_ROUNDS * WIDTH + PARTIAL_ROUNDS) * 4;
	assert!(run.constraint_system.rows() >= sbox_half_gates / 2);
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
#[case(3)]
#[case(5)]
fn test_hash_matches_native(#[case] len: usize) {
	let ctx = Context::with_backend(BackendKind::Default).unwrap();
	let mut rng = StdRng::seed_from_u64(len as u64);
	let inputs: Vec<Fp> = (0..len).map(|_| random_fp(&mut rng)).collect();

	let digest = ctx
		.run_and_check(|b| {
			let vars: Vec<Var> = inputs.iter().map(|x| b.witness(|_| *x)).collect();
			let digest = hash(b, &vars)?;
			Ok(b.read(&digest))
		})
		.unwrap();
	assert_eq!(digest, Some(hash_native(&inputs)));

	let evaluated = ctx
		.evaluate(|b| {
			let vars: Vec<Var> = inputs.iter().copied().map(Var::Constant).collect();
			hash(b, &vars)
		})
		.unwrap();
	assert_eq!(evaluated, Var::Constant(hash_native(&inputs)));
}

#[test]
fn test_hash_separates_inputs() {
	assert_ne!(hash_native(&[Fp::ONE]), hash_native(&[Fp::from_u64(2)]));
	assert_ne!(hash_native(&[Fp::ONE, Fp::ONE]), hash_native(&[Fp::ONE, Fp::ONE, Fp::ONE]));
	assert_ne!(hash_native(&[Fp::ONE, Fp::from_u64(2)]), hash_native(&[Fp::from_u64(2), Fp::ONE]));
}

#[test]
fn test_trailing_zeros_in_last_block_are_absorbed_silently() {
	let empty = hash_native(&[]);
	assert_eq!(hash_native(&[Fp::ZERO]), empty);
	assert_eq!(hash_native(&[Fp::ZERO, Fp::ZERO]), empty);
	assert_eq!(hash_native(&[Fp::ONE, Fp::ZERO]), hash_native(&[Fp::ONE]));
	// A third element starts a new block.
	assert_ne!(hash_native(&[Fp::ZERO; 3]), empty);

	let ctx = Context::with_backend(BackendKind::Default).unwrap();
	let in_circuit = ctx
		.evaluate(|b| hash(b, &[Var::zero(), Var::zero()]))
		.unwrap();
	assert_eq!(in_circuit, Var::Constant(empty));
}

#[test]
fn test_sponge_squeezes_fresh_outputs() {
	let ctx = Context::with_backend(BackendKind::Default).unwrap();
	let (first, second) = ctx
		.evaluate(|b| {
			let mut sponge = Sponge::new();
			sponge.absorb(b, &Var::constant(5u64))?;
			let first = sponge.squeeze(b)?;
			let second = sponge.squeeze(b)?;
			Ok((first, second))
		})
		.unwrap();
	assert_eq!(first, Var::Constant(hash_native(&[Fp::from_u64(5)])));
	assert_ne!(first, second);
}
