// Copyright 2025 Irreducible Inc.
use duet_frontend::{BackendKind, Context, Error};
use num_bigint::BigUint;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rstest::rstest;

use super::*;

fn context() -> Context {
	Context::with_backend(BackendKind::Default).unwrap()
}

fn random_element(rng: &mut impl Rng, ff: &ForeignField) -> BigUint {
	let words: Vec<u64> = (0..4).map(|_| rng.random()).collect();
	let value = words
		.iter()
		.fold(BigUint::ZERO, |acc, word| (acc << 64) + *word);
	value % ff.modulus()
}

fn top_limb(ff: &ForeignField) -> BigUint {
	ff.modulus() >> (2 * LIMB_BITS)
}

/// The largest value with 88-bit limbs whose top limb equals the modulus's.
fn max_almost_reduced(ff: &ForeignField) -> BigUint {
	let low = (BigUint::from(1u8) << (2 * LIMB_BITS)) - 1u8;
	(top_limb(ff) << (2 * LIMB_BITS)) + low
}

#[test]
fn test_constants_fold() {
	let ff = ForeignField::secp256k1();
	let f = ff.modulus().clone();
	let ctx = context();
	let x = &f - 5u8;
	let y = BigUint::from(7u8);
	let (sum, diff, product) = ctx
		.evaluate(|b| {
			let (cx, cy) = (ff.constant(&x), ff.constant(&y));
			let sum = ff.add(b, &cx, &cy)?;
			let diff = ff.sub(b, &cy, &cx)?;
			let product = ff.mul(b, &cx, &cy)?;
			Ok((sum.to_constant(), diff.to_constant(), product.to_constant()))
		})
		.unwrap();
	assert_eq!(sum, Some(BigUint::from(2u8)));
	assert_eq!(diff, Some(BigUint::from(12u8)));
	assert_eq!(product, Some(&f - 35u8));

	let cs = ctx
		.constraint_system(|b| {
			let cx = ff.constant(&x);
			ff.mul(b, &cx, &cx)
		})
		.unwrap();
	assert_eq!(cs.rows(), 0);
}

#[test]
fn test_arithmetic_matches_bigint() {
	let ff = ForeignField::secp256k1();
	let f = ff.modulus().clone();
	let mut rng = StdRng::seed_from_u64(0);
	let ctx = context();

	for _ in 0..4 {
		let (x, y) = (random_element(&mut rng, &ff), random_element(&mut rng, &ff));
		let results = ctx
			.run_and_check(|b| {
				let xw = ff.assert_almost_reduced(b, &ff.witness(b, |_| x.clone())?)?;
				let yw = ff.assert_almost_reduced(b, &ff.witness(b, |_| y.clone())?)?;
				let sum = ff.add(b, &xw, &yw)?;
				let diff = ff.sub(b, &xw, &yw)?;
				let neg = ff.neg(b, &xw)?;
				let product = ff.mul(b, &xw, &yw)?;
				let quotient = ff.div(b, &xw, &yw)?;
				let inverse = ff.inv(b, &yw)?;
				Ok([sum, diff, neg, product, quotient, inverse].map(|z| z.read(b).unwrap() % &f))
			})
			.unwrap();

		let y_inv = y.modinv(&f).unwrap();
		let expected = [
			(&x + &y) % &f,
			(&x + &f - &y) % &f,
			(&f - &x) % &f,
			&x * &y % &f,
			&x * &y_inv % &f,
			y_inv,
		];
		assert_eq!(results, expected);
	}
}

#[test]
fn test_sum_chain() {
	let ff = ForeignField::secp256k1();
	let f = ff.modulus().clone();
	let values: Vec<BigUint> = (1..=5u64).map(|i| &f - i).collect();
	let signs = [Sign::Plus, Sign::Minus, Sign::Plus, Sign::Plus];

	let result = context()
		.run_and_check(|b| {
			let xs = values
				.iter()
				.map(|value| ff.witness(b, |_| value.clone()))
				.collect::<Result<Vec<_>, _>>()?;
			let total = ff.sum(b, &xs, &signs)?;
			assert_eq!(total.reduction(), Reduction::Unreduced);
			Ok(total.read(b).unwrap() % &f)
		})
		.unwrap();
	// (-1) + (-2) - (-3) + (-4) + (-5) = -9
	assert_eq!(result, &f - 9u8);
}

#[rstest]
#[case::default(BackendKind::Default)]
#[case::alternate(BackendKind::Alternate)]
fn test_mul_constraint_count(#[case] kind: BackendKind) {
	let ff = ForeignField::secp256k1();
	let ctx = Context::with_backend(kind).unwrap();
	let cs = ctx
		.constraint_system(|b| {
			let x = ff.assert_almost_reduced(b, &ff.witness(b, |_| BigUint::ZERO)?)?;
			let y = ff.assert_almost_reduced(b, &ff.witness(b, |_| BigUint::ZERO)?)?;
			ff.mul(b, &x, &y)
		})
		.unwrap();
	// Inputs: 2 × (3 limb checks + 1 bound check). Multiplication: 3 remainder limbs, 3 quotient
	// limbs, the quotient bound and the four carries.
	let range_rows = 2 * 4 + 11;
	assert!(cs.rows() > range_rows);
	cs.validate().unwrap();
}

#[test]
fn test_almost_reduced_boundary() {
	let ff = ForeignField::secp256k1();
	let f = ff.modulus().clone();
	let at_bound = max_almost_reduced(&ff);
	let above_bound = &at_bound + 1u8;
	assert_eq!(above_bound.clone() >> (2 * LIMB_BITS), top_limb(&ff) + 1u8);
	let ctx = context();

	// Two elements at the bound add up without overflowing the limb range checks.
	let sum = ctx
		.run_and_check(|b| {
			let x = ff.assert_almost_reduced(b, &ff.witness(b, |_| at_bound.clone())?)?;
			let sum = ff.add(b, &x, &x)?;
			Ok(sum.read(b).unwrap())
		})
		.unwrap();
	assert_eq!(sum % &f, (&at_bound + &at_bound) % &f);

	let err = ctx
		.run_and_check(|b| {
			ff.assert_almost_reduced(b, &ff.witness(b, |_| above_bound.clone())?)
		})
		.unwrap_err();
	let Error::AssertionFailed(failure) = err else {
		panic!("expected an assertion failure");
	};
	assert_eq!(failure.path, "foreign_field.almost_reduced");

	let err = ctx
		.evaluate(|b| ff.assert_almost_reduced(b, &ff.witness(b, |_| above_bound.clone())?))
		.unwrap_err();
	assert!(matches!(err, Error::UnreducedInput { .. }));
}

#[rstest]
#[case::evaluate(0)]
#[case::check(1)]
#[case::analyze(2)]
fn test_mul_rejects_unchecked_input(#[case] mode: u8) {
	let ff = ForeignField::secp256k1();
	let ctx = context();
	let program = |b: &CircuitBuilder| {
		let x = ff.witness(b, |_| BigUint::from(3u8))?;
		let y = ff.constant(&BigUint::from(5u8));
		ff.mul(b, &x, &y)
	};
	let err = match mode {
		0 => ctx.evaluate(program).unwrap_err(),
		1 => ctx.run_and_check(program).unwrap_err(),
		_ => ctx.constraint_system(program).unwrap_err(),
	};
	match err {
		Error::UnreducedInput { gadget, .. } => assert_eq!(gadget, "foreign_field.mul"),
		other => panic!("expected UnreducedInput, got {other}"),
	}
}

#[test]
fn test_is_zero_and_equals() {
	let ff = ForeignField::secp256k1();
	let f = ff.modulus().clone();
	let ctx = context();
	let flags = ctx
		.run_and_check(|b| {
			// f itself is almost reduced and congruent to zero.
			let f_repr = ff.assert_almost_reduced(b, &ff.witness(b, |_| f.clone())?)?;
			let seven = ff.assert_almost_reduced(b, &ff.witness(b, |_| BigUint::from(7u8))?)?;
			let flags = [
				ff.is_zero(b, &f_repr)?,
				ff.is_zero(b, &seven)?,
				ff.equals(b, &seven, &BigUint::from(7u8))?,
				ff.equals(b, &seven, &(&f + 7u8))?,
				ff.equals(b, &seven, &BigUint::from(8u8))?,
			];
			Ok(flags.map(|flag| b.read(&flag).unwrap()))
		})
		.unwrap();
	assert_eq!(flags, [Fp::ONE, Fp::ZERO, Fp::ONE, Fp::ONE, Fp::ZERO]);
}

#[test]
fn test_division_by_zero() {
	let ff = ForeignField::secp256k1();
	let f = ff.modulus().clone();
	let ctx = context();

	let err = ctx.evaluate(|b| ff.inv(b, &ff.constant(&f))).unwrap_err();
	assert!(matches!(err, Error::DivisionByZero { .. }));

	let err = ctx
		.run_and_check(|b| {
			let x = ff.assert_almost_reduced(b, &ff.witness(b, |_| BigUint::ZERO)?)?;
			let one = ff.constant(&BigUint::from(1u8));
			ff.div(&b.subcircuit("ratio"), &one, &x)
		})
		.unwrap_err();
	match err {
		Error::DivisionByZero { path } => assert_eq!(path, "ratio.foreign_field.div"),
		other => panic!("expected DivisionByZero, got {other}"),
	}
}

#[test]
fn test_assert_equal() {
	let ff = ForeignField::secp256k1();
	let ctx = context();
	ctx.run_and_check(|b| {
		let x = ff.witness(b, |_| BigUint::from(11u8))?;
		ff.assert_equal(b, &x, &ff.constant(&BigUint::from(11u8)))
	})
	.unwrap();

	let err = ctx
		.run_and_check(|b| {
			let x = ff.witness(b, |_| BigUint::from(11u8))?;
			ff.assert_equal(b, &x, &ff.constant(&BigUint::from(12u8)))
		})
		.unwrap_err();
	let Error::AssertionFailed(failure) = err else {
		panic!("expected an assertion failure");
	};
	assert_eq!(failure.path, "foreign_field_assert_equal.limb0");
}

#[test]
#[should_panic(expected = "foreign modulus")]
fn test_small_modulus_rejected() {
	ForeignField::new(BigUint::from(101u8));
}
