// Copyright 2025 Irreducible Inc.
use cranelift_entity::{EntityRef, PrimaryMap};
use duet_backend::{
	Backend, BackendConfig, BackendError, BackendKind, GateSink, GenericGate, VerificationKey,
	instantiate, lowering::decompose,
};
use duet_core::{
	ConstraintSystem, Fp, Gate, GateKind, Var, VarIndex, Wire, Witness,
	consts::{COLUMNS, PERMUTS},
};
use rand::{Rng, SeedableRng, rngs::StdRng};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Emitted {
	Generic(GenericGate),
	RangeCheck(VarIndex, Vec<VarIndex>, usize),
}

#[derive(Default)]
struct VecSink {
	trace: PrimaryMap<VarIndex, Option<Fp>>,
	emitted: Vec<Emitted>,
}

impl VecSink {
	fn with_values(values: &[u64]) -> Self {
		let mut sink = VecSink::default();
		for &value in values {
			sink.trace.push(Some(Fp::from_u64(value)));
		}
		sink
	}

	fn assert_satisfied(&self) {
		for emitted in &self.emitted {
			match emitted {
				Emitted::Generic(gate) => {
					let [l, r, o] = gate.registers(|var| self.value(var)).unwrap();
					let c = gate.coeffs;
					assert!((c[0] * l + c[1] * r + c[2] * o + c[3] * l * r + c[4]).is_zero());
				}
				Emitted::RangeCheck(var, limbs, bits) => {
					let expected = decompose(self.value(*var).unwrap(), *bits);
					let actual: Vec<Fp> = limbs.iter().map(|limb| self.value(*limb).unwrap()).collect();
					assert_eq!(actual, expected);
				}
			}
		}
	}
}

impl GateSink for VecSink {
	fn fresh(&mut self, value: Option<Fp>) -> VarIndex {
		self.trace.push(value)
	}

	fn value(&self, var: VarIndex) -> Option<Fp> {
		self.trace[var]
	}

	fn emit_generic(&mut self, gate: GenericGate) {
		self.emitted.push(Emitted::Generic(gate));
	}

	fn emit_range_check(&mut self, value: VarIndex, limbs: &[VarIndex], bits: usize) {
		self.emitted
			.push(Emitted::RangeCheck(value, limbs.to_vec(), bits));
	}
}

fn engines() -> Vec<std::sync::Arc<dyn Backend>> {
	let config = BackendConfig::default().with_worker_threads(2);
	BackendKind::ALL
		.into_iter()
		.map(|kind| instantiate(kind, &config).unwrap())
		.collect()
}

fn v(i: usize) -> Var {
	Var::Reference(VarIndex::new(i))
}

fn fp(value: i64) -> Fp {
	Fp::from_i64(value)
}

#[test]
fn test_add_then_equal_is_one_gate() {
	for engine in engines() {
		let mut sink = VecSink::with_values(&[3, 4]);
		let sum = v(0) + v(1);
		engine
			.assert_zero(&mut sink, &(sum - fp(7)))
			.unwrap();
		assert_eq!(sink.emitted.len(), 1, "{}", engine.kind());
		let Emitted::Generic(gate) = &sink.emitted[0] else {
			panic!("expected a generic gate");
		};
		assert_eq!(gate.coeffs, [fp(1), fp(1), fp(0), fp(0), fp(-7)]);
		sink.assert_satisfied();
	}
}

#[test]
fn test_like_terms_merge() {
	for engine in engines() {
		let mut sink = VecSink::with_values(&[5]);
		engine.assert_zero(&mut sink, &(v(0) - v(0))).unwrap();
		assert!(sink.emitted.is_empty());

		let err = engine
			.assert_zero(&mut sink, &(v(0) - v(0) + fp(3)))
			.unwrap_err();
		assert!(matches!(err, BackendError::Unsatisfiable { constant } if constant == fp(3)));

		// 2x - x - 5 = 0 lowers to x - 5 = 0.
		engine
			.assert_zero(&mut sink, &(v(0).scale(fp(2)) - v(0) - fp(5)))
			.unwrap();
		assert_eq!(
			sink.emitted,
			vec![Emitted::Generic(GenericGate::new().left(fp(1), VarIndex::new(0)).constant(fp(-5)))]
		);
	}
}

#[test]
fn test_long_combination_folds() {
	for engine in engines() {
		let mut sink = VecSink::with_values(&[1, 2, 3, 4, 5]);
		let sum = (0..5).fold(Var::zero(), |acc, i| acc + v(i));
		engine.assert_zero(&mut sink, &(sum - fp(15))).unwrap();
		// Two folds bring five terms down to three.
		assert_eq!(sink.emitted.len(), 3);
		sink.assert_satisfied();

		let reduced = engine
			.reduce_to_var(&mut sink, &(v(0) + v(1) + v(2) + fp(1)))
			.unwrap();
		assert_eq!(sink.value(reduced.as_reference().unwrap()), Some(fp(7)));
		assert_eq!(engine.reduce_to_var(&mut sink, &(v(3) - v(3) + fp(2))).unwrap(), Var::constant(fp(2)));
		sink.assert_satisfied();
	}
}

#[test]
fn test_multiply_affine_operands() {
	for engine in engines() {
		let mut sink = VecSink::with_values(&[3, 4]);
		let x = v(0).scale(fp(2)) + fp(1);
		let y = v(1) + fp(3);
		let z = engine.multiply(&mut sink, &x, &y).unwrap();
		assert_eq!(sink.value(z), Some(fp(49)));
		assert_eq!(sink.emitted.len(), 1);

		engine
			.assert_multiply(&mut sink, &x, &y, &Var::constant(fp(49)))
			.unwrap();
		engine
			.assert_multiply(&mut sink, &v(0), &v(0), &(Var::Reference(z) - fp(40)))
			.unwrap();
		sink.assert_satisfied();

		let err = engine
			.multiply(&mut sink, &Var::constant(fp(2)), &v(0))
			.unwrap_err();
		assert!(matches!(err, BackendError::ConstantOperand { .. }));
	}
}

#[test]
fn test_range_check_lowering() {
	for engine in engines() {
		let mut sink = VecSink::with_values(&[0xfff_fff]);
		engine.range_check(&mut sink, &v(0), 24).unwrap();
		assert_eq!(sink.emitted.len(), 1);
		let Emitted::RangeCheck(var, limbs, 24) = &sink.emitted[0] else {
			panic!("expected a range check row");
		};
		assert_eq!(*var, VarIndex::new(0));
		assert_eq!(limbs.len(), 2);
		sink.assert_satisfied();

		// A scaled operand is materialized first.
		engine.range_check(&mut sink, &v(0).scale(fp(2)), 32).unwrap();
		assert_eq!(sink.emitted.len(), 3);

		assert!(matches!(
			engine.range_check(&mut sink, &v(0), 169),
			Err(BackendError::RangeCheckTooWide { bits: 169 })
		));
		assert!(matches!(
			engine.range_check(&mut sink, &Var::constant(fp(1)), 8),
			Err(BackendError::ConstantOperand { .. })
		));
	}
}

#[test]
fn test_engines_lower_identically() {
	let mut rng = StdRng::seed_from_u64(0);
	let [reference, alternate] = engines().try_into().unwrap();
	for _ in 0..200 {
		let values: Vec<u64> = (0..6).map(|_| rng.random_range(0..1000)).collect();
		let n_terms = rng.random_range(0..8);
		let mut x = Var::constant(fp(rng.random_range(-5..5)));
		for _ in 0..n_terms {
			let coeff = fp(rng.random_range(-2..3));
			x = x + v(rng.random_range(0..6)).scale(coeff);
		}
		let y = v(rng.random_range(0..6)) + fp(rng.random_range(0..3));

		let mut sinks = [VecSink::with_values(&values), VecSink::with_values(&values)];
		for (engine, sink) in [&reference, &alternate].into_iter().zip(&mut sinks) {
			let _ = engine.assert_zero(&mut *sink, &x);
			let _ = engine.multiply(&mut *sink, &x, &y);
			let _ = engine.reduce_to_var(&mut *sink, &x);
		}
		assert_eq!(sinks[0].emitted, sinks[1].emitted, "lowering of {x:?} differs");
		assert_eq!(sinks[0].trace, sinks[1].trace);
	}
}

#[test]
fn test_permutation_cycles_agree() {
	let mut rng = StdRng::seed_from_u64(1);
	let [reference, alternate] = engines().try_into().unwrap();
	let rows: Vec<[Option<VarIndex>; PERMUTS]> = (0..40)
		.map(|_| {
			std::array::from_fn(|_| {
				rng.random_bool(0.7)
					.then(|| VarIndex::new(rng.random_range(0..25)))
			})
		})
		.collect();

	let wiring = reference.permutation_argument(&rows);
	assert_eq!(wiring, alternate.permutation_argument(&rows));

	// Following the wiring from any cell stays on cells holding the same variable.
	for (row, cells) in rows.iter().enumerate() {
		for (col, var) in cells.iter().enumerate() {
			let next = wiring[row][col];
			match var {
				Some(_) => assert_eq!(rows[next.row][next.col], *var),
				None => assert_eq!(next, Wire::new(row, col)),
			}
		}
	}
}

/// `public · w = 12` with the public input copied into the product row.
fn sample() -> (ConstraintSystem, Witness) {
	let mut wires0 = Wire::identity_row(0);
	let mut wires1 = Wire::identity_row(1);
	wires0[0] = Wire::new(1, 0);
	wires1[0] = Wire::new(0, 0);
	let mut pi = vec![Fp::ZERO; 10];
	pi[0] = Fp::ONE;
	let mut product = vec![Fp::ZERO; 10];
	product[3] = Fp::ONE;
	product[4] = fp(-12);
	let cs = ConstraintSystem::new(
		1,
		vec![
			Gate {
				kind: GateKind::Generic,
				wires: wires0,
				coeffs: pi,
			},
			Gate {
				kind: GateKind::Generic,
				wires: wires1,
				coeffs: product,
			},
		],
	);
	let mut rows = vec![[Fp::ZERO; COLUMNS]; 2];
	rows[0][0] = fp(3);
	rows[1][0] = fp(3);
	rows[1][1] = fp(4);
	(cs, Witness::new(vec![fp(3)], rows))
}

#[test]
fn test_keys_agree_and_round_trip() -> anyhow::Result<()> {
	let (cs, _) = sample();
	let [reference, alternate] = engines().try_into().unwrap();
	let key = reference.compile(&cs)?;
	assert_eq!(key, alternate.compile(&cs)?);
	assert_eq!(key.domain_size, 8);
	assert_eq!(key.constraint_system, cs.digest());

	let json = key.to_json()?;
	assert!(json.contains("\"publicInputSize\": 1"));
	assert_eq!(VerificationKey::from_json(&json)?, key);

	let mut tampered = key.clone();
	tampered.sigma_commitments.swap(0, 1);
	let tampered_json = serde_json::to_string(&tampered)?;
	assert!(matches!(
		VerificationKey::from_json(&tampered_json),
		Err(BackendError::CorruptKey { .. })
	));
	Ok(())
}

#[test]
fn test_prove_and_verify() -> anyhow::Result<()> {
	let (cs, witness) = sample();
	for engine in engines() {
		let key = engine.compile(&cs)?;
		let proof = engine.prove(&cs, &witness, &key)?;
		assert!(engine.verify(&proof, &key, &[fp(3)])?);
		assert!(!engine.verify(&proof, &key, &[fp(4)])?);

		let mut forged = proof.clone();
		forged.witness_commitments.reverse();
		assert!(!engine.verify(&forged, &key, &[fp(3)])?);

		let mut bad = witness.clone();
		bad.rows_mut()[1][1] = fp(5);
		assert!(matches!(
			engine.prove(&cs, &bad, &key),
			Err(BackendError::Unsatisfied(_))
		));

		let other = ConstraintSystem::new(1, cs.gates()[..1].to_vec());
		assert!(matches!(
			engine.prove(&other, &witness, &key),
			Err(BackendError::KeyMismatch { .. })
		));
	}

	// Proofs are interchangeable between engines.
	let [reference, alternate] = engines().try_into().unwrap();
	let key = reference.compile(&cs)?;
	let proof = reference.prove(&cs, &witness, &key)?;
	assert_eq!(proof, alternate.prove(&cs, &witness, &key)?);
	assert!(alternate.verify(&proof, &key, &[fp(3)])?);
	Ok(())
}
