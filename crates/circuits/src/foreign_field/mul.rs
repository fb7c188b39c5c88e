// Copyright 2025 Irreducible Inc.
//! Multiplication, inversion and division.
//!
//! `x·y = q·f + r` is checked twice. Modulo `2^264` it becomes `x·y + q·f' = r` for the negated
//! modulus `f' = 2^264 - f`, which only involves the six limb products below `2^264`:
//!
//! ```text
//! p0 = x0·y0 + q0·f'0
//! p1 = x0·y1 + x1·y0 + q0·f'1 + q1·f'0                 = p10 + 2^88·p11
//! p2 = x0·y2 + x1·y1 + x2·y0 + q0·f'2 + q1·f'1 + q2·f'0
//!
//! p0 + 2^88·p10 - r0 - 2^88·r1 = 2^176·c0
//! p2 + p11 + c0 - r2           = 2^88·c1
//! ```
//!
//! Modulo the native field it is checked directly on the native values. Together with the range
//! checks on `q`, `p10`, `p11`, `c0` and `c1` the two congruences imply the integer equation.

use duet_core::Fp;
use duet_frontend::{CircuitBuilder, Error};
use num_bigint::BigUint;

use super::{Field3, ForeignField, Reduction, compose, gadget_path, split, unreduced_input};
use crate::{
	pow2,
	range_check::{LIMB_BITS, multi_range_check},
};

struct MulWitness {
	quotient: [BigUint; 3],
	remainder: [BigUint; 3],
	p10: BigUint,
	p11: BigUint,
	c0: BigUint,
	c1: BigUint,
}

impl MulWitness {
	fn auxiliary(&self) -> [Fp; 7] {
		let [q0, q1, q2] = &self.quotient;
		[q0, q1, q2, &self.p10, &self.p11, &self.c0, &self.c1].map(Fp::from_biguint)
	}
}

impl ForeignField {
	fn negated_modulus(&self) -> [BigUint; 3] {
		split(&((BigUint::from(1u8) << (3 * LIMB_BITS)) - &self.modulus))
	}

	/// `x·y mod f`.
	///
	/// Both inputs must be almost reduced. The remainder is range-checked but not bounded by `f`.
	///
	/// # Cost
	///
	/// Seven half gates, the three carry equations and ten range-check rows.
	pub fn mul(&self, b: &CircuitBuilder, x: &Field3, y: &Field3) -> Result<Field3, Error> {
		self.require_almost_reduced(b, "foreign_field.mul", &[x, y])?;
		if let (Some(x), Some(y)) = (x.to_constant(), y.to_constant()) {
			return Ok(self.constant(&(x * y)));
		}
		self.mul_internal(&b.subcircuit("foreign_field_mul"), x, y, None)
	}

	/// `x^{-1} mod f`. The result is almost reduced.
	pub fn inv(&self, b: &CircuitBuilder, x: &Field3) -> Result<Field3, Error> {
		self.require_almost_reduced(b, "foreign_field.inv", &[x])?;
		let division_by_zero = || Error::DivisionByZero {
			path: gadget_path(b, "foreign_field.inv"),
		};
		if let Some(value) = x.to_constant() {
			let inverse = self.inverse(&value).ok_or_else(division_by_zero)?;
			return Ok(self.constant(&inverse));
		}
		let inverse = match x.read(b) {
			Some(value) => Some(self.inverse(&value).ok_or_else(division_by_zero)?),
			None => None,
		};

		let b = b.subcircuit("foreign_field_inv");
		let inverse = self.witness(&b, move |_| inverse.unwrap_or_default())?;
		let inverse = self.assert_almost_reduced(&b, &inverse)?;
		self.mul_internal(&b, x, &inverse, Some(&self.constant(&BigUint::from(1u8))))?;
		Ok(inverse)
	}

	/// `x / y mod f`. The result is almost reduced.
	///
	/// Both inputs must be almost reduced and `x·y^{-1}·y` must not wrap below `x`, which holds
	/// whenever `x < f`.
	pub fn div(&self, b: &CircuitBuilder, x: &Field3, y: &Field3) -> Result<Field3, Error> {
		self.require_almost_reduced(b, "foreign_field.div", &[x, y])?;
		let division_by_zero = || Error::DivisionByZero {
			path: gadget_path(b, "foreign_field.div"),
		};
		if let Some(divisor) = y.to_constant() {
			let inverse = self.inverse(&divisor).ok_or_else(division_by_zero)?;
			if let Some(dividend) = x.to_constant() {
				return Ok(self.constant(&(dividend * inverse)));
			}
		}
		let quotient = match (x.read(b), y.read(b)) {
			(Some(dividend), Some(divisor)) => {
				let inverse = self.inverse(&divisor).ok_or_else(division_by_zero)?;
				Some(dividend * inverse % &self.modulus)
			}
			_ => None,
		};

		let b = b.subcircuit("foreign_field_div");
		let quotient = self.witness(&b, move |_| quotient.unwrap_or_default())?;
		let quotient = self.assert_almost_reduced(&b, &quotient)?;
		self.mul_internal(&b, &quotient, y, Some(x))?;
		let divisor_is_zero = self.is_zero(&b, y)?;
		b.assert_zero("nonzero_divisor", &divisor_is_zero)?;
		Ok(quotient)
	}

	fn inverse(&self, value: &BigUint) -> Option<BigUint> {
		(value % &self.modulus).modinv(&self.modulus)
	}

	/// Constrains `x·y ≡ target (mod f)`, witnessing the remainder if no target is given. Returns
	/// the remainder.
	fn mul_internal(
		&self,
		b: &CircuitBuilder,
		x: &Field3,
		y: &Field3,
		target: Option<&Field3>,
	) -> Result<Field3, Error> {
		let known = match (x.read_limbs(b), y.read_limbs(b)) {
			(Some(x), Some(y)) => match target.map(|target| target.read(b)) {
				Some(None) => None,
				target => Some(
					self.mul_witness(&x, &y, target.flatten().as_ref())
						.ok_or_else(|| {
							unreduced_input(b, "quotient", "the product does not reduce to the target")
						})?,
				),
			},
			_ => None,
		};

		let [q0, q1, q2, p10, p11, c0, c1] =
			b.witness_array(|_| known.as_ref().map_or([Fp::ZERO; 7], MulWitness::auxiliary));
		let remainder = match target {
			Some(target) => target.clone(),
			None => {
				let limbs = b.witness_array(|_| {
					known.as_ref().map_or([Fp::ZERO; 3], |witness| {
						witness.remainder.each_ref().map(Fp::from_biguint)
					})
				});
				multi_range_check(b, &limbs)?;
				Field3::new(limbs, Reduction::Unreduced)
			}
		};
		let quotient = Field3::new([q0, q1, q2], Reduction::Unreduced);

		let [x0, x1, x2] = &x.limbs;
		let [y0, y1, y2] = &y.limbs;
		let [q0, q1, q2] = &quotient.limbs;
		let [r0, r1, r2] = &remainder.limbs;
		let f = self.negated_modulus().each_ref().map(Fp::from_biguint);
		let shift = pow2(LIMB_BITS);

		let p0 = b.mul(x0, y0)? + q0.scale(f[0]);
		let p1 = b.mul(x0, y1)? + b.mul(x1, y0)? + q0.scale(f[1]) + q1.scale(f[0]);
		let p2 = b.mul(x0, y2)?
			+ b.mul(x1, y1)?
			+ b.mul(x2, y0)?
			+ q0.scale(f[2])
			+ q1.scale(f[1])
			+ q2.scale(f[0]);

		b.assert_eq("middle", &p1, &(&p10 + p11.scale(shift)))?;
		b.assert_eq(
			"low",
			&(p0 + p10.scale(shift) - r0 - r1.scale(shift)),
			&c0.scale(pow2(2 * LIMB_BITS)),
		)?;
		b.assert_eq("high", &(p2 + &p11 + &c0 - r2), &c1.scale(shift))?;

		multi_range_check(b, &quotient.limbs)?;
		let offset = Fp::from_biguint(&self.bound_offset());
		b.range_check("quotient_bound", &(q2 + offset), LIMB_BITS)?;
		b.range_check("p10", &p10, LIMB_BITS)?;
		b.range_check("p11", &p11, LIMB_BITS + 4)?;
		b.range_check("c0", &c0, 2)?;
		b.range_check("c1", &c1, LIMB_BITS + 4)?;

		let product = b.mul(&x.native(), &y.native())?;
		b.assert_eq(
			"native",
			&product,
			&(quotient.native().scale(self.modulus_native()) + remainder.native()),
		)?;
		Ok(remainder)
	}

	fn mul_witness(
		&self,
		x: &[BigUint; 3],
		y: &[BigUint; 3],
		target: Option<&BigUint>,
	) -> Option<MulWitness> {
		let product = compose(x) * compose(y);
		let (quotient, remainder) = match target {
			None => (&product / &self.modulus, &product % &self.modulus),
			Some(target) => {
				if &product < target || (&product - target) % &self.modulus != BigUint::ZERO {
					return None;
				}
				((&product - target) / &self.modulus, target.clone())
			}
		};
		let max_bits = 3 * LIMB_BITS as u64;
		if quotient.bits() > max_bits || remainder.bits() > max_bits {
			return None;
		}
		let q = split(&quotient);
		let r = split(&remainder);
		let f = self.negated_modulus();

		let p0 = &x[0] * &y[0] + &q[0] * &f[0];
		let p1 = &x[0] * &y[1] + &x[1] * &y[0] + &q[0] * &f[1] + &q[1] * &f[0];
		let p2 = &x[0] * &y[2]
			+ &x[1] * &y[1]
			+ &x[2] * &y[0]
			+ &q[0] * &f[2]
			+ &q[1] * &f[1]
			+ &q[2] * &f[0];
		let mask = (BigUint::from(1u8) << LIMB_BITS) - 1u8;
		let p10 = &p1 & &mask;
		let p11 = p1 >> LIMB_BITS;

		let low = p0 + (&p10 << LIMB_BITS);
		let r01 = &r[0] + (&r[1] << LIMB_BITS);
		if low < r01 {
			return None;
		}
		let c0 = (low - r01) >> (2 * LIMB_BITS);
		let high = p2 + &p11 + &c0;
		if high < r[2] {
			return None;
		}
		let c1 = (high - &r[2]) >> LIMB_BITS;
		Some(MulWitness {
			quotient: q,
			remainder: r,
			p10,
			p11,
			c0,
			c1,
		})
	}
}
