//! QAP evaluation at the setup point
//!
//! For every wire `w`, `A[w]` (resp. `B[w]`, `C[w]`) is `Σ_i coeff_{i,w} · L_i(t)`
//! over the constraints `i` where `w` appears on the left (resp. right, output).
//! The Lagrange values are produced by the recurrence
//!
//! ```text
//! L_0(t)     = (tᴺ − 1) / N · 1/(t − 1)
//! L_{i+1}(t) = ω · L_i(t) · (t − ωⁱ) / (t − ωⁱ⁺¹)
//! ```
//!
//! after one batch inversion of the `(t − ωⁱ)`.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use ark_ff::{batch_inversion, FftField, Field, One, Zero};

use crate::domain::Domain;
use crate::r1cs::{CoeffId, ConstraintSystem, Term};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QapError {
    /// `t − ωⁱ = 0` for some `i`, i.e. the point lies in the domain.
    #[error("evaluation point lies in the domain (t = ω^{0})")]
    PointInDomain(usize),
    #[error("domain of size {domain} cannot hold {constraints} constraints")]
    DomainTooSmall { domain: u64, constraints: usize },
}

/// Per-wire evaluations of the three QAP polynomial families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QapEvaluations<F> {
    pub a: Vec<F>,
    pub b: Vec<F>,
    pub c: Vec<F>,
}

/// Evaluates `A`, `B`, `C` for every wire at `t`.
pub fn evaluate_at<F, CS>(cs: &CS, domain: &Domain<F>, t: F) -> Result<QapEvaluations<F>, QapError>
where
    F: FftField,
    CS: ConstraintSystem<F> + ?Sized,
{
    let nb_wires = cs.nb_wires();
    let nb_constraints = cs.nb_constraints();
    if nb_constraints as u64 > domain.cardinality {
        return Err(QapError::DomainTooSmall {
            domain: domain.cardinality,
            constraints: nb_constraints,
        });
    }

    // (t − ωⁱ) for i in 0..=nb_constraints, then invert in one pass.
    let w = domain.generator;
    let mut wi = F::one();
    let mut diffs = Vec::with_capacity(nb_constraints + 1);
    for i in 0..=nb_constraints {
        let d = t - wi;
        if d.is_zero() {
            return Err(QapError::PointInDomain(i));
        }
        diffs.push(d);
        wi *= w;
    }
    let mut inv = diffs.clone();
    batch_inversion(&mut inv);

    let mut out = QapEvaluations {
        a: vec![F::zero(); nb_wires],
        b: vec![F::zero(); nb_wires],
        c: vec![F::zero(); nb_wires],
    };

    let mut l = (t.pow([domain.cardinality]) - F::one()) * inv[0] * domain.cardinality_inv;

    for (j, c) in cs.constraints().iter().enumerate() {
        accumulate(cs, &mut out.a, &c.l, l);
        accumulate(cs, &mut out.b, &c.r, l);
        accumulate(cs, &mut out.c, &c.o, l);

        l *= w;
        l *= diffs[j];
        l *= inv[j + 1];
    }

    Ok(out)
}

#[inline]
fn accumulate<F, CS>(cs: &CS, res: &mut [F], terms: &[Term], value: F)
where
    F: FftField,
    CS: ConstraintSystem<F> + ?Sized,
{
    for t in terms {
        let slot = &mut res[t.wire];
        match t.coeff {
            CoeffId::ZERO => {}
            CoeffId::ONE => *slot += value,
            CoeffId::MINUS_ONE => *slot -= value,
            CoeffId::TWO => *slot += value.double(),
            id => *slot += cs.coefficient(id) * value,
        }
    }
}

/// Wires that never appear on the left (resp. right) of any constraint.
///
/// Their `A` (resp. `B`) evaluation is zero whatever `t` is, which lets a
/// dummy setup reproduce the infinity markers of a real one.
pub fn unreferenced_wires<F: Field, CS: ConstraintSystem<F> + ?Sized>(
    cs: &CS,
) -> (Vec<bool>, Vec<bool>) {
    let nb_wires = cs.nb_wires();
    let mut in_a = vec![false; nb_wires];
    let mut in_b = vec![false; nb_wires];
    for c in cs.constraints() {
        for t in &c.l {
            in_a[t.wire] = true;
        }
        for t in &c.r {
            in_b[t.wire] = true;
        }
    }
    let flip = |v: Vec<bool>| v.into_iter().map(|x| !x).collect();
    (flip(in_a), flip(in_b))
}

/// Number of wires with zero `A`, zero `B` evaluations.
pub fn infinity_count<F: Field, CS: ConstraintSystem<F> + ?Sized>(cs: &CS) -> (usize, usize) {
    let (a, b) = unreferenced_wires::<F, CS>(cs);
    let count = |v: &[bool]| v.iter().filter(|x| **x).count();
    (count(&a), count(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::r1cs::{R1csBuilder, Variable};
    use ark_bn254::Fr;
    use ark_ff::UniformRand;
    use rand::{rngs::StdRng, SeedableRng};

    fn lagrange_naive(domain: &Domain<Fr>, i: usize, t: Fr) -> Fr {
        let n = domain.size();
        let wi = domain.element(i as u64);
        (0..n).filter(|j| *j != i).fold(Fr::one(), |acc, j| {
            let wj = domain.element(j as u64);
            acc * (t - wj) / (wi - wj)
        })
    }

    #[test]
    fn matches_naive_lagrange_interpolation() {
        let mut b = R1csBuilder::<Fr>::new();
        let y = b.public_input();
        let x = b.secret_input();
        let u = b.internal();
        let v = b.internal();
        b.enforce(vec![(Fr::one(), x)], vec![(Fr::one(), x)], vec![(Fr::one(), u)]);
        b.enforce(
            vec![(Fr::from(2u64), u)],
            vec![(Fr::one(), x), (-Fr::one(), Variable::ONE)],
            vec![(Fr::one(), v)],
        );
        b.enforce(
            vec![(Fr::from(7u64), v), (Fr::one(), x)],
            vec![(Fr::one(), Variable::ONE)],
            vec![(Fr::one(), y)],
        );
        let cs = b.build().unwrap();
        let domain = Domain::<Fr>::new(cs.nb_constraints()).unwrap();
        assert_eq!(domain.cardinality, 4);

        let mut rng = StdRng::seed_from_u64(3);
        let t = Fr::rand(&mut rng);
        let got = evaluate_at(&cs, &domain, t).unwrap();

        let mut want = QapEvaluations {
            a: vec![Fr::zero(); cs.nb_wires()],
            b: vec![Fr::zero(); cs.nb_wires()],
            c: vec![Fr::zero(); cs.nb_wires()],
        };
        for (i, c) in cs.constraints.iter().enumerate() {
            let li = lagrange_naive(&domain, i, t);
            for (terms, out) in [(&c.l, &mut want.a), (&c.r, &mut want.b), (&c.o, &mut want.c)] {
                for term in terms.iter() {
                    out[term.wire] += cs.coefficient(term.coeff) * li;
                }
            }
        }
        assert_eq!(got, want);

        // y never appears on the left or right
        let (za, zb) = unreferenced_wires::<Fr, _>(&cs);
        assert!(za[cs.wire(y)] && zb[cs.wire(y)]);
        assert!(got.a[cs.wire(y)].is_zero() && got.b[cs.wire(y)].is_zero());
        assert_eq!(infinity_count::<Fr, _>(&cs), (2, 3));
    }

    #[test]
    fn rejects_point_in_domain() {
        let mut b = R1csBuilder::<Fr>::new();
        let y = b.public_input();
        b.enforce(vec![(Fr::one(), y)], vec![(Fr::one(), y)], vec![(Fr::one(), y)]);
        b.enforce(vec![(Fr::one(), y)], vec![(Fr::one(), y)], vec![(Fr::one(), y)]);
        let cs = b.build().unwrap();
        let domain = Domain::<Fr>::new(2).unwrap();
        let err = evaluate_at(&cs, &domain, domain.element(1)).unwrap_err();
        assert_eq!(err, QapError::PointInDomain(1));
    }
}
