//! Groth16 prover
//!
//! ```text
//! Ar  = α + Σ wᵢ·Aᵢ + r·δ
//! Bs  = β + Σ wᵢ·Bᵢ + s·δ                 (G2, and once more in G1)
//! Krs = Σ wᵢ·Kᵢ + Σ hᵢ·Zᵢ + s·Ar + r·Bs − rs·δ
//! ```
//!
//! `h` is the quotient `(a·b − c) / (Xᴺ − 1)`, computed on the coset `g·H`
//! and then bit-reversed and truncated to match the layout of `pk.Z`.
//! Privately committed wires are not part of `Krs`; they enter through the
//! Pedersen commitments instead.

#![forbid(unsafe_code)]

use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup, VariableBaseMSM};
use ark_ff::{FftField, Field, One, UniformRand, Zero};
use rand::{CryptoRng, RngCore};
use std::time::Instant;
use tracing::{debug, info};

use crate::domain::{bit_reverse, Domain, DomainError};
use crate::pedersen::{self, PedersenError};
use crate::proof::Proof;
use crate::r1cs::{self, Assignment, CommitmentLayout, ConstraintSystem, R1csError};
use crate::setup::ProvingKey;
use crate::verifier::{commitment_hash, commitment_seeds, PrimitiveFailure, DEFAULT_COMMITMENT_DST};

/// Errors surfaced by [`prove`].
#[derive(Debug, thiserror::Error)]
pub enum ProveError {
    /// Invalid circuit or unsatisfied assignment.
    #[error("constraint system: {0}")]
    ConstraintSystem(#[from] R1csError),
    /// Transform failure in the quotient computation.
    #[error("domain: {0}")]
    Domain(#[from] DomainError),
    /// Commitment or proof of knowledge failed.
    #[error("pedersen: {0}")]
    Pedersen(#[from] PedersenError),
    /// MSM or serialization failure.
    #[error(transparent)]
    Primitive(#[from] PrimitiveFailure),
    /// The key was produced for a different circuit; names the mismatching part.
    #[error("proving key does not match the constraint system ({0})")]
    KeyMismatch(&'static str),
    /// A commitment wire holds a stale value.
    #[error("wire {wire} does not hold the hash of its commitment")]
    CommitmentWire {
        /// Index of the commitment wire.
        wire: usize,
    },
}

fn msm<G: CurveGroup>(bases: &[G::Affine], scalars: &[G::ScalarField]) -> Result<G, PrimitiveFailure> {
    if bases.len() != scalars.len() {
        return Err(PrimitiveFailure::Msm {
            bases: bases.len(),
            scalars: scalars.len(),
        });
    }
    if bases.is_empty() {
        return Ok(G::zero());
    }
    G::msm(bases, scalars).map_err(|_| PrimitiveFailure::Msm {
        bases: bases.len(),
        scalars: scalars.len(),
    })
}

/// Commitment `i`, its private values and the hash for its wire.
fn commit_group<E: Pairing>(
    pk: &ProvingKey<E>,
    layout: &CommitmentLayout,
    nb_public: usize,
    i: usize,
    values: &[E::ScalarField],
    dst: &[u8],
) -> Result<(E::G1Affine, Vec<E::ScalarField>, E::ScalarField), ProveError> {
    let key = pk
        .commitment_keys
        .get(i)
        .ok_or(ProveError::KeyMismatch("commitment keys"))?;
    let private: Vec<E::ScalarField> = layout.private_committed[i].iter().map(|&w| values[w]).collect();
    let commitment = key.commit(&private)?;
    let public: Vec<E::ScalarField> = layout.public_and_commitment_committed[i]
        .iter()
        .map(|&p| {
            if p < nb_public {
                values[p]
            } else {
                values[layout.commitment_wires[p - nb_public]]
            }
        })
        .collect();
    let hash = commitment_hash::<E>(&commitment, &public, dst)?;
    Ok((commitment, private, hash))
}

/// Fills every commitment wire of `assignment` with the hash of its
/// commitment. The committed wires must already be set; groups are solved in
/// order so a commitment may cover an earlier commitment wire.
pub fn solve_commitment_wires<E, CS>(
    pk: &ProvingKey<E>,
    cs: &CS,
    assignment: &mut Assignment<E::ScalarField>,
    dst: &[u8],
) -> Result<(), ProveError>
where
    E: Pairing,
    CS: ConstraintSystem<E::ScalarField> + ?Sized,
{
    let nb_public = cs.nb_public_variables();
    let layout = r1cs::interleave(cs.commitments(), nb_public);
    if pk.commitment_keys.len() != layout.commitment_wires.len() {
        return Err(ProveError::KeyMismatch("commitment keys"));
    }
    if assignment.values().len() != cs.nb_wires() {
        return Err(R1csError::AssignmentLength {
            got: assignment.values().len(),
            expected: cs.nb_wires(),
        }
        .into());
    }
    for i in 0..layout.commitment_wires.len() {
        let (_, _, hash) = commit_group(pk, &layout, nb_public, i, assignment.values(), dst)?;
        assignment.set_wire(layout.commitment_wires[i], hash);
    }
    Ok(())
}

/// `(a·b − c)/(Xᴺ − 1)` in coefficient form, bit-reversed, `N − 1` entries.
fn quotient<F, CS>(cs: &CS, domain: &Domain<F>, values: &[F]) -> Result<Vec<F>, ProveError>
where
    F: FftField,
    CS: ConstraintSystem<F> + ?Sized,
{
    let n = domain.size();
    let mut a = vec![F::zero(); n];
    let mut b = vec![F::zero(); n];
    let mut c = vec![F::zero(); n];
    for (i, con) in cs.constraints().iter().enumerate() {
        a[i] = r1cs::eval_lc(cs, &con.l, values);
        b[i] = r1cs::eval_lc(cs, &con.r, values);
        c[i] = r1cs::eval_lc(cs, &con.o, values);
    }

    let to_coset = |v: &mut Vec<F>| -> Result<(), DomainError> {
        domain.ifft_in_place(v)?;
        domain.coset_fft_in_place(v)
    };
    let (ra, (rb, rc)) = rayon::join(|| to_coset(&mut a), || rayon::join(|| to_coset(&mut b), || to_coset(&mut c)));
    ra?;
    rb?;
    rc?;

    // Xᴺ − 1 is the constant gᴺ − 1 on the coset
    let z_inv = (domain.coset_shift.pow([domain.cardinality]) - F::one())
        .inverse()
        .ok_or(ProveError::KeyMismatch("coset shift"))?;
    let mut h: Vec<F> = a
        .iter()
        .zip(&b)
        .zip(&c)
        .map(|((a, b), c)| (*a * b - c) * z_inv)
        .collect();
    domain.coset_ifft_in_place(&mut h)?;
    bit_reverse(&mut h);
    h.truncate(n - 1);
    Ok(h)
}

fn kept<F: Copy>(values: &[F], infinity: &[bool]) -> Vec<F> {
    values
        .iter()
        .zip(infinity)
        .filter(|(_, inf)| !**inf)
        .map(|(v, _)| *v)
        .collect()
}

/// Proves `assignment` with the default commitment DST.
pub fn prove<E, CS, R>(
    pk: &ProvingKey<E>,
    cs: &CS,
    assignment: &Assignment<E::ScalarField>,
    rng: &mut R,
) -> Result<Proof<E>, ProveError>
where
    E: Pairing,
    CS: ConstraintSystem<E::ScalarField> + ?Sized,
    R: RngCore + CryptoRng,
{
    prove_with_dst(pk, cs, assignment, DEFAULT_COMMITMENT_DST, rng)
}

/// Proves `assignment`, which must satisfy `cs` and carry solved commitment
/// wires (see [`solve_commitment_wires`]).
pub fn prove_with_dst<E, CS, R>(
    pk: &ProvingKey<E>,
    cs: &CS,
    assignment: &Assignment<E::ScalarField>,
    dst: &[u8],
    rng: &mut R,
) -> Result<Proof<E>, ProveError>
where
    E: Pairing,
    CS: ConstraintSystem<E::ScalarField> + ?Sized,
    R: RngCore + CryptoRng,
{
    let start = Instant::now();
    let values = assignment.values();
    r1cs::validate::<E::ScalarField, CS>(cs)?;
    r1cs::is_satisfied(cs, values)?;

    let nb_wires = cs.nb_wires();
    let nb_public = cs.nb_public_variables();
    if pk.domain.size() < cs.nb_constraints() {
        return Err(ProveError::KeyMismatch("domain"));
    }
    if pk.infinity_a.len() != nb_wires || pk.infinity_b.len() != nb_wires {
        return Err(ProveError::KeyMismatch("wire count"));
    }
    let layout = r1cs::interleave(cs.commitments(), nb_public);
    if pk.commitment_keys.len() != layout.commitment_wires.len() {
        return Err(ProveError::KeyMismatch("commitment keys"));
    }

    let nb_commitments = layout.commitment_wires.len();
    let mut commitments = Vec::with_capacity(nb_commitments);
    let mut private_values = Vec::with_capacity(nb_commitments);
    let mut hashes = Vec::with_capacity(nb_commitments);
    for i in 0..nb_commitments {
        let (c, private, hash) = commit_group(pk, &layout, nb_public, i, values, dst)?;
        let wire = layout.commitment_wires[i];
        if values[wire] != hash {
            return Err(ProveError::CommitmentWire { wire });
        }
        commitments.push(c);
        private_values.push(private);
        hashes.push(hash);
    }
    let seeds = commitment_seeds(&hashes)?;
    let commitment_pok = pedersen::batch_prove(&pk.commitment_keys, &private_values, &commitments, &seeds)?;

    let h = quotient(cs, &pk.domain, values)?;
    if h.len() != pk.z.len() {
        return Err(ProveError::KeyMismatch("quotient"));
    }

    // pk.K covers every wire that is neither public, a commitment wire nor
    // privately committed
    let mut in_k = vec![true; nb_wires];
    in_k[..nb_public].iter_mut().for_each(|x| *x = false);
    for &w in layout.commitment_wires.iter().chain(layout.private_committed.iter().flatten()) {
        in_k[w] = false;
    }
    let k_values: Vec<E::ScalarField> = values
        .iter()
        .zip(&in_k)
        .filter(|(_, k)| **k)
        .map(|(v, _)| *v)
        .collect();
    if k_values.len() != pk.k.len() {
        return Err(ProveError::KeyMismatch("private wires"));
    }
    let a_values = kept(values, &pk.infinity_a);
    let b_values = kept(values, &pk.infinity_b);

    let r = E::ScalarField::rand(rng);
    let s = E::ScalarField::rand(rng);

    let (g1, bs) = rayon::join(
        || -> Result<_, PrimitiveFailure> {
            let ar = pk.alpha_g1.into_group() + msm::<E::G1>(&pk.a, &a_values)? + pk.delta_g1 * r;
            let bs1 = pk.beta_g1.into_group() + msm::<E::G1>(&pk.b_g1, &b_values)? + pk.delta_g1 * s;
            let krs = msm::<E::G1>(&pk.k, &k_values)? + msm::<E::G1>(&pk.z, &h)?;
            Ok((ar, bs1, krs))
        },
        || -> Result<_, PrimitiveFailure> {
            Ok(pk.beta_g2.into_group() + msm::<E::G2>(&pk.b_g2, &b_values)? + pk.delta_g2 * s)
        },
    );
    let (ar, bs1, krs) = g1?;
    let bs = bs?;
    let krs = krs + ar * s + bs1 * r - pk.delta_g1 * (r * s);

    let mut points = E::G1::normalize_batch(&[ar, krs]).into_iter();
    let (ar, krs) = match (points.next(), points.next()) {
        (Some(ar), Some(krs)) => (ar, krs),
        _ => return Err(ProveError::KeyMismatch("normalization")),
    };

    info!(constraints = cs.nb_constraints(), wires = nb_wires, commitments = nb_commitments, "groth16 prove");
    debug!(elapsed = ?start.elapsed(), "prover done");

    Ok(Proof {
        ar,
        bs: bs.into_affine(),
        krs,
        commitments,
        commitment_pok,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::r1cs::CoeffId;
    use crate::setup::{dummy_setup, setup};
    use crate::testing::{commitment_circuit, square_circuit};
    use ark_bn254::{Bn254, Fr};
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn rejects_unsatisfied_assignment() {
        let mut rng = StdRng::seed_from_u64(30);
        let c = square_circuit::<Fr>();
        let (pk, _) = setup::<Bn254, _, _>(&c.cs, &mut rng).unwrap();
        let err = prove(&pk, &c.cs, &c.assignment(3, 10), &mut rng).unwrap_err();
        assert!(matches!(err, ProveError::ConstraintSystem(R1csError::Unsatisfied(0))));
    }

    #[test]
    fn refuses_circuit_whose_reserved_coefficients_changed_after_setup() {
        let mut rng = StdRng::seed_from_u64(35);
        let mut c = square_circuit::<Fr>();
        let (pk, _) = setup::<Bn254, _, _>(&c.cs, &mut rng).unwrap();

        // 5x · 5x = 5y holds for (3, 45) when read through the table, but
        // QAP evaluation would still treat the id as 1.
        c.cs.coefficients[CoeffId::ONE.0 as usize] = Fr::from(5u64);
        let a = c.assignment(3, 45);
        assert!(c.cs.is_satisfied(&a).is_ok());
        let err = prove(&pk, &c.cs, &a, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            ProveError::ConstraintSystem(R1csError::ReservedCoefficient(1))
        ));
    }

    #[test]
    fn solves_commitment_wire_from_hash() {
        let mut rng = StdRng::seed_from_u64(31);
        let c = commitment_circuit::<Fr>();
        let (pk, _) = setup::<Bn254, _, _>(&c.cs, &mut rng).unwrap();
        let a = c.assignment(&pk, 4);

        let x = Fr::from(4u64);
        let commitment = pk.commitment_keys[0].commit(&[x]).unwrap();
        let want = commitment_hash::<Bn254>(&commitment, &[Fr::from(16u64)], DEFAULT_COMMITMENT_DST).unwrap();
        assert_eq!(a.get(&c.cs, c.commitment), want);
        c.cs.is_satisfied(&a).unwrap();
    }

    #[test]
    fn rejects_stale_commitment_wire() {
        let mut rng = StdRng::seed_from_u64(32);
        let c = commitment_circuit::<Fr>();
        let (pk, _) = setup::<Bn254, _, _>(&c.cs, &mut rng).unwrap();
        let a = c.assignment(&pk, 4);

        // satisfied under a different dst, but the wire no longer matches
        let err = prove_with_dst(&pk, &c.cs, &a, b"other", &mut rng).unwrap_err();
        assert!(matches!(err, ProveError::CommitmentWire { wire } if wire == c.cs.wire(c.commitment)));
    }

    #[test]
    fn quotient_divides_exactly() {
        let c = commitment_circuit::<Fr>();
        let domain = Domain::<Fr>::new(c.cs.nb_constraints()).unwrap();
        let mut values = vec![Fr::zero(); c.cs.nb_wires()];
        values[0] = Fr::one();
        let (x, y, cw) = (c.cs.wire(c.x), c.cs.wire(c.y), c.cs.wire(c.commitment));
        let (z, u) = (c.cs.wire(c.z), c.cs.wire(c.u));
        values[x] = Fr::from(3u64);
        values[y] = Fr::from(9u64);
        values[cw] = Fr::from(5u64);
        values[z] = Fr::from(15u64);
        values[u] = Fr::from(18u64 * 4);
        r1cs::is_satisfied(&c.cs, &values).unwrap();

        let mut h = quotient(&c.cs, &domain, &values).unwrap();
        assert_eq!(h.len(), domain.size() - 1);
        // undo the output permutation
        h.push(Fr::zero());
        bit_reverse(&mut h);

        // a(X)·b(X) − c(X) = h(X)·(Xᴺ − 1) at a point off the domain
        let t = Fr::from(1234u64);
        let q = crate::qap::evaluate_at(&c.cs, &domain, t).unwrap();
        let at = |v: &[Fr]| v.iter().zip(&values).map(|(p, w)| *p * w).sum::<Fr>();
        let lhs = at(&q.a) * at(&q.b) - at(&q.c);
        let h_t = h.iter().rev().fold(Fr::zero(), |acc, x| acc * t + x);
        assert_eq!(lhs, h_t * domain.vanishing_at(t));
    }

    #[test]
    fn dummy_key_proves_with_same_shape() {
        let mut rng = StdRng::seed_from_u64(33);
        let c = commitment_circuit::<Fr>();
        let (pk, _) = setup::<Bn254, _, _>(&c.cs, &mut rng).unwrap();
        let dummy = dummy_setup::<Bn254, _, _>(&c.cs, &mut rng).unwrap();
        let a = c.assignment(&dummy, 2);
        let proof = prove(&dummy, &c.cs, &a, &mut rng).unwrap();
        assert_eq!(proof.commitments.len(), pk.commitment_keys.len());
        assert!(proof.is_valid());
    }
}
