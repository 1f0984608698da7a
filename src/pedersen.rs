//! Pedersen vector commitments with proof of knowledge
//!
//! Each commitment group gets its own basis `G_i`; all groups share one secret
//! `σ`. The proving key carries `G_i` and `σ·G_i`, the verifying key a random
//! `g ∈ G2` and `−g/σ`:
//!
//! ```text
//! C   = Σ vᵢ·Gᵢ
//! pok = Σ vᵢ·σGᵢ = σ·C
//! e(C, g) · e(pok, −g/σ) = 1
//! ```
//!
//! Several commitments are checked at once by folding them with powers of a
//! challenge `r = H(commitments ‖ seeds)`; the matching batched proof of
//! knowledge folds the individual ones with the same powers.

#![forbid(unsafe_code)]

use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup, VariableBaseMSM};
use ark_ff::{Field, One, UniformRand, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, Valid};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::transcript::hash_to_field;

const FOLD_DST: &[u8] = b"G16FOLD.pedersen.fold";

/// Per-group commitment key.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct ProvingKey<E: Pairing> {
    /// `Gᵢ`
    pub basis: Vec<E::G1Affine>,
    /// `σ·Gᵢ`
    pub basis_exp_sigma: Vec<E::G1Affine>,
}

/// Shared verification key.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct VerifyingKey<E: Pairing> {
    /// Random `G2` point `g`, shared by every group.
    pub g: E::G2Affine,
    /// `−g/σ`
    pub g_sigma_neg: E::G2Affine,
}

/// Errors of the commitment scheme.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PedersenError {
    /// Value count differs from the basis length.
    #[error("expected {expected} values, got {got}")]
    LengthMismatch {
        /// Basis length.
        expected: usize,
        /// Values supplied.
        got: usize,
    },
    /// MSM over the given length failed.
    #[error("multi-scalar multiplication failed on length {0}")]
    Msm(usize),
    /// Point outside the prime-order subgroup.
    #[error("commitment or proof of knowledge is not in the prime-order subgroup")]
    NotInSubgroup,
    /// `e(C, g)·e(pok, −g/σ) ≠ 1`.
    #[error("proof of knowledge does not verify")]
    KnowledgeProof,
}

/// One key per basis, sharing a fresh `σ` and `g`.
pub fn setup<E, R>(
    bases: &[Vec<E::G1Affine>],
    rng: &mut R,
) -> Result<(Vec<ProvingKey<E>>, VerifyingKey<E>), PedersenError>
where
    E: Pairing,
    R: RngCore + CryptoRng,
{
    let mut sigma = E::ScalarField::zero();
    while sigma.is_zero() {
        sigma = E::ScalarField::rand(rng);
    }
    let mut g = E::G2::zero();
    while g.is_zero() {
        g = E::G2::rand(rng);
    }

    let mut sigma_inv = sigma.inverse().ok_or(PedersenError::KnowledgeProof)?;
    let g_sigma_neg = (-(g * sigma_inv)).into_affine();

    let pks = bases
        .iter()
        .map(|basis| {
            let scaled: Vec<E::G1> = basis.iter().map(|b| *b * sigma).collect();
            ProvingKey {
                basis: basis.clone(),
                basis_exp_sigma: E::G1::normalize_batch(&scaled),
            }
        })
        .collect();

    sigma.zeroize();
    sigma_inv.zeroize();

    Ok((
        pks,
        VerifyingKey {
            g: g.into_affine(),
            g_sigma_neg,
        },
    ))
}

fn msm<E: Pairing>(bases: &[E::G1Affine], values: &[E::ScalarField]) -> Result<E::G1, PedersenError> {
    if bases.len() != values.len() {
        return Err(PedersenError::LengthMismatch {
            expected: bases.len(),
            got: values.len(),
        });
    }
    if bases.is_empty() {
        return Ok(E::G1::zero());
    }
    E::G1::msm(bases, values).map_err(PedersenError::Msm)
}

impl<E: Pairing> ProvingKey<E> {
    /// `Σ vᵢ·Gᵢ`
    pub fn commit(&self, values: &[E::ScalarField]) -> Result<E::G1Affine, PedersenError> {
        Ok(msm::<E>(&self.basis, values)?.into_affine())
    }

    /// `Σ vᵢ·σGᵢ`
    pub fn prove_knowledge(&self, values: &[E::ScalarField]) -> Result<E::G1Affine, PedersenError> {
        Ok(msm::<E>(&self.basis_exp_sigma, values)?.into_affine())
    }
}

/// Challenge binding the commitments to caller-provided seed bytes.
pub fn fold_challenge<E: Pairing>(commitments: &[E::G1Affine], seeds: &[u8]) -> E::ScalarField {
    let mut msg = Vec::new();
    // Writing valid points into a Vec cannot fail.
    commitments
        .serialize_uncompressed(&mut msg)
        .expect("serialize into Vec");
    msg.extend_from_slice(seeds);
    hash_to_field(FOLD_DST, &msg)
}

// Σ rⁱ·pᵢ
fn fold_with_powers<E: Pairing>(points: &[E::G1Affine], r: E::ScalarField) -> E::G1Affine {
    let mut acc = E::G1::zero();
    let mut ri = E::ScalarField::one();
    for p in points {
        acc += *p * ri;
        ri *= r;
    }
    acc.into_affine()
}

/// Folds commitments into one, `Σ rⁱ·Cᵢ`.
pub fn fold_commitments<E: Pairing>(commitments: &[E::G1Affine], seeds: &[u8]) -> E::G1Affine {
    match commitments {
        [] => E::G1Affine::zero(),
        [c] => *c,
        _ => fold_with_powers::<E>(commitments, fold_challenge::<E>(commitments, seeds)),
    }
}

/// Proof of knowledge for `fold_commitments(commitments, seeds)`.
pub fn batch_prove<E: Pairing>(
    pks: &[ProvingKey<E>],
    values: &[Vec<E::ScalarField>],
    commitments: &[E::G1Affine],
    seeds: &[u8],
) -> Result<E::G1Affine, PedersenError> {
    if pks.len() != values.len() || pks.len() != commitments.len() {
        return Err(PedersenError::LengthMismatch {
            expected: pks.len(),
            got: values.len().min(commitments.len()),
        });
    }
    let poks = pks
        .iter()
        .zip(values)
        .map(|(pk, v)| pk.prove_knowledge(v))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(match poks.as_slice() {
        [] => E::G1Affine::zero(),
        [p] => *p,
        _ => fold_with_powers::<E>(&poks, fold_challenge::<E>(commitments, seeds)),
    })
}

impl<E: Pairing> VerifyingKey<E> {
    /// `e(C, g) · e(pok, −g/σ) = 1`
    pub fn verify(&self, commitment: &E::G1Affine, pok: &E::G1Affine) -> Result<(), PedersenError> {
        if commitment.check().is_err() || pok.check().is_err() {
            return Err(PedersenError::NotInSubgroup);
        }
        let ml = E::multi_miller_loop([*commitment, *pok], [self.g, self.g_sigma_neg]);
        match E::final_exponentiation(ml) {
            Some(out) if out.is_zero() => Ok(()),
            _ => Err(PedersenError::KnowledgeProof),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::{Bn254, Fr, G1Affine, G1Projective};
    use rand::{rngs::StdRng, SeedableRng};

    fn random_bases(rng: &mut StdRng, sizes: &[usize]) -> Vec<Vec<G1Affine>> {
        sizes
            .iter()
            .map(|n| (0..*n).map(|_| G1Projective::rand(rng).into_affine()).collect())
            .collect()
    }

    #[test]
    fn commit_and_prove_knowledge() {
        let mut rng = StdRng::seed_from_u64(1);
        let bases = random_bases(&mut rng, &[3]);
        let (pks, vk) = setup::<Bn254, _>(&bases, &mut rng).unwrap();

        let values: Vec<Fr> = (1..=3u64).map(Fr::from).collect();
        let c = pks[0].commit(&values).unwrap();
        let pok = pks[0].prove_knowledge(&values).unwrap();
        vk.verify(&c, &pok).unwrap();

        // proof for other values
        let other = pks[0].prove_knowledge(&[Fr::from(9u64), Fr::one(), Fr::one()]).unwrap();
        assert_eq!(vk.verify(&c, &other), Err(PedersenError::KnowledgeProof));
    }

    #[test]
    fn folded_commitments_verify_with_batched_proof() {
        let mut rng = StdRng::seed_from_u64(2);
        let bases = random_bases(&mut rng, &[2, 1]);
        let (pks, vk) = setup::<Bn254, _>(&bases, &mut rng).unwrap();

        let values = vec![vec![Fr::from(5u64), Fr::from(6u64)], vec![Fr::from(7u64)]];
        let commitments: Vec<G1Affine> = pks
            .iter()
            .zip(&values)
            .map(|(pk, v)| pk.commit(v).unwrap())
            .collect();
        let seeds = b"seeds";

        let folded = fold_commitments::<Bn254>(&commitments, seeds);
        let pok = batch_prove(&pks, &values, &commitments, seeds).unwrap();
        vk.verify(&folded, &pok).unwrap();

        // seeds are bound into the challenge
        let refolded = fold_commitments::<Bn254>(&commitments, b"other");
        assert!(vk.verify(&refolded, &pok).is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        let mut rng = StdRng::seed_from_u64(3);
        let bases = random_bases(&mut rng, &[2]);
        let (pks, _) = setup::<Bn254, _>(&bases, &mut rng).unwrap();
        assert_eq!(
            pks[0].commit(&[Fr::one()]),
            Err(PedersenError::LengthMismatch { expected: 2, got: 1 })
        );
    }
}
