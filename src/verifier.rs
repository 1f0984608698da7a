//! Groth16 verification with Pedersen commitments
//!
//! ```text
//! e(Ar, Bs) · e(Krs, −δ) · e(K_sum, −γ) = e(α, β)
//! K_sum = K₀ + Σ wᵢ·Kᵢ + Σ Cⱼ
//! ```
//!
//! The public witness is extended with one hash per commitment,
//! `hash_to_field(dst, Cⱼ ‖ committed public values)`, before the MSM. One
//! rayon branch builds `K_sum` and runs its Miller loop against `−γ`; the
//! other runs the Miller loop over `(Krs, Ar)`, which does not depend on it.

#![forbid(unsafe_code)]

use ark_ec::{
    pairing::{MillerLoopOutput, Pairing},
    AffineRepr, CurveGroup, VariableBaseMSM,
};
use ark_ff::Zero;
use ark_serialize::CanonicalSerialize;
use std::time::Instant;
use tracing::debug;

use crate::pedersen::{self, PedersenError};
use crate::proof::Proof;
use crate::setup::VerifyingKey;
use crate::transcript::hash_to_field;

/// Domain separation tag for commitment-wire hashes.
pub const DEFAULT_COMMITMENT_DST: &[u8] = b"bsb22-commitment";

/// Verifier knobs. Prover and verifier must agree on `commitment_dst`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierOptions {
    /// Domain separation tag of the commitment-wire hash.
    pub commitment_dst: Vec<u8>,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            commitment_dst: DEFAULT_COMMITMENT_DST.to_vec(),
        }
    }
}

/// An arithmetic primitive refused its input.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PrimitiveFailure {
    /// Bases and scalars of different lengths.
    #[error("multi-scalar multiplication over {bases} bases and {scalars} scalars")]
    Msm {
        /// Number of bases.
        bases: usize,
        /// Number of scalars.
        scalars: usize,
    },
    /// The Miller loop output had no final exponentiation.
    #[error("final exponentiation failed")]
    FinalExponentiation,
    /// A point or scalar could not be serialized for hashing.
    #[error("point serialization failed")]
    Serialization,
}

/// Why a proof was rejected. See [`VerifyError::verdict`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VerifyError {
    /// Public witness length differs from the key's.
    #[error("public witness has {got} values, expected {expected}")]
    InputSizeMismatch {
        /// Values supplied.
        got: usize,
        /// Values the key expects.
        expected: usize,
    },
    /// Number of commitments differs from the key's.
    #[error("proof carries {got} commitments, expected {expected}")]
    CommitmentCount {
        /// Commitments in the proof.
        got: usize,
        /// Commitments the key expects.
        expected: usize,
    },
    /// A proof point is off-curve or outside the prime-order subgroup.
    #[error("proof point is not in the prime-order subgroup")]
    SubgroupViolation,
    /// An arithmetic primitive refused its input.
    #[error(transparent)]
    Primitive(#[from] PrimitiveFailure),
    /// The batched Pedersen proof of knowledge does not verify.
    #[error("commitment: {0}")]
    CommitmentVerification(#[from] PedersenError),
    /// The pairing product differs from `e(α, β)`.
    #[error("pairing check failed")]
    PairingMismatch,
}

/// Coarse classification of a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Well-formed input that does not prove the statement.
    Invalid,
    /// Input with the wrong shape for this key, or an arithmetic primitive
    /// that refused it.
    Malformed,
}

impl VerifyError {
    /// Splits rejections into "does not prove the statement" and "could not
    /// be checked". Neither is ever a success.
    pub fn verdict(&self) -> Verdict {
        match self {
            VerifyError::InputSizeMismatch { .. }
            | VerifyError::CommitmentCount { .. }
            | VerifyError::Primitive(_) => Verdict::Malformed,
            VerifyError::SubgroupViolation
            | VerifyError::CommitmentVerification(_)
            | VerifyError::PairingMismatch => Verdict::Invalid,
        }
    }
}

/// `hash_to_field(dst, commitment ‖ public values)`.
///
/// The commitment is serialized uncompressed, the values in canonical form.
pub fn commitment_hash<E: Pairing>(
    commitment: &E::G1Affine,
    public_values: &[E::ScalarField],
    dst: &[u8],
) -> Result<E::ScalarField, PrimitiveFailure> {
    let mut msg = Vec::with_capacity(commitment.uncompressed_size() + 32 * public_values.len());
    commitment
        .serialize_uncompressed(&mut msg)
        .map_err(|_| PrimitiveFailure::Serialization)?;
    for v in public_values {
        v.serialize_compressed(&mut msg)
            .map_err(|_| PrimitiveFailure::Serialization)?;
    }
    Ok(hash_to_field(dst, &msg))
}

/// Concatenated commitment hashes, used to seed the Pedersen fold.
pub fn commitment_seeds<F: CanonicalSerialize>(hashes: &[F]) -> Result<Vec<u8>, PrimitiveFailure> {
    let mut out = Vec::new();
    for h in hashes {
        h.serialize_compressed(&mut out)
            .map_err(|_| PrimitiveFailure::Serialization)?;
    }
    Ok(out)
}

/// Public witness followed by the commitment hashes. Also returns the
/// hashes on their own.
pub fn extend_public_witness<E: Pairing>(
    vk: &VerifyingKey<E>,
    commitments: &[E::G1Affine],
    public: &[E::ScalarField],
    dst: &[u8],
) -> Result<(Vec<E::ScalarField>, Vec<E::ScalarField>), VerifyError> {
    if commitments.len() != vk.nb_commitments() {
        return Err(VerifyError::CommitmentCount {
            got: commitments.len(),
            expected: vk.nb_commitments(),
        });
    }
    let mut extended = Vec::with_capacity(public.len() + commitments.len());
    extended.extend_from_slice(public);
    let mut hashes = Vec::with_capacity(commitments.len());
    for (c, positions) in commitments.iter().zip(vk.public_and_commitment_committed()) {
        let values = positions
            .iter()
            .map(|&p| {
                extended
                    .get(p.wrapping_sub(1))
                    .copied()
                    .ok_or(VerifyError::InputSizeMismatch {
                        got: extended.len(),
                        expected: p,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let h = commitment_hash::<E>(c, &values, dst)?;
        extended.push(h);
        hashes.push(h);
    }
    Ok((extended, hashes))
}

/// `K₀ + Σ wᵢ·Kᵢ₊₁ + Σ Cⱼ` over the extended witness.
pub fn public_accumulator<E: Pairing>(
    vk: &VerifyingKey<E>,
    extended: &[E::ScalarField],
    commitments: &[E::G1Affine],
) -> Result<E::G1, VerifyError> {
    let k = vk.k();
    if k.len() != extended.len() + 1 {
        return Err(VerifyError::InputSizeMismatch {
            got: extended.len(),
            expected: k.len().saturating_sub(1),
        });
    }
    let mut acc = if extended.is_empty() {
        E::G1::zero()
    } else {
        E::G1::msm(&k[1..], extended).map_err(|_| PrimitiveFailure::Msm {
            bases: k.len() - 1,
            scalars: extended.len(),
        })?
    };
    acc += k[0].into_group();
    for c in commitments {
        acc += c.into_group();
    }
    Ok(acc)
}

/// Extends the witness, checks the folded commitments against their proof of
/// knowledge and returns `K_sum`.
pub(crate) fn prepare_public<E: Pairing>(
    vk: &VerifyingKey<E>,
    proof: &Proof<E>,
    public: &[E::ScalarField],
    opts: &VerifierOptions,
) -> Result<E::G1, VerifyError> {
    let (extended, hashes) = extend_public_witness(vk, &proof.commitments, public, &opts.commitment_dst)?;
    if vk.nb_commitments() > 0 {
        let seeds = commitment_seeds(&hashes)?;
        let folded = pedersen::fold_commitments::<E>(&proof.commitments, &seeds);
        vk.commitment_key().verify(&folded, &proof.commitment_pok)?;
    }
    public_accumulator(vk, &extended, &proof.commitments)
}

pub(crate) fn check_shape<E: Pairing>(
    vk: &VerifyingKey<E>,
    proof: &Proof<E>,
    public: &[E::ScalarField],
) -> Result<(), VerifyError> {
    if public.len() != vk.nb_public_witness() {
        return Err(VerifyError::InputSizeMismatch {
            got: public.len(),
            expected: vk.nb_public_witness(),
        });
    }
    if proof.commitments.len() != vk.nb_commitments() {
        return Err(VerifyError::CommitmentCount {
            got: proof.commitments.len(),
            expected: vk.nb_commitments(),
        });
    }
    if !proof.is_valid() {
        return Err(VerifyError::SubgroupViolation);
    }
    Ok(())
}

/// Verifies `proof` against `public` (ONE wire excluded) with default options.
pub fn verify<E: Pairing>(
    vk: &VerifyingKey<E>,
    proof: &Proof<E>,
    public: &[E::ScalarField],
) -> Result<(), VerifyError> {
    verify_with_options(vk, proof, public, &VerifierOptions::default())
}

/// [`verify`] with an explicit commitment DST.
pub fn verify_with_options<E: Pairing>(
    vk: &VerifyingKey<E>,
    proof: &Proof<E>,
    public: &[E::ScalarField],
    opts: &VerifierOptions,
) -> Result<(), VerifyError> {
    let start = Instant::now();
    check_shape(vk, proof, public)?;

    let (public_ml, proof_ml) = rayon::join(
        || {
            let k_sum = prepare_public(vk, proof, public, opts)?.into_affine();
            Ok::<_, VerifyError>(E::multi_miller_loop([k_sum], [vk.gamma_neg()]))
        },
        || E::multi_miller_loop([proof.krs, proof.ar], [vk.delta_neg(), proof.bs]),
    );
    let public_ml = public_ml?;

    let out = E::final_exponentiation(MillerLoopOutput(proof_ml.0 * public_ml.0))
        .ok_or(PrimitiveFailure::FinalExponentiation)?;
    debug!(elapsed = ?start.elapsed(), public = public.len(), "groth16 verify");
    if out != vk.e() {
        return Err(VerifyError::PairingMismatch);
    }
    Ok(())
}
