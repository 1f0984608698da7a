//! Folding accumulator for Groth16 proofs under one verifying key
//!
//! An accumulator `(A, B, C; mu, H, E)` satisfies the relaxed relation
//!
//! ```text
//! e(A, B) · e(C, −δ)^mu · e(H, −γ)^mu · e(α, β)^(−mu²) = E
//! ```
//!
//! A fresh proof is `(Ar, Bs, Krs; 1, K_sum, 1)`. Two accumulators fold with a
//! challenge `r` into
//!
//! ```text
//! X  = X₁ + r·X₂                      for A, B, C, H, mu
//! E  = E₁ · T^r · E₂^(r²)
//! T  = e(A₁, B₂) · e(A₂, B₁) · e(mu₂C₁ + mu₁C₂, −δ) · e(mu₂H₁ + mu₁H₂, −γ)
//!      · e(α, β)^(−2·mu₁·mu₂)
//! ```
//!
//! so [`verify_folded`] checks any number of proofs with a single final
//! exponentiation. Each proof's folded Pedersen commitment and its proof of
//! knowledge are combined with the same `r`; both sides of the Pedersen check
//! are linear, so the folded pair still verifies.
//!
//! `r` comes from a BLAKE3 transcript over the verifying key digest, both
//! accumulators and `T` ([`FiatShamir`]). A caller-chosen `r` lets a prover
//! cancel an invalid proof against a crafted one; the deterministic
//! [`FixedChallenge`] only exists behind the `insecure-fixed-challenge`
//! feature.
//!
//! `GT` is written additively, as [`PairingOutput`] does: `+` is the group
//! product and `* s` exponentiation.

#![forbid(unsafe_code)]

use ark_ec::{
    pairing::{Pairing, PairingOutput},
    AffineRepr, CurveGroup,
};
use ark_ff::{Field, One, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, Valid};
use std::time::Instant;
use tracing::debug;

use crate::pedersen;
use crate::proof::Proof;
use crate::setup::VerifyingKey;
use crate::transcript::{FsLabel, Transcript};
use crate::verifier::{self, PrimitiveFailure, VerifierOptions, VerifyError};

/// Errors surfaced while folding or replaying a fold.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FoldError {
    /// No proofs were given.
    #[error("nothing to fold")]
    Empty,
    /// Proofs, witnesses and folding steps do not line up.
    #[error("history has {proofs} proofs, {witnesses} witnesses and {parameters} folding steps")]
    HistoryLength {
        /// Number of proofs.
        proofs: usize,
        /// Number of public witnesses.
        witnesses: usize,
        /// Number of recorded folding steps.
        parameters: usize,
    },
    /// A fresh proof must enter with `mu = 1`.
    #[error("proof {index} enters the fold with a weight other than one")]
    NonUnitWeight {
        /// Position of the proof in the history.
        index: usize,
    },
    /// A recomputed `(T, r)` differs from the recorded one.
    #[error("folding step {step} does not match its recorded parameters")]
    ChallengeMismatch {
        /// Zero-based folding step.
        step: usize,
    },
    /// A fresh proof was rejected on its own.
    #[error(transparent)]
    Verify(#[from] VerifyError),
}

/// Public inputs of one proof (ONE wire excluded) and its folding weight.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct PublicWitness<E: Pairing> {
    /// Public inputs, commitment hashes excluded.
    pub public: Vec<E::ScalarField>,
    /// Folding weight.
    pub mu: E::ScalarField,
}

impl<E: Pairing> PublicWitness<E> {
    /// Witness of a fresh proof, `mu = 1`.
    pub fn new(public: Vec<E::ScalarField>) -> Self {
        Self {
            public,
            mu: E::ScalarField::one(),
        }
    }
}

/// Random linear combination of proofs.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct FoldedProof<E: Pairing> {
    /// `[A]₁`
    pub ar: E::G1Affine,
    /// `[B]₂`
    pub bs: E::G2Affine,
    /// `[C]₁`
    pub krs: E::G1Affine,
    /// Folded Pedersen commitment (identity without commitments).
    pub commitment: E::G1Affine,
    /// Proof of knowledge for `commitment`.
    pub commitment_pok: E::G1Affine,
}

/// Record of one fold: the cross term and the challenge.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct FoldingParameters<E: Pairing> {
    /// Cross term `T`.
    pub t: PairingOutput<E>,
    /// Challenge `r`.
    pub r: E::ScalarField,
}

/// `{mu, H, E}` of the relaxed relation.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct FoldedWitness<E: Pairing> {
    /// Folded weight.
    pub mu: E::ScalarField,
    /// Folded public accumulator `K_sum`.
    pub h: E::G1Affine,
    /// Error term in `GT`.
    pub e: PairingOutput<E>,
}

/// A folded proof together with the witness it satisfies.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct Accumulator<E: Pairing> {
    /// Folded proof points.
    pub proof: FoldedProof<E>,
    /// Relaxed witness.
    pub witness: FoldedWitness<E>,
}

// ============================================================================
// Challenges
// ============================================================================

/// Source of the folding challenge `r`.
pub trait ChallengeOracle<E: Pairing> {
    /// Draws `r` for folding `right` into `left`.
    fn challenge(
        &self,
        vk: &VerifyingKey<E>,
        left: &Accumulator<E>,
        right: &Accumulator<E>,
        t: &PairingOutput<E>,
    ) -> E::ScalarField;
}

/// `r = H(vk digest ‖ left ‖ right ‖ T)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FiatShamir;

impl<E: Pairing> ChallengeOracle<E> for FiatShamir {
    fn challenge(
        &self,
        vk: &VerifyingKey<E>,
        left: &Accumulator<E>,
        right: &Accumulator<E>,
        t: &PairingOutput<E>,
    ) -> E::ScalarField {
        let mut tr = Transcript::new("groth16-fold.fold");
        tr.absorb_bytes_l(FsLabel::VerifyingKey, &vk.digest());
        tr.absorb_serializable_l(FsLabel::LeftProof, &left.proof);
        tr.absorb_serializable_l(FsLabel::LeftWitness, &left.witness);
        tr.absorb_serializable_l(FsLabel::RightProof, &right.proof);
        tr.absorb_serializable_l(FsLabel::RightWitness, &right.witness);
        tr.absorb_serializable_l(FsLabel::CrossTerm, t);
        tr.challenge_l(FsLabel::FoldChallenge)
    }
}

/// Constant challenge. Unsound against a folding adversary.
#[cfg(feature = "insecure-fixed-challenge")]
#[derive(Clone, Copy, Debug)]
pub struct FixedChallenge(pub u64);

#[cfg(feature = "insecure-fixed-challenge")]
impl<E: Pairing> ChallengeOracle<E> for FixedChallenge {
    fn challenge(
        &self,
        _vk: &VerifyingKey<E>,
        _left: &Accumulator<E>,
        _right: &Accumulator<E>,
        _t: &PairingOutput<E>,
    ) -> E::ScalarField {
        tracing::warn!(r = self.0, "folding with a fixed challenge");
        E::ScalarField::from(self.0)
    }
}

// ============================================================================
// Folding
// ============================================================================

impl<E: Pairing> FoldedProof<E> {
    /// Every point is on its curve and in the prime-order subgroup.
    pub fn is_valid(&self) -> bool {
        self.ar.check().is_ok()
            && self.bs.check().is_ok()
            && self.krs.check().is_ok()
            && self.commitment.check().is_ok()
            && self.commitment_pok.check().is_ok()
    }

    /// `self + r·other`, component-wise.
    pub fn combine(&self, other: &Self, r: E::ScalarField) -> Self {
        let g1 = E::G1::normalize_batch(&[
            self.ar.into_group() + other.ar * r,
            self.krs.into_group() + other.krs * r,
            self.commitment.into_group() + other.commitment * r,
            self.commitment_pok.into_group() + other.commitment_pok * r,
        ]);
        Self {
            ar: g1[0],
            bs: (self.bs.into_group() + other.bs * r).into_affine(),
            krs: g1[1],
            commitment: g1[2],
            commitment_pok: g1[3],
        }
    }
}

impl<E: Pairing> FoldedWitness<E> {
    /// `mu = mu₁ + r·mu₂`, `H = H₁ + r·H₂`, `E = E₁ · T^r · E₂^(r²)`.
    pub fn fold(left: &Self, right: &Self, params: &FoldingParameters<E>) -> Self {
        let r = params.r;
        Self {
            mu: left.mu + r * right.mu,
            h: (left.h.into_group() + right.h * r).into_affine(),
            e: left.e + params.t * r + right.e * r.square(),
        }
    }
}

impl<E: Pairing> Accumulator<E> {
    /// Accumulator of a single proof with default verifier options.
    pub fn fresh(vk: &VerifyingKey<E>, proof: &Proof<E>, witness: &PublicWitness<E>) -> Result<Self, FoldError> {
        Self::fresh_with_options(vk, proof, witness, &VerifierOptions::default())
    }

    /// `(Ar, Bs, Krs; 1, K_sum, 1)`. The proof's commitments are folded
    /// exactly as [`verifier::verify`] folds them, but their proof of
    /// knowledge is only checked by [`verify_folded`].
    pub fn fresh_with_options(
        vk: &VerifyingKey<E>,
        proof: &Proof<E>,
        witness: &PublicWitness<E>,
        opts: &VerifierOptions,
    ) -> Result<Self, FoldError> {
        fresh_at(vk, proof, witness, opts, 0)
    }

    /// Folds `right` into `self` with a Fiat–Shamir challenge.
    pub fn fold(&self, vk: &VerifyingKey<E>, right: &Self) -> Result<(Self, FoldingParameters<E>), FoldError> {
        self.fold_with(vk, right, &FiatShamir)
    }

    /// [`fold`](Self::fold) with a caller-supplied challenge oracle.
    pub fn fold_with<O: ChallengeOracle<E>>(
        &self,
        vk: &VerifyingKey<E>,
        right: &Self,
        oracle: &O,
    ) -> Result<(Self, FoldingParameters<E>), FoldError> {
        let (proof, params) = fold_proofs_with(vk, self, right, oracle)?;
        let witness = FoldedWitness::fold(&self.witness, &right.witness, &params);
        Ok((Self { proof, witness }, params))
    }

    /// Same as [`verify_folded`].
    pub fn verify(&self, vk: &VerifyingKey<E>) -> Result<(), VerifyError> {
        verify_folded(vk, &self.proof, &self.witness)
    }
}

fn fresh_at<E: Pairing>(
    vk: &VerifyingKey<E>,
    proof: &Proof<E>,
    witness: &PublicWitness<E>,
    opts: &VerifierOptions,
    index: usize,
) -> Result<Accumulator<E>, FoldError> {
    if !witness.mu.is_one() {
        return Err(FoldError::NonUnitWeight { index });
    }
    verifier::check_shape(vk, proof, &witness.public)?;
    let (extended, hashes) =
        verifier::extend_public_witness(vk, &proof.commitments, &witness.public, &opts.commitment_dst)?;
    let seeds = verifier::commitment_seeds(&hashes).map_err(VerifyError::from)?;
    let h = verifier::public_accumulator(vk, &extended, &proof.commitments)?;
    Ok(Accumulator {
        proof: FoldedProof {
            ar: proof.ar,
            bs: proof.bs,
            krs: proof.krs,
            commitment: pedersen::fold_commitments::<E>(&proof.commitments, &seeds),
            commitment_pok: proof.commitment_pok,
        },
        witness: FoldedWitness {
            mu: E::ScalarField::one(),
            h: h.into_affine(),
            e: PairingOutput::zero(),
        },
    })
}

/// `T` for folding `right` into `left`.
fn cross_term<E: Pairing>(
    vk: &VerifyingKey<E>,
    left: &Accumulator<E>,
    right: &Accumulator<E>,
) -> Result<PairingOutput<E>, VerifyError> {
    let (mu1, mu2) = (left.witness.mu, right.witness.mu);
    let g1 = E::G1::normalize_batch(&[
        left.proof.krs * mu2 + right.proof.krs * mu1,
        left.witness.h * mu2 + right.witness.h * mu1,
    ]);
    let ml = E::multi_miller_loop(
        [left.proof.ar, right.proof.ar, g1[0], g1[1]],
        [right.proof.bs, left.proof.bs, vk.delta_neg(), vk.gamma_neg()],
    );
    let t = E::final_exponentiation(ml).ok_or(PrimitiveFailure::FinalExponentiation)?;
    Ok(t + vk.e() * (-(mu1 * mu2).double()))
}

/// Folds two accumulators' proofs with a Fiat–Shamir challenge.
pub fn fold_proofs<E: Pairing>(
    vk: &VerifyingKey<E>,
    left: &Accumulator<E>,
    right: &Accumulator<E>,
) -> Result<(FoldedProof<E>, FoldingParameters<E>), FoldError> {
    fold_proofs_with(vk, left, right, &FiatShamir)
}

/// [`fold_proofs`] with a caller-supplied challenge oracle.
pub fn fold_proofs_with<E: Pairing, O: ChallengeOracle<E>>(
    vk: &VerifyingKey<E>,
    left: &Accumulator<E>,
    right: &Accumulator<E>,
    oracle: &O,
) -> Result<(FoldedProof<E>, FoldingParameters<E>), FoldError> {
    let start = Instant::now();
    if !left.proof.is_valid() || !right.proof.is_valid() {
        return Err(VerifyError::SubgroupViolation.into());
    }
    let t = cross_term(vk, left, right)?;
    let r = oracle.challenge(vk, left, right, &t);
    let proof = left.proof.combine(&right.proof, r);
    debug!(elapsed = ?start.elapsed(), "fold step");
    Ok((proof, FoldingParameters { t, r }))
}

/// Folds `proofs` left to right into one accumulator and returns the
/// parameters of every step.
pub fn fold_all<E: Pairing>(
    vk: &VerifyingKey<E>,
    proofs: &[Proof<E>],
    witnesses: &[PublicWitness<E>],
) -> Result<(Accumulator<E>, Vec<FoldingParameters<E>>), FoldError> {
    fold_all_with(vk, proofs, witnesses, &VerifierOptions::default(), &FiatShamir)
}

/// [`fold_all`] with explicit verifier options and challenge oracle.
pub fn fold_all_with<E: Pairing, O: ChallengeOracle<E>>(
    vk: &VerifyingKey<E>,
    proofs: &[Proof<E>],
    witnesses: &[PublicWitness<E>],
    opts: &VerifierOptions,
    oracle: &O,
) -> Result<(Accumulator<E>, Vec<FoldingParameters<E>>), FoldError> {
    let start = Instant::now();
    if proofs.is_empty() {
        return Err(FoldError::Empty);
    }
    if proofs.len() != witnesses.len() {
        return Err(FoldError::HistoryLength {
            proofs: proofs.len(),
            witnesses: witnesses.len(),
            parameters: proofs.len() - 1,
        });
    }
    let mut acc = fresh_at(vk, &proofs[0], &witnesses[0], opts, 0)?;
    let mut params = Vec::with_capacity(proofs.len() - 1);
    for (i, (p, w)) in proofs.iter().zip(witnesses).enumerate().skip(1) {
        let next = fresh_at(vk, p, w, opts, i)?;
        let (folded, step) = acc.fold_with(vk, &next, oracle)?;
        acc = folded;
        params.push(step);
    }
    debug!(proofs = proofs.len(), elapsed = ?start.elapsed(), "fold_all");
    Ok((acc, params))
}

/// Folding parameters of [`fold_all`], without the accumulator.
pub fn get_folding_parameters<E: Pairing>(
    vk: &VerifyingKey<E>,
    proofs: &[Proof<E>],
    witnesses: &[PublicWitness<E>],
) -> Result<Vec<FoldingParameters<E>>, FoldError> {
    Ok(fold_all(vk, proofs, witnesses)?.1)
}

/// Rebuilds `{mu, H, E}` of a left-to-right fold from the full history.
///
/// Every step's cross term and challenge are recomputed and compared with the
/// recorded parameters; a tampered or reordered history fails at the first
/// step that disagrees.
pub fn fold_witnesses<E: Pairing>(
    vk: &VerifyingKey<E>,
    proofs: &[Proof<E>],
    witnesses: &[PublicWitness<E>],
    params: &[FoldingParameters<E>],
) -> Result<FoldedWitness<E>, FoldError> {
    fold_witnesses_with(vk, proofs, witnesses, params, &VerifierOptions::default(), &FiatShamir)
}

/// [`fold_witnesses`] with explicit verifier options and challenge oracle.
pub fn fold_witnesses_with<E: Pairing, O: ChallengeOracle<E>>(
    vk: &VerifyingKey<E>,
    proofs: &[Proof<E>],
    witnesses: &[PublicWitness<E>],
    params: &[FoldingParameters<E>],
    opts: &VerifierOptions,
    oracle: &O,
) -> Result<FoldedWitness<E>, FoldError> {
    if proofs.is_empty() {
        return Err(FoldError::Empty);
    }
    if proofs.len() != witnesses.len() || params.len() + 1 != proofs.len() {
        return Err(FoldError::HistoryLength {
            proofs: proofs.len(),
            witnesses: witnesses.len(),
            parameters: params.len(),
        });
    }
    let mut acc = fresh_at(vk, &proofs[0], &witnesses[0], opts, 0)?;
    for (step, recorded) in params.iter().enumerate() {
        let i = step + 1;
        let next = fresh_at(vk, &proofs[i], &witnesses[i], opts, i)?;
        let (proof, derived) = fold_proofs_with(vk, &acc, &next, oracle)?;
        if derived != *recorded {
            return Err(FoldError::ChallengeMismatch { step });
        }
        acc = Accumulator {
            proof,
            witness: FoldedWitness::fold(&acc.witness, &next.witness, recorded),
        };
    }
    Ok(acc.witness)
}

/// One final exponentiation over the relaxed relation and the folded
/// Pedersen check, the latter weighted by a transcript challenge `ρ`:
///
/// ```text
/// e(A, B) · e(mu·C, −δ) · e(mu·H, −γ) · e(ρ·Cm, g) · e(ρ·pok, −g/σ) = E · e(α, β)^(mu²)
/// ```
pub fn verify_folded<E: Pairing>(
    vk: &VerifyingKey<E>,
    proof: &FoldedProof<E>,
    witness: &FoldedWitness<E>,
) -> Result<(), VerifyError> {
    let start = Instant::now();
    if !proof.is_valid() || witness.h.check().is_err() {
        return Err(VerifyError::SubgroupViolation);
    }

    let mut tr = Transcript::new("groth16-fold.verify");
    tr.absorb_bytes_l(FsLabel::VerifyingKey, &vk.digest());
    tr.absorb_serializable_l(FsLabel::FoldedProof, proof);
    tr.absorb_serializable_l(FsLabel::FoldedWitness, witness);
    let rho: E::ScalarField = tr.challenge_l(FsLabel::BatchChallenge);

    let mu = witness.mu;
    let g1 = E::G1::normalize_batch(&[
        proof.krs * mu,
        witness.h * mu,
        proof.commitment * rho,
        proof.commitment_pok * rho,
    ]);
    let ck = vk.commitment_key();
    let ml = E::multi_miller_loop(
        [proof.ar, g1[0], g1[1], g1[2], g1[3]],
        [proof.bs, vk.delta_neg(), vk.gamma_neg(), ck.g, ck.g_sigma_neg],
    );
    let lhs = E::final_exponentiation(ml).ok_or(PrimitiveFailure::FinalExponentiation)?;
    let rhs = witness.e + vk.e() * mu.square();
    debug!(elapsed = ?start.elapsed(), "verify folded");
    if lhs != rhs {
        return Err(VerifyError::PairingMismatch);
    }
    Ok(())
}
