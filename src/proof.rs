//! Groth16 proof with Pedersen commitments

#![forbid(unsafe_code)]

use ark_ec::pairing::Pairing;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, Valid};

/// `(Ar, Bs, Krs)` plus one commitment per declared commitment group and a
/// single batched proof of knowledge for all of them.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct Proof<E: Pairing> {
    /// `[A]₁`
    pub ar: E::G1Affine,
    /// `[B]₂`
    pub bs: E::G2Affine,
    /// `[C]₁`
    pub krs: E::G1Affine,
    /// One Pedersen commitment per commitment group.
    pub commitments: Vec<E::G1Affine>,
    /// Batched proof of knowledge for `commitments`.
    pub commitment_pok: E::G1Affine,
}

impl<E: Pairing> Proof<E> {
    /// Every point is on its curve and in the prime-order subgroup.
    pub fn is_valid(&self) -> bool {
        self.ar.check().is_ok()
            && self.bs.check().is_ok()
            && self.krs.check().is_ok()
            && self.commitments.iter().all(|c| c.check().is_ok())
            && self.commitment_pok.check().is_ok()
    }
}
