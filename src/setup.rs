//! Trusted setup: toxic waste → proving & verifying keys
//!
//! ## Flow
//!
//! 1. Sample [`ToxicWaste`] `{t, α, β, γ, δ}` (all non-zero, `t ∉ H`).
//! 2. Evaluate the QAP at `t` ([`crate::qap::evaluate_at`]).
//! 3. Classify every wire:
//!    - public inputs and commitment wires → `vk.K`, scaled by `γ⁻¹`;
//!    - privately committed wires → the Pedersen basis of their group (`γ⁻¹`);
//!    - everything else → `pk.K`, scaled by `δ⁻¹`;
//!
//!    each entry being `β·A[w] + α·B[w] + C[w]`.
//! 4. `Z[i] = (tᴺ − 1)/δ · tⁱ`, published in bit-reversed order and truncated
//!    to `N − 1` entries (`deg h ≤ N − 2`).
//! 5. Wires with `A[w] = 0` (resp. `B[w] = 0`) are flagged as points at
//!    infinity and dropped from the scalar lists.
//! 6. One fixed-base batch multiplication in G1, one in G2; outputs are cut
//!    back into fields through a [`G1Layout`] / [`G2Layout`].
//! 7. Pedersen keys over the committed-wire bases; `vk.precompute()`.
//!
//! No partial key is ever returned: every fallible step runs before the keys
//! are assembled.

#![forbid(unsafe_code)]

use ark_ec::{
    pairing::{Pairing, PairingOutput},
    scalar_mul::fixed_base::FixedBase,
    AffineRepr, CurveGroup, Group,
};
use ark_ff::{Field, One, PrimeField, UniformRand, Zero};
use ark_serialize::{
    CanonicalDeserialize, CanonicalSerialize, Compress, Read, SerializationError, Valid, Validate,
    Write,
};
use blake3::Hasher;
use rand::{CryptoRng, RngCore};
use std::time::Instant;
use tracing::{debug, info};
use zeroize::Zeroize;

use crate::domain::{bit_reverse, Domain, DomainError};
use crate::pedersen::{self, PedersenError};
use crate::qap::{self, QapError};
use crate::r1cs::{self, ConstraintSystem, R1csError};

/// Errors surfaced by [`setup`] and [`dummy_setup`].
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// The circuit failed [`r1cs::validate`].
    #[error("invalid constraint system: {0}")]
    ConstraintSystem(#[from] R1csError),
    /// No radix-2 domain fits the constraints.
    #[error("domain: {0}")]
    Domain(#[from] DomainError),
    /// The sampled point fell inside the domain.
    #[error("qap: {0}")]
    Qap(#[from] QapError),
    /// Commitment key generation failed.
    #[error("pedersen: {0}")]
    Pedersen(#[from] PedersenError),
    /// Internal: the batch multiplication returned the wrong number of points.
    #[error("batch multiplication layout mismatch: expected {expected} points, got {got}")]
    Layout {
        /// Points the layout describes.
        expected: usize,
        /// Points produced.
        got: usize,
    },
}

// ============================================================================
// Toxic waste
// ============================================================================

/// Setup secrets. Owned by a single [`setup`] call and wiped on drop.
#[derive(Zeroize)]
struct ToxicWaste<F: Field> {
    t: F,
    alpha: F,
    beta: F,
    gamma: F,
    delta: F,
    gamma_inv: F,
    delta_inv: F,
}

impl<F: Field> Drop for ToxicWaste<F> {
    fn drop(&mut self) {
        self.zeroize();
    }
}

fn sample_nonzero<F: Field, R: RngCore + CryptoRng>(rng: &mut R) -> F {
    loop {
        let x = F::rand(rng);
        if !x.is_zero() {
            return x;
        }
    }
}

impl<F: PrimeField> ToxicWaste<F> {
    fn sample<R: RngCore + CryptoRng>(domain: &Domain<F>, rng: &mut R) -> Self {
        // t ∈ H would zero the vanishing polynomial and break the Lagrange recurrence.
        let t = loop {
            let t = sample_nonzero::<F, _>(rng);
            if !domain.contains(t) {
                break t;
            }
        };
        let gamma = sample_nonzero::<F, _>(rng);
        let delta = sample_nonzero::<F, _>(rng);
        Self {
            t,
            alpha: sample_nonzero(rng),
            beta: sample_nonzero(rng),
            gamma,
            delta,
            gamma_inv: gamma.inverse().unwrap_or_else(F::zero),
            delta_inv: delta.inverse().unwrap_or_else(F::zero),
        }
    }
}

// ============================================================================
// Batch multiplication layout
// ============================================================================

/// `{offset, len}` window into a batch multiplication output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// First index.
    pub offset: usize,
    /// Number of entries.
    pub len: usize,
}

impl Span {
    /// One past the last index.
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// The window of `v`; panics if `v` is shorter than [`end`](Self::end).
    #[inline]
    pub fn slice<'a, T>(&self, v: &'a [T]) -> &'a [T] {
        &v[self.offset..self.end()]
    }

    /// First entry of the window.
    #[inline]
    pub fn first<T: Copy>(&self, v: &[T]) -> T {
        v[self.offset]
    }
}

struct Cursor(usize);

impl Cursor {
    fn take(&mut self, len: usize) -> Span {
        let s = Span {
            offset: self.0,
            len,
        };
        self.0 += len;
        s
    }
}

/// Ordering of the single G1 batch:
/// `[α, β, δ, A(filtered), B(filtered), Z, vk.K, pk.K, basis₀, basis₁, …]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct G1Layout {
    /// `α`
    pub alpha: Span,
    /// `β`
    pub beta: Span,
    /// `δ`
    pub delta: Span,
    /// `A(t)` of wires not at infinity.
    pub a: Span,
    /// `B(t)` of wires not at infinity.
    pub b: Span,
    /// Vanishing polynomial powers.
    pub z: Span,
    /// Public and commitment wires, `γ⁻¹`-scaled.
    pub vk_k: Span,
    /// Remaining private wires, `δ⁻¹`-scaled.
    pub pk_k: Span,
    /// Pedersen basis of each commitment group.
    pub commitment_bases: Vec<Span>,
    /// Length of the whole batch.
    pub total: usize,
}

impl G1Layout {
    /// Lays the windows out back to back in batch order.
    pub fn new(
        nb_a: usize,
        nb_b: usize,
        domain_size: usize,
        nb_public: usize,
        nb_private: usize,
        group_sizes: &[usize],
    ) -> Self {
        let mut c = Cursor(0);
        let alpha = c.take(1);
        let beta = c.take(1);
        let delta = c.take(1);
        let a = c.take(nb_a);
        let b = c.take(nb_b);
        let z = c.take(domain_size);
        let vk_k = c.take(nb_public);
        let pk_k = c.take(nb_private);
        let commitment_bases = group_sizes.iter().map(|n| c.take(*n)).collect();
        Self {
            alpha,
            beta,
            delta,
            a,
            b,
            z,
            vk_k,
            pk_k,
            commitment_bases,
            total: c.0,
        }
    }

    fn check<T>(&self, out: &[T]) -> Result<(), SetupError> {
        if out.len() != self.total {
            return Err(SetupError::Layout {
                expected: self.total,
                got: out.len(),
            });
        }
        Ok(())
    }
}

/// Ordering of the single G2 batch: `[B(filtered), β, δ, γ]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct G2Layout {
    /// `B(t)` of wires not at infinity.
    pub b: Span,
    /// `β`
    pub beta: Span,
    /// `δ`
    pub delta: Span,
    /// `γ`
    pub gamma: Span,
    /// Length of the whole batch.
    pub total: usize,
}

impl G2Layout {
    /// Lays the windows out back to back in batch order.
    pub fn new(nb_b: usize) -> Self {
        let mut c = Cursor(0);
        let b = c.take(nb_b);
        let beta = c.take(1);
        let delta = c.take(1);
        let gamma = c.take(1);
        Self {
            b,
            beta,
            delta,
            gamma,
            total: c.0,
        }
    }
}

/// `scalars · generator` with one window table, normalized in one pass.
fn batch_mul<G: CurveGroup>(scalars: &[G::ScalarField]) -> Vec<G::Affine> {
    let scalar_bits = <G::ScalarField as PrimeField>::MODULUS_BIT_SIZE as usize;
    let window = FixedBase::get_mul_window_size(scalars.len().max(1));
    let table = FixedBase::get_window_table::<G>(scalar_bits, window, G::generator());
    let points = FixedBase::msm::<G>(scalar_bits, window, &table, scalars);
    G::normalize_batch(&points)
}

// ============================================================================
// Keys
// ============================================================================

/// Prover-side SRS.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct ProvingKey<E: Pairing> {
    /// Evaluation domain of the circuit.
    pub domain: Domain<E::ScalarField>,
    /// `[α]₁`
    pub alpha_g1: E::G1Affine,
    /// `[β]₁`
    pub beta_g1: E::G1Affine,
    /// `[δ]₁`
    pub delta_g1: E::G1Affine,
    /// `[A(t)]₁` for wires with `A ≠ 0`.
    pub a: Vec<E::G1Affine>,
    /// `[B(t)]₁` for wires with `B ≠ 0`.
    pub b_g1: Vec<E::G1Affine>,
    /// `[(tᴺ − 1)/δ · tⁱ]₁`, bit-reversed, `N − 1` entries.
    pub z: Vec<E::G1Affine>,
    /// Private wires, `δ⁻¹`-scaled.
    pub k: Vec<E::G1Affine>,
    /// `[β]₂`
    pub beta_g2: E::G2Affine,
    /// `[δ]₂`
    pub delta_g2: E::G2Affine,
    /// `[B(t)]₂` for wires with `B ≠ 0`.
    pub b_g2: Vec<E::G2Affine>,
    /// Per wire, whether `A(t) = 0` and the wire is skipped in `a`.
    pub infinity_a: Vec<bool>,
    /// Per wire, whether `B(t) = 0` and the wire is skipped in `b_g1`/`b_g2`.
    pub infinity_b: Vec<bool>,
    /// Number of `true` entries in `infinity_a`.
    pub nb_infinity_a: u64,
    /// Number of `true` entries in `infinity_b`.
    pub nb_infinity_b: u64,
    /// One Pedersen key per commitment group.
    pub commitment_keys: Vec<pedersen::ProvingKey<E>>,
}

impl<E: Pairing> ProvingKey<E> {
    /// Number of `G1` points, commitment keys excluded.
    pub fn nb_g1(&self) -> usize {
        3 + self.a.len() + self.b_g1.len() + self.z.len() + self.k.len()
    }

    /// Number of `G2` points.
    pub fn nb_g2(&self) -> usize {
        2 + self.b_g2.len()
    }

    /// True when no sampled element of `self` repeats in `other`.
    ///
    /// Two independent setups must never share `α`, `β`, `δ` or a private `K`.
    pub fn is_different(&self, other: &Self) -> bool {
        if self.alpha_g1 == other.alpha_g1
            || self.beta_g1 == other.beta_g1
            || self.delta_g1 == other.delta_g1
        {
            return false;
        }
        !self
            .k
            .iter()
            .zip(&other.k)
            .any(|(a, b)| !a.is_zero() && a == b)
    }
}

/// Verifier-side SRS.
///
/// `delta_neg`, `gamma_neg`, `e = e(α, β)` and `digest` are derived from the
/// serialized fields by [`VerifyingKey::precompute`]. Every constructor,
/// including deserialization, runs it; the serialized fields are only reachable
/// through accessors so the caches cannot go stale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyingKey<E: Pairing> {
    alpha_g1: E::G1Affine,
    beta_g1: E::G1Affine,
    delta_g1: E::G1Affine,
    k: Vec<E::G1Affine>,
    beta_g2: E::G2Affine,
    delta_g2: E::G2Affine,
    gamma_g2: E::G2Affine,
    commitment_key: pedersen::VerifyingKey<E>,
    public_and_commitment_committed: Vec<Vec<usize>>,

    delta_neg: E::G2Affine,
    gamma_neg: E::G2Affine,
    e: PairingOutput<E>,
    digest: [u8; 32],
}

impl<E: Pairing> VerifyingKey<E> {
    /// Assembles a key from its serialized parts and derives the caches.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        alpha_g1: E::G1Affine,
        beta_g1: E::G1Affine,
        delta_g1: E::G1Affine,
        k: Vec<E::G1Affine>,
        beta_g2: E::G2Affine,
        delta_g2: E::G2Affine,
        gamma_g2: E::G2Affine,
        commitment_key: pedersen::VerifyingKey<E>,
        public_and_commitment_committed: Vec<Vec<usize>>,
    ) -> Self {
        let mut vk = Self {
            alpha_g1,
            beta_g1,
            delta_g1,
            k,
            beta_g2,
            delta_g2,
            gamma_g2,
            commitment_key,
            public_and_commitment_committed,
            delta_neg: E::G2Affine::zero(),
            gamma_neg: E::G2Affine::zero(),
            e: PairingOutput::zero(),
            digest: [0u8; 32],
        };
        vk.precompute();
        vk
    }

    /// Derives `e(α, β)`, `−[δ]₂`, `−[γ]₂` and the key digest.
    pub fn precompute(&mut self) {
        self.e = E::pairing(self.alpha_g1, self.beta_g2);
        self.delta_neg = (-self.delta_g2.into_group()).into_affine();
        self.gamma_neg = (-self.gamma_g2.into_group()).into_affine();
        self.digest = self.compute_digest();
    }

    fn compute_digest(&self) -> [u8; 32] {
        let mut bytes = Vec::new();
        // Writing valid points into a Vec cannot fail.
        self.serialize_fields(&mut bytes, Compress::Yes)
            .expect("serialize into Vec");
        let mut h = Hasher::new();
        h.update(b"G16FOLD.vk.v1");
        h.update(&bytes);
        *h.finalize().as_bytes()
    }

    fn serialize_fields<W: Write>(&self, mut w: W, compress: Compress) -> Result<(), SerializationError> {
        self.alpha_g1.serialize_with_mode(&mut w, compress)?;
        self.beta_g1.serialize_with_mode(&mut w, compress)?;
        self.delta_g1.serialize_with_mode(&mut w, compress)?;
        self.k.serialize_with_mode(&mut w, compress)?;
        self.beta_g2.serialize_with_mode(&mut w, compress)?;
        self.delta_g2.serialize_with_mode(&mut w, compress)?;
        self.gamma_g2.serialize_with_mode(&mut w, compress)?;
        self.commitment_key.serialize_with_mode(&mut w, compress)?;
        self.public_and_commitment_committed
            .serialize_with_mode(&mut w, compress)?;
        Ok(())
    }

    /// `[α]₁`
    pub fn alpha_g1(&self) -> E::G1Affine {
        self.alpha_g1
    }
    /// `[β]₂`
    pub fn beta_g2(&self) -> E::G2Affine {
        self.beta_g2
    }
    /// `[δ]₂`
    pub fn delta_g2(&self) -> E::G2Affine {
        self.delta_g2
    }
    /// `[γ]₂`
    pub fn gamma_g2(&self) -> E::G2Affine {
        self.gamma_g2
    }
    /// `[K]₁` over public wires then commitment wires.
    pub fn k(&self) -> &[E::G1Affine] {
        &self.k
    }
    /// Pedersen verification key shared by every commitment group.
    pub fn commitment_key(&self) -> &pedersen::VerifyingKey<E> {
        &self.commitment_key
    }
    /// Per commitment, 1-based positions of the committed values in the
    /// extended public witness.
    pub fn public_and_commitment_committed(&self) -> &[Vec<usize>] {
        &self.public_and_commitment_committed
    }
    /// Number of commitment groups.
    pub fn nb_commitments(&self) -> usize {
        self.public_and_commitment_committed.len()
    }
    /// Cached `−[δ]₂`.
    pub fn delta_neg(&self) -> E::G2Affine {
        self.delta_neg
    }
    /// Cached `−[γ]₂`.
    pub fn gamma_neg(&self) -> E::G2Affine {
        self.gamma_neg
    }
    /// Cached `e(α, β)`.
    pub fn e(&self) -> PairingOutput<E> {
        self.e
    }
    /// BLAKE3 digest of the serialized fields.
    pub fn digest(&self) -> [u8; 32] {
        self.digest
    }

    /// Public inputs expected from the caller (ONE wire and commitment
    /// hashes excluded).
    pub fn nb_public_witness(&self) -> usize {
        self.k.len().saturating_sub(self.nb_commitments() + 1)
    }

    /// Number of serialized `G1` points, Pedersen key excluded.
    pub fn nb_g1(&self) -> usize {
        3 + self.k.len()
    }

    /// Number of serialized `G2` points, Pedersen key excluded.
    pub fn nb_g2(&self) -> usize {
        3
    }

    /// True when no non-identity `K` entry is shared with `other`.
    pub fn is_different(&self, other: &Self) -> bool {
        !self
            .k
            .iter()
            .zip(&other.k)
            .any(|(a, b)| !a.is_zero() && a == b)
    }
}

impl<E: Pairing> CanonicalSerialize for VerifyingKey<E> {
    fn serialize_with_mode<W: Write>(&self, writer: W, compress: Compress) -> Result<(), SerializationError> {
        self.serialize_fields(writer, compress)
    }

    fn serialized_size(&self, compress: Compress) -> usize {
        self.alpha_g1.serialized_size(compress)
            + self.beta_g1.serialized_size(compress)
            + self.delta_g1.serialized_size(compress)
            + self.k.serialized_size(compress)
            + self.beta_g2.serialized_size(compress)
            + self.delta_g2.serialized_size(compress)
            + self.gamma_g2.serialized_size(compress)
            + self.commitment_key.serialized_size(compress)
            + self.public_and_commitment_committed.serialized_size(compress)
    }
}

impl<E: Pairing> Valid for VerifyingKey<E> {
    fn check(&self) -> Result<(), SerializationError> {
        self.alpha_g1.check()?;
        self.beta_g1.check()?;
        self.delta_g1.check()?;
        self.k.check()?;
        self.beta_g2.check()?;
        self.delta_g2.check()?;
        self.gamma_g2.check()?;
        self.commitment_key.check()?;
        Ok(())
    }
}

impl<E: Pairing> CanonicalDeserialize for VerifyingKey<E> {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        let alpha_g1 = E::G1Affine::deserialize_with_mode(&mut reader, compress, validate)?;
        let beta_g1 = E::G1Affine::deserialize_with_mode(&mut reader, compress, validate)?;
        let delta_g1 = E::G1Affine::deserialize_with_mode(&mut reader, compress, validate)?;
        let k = Vec::<E::G1Affine>::deserialize_with_mode(&mut reader, compress, validate)?;
        let beta_g2 = E::G2Affine::deserialize_with_mode(&mut reader, compress, validate)?;
        let delta_g2 = E::G2Affine::deserialize_with_mode(&mut reader, compress, validate)?;
        let gamma_g2 = E::G2Affine::deserialize_with_mode(&mut reader, compress, validate)?;
        let commitment_key =
            pedersen::VerifyingKey::<E>::deserialize_with_mode(&mut reader, compress, validate)?;
        let public_and_commitment_committed =
            Vec::<Vec<usize>>::deserialize_with_mode(&mut reader, compress, validate)?;
        if public_and_commitment_committed
            .iter()
            .flatten()
            .any(|&i| i == 0 || i >= k.len())
        {
            return Err(SerializationError::InvalidData);
        }
        Ok(Self::from_parts(
            alpha_g1,
            beta_g1,
            delta_g1,
            k,
            beta_g2,
            delta_g2,
            gamma_g2,
            commitment_key,
            public_and_commitment_committed,
        ))
    }
}

// ============================================================================
// Setup
// ============================================================================

/// Wire counts after classification.
struct WireClasses {
    layout: r1cs::CommitmentLayout,
    nb_public: usize,
    nb_private: usize,
}

impl WireClasses {
    fn of<F: Field, CS: ConstraintSystem<F> + ?Sized>(cs: &CS) -> Self {
        let layout = r1cs::interleave(cs.commitments(), cs.nb_public_variables());
        let nb_commitments = layout.commitment_wires.len();
        Self {
            nb_public: cs.nb_public_variables() + nb_commitments,
            nb_private: cs.nb_secret_variables() + cs.nb_internal_variables()
                - layout.nb_private_committed()
                - nb_commitments,
            layout,
        }
    }
}

/// Scalars destined for the three K families.
struct KScalars<F> {
    vk: Vec<F>,
    pk: Vec<F>,
    commitment: Vec<Vec<F>>,
}

fn split_k<F: PrimeField>(
    qap: &qap::QapEvaluations<F>,
    classes: &WireClasses,
    nb_public_vars: usize,
    tw: &ToxicWaste<F>,
) -> KScalars<F> {
    let layout = &classes.layout;
    let mut out = KScalars {
        vk: Vec::with_capacity(classes.nb_public),
        pk: Vec::with_capacity(classes.nb_private),
        commitment: layout
            .private_committed
            .iter()
            .map(|g| Vec::with_capacity(g.len()))
            .collect(),
    };
    let mut next_commitment = 0usize;
    let mut cursor = vec![0usize; layout.private_committed.len()];

    for w in 0..qap.a.len() {
        let k = tw.beta * qap.a[w] + tw.alpha * qap.b[w] + qap.c[w];

        let is_public = w < nb_public_vars;
        let is_commitment = !is_public
            && layout.commitment_wires.get(next_commitment) == Some(&w);
        if is_commitment {
            next_commitment += 1;
        }
        if is_public || is_commitment {
            out.vk.push(k * tw.gamma_inv);
            continue;
        }

        // the front end commits a private wire at most once
        let group = layout
            .private_committed
            .iter()
            .enumerate()
            .find(|(j, g)| g.get(cursor[*j]) == Some(&w))
            .map(|(j, _)| j);
        match group {
            Some(j) => {
                out.commitment[j].push(k * tw.gamma_inv);
                cursor[j] += 1;
            }
            None => out.pk.push(k * tw.delta_inv),
        }
    }
    out
}

/// Marks zero entries and returns the non-zero ones, in order.
fn filter_infinity<F: Field>(v: &[F]) -> (Vec<bool>, Vec<F>) {
    let mut flags = Vec::with_capacity(v.len());
    let mut kept = Vec::with_capacity(v.len());
    for x in v {
        flags.push(x.is_zero());
        if !x.is_zero() {
            kept.push(*x);
        }
    }
    (flags, kept)
}

/// Runs the Groth16 setup for `cs`.
pub fn setup<E, CS, R>(cs: &CS, rng: &mut R) -> Result<(ProvingKey<E>, VerifyingKey<E>), SetupError>
where
    E: Pairing,
    CS: ConstraintSystem<E::ScalarField> + ?Sized,
    R: RngCore + CryptoRng,
{
    let start = Instant::now();
    r1cs::validate::<E::ScalarField, CS>(cs)?;

    let domain = Domain::<E::ScalarField>::new(cs.nb_constraints())?;
    let n = domain.size();
    let classes = WireClasses::of::<E::ScalarField, CS>(cs);

    let tw = ToxicWaste::sample(&domain, rng);
    let (pk, vk) = keys_from_toxic_waste(cs, domain, &classes, &tw, rng)?;
    drop(tw);

    info!(
        constraints = cs.nb_constraints(),
        wires = cs.nb_wires(),
        domain = n,
        public = classes.nb_public,
        private = classes.nb_private,
        commitments = classes.layout.commitment_wires.len(),
        "groth16 setup"
    );
    debug!(elapsed = ?start.elapsed(), "setup done");

    Ok((pk, vk))
}

fn keys_from_toxic_waste<E, CS, R>(
    cs: &CS,
    domain: Domain<E::ScalarField>,
    classes: &WireClasses,
    tw: &ToxicWaste<E::ScalarField>,
    rng: &mut R,
) -> Result<(ProvingKey<E>, VerifyingKey<E>), SetupError>
where
    E: Pairing,
    CS: ConstraintSystem<E::ScalarField> + ?Sized,
    R: RngCore + CryptoRng,
{
    let n = domain.size();
    let qap = qap::evaluate_at(cs, &domain, tw.t)?;
    let k = split_k(&qap, classes, cs.nb_public_variables(), tw);

    let mut z = Vec::with_capacity(n);
    let mut zt = (tw.t.pow([domain.cardinality]) - E::ScalarField::one()) * tw.delta_inv;
    for _ in 0..n {
        z.push(zt);
        zt *= tw.t;
    }

    let (infinity_a, a_kept) = filter_infinity(&qap.a);
    let (infinity_b, b_kept) = filter_infinity(&qap.b);
    let nb_infinity_a = (qap.a.len() - a_kept.len()) as u64;
    let nb_infinity_b = (qap.b.len() - b_kept.len()) as u64;

    let group_sizes: Vec<usize> = k.commitment.iter().map(Vec::len).collect();
    let g1_layout = G1Layout::new(
        a_kept.len(),
        b_kept.len(),
        n,
        k.vk.len(),
        k.pk.len(),
        &group_sizes,
    );
    let mut g1_scalars = Vec::with_capacity(g1_layout.total);
    g1_scalars.extend_from_slice(&[tw.alpha, tw.beta, tw.delta]);
    g1_scalars.extend_from_slice(&a_kept);
    g1_scalars.extend_from_slice(&b_kept);
    g1_scalars.extend_from_slice(&z);
    g1_scalars.extend_from_slice(&k.vk);
    g1_scalars.extend_from_slice(&k.pk);
    for group in &k.commitment {
        g1_scalars.extend_from_slice(group);
    }
    g1_layout.check(&g1_scalars)?;

    let g2_layout = G2Layout::new(b_kept.len());
    let mut g2_scalars = b_kept;
    g2_scalars.extend_from_slice(&[tw.beta, tw.delta, tw.gamma]);

    let g1 = batch_mul::<E::G1>(&g1_scalars);
    g1_layout.check(&g1)?;
    let g2 = batch_mul::<E::G2>(&g2_scalars);
    if g2.len() != g2_layout.total {
        return Err(SetupError::Layout {
            expected: g2_layout.total,
            got: g2.len(),
        });
    }
    g1_scalars.zeroize();
    g2_scalars.zeroize();

    let mut z_points = g1_layout.z.slice(&g1).to_vec();
    bit_reverse(&mut z_points);
    z_points.truncate(n - 1);

    let bases: Vec<Vec<E::G1Affine>> = g1_layout
        .commitment_bases
        .iter()
        .map(|s| s.slice(&g1).to_vec())
        .collect();
    let (commitment_keys, commitment_vk) = pedersen::setup::<E, R>(&bases, rng)?;

    let pk = ProvingKey {
        domain,
        alpha_g1: g1_layout.alpha.first(&g1),
        beta_g1: g1_layout.beta.first(&g1),
        delta_g1: g1_layout.delta.first(&g1),
        a: g1_layout.a.slice(&g1).to_vec(),
        b_g1: g1_layout.b.slice(&g1).to_vec(),
        z: z_points,
        k: g1_layout.pk_k.slice(&g1).to_vec(),
        beta_g2: g2_layout.beta.first(&g2),
        delta_g2: g2_layout.delta.first(&g2),
        b_g2: g2_layout.b.slice(&g2).to_vec(),
        infinity_a,
        infinity_b,
        nb_infinity_a,
        nb_infinity_b,
        commitment_keys,
    };

    let vk = VerifyingKey::from_parts(
        pk.alpha_g1,
        pk.beta_g1,
        pk.delta_g1,
        g1_layout.vk_k.slice(&g1).to_vec(),
        pk.beta_g2,
        pk.delta_g2,
        g2_layout.gamma.first(&g2),
        commitment_vk,
        classes.layout.public_and_commitment_committed.clone(),
    );

    Ok((pk, vk))
}

/// Proving key with the exact shape [`setup`] would produce, filled with a
/// single random point. For benchmarking provers only.
pub fn dummy_setup<E, CS, R>(cs: &CS, rng: &mut R) -> Result<ProvingKey<E>, SetupError>
where
    E: Pairing,
    CS: ConstraintSystem<E::ScalarField> + ?Sized,
    R: RngCore + CryptoRng,
{
    r1cs::validate::<E::ScalarField, CS>(cs)?;
    let domain = Domain::<E::ScalarField>::new(cs.nb_constraints())?;
    let n = domain.size();
    let nb_wires = cs.nb_wires();
    let classes = WireClasses::of::<E::ScalarField, CS>(cs);

    let (infinity_a, infinity_b) = qap::unreferenced_wires::<E::ScalarField, CS>(cs);
    let (nb_infinity_a, nb_infinity_b) = qap::infinity_count::<E::ScalarField, CS>(cs);

    let mut s = sample_nonzero::<E::ScalarField, _>(rng);
    let p1 = (E::G1::generator() * s).into_affine();
    let p2 = (E::G2::generator() * s).into_affine();
    s.zeroize();

    let bases: Vec<Vec<E::G1Affine>> = classes
        .layout
        .private_committed
        .iter()
        .map(|g| vec![p1; g.len()])
        .collect();
    let (commitment_keys, _) = pedersen::setup::<E, R>(&bases, rng)?;

    Ok(ProvingKey {
        domain,
        alpha_g1: p1,
        beta_g1: p1,
        delta_g1: p1,
        a: vec![p1; nb_wires - nb_infinity_a],
        b_g1: vec![p1; nb_wires - nb_infinity_b],
        z: vec![p1; n - 1],
        k: vec![p1; classes.nb_private],
        beta_g2: p2,
        delta_g2: p2,
        b_g2: vec![p2; nb_wires - nb_infinity_b],
        infinity_a,
        infinity_b,
        nb_infinity_a: nb_infinity_a as u64,
        nb_infinity_b: nb_infinity_b as u64,
        commitment_keys,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::r1cs::CoeffId;
    use crate::testing::{commitment_circuit, square_circuit};
    use ark_bn254::{Bn254, Fr, G1Projective};
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn layout_spans_are_contiguous() {
        let l = G1Layout::new(4, 3, 8, 2, 5, &[2, 1]);
        assert_eq!(l.alpha, Span { offset: 0, len: 1 });
        assert_eq!(l.a, Span { offset: 3, len: 4 });
        assert_eq!(l.b.offset, l.a.end());
        assert_eq!(l.z, Span { offset: 10, len: 8 });
        assert_eq!(l.vk_k.offset, 18);
        assert_eq!(l.pk_k, Span { offset: 20, len: 5 });
        assert_eq!(l.commitment_bases, vec![Span { offset: 25, len: 2 }, Span { offset: 27, len: 1 }]);
        assert_eq!(l.total, 28);
        assert!(l.check(&vec![0u8; 27]).is_err());
    }

    #[test]
    fn refuses_circuit_with_altered_reserved_coefficient() {
        let mut rng = StdRng::seed_from_u64(27);
        let mut c = square_circuit::<Fr>();
        c.cs.coefficients[CoeffId::ONE.0 as usize] = Fr::from(5u64);
        // the witness still satisfies the circuit as read through the table
        assert!(c.cs.is_satisfied(&c.assignment(3, 45)).is_ok());
        assert!(matches!(
            setup::<Bn254, _, _>(&c.cs, &mut rng),
            Err(SetupError::ConstraintSystem(R1csError::ReservedCoefficient(1)))
        ));
        assert!(matches!(
            dummy_setup::<Bn254, _, _>(&c.cs, &mut rng),
            Err(SetupError::ConstraintSystem(R1csError::ReservedCoefficient(1)))
        ));
    }

    #[test]
    fn batch_mul_matches_scalar_mul() {
        let scalars: Vec<Fr> = (1..=5u64).map(Fr::from).collect();
        let got = batch_mul::<G1Projective>(&scalars);
        for (s, p) in scalars.iter().zip(&got) {
            assert_eq!(*p, (G1Projective::generator() * s).into_affine());
        }
    }

    #[test]
    fn key_shapes_follow_wire_classes() {
        let mut rng = StdRng::seed_from_u64(21);
        let c = commitment_circuit::<Fr>();
        let (pk, vk) = setup::<Bn254, _, _>(&c.cs, &mut rng).unwrap();

        let domain = Domain::<Fr>::new(c.cs.nb_constraints()).unwrap();
        assert_eq!(pk.domain, domain);
        assert_eq!(pk.z.len(), domain.size() - 1);
        // ONE, y and the commitment wire
        assert_eq!(vk.k().len(), 3);
        assert_eq!(vk.nb_commitments(), 1);
        assert_eq!(vk.nb_public_witness(), 1);
        // x is committed privately, z and u stay in pk.K
        assert_eq!(pk.k.len(), 2);
        assert_eq!(pk.commitment_keys.len(), 1);
        assert_eq!(pk.commitment_keys[0].basis.len(), 1);

        assert_eq!(pk.infinity_a.len(), c.cs.nb_wires());
        assert_eq!(pk.a.len() as u64 + pk.nb_infinity_a, c.cs.nb_wires() as u64);
        assert_eq!(pk.b_g1.len(), pk.b_g2.len());
        assert_eq!(vk.nb_g1(), 3 + vk.k().len());
        assert_eq!(pk.nb_g2(), 2 + pk.b_g2.len());
    }

    #[test]
    fn verifying_key_caches_match_fields() {
        let mut rng = StdRng::seed_from_u64(22);
        let c = square_circuit::<Fr>();
        let (pk, vk) = setup::<Bn254, _, _>(&c.cs, &mut rng).unwrap();

        assert_eq!(vk.e(), Bn254::pairing(pk.alpha_g1, pk.beta_g2));
        assert_eq!(
            vk.delta_neg().into_group() + vk.delta_g2().into_group(),
            <Bn254 as Pairing>::G2::zero()
        );
        assert_eq!(vk.gamma_neg(), -vk.gamma_g2());
    }

    fn fixed_toxic_waste() -> ToxicWaste<Fr> {
        let (gamma, delta) = (Fr::from(5u64), Fr::from(7u64));
        ToxicWaste {
            t: Fr::from(11u64),
            alpha: Fr::from(2u64),
            beta: Fr::from(3u64),
            gamma,
            delta,
            gamma_inv: gamma.inverse().unwrap(),
            delta_inv: delta.inverse().unwrap(),
        }
    }

    fn g1(s: Fr) -> <Bn254 as Pairing>::G1Affine {
        (G1Projective::generator() * s).into_affine()
    }

    #[test]
    fn z_powers_are_bit_reversed_and_truncated() {
        let mut rng = StdRng::seed_from_u64(23);
        let c = commitment_circuit::<Fr>();
        let domain = Domain::<Fr>::new(c.cs.nb_constraints()).unwrap();
        let classes = WireClasses::of::<Fr, _>(&c.cs);
        let tw = fixed_toxic_waste();
        let (pk, _) =
            keys_from_toxic_waste::<Bn254, _, _>(&c.cs, domain.clone(), &classes, &tw, &mut rng).unwrap();

        let n = domain.size();
        assert_eq!(n, 4);
        let z0 = (tw.t.pow([n as u64]) - Fr::one()) * tw.delta_inv;
        let mut natural: Vec<_> = (0..n as u64).map(|i| g1(z0 * tw.t.pow([i]))).collect();
        bit_reverse(&mut natural);
        natural.truncate(n - 1);
        assert_eq!(pk.z, natural);
    }

    #[test]
    fn k_entries_follow_wire_classification() {
        let mut rng = StdRng::seed_from_u64(28);
        let c = commitment_circuit::<Fr>();
        let domain = Domain::<Fr>::new(c.cs.nb_constraints()).unwrap();
        let classes = WireClasses::of::<Fr, _>(&c.cs);
        let tw = fixed_toxic_waste();
        let (pk, vk) =
            keys_from_toxic_waste::<Bn254, _, _>(&c.cs, domain.clone(), &classes, &tw, &mut rng).unwrap();

        let q = qap::evaluate_at(&c.cs, &domain, tw.t).unwrap();
        let k_of = |w: usize, scale: Fr| g1((tw.beta * q.a[w] + tw.alpha * q.b[w] + q.c[w]) * scale);

        let (x, y, cw) = (c.cs.wire(c.x), c.cs.wire(c.y), c.cs.wire(c.commitment));
        let (z, u) = (c.cs.wire(c.z), c.cs.wire(c.u));
        assert_eq!(vk.k(), &[k_of(0, tw.gamma_inv), k_of(y, tw.gamma_inv), k_of(cw, tw.gamma_inv)][..]);
        assert_eq!(pk.commitment_keys[0].basis, vec![k_of(x, tw.gamma_inv)]);
        assert_eq!(pk.k, vec![k_of(z, tw.delta_inv), k_of(u, tw.delta_inv)]);
        assert_eq!(pk.alpha_g1, g1(tw.alpha));
        assert_eq!(vk.alpha_g1(), g1(tw.alpha));
    }

    #[test]
    fn setups_are_independent() {
        let mut rng = StdRng::seed_from_u64(24);
        let c = commitment_circuit::<Fr>();
        let (pk1, vk1) = setup::<Bn254, _, _>(&c.cs, &mut rng).unwrap();
        let (pk2, vk2) = setup::<Bn254, _, _>(&c.cs, &mut rng).unwrap();
        assert!(vk1.is_different(&vk2));
        assert!(pk1.is_different(&pk2));
        assert!(!vk1.is_different(&vk1));
        assert!(!pk1.is_different(&pk1));
    }

    #[test]
    fn dummy_setup_matches_real_shape() {
        let mut rng = StdRng::seed_from_u64(25);
        let c = commitment_circuit::<Fr>();
        let (pk, _) = setup::<Bn254, _, _>(&c.cs, &mut rng).unwrap();
        let dummy = dummy_setup::<Bn254, _, _>(&c.cs, &mut rng).unwrap();

        assert_eq!(dummy.domain, pk.domain);
        assert_eq!(dummy.a.len(), pk.a.len());
        assert_eq!(dummy.b_g1.len(), pk.b_g1.len());
        assert_eq!(dummy.b_g2.len(), pk.b_g2.len());
        assert_eq!(dummy.z.len(), pk.z.len());
        assert_eq!(dummy.k.len(), pk.k.len());
        assert_eq!(dummy.infinity_a, pk.infinity_a);
        assert_eq!(dummy.infinity_b, pk.infinity_b);
        assert_eq!(dummy.nb_infinity_a, pk.nb_infinity_a);
        assert_eq!(dummy.nb_infinity_b, pk.nb_infinity_b);
        assert_eq!(dummy.nb_g1(), pk.nb_g1());
        assert_eq!(dummy.nb_g2(), pk.nb_g2());
        assert_eq!(
            dummy.commitment_keys.iter().map(|k| k.basis.len()).collect::<Vec<_>>(),
            pk.commitment_keys.iter().map(|k| k.basis.len()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn verifying_key_roundtrip_recomputes_caches() {
        let mut rng = StdRng::seed_from_u64(26);
        let c = commitment_circuit::<Fr>();
        let (_, vk) = setup::<Bn254, _, _>(&c.cs, &mut rng).unwrap();

        let mut bytes = Vec::new();
        vk.serialize_compressed(&mut bytes).unwrap();
        let back = VerifyingKey::<Bn254>::deserialize_compressed(&bytes[..]).unwrap();
        assert_eq!(back, vk);
        assert_eq!(back.e(), vk.e());
        assert_eq!(back.digest(), vk.digest());
    }
}
