//! Evaluation domain & radix-2 transforms
//!
//! A [`Domain`] is the multiplicative subgroup `H = {1, ω, …, ω^{N−1}}` of the
//! scalar field, where `N` is the smallest power of two covering the number of
//! constraints. Setup evaluates Lagrange polynomials over `H` at the secret
//! point; the prover interpolates constraint evaluations over `H` and divides
//! by the vanishing polynomial `Z_H(X) = X^N − 1` on the coset `g·H`
//! (`g = F::GENERATOR`), where it never vanishes.
//!
//! - **Validation** happens once, in [`Domain::new`]: `ω^N = 1` and, for
//!   `N ≥ 2`, `ω^{N/2} ≠ 1`.
//! - **Transforms** are in place and keep natural order on both sides; the
//!   bit-reversal permutation is exposed separately as [`bit_reverse`] because
//!   setup publishes the `Z` powers in bit-reversed order.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use ark_ff::{FftField, Field, One, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};

/// Radix-2 multiplicative subgroup of the scalar field `F`.
#[derive(Debug, Clone, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct Domain<F: FftField> {
    /// Size `N` of the subgroup (power of two).
    pub cardinality: u64,
    /// `N⁻¹` in the field.
    pub cardinality_inv: F,
    /// Primitive `N`-th root of unity `ω`.
    pub generator: F,
    /// `ω⁻¹`.
    pub generator_inv: F,
    /// Coset shift `g` used by the quotient computation.
    pub coset_shift: F,
    /// `g⁻¹`.
    pub coset_shift_inv: F,
}

/// Errors produced by domain construction / transforms.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomainError {
    /// Zero points requested.
    #[error("domain size must be positive")]
    Empty,
    /// The field's two-adicity is too small.
    #[error("field has no root of unity of order {0}")]
    TooLarge(u64),
    /// `ω^N ≠ 1`.
    #[error("omega^N != 1")]
    OmegaNPowNotOne,
    /// `ω^{N/2} = 1`.
    #[error("omega is not primitive: omega^(N/2) == 1")]
    OmegaNotPrimitive,
    /// Transform input of the wrong length.
    #[error("transform length must equal the domain size (len={len}, N={n})")]
    BadLen { len: usize, n: u64 },
}

impl<F: FftField> Domain<F> {
    /// Smallest radix-2 domain holding at least `m` points.
    pub fn new(m: usize) -> Result<Self, DomainError> {
        if m == 0 {
            return Err(DomainError::Empty);
        }
        let n = m.next_power_of_two() as u64;
        let generator = F::get_root_of_unity(n).ok_or(DomainError::TooLarge(n))?;
        if !generator.pow([n]).is_one() {
            return Err(DomainError::OmegaNPowNotOne);
        }
        if n >= 2 && generator.pow([n / 2]).is_one() {
            return Err(DomainError::OmegaNotPrimitive);
        }
        // ω, N and the multiplicative generator are all non-zero.
        let generator_inv = generator.inverse().ok_or(DomainError::OmegaNPowNotOne)?;
        let cardinality_inv = F::from(n).inverse().ok_or(DomainError::Empty)?;
        let coset_shift = F::GENERATOR;
        let coset_shift_inv = coset_shift.inverse().ok_or(DomainError::Empty)?;
        Ok(Self {
            cardinality: n,
            cardinality_inv,
            generator,
            generator_inv,
            coset_shift,
            coset_shift_inv,
        })
    }

    /// `N` as a `usize`.
    #[inline]
    pub fn size(&self) -> usize {
        self.cardinality as usize
    }

    /// `ωⁱ`.
    #[inline]
    pub fn element(&self, i: u64) -> F {
        self.generator.pow([i])
    }

    /// `Z_H(x) = x^N − 1`.
    #[inline]
    pub fn vanishing_at(&self, x: F) -> F {
        x.pow([self.cardinality]) - F::one()
    }

    /// Whether `x ∈ H`.
    #[inline]
    pub fn contains(&self, x: F) -> bool {
        self.vanishing_at(x).is_zero()
    }

    /// Coefficients → evaluations on `H` (natural order in and out).
    ///
    /// The prover only needs [`ifft_in_place`](Self::ifft_in_place) and the
    /// coset pair; this is the forward half they are tested against.
    pub fn fft_in_place(&self, a: &mut [F]) -> Result<(), DomainError> {
        self.check_len(a.len())?;
        ntt_in_place(a, self.generator);
        Ok(())
    }

    /// Evaluations on `H` → coefficients.
    pub fn ifft_in_place(&self, a: &mut [F]) -> Result<(), DomainError> {
        self.check_len(a.len())?;
        ntt_in_place(a, self.generator_inv);
        for x in a.iter_mut() {
            *x *= self.cardinality_inv;
        }
        Ok(())
    }

    /// Coefficients → evaluations on the coset `g·H`.
    pub fn coset_fft_in_place(&self, a: &mut [F]) -> Result<(), DomainError> {
        self.check_len(a.len())?;
        scale_by_powers(a, self.coset_shift);
        ntt_in_place(a, self.generator);
        Ok(())
    }

    /// Evaluations on `g·H` → coefficients.
    pub fn coset_ifft_in_place(&self, a: &mut [F]) -> Result<(), DomainError> {
        self.ifft_in_place(a)?;
        scale_by_powers(a, self.coset_shift_inv);
        Ok(())
    }

    fn check_len(&self, len: usize) -> Result<(), DomainError> {
        if len as u64 != self.cardinality {
            return Err(DomainError::BadLen {
                len,
                n: self.cardinality,
            });
        }
        Ok(())
    }
}

/// In-place bit-reversal permutation. `a.len()` must be a power of two.
pub fn bit_reverse<T>(a: &mut [T]) {
    let n = a.len();
    if n <= 2 {
        return;
    }
    debug_assert!(n.is_power_of_two());
    let shift = usize::BITS - n.trailing_zeros();
    for i in 0..n {
        let irev = i.reverse_bits() >> shift;
        if irev > i {
            a.swap(i, irev);
        }
    }
}

/// `a[j] *= s^j`
fn scale_by_powers<F: FftField>(a: &mut [F], s: F) {
    let mut acc = F::one();
    for x in a.iter_mut() {
        *x *= acc;
        acc *= s;
    }
}

// Iterative Cooley–Tukey over a power-of-two slice; `root` has order `a.len()`.
fn ntt_in_place<F: FftField>(a: &mut [F], root: F) {
    let n = a.len();
    debug_assert!(n.is_power_of_two());

    bit_reverse(a);

    let mut len = 2;
    while len <= n {
        let w_len = root.pow([(n / len) as u64]);
        for start in (0..n).step_by(len) {
            let mut w = F::one();
            let half = len / 2;
            for i in 0..half {
                let u = a[start + i];
                let v = a[start + i + half] * w;
                a[start + i] = u + v;
                a[start + i + half] = u - v;
                w *= w_len;
            }
        }
        len <<= 1;
    }
}
