//! Groth16 setup, verification and proof folding over any arkworks pairing
//!
//! The crate covers the three algorithms with non-trivial state:
//!
//! - **Setup** ([`setup`]): evaluates a circuit's QAP at a secret point and
//!   encodes the proving and verifying keys, with Pedersen commitment keys for
//!   wires the circuit commits to.
//! - **Verify** ([`verifier`]): the Groth16 pairing equation, extended with
//!   commitment-wire hashes and a batched Pedersen proof of knowledge.
//! - **Fold** ([`folding`]): accumulates many proofs for one verifying key
//!   into a relaxed instance checked with a single final exponentiation.
//!
//! A small constraint-system front end ([`r1cs`]) and a prover ([`prover`])
//! make the three usable end to end.
//!
//! ## Invariants
//!
//! - **Curve.** Everything is generic over `E: ark_ec::pairing::Pairing`; no
//!   code path dispatches on a concrete curve.
//! - **Toxic waste.** The setup secrets live in one stack frame of
//!   [`setup::setup`] and are zeroized when it returns.
//! - **Verifying key caches.** `e(α, β)`, `−δ`, `−γ` and the key digest are
//!   computed by every constructor, deserialization included, and are never
//!   mutated afterwards.
//! - **Fiat–Shamir.** BLAKE3 with explicit domain separation; folding
//!   challenges bind the verifying key digest, both accumulators and the
//!   cross term.
//!
//! ```no_run
//! use ark_bn254::{Bn254, Fr};
//! use ark_ff::One;
//! use groth16_fold::{prover, r1cs::{Assignment, R1csBuilder}, setup, verifier};
//!
//! let mut b = R1csBuilder::<Fr>::new();
//! let y = b.public_input();
//! let x = b.secret_input();
//! b.enforce(vec![(Fr::one(), x)], vec![(Fr::one(), x)], vec![(Fr::one(), y)]);
//! let cs = b.build()?;
//!
//! let mut rng = rand::rngs::OsRng;
//! let (pk, vk) = setup::setup::<Bn254, _, _>(&cs, &mut rng)?;
//!
//! let mut a = Assignment::new(&cs);
//! a.set(&cs, x, Fr::from(3u64));
//! a.set(&cs, y, Fr::from(9u64));
//! let proof = prover::prove(&pk, &cs, &a, &mut rng)?;
//! verifier::verify(&vk, &proof, &[Fr::from(9u64)])?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

/// FFT evaluation domain and radix-2 transforms.
pub mod domain;
/// Folding accumulator and single-check verification of folded proofs.
pub mod folding;
/// Versioned files for keys, proofs and accumulators.
pub mod io;
/// Pedersen vector commitments with proof of knowledge.
pub mod pedersen;
/// Groth16 proof object.
pub mod proof;
/// Groth16 prover.
pub mod prover;
/// QAP evaluation at the setup point.
pub mod qap;
/// Constraint systems, builder and assignments.
pub mod r1cs;
/// Trusted setup and key types.
pub mod setup;
/// Fiat–Shamir transcript (domain-separated hashing, hash→field).
pub mod transcript;
/// Verification and the error taxonomy.
pub mod verifier;

#[cfg(test)]
mod testing;

pub use crate::folding::{verify_folded, Accumulator, FoldError, FoldedProof, FoldedWitness, FoldingParameters, PublicWitness};
pub use crate::proof::Proof;
pub use crate::prover::{prove, ProveError};
pub use crate::setup::{dummy_setup, ProvingKey, SetupError, VerifyingKey};
pub use crate::verifier::{verify, Verdict, VerifierOptions, VerifyError};
