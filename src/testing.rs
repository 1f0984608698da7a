//! Circuit fixtures for unit tests.

use ark_ec::pairing::Pairing;
use ark_ff::{Field, One};

use crate::prover::solve_commitment_wires;
use crate::r1cs::{Assignment, R1cs, R1csBuilder, Variable};
use crate::setup::ProvingKey;
use crate::verifier::DEFAULT_COMMITMENT_DST;

/// `x · x = y`, `y` public.
pub struct SquareCircuit<F: Field> {
    pub cs: R1cs<F>,
    pub x: Variable,
    pub y: Variable,
}

pub fn square_circuit<F: Field>() -> SquareCircuit<F> {
    let mut b = R1csBuilder::<F>::new();
    let y = b.public_input();
    let x = b.secret_input();
    b.enforce(vec![(F::one(), x)], vec![(F::one(), x)], vec![(F::one(), y)]);
    SquareCircuit {
        cs: b.build().expect("square circuit"),
        x,
        y,
    }
}

impl<F: Field> SquareCircuit<F> {
    /// Unchecked assignment `(x, y)`.
    pub fn assignment(&self, x: u64, y: u64) -> Assignment<F> {
        let mut a = Assignment::new(&self.cs);
        a.set(&self.cs, self.x, F::from(x));
        a.set(&self.cs, self.y, F::from(y));
        a
    }
}

/// ```text
/// x · x         = y
/// cw · x        = z        cw = H(Commit(x) ‖ y)
/// (x + z)(x + 1) = u
/// ```
///
/// Wires: `ONE, y, x, cw, z, u`.
pub struct CommitmentCircuit<F: Field> {
    pub cs: R1cs<F>,
    pub x: Variable,
    pub y: Variable,
    pub commitment: Variable,
    pub z: Variable,
    pub u: Variable,
}

pub fn commitment_circuit<F: Field>() -> CommitmentCircuit<F> {
    let one = F::one();
    let mut b = R1csBuilder::<F>::new();
    let y = b.public_input();
    let x = b.secret_input();
    let commitment = b.commit(&[x, y]);
    let z = b.internal();
    let u = b.internal();
    b.enforce(vec![(one, x)], vec![(one, x)], vec![(one, y)]);
    b.enforce(vec![(one, commitment)], vec![(one, x)], vec![(one, z)]);
    b.enforce(
        vec![(one, x), (one, z)],
        vec![(one, x), (one, Variable::ONE)],
        vec![(one, u)],
    );
    CommitmentCircuit {
        cs: b.build().expect("commitment circuit"),
        x,
        y,
        commitment,
        z,
        u,
    }
}

impl<F: Field> CommitmentCircuit<F> {
    /// Satisfying assignment for `x`, with the commitment wire solved
    /// against `pk`.
    pub fn assignment<E: Pairing<ScalarField = F>>(&self, pk: &ProvingKey<E>, x: u64) -> Assignment<F> {
        let cs = &self.cs;
        let x = F::from(x);
        let mut a = Assignment::new(cs);
        a.set(cs, self.x, x);
        a.set(cs, self.y, x * x);
        solve_commitment_wires(pk, cs, &mut a, DEFAULT_COMMITMENT_DST).expect("solve commitment");
        let z = a.get(cs, self.commitment) * x;
        a.set(cs, self.z, z);
        a.set(cs, self.u, (x + z) * (x + F::one()));
        a
    }
}
