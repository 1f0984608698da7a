//! Rank-1 constraint systems
//!
//! The setup engine only needs a read-only view of a circuit: wire counts, the
//! constraints in a fixed order, the interned coefficient table and which wires
//! are committed to. That view is the [`ConstraintSystem`] trait. [`R1cs`] is a
//! concrete in-memory implementation and [`R1csBuilder`] a small front end to
//! produce one.
//!
//! ## Wire layout
//!
//! ```text
//! [ 0 = ONE | public inputs | secret inputs | internal wires ]
//! ```
//!
//! Every constraint is `⟨L, w⟩ · ⟨R, w⟩ = ⟨O, w⟩` where each linear combination
//! is a list of [`Term`]s. A commitment wire is an internal wire whose value is
//! the hash of a Pedersen commitment to a group of wires; for the Groth16 layer
//! it behaves like a public input injected by the verifier.

#![forbid(unsafe_code)]

use std::collections::HashMap;

use ark_ff::{Field, One, Zero};

/// Index into a constraint system's coefficient table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoeffId(pub u32);

impl CoeffId {
    /// Reserved id for `0`.
    pub const ZERO: CoeffId = CoeffId(0);
    /// Reserved id for `1`.
    pub const ONE: CoeffId = CoeffId(1);
    /// Reserved id for `2`.
    pub const TWO: CoeffId = CoeffId(2);
    /// Reserved id for `−1`.
    pub const MINUS_ONE: CoeffId = CoeffId(3);
}

/// Values every coefficient table must start with, indexed by the reserved
/// [`CoeffId`]s.
pub fn reserved_coefficients<F: Field>() -> [F; 4] {
    [F::zero(), F::one(), F::from(2u64), -F::one()]
}

/// `coeff · w[wire]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Term {
    /// Wire index.
    pub wire: usize,
    /// Coefficient, interned.
    pub coeff: CoeffId,
}

/// `L · R = O`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraint {
    /// Left linear combination.
    pub l: Vec<Term>,
    /// Right linear combination.
    pub r: Vec<Term>,
    /// Output linear combination.
    pub o: Vec<Term>,
}

/// One Pedersen commitment declared by the circuit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentInfo {
    /// Committed wires in increasing order (public, secret or internal).
    pub committed: Vec<usize>,
    /// Internal wire receiving the commitment hash.
    pub commitment_wire: usize,
}

/// Result of partitioning the committed wires, see [`interleave`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitmentLayout {
    /// Committed wires that are neither public nor commitment wires, per group.
    pub private_committed: Vec<Vec<usize>>,
    /// Commitment wire of each group, increasing.
    pub commitment_wires: Vec<usize>,
    /// Per group, positions in the extended public vector of the committed
    /// public values (`1..nb_public` for public inputs, `nb_public + k` for the
    /// wire of an earlier commitment `k`).
    pub public_and_commitment_committed: Vec<Vec<usize>>,
}

impl CommitmentLayout {
    /// Total number of privately committed wires.
    pub fn nb_private_committed(&self) -> usize {
        self.private_committed.iter().map(Vec::len).sum()
    }
}

/// Errors produced while building or checking a constraint system.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum R1csError {
    /// Setup needs at least one constraint.
    #[error("constraint system has no constraints")]
    NoConstraints,
    /// The ONE wire is missing.
    #[error("constraint system has no public wire")]
    NoPublicWire,
    /// A term points past the last wire.
    #[error("wire {wire} out of range ({nb_wires} wires)")]
    WireOutOfRange {
        /// Offending wire index.
        wire: usize,
        /// Wires in the system.
        nb_wires: usize,
    },
    /// A term points past the end of the coefficient table.
    #[error("coefficient id {coeff} out of range ({nb_coefficients} coefficients)")]
    CoefficientOutOfRange {
        /// Offending coefficient id.
        coeff: u32,
        /// Size of the coefficient table.
        nb_coefficients: usize,
    },
    /// A reserved slot of the coefficient table holds the wrong value.
    #[error("reserved coefficient id {0} does not hold its fixed value")]
    ReservedCoefficient(u32),
    /// A commitment declaration breaks the wire ordering rules.
    #[error("commitment {index} is malformed: {reason}")]
    BadCommitment {
        /// Position of the commitment.
        index: usize,
        /// Rule it breaks.
        reason: &'static str,
    },
    /// The assignment does not cover every wire.
    #[error("assignment has {got} values, expected {expected}")]
    AssignmentLength {
        /// Values supplied.
        got: usize,
        /// Wires in the system.
        expected: usize,
    },
    /// Index of the first constraint the assignment violates.
    #[error("constraint {0} is not satisfied")]
    Unsatisfied(usize),
}

/// Read-only view of a circuit consumed by setup and the prover.
///
/// The coefficient table must start with `[0, 1, 2, −1]` at the reserved ids
/// [`CoeffId::ZERO`], [`CoeffId::ONE`], [`CoeffId::TWO`] and
/// [`CoeffId::MINUS_ONE`]: QAP evaluation uses those values without looking
/// them up. [`validate`] rejects any other table.
pub trait ConstraintSystem<F: Field> {
    /// Public wires, including the constant-one wire 0.
    fn nb_public_variables(&self) -> usize;
    /// Secret input wires.
    fn nb_secret_variables(&self) -> usize;
    /// Internal wires, commitment wires included.
    fn nb_internal_variables(&self) -> usize;
    /// Constraints in evaluation order.
    fn constraints(&self) -> &[Constraint];
    /// Size of the coefficient table.
    fn nb_coefficients(&self) -> usize;
    /// Value of an interned coefficient; `id` must be below
    /// [`nb_coefficients`](Self::nb_coefficients).
    fn coefficient(&self, id: CoeffId) -> F;
    /// Declared commitments, ordered by commitment wire.
    fn commitments(&self) -> &[CommitmentInfo];

    /// Number of constraints.
    fn nb_constraints(&self) -> usize {
        self.constraints().len()
    }

    /// Total number of wires.
    fn nb_wires(&self) -> usize {
        self.nb_public_variables() + self.nb_secret_variables() + self.nb_internal_variables()
    }
}

/// Splits each commitment's wire list into the private part (committed with
/// Pedersen bases) and the public part (hashed by the verifier).
pub fn interleave(commitments: &[CommitmentInfo], nb_public: usize) -> CommitmentLayout {
    let commitment_wires: Vec<usize> = commitments.iter().map(|c| c.commitment_wire).collect();
    let mut layout = CommitmentLayout {
        commitment_wires: commitment_wires.clone(),
        ..Default::default()
    };
    for c in commitments {
        let mut private = Vec::new();
        let mut public = Vec::new();
        for &w in &c.committed {
            if w < nb_public {
                public.push(w);
            } else if let Ok(k) = commitment_wires.binary_search(&w) {
                public.push(nb_public + k);
            } else {
                private.push(w);
            }
        }
        layout.private_committed.push(private);
        layout.public_and_commitment_committed.push(public);
    }
    layout
}

/// Checks the coefficient table, term indices and commitment declarations.
pub fn validate<F: Field, CS: ConstraintSystem<F> + ?Sized>(cs: &CS) -> Result<(), R1csError> {
    if cs.nb_constraints() == 0 {
        return Err(R1csError::NoConstraints);
    }
    if cs.nb_public_variables() == 0 {
        return Err(R1csError::NoPublicWire);
    }
    let nb_coefficients = cs.nb_coefficients();
    for (id, want) in reserved_coefficients::<F>().into_iter().enumerate() {
        let id = id as u32;
        if (id as usize) >= nb_coefficients || cs.coefficient(CoeffId(id)) != want {
            return Err(R1csError::ReservedCoefficient(id));
        }
    }
    let nb_wires = cs.nb_wires();
    let check = |t: &Term| {
        if t.wire >= nb_wires {
            return Err(R1csError::WireOutOfRange {
                wire: t.wire,
                nb_wires,
            });
        }
        if t.coeff.0 as usize >= nb_coefficients {
            return Err(R1csError::CoefficientOutOfRange {
                coeff: t.coeff.0,
                nb_coefficients,
            });
        }
        Ok(())
    };
    for c in cs.constraints() {
        c.l.iter().chain(&c.r).chain(&c.o).try_for_each(check)?;
    }

    let first_internal = cs.nb_public_variables() + cs.nb_secret_variables();
    let mut prev_wire = None;
    let mut seen_private = std::collections::HashSet::new();
    for (index, c) in cs.commitments().iter().enumerate() {
        let bad = |reason| R1csError::BadCommitment { index, reason };
        if c.commitment_wire < first_internal || c.commitment_wire >= nb_wires {
            return Err(bad("commitment wire must be internal"));
        }
        if prev_wire.map_or(false, |p| p >= c.commitment_wire) {
            return Err(bad("commitment wires must be increasing"));
        }
        prev_wire = Some(c.commitment_wire);
        if c.committed.windows(2).any(|w| w[0] >= w[1]) {
            return Err(bad("committed wires must be strictly increasing"));
        }
        for &w in &c.committed {
            if w >= c.commitment_wire || w == 0 {
                return Err(bad("committed wire must precede the commitment and not be ONE"));
            }
        }
    }
    let layout = interleave(cs.commitments(), cs.nb_public_variables());
    for (index, group) in layout.private_committed.iter().enumerate() {
        for &w in group {
            if !seen_private.insert(w) {
                return Err(R1csError::BadCommitment {
                    index,
                    reason: "private wire committed twice",
                });
            }
        }
    }
    Ok(())
}

/// In-memory R1CS.
///
/// Fields are public so circuits can be assembled by hand; [`validate`] (run
/// by [`R1csBuilder::build`] and by setup) is what makes one usable.
#[derive(Debug, Clone, PartialEq)]
pub struct R1cs<F: Field> {
    /// Public wires, ONE included.
    pub nb_public: usize,
    /// Secret input wires.
    pub nb_secret: usize,
    /// Internal wires.
    pub nb_internal: usize,
    /// Interned coefficients, starting with [`reserved_coefficients`].
    pub coefficients: Vec<F>,
    /// Constraints in evaluation order.
    pub constraints: Vec<Constraint>,
    /// Declared commitments.
    pub commitments: Vec<CommitmentInfo>,
}

impl<F: Field> ConstraintSystem<F> for R1cs<F> {
    fn nb_public_variables(&self) -> usize {
        self.nb_public
    }
    fn nb_secret_variables(&self) -> usize {
        self.nb_secret
    }
    fn nb_internal_variables(&self) -> usize {
        self.nb_internal
    }
    fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }
    fn nb_coefficients(&self) -> usize {
        self.coefficients.len()
    }
    fn coefficient(&self, id: CoeffId) -> F {
        self.coefficients
            .get(id.0 as usize)
            .copied()
            .unwrap_or_else(F::zero)
    }
    fn commitments(&self) -> &[CommitmentInfo] {
        &self.commitments
    }
}

impl<F: Field> R1cs<F> {
    /// Wire index of a builder variable.
    pub fn wire(&self, v: Variable) -> usize {
        match v {
            Variable::Public(i) => i,
            Variable::Secret(i) => self.nb_public + i,
            Variable::Internal(i) => self.nb_public + self.nb_secret + i,
        }
    }

    /// Checks every constraint against a full assignment.
    pub fn is_satisfied(&self, a: &Assignment<F>) -> Result<(), R1csError> {
        is_satisfied(self, a.values())
    }
}

/// `⟨terms, values⟩`
pub fn eval_lc<F: Field, CS: ConstraintSystem<F> + ?Sized>(cs: &CS, terms: &[Term], values: &[F]) -> F {
    terms
        .iter()
        .fold(F::zero(), |acc, t| acc + cs.coefficient(t.coeff) * values[t.wire])
}

/// First unsatisfied constraint, if any.
pub fn is_satisfied<F: Field, CS: ConstraintSystem<F> + ?Sized>(
    cs: &CS,
    values: &[F],
) -> Result<(), R1csError> {
    if values.len() != cs.nb_wires() {
        return Err(R1csError::AssignmentLength {
            got: values.len(),
            expected: cs.nb_wires(),
        });
    }
    for (i, c) in cs.constraints().iter().enumerate() {
        let l = eval_lc(cs, &c.l, values);
        let r = eval_lc(cs, &c.r, values);
        let o = eval_lc(cs, &c.o, values);
        if l * r != o {
            return Err(R1csError::Unsatisfied(i));
        }
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Builder
// ----------------------------------------------------------------------------

/// Handle to a variable; resolved to a wire index by [`R1cs::wire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    /// `i`-th public wire; `Public(0)` is ONE.
    Public(usize),
    /// `i`-th secret input.
    Secret(usize),
    /// `i`-th internal wire.
    Internal(usize),
}

impl Variable {
    /// The constant-one wire.
    pub const ONE: Variable = Variable::Public(0);
}

/// Linear combination over builder variables.
pub type Lc<F> = Vec<(F, Variable)>;

/// Incremental constraint system builder.
#[derive(Debug, Clone)]
pub struct R1csBuilder<F: Field> {
    nb_public: usize,
    nb_secret: usize,
    nb_internal: usize,
    coefficients: Vec<F>,
    interned: HashMap<F, u32>,
    constraints: Vec<[Lc<F>; 3]>,
    commitments: Vec<(Vec<Variable>, Variable)>,
}

impl<F: Field> Default for R1csBuilder<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Field> R1csBuilder<F> {
    /// Empty system holding only the ONE wire.
    pub fn new() -> Self {
        let coefficients = reserved_coefficients::<F>().to_vec();
        let interned = coefficients
            .iter()
            .enumerate()
            .map(|(i, c)| (*c, i as u32))
            .collect();
        Self {
            nb_public: 1,
            nb_secret: 0,
            nb_internal: 0,
            coefficients,
            interned,
            constraints: Vec::new(),
            commitments: Vec::new(),
        }
    }

    /// Allocates the next public input.
    pub fn public_input(&mut self) -> Variable {
        self.nb_public += 1;
        Variable::Public(self.nb_public - 1)
    }

    /// Allocates the next secret input.
    pub fn secret_input(&mut self) -> Variable {
        self.nb_secret += 1;
        Variable::Secret(self.nb_secret - 1)
    }

    /// Allocates an internal wire.
    pub fn internal(&mut self) -> Variable {
        self.nb_internal += 1;
        Variable::Internal(self.nb_internal - 1)
    }

    /// Adds `L · R = O`.
    pub fn enforce(&mut self, l: Lc<F>, r: Lc<F>, o: Lc<F>) {
        self.constraints.push([l, r, o]);
    }

    /// Declares a commitment to `vars` and returns the wire carrying its hash.
    pub fn commit(&mut self, vars: &[Variable]) -> Variable {
        let wire = self.internal();
        self.commitments.push((vars.to_vec(), wire));
        wire
    }

    fn intern(&mut self, c: F) -> CoeffId {
        if let Some(id) = self.interned.get(&c) {
            return CoeffId(*id);
        }
        let id = self.coefficients.len() as u32;
        self.coefficients.push(c);
        self.interned.insert(c, id);
        CoeffId(id)
    }

    /// Resolves variables, interns coefficients and validates the result.
    pub fn build(mut self) -> Result<R1cs<F>, R1csError> {
        let mut out = R1cs {
            nb_public: self.nb_public,
            nb_secret: self.nb_secret,
            nb_internal: self.nb_internal,
            coefficients: Vec::new(),
            constraints: Vec::with_capacity(self.constraints.len()),
            commitments: Vec::with_capacity(self.commitments.len()),
        };
        let constraints = std::mem::take(&mut self.constraints);
        for [l, r, o] in constraints {
            let mut lower = |lc: Lc<F>| -> Vec<Term> {
                lc.into_iter()
                    .filter(|(c, _)| !c.is_zero())
                    .map(|(c, v)| Term {
                        wire: out.wire(v),
                        coeff: self.intern(c),
                    })
                    .collect()
            };
            let c = Constraint {
                l: lower(l),
                r: lower(r),
                o: lower(o),
            };
            out.constraints.push(c);
        }
        for (vars, wire) in std::mem::take(&mut self.commitments) {
            let mut committed: Vec<usize> = vars.iter().map(|v| out.wire(*v)).collect();
            committed.sort_unstable();
            committed.dedup();
            out.commitments.push(CommitmentInfo {
                committed,
                commitment_wire: out.wire(wire),
            });
        }
        out.coefficients = self.coefficients;
        validate::<F, _>(&out)?;
        Ok(out)
    }
}

/// Full wire assignment, indexed like the constraint system's wires.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment<F: Field> {
    values: Vec<F>,
}

impl<F: Field> Assignment<F> {
    /// All-zero assignment with the ONE wire set.
    pub fn new<CS: ConstraintSystem<F> + ?Sized>(cs: &CS) -> Self {
        let mut values = vec![F::zero(); cs.nb_wires()];
        if let Some(one) = values.first_mut() {
            *one = F::one();
        }
        Self { values }
    }

    /// Sets a builder variable.
    pub fn set(&mut self, r1cs: &R1cs<F>, v: Variable, value: F) {
        let w = r1cs.wire(v);
        self.values[w] = value;
    }

    /// Reads a builder variable.
    pub fn get(&self, r1cs: &R1cs<F>, v: Variable) -> F {
        self.values[r1cs.wire(v)]
    }

    /// Sets a wire by index.
    pub fn set_wire(&mut self, wire: usize, value: F) {
        self.values[wire] = value;
    }

    /// Every wire value, ONE first.
    pub fn values(&self) -> &[F] {
        &self.values
    }

    /// Public inputs without the ONE wire, as handed to the verifier.
    pub fn public_witness<CS: ConstraintSystem<F> + ?Sized>(&self, cs: &CS) -> Vec<F> {
        self.values[1..cs.nb_public_variables()].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;

    #[test]
    fn builder_lays_out_wires_and_interns_coefficients() {
        let mut b = R1csBuilder::<Fr>::new();
        let y = b.public_input();
        let x = b.secret_input();
        let t = b.internal();
        b.enforce(vec![(Fr::one(), x)], vec![(Fr::one(), x)], vec![(Fr::one(), t)]);
        b.enforce(
            vec![(Fr::from(5u64), t), (-Fr::one(), y)],
            vec![(Fr::one(), Variable::ONE)],
            vec![(Fr::zero(), y)],
        );
        let cs = b.build().unwrap();

        assert_eq!(cs.nb_wires(), 4);
        assert_eq!(cs.wire(y), 1);
        assert_eq!(cs.wire(x), 2);
        assert_eq!(cs.wire(t), 3);
        assert_eq!(cs.constraints[0].l[0].coeff, CoeffId::ONE);
        assert_eq!(cs.constraints[1].l[1].coeff, CoeffId::MINUS_ONE);
        assert_eq!(cs.constraints[1].l[0].coeff, CoeffId(4));
        assert_eq!(cs.coefficient(CoeffId(4)), Fr::from(5u64));
        // zero terms are dropped
        assert!(cs.constraints[1].o.is_empty());
    }

    #[test]
    fn satisfaction_reports_failing_constraint() {
        let mut b = R1csBuilder::<Fr>::new();
        let y = b.public_input();
        let x = b.secret_input();
        b.enforce(vec![(Fr::one(), x)], vec![(Fr::one(), x)], vec![(Fr::one(), y)]);
        let cs = b.build().unwrap();

        let mut a = Assignment::new(&cs);
        a.set(&cs, x, Fr::from(3u64));
        a.set(&cs, y, Fr::from(9u64));
        assert!(cs.is_satisfied(&a).is_ok());
        assert_eq!(a.public_witness(&cs), vec![Fr::from(9u64)]);

        a.set(&cs, y, Fr::from(10u64));
        assert_eq!(cs.is_satisfied(&a), Err(R1csError::Unsatisfied(0)));
    }

    #[test]
    fn interleave_splits_public_and_private() {
        let mut b = R1csBuilder::<Fr>::new();
        let y = b.public_input();
        let x = b.secret_input();
        let z = b.secret_input();
        b.enforce(vec![(Fr::one(), x)], vec![(Fr::one(), z)], vec![(Fr::one(), y)]);
        let c0 = b.commit(&[x, y]);
        let _c1 = b.commit(&[z, c0]);
        let cs = b.build().unwrap();

        let layout = interleave(&cs.commitments, cs.nb_public);
        assert_eq!(layout.commitment_wires, vec![cs.wire(c0), cs.wire(c0) + 1]);
        assert_eq!(layout.private_committed, vec![vec![cs.wire(x)], vec![cs.wire(z)]]);
        assert_eq!(
            layout.public_and_commitment_committed,
            vec![vec![1], vec![cs.nb_public]]
        );
        assert_eq!(layout.nb_private_committed(), 2);
    }

    #[test]
    fn rejects_out_of_range_wire() {
        let cs = R1cs::<Fr> {
            nb_public: 1,
            nb_secret: 0,
            nb_internal: 0,
            coefficients: reserved_coefficients::<Fr>().to_vec(),
            constraints: vec![Constraint {
                l: vec![Term { wire: 3, coeff: CoeffId::ONE }],
                ..Default::default()
            }],
            commitments: vec![],
        };
        assert_eq!(
            validate::<Fr, _>(&cs),
            Err(R1csError::WireOutOfRange { wire: 3, nb_wires: 1 })
        );
    }

    fn doubled_square() -> R1cs<Fr> {
        // 2·x · 1 = y over wires [ONE, y, x]
        R1cs {
            nb_public: 2,
            nb_secret: 1,
            nb_internal: 0,
            coefficients: reserved_coefficients::<Fr>().to_vec(),
            constraints: vec![Constraint {
                l: vec![Term { wire: 2, coeff: CoeffId::TWO }],
                r: vec![Term { wire: 0, coeff: CoeffId::ONE }],
                o: vec![Term { wire: 1, coeff: CoeffId::ONE }],
            }],
            commitments: vec![],
        }
    }

    #[test]
    fn rejects_tampered_reserved_coefficients() {
        assert_eq!(validate::<Fr, _>(&doubled_square()), Ok(()));

        let mut cs = doubled_square();
        cs.coefficients[2] = Fr::from(3u64);
        assert_eq!(validate::<Fr, _>(&cs), Err(R1csError::ReservedCoefficient(2)));

        let mut cs = doubled_square();
        cs.coefficients[3] = Fr::one();
        assert_eq!(validate::<Fr, _>(&cs), Err(R1csError::ReservedCoefficient(3)));

        let mut cs = doubled_square();
        cs.coefficients.truncate(2);
        assert_eq!(validate::<Fr, _>(&cs), Err(R1csError::ReservedCoefficient(2)));
    }

    #[test]
    fn rejects_out_of_range_coefficient() {
        let mut cs = doubled_square();
        cs.constraints[0].o[0].coeff = CoeffId(9);
        assert_eq!(
            validate::<Fr, _>(&cs),
            Err(R1csError::CoefficientOutOfRange { coeff: 9, nb_coefficients: 4 })
        );
    }
}
