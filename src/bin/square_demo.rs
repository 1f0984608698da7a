//! Demo: Setup → Prove → Verify → Fold → VerifyFolded on BN254
//!
//! Proves knowledge of square roots, optionally with a Pedersen commitment to
//! the root, then folds every proof into one accumulator.
//!
//! ```text
//! square_demo [--proofs N] [--x VALUE] [--commit] [--out DIR]
//! ```
//!
//! With `--out`, the keys, every proof and the accumulator (with its folding
//! history) are written as versioned files.

#![forbid(unsafe_code)]

use std::{env, fs, path::PathBuf, time::Instant};

use ark_bn254::{Bn254, Fr};
use ark_ff::One;
use groth16_fold::{
    folding::{fold_all, PublicWitness},
    io,
    prover::{prove, solve_commitment_wires},
    r1cs::{Assignment, R1cs, R1csBuilder, Variable},
    setup::{setup, ProvingKey},
    verifier::{verify, DEFAULT_COMMITMENT_DST},
};
use rand::rngs::OsRng;
use tracing::info;

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

struct Circuit {
    cs: R1cs<Fr>,
    x: Variable,
    y: Variable,
    /// `(commitment wire, z)` with `z = commitment · x`.
    committed: Option<(Variable, Variable)>,
}

fn build_circuit(commit: bool) -> anyhow::Result<Circuit> {
    let one = Fr::one();
    let mut b = R1csBuilder::<Fr>::new();
    let y = b.public_input();
    let x = b.secret_input();
    b.enforce(vec![(one, x)], vec![(one, x)], vec![(one, y)]);
    let committed = if commit {
        let cw = b.commit(&[x]);
        let z = b.internal();
        b.enforce(vec![(one, cw)], vec![(one, x)], vec![(one, z)]);
        Some((cw, z))
    } else {
        None
    };
    let cs = b.build().map_err(|e| anyhow::anyhow!("build circuit: {e}"))?;
    Ok(Circuit { cs, x, y, committed })
}

fn assign(c: &Circuit, pk: &ProvingKey<Bn254>, x: u64) -> anyhow::Result<Assignment<Fr>> {
    let x = Fr::from(x);
    let mut a = Assignment::new(&c.cs);
    a.set(&c.cs, c.x, x);
    a.set(&c.cs, c.y, x * x);
    if let Some((cw, z)) = c.committed {
        solve_commitment_wires(pk, &c.cs, &mut a, DEFAULT_COMMITMENT_DST)?;
        let hash = a.get(&c.cs, cw);
        a.set(&c.cs, z, hash * x);
    }
    Ok(a)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "groth16_fold=info,square_demo=info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().collect();
    let nb_proofs: usize = parse_flag(&args, "--proofs")
        .map(|s| s.parse())
        .transpose()
        .map_err(|e| anyhow::anyhow!("--proofs: {e}"))?
        .unwrap_or(4);
    let base_x: u64 = parse_flag(&args, "--x")
        .map(|s| s.parse())
        .transpose()
        .map_err(|e| anyhow::anyhow!("--x: {e}"))?
        .unwrap_or(3);
    let commit = has_flag(&args, "--commit");
    let out = parse_flag(&args, "--out").map(PathBuf::from);
    if nb_proofs == 0 {
        anyhow::bail!("--proofs must be at least 1");
    }

    let circuit = build_circuit(commit)?;
    let mut rng = OsRng;

    let (pk, vk) = setup::<Bn254, _, _>(&circuit.cs, &mut rng)?;
    info!(
        vk_digest = %hex::encode(vk.digest()),
        g1 = pk.nb_g1(),
        g2 = pk.nb_g2(),
        "keys ready"
    );

    let mut proofs = Vec::with_capacity(nb_proofs);
    let mut witnesses = Vec::with_capacity(nb_proofs);
    let t = Instant::now();
    for i in 0..nb_proofs as u64 {
        let a = assign(&circuit, &pk, base_x + i)?;
        let proof = prove(&pk, &circuit.cs, &a, &mut rng)?;
        let public = a.public_witness(&circuit.cs);
        verify(&vk, &proof, &public)?;
        proofs.push(proof);
        witnesses.push(PublicWitness::<Bn254>::new(public));
    }
    info!(proofs = nb_proofs, elapsed = ?t.elapsed(), "proved and verified individually");

    let t = Instant::now();
    let (acc, params) = fold_all(&vk, &proofs, &witnesses)?;
    acc.verify(&vk)?;
    info!(steps = params.len(), elapsed = ?t.elapsed(), "folded accumulator verified");

    if let Some(dir) = out {
        fs::create_dir_all(&dir)?;
        io::save_proving_key(dir.join("pk.bin"), &pk)?;
        io::save_verifying_key(dir.join("vk.bin"), &vk)?;
        for (i, p) in proofs.iter().enumerate() {
            io::save_proof(dir.join(format!("proof_{i}.bin")), p)?;
        }
        io::save_accumulator(dir.join("accumulator.bin"), &acc, &params)?;
        info!(dir = %dir.display(), "artifacts written");
    }

    println!("ok: {nb_proofs} proof(s), vk {}", hex::encode(&vk.digest()[..8]));
    Ok(())
}
