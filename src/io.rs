//! Versioned files for keys, proofs and accumulators
//!
//! ```text
//! magic (8 bytes) ‖ version (u16, big-endian) ‖ ark-compressed payload
//! ```
//!
//! Every object type has its own magic so a proof file can never be loaded as
//! a key. Loading always validates points (curve and subgroup), and a
//! [`VerifyingKey`] recomputes its cached pairing and negations while being
//! deserialized.

#![forbid(unsafe_code)]

use ark_ec::pairing::Pairing;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

use crate::folding::{Accumulator, FoldingParameters};
use crate::proof::Proof;
use crate::setup::{ProvingKey, VerifyingKey};

/// Magic of a [`ProvingKey`] file.
pub const PROVING_KEY_MAGIC: &[u8; 8] = b"G16FPK\0\0";
/// Magic of a [`VerifyingKey`] file.
pub const VERIFYING_KEY_MAGIC: &[u8; 8] = b"G16FVK\0\0";
/// Magic of a [`Proof`] file.
pub const PROOF_MAGIC: &[u8; 8] = b"G16FPRF\0";
/// Magic of an accumulator-with-history file.
pub const ACCUMULATOR_MAGIC: &[u8; 8] = b"G16FACC\0";
/// Version written after the magic; any other value is refused.
pub const FORMAT_VERSION: u16 = 1;

/// Errors that can occur while reading or writing artifact files.
#[derive(Debug, thiserror::Error)]
pub enum KeyIoError {
    /// File I/O error (file not found, permissions, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to serialize the payload
    #[error("serialization error: {0}")]
    Serialize(String),
    /// Payload is truncated, off-curve or outside the subgroup
    #[error("deserialization error: {0}")]
    Deserialize(String),
    /// The file holds a different kind of object
    #[error("bad magic: expected {expected:?}")]
    BadMagic {
        /// Magic the caller asked for.
        expected: &'static [u8; 8],
    },
    /// Written by an incompatible version
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),
}

/// Writes `magic ‖ version ‖ payload` to `w`.
pub fn write_object<T: CanonicalSerialize, W: Write>(
    mut w: W,
    magic: &'static [u8; 8],
    obj: &T,
) -> Result<(), KeyIoError> {
    let mut payload = Vec::with_capacity(obj.compressed_size());
    obj.serialize_compressed(&mut payload)
        .map_err(|e| KeyIoError::Serialize(e.to_string()))?;
    w.write_all(magic)?;
    w.write_all(&FORMAT_VERSION.to_be_bytes())?;
    w.write_all(&payload)?;
    w.flush()?;
    Ok(())
}

/// Reads an object written by [`write_object`] with the same magic.
pub fn read_object<T: CanonicalDeserialize, R: Read>(mut r: R, magic: &'static [u8; 8]) -> Result<T, KeyIoError> {
    let mut got = [0u8; 8];
    r.read_exact(&mut got)?;
    if &got != magic {
        return Err(KeyIoError::BadMagic { expected: magic });
    }
    let mut ver = [0u8; 2];
    r.read_exact(&mut ver)?;
    let version = u16::from_be_bytes(ver);
    if version != FORMAT_VERSION {
        return Err(KeyIoError::UnsupportedVersion(version));
    }
    let mut payload = Vec::new();
    r.read_to_end(&mut payload)?;
    T::deserialize_compressed(payload.as_slice()).map_err(|e| KeyIoError::Deserialize(e.to_string()))
}

fn save<T: CanonicalSerialize>(path: &Path, magic: &'static [u8; 8], obj: &T) -> Result<(), KeyIoError> {
    let f = fs::File::create(path)?;
    write_object(std::io::BufWriter::new(f), magic, obj)?;
    debug!(path = %path.display(), bytes = obj.compressed_size(), "saved");
    Ok(())
}

fn load<T: CanonicalDeserialize>(path: &Path, magic: &'static [u8; 8]) -> Result<T, KeyIoError> {
    let f = fs::File::open(path)?;
    read_object(std::io::BufReader::new(f), magic)
}

/// Writes `pk` under [`PROVING_KEY_MAGIC`].
pub fn save_proving_key<E: Pairing>(path: impl AsRef<Path>, pk: &ProvingKey<E>) -> Result<(), KeyIoError> {
    save(path.as_ref(), PROVING_KEY_MAGIC, pk)
}

/// Reads a file written by [`save_proving_key`].
pub fn load_proving_key<E: Pairing>(path: impl AsRef<Path>) -> Result<ProvingKey<E>, KeyIoError> {
    load(path.as_ref(), PROVING_KEY_MAGIC)
}

/// Writes `vk` under [`VERIFYING_KEY_MAGIC`].
pub fn save_verifying_key<E: Pairing>(path: impl AsRef<Path>, vk: &VerifyingKey<E>) -> Result<(), KeyIoError> {
    save(path.as_ref(), VERIFYING_KEY_MAGIC, vk)
}

/// The returned key has fresh caches; see [`VerifyingKey::precompute`].
pub fn load_verifying_key<E: Pairing>(path: impl AsRef<Path>) -> Result<VerifyingKey<E>, KeyIoError> {
    load(path.as_ref(), VERIFYING_KEY_MAGIC)
}

/// Writes `proof` under [`PROOF_MAGIC`].
pub fn save_proof<E: Pairing>(path: impl AsRef<Path>, proof: &Proof<E>) -> Result<(), KeyIoError> {
    save(path.as_ref(), PROOF_MAGIC, proof)
}

/// Reads a file written by [`save_proof`].
pub fn load_proof<E: Pairing>(path: impl AsRef<Path>) -> Result<Proof<E>, KeyIoError> {
    load(path.as_ref(), PROOF_MAGIC)
}

/// Saves an accumulator together with the folding history that produced it.
pub fn save_accumulator<E: Pairing>(
    path: impl AsRef<Path>,
    acc: &Accumulator<E>,
    params: &[FoldingParameters<E>],
) -> Result<(), KeyIoError> {
    save(path.as_ref(), ACCUMULATOR_MAGIC, &(acc.clone(), params.to_vec()))
}

/// Reads a file written by [`save_accumulator`].
pub fn load_accumulator<E: Pairing>(
    path: impl AsRef<Path>,
) -> Result<(Accumulator<E>, Vec<FoldingParameters<E>>), KeyIoError> {
    load(path.as_ref(), ACCUMULATOR_MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folding::{fold_all, PublicWitness};
    use crate::prover::prove;
    use crate::setup::setup;
    use crate::testing::commitment_circuit;
    use crate::verifier::verify;
    use ark_bn254::{Bn254, Fr};
    use rand::{rngs::StdRng, SeedableRng};
    use tempfile::tempdir;

    #[test]
    fn keys_and_proofs_roundtrip_through_files() {
        let mut rng = StdRng::seed_from_u64(60);
        let c = commitment_circuit::<Fr>();
        let (pk, vk) = setup::<Bn254, _, _>(&c.cs, &mut rng).unwrap();
        let dir = tempdir().unwrap();

        save_proving_key(dir.path().join("pk.bin"), &pk).unwrap();
        save_verifying_key(dir.path().join("vk.bin"), &vk).unwrap();
        let pk2: ProvingKey<Bn254> = load_proving_key(dir.path().join("pk.bin")).unwrap();
        let vk2: VerifyingKey<Bn254> = load_verifying_key(dir.path().join("vk.bin")).unwrap();
        assert_eq!(pk2, pk);
        assert_eq!(vk2.digest(), vk.digest());
        assert_eq!(vk2.e(), vk.e());

        // a proof from the reloaded key verifies under the reloaded vk
        let a = c.assignment(&pk2, 6);
        let proof = prove(&pk2, &c.cs, &a, &mut rng).unwrap();
        save_proof(dir.path().join("proof.bin"), &proof).unwrap();
        let proof2: Proof<Bn254> = load_proof(dir.path().join("proof.bin")).unwrap();
        verify(&vk2, &proof2, &a.public_witness(&c.cs)).unwrap();
    }

    #[test]
    fn accumulator_roundtrip_keeps_history() {
        let mut rng = StdRng::seed_from_u64(61);
        let c = commitment_circuit::<Fr>();
        let (pk, vk) = setup::<Bn254, _, _>(&c.cs, &mut rng).unwrap();
        let (proofs, witnesses): (Vec<_>, Vec<_>) = [2u64, 3, 4]
            .iter()
            .map(|&x| {
                let a = c.assignment(&pk, x);
                (
                    prove(&pk, &c.cs, &a, &mut rng).unwrap(),
                    PublicWitness::<Bn254>::new(a.public_witness(&c.cs)),
                )
            })
            .unzip();
        let (acc, params) = fold_all(&vk, &proofs, &witnesses).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("acc.bin");
        save_accumulator(&path, &acc, &params).unwrap();
        let (acc2, params2) = load_accumulator::<Bn254>(&path).unwrap();
        assert_eq!(acc2, acc);
        assert_eq!(params2, params);
        acc2.verify(&vk).unwrap();
    }

    #[test]
    fn rejects_wrong_magic_and_version() {
        let mut rng = StdRng::seed_from_u64(62);
        let c = commitment_circuit::<Fr>();
        let (_, vk) = setup::<Bn254, _, _>(&c.cs, &mut rng).unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("vk.bin");
        save_verifying_key(&path, &vk).unwrap();

        assert!(matches!(
            load_proof::<Bn254>(&path),
            Err(KeyIoError::BadMagic { .. })
        ));

        let mut bytes = fs::read(&path).unwrap();
        bytes[8..10].copy_from_slice(&7u16.to_be_bytes());
        assert!(matches!(
            read_object::<VerifyingKey<Bn254>, _>(bytes.as_slice(), VERIFYING_KEY_MAGIC),
            Err(KeyIoError::UnsupportedVersion(7))
        ));

        let mut truncated = fs::read(&path).unwrap();
        truncated.truncate(truncated.len() - 4);
        assert!(matches!(
            read_object::<VerifyingKey<Bn254>, _>(truncated.as_slice(), VERIFYING_KEY_MAGIC),
            Err(KeyIoError::Deserialize(_))
        ));
    }
}
