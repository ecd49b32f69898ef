//! Nonce resolver: scan a bucket's ciphertexts with a candidate secret
//!
//! Each registered reward deposited one ciphertext into the bucket
//! addressed by the key's identity hash. A record is an ECIES box:
//! a 33-byte compressed ephemeral secp256k1 point followed by a
//! ChaCha20-Poly1305 sealed payload, keyed by the SHA-256 of the
//! compressed ECDH shared point. The ephemeral key is fresh per record,
//! so the AEAD nonce is fixed at zero. The sealed payload is exactly
//! nonce(32) || seed(32).
//!
//! Most records in a bucket belong to other keys; a failed open is
//! expected traffic and the scan just moves on.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{ProjectivePoint, PublicKey};
use sha2::{Digest, Sha256};

use crate::artifact::CiphertextBucket;
use crate::constants::NONCE_SEED_LEN;
use crate::key::RedeemSecret;
use crate::{Error, Nonce32, Result, Seed32};

const EPHEMERAL_LEN: usize = 33;

/// One successful bucket decryption: a registered reward for this key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceSeedPair {
    pub nonce: Nonce32,
    pub seed: Seed32,
}

/// Scan every record of `bucket` in file order and collect all pairs the
/// secret can open. A key may legitimately own several entries; zero
/// successes after a full scan means this secret has nothing to redeem
/// here, which is fatal to the attempt.
pub fn resolve(bucket: &CiphertextBucket, secret: &RedeemSecret) -> Result<Vec<NonceSeedPair>> {
    let mut pairs = Vec::new();
    for record in bucket.records() {
        if let Some(pair) = open_record(secret, record) {
            pairs.push(pair);
        }
    }
    if pairs.is_empty() {
        return Err(Error::NonceNotFound {
            bucket: bucket.index(),
            scanned: bucket.records().len(),
        });
    }
    tracing::debug!(
        bucket = bucket.index(),
        found = pairs.len(),
        scanned = bucket.records().len(),
        "nonce bucket scan complete"
    );
    Ok(pairs)
}

/// Attempt one record. Any failure — short record, bad point, AEAD
/// rejection, wrong payload size — yields `None`; wrong-key records are
/// the common case, not an error.
fn open_record(secret: &RedeemSecret, record: &[u8]) -> Option<NonceSeedPair> {
    if record.len() <= EPHEMERAL_LEN {
        return None;
    }
    let ephemeral = PublicKey::from_sec1_bytes(&record[..EPHEMERAL_LEN]).ok()?;
    let key = shared_key(secret, &ephemeral);
    let cipher = ChaCha20Poly1305::new_from_slice(&key).ok()?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&[0u8; 12]), &record[EPHEMERAL_LEN..])
        .ok()?;
    if plaintext.len() != NONCE_SEED_LEN {
        return None;
    }
    let mut nonce = [0u8; 32];
    let mut seed = [0u8; 32];
    nonce.copy_from_slice(&plaintext[..32]);
    seed.copy_from_slice(&plaintext[32..]);
    Some(NonceSeedPair { nonce, seed })
}

/// Symmetric key: SHA-256 of the compressed ECDH shared point
fn shared_key(secret: &RedeemSecret, ephemeral: &PublicKey) -> [u8; 32] {
    let shared = ProjectivePoint::from(*ephemeral.as_affine()) * secret.scalar().as_ref();
    Sha256::digest(shared.to_affine().to_encoded_point(true).as_bytes()).into()
}

/// Generation-side counterpart of [`resolve`]: seal a (nonce, seed) pair
/// to a recipient public key. The bucket files published for a network
/// were produced with this construction; the toolkit also uses it to
/// build synthetic datasets in tests.
pub fn seal_pair(
    recipient: &PublicKey,
    ephemeral_secret: &RedeemSecret,
    nonce: &Nonce32,
    seed: &Seed32,
) -> Result<Vec<u8>> {
    let shared =
        ProjectivePoint::from(*recipient.as_affine()) * ephemeral_secret.scalar().as_ref();
    let key: [u8; 32] =
        Sha256::digest(shared.to_affine().to_encoded_point(true).as_bytes()).into();
    let cipher = ChaCha20Poly1305::new_from_slice(&key)
        .map_err(|_| Error::InvalidKey("bad symmetric key length".into()))?;
    let mut plaintext = [0u8; NONCE_SEED_LEN];
    plaintext[..32].copy_from_slice(nonce);
    plaintext[32..].copy_from_slice(seed);
    let sealed = cipher
        .encrypt(Nonce::from_slice(&[0u8; 12]), plaintext.as_slice())
        .map_err(|_| Error::InvalidKey("sealing failed".into()))?;

    let mut record = ephemeral_secret
        .public_key()
        .to_encoded_point(true)
        .as_bytes()
        .to_vec();
    record.extend_from_slice(&sealed);
    Ok(record)
}
