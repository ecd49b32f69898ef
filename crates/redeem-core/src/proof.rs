//! Redemption proof assembly, verification, and encodings
//!
//! Key-origin proofs carry two branches: the subtree inclusion path for
//! the transformed key's leaf and the top-level path for the subtree's
//! root, plus an ECDSA signature by the transformed secret. Address-origin
//! proofs carry a single faucet branch and no signature; the address
//! authenticates itself at redemption time.
//!
//! Every freshly built proof is verified before it is returned. A failure
//! there is an internal construction bug, never expected in normal
//! operation.

use base64::Engine;
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::address::TargetAddress;
use crate::artifact::{FaucetList, MainTree};
use crate::index::{find_in_faucet, find_in_main, MainIndex};
use crate::key::{AllocationKey, RedeemSecret, TransformMode};
use crate::nonce::NonceSeedPair;
use crate::params::NetworkParams;
use crate::{merkle, Error, Hash32, Result};

/// A two-branch (key-origin) or single-branch (address-origin) inclusion
/// proof with fee, target, and optional signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionProof {
    /// Position in the main tree (or faucet list)
    pub index: u32,
    /// Inclusion path to the published root
    #[serde(with = "hex_hashes")]
    pub branch: Vec<Hash32>,
    /// Slot within the matched subtree; key-origin only
    pub subindex: Option<u32>,
    /// Inclusion path within the subtree; key-origin only
    #[serde(default, with = "hex_hashes_opt")]
    pub subbranch: Option<Vec<Hash32>>,
    /// Encoded transformed public key; empty for address-origin
    #[serde(with = "hex_bytes")]
    pub key: Vec<u8>,
    /// Target address version
    pub version: u8,
    /// Target address hash (witness program)
    #[serde(with = "hex_bytes")]
    pub address: Vec<u8>,
    /// Requested fee in 1e-6 units
    pub fee: u64,
    /// ECDSA signature over the canonical bytes; key-origin only
    #[serde(default, with = "hex_bytes_opt")]
    pub signature: Option<Vec<u8>>,
}

impl RedemptionProof {
    pub fn is_key_origin(&self) -> bool {
        self.subindex.is_some()
    }

    /// Canonical bytes covered by the signature: everything but the
    /// signature field itself.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.index.to_be_bytes());
        out.push(self.branch.len() as u8);
        for hash in &self.branch {
            out.extend_from_slice(hash);
        }
        match (&self.subindex, &self.subbranch) {
            (Some(subindex), Some(subbranch)) => {
                out.push(1);
                out.extend_from_slice(&subindex.to_be_bytes());
                out.push(subbranch.len() as u8);
                for hash in subbranch {
                    out.extend_from_slice(hash);
                }
            }
            _ => out.push(0),
        }
        out.extend_from_slice(&(self.key.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.key);
        out.push(self.version);
        out.push(self.address.len() as u8);
        out.extend_from_slice(&self.address);
        out.extend_from_slice(&self.fee.to_be_bytes());
        out
    }

    /// Full canonical encoding: signing bytes plus the signature field
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.signing_bytes();
        match &self.signature {
            Some(sig) => {
                out.push(sig.len() as u8);
                out.extend_from_slice(sig);
            }
            None => out.push(0),
        }
        out
    }

    /// The single artifact handed to the chain-submission tool
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.to_bytes())
    }

    /// Decode a canonical encoding produced by [`to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader { bytes, pos: 0 };
        let index = u32::from_be_bytes(r.take(4)?.try_into().expect("4 bytes"));
        let branch_len = r.take(1)?[0] as usize;
        let mut branch = Vec::with_capacity(branch_len);
        for _ in 0..branch_len {
            branch.push(r.take_hash()?);
        }
        let (subindex, subbranch) = if r.take(1)?[0] == 1 {
            let subindex = u32::from_be_bytes(r.take(4)?.try_into().expect("4 bytes"));
            let len = r.take(1)?[0] as usize;
            let mut sub = Vec::with_capacity(len);
            for _ in 0..len {
                sub.push(r.take_hash()?);
            }
            (Some(subindex), Some(sub))
        } else {
            (None, None)
        };
        let key_len = u16::from_be_bytes(r.take(2)?.try_into().expect("2 bytes")) as usize;
        let key = r.take(key_len)?.to_vec();
        let version = r.take(1)?[0];
        let address_len = r.take(1)?[0] as usize;
        let address = r.take(address_len)?.to_vec();
        let fee = u64::from_be_bytes(r.take(8)?.try_into().expect("8 bytes"));
        let sig_len = r.take(1)?[0] as usize;
        let signature = if sig_len == 0 {
            None
        } else {
            Some(r.take(sig_len)?.to_vec())
        };
        if r.pos != bytes.len() {
            return Err(Error::SelfVerification("trailing proof bytes"));
        }
        Ok(Self {
            index,
            branch,
            subindex,
            subbranch,
            key,
            version,
            address,
            fee,
            signature,
        })
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(Error::SelfVerification("truncated proof encoding"));
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn take_hash(&mut self) -> Result<Hash32> {
        Ok(self.take(32)?.try_into().expect("32 bytes"))
    }
}

/// Builds and verifies redemption proofs against one network's pinned roots
pub struct ProofBuilder<'a> {
    params: &'a NetworkParams,
}

impl<'a> ProofBuilder<'a> {
    pub fn new(params: &'a NetworkParams) -> Self {
        Self { params }
    }

    /// Key-origin path: one proof per discovered (nonce, seed) pair.
    #[allow(clippy::too_many_arguments)]
    pub fn key_origin(
        &self,
        tree: &MainTree,
        index: &MainIndex,
        key: &AllocationKey,
        secret: &RedeemSecret,
        mode: TransformMode,
        pair: &NonceSeedPair,
        target: &TargetAddress,
        fee: u64,
    ) -> Result<RedemptionProof> {
        if fee > key.value() {
            return Err(Error::FeeExceedsValue {
                fee,
                value: key.value(),
            });
        }

        let transformed = key.transform(mode, &pair.nonce)?;
        let leaf = transformed.leaf_hash();
        let (i, j) = find_in_main(tree, &leaf).ok_or(Error::LeafNotFound {
            lookup: "main tree",
        })?;

        let subtree = tree.subtree(i).expect("find_in_main returned valid index");
        let subbranch = merkle::branch(subtree, j).expect("slot is within subtree");
        let branch = merkle::branch(index.roots(), i).expect("subtree index is within tree");

        let mut proof = RedemptionProof {
            index: i as u32,
            branch,
            subindex: Some(j as u32),
            subbranch: Some(subbranch),
            key: transformed.encoded(),
            version: target.version(),
            address: target.payload().to_vec(),
            fee,
            signature: None,
        };

        let signing: SigningKey = secret.transformed_signing_key(mode, &pair.nonce)?;
        let signature: Signature = signing.sign(&proof.signing_bytes());
        proof.signature = Some(signature.to_bytes().to_vec());

        self.verify(&proof, key.value())?;
        Ok(proof)
    }

    /// Address-origin path: single faucet branch, no signature.
    pub fn address_origin(&self, faucet: &FaucetList, key: &AllocationKey) -> Result<RedemptionProof> {
        self.address_origin_with_fee(faucet, key, key.value())
    }

    /// Address-origin path with an explicit requested fee.
    pub fn address_origin_with_fee(
        &self,
        faucet: &FaucetList,
        key: &AllocationKey,
        fee: u64,
    ) -> Result<RedemptionProof> {
        if fee > key.value() {
            return Err(Error::FeeExceedsValue {
                fee,
                value: key.value(),
            });
        }
        let address = key
            .registered_address()
            .ok_or_else(|| Error::InvalidKey("address-origin key has no address".into()))?;

        let target = key.identity();
        let i = find_in_faucet(faucet, &target).ok_or(Error::LeafNotFound {
            lookup: "faucet list",
        })?;
        let branch = merkle::branch(faucet.leaves(), i).expect("index is within list");

        let proof = RedemptionProof {
            index: i as u32,
            branch,
            subindex: None,
            subbranch: None,
            key: Vec::new(),
            version: address.version(),
            address: address.payload().to_vec(),
            fee,
            signature: None,
        };

        self.verify(&proof, key.value())?;
        Ok(proof)
    }

    /// Validate a proof against the pinned roots: leaf reconstruction,
    /// branch walk, fee ceiling, and signature where required.
    pub fn verify(&self, proof: &RedemptionProof, value: u64) -> Result<()> {
        if proof.fee > value {
            return Err(Error::FeeExceedsValue {
                fee: proof.fee,
                value,
            });
        }

        if proof.is_key_origin() {
            let subindex = proof.subindex.expect("key-origin proof") as usize;
            let subbranch = proof
                .subbranch
                .as_ref()
                .ok_or(Error::SelfVerification("missing subbranch"))?;
            if proof.key.len() < 33 {
                return Err(Error::SelfVerification("key field too short"));
            }

            let leaf: Hash32 = Sha256::digest(&proof.key).into();
            let subtree_root = merkle::root_from_branch(&leaf, subindex, subbranch);
            let root =
                merkle::root_from_branch(&subtree_root, proof.index as usize, &proof.branch);
            if root != self.params.main_root {
                return Err(Error::SelfVerification("branch does not reach main root"));
            }

            let sig_bytes = proof
                .signature
                .as_ref()
                .ok_or(Error::SelfVerification("missing signature"))?;
            let signature = Signature::from_slice(sig_bytes)
                .map_err(|_| Error::SelfVerification("malformed signature"))?;
            let verifying = VerifyingKey::from_sec1_bytes(&proof.key[..33])
                .map_err(|_| Error::SelfVerification("malformed public key"))?;
            verifying
                .verify(&proof.signing_bytes(), &signature)
                .map_err(|_| Error::SelfVerification("signature check failed"))?;
        } else {
            if proof.subbranch.is_some() || proof.signature.is_some() {
                return Err(Error::SelfVerification(
                    "address-origin proof carries key-origin fields",
                ));
            }
            let leaf: Hash32 = Sha256::new()
                .chain_update([proof.version])
                .chain_update(&proof.address)
                .finalize()
                .into();
            let root = merkle::root_from_branch(&leaf, proof.index as usize, &proof.branch);
            if root != self.params.faucet_root {
                return Err(Error::SelfVerification("branch does not reach faucet root"));
            }
        }

        Ok(())
    }
}

mod hex_bytes {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

mod hex_bytes_opt {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        s.map(|s| hex::decode(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

mod hex_hashes {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(hashes: &[[u8; 32]], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(hashes.iter().map(hex::encode))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let strings = Vec::<String>::deserialize(deserializer)?;
        strings
            .into_iter()
            .map(|s| {
                hex::decode(&s)
                    .map_err(serde::de::Error::custom)?
                    .try_into()
                    .map_err(|_| serde::de::Error::custom("expected 32-byte hash"))
            })
            .collect()
    }
}

mod hex_hashes_opt {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(hashes: &Option<Vec<[u8; 32]>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match hashes {
            Some(h) => serializer.collect_seq(h.iter().map(hex::encode)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<[u8; 32]>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let strings = Option::<Vec<String>>::deserialize(deserializer)?;
        strings
            .map(|v| {
                v.into_iter()
                    .map(|s| {
                        hex::decode(&s)
                            .map_err(serde::de::Error::custom)?
                            .try_into()
                            .map_err(|_| serde::de::Error::custom("expected 32-byte hash"))
                    })
                    .collect()
            })
            .transpose()
    }
}
