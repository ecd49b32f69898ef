//! Allocation keys, candidate secrets, and the nonce/tweak transform
//!
//! Keys reach the core already parsed and normalized to secp256k1 handles;
//! container formats (PGP packets, SSH key files) and passphrase handling
//! live entirely in the collaborator layer. A key always exposes the same
//! capability surface regardless of origin: a 32-byte identity hash, a
//! bucket index derived from it, and redemption value metadata.

use k256::ecdsa::signature::Signer;
use k256::ecdsa::{Signature, SigningKey};
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{NonZeroScalar, ProjectivePoint, PublicKey, Scalar, U256};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::address::TargetAddress;
use crate::artifact::MappingEntry;
use crate::constants::REWARD_VALUE;
use crate::{Error, Hash32, Nonce32, Result};

/// Domain tag for tweak-scalar derivation
const TWEAK_TAG: &[u8] = b"redeem/tweak/v1";

/// Where a registered key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    Pgp,
    Ssh,
    Address,
}

impl std::fmt::Display for KeyOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyOrigin::Pgp => write!(f, "pgp"),
            KeyOrigin::Ssh => write!(f, "ssh"),
            KeyOrigin::Address => write!(f, "address"),
        }
    }
}

/// How the discovered nonce is applied, selected once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformMode {
    /// Publish the nonce verbatim next to the unmodified key. The
    /// redeemed identity stays linkable to the registered key.
    Bare,
    /// Blind the public key by the nonce so the redeemed leaf hash is
    /// unpredictable without it.
    #[default]
    Tweaked,
}

/// A registered allocation entry's key, normalized for the core
#[derive(Debug, Clone)]
pub struct AllocationKey {
    origin: KeyOrigin,
    public: Option<PublicKey>,
    address: Option<TargetAddress>,
    identity: Hash32,
    value: u64,
    sponsor: bool,
}

impl AllocationKey {
    /// Key-origin entry (pgp or ssh). Value is implicit until the tree
    /// match resolves it; ordinary amount until proven otherwise.
    pub fn from_public_key(origin: KeyOrigin, public: PublicKey) -> Result<Self> {
        if origin == KeyOrigin::Address {
            return Err(Error::InvalidKey(
                "address-origin keys carry no public key".into(),
            ));
        }
        let identity = Sha256::digest(public.to_encoded_point(true).as_bytes()).into();
        Ok(Self {
            origin,
            public: Some(public),
            address: None,
            identity,
            value: REWARD_VALUE,
            sponsor: false,
        })
    }

    /// Address-origin entry; value and sponsor flag come straight from the
    /// published proof mapping.
    pub fn from_address(address: TargetAddress, entry: &MappingEntry) -> Self {
        let identity = address.identity_hash();
        Self {
            origin: KeyOrigin::Address,
            public: None,
            address: Some(address),
            identity,
            value: entry.value(),
            sponsor: entry.sponsor(),
        }
    }

    pub fn origin(&self) -> KeyOrigin {
        self.origin
    }

    pub fn identity(&self) -> Hash32 {
        self.identity
    }

    /// Bucket assignment: deterministic function of the identity hash
    pub fn bucket(&self) -> u8 {
        self.identity[0]
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn sponsor(&self) -> bool {
        self.sponsor
    }

    pub fn public_key(&self) -> Option<&PublicKey> {
        self.public.as_ref()
    }

    pub fn registered_address(&self) -> Option<&TargetAddress> {
        self.address.as_ref()
    }

    /// Apply a discovered nonce, producing the key actually proven in the
    /// tree. The original key is left untouched for bucket/nonce lookup.
    pub fn transform(&self, mode: TransformMode, nonce: &Nonce32) -> Result<TransformedKey> {
        let public = self
            .public
            .ok_or_else(|| Error::InvalidKey("address-origin keys cannot be transformed".into()))?;
        match mode {
            TransformMode::Bare => Ok(TransformedKey {
                public,
                mode,
                bare_nonce: Some(*nonce),
            }),
            TransformMode::Tweaked => {
                let t = tweak_scalar(&public, nonce);
                let point = ProjectivePoint::from(*public.as_affine())
                    + ProjectivePoint::GENERATOR * t;
                let public = PublicKey::from_affine(point.to_affine())
                    .map_err(|_| Error::InvalidKey("tweak produced the identity point".into()))?;
                Ok(TransformedKey {
                    public,
                    mode,
                    bare_nonce: None,
                })
            }
        }
    }
}

/// The redemption key: the original key with the nonce applied
///
/// Deterministic by construction: the same (key, nonce, mode) always
/// yields the same transformed key, whose hash must equal a leaf already
/// embedded in the published tree.
#[derive(Debug, Clone)]
pub struct TransformedKey {
    public: PublicKey,
    mode: TransformMode,
    bare_nonce: Option<Nonce32>,
}

impl TransformedKey {
    pub fn mode(&self) -> TransformMode {
        self.mode
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Encoded key bytes as published: compressed point, plus the nonce
    /// as an auxiliary field in bare mode.
    pub fn encoded(&self) -> Vec<u8> {
        let mut out = self.public.to_encoded_point(true).as_bytes().to_vec();
        if let Some(nonce) = &self.bare_nonce {
            out.extend_from_slice(nonce);
        }
        out
    }

    /// Leaf hash committed to by the published tree
    pub fn leaf_hash(&self) -> Hash32 {
        Sha256::digest(self.encoded()).into()
    }
}

/// The private counterpart of a key-origin allocation key
///
/// Opaque to the rest of the core except for its decrypt and sign
/// capabilities.
pub struct RedeemSecret {
    signing: SigningKey,
}

impl RedeemSecret {
    /// Construct from raw scalar bytes; the input copy is wiped.
    pub fn from_bytes(bytes: &mut [u8; 32]) -> Result<Self> {
        let signing = SigningKey::from_slice(&bytes[..])
            .map_err(|e| Error::InvalidKey(format!("secret scalar: {e}")))?;
        bytes.zeroize();
        Ok(Self { signing })
    }

    pub fn public_key(&self) -> PublicKey {
        self.signing.verifying_key().into()
    }

    pub(crate) fn scalar(&self) -> &NonZeroScalar {
        self.signing.as_nonzero_scalar()
    }

    /// Sign with the *original* registered key (bare mode)
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }

    /// Derive the signing key matching a transformed public key.
    pub fn transformed_signing_key(
        &self,
        mode: TransformMode,
        nonce: &Nonce32,
    ) -> Result<SigningKey> {
        match mode {
            TransformMode::Bare => Ok(self.signing.clone()),
            TransformMode::Tweaked => {
                let t = tweak_scalar(&self.public_key(), nonce);
                let tweaked: Scalar = self.scalar().as_ref() + &t;
                SigningKey::from_bytes(&tweaked.to_bytes())
                    .map_err(|_| Error::InvalidKey("tweaked secret is zero".into()))
            }
        }
    }
}

impl std::fmt::Debug for RedeemSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedeemSecret").finish_non_exhaustive()
    }
}

/// t = H(tag || compressed pubkey || nonce) reduced into the scalar field
fn tweak_scalar(public: &PublicKey, nonce: &Nonce32) -> Scalar {
    let digest = Sha256::new()
        .chain_update(TWEAK_TAG)
        .chain_update(public.to_encoded_point(true).as_bytes())
        .chain_update(nonce)
        .finalize();
    <Scalar as Reduce<U256>>::reduce_bytes(&digest)
}
