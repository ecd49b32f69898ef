//! Target redemption address parsing and validation
//!
//! Addresses are checksummed bech32: the HRP must be on the network's
//! allow-list, the witness version must be 0, and the program must be 20
//! or 32 bytes. Anything else is rejected before any tree work begins.

use bech32::{Fe32, Hrp};
use sha2::{Digest, Sha256};

use crate::{Error, Hash32, NetworkParams, Result};

/// A validated redemption target address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAddress {
    hrp: String,
    version: u8,
    payload: Vec<u8>,
}

impl TargetAddress {
    /// Parse and validate a bech32 address against network rules.
    pub fn parse(params: &NetworkParams, s: &str) -> Result<Self> {
        let (hrp, version, payload) = bech32::segwit::decode(s)
            .map_err(|e| Error::InvalidAddress(format!("{s:?}: {e}")))?;
        if !params.allows_hrp(hrp.as_str()) {
            return Err(Error::InvalidAddress(format!(
                "prefix {:?} not allowed on {} network",
                hrp.as_str(),
                params.network
            )));
        }
        let version = version.to_u8();
        if version != 0 {
            return Err(Error::InvalidAddress(format!(
                "unsupported address version {version}"
            )));
        }
        if payload.len() != 20 && payload.len() != 32 {
            return Err(Error::InvalidAddress(format!(
                "payload must be 20 or 32 bytes, got {}",
                payload.len()
            )));
        }
        Ok(Self {
            hrp: hrp.as_str().to_string(),
            version,
            payload,
        })
    }

    /// Build an address from raw parts. Used by the generation-side tests;
    /// the payload length rule still applies.
    pub fn from_parts(hrp: &str, payload: Vec<u8>) -> Result<Self> {
        if payload.len() != 20 && payload.len() != 32 {
            return Err(Error::InvalidAddress(format!(
                "payload must be 20 or 32 bytes, got {}",
                payload.len()
            )));
        }
        Ok(Self {
            hrp: hrp.to_string(),
            version: 0,
            payload,
        })
    }

    pub fn hrp(&self) -> &str {
        &self.hrp
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Witness program: the proof's address-hash field
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Identity hash used for faucet-list lookup of address-origin keys
    pub fn identity_hash(&self) -> Hash32 {
        Sha256::new()
            .chain_update([self.version])
            .chain_update(&self.payload)
            .finalize()
            .into()
    }
}

impl std::fmt::Display for TargetAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hrp = Hrp::parse(&self.hrp).map_err(|_| std::fmt::Error)?;
        let version = Fe32::try_from(self.version).map_err(|_| std::fmt::Error)?;
        let encoded =
            bech32::segwit::encode(hrp, version, &self.payload).map_err(|_| std::fmt::Error)?;
        write!(f, "{encoded}")
    }
}
