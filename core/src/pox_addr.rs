// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

//! Reward payout addresses.

use bytecheck::CheckBytes;
use rkyv::{Archive, Deserialize, Serialize};

use crate::Error;

/// Legacy pay-to-public-key-hash.
pub const ADDRESS_VERSION_P2PKH: u8 = 0x00;
/// Legacy pay-to-script-hash.
pub const ADDRESS_VERSION_P2SH: u8 = 0x01;
/// Segwit pay-to-witness-public-key-hash wrapped in p2sh.
pub const ADDRESS_VERSION_P2SH_P2WPKH: u8 = 0x02;
/// Segwit pay-to-witness-script-hash wrapped in p2sh.
pub const ADDRESS_VERSION_P2SH_P2WSH: u8 = 0x03;
/// Native segwit pay-to-witness-public-key-hash.
pub const ADDRESS_VERSION_P2WPKH: u8 = 0x04;
/// Native segwit pay-to-witness-script-hash.
pub const ADDRESS_VERSION_P2WSH: u8 = 0x05;
/// Taproot.
pub const ADDRESS_VERSION_P2TR: u8 = 0x06;

/// A burnchain address receiving PoX payouts.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Archive,
    Deserialize,
    Serialize,
)]
#[archive_attr(derive(CheckBytes))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoxAddress {
    /// Address hash mode.
    pub version: u8,
    /// Hash of the locking script or key.
    #[cfg_attr(
        feature = "serde",
        serde(with = "serde_with::As::<serde_with::hex::Hex>")
    )]
    pub hashbytes: Vec<u8>,
}

impl PoxAddress {
    /// Create a pox address without validating it.
    #[must_use]
    pub fn new(version: u8, hashbytes: impl Into<Vec<u8>>) -> Self {
        Self {
            version,
            hashbytes: hashbytes.into(),
        }
    }

    /// Create a validated pox address.
    ///
    /// # Errors
    /// [`Error::InvalidPoxAddress`] if the address is malformed.
    pub fn try_new(
        version: u8,
        hashbytes: impl Into<Vec<u8>>,
    ) -> Result<Self, Error> {
        let addr = Self::new(version, hashbytes);
        addr.validate()?;
        Ok(addr)
    }

    /// Expected hash length for the address version, if the version is known.
    #[must_use]
    pub const fn expected_hash_len(version: u8) -> Option<usize> {
        match version {
            ADDRESS_VERSION_P2PKH
            | ADDRESS_VERSION_P2SH
            | ADDRESS_VERSION_P2SH_P2WPKH
            | ADDRESS_VERSION_P2SH_P2WSH
            | ADDRESS_VERSION_P2WPKH => Some(20),
            ADDRESS_VERSION_P2WSH | ADDRESS_VERSION_P2TR => Some(32),
            _ => None,
        }
    }

    /// Check the version is known and the hash has the matching length.
    ///
    /// # Errors
    /// [`Error::InvalidPoxAddress`] if the address is malformed.
    pub fn validate(&self) -> Result<(), Error> {
        match Self::expected_hash_len(self.version) {
            Some(len) if len == self.hashbytes.len() => Ok(()),
            _ => Err(Error::InvalidPoxAddress),
        }
    }

    /// Whether [`PoxAddress::validate`] would succeed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Version byte followed by the length-prefixed hash bytes.
    #[must_use]
    pub fn to_var_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 + self.hashbytes.len());
        bytes.push(self.version);
        bytes.push(u8::try_from(self.hashbytes.len()).unwrap_or(u8::MAX));
        bytes.extend(&self.hashbytes);
        bytes
    }
}
