// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

use core::fmt;

use bytecheck::CheckBytes;
use dusk_bytes::Serializable;
use rkyv::{Archive, Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::signer::SignerKey;

const PRINCIPAL_SIZE: usize = 20;

/// An account identifier, derived from a public key.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
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
pub struct Principal(
    #[cfg_attr(
        feature = "serde",
        serde(with = "serde_with::As::<serde_with::hex::Hex>")
    )]
    [u8; PRINCIPAL_SIZE],
);

impl Principal {
    /// Derive the principal controlled by the given public key.
    ///
    /// The identifier is the first 20 bytes of the SHA-256 digest of the
    /// compressed key.
    #[must_use]
    pub fn from_public_key(key: &SignerKey) -> Self {
        let digest = Sha256::digest(key.to_bytes());
        let mut bytes = [0u8; Self::SIZE];
        bytes.copy_from_slice(&digest[..Self::SIZE]);
        Self(bytes)
    }

    /// The raw bytes of the principal.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PRINCIPAL_SIZE] {
        &self.0
    }
}

impl Serializable<PRINCIPAL_SIZE> for Principal {
    type Error = dusk_bytes::Error;

    fn from_bytes(buf: &[u8; Self::SIZE]) -> Result<Self, Self::Error> {
        Ok(Self(*buf))
    }

    fn to_bytes(&self) -> [u8; Self::SIZE] {
        self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
