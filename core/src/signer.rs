// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

//! Signer keys and the authorizations they sign.
//!
//! A signer authorization is a single-use attestation from a signer key that
//! a given stacking action may be performed for a given reward cycle. The
//! signed payload is a structured-data digest of the topic, the pox address,
//! the reward cycle, the period, the maximum amount and an authorization id.

use core::fmt;
use core::str::FromStr;

use bytecheck::CheckBytes;
use dusk_bytes::Serializable;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rkyv::{Archive, Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, PoxAddress, RewardCycle, Ustx};

/// Size of a compressed secp256k1 public key.
pub const SIGNER_KEY_SIZE: usize = 33;

/// Size of a recoverable signature: 64 bytes compact signature followed by
/// the recovery id.
pub const SIGNATURE_SIZE: usize = 65;

const STRUCTURED_DATA_PREFIX: &[u8] = b"SIP018";
const DOMAIN_NAME: &str = "pox-4-signer";
const DOMAIN_VERSION: &str = "1.0.0";

/// A compressed secp256k1 public key identifying a signer.
///
/// The bytes are not validated on construction, since signer keys arrive as
/// raw call arguments. Use [`SignerKey::verifying_key`] to check them.
#[derive(
    Debug,
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
pub struct SignerKey(
    #[cfg_attr(
        feature = "serde",
        serde(with = "serde_with::As::<serde_with::hex::Hex>")
    )]
    [u8; SIGNER_KEY_SIZE],
);

impl SignerKey {
    /// Parse the key as a curve point.
    ///
    /// # Errors
    /// [`Error::InvalidSignerKey`] if the bytes are not a valid compressed
    /// key.
    pub fn verifying_key(&self) -> Result<VerifyingKey, Error> {
        if self.0[0] != 0x02 && self.0[0] != 0x03 {
            return Err(Error::InvalidSignerKey);
        }
        VerifyingKey::from_sec1_bytes(&self.0)
            .map_err(|_| Error::InvalidSignerKey)
    }

    /// Whether the key is a valid compressed curve point.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.verifying_key().is_ok()
    }
}

impl From<&VerifyingKey> for SignerKey {
    fn from(vk: &VerifyingKey) -> Self {
        let point = vk.to_encoded_point(true);
        let mut bytes = [0u8; SIGNER_KEY_SIZE];
        bytes.copy_from_slice(point.as_bytes());
        Self(bytes)
    }
}

impl From<&SigningKey> for SignerKey {
    fn from(sk: &SigningKey) -> Self {
        Self::from(sk.verifying_key())
    }
}

impl Serializable<SIGNER_KEY_SIZE> for SignerKey {
    type Error = dusk_bytes::Error;

    fn from_bytes(buf: &[u8; Self::SIZE]) -> Result<Self, Self::Error> {
        Ok(Self(*buf))
    }

    fn to_bytes(&self) -> [u8; Self::SIZE] {
        self.0
    }
}

/// A recoverable secp256k1 signature over an authorization digest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Deserialize, Serialize,
)]
#[archive_attr(derive(CheckBytes))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SignerSignature(
    #[cfg_attr(
        feature = "serde",
        serde(with = "serde_with::As::<serde_with::hex::Hex>")
    )]
    [u8; SIGNATURE_SIZE],
);

impl SignerSignature {
    /// Recover the key that produced this signature over `digest`.
    ///
    /// # Errors
    /// [`Error::InvalidSignatureRecover`] if no key can be recovered.
    pub fn recover(&self, digest: &[u8; 32]) -> Result<SignerKey, Error> {
        let signature = Signature::from_slice(&self.0[..64])
            .map_err(|_| Error::InvalidSignatureRecover)?;
        let recovery_id = RecoveryId::from_byte(self.0[64])
            .ok_or(Error::InvalidSignatureRecover)?;
        let vk =
            VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
                .map_err(|_| Error::InvalidSignatureRecover)?;
        Ok(SignerKey::from(&vk))
    }
}

impl Serializable<SIGNATURE_SIZE> for SignerSignature {
    type Error = dusk_bytes::Error;

    fn from_bytes(buf: &[u8; Self::SIZE]) -> Result<Self, Self::Error> {
        Ok(Self(*buf))
    }

    fn to_bytes(&self) -> [u8; Self::SIZE] {
        self.0
    }
}

/// The purpose an authorization is issued for.
#[derive(
    Debug,
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
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum Topic {
    /// Direct stacking.
    StackStx,
    /// Extension of a direct stack.
    StackExtend,
    /// Increase of a direct stack.
    StackIncrease,
    /// Commitment of delegated stacks into a reward slot.
    AggCommit,
    /// Increase of a committed reward slot.
    AggIncrease,
}

impl Topic {
    /// The tag mixed into the signed message.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Topic::StackStx => "stack-stx",
            Topic::StackExtend => "stack-extend",
            Topic::StackIncrease => "stack-increase",
            Topic::AggCommit => "agg-commit",
            Topic::AggIncrease => "agg-increase",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stack-stx" => Ok(Topic::StackStx),
            "stack-extend" => Ok(Topic::StackExtend),
            "stack-increase" => Ok(Topic::StackIncrease),
            "agg-commit" => Ok(Topic::AggCommit),
            "agg-increase" => Ok(Topic::AggIncrease),
            _ => Err(Error::InvalidData),
        }
    }
}

/// A signer's permission to perform one stacking action.
///
/// When `signature` is `None`, the authorization must have been registered
/// beforehand by the signer itself.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
#[archive_attr(derive(CheckBytes))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SignerAuthorization {
    /// Reward address the action pays out to.
    pub pox_addr: PoxAddress,
    /// Reward cycle the authorization is valid for.
    pub reward_cycle: RewardCycle,
    /// Purpose of the authorization.
    pub topic: Topic,
    /// Number of cycles covered by the action.
    pub period: u64,
    /// Largest amount the action may lock.
    #[cfg_attr(
        feature = "serde",
        serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
    )]
    pub max_amount: Ustx,
    /// Discriminator allowing several authorizations with equal fields.
    #[cfg_attr(
        feature = "serde",
        serde(with = "serde_with::As::<serde_with::DisplayFromStr>")
    )]
    pub auth_id: u128,
    /// Key of the signer.
    pub signer_key: SignerKey,
    /// Signature by `signer_key`, if any.
    pub signature: Option<SignerSignature>,
}

impl SignerAuthorization {
    /// Create an unsigned authorization.
    #[must_use]
    pub fn new(
        signer_key: SignerKey,
        pox_addr: PoxAddress,
        reward_cycle: RewardCycle,
        topic: Topic,
        period: u64,
        max_amount: Ustx,
        auth_id: u128,
    ) -> Self {
        Self {
            pox_addr,
            reward_cycle,
            topic,
            period,
            max_amount,
            auth_id,
            signer_key,
            signature: None,
        }
    }

    /// Create an authorization signed by `sk`.
    ///
    /// # Errors
    /// [`Error::InvalidSignerKey`] if the key fails to sign.
    #[allow(clippy::too_many_arguments)]
    pub fn signed(
        sk: &SigningKey,
        chain_id: u32,
        pox_addr: PoxAddress,
        reward_cycle: RewardCycle,
        topic: Topic,
        period: u64,
        max_amount: Ustx,
        auth_id: u128,
    ) -> Result<Self, Error> {
        let mut auth = Self::new(
            SignerKey::from(sk),
            pox_addr,
            reward_cycle,
            topic,
            period,
            max_amount,
            auth_id,
        );
        auth.sign(sk, chain_id)?;
        Ok(auth)
    }

    /// Sign the authorization with `sk`, replacing the signer key with the
    /// key of `sk`.
    ///
    /// # Errors
    /// [`Error::InvalidSignerKey`] if the key fails to sign.
    pub fn sign(
        &mut self,
        sk: &SigningKey,
        chain_id: u32,
    ) -> Result<(), Error> {
        self.signer_key = SignerKey::from(sk);
        let digest = self.signature_digest(chain_id);
        let (signature, recovery_id) = sk
            .sign_prehash_recoverable(&digest)
            .map_err(|_| Error::InvalidSignerKey)?;

        let mut bytes = [0u8; SIGNATURE_SIZE];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = recovery_id.to_byte();
        self.signature = Some(SignerSignature(bytes));
        Ok(())
    }

    /// Return the message that is used as the input to the signature.
    #[must_use]
    pub fn signature_message(&self) -> Vec<u8> {
        let topic = self.topic.as_str().as_bytes();
        let mut bytes = Vec::new();

        bytes.push(u8::try_from(topic.len()).unwrap_or(u8::MAX));
        bytes.extend(topic);
        bytes.extend(self.pox_addr.to_var_bytes());
        bytes.extend(u128::from(self.reward_cycle).to_be_bytes());
        bytes.extend(u128::from(self.period).to_be_bytes());
        bytes.extend(self.max_amount.to_be_bytes());
        bytes.extend(self.auth_id.to_be_bytes());

        bytes
    }

    /// The digest actually signed, bound to `chain_id`.
    #[must_use]
    pub fn signature_digest(&self, chain_id: u32) -> [u8; 32] {
        structured_data_digest(chain_id, &self.signature_message())
    }

    /// Check the signature recovers to `signer_key`.
    ///
    /// # Errors
    /// [`Error::NotAllowed`] if the authorization is unsigned,
    /// [`Error::InvalidSignatureRecover`] if no key can be recovered and
    /// [`Error::InvalidSignaturePubkey`] if the recovered key differs from
    /// `signer_key`.
    pub fn verify_signature(&self, chain_id: u32) -> Result<(), Error> {
        let signature = self.signature.as_ref().ok_or(Error::NotAllowed)?;
        let recovered = signature.recover(&self.signature_digest(chain_id))?;
        if recovered != self.signer_key {
            return Err(Error::InvalidSignaturePubkey);
        }
        Ok(())
    }
}

fn domain_digest(chain_id: u32) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for field in [DOMAIN_NAME, DOMAIN_VERSION] {
        hasher.update([u8::try_from(field.len()).unwrap_or(u8::MAX)]);
        hasher.update(field.as_bytes());
    }
    hasher.update(chain_id.to_be_bytes());
    hasher.finalize().into()
}

/// Hash `message` as structured data for the signer domain of `chain_id`.
#[must_use]
pub fn structured_data_digest(chain_id: u32, message: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(STRUCTURED_DATA_PREFIX);
    hasher.update(domain_digest(chain_id));
    hasher.update(Sha256::digest(message));
    hasher.finalize().into()
}
